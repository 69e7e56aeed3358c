//! Error types used by the conveyor.
//!
//! The core has no fatal paths: a body's own failure is returned verbatim
//! by [`Conveyor::run`](crate::Conveyor::run) without wrapping. The only
//! error the conveyor itself produces is [`ConveyorError::Canceled`], from
//! the token-driven entry point.

use thiserror::Error;

/// # Errors produced by the conveyor.
///
/// Scoped to a single submission; other queued tickets are unaffected.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConveyorError {
    /// The submission was withdrawn by its cancellation token before the
    /// body could finish.
    #[error("context cancelled")]
    Canceled,
}

impl ConveyorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use conveyor::ConveyorError;
    ///
    /// assert_eq!(ConveyorError::Canceled.as_label(), "ticket_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConveyorError::Canceled => "ticket_canceled",
        }
    }
}
