//! # conveyor
//!
//! **Conveyor** is a FIFO serializer for async work.
//!
//! Callers submit bodies concurrently; the conveyor guarantees that at most
//! one body executes at a time, in strict first-submitted-first-run order,
//! while handling cancellation of submissions that are still queued or
//! already running. It is the building block for "run one at a time"
//! guarantees over resources that have no native locking.
//!
//! ## Architecture
//! ```text
//!   caller A ──► run(body) ──┐
//!   caller B ──► run(body) ──┼──► ticket counter (monotonic u64)
//!   caller C ──► run(body) ──┘             │
//!                                          ▼
//!                          ┌───────────────────────────────┐
//!                          │  Machine (behind a Mutex)     │
//!                          │   Idle | Running{current,     │
//!                          │           pending: FIFO}      │
//!                          │  arrive / finish / cancel     │
//!                          └──────┬───────────────┬────────┘
//!                 Action::Suspend │               │ Action::Resume
//!                                 ▼               ▼
//!                        caller awaits its   previous holder wakes
//!                        oneshot admission   the front waiter via
//!                        channel             its oneshot sender
//!
//!   every transition also publishes an Event on the broadcast Bus:
//!     TicketEnqueued ─► TicketAdmitted ─► TicketFinished | TicketCanceled
//! ```
//!
//! The machine is pure and synchronous: it never suspends, never wakes
//! anyone itself, and is only ever touched under the mutex. Wake-ups leave
//! it as `Action::Resume` values and are delivered after the lock is
//! released. Bodies always run outside the lock.
//!
//! ## Cancellation
//! Dropping the `run` future — what `select!`, timeouts, and
//! `JoinHandle::abort` do — withdraws the ticket: a queued ticket leaves
//! the queue with no other effect; a running ticket hands the slot to the
//! next waiter. [`Conveyor::run_cancellable`] wires the same path to a
//! [`tokio_util::sync::CancellationToken`] and surfaces
//! [`ConveyorError::Canceled`]. Finish and cancel race safely: whichever
//! reaches the machine first wins and the other is a no-op.
//!
//! ## Features
//! | Area            | Description                                              | Key types                  |
//! |-----------------|----------------------------------------------------------|----------------------------|
//! | **Serializing** | Submit async bodies; they run one at a time, FIFO.       | [`Conveyor`]               |
//! | **Cancellation**| Withdraw a submission by drop or token.                  | [`ConveyorError`]          |
//! | **Observability** | Subscribe to per-ticket lifecycle events.              | [`Event`], [`EventKind`]   |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use conveyor::Conveyor;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let conveyor = Conveyor::new();
//!     let log = Arc::new(AtomicUsize::new(0));
//!
//!     let mut handles = Vec::new();
//!     for _ in 0..3 {
//!         let c = conveyor.clone();
//!         let log = log.clone();
//!         handles.push(tokio::spawn(async move {
//!             c.run(|| async move {
//!                 // Only one of these bodies is ever in flight.
//!                 log.fetch_add(1, Ordering::SeqCst);
//!             })
//!             .await;
//!         }));
//!     }
//!     for h in handles {
//!         h.await.unwrap();
//!     }
//!     assert_eq!(log.load(Ordering::SeqCst), 3);
//! }
//! ```

mod core;
mod error;
mod events;

// ---- Public re-exports ----

pub use core::{Conveyor, DEFAULT_BUS_CAPACITY};
pub use error::ConveyorError;
pub use events::{Bus, Event, EventKind};
