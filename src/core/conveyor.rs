//! # Conveyor: the public handle that serializes async work.
//!
//! [`Conveyor`] owns the shared admission state (a [`Machine`] behind a
//! [`parking_lot::Mutex`]), a monotonic ticket counter, and the event
//! [`Bus`]. Every submission flows through the same script:
//!
//! ```text
//! run(body):
//!   ├─► ticket = counter.fetch_add(1)
//!   ├─► (notify, admitted) = oneshot::channel()
//!   ├─► arm cancel guard for ticket
//!   ├─► lock { machine.arrive(ticket, notify) } ─► dispatch action
//!   ├─► admitted.await                    (immediate if admitted above)
//!   ├─► body().await                      (slot held, lock NOT held)
//!   ├─► disarm guard
//!   └─► lock { machine.finish(ticket) }   ─► dispatch action (wake next)
//!
//! drop of the run future at any await point:
//!   └─► guard: lock { machine.cancel(ticket) } ─► dispatch action
//! ```
//!
//! ## Rules
//! - The mutex is held only for a transition, never across an await and
//!   never while a body runs.
//! - Resume handles are delivered **after** the lock is released.
//! - Finish and cancel are mutually exclusive per ticket: the guard is
//!   disarmed before the finish report, and there is no await point between
//!   body completion and that report. Whichever event reaches the machine
//!   first wins; the loser is a no-op.
//! - A panic inside the body unwinds through the armed guard, so the slot
//!   is released and the next waiter promoted even then.

use std::future::Future;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;

use crate::core::machine::{Action, Machine};
use crate::error::ConveyorError;
use crate::events::{Bus, Event, EventKind};

/// Default capacity of the event bus ring buffer.
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// FIFO serializer for async work.
///
/// At most one submitted body executes at a time; bodies start in strict
/// submission order; dropping a pending or running submission releases its
/// place without disturbing the rest of the queue.
///
/// Cloning is cheap and shares the queue: two handles are [equal](PartialEq)
/// iff they drive the same underlying state.
///
/// # Example
/// ```
/// use conveyor::Conveyor;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let conveyor = Conveyor::new();
/// let value = conveyor.run(|| async { 40 + 2 }).await;
/// assert_eq!(value, 42);
/// # }
/// ```
pub struct Conveyor {
    shared: Arc<Shared>,
}

struct Shared {
    machine: Mutex<Machine>,
    tickets: AtomicU64,
    bus: Bus,
}

impl Conveyor {
    /// Creates a conveyor with [`DEFAULT_BUS_CAPACITY`].
    pub fn new() -> Self {
        Self::with_bus_capacity(DEFAULT_BUS_CAPACITY)
    }

    /// Creates a conveyor with the given event bus capacity.
    ///
    /// Capacity only affects observability (how many recent [`Event`]s slow
    /// subscribers may lag behind); admission semantics are unaffected.
    pub fn with_bus_capacity(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                machine: Mutex::new(Machine::new()),
                tickets: AtomicU64::new(0),
                bus: Bus::new(capacity),
            }),
        }
    }

    /// Runs `body` once the running slot is granted, returning its output
    /// verbatim.
    ///
    /// Submissions are admitted in strict arrival order. If this future is
    /// dropped before completion — the usual effect of `select!`, timeouts,
    /// or `JoinHandle::abort` — the ticket is withdrawn: a
    /// waiting ticket leaves the queue with no other effect, and a running
    /// ticket hands the slot to the next waiter.
    ///
    /// The body is constructed and polled only after admission, outside the
    /// internal lock, so it may itself take arbitrarily long or submit work
    /// to *other* conveyors. Re-submitting to the **same** conveyor from
    /// inside a body deadlocks, as with any non-reentrant mutex.
    pub async fn run<F, Fut, T>(&self, body: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let ticket = self.shared.tickets.fetch_add(1, Ordering::Relaxed);
        let (notify, admitted) = oneshot::channel();

        let guard = CancelGuard {
            shared: &self.shared,
            ticket,
        };

        let action = self.shared.machine.lock().arrive(ticket, notify);
        if matches!(action, Action::Suspend) {
            self.shared.bus.publish(Event::new(EventKind::TicketEnqueued, ticket));
        }
        self.shared.dispatch(action);

        // Waits for the slot. The sender is dropped only together with this
        // ticket's machine entry, and only `guard` removes that entry, so
        // an error here is unreachable.
        let _ = admitted.await;

        let result = body().await;

        guard.disarm();
        let action = self.shared.machine.lock().finish(ticket);
        self.shared.bus.publish(Event::new(EventKind::TicketFinished, ticket));
        self.shared.dispatch(action);
        result
    }

    /// Like [`run`](Conveyor::run), but withdraws the submission when
    /// `token` fires, whether it is still queued or already running.
    ///
    /// Returns [`ConveyorError::Canceled`] in that case; the next waiter is
    /// promoted exactly as for a dropped submission.
    ///
    /// # Example
    /// ```
    /// use conveyor::{Conveyor, ConveyorError};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let conveyor = Conveyor::new();
    /// let token = CancellationToken::new();
    ///
    /// token.cancel();
    /// let out = conveyor
    ///     .run_cancellable(&token, || std::future::pending::<&str>())
    ///     .await;
    /// assert!(matches!(out, Err(ConveyorError::Canceled)));
    /// # }
    /// ```
    pub async fn run_cancellable<F, Fut, T>(
        &self,
        token: &CancellationToken,
        body: F,
    ) -> Result<T, ConveyorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        match token.run_until_cancelled(self.run(body)).await {
            Some(value) => Ok(value),
            None => Err(ConveyorError::Canceled),
        }
    }

    /// Subscribes to lifecycle [`Event`]s (fire-and-forget broadcast).
    ///
    /// A receiver only observes events published after it subscribes; slow
    /// receivers see `RecvError::Lagged` and skip over missed items.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.bus.subscribe()
    }

    /// True when no ticket holds the running slot.
    ///
    /// Snapshot taken under the guard; it may be stale by the time the
    /// caller acts on it.
    pub fn is_idle(&self) -> bool {
        self.shared.machine.lock().is_idle()
    }

    /// Number of tickets queued behind the current slot holder (snapshot).
    pub fn depth(&self) -> usize {
        self.shared.machine.lock().depth()
    }
}

impl Shared {
    /// Delivers a resume handle outside the lock.
    ///
    /// `TicketAdmitted` is published only when the handle actually reached
    /// its waiter; a concurrently cancelled waiter has already dropped its
    /// receiver and resolves to `TicketCanceled` instead.
    fn dispatch(&self, action: Action) {
        if let Action::Resume { ticket, notify } = action {
            if notify.send(()).is_ok() {
                self.bus.publish(Event::new(EventKind::TicketAdmitted, ticket));
            }
        }
    }
}

impl Clone for Conveyor {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Default for Conveyor {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Conveyor {
    /// Handles are equal iff they share the same underlying state, not by
    /// comparing queue contents.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Conveyor {}

impl std::fmt::Debug for Conveyor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conveyor")
            .field("shared", &Arc::as_ptr(&self.shared))
            .finish()
    }
}

/// Withdraws the ticket if the owning `run` future is dropped (or its body
/// panics) before the finish report.
struct CancelGuard<'a> {
    shared: &'a Shared,
    ticket: u64,
}

impl CancelGuard<'_> {
    /// Defuses the guard; called right before the finish report so the two
    /// events stay mutually exclusive.
    fn disarm(self) {
        mem::forget(self);
    }
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        let action = self.shared.machine.lock().cancel(self.ticket);
        self.shared
            .bus
            .publish(Event::new(EventKind::TicketCanceled, self.ticket));
        self.shared.dispatch(action);
    }
}
