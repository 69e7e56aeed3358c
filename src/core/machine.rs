//! # Ordering state machine for the conveyor.
//!
//! [`Machine`] is a pure, synchronous transition function over the shared
//! admission state. It decides, for each event, whether the affected ticket
//! may hold the running slot and which other ticket (if any) must be woken
//! as a consequence. It never touches the runtime: wake-ups travel out of
//! the machine as [`Action::Resume`] carrying the waiter's one-shot sender,
//! and the caller delivers them **after** releasing the guard.
//!
//! ## States
//! ```text
//!                arrive(t)                    arrive(u)
//!   ┌──────┐  ─────────────►  ┌─────────────┐ ────────► (u appended to pending)
//!   │ Idle │                  │ Running      │
//!   └──────┘  ◄─────────────  │  current: t  │ ◄──────── finish(t)/cancel(t)
//!             finish/cancel   │  pending: [] │           promotes front of pending
//!             (pending empty) └─────────────┘
//! ```
//!
//! ## Rules
//! - Promotion always takes the **front** of `pending` (strict FIFO).
//! - A ticket never appears twice across `current` and `pending`.
//! - Each waiter can be woken at most once: promotion moves the waiter's
//!   [`oneshot::Sender`] out of the machine, and sending consumes it.
//! - Events for unknown tickets are no-ops; duplicate finish/cancel
//!   delivery is tolerated by construction.

use std::collections::VecDeque;

use tokio::sync::oneshot;

/// One submission waiting for the running slot.
///
/// `notify` is the single-use resume handle bound to the suspended caller.
pub(crate) struct Waiter {
    pub ticket: u64,
    pub notify: oneshot::Sender<()>,
}

/// Admission state.
///
/// The slot holder keeps no live resume handle (it was consumed when the
/// holder was admitted), so `current` is just the ticket id.
enum State {
    /// No slot holder, nothing queued.
    Idle,
    /// `current` holds the running slot; `pending` waits in arrival order.
    Running {
        current: u64,
        pending: VecDeque<Waiter>,
    },
}

/// What the orchestrator must do after a transition.
pub(crate) enum Action {
    /// The arriving caller must suspend until its resume handle fires.
    Suspend,
    /// `ticket` now holds the slot; deliver `notify` outside the guard.
    Resume {
        ticket: u64,
        notify: oneshot::Sender<()>,
    },
    /// Nothing to do.
    None,
}

/// Pure admission/ordering state machine.
pub(crate) struct Machine {
    state: State,
}

impl Machine {
    pub fn new() -> Self {
        Self { state: State::Idle }
    }

    /// A new submission wants the slot.
    ///
    /// - Idle: the arrival takes the slot; returns [`Action::Resume`] for it
    ///   so the caller's own admission channel fires without suspending.
    /// - Running and `ticket` already holds the slot: duplicate arrival,
    ///   ignored (ticket ids are unique, so this cannot happen through the
    ///   public surface).
    /// - Running otherwise: join the back of the queue.
    pub fn arrive(&mut self, ticket: u64, notify: oneshot::Sender<()>) -> Action {
        match &mut self.state {
            State::Idle => {
                self.state = State::Running {
                    current: ticket,
                    pending: VecDeque::new(),
                };
                Action::Resume { ticket, notify }
            }
            State::Running { current, pending } => {
                if *current == ticket {
                    return Action::Suspend;
                }
                pending.push_back(Waiter { ticket, notify });
                Action::Suspend
            }
        }
    }

    /// The slot holder completed its body.
    pub fn finish(&mut self, ticket: u64) -> Action {
        self.release(ticket)
    }

    /// The ticket's caller was cancelled, waiting or running.
    ///
    /// Same transition shape as [`finish`](Machine::finish): whichever of
    /// the two events arrives first removes the ticket, and the loser finds
    /// nothing left to act on.
    pub fn cancel(&mut self, ticket: u64) -> Action {
        self.release(ticket)
    }

    /// Removes `ticket` from the machine and promotes the next waiter if
    /// `ticket` held the slot.
    ///
    /// The empty check runs before promotion: vacating the slot with an
    /// empty queue transitions to [`State::Idle`] and wakes nobody.
    fn release(&mut self, ticket: u64) -> Action {
        match &mut self.state {
            State::Idle => Action::None,
            State::Running { current, pending } => {
                if *current != ticket {
                    // Event for a ticket that never reached the slot:
                    // drop its queue entry if it has one.
                    if let Some(pos) = pending.iter().position(|w| w.ticket == ticket) {
                        pending.remove(pos);
                    }
                    return Action::None;
                }
                match pending.pop_front() {
                    Some(next) => {
                        *current = next.ticket;
                        Action::Resume {
                            ticket: next.ticket,
                            notify: next.notify,
                        }
                    }
                    None => {
                        self.state = State::Idle;
                        Action::None
                    }
                }
            }
        }
    }

    /// True when no ticket holds the slot.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    /// Number of tickets queued behind the slot holder.
    pub fn depth(&self) -> usize {
        match &self.state {
            State::Idle => 0,
            State::Running { pending, .. } => pending.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        std::mem::forget(rx);
        tx
    }

    /// Returns the admitted ticket, or `None` for `Suspend`/`None`.
    fn admitted(action: Action) -> Option<u64> {
        match action {
            Action::Resume { ticket, .. } => Some(ticket),
            _ => None,
        }
    }

    #[test]
    fn test_arrival_on_idle_admits_immediately() {
        let mut m = Machine::new();
        assert_eq!(admitted(m.arrive(5, handle())), Some(5));
        assert!(!m.is_idle());
        assert_eq!(m.depth(), 0);
    }

    #[test]
    fn test_second_arrival_waits() {
        let mut m = Machine::new();
        let _ = m.arrive(1, handle());
        assert_eq!(admitted(m.arrive(2, handle())), None);
        assert_eq!(m.depth(), 1);
    }

    #[test]
    fn test_finish_promotes_front() {
        let mut m = Machine::new();
        let _ = m.arrive(1, handle());
        let _ = m.arrive(2, handle());
        let _ = m.arrive(3, handle());
        assert_eq!(admitted(m.finish(1)), Some(2));
        assert_eq!(m.depth(), 1);
    }

    #[test]
    fn test_finish_with_empty_queue_goes_idle() {
        let mut m = Machine::new();
        let _ = m.arrive(1, handle());
        assert_eq!(admitted(m.finish(1)), None);
        assert!(m.is_idle());
    }

    #[test]
    fn test_finish_for_queued_ticket_removes_it() {
        let mut m = Machine::new();
        let _ = m.arrive(1, handle());
        let _ = m.arrive(2, handle());
        assert_eq!(admitted(m.finish(2)), None);
        assert_eq!(m.depth(), 0);
        assert!(!m.is_idle());
    }

    #[test]
    fn test_cancel_of_waiting_is_inert() {
        let mut m = Machine::new();
        let _ = m.arrive(1, handle());
        let _ = m.arrive(2, handle());
        let _ = m.arrive(3, handle());
        assert_eq!(admitted(m.cancel(2)), None);
        // 2 is gone: finishing 1 skips straight to 3.
        assert_eq!(admitted(m.finish(1)), Some(3));
    }

    #[test]
    fn test_cancel_of_running_promotes_front() {
        let mut m = Machine::new();
        let _ = m.arrive(1, handle());
        let _ = m.arrive(2, handle());
        assert_eq!(admitted(m.cancel(1)), Some(2));
    }

    #[test]
    fn test_cancel_of_running_with_empty_queue_goes_idle() {
        let mut m = Machine::new();
        let _ = m.arrive(1, handle());
        assert_eq!(admitted(m.cancel(1)), None);
        assert!(m.is_idle());
    }

    #[test]
    fn test_events_for_unknown_tickets_are_noops() {
        let mut m = Machine::new();
        assert_eq!(admitted(m.finish(9)), None);
        assert_eq!(admitted(m.cancel(9)), None);
        assert!(m.is_idle());

        let _ = m.arrive(1, handle());
        assert_eq!(admitted(m.cancel(9)), None);
        assert_eq!(m.depth(), 0);
        assert!(!m.is_idle());
    }

    #[test]
    fn test_duplicate_arrival_for_slot_holder_is_ignored() {
        let mut m = Machine::new();
        let _ = m.arrive(1, handle());
        assert_eq!(admitted(m.arrive(1, handle())), None);
        assert_eq!(m.depth(), 0);
        assert_eq!(admitted(m.finish(1)), None);
        assert!(m.is_idle());
    }

    #[test]
    fn test_promotion_is_strict_fifo() {
        let mut m = Machine::new();
        for t in 1..=5 {
            let _ = m.arrive(t, handle());
        }
        let mut order = Vec::new();
        let mut running = 1;
        while let Some(next) = admitted(m.finish(running)) {
            order.push(next);
            running = next;
        }
        assert_eq!(order, vec![2, 3, 4, 5]);
        assert!(m.is_idle());
    }

    #[test]
    fn test_finish_then_cancel_queue_scenario() {
        // 1 running; 2 and 3 queued. Finish 1 -> admit 2. Cancel 3
        // (still pending) -> nothing. Finish 2 -> idle, nothing.
        let mut m = Machine::new();
        let _ = m.arrive(1, handle());
        let _ = m.arrive(2, handle());
        let _ = m.arrive(3, handle());

        assert_eq!(admitted(m.finish(1)), Some(2));
        assert_eq!(admitted(m.cancel(3)), None);
        assert_eq!(admitted(m.finish(2)), None);
        assert!(m.is_idle());
    }

    #[test]
    fn test_duplicate_finish_after_cancel_is_noop() {
        let mut m = Machine::new();
        let _ = m.arrive(1, handle());
        let _ = m.arrive(2, handle());
        assert_eq!(admitted(m.cancel(1)), Some(2));
        // The losing event for 1 finds nothing left.
        assert_eq!(admitted(m.finish(1)), None);
        assert_eq!(m.depth(), 0);
        assert!(!m.is_idle());
    }
}
