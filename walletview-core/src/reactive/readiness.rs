//! Entrance Animation Readiness
//!
//! The wallet screen animates its content in exactly once, and only after
//! everything the animation reveals is actually there: the first layout
//! pass has run and the balance, address, and transaction loads have all
//! finished. None of those five signals completes in a predictable order.
//!
//! A naive "start when loaded" callback on each signal would either fire
//! early or fire several times. Instead the signals feed a small state
//! machine whose transitions are strictly forward-only:
//!
//! ```text
//! (not started) ──animation requested ∧ layout ready──► Waiting
//! Waiting ──balance ∧ address ∧ transactions ready──► Animating
//! Animating ──animation completion reported──► Finished (terminal)
//! ```
//!
//! Each flag is idempotent, flags may arrive in any order, and the
//! transition check re-runs after every flag. Anything arriving after
//! `Finished` (a slow load completing long after the animation) is a
//! harmless no-op. A backward transition cannot be expressed.
//!
//! The current phase is published through a [`Source`] so the presentation
//! layer observes it like any other screen state, replay included.

use parking_lot::Mutex;

use super::source::Source;
use crate::exec::Dispatcher;

/// Phase of the one-time entrance transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterPhase {
    /// Animation requested and layout done; waiting for data loads.
    Waiting,
    /// All readiness signals arrived; the transition is running.
    Animating,
    /// The transition has completed. Terminal.
    Finished,
}

#[derive(Debug, Default)]
struct Machine {
    phase: Option<EnterPhase>,
    animation_requested: bool,
    layout_ready: bool,
    balance_ready: bool,
    address_ready: bool,
    transactions_ready: bool,
}

/// Gate for the one-time entrance animation.
///
/// All methods must be called on the delivery thread.
pub struct EnterAnimation {
    dispatcher: Dispatcher,
    machine: Mutex<Machine>,
    phase: Source<EnterPhase>,
}

impl EnterAnimation {
    pub fn new(dispatcher: &Dispatcher) -> Self {
        Self {
            dispatcher: dispatcher.clone(),
            machine: Mutex::new(Machine::default()),
            phase: Source::new(dispatcher),
        }
    }

    /// Phase notifications for the presentation layer.
    pub fn phase(&self) -> &Source<EnterPhase> {
        &self.phase
    }

    /// Current phase, `None` until Waiting has been entered.
    pub fn current_phase(&self) -> Option<EnterPhase> {
        self.machine.lock().phase
    }

    /// The screen wants the entrance animation once loading completes.
    pub fn request_animation(&self) {
        self.set_flag(|m| &mut m.animation_requested);
    }

    /// The first layout pass has run.
    pub fn layout_ready(&self) {
        self.set_flag(|m| &mut m.layout_ready);
    }

    pub fn balance_ready(&self) {
        self.set_flag(|m| &mut m.balance_ready);
    }

    pub fn address_ready(&self) {
        self.set_flag(|m| &mut m.address_ready);
    }

    pub fn transactions_ready(&self) {
        self.set_flag(|m| &mut m.transactions_ready);
    }

    /// The presentation layer reports the animation has completed.
    ///
    /// # Panics
    ///
    /// Panics if the animation never started: completion without a
    /// preceding `Animating` phase is a contract violation.
    pub fn animation_finished(&self) {
        self.assert_delivery_thread("EnterAnimation::animation_finished");
        let mut machine = self.machine.lock();
        match machine.phase {
            Some(EnterPhase::Animating) => {
                machine.phase = Some(EnterPhase::Finished);
                self.phase.publish(EnterPhase::Finished);
            }
            Some(EnterPhase::Finished) => {}
            other => panic!("animation completion reported in phase {other:?}"),
        }
    }

    fn set_flag(&self, flag: impl FnOnce(&mut Machine) -> &mut bool) {
        self.assert_delivery_thread("EnterAnimation flag setters");
        let mut machine = self.machine.lock();
        if machine.phase == Some(EnterPhase::Finished) {
            // Late async completions after the animation are no-ops.
            return;
        }
        let slot = flag(&mut machine);
        if *slot {
            return;
        }
        *slot = true;
        self.maybe_advance(&mut machine);
    }

    /// Re-run the transition checks until no further transition applies.
    /// Entering Waiting can immediately satisfy Animating when the data
    /// flags arrived before layout did.
    fn maybe_advance(&self, machine: &mut Machine) {
        loop {
            match machine.phase {
                None => {
                    if machine.animation_requested && machine.layout_ready {
                        machine.phase = Some(EnterPhase::Waiting);
                        self.phase.publish(EnterPhase::Waiting);
                        continue;
                    }
                }
                Some(EnterPhase::Waiting) => {
                    if machine.balance_ready && machine.address_ready && machine.transactions_ready
                    {
                        machine.phase = Some(EnterPhase::Animating);
                        self.phase.publish(EnterPhase::Animating);
                        continue;
                    }
                }
                Some(EnterPhase::Animating) | Some(EnterPhase::Finished) => {}
            }
            break;
        }
    }

    fn assert_delivery_thread(&self, what: &str) {
        assert!(
            self.dispatcher.on_delivery_thread(),
            "{what} must be called on the delivery thread"
        );
    }
}

impl std::fmt::Debug for EnterAnimation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnterAnimation")
            .field("machine", &*self.machine.lock())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn fixture() -> Dispatcher {
        Dispatcher::start()
    }

    /// Apply the flag with the given index.
    fn apply(gate: &EnterAnimation, flag: usize) {
        match flag {
            0 => gate.request_animation(),
            1 => gate.layout_ready(),
            2 => gate.balance_ready(),
            3 => gate.address_ready(),
            4 => gate.transactions_ready(),
            _ => unreachable!(),
        }
    }

    fn permutations(items: Vec<usize>) -> Vec<Vec<usize>> {
        if items.len() <= 1 {
            return vec![items];
        }
        let mut result = Vec::new();
        for (i, &item) in items.iter().enumerate() {
            let mut rest = items.clone();
            rest.remove(i);
            for mut tail in permutations(rest) {
                tail.insert(0, item);
                result.push(tail);
            }
        }
        result
    }

    #[test]
    fn every_flag_permutation_reaches_animating_exactly_once() {
        let dispatcher = fixture();

        for order in permutations((0..5).collect()) {
            let gate = Arc::new(EnterAnimation::new(&dispatcher));
            let seen = Arc::new(Mutex::new(Vec::new()));

            let g2 = Arc::clone(&gate);
            let seen2 = Arc::clone(&seen);
            dispatcher.call(move || {
                g2.phase().subscribe(move |p| seen2.lock().push(*p));
            });

            for &flag in &order {
                let g2 = Arc::clone(&gate);
                dispatcher.call(move || apply(&g2, flag));
            }
            dispatcher.call(|| {});

            assert_eq!(
                *seen.lock(),
                vec![EnterPhase::Waiting, EnterPhase::Animating],
                "flag order {order:?}"
            );
            assert_eq!(gate.current_phase(), Some(EnterPhase::Animating));
        }
        dispatcher.shutdown();
    }

    #[test]
    fn waiting_requires_request_and_layout() {
        let dispatcher = fixture();
        let gate = Arc::new(EnterAnimation::new(&dispatcher));

        let g2 = Arc::clone(&gate);
        dispatcher.call(move || {
            g2.balance_ready();
            g2.address_ready();
            g2.transactions_ready();
            g2.request_animation();
            assert_eq!(g2.current_phase(), None);
            // The last missing precondition arrives; both transitions fire.
            g2.layout_ready();
            assert_eq!(g2.current_phase(), Some(EnterPhase::Animating));
        });
        dispatcher.shutdown();
    }

    #[test]
    fn flags_are_idempotent() {
        let dispatcher = fixture();
        let gate = Arc::new(EnterAnimation::new(&dispatcher));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let g2 = Arc::clone(&gate);
        let seen2 = Arc::clone(&seen);
        dispatcher.call(move || {
            g2.phase().subscribe(move |p| seen2.lock().push(*p));
            g2.request_animation();
            g2.request_animation();
            g2.layout_ready();
            g2.layout_ready();
            g2.balance_ready();
            g2.balance_ready();
            g2.address_ready();
            g2.transactions_ready();
            g2.transactions_ready();
        });
        dispatcher.call(|| {});

        assert_eq!(*seen.lock(), vec![EnterPhase::Waiting, EnterPhase::Animating]);
        dispatcher.shutdown();
    }

    #[test]
    fn finished_is_terminal() {
        let dispatcher = fixture();
        let gate = Arc::new(EnterAnimation::new(&dispatcher));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let g2 = Arc::clone(&gate);
        let seen2 = Arc::clone(&seen);
        dispatcher.call(move || {
            g2.phase().subscribe(move |p| seen2.lock().push(*p));
            g2.request_animation();
            g2.layout_ready();
            g2.balance_ready();
            g2.address_ready();
            g2.transactions_ready();
            g2.animation_finished();
            // Late completions must not retrigger anything.
            g2.balance_ready();
            g2.transactions_ready();
            g2.animation_finished();
        });
        dispatcher.call(|| {});

        assert_eq!(
            *seen.lock(),
            vec![EnterPhase::Waiting, EnterPhase::Animating, EnterPhase::Finished]
        );
        dispatcher.shutdown();
    }

    #[test]
    fn completion_before_animating_panics() {
        let dispatcher = fixture();
        let gate = Arc::new(EnterAnimation::new(&dispatcher));

        let g2 = Arc::clone(&gate);
        let panicked = dispatcher.call(move || {
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| g2.animation_finished()))
                .is_err()
        });
        assert!(panicked);
        dispatcher.shutdown();
    }

    #[test]
    fn phase_replays_to_late_subscriber() {
        let dispatcher = fixture();
        let gate = Arc::new(EnterAnimation::new(&dispatcher));

        let g2 = Arc::clone(&gate);
        dispatcher.call(move || {
            g2.request_animation();
            g2.layout_ready();
        });
        dispatcher.call(|| {});

        let seen = Arc::new(Mutex::new(Vec::new()));
        let g3 = Arc::clone(&gate);
        let seen2 = Arc::clone(&seen);
        dispatcher.call(move || {
            g3.phase().subscribe(move |p| seen2.lock().push(*p));
        });

        // A subscriber arriving mid-flight sees the cached phase.
        assert_eq!(*seen.lock(), vec![EnterPhase::Waiting]);
        dispatcher.shutdown();
    }
}
