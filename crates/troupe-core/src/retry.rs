//! Bounded retry over a fallible action
//!
//! TigerStyle: bounded iteration only. The loop runs at most `tries_count`
//! times and never recurses; an action can therefore never spin forever no
//! matter what it reports.
//!
//! This is a pure control primitive: it knows nothing about messages or
//! channels. See `send` for the delivery adapter built on top of it.

/// Outcome of one execution of a [`RetryAction`], and of a whole [`run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The action completed; stop.
    Success,
    /// The action failed transiently; worth another try.
    Again,
    /// The action failed for good; stop.
    Failure,
}

/// An action that may need several tries to complete.
pub trait RetryAction {
    /// Perform one attempt.
    fn execute(&mut self) -> Attempt;

    /// Observation hook, called after an `Again` when tries remain.
    /// `tries_left` is the number of attempts still available.
    fn on_retry(&mut self, tries_left: usize) {
        let _ = tries_left;
    }

    /// Observation hook, called when the budget is exhausted without a
    /// terminal outcome.
    fn on_no_more_retries(&mut self) {}
}

/// Execute `action` at most `tries_count` times.
///
/// Returns `Success` or `Failure` as soon as the action reports one. When
/// every try reports `Again`, calls `on_no_more_retries` and returns
/// `Failure`. Never returns `Again`.
///
/// `tries_count` must be at least 1; zero is a contract violation.
pub fn run(action: &mut dyn RetryAction, tries_count: usize) -> Attempt {
    assert!(tries_count >= 1, "tries_count must be at least 1");

    let mut tries_left = tries_count;
    loop {
        debug_assert!(tries_left >= 1);
        match action.execute() {
            Attempt::Success => return Attempt::Success,
            Attempt::Failure => return Attempt::Failure,
            Attempt::Again => {
                tries_left -= 1;
                if tries_left == 0 {
                    action.on_no_more_retries();
                    return Attempt::Failure;
                }
                action.on_retry(tries_left);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted action that replays a fixed sequence of outcomes and
    /// records every hook invocation.
    struct Scripted {
        outcomes: Vec<Attempt>,
        executed_count: usize,
        retries_seen: Vec<usize>,
        exhausted_count: usize,
    }

    impl Scripted {
        fn new(outcomes: Vec<Attempt>) -> Self {
            Self {
                outcomes,
                executed_count: 0,
                retries_seen: Vec::new(),
                exhausted_count: 0,
            }
        }
    }

    impl RetryAction for Scripted {
        fn execute(&mut self) -> Attempt {
            let outcome = self.outcomes[self.executed_count];
            self.executed_count += 1;
            outcome
        }

        fn on_retry(&mut self, tries_left: usize) {
            self.retries_seen.push(tries_left);
        }

        fn on_no_more_retries(&mut self) {
            self.exhausted_count += 1;
        }
    }

    #[test]
    fn test_immediate_success_runs_once() {
        let mut action = Scripted::new(vec![Attempt::Success]);
        assert_eq!(run(&mut action, 5), Attempt::Success);
        assert_eq!(action.executed_count, 1);
        assert!(action.retries_seen.is_empty());
        assert_eq!(action.exhausted_count, 0);
    }

    #[test]
    fn test_immediate_failure_runs_once() {
        let mut action = Scripted::new(vec![Attempt::Failure]);
        assert_eq!(run(&mut action, 5), Attempt::Failure);
        assert_eq!(action.executed_count, 1);
        assert_eq!(action.exhausted_count, 0);
    }

    #[test]
    fn test_again_then_success() {
        let mut action = Scripted::new(vec![Attempt::Again, Attempt::Again, Attempt::Success]);
        assert_eq!(run(&mut action, 3), Attempt::Success);
        assert_eq!(action.executed_count, 3);
        assert_eq!(action.retries_seen, vec![2, 1]);
        assert_eq!(action.exhausted_count, 0);
    }

    #[test]
    fn test_exhaustion_reports_failure() {
        let mut action = Scripted::new(vec![Attempt::Again; 3]);
        assert_eq!(run(&mut action, 3), Attempt::Failure);
        assert_eq!(action.executed_count, 3);
        assert_eq!(action.retries_seen, vec![2, 1]);
        assert_eq!(action.exhausted_count, 1);
    }

    #[test]
    fn test_single_try_again_exhausts_without_retry_hook() {
        let mut action = Scripted::new(vec![Attempt::Again]);
        assert_eq!(run(&mut action, 1), Attempt::Failure);
        assert_eq!(action.executed_count, 1);
        assert!(action.retries_seen.is_empty());
        assert_eq!(action.exhausted_count, 1);
    }

    #[test]
    #[should_panic(expected = "tries_count must be at least 1")]
    fn test_zero_tries_is_a_contract_violation() {
        let mut action = Scripted::new(vec![Attempt::Success]);
        let _ = run(&mut action, 0);
    }
}
