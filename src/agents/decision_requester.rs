use tracing::warn;

/// Requests a decision every `decision_period` academy steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionRequester {
    decision_period: u64,
    decision_step: u64,
    /// Repeat the last action on steps without a decision.
    take_actions_between_decisions: bool,
}

impl Default for DecisionRequester {
    fn default() -> Self {
        DecisionRequester {
            decision_period: 5,
            decision_step: 0,
            take_actions_between_decisions: true,
        }
    }
}

impl DecisionRequester {
    /// Out of range values are clamped: the period is at least one and the
    /// decision step lies within the period.
    pub fn new(decision_period: u64, decision_step: u64, take_actions_between_decisions: bool) -> Self {
        let period = decision_period.max(1);
        if period != decision_period {
            warn!("Decision period must be at least 1, using 1");
        }
        let step = if decision_step >= period {
            warn!(
                "Decision step {} must be smaller than the decision period {}, using {}",
                decision_step,
                period,
                period - 1
            );
            period - 1
        } else {
            decision_step
        };
        DecisionRequester {
            decision_period: period,
            decision_step: step,
            take_actions_between_decisions,
        }
    }

    pub fn decision_period(&self) -> u64 {
        self.decision_period
    }

    pub fn decision_step(&self) -> u64 {
        self.decision_step
    }

    pub fn should_request_decision(&self, academy_step: u64) -> bool {
        academy_step % self.decision_period == self.decision_step
    }

    pub fn should_request_action(&self, _academy_step: u64) -> bool {
        self.take_actions_between_decisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decisions_follow_period_and_step() {
        let requester = DecisionRequester::new(3, 1, false);

        let steps: Vec<u64> = (0..7).filter(|&s| requester.should_request_decision(s)).collect();

        assert_eq!(steps, vec![1, 4]);
        assert!(!requester.should_request_action(2));
    }

    #[test]
    fn test_invalid_values_are_clamped() {
        let requester = DecisionRequester::new(0, 4, true);

        assert_eq!(requester.decision_period(), 1);
        assert_eq!(requester.decision_step(), 0);
        assert!(requester.should_request_decision(17));
    }
}
