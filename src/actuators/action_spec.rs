use tracing::error;

use super::ActuatorError;

/// Shape of an action space: continuous actions followed by discrete branches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSpec {
    pub num_continuous_actions: usize,
    /// Number of choices in each discrete branch.
    pub branch_sizes: Vec<usize>,
}

impl ActionSpec {
    pub fn new(num_continuous_actions: usize, branch_sizes: Vec<usize>) -> Self {
        ActionSpec {
            num_continuous_actions,
            branch_sizes,
        }
    }

    pub fn make_continuous(num_actions: usize) -> Self {
        Self::new(num_actions, Vec::new())
    }

    pub fn make_discrete(branch_sizes: Vec<usize>) -> Self {
        Self::new(0, branch_sizes)
    }

    pub fn num_discrete_actions(&self) -> usize {
        self.branch_sizes.len()
    }

    pub fn sum_of_discrete_branch_sizes(&self) -> usize {
        self.branch_sizes.iter().sum()
    }

    pub fn total_number_of_actions(&self) -> usize {
        self.num_continuous_actions + self.num_discrete_actions()
    }

    /// Concatenates continuous counts and branch sizes, keeping the given order.
    pub fn combine<'a>(specs: impl IntoIterator<Item = &'a ActionSpec>) -> Self {
        let mut combined = ActionSpec::default();
        for spec in specs {
            combined.num_continuous_actions += spec.num_continuous_actions;
            combined.branch_sizes.extend_from_slice(&spec.branch_sizes);
        }
        combined
    }

    /// Mixed action spaces are not supported by the trainer.
    pub fn check_all_continuous_or_discrete(&self) -> Result<(), ActuatorError> {
        if self.num_continuous_actions > 0 && !self.branch_sizes.is_empty() {
            error!(
                "Action spaces with both continuous ({}) and discrete ({} branches) actions are not supported",
                self.num_continuous_actions,
                self.branch_sizes.len()
            );
            return Err(ActuatorError::MixedActionSpace {
                num_continuous_actions: self.num_continuous_actions,
                num_discrete_branches: self.branch_sizes.len(),
            });
        }
        Ok(())
    }
}
