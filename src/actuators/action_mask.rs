use tracing::{error, warn};

/// Lets an actuator disable individual discrete actions for the next decision.
pub trait DiscreteActionMask {
    /// `branch` is relative to the actuator writing the mask.
    fn set_action_enabled(&mut self, branch: usize, action_index: usize, is_enabled: bool);
}

/// Flattened mask over the discrete branches of every actuator of an agent.
///
/// The storage is allocated the first time an action is disabled, so agents
/// that never mask anything keep an empty mask.
#[derive(Debug, Clone, Default)]
pub struct ActuatorDiscreteActionMask {
    branch_sizes: Vec<usize>,
    starting_action_indices: Vec<usize>,
    current_mask: Vec<bool>,
    sum_of_discrete_branch_sizes: usize,
    /// Branch index of the first branch owned by the actuator currently writing.
    pub current_branch_offset: usize,
    fully_masked_branches: Vec<usize>,
}

impl ActuatorDiscreteActionMask {
    pub fn new(branch_sizes: Vec<usize>) -> Self {
        let starting_action_indices = cumulative_sum(&branch_sizes);
        let sum_of_discrete_branch_sizes = branch_sizes.iter().sum();
        ActuatorDiscreteActionMask {
            branch_sizes,
            starting_action_indices,
            current_mask: Vec::new(),
            sum_of_discrete_branch_sizes,
            current_branch_offset: 0,
            fully_masked_branches: Vec::new(),
        }
    }

    fn lazy_initialize(&mut self) {
        if self.current_mask.is_empty() {
            self.current_mask = vec![false; self.sum_of_discrete_branch_sizes];
        }
    }

    /// `true` marks a disabled action. Empty when nothing was ever masked.
    pub fn mask(&self) -> &[bool] {
        &self.current_mask
    }

    /// Re-enables every action, keeping the storage.
    pub fn reset_mask(&mut self) {
        self.current_mask.fill(false);
        self.current_branch_offset = 0;
        self.fully_masked_branches.clear();
    }

    /// Branches whose actions were all disabled during the last validation.
    pub fn fully_masked_branches(&self) -> &[usize] {
        &self.fully_masked_branches
    }

    pub fn are_all_actions_masked(&self, branch: usize) -> bool {
        if self.current_mask.is_empty() || branch >= self.branch_sizes.len() {
            return false;
        }
        let start = self.starting_action_indices[branch];
        let end = self.starting_action_indices[branch + 1];
        start < end && self.current_mask[start..end].iter().all(|&masked| masked)
    }

    /// Records and logs every branch left without an enabled action.
    pub fn validate(&mut self) -> bool {
        self.fully_masked_branches = (0..self.branch_sizes.len())
            .filter(|&branch| self.are_all_actions_masked(branch))
            .collect();
        for branch in &self.fully_masked_branches {
            warn!("Invalid action masking: all the actions of branch {} are masked", branch);
        }
        self.fully_masked_branches.is_empty()
    }
}

impl DiscreteActionMask for ActuatorDiscreteActionMask {
    fn set_action_enabled(&mut self, branch: usize, action_index: usize, is_enabled: bool) {
        let absolute_branch = self.current_branch_offset + branch;
        if absolute_branch >= self.branch_sizes.len()
            || action_index >= self.branch_sizes[absolute_branch]
        {
            error!(
                "Cannot mask action {} of branch {}: outside of the action space",
                action_index, absolute_branch
            );
            return;
        }
        self.lazy_initialize();
        self.current_mask[self.starting_action_indices[absolute_branch] + action_index] =
            !is_enabled;
    }
}

fn cumulative_sum(values: &[usize]) -> Vec<usize> {
    let mut result = Vec::with_capacity(values.len() + 1);
    result.push(0);
    let mut total = 0;
    for value in values {
        total += value;
        result.push(total);
    }
    result
}
