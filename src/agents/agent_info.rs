use crate::actuators::ActionBuffers;

/// Snapshot of an agent handed to its policy at decision time.
#[derive(Debug, Clone, Default)]
pub struct AgentInfo {
    /// Actions the agent took since the last decision.
    pub stored_actions: ActionBuffers,
    /// `true` marks a disabled discrete action. Empty when nothing is masked.
    pub discrete_action_masks: Vec<bool>,
    pub reward: f32,
    pub group_reward: f32,
    pub done: bool,
    pub max_step_reached: bool,
    pub episode_id: i32,
    pub group_id: i32,
}

impl AgentInfo {
    pub fn clear_actions(&self) {
        self.stored_actions.clear();
    }

    /// Copies `actions` into the stored buffers, reallocating when the sizes differ.
    pub fn copy_actions(&mut self, actions: &ActionBuffers) {
        let continuous = &actions.continuous_actions;
        if self.stored_actions.continuous_actions.len() != continuous.len() {
            self.stored_actions.continuous_actions =
                crate::actuators::ActionSegment::from_vec(continuous.to_vec());
        } else {
            self.stored_actions.continuous_actions.copy_from(continuous);
        }

        let discrete = &actions.discrete_actions;
        if self.stored_actions.discrete_actions.len() != discrete.len() {
            self.stored_actions.discrete_actions =
                crate::actuators::ActionSegment::from_vec(discrete.to_vec());
        } else {
            self.stored_actions.discrete_actions.copy_from(discrete);
        }
    }
}
