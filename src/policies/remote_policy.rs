use std::cell::RefCell;
use std::rc::Rc;

use super::Policy;
use crate::actuators::{ActionBuffers, ActionSpec};
use crate::agents::AgentInfo;
use crate::communicator::Communicator;
use crate::sensors::Sensor;

/// Forwards decisions to the trainer through the shared communicator.
pub struct RemotePolicy {
    communicator: Rc<RefCell<dyn Communicator>>,
    fully_qualified_behavior_name: String,
    agent_id: i32,
    last_action_buffers: ActionBuffers,
}

impl RemotePolicy {
    pub fn new(
        communicator: Rc<RefCell<dyn Communicator>>,
        action_spec: &ActionSpec,
        fully_qualified_behavior_name: &str,
    ) -> Self {
        communicator
            .borrow_mut()
            .subscribe_brain(fully_qualified_behavior_name, action_spec);
        RemotePolicy {
            communicator,
            fully_qualified_behavior_name: fully_qualified_behavior_name.to_string(),
            agent_id: 0,
            last_action_buffers: ActionBuffers::empty(),
        }
    }
}

impl Policy for RemotePolicy {
    fn request_decision(&mut self, info: &AgentInfo, sensors: &mut [Box<dyn Sensor>]) {
        self.agent_id = info.episode_id;
        self.communicator
            .borrow_mut()
            .put_observations(&self.fully_qualified_behavior_name, info, sensors);
    }

    fn decide_action(&mut self) -> ActionBuffers {
        let mut communicator = self.communicator.borrow_mut();
        communicator.decide_batch();
        let actions = communicator.get_actions(&self.fully_qualified_behavior_name, self.agent_id);
        self.last_action_buffers = if actions.is_empty() {
            ActionBuffers::empty()
        } else {
            actions
        };
        self.last_action_buffers.clone()
    }

    fn is_remote(&self) -> bool {
        true
    }
}
