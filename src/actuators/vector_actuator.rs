use std::cell::RefCell;
use std::rc::Rc;

use super::{ActionBuffers, ActionSpec, Actuator, DiscreteActionMask};

/// Receives the actions of a [`VectorActuator`].
pub trait ActionReceiver {
    fn on_action_received(&mut self, actions: &ActionBuffers);

    fn write_discrete_action_mask(&mut self, _action_mask: &mut dyn DiscreteActionMask) {}
}

pub trait HeuristicProvider {
    fn heuristic(&mut self, actions_out: &ActionBuffers);
}

/// Forwards a flat action vector to a receiver.
pub struct VectorActuator {
    name: String,
    action_spec: ActionSpec,
    action_receiver: Rc<RefCell<dyn ActionReceiver>>,
    heuristic_provider: Option<Rc<RefCell<dyn HeuristicProvider>>>,
    last_actions: ActionBuffers,
}

impl VectorActuator {
    pub fn new(
        action_receiver: Rc<RefCell<dyn ActionReceiver>>,
        heuristic_provider: Option<Rc<RefCell<dyn HeuristicProvider>>>,
        action_spec: ActionSpec,
        name: &str,
    ) -> Self {
        let suffix = if action_spec.num_continuous_actions == 0 {
            "-Discrete".to_string()
        } else if action_spec.num_discrete_actions() == 0 {
            "-Continuous".to_string()
        } else {
            format!(
                "-Continuous-{}-Discrete-{}",
                action_spec.num_continuous_actions,
                action_spec.num_discrete_actions()
            )
        };
        VectorActuator {
            name: format!("{}{}", name, suffix),
            action_spec,
            action_receiver,
            heuristic_provider,
            last_actions: ActionBuffers::empty(),
        }
    }

    pub fn last_actions(&self) -> &ActionBuffers {
        &self.last_actions
    }
}

impl Actuator for VectorActuator {
    fn action_spec(&self) -> &ActionSpec {
        &self.action_spec
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn reset_data(&mut self) {
        self.last_actions = ActionBuffers::empty();
    }

    fn heuristic(&mut self, actions_out: &ActionBuffers) {
        if let Some(provider) = &self.heuristic_provider {
            provider.borrow_mut().heuristic(actions_out);
        }
    }

    fn on_action_received(&mut self, actions: &ActionBuffers) {
        self.last_actions = actions.clone();
        self.action_receiver.borrow_mut().on_action_received(actions);
    }

    fn write_discrete_action_mask(&mut self, action_mask: &mut dyn DiscreteActionMask) {
        self.action_receiver
            .borrow_mut()
            .write_discrete_action_mask(action_mask);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Receiver {
        received: Vec<i32>,
    }

    impl ActionReceiver for Receiver {
        fn on_action_received(&mut self, actions: &ActionBuffers) {
            self.received = actions.discrete_actions.to_vec();
        }
    }

    fn actuator(spec: ActionSpec) -> (VectorActuator, Rc<RefCell<Receiver>>) {
        let receiver = Rc::new(RefCell::new(Receiver::default()));
        let actuator = VectorActuator::new(receiver.clone(), None, spec, "Move");
        (actuator, receiver)
    }

    #[test]
    fn test_name_suffix_follows_action_space() {
        assert_eq!(actuator(ActionSpec::make_discrete(vec![2])).0.name(), "Move-Discrete");
        assert_eq!(actuator(ActionSpec::make_continuous(3)).0.name(), "Move-Continuous");
        assert_eq!(
            actuator(ActionSpec::new(2, vec![3, 3])).0.name(),
            "Move-Continuous-2-Discrete-2"
        );
    }

    #[test]
    fn test_actions_are_forwarded_and_reset() {
        let (mut actuator, receiver) = actuator(ActionSpec::make_discrete(vec![4]));

        actuator.on_action_received(&ActionBuffers::from_vecs(vec![], vec![3]));
        assert_eq!(receiver.borrow().received, vec![3]);
        assert!(!actuator.last_actions().is_empty());

        actuator.reset_data();
        assert!(actuator.last_actions().is_empty());
    }
}
