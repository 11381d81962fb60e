//! Owns the actuators of one agent and the single action buffer they share.
//!
//! Once readied, actuators are ordered by name and each one is handed a fixed,
//! disjoint slice of the combined continuous and discrete buffers.

use tracing::{debug, error, warn};

use super::{
    ActionBuffers, ActionSegment, ActionSpec, ActionValue, Actuator, ActuatorDiscreteActionMask,
    ActuatorError,
};

#[derive(Default)]
pub struct ActuatorManager {
    actuators: Vec<Box<dyn Actuator>>,
    ready_for_execution: bool,
    stored_actions: ActionBuffers,
    combined_action_spec: ActionSpec,
    discrete_action_mask: ActuatorDiscreteActionMask,
    num_continuous_actions: usize,
    num_discrete_actions: usize,
    sum_of_discrete_branch_sizes: usize,
    duplicate_names: Vec<String>,
    action_space_error: Option<ActuatorError>,
}

impl ActuatorManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ActuatorManager {
            actuators: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready_for_execution
    }

    /// Sorts the actuators and allocates the combined buffers. Runs once.
    pub fn ready_actuators_for_execution(&mut self) {
        if self.ready_for_execution {
            return;
        }

        self.actuators.sort_by(|a, b| a.name().cmp(b.name()));
        self.validate_actuators();

        self.stored_actions = ActionBuffers::new(
            Self::allocate(self.num_continuous_actions),
            Self::allocate(self.num_discrete_actions),
        );
        self.combined_action_spec =
            ActionSpec::combine(self.actuators.iter().map(|actuator| actuator.action_spec()));
        self.action_space_error = self.combined_action_spec.check_all_continuous_or_discrete().err();
        self.discrete_action_mask =
            ActuatorDiscreteActionMask::new(self.combined_action_spec.branch_sizes.clone());
        self.ready_for_execution = true;

        debug!(
            "Actuators ready: {} continuous, {} discrete branches over {} actuators",
            self.num_continuous_actions,
            self.num_discrete_actions,
            self.actuators.len()
        );
    }

    fn allocate<T: ActionValue>(length: usize) -> ActionSegment<T> {
        if length == 0 {
            ActionSegment::empty()
        } else {
            ActionSegment::zeroed(length)
        }
    }

    /// Expects the actuators to be sorted already. Only checked in debug builds.
    fn validate_actuators(&mut self) {
        if !cfg!(debug_assertions) {
            return;
        }
        self.duplicate_names = self
            .actuators
            .windows(2)
            .filter(|pair| pair[0].name() == pair[1].name())
            .map(|pair| pair[0].name().to_string())
            .collect();
        self.duplicate_names.dedup();
        for name in &self.duplicate_names {
            warn!("Actuator names must be unique, found duplicate '{}'", name);
        }
    }

    /// Names that appeared more than once when the manager was readied.
    pub fn duplicate_names(&self) -> &[String] {
        &self.duplicate_names
    }

    /// Set when the readied actuators mix continuous and discrete actions.
    pub fn action_space_error(&self) -> Option<&ActuatorError> {
        self.action_space_error.as_ref()
    }

    pub fn combined_action_spec(&mut self) -> &ActionSpec {
        self.ready_actuators_for_execution();
        &self.combined_action_spec
    }

    pub fn stored_actions(&self) -> &ActionBuffers {
        &self.stored_actions
    }

    pub fn discrete_action_mask(&self) -> &ActuatorDiscreteActionMask {
        &self.discrete_action_mask
    }

    /// Copies `actions` into the owned buffer. An empty source clears it instead.
    pub fn update_actions(&mut self, actions: &ActionBuffers) -> Result<(), ActuatorError> {
        self.ready_actuators_for_execution();
        Self::check_size(
            "Continuous",
            &actions.continuous_actions,
            &self.stored_actions.continuous_actions,
        )?;
        Self::check_size(
            "Discrete",
            &actions.discrete_actions,
            &self.stored_actions.discrete_actions,
        )?;
        Self::update_action_array(&actions.continuous_actions, &self.stored_actions.continuous_actions);
        Self::update_action_array(&actions.discrete_actions, &self.stored_actions.discrete_actions);
        Ok(())
    }

    fn check_size<T: ActionValue>(
        kind: &'static str,
        source: &ActionSegment<T>,
        destination: &ActionSegment<T>,
    ) -> Result<(), ActuatorError> {
        if !source.is_empty() && source.len() != destination.len() {
            error!(
                "{} action buffer of size {} differs from the stored size {}",
                kind,
                source.len(),
                destination.len()
            );
            return Err(ActuatorError::SizeMismatch {
                kind,
                expected: destination.len(),
                actual: source.len(),
            });
        }
        Ok(())
    }

    fn update_action_array<T: ActionValue>(source: &ActionSegment<T>, destination: &ActionSegment<T>) {
        if source.is_empty() {
            destination.clear();
        } else {
            destination.copy_from(source);
        }
    }

    /// Walks the actuators in order, giving each a view of its own action slice.
    fn for_each_slice(
        actuators: &mut [Box<dyn Actuator>],
        buffers: &ActionBuffers,
        mut f: impl FnMut(&mut dyn Actuator, &ActionBuffers),
    ) {
        let mut continuous_start = 0;
        let mut discrete_start = 0;
        for actuator in actuators.iter_mut() {
            let num_continuous = actuator.action_spec().num_continuous_actions;
            let num_discrete = actuator.action_spec().num_discrete_actions();
            if num_continuous == 0 && num_discrete == 0 {
                continue;
            }

            let continuous_actions = if num_continuous > 0 {
                buffers.continuous_actions.sub_segment(continuous_start, num_continuous)
            } else {
                ActionSegment::empty()
            };
            let discrete_actions = if num_discrete > 0 {
                buffers.discrete_actions.sub_segment(discrete_start, num_discrete)
            } else {
                ActionSegment::empty()
            };

            f(actuator.as_mut(), &ActionBuffers::new(continuous_actions, discrete_actions));
            continuous_start += num_continuous;
            discrete_start += num_discrete;
        }
    }

    #[tracing::instrument(level = "trace", skip(self))]
    pub fn execute_actions(&mut self) {
        self.ready_actuators_for_execution();
        let stored_actions = self.stored_actions.clone();
        Self::for_each_slice(&mut self.actuators, &stored_actions, |actuator, actions| {
            actuator.on_action_received(actions)
        });
    }

    /// Lets every actuator fill its slice of `actions_out` with heuristic values.
    pub fn apply_heuristic(&mut self, actions_out: &ActionBuffers) {
        self.ready_actuators_for_execution();
        Self::for_each_slice(&mut self.actuators, actions_out, |actuator, actions| {
            actuator.heuristic(actions)
        });
    }

    /// Rebuilds the discrete mask from every discrete actuator.
    pub fn write_action_mask(&mut self) -> &ActuatorDiscreteActionMask {
        self.ready_actuators_for_execution();
        self.discrete_action_mask.reset_mask();
        let mut offset = 0;
        for actuator in self.actuators.iter_mut() {
            let num_discrete = actuator.action_spec().num_discrete_actions();
            if num_discrete > 0 {
                self.discrete_action_mask.current_branch_offset = offset;
                actuator.write_discrete_action_mask(&mut self.discrete_action_mask);
                offset += num_discrete;
            }
        }
        self.discrete_action_mask.current_branch_offset = 0;
        self.discrete_action_mask.validate();
        &self.discrete_action_mask
    }

    pub fn reset_data(&mut self) {
        if !self.ready_for_execution {
            return;
        }
        self.stored_actions.clear();
        for actuator in self.actuators.iter_mut() {
            actuator.reset_data();
        }
        self.discrete_action_mask.reset_mask();
    }

    fn ensure_not_ready(&self, operation: &'static str) -> Result<(), ActuatorError> {
        if self.ready_for_execution {
            error!("Cannot {} the actuator manager after its buffers have been initialized", operation);
            return Err(ActuatorError::AlreadyReady { operation });
        }
        Ok(())
    }

    fn add_to_buffer_sizes(&mut self, spec: &ActionSpec) {
        self.num_continuous_actions += spec.num_continuous_actions;
        self.num_discrete_actions += spec.num_discrete_actions();
        self.sum_of_discrete_branch_sizes += spec.sum_of_discrete_branch_sizes();
    }

    fn subtract_from_buffer_sizes(&mut self, spec: &ActionSpec) {
        self.num_continuous_actions -= spec.num_continuous_actions;
        self.num_discrete_actions -= spec.num_discrete_actions();
        self.sum_of_discrete_branch_sizes -= spec.sum_of_discrete_branch_sizes();
    }

    pub fn add(&mut self, actuator: Box<dyn Actuator>) -> Result<(), ActuatorError> {
        self.ensure_not_ready("add to")?;
        let spec = actuator.action_spec().clone();
        self.actuators.push(actuator);
        self.add_to_buffer_sizes(&spec);
        Ok(())
    }

    pub fn insert(&mut self, index: usize, actuator: Box<dyn Actuator>) -> Result<(), ActuatorError> {
        self.ensure_not_ready("insert into")?;
        if index > self.actuators.len() {
            return Err(ActuatorError::IndexOutOfRange { index, len: self.actuators.len() });
        }
        let spec = actuator.action_spec().clone();
        self.actuators.insert(index, actuator);
        self.add_to_buffer_sizes(&spec);
        Ok(())
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Box<dyn Actuator>, ActuatorError> {
        self.ensure_not_ready("remove from")?;
        if index >= self.actuators.len() {
            return Err(ActuatorError::IndexOutOfRange { index, len: self.actuators.len() });
        }
        let actuator = self.actuators.remove(index);
        let spec = actuator.action_spec().clone();
        self.subtract_from_buffer_sizes(&spec);
        Ok(actuator)
    }

    /// Removes the first actuator called `name`.
    pub fn remove(&mut self, name: &str) -> Result<bool, ActuatorError> {
        self.ensure_not_ready("remove from")?;
        match self.index_of(name) {
            Some(index) => self.remove_at(index).map(|_| true),
            None => Ok(false),
        }
    }

    pub fn clear(&mut self) -> Result<(), ActuatorError> {
        self.ensure_not_ready("clear")?;
        self.actuators.clear();
        self.num_continuous_actions = 0;
        self.num_discrete_actions = 0;
        self.sum_of_discrete_branch_sizes = 0;
        Ok(())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.actuators.iter().position(|actuator| actuator.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.actuators.iter().map(|actuator| actuator.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.actuators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty()
    }

    pub fn num_continuous_actions(&self) -> usize {
        self.num_continuous_actions
    }

    pub fn num_discrete_actions(&self) -> usize {
        self.num_discrete_actions
    }

    pub fn sum_of_discrete_branch_sizes(&self) -> usize {
        self.sum_of_discrete_branch_sizes
    }

    pub fn total_number_of_actions(&self) -> usize {
        self.num_continuous_actions + self.num_discrete_actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuators::DiscreteActionMask;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct RecordingActuator {
        name: String,
        spec: ActionSpec,
        received: Rc<RefCell<Vec<(String, Vec<f32>, Vec<i32>)>>>,
        heuristic_value: i32,
        masked: Vec<(usize, usize)>,
        resets: Rc<RefCell<usize>>,
    }

    impl RecordingActuator {
        fn boxed(
            name: &str,
            spec: ActionSpec,
            received: &Rc<RefCell<Vec<(String, Vec<f32>, Vec<i32>)>>>,
        ) -> Box<Self> {
            Box::new(RecordingActuator {
                name: name.to_string(),
                spec,
                received: Rc::clone(received),
                heuristic_value: 0,
                masked: Vec::new(),
                resets: Rc::new(RefCell::new(0)),
            })
        }
    }

    impl Actuator for RecordingActuator {
        fn action_spec(&self) -> &ActionSpec {
            &self.spec
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn reset_data(&mut self) {
            *self.resets.borrow_mut() += 1;
        }

        fn heuristic(&mut self, actions_out: &ActionBuffers) {
            for i in 0..actions_out.discrete_actions.len() {
                actions_out.discrete_actions.set(i, self.heuristic_value);
            }
        }

        fn on_action_received(&mut self, actions: &ActionBuffers) {
            self.received.borrow_mut().push((
                self.name.clone(),
                actions.continuous_actions.to_vec(),
                actions.discrete_actions.to_vec(),
            ));
        }

        fn write_discrete_action_mask(&mut self, action_mask: &mut dyn DiscreteActionMask) {
            for &(branch, action) in &self.masked {
                action_mask.set_action_enabled(branch, action, false);
            }
        }
    }

    #[test]
    fn test_layout_is_independent_of_attachment_order() {
        let received = Rc::new(RefCell::new(Vec::new()));
        let build = |names: [&str; 3]| {
            let mut manager = ActuatorManager::new();
            for name in names {
                let spec = match name {
                    "alpha" => ActionSpec::make_discrete(vec![2]),
                    "beta" => ActionSpec::make_discrete(vec![3, 4]),
                    _ => ActionSpec::make_discrete(vec![5]),
                };
                manager.add(RecordingActuator::boxed(name, spec, &received)).unwrap();
            }
            manager.ready_actuators_for_execution();
            manager
        };

        let mut first = build(["gamma", "alpha", "beta"]);
        let mut second = build(["beta", "gamma", "alpha"]);

        assert_eq!(first.names(), vec!["alpha", "beta", "gamma"]);
        assert_eq!(first.names(), second.names());
        assert_eq!(first.combined_action_spec().branch_sizes, vec![2, 3, 4, 5]);
        assert_eq!(first.combined_action_spec(), second.combined_action_spec());
    }

    #[test]
    fn test_execute_hands_out_disjoint_slices() {
        let received = Rc::new(RefCell::new(Vec::new()));
        let mut manager = ActuatorManager::new();
        manager
            .add(RecordingActuator::boxed("b", ActionSpec::make_continuous(1), &received))
            .unwrap();
        manager
            .add(RecordingActuator::boxed("a", ActionSpec::make_continuous(2), &received))
            .unwrap();

        manager
            .update_actions(&ActionBuffers::from_vecs(vec![1.0, 2.0, 3.0], vec![]))
            .unwrap();
        manager.execute_actions();

        let received = received.borrow();
        assert_eq!(received[0], ("a".to_string(), vec![1.0, 2.0], vec![]));
        assert_eq!(received[1], ("b".to_string(), vec![3.0], vec![]));
    }

    #[test]
    fn test_update_with_empty_source_clears() {
        let received = Rc::new(RefCell::new(Vec::new()));
        let mut manager = ActuatorManager::new();
        manager
            .add(RecordingActuator::boxed("a", ActionSpec::make_discrete(vec![3, 3]), &received))
            .unwrap();
        manager.update_actions(&ActionBuffers::from_vecs(vec![], vec![2, 1])).unwrap();
        assert_eq!(manager.stored_actions().discrete_actions.to_vec(), vec![2, 1]);

        manager.update_actions(&ActionBuffers::empty()).unwrap();

        assert_eq!(manager.stored_actions().discrete_actions.to_vec(), vec![0, 0]);
    }

    #[test]
    fn test_update_with_wrong_size_is_rejected() {
        let received = Rc::new(RefCell::new(Vec::new()));
        let mut manager = ActuatorManager::new();
        manager
            .add(RecordingActuator::boxed("a", ActionSpec::make_discrete(vec![3, 3]), &received))
            .unwrap();
        manager.update_actions(&ActionBuffers::from_vecs(vec![], vec![1, 1])).unwrap();

        let result = manager.update_actions(&ActionBuffers::from_vecs(vec![], vec![2, 2, 2]));

        assert!(matches!(result, Err(ActuatorError::SizeMismatch { expected: 2, actual: 3, .. })));
        assert_eq!(manager.stored_actions().discrete_actions.to_vec(), vec![1, 1]);
    }

    #[test]
    fn test_modifications_after_ready_are_rejected() {
        let received = Rc::new(RefCell::new(Vec::new()));
        let mut manager = ActuatorManager::new();
        manager
            .add(RecordingActuator::boxed("a", ActionSpec::make_continuous(1), &received))
            .unwrap();
        manager.ready_actuators_for_execution();

        let added = manager.add(RecordingActuator::boxed("b", ActionSpec::make_continuous(1), &received));

        assert!(matches!(added, Err(ActuatorError::AlreadyReady { .. })));
        assert!(manager.remove_at(0).is_err());
        assert!(manager.clear().is_err());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_mask_offsets_follow_sorted_order() {
        let received = Rc::new(RefCell::new(Vec::new()));
        let mut manager = ActuatorManager::new();
        let mut second = RecordingActuator::boxed("b", ActionSpec::make_discrete(vec![2]), &received);
        second.masked = vec![(0, 1)];
        manager.add(second).unwrap();
        manager
            .add(RecordingActuator::boxed("a", ActionSpec::make_discrete(vec![3]), &received))
            .unwrap();

        let mask = manager.write_action_mask();

        assert_eq!(mask.mask(), &[false, false, false, false, true]);
        assert!(mask.fully_masked_branches().is_empty());
    }

    #[test]
    fn test_fully_masked_branch_is_recorded() {
        let received = Rc::new(RefCell::new(Vec::new()));
        let mut manager = ActuatorManager::new();
        let mut actuator = RecordingActuator::boxed("a", ActionSpec::make_discrete(vec![2]), &received);
        actuator.masked = vec![(0, 0), (0, 1)];
        manager.add(actuator).unwrap();

        assert_eq!(manager.write_action_mask().fully_masked_branches(), &[0]);
    }

    #[test]
    fn test_apply_heuristic_fills_each_slice() {
        let received = Rc::new(RefCell::new(Vec::new()));
        let mut manager = ActuatorManager::new();
        let mut first = RecordingActuator::boxed("a", ActionSpec::make_discrete(vec![3]), &received);
        first.heuristic_value = 2;
        let mut second = RecordingActuator::boxed("b", ActionSpec::make_discrete(vec![4, 4]), &received);
        second.heuristic_value = 3;
        manager.add(second).unwrap();
        manager.add(first).unwrap();

        let out = ActionBuffers::zeroed(0, 3);
        manager.apply_heuristic(&out);

        assert_eq!(out.discrete_actions.to_vec(), vec![2, 3, 3]);
    }

    #[test]
    fn test_reset_data_clears_actions_and_resets_actuators() {
        let received = Rc::new(RefCell::new(Vec::new()));
        let resets = Rc::new(RefCell::new(0));
        let mut manager = ActuatorManager::new();
        let mut actuator = RecordingActuator::boxed("a", ActionSpec::make_continuous(2), &received);
        actuator.resets = Rc::clone(&resets);
        manager.add(actuator).unwrap();
        manager.update_actions(&ActionBuffers::from_vecs(vec![0.5, 0.25], vec![])).unwrap();

        manager.reset_data();

        assert_eq!(manager.stored_actions().continuous_actions.to_vec(), vec![0.0, 0.0]);
        assert_eq!(*resets.borrow(), 1);
    }

    #[test]
    fn test_duplicate_names_are_detected() {
        let received = Rc::new(RefCell::new(Vec::new()));
        let mut manager = ActuatorManager::new();
        manager
            .add(RecordingActuator::boxed("same", ActionSpec::make_continuous(1), &received))
            .unwrap();
        manager
            .add(RecordingActuator::boxed("same", ActionSpec::make_continuous(1), &received))
            .unwrap();

        manager.ready_actuators_for_execution();

        if cfg!(debug_assertions) {
            assert_eq!(manager.duplicate_names(), &["same".to_string()]);
        } else {
            assert!(manager.duplicate_names().is_empty());
        }
        assert!(manager.is_ready());
    }

    #[test]
    fn test_mixed_action_space_is_recorded() {
        let received = Rc::new(RefCell::new(Vec::new()));
        let mut manager = ActuatorManager::new();
        manager
            .add(RecordingActuator::boxed("move", ActionSpec::make_continuous(2), &received))
            .unwrap();
        manager
            .add(RecordingActuator::boxed("jump", ActionSpec::make_discrete(vec![3, 4]), &received))
            .unwrap();

        manager.ready_actuators_for_execution();

        assert_eq!(
            manager.action_space_error(),
            Some(&ActuatorError::MixedActionSpace {
                num_continuous_actions: 2,
                num_discrete_branches: 2
            })
        );
        assert_eq!(manager.total_number_of_actions(), 4);
    }

    #[test]
    fn test_uniform_action_space_has_no_error() {
        let received = Rc::new(RefCell::new(Vec::new()));
        let mut manager = ActuatorManager::new();
        manager
            .add(RecordingActuator::boxed("a", ActionSpec::make_continuous(2), &received))
            .unwrap();
        manager
            .add(RecordingActuator::boxed("b", ActionSpec::make_continuous(3), &received))
            .unwrap();

        manager.ready_actuators_for_execution();

        assert!(manager.action_space_error().is_none());
    }

    #[test]
    fn test_buffer_sizes_track_membership() {
        let received = Rc::new(RefCell::new(Vec::new()));
        let mut manager = ActuatorManager::new();
        manager
            .add(RecordingActuator::boxed("a", ActionSpec::make_discrete(vec![2, 3]), &received))
            .unwrap();
        manager
            .insert(0, RecordingActuator::boxed("b", ActionSpec::make_discrete(vec![4]), &received))
            .unwrap();
        assert_eq!(manager.num_discrete_actions(), 3);
        assert_eq!(manager.sum_of_discrete_branch_sizes(), 9);

        assert!(manager.remove("a").unwrap());

        assert_eq!(manager.num_discrete_actions(), 1);
        assert_eq!(manager.sum_of_discrete_branch_sizes(), 4);
        assert!(!manager.contains("a"));
    }
}
