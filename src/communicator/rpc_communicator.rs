//! Batching communicator.
//!
//! Every agent requesting a decision during a step is appended to one outgoing
//! batch. `decide_batch` performs a single exchange for the whole batch and
//! hands the returned actions back by position: the i-th action of a behavior
//! belongs to the i-th agent of that behavior that asked for a decision.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::mpsc::Sender;

use tracing::{debug, error, info, warn};

use super::objects::{
    ActionSpecProto, AgentActionProto, AgentInfoProto, BrainParametersProto, CommandProto,
    FloatDataProto, HeaderProto, ListAgentInfoProto, ObservationProto, STATUS_CLOSING, STATUS_OK,
    UnrealMessageProto, UnrealOutputProto, UnrealRlInitializationOutputProto, UnrealRlInputProto,
    UnrealRlOutputProto, observation_proto,
};
use super::transport::Transport;
use super::version::check_communication_versions;
use super::{
    Communicator, CommunicatorError, CommunicatorEvent, CommunicatorInitParameters,
    RlInitParameters,
};
use crate::actuators::{ActionBuffers, ActionSpec};
use crate::agents::AgentInfo;
use crate::sensors::{ObservationWriter, Sensor};

pub struct RpcCommunicator {
    /// `None` once the channel is closed.
    transport: Option<Box<dyn Transport>>,
    events: Sender<CommunicatorEvent>,
    need_communicate_this_step: bool,
    behavior_names: Vec<String>,
    current_rl_output: UnrealRlOutputProto,
    ordered_agents_requesting_decisions: BTreeMap<String, Vec<i32>>,
    last_actions_received: HashMap<String, HashMap<i32, ActionBuffers>>,
    sent_brain_keys: HashSet<String>,
    unsent_brain_keys: BTreeMap<String, ActionSpec>,
    sensor_shapes: HashMap<String, Vec<Vec<usize>>>,
    is_training: bool,
}

impl RpcCommunicator {
    pub fn new(transport: Box<dyn Transport>, events: Sender<CommunicatorEvent>) -> Self {
        RpcCommunicator {
            transport: Some(transport),
            events,
            need_communicate_this_step: false,
            behavior_names: Vec::new(),
            current_rl_output: UnrealRlOutputProto::default(),
            ordered_agents_requesting_decisions: BTreeMap::new(),
            last_actions_received: HashMap::new(),
            sent_brain_keys: HashSet::new(),
            unsent_brain_keys: BTreeMap::new(),
            sensor_shapes: HashMap::new(),
            is_training: false,
        }
    }

    /// Episode ids waiting for an action from the next exchange.
    pub fn pending_decisions(&self, behavior_name: &str) -> &[i32] {
        self.ordered_agents_requesting_decisions
            .get(behavior_name)
            .map_or(&[], Vec::as_slice)
    }

    pub fn is_training(&self) -> bool {
        self.is_training
    }

    fn wrap_message(content: Option<UnrealOutputProto>, status: i32) -> UnrealMessageProto {
        UnrealMessageProto {
            header: Some(HeaderProto {
                status,
                message: String::new(),
            }),
            unreal_output: content,
            unreal_input: None,
        }
    }

    fn send_event(&self, event: CommunicatorEvent) {
        if self.events.send(event).is_err() {
            debug!("No listener for communicator event {:?}", event);
        }
    }

    fn close(&mut self) {
        if self.transport.take().is_some() {
            info!("Communicator channel closed");
        }
    }

    /// One round trip during the handshake. Failures close the channel.
    fn handshake_exchange(
        &mut self,
        output: UnrealOutputProto,
    ) -> Result<UnrealMessageProto, CommunicatorError> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(CommunicatorError::Closed);
        };
        let response = match transport.exchange(Self::wrap_message(Some(output), STATUS_OK)) {
            Ok(response) => response,
            Err(error) => {
                self.close();
                return Err(error.into());
            }
        };
        if response.status() != STATUS_OK {
            self.close();
            return Err(CommunicatorError::BadStatus {
                status: response.status(),
            });
        }
        Ok(response)
    }

    /// Sends a batch and returns the trainer's input, or `None` when the channel closed.
    fn exchange(&mut self, output: UnrealOutputProto) -> Option<UnrealRlInputProto> {
        let transport = self.transport.as_mut()?;
        match transport.exchange(Self::wrap_message(Some(output), STATUS_OK)) {
            Err(error) => {
                error!("Exchange with trainer failed: {}", error);
                self.close();
                self.send_event(CommunicatorEvent::Disconnected);
                None
            }
            Ok(response) if response.status() != STATUS_OK => {
                warn!("Trainer answered with status {}, closing the channel", response.status());
                self.close();
                self.send_event(CommunicatorEvent::Disconnected);
                None
            }
            Ok(response) => Some(
                response
                    .unreal_input
                    .and_then(|input| input.rl_input)
                    .unwrap_or_default(),
            ),
        }
    }

    /// Returns `false` when the command ends the step's processing.
    fn process_command(&mut self, rl_input: &UnrealRlInputProto) -> bool {
        self.is_training = rl_input.is_training;
        self.send_event(CommunicatorEvent::RlInputReceived {
            is_training: rl_input.is_training,
        });

        match CommandProto::try_from(rl_input.command).unwrap_or(CommandProto::Step) {
            CommandProto::Quit => {
                info!("Quit command received");
                self.send_event(CommunicatorEvent::Quit);
                false
            }
            CommandProto::Reset => {
                info!("Reset command received");
                self.clear_pending_decisions();
                self.send_event(CommunicatorEvent::Reset);
                false
            }
            CommandProto::Step => true,
        }
    }

    fn clear_pending_decisions(&mut self) {
        for pending in self.ordered_agents_requesting_decisions.values_mut() {
            pending.clear();
        }
    }

    fn clear_outgoing_agent_infos(&mut self) {
        for list in self.current_rl_output.agent_infos.values_mut() {
            list.value.clear();
        }
    }

    fn temp_initialization_output(
        &self,
        rl_output: &UnrealRlOutputProto,
    ) -> Option<UnrealRlInitializationOutputProto> {
        let brain_parameters: Vec<BrainParametersProto> = self
            .unsent_brain_keys
            .iter()
            .filter(|(name, _)| {
                rl_output
                    .agent_infos
                    .get(*name)
                    .is_some_and(|list| !list.value.is_empty())
            })
            .map(|(name, action_spec)| to_brain_parameters_proto(action_spec, name, true))
            .collect();

        if brain_parameters.is_empty() {
            return None;
        }
        Some(UnrealRlInitializationOutputProto {
            brain_parameters,
            ..Default::default()
        })
    }

    fn update_sent_action_spec(&mut self, output: &UnrealRlInitializationOutputProto) {
        for brain in &output.brain_parameters {
            self.sent_brain_keys.insert(brain.brain_name.clone());
            self.unsent_brain_keys.remove(&brain.brain_name);
        }
    }

    fn send_batched_message_helper(&mut self) {
        if self.transport.is_none() {
            self.clear_outgoing_agent_infos();
            self.clear_pending_decisions();
            return;
        }

        let rl_output = self.current_rl_output.clone();
        let initialization_output = self.temp_initialization_output(&rl_output);
        let output = UnrealOutputProto {
            rl_output: Some(rl_output),
            rl_initialization_output: initialization_output.clone(),
        };

        let rl_input = self.exchange(output);
        self.clear_outgoing_agent_infos();

        let Some(mut rl_input) = rl_input else {
            self.clear_pending_decisions();
            return;
        };
        if let Some(initialization_output) = &initialization_output {
            self.update_sent_action_spec(initialization_output);
        }

        if self.process_command(&rl_input) {
            self.distribute_actions(&mut rl_input);
        }
        self.clear_pending_decisions();
    }

    fn distribute_actions(&mut self, rl_input: &mut UnrealRlInputProto) {
        for (behavior_name, pending) in &self.ordered_agents_requesting_decisions {
            let Some(list) = rl_input.agent_actions.remove(behavior_name) else {
                continue;
            };
            if list.value.len() != pending.len() {
                error!(
                    "Trainer sent {} actions for behavior {} but {} agents requested a decision, dropping the batch",
                    list.value.len(),
                    behavior_name,
                    pending.len()
                );
                continue;
            }

            let last_actions = self
                .last_actions_received
                .entry(behavior_name.clone())
                .or_default();
            for (episode_id, action) in pending.iter().zip(list.value) {
                last_actions.insert(*episode_id, to_action_buffers(action));
            }
        }

        for behavior_name in rl_input.agent_actions.keys() {
            debug!("Ignoring actions for behavior {} without pending agents", behavior_name);
        }
    }

    /// The first agent of a behavior fixes the sensor shapes expected for the others.
    pub fn validate_sensor_shapes(&mut self, behavior_name: &str, sensors: &[Box<dyn Sensor>]) -> bool {
        let shapes: Vec<Vec<usize>> = sensors
            .iter()
            .map(|sensor| sensor.observation_spec().shape().to_vec())
            .collect();

        let Some(expected) = self.sensor_shapes.get(behavior_name) else {
            self.sensor_shapes.insert(behavior_name.to_string(), shapes);
            return true;
        };

        if expected.len() != shapes.len() {
            warn!(
                "Behavior {} expects {} sensors but the agent has {}",
                behavior_name,
                expected.len(),
                shapes.len()
            );
            return false;
        }
        let mut valid = true;
        for (index, (expected_shape, shape)) in expected.iter().zip(&shapes).enumerate() {
            if expected_shape != shape {
                warn!(
                    "Sensor {} of behavior {} has shape {:?}, expected {:?}",
                    index, behavior_name, shape, expected_shape
                );
                valid = false;
            }
        }
        valid
    }
}

impl Communicator for RpcCommunicator {
    fn initialize(
        &mut self,
        parameters: &CommunicatorInitParameters,
    ) -> Result<RlInitParameters, CommunicatorError> {
        let academy_parameters = UnrealRlInitializationOutputProto {
            name: parameters.name.clone(),
            package_version: parameters.package_version.clone(),
            communication_version: parameters.communication_version.clone(),
            ..Default::default()
        };

        let response = self.handshake_exchange(UnrealOutputProto {
            rl_output: None,
            rl_initialization_output: Some(academy_parameters),
        })?;

        let Some(initialization_input) = response
            .unreal_input
            .and_then(|input| input.rl_initialization_input)
        else {
            self.close();
            return Err(CommunicatorError::MissingInitializationInput);
        };

        let compatibility = check_communication_versions(
            &parameters.communication_version,
            &initialization_input.communication_version,
        );
        if !compatibility.is_compatible() {
            error!(
                "Communication version {} is not compatible with trainer version {}",
                parameters.communication_version, initialization_input.communication_version
            );
            self.close();
            return Err(CommunicatorError::IncompatibleVersion {
                local: parameters.communication_version.clone(),
                trainer: initialization_input.communication_version,
            });
        }

        let response = self.handshake_exchange(UnrealOutputProto::default())?;
        if let Some(rl_input) = response.unreal_input.and_then(|input| input.rl_input) {
            self.process_command(&rl_input);
        }

        info!(
            "Connected to trainer {} (communication version {}) on port {}",
            initialization_input.package_version,
            initialization_input.communication_version,
            parameters.port
        );

        Ok(RlInitParameters {
            seed: initialization_input.seed,
            num_areas: initialization_input.num_areas,
            trainer_package_version: initialization_input.package_version,
            trainer_communication_version: initialization_input.communication_version,
        })
    }

    fn subscribe_brain(&mut self, behavior_name: &str, action_spec: &ActionSpec) {
        if self.behavior_names.iter().any(|name| name == behavior_name) {
            return;
        }
        debug!("Subscribing behavior {}", behavior_name);
        self.behavior_names.push(behavior_name.to_string());
        self.current_rl_output
            .agent_infos
            .insert(behavior_name.to_string(), ListAgentInfoProto::default());
        if !self.sent_brain_keys.contains(behavior_name) {
            self.unsent_brain_keys
                .insert(behavior_name.to_string(), action_spec.clone());
        }
    }

    fn put_observations(
        &mut self,
        behavior_name: &str,
        info: &AgentInfo,
        sensors: &mut [Box<dyn Sensor>],
    ) {
        self.validate_sensor_shapes(behavior_name, sensors);

        let mut agent_info_proto = to_agent_info_proto(info);
        for sensor in sensors.iter_mut() {
            agent_info_proto
                .observations
                .push(to_observation_proto(sensor.as_mut()));
        }

        self.current_rl_output
            .agent_infos
            .entry(behavior_name.to_string())
            .or_default()
            .value
            .push(agent_info_proto);

        self.need_communicate_this_step = true;

        if !info.done {
            self.ordered_agents_requesting_decisions
                .entry(behavior_name.to_string())
                .or_default()
                .push(info.episode_id);
        }

        let last_actions = self
            .last_actions_received
            .entry(behavior_name.to_string())
            .or_default();
        if info.done {
            last_actions.remove(&info.episode_id);
        } else {
            last_actions.insert(info.episode_id, ActionBuffers::empty());
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn decide_batch(&mut self) {
        if !self.need_communicate_this_step {
            return;
        }
        self.need_communicate_this_step = false;
        self.send_batched_message_helper();
    }

    fn get_actions(&self, behavior_name: &str, episode_id: i32) -> ActionBuffers {
        self.last_actions_received
            .get(behavior_name)
            .and_then(|actions| actions.get(&episode_id))
            .cloned()
            .unwrap_or_else(ActionBuffers::empty)
    }

    fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    fn dispose(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            if let Err(error) = transport.exchange(Self::wrap_message(None, STATUS_CLOSING)) {
                debug!("Trainer did not acknowledge shutdown: {}", error);
            }
            self.close();
        }
    }
}

fn to_agent_info_proto(info: &AgentInfo) -> AgentInfoProto {
    AgentInfoProto {
        reward: info.reward,
        group_reward: info.group_reward,
        done: info.done,
        max_step_reached: info.max_step_reached,
        id: info.episode_id,
        group_id: info.group_id,
        action_mask: info.discrete_action_masks.clone(),
        observations: Vec::new(),
    }
}

fn to_observation_proto(sensor: &mut dyn Sensor) -> ObservationProto {
    let spec = sensor.observation_spec();
    let expected = spec.num_values();
    let mut data = Vec::with_capacity(expected);
    let written = {
        let mut writer = ObservationWriter::new(&mut data, spec.shape(), 0);
        sensor.write(&mut writer)
    };
    if written > expected {
        warn!(
            "Sensor {} wrote {} values but its shape holds {}",
            sensor.name(),
            written,
            expected
        );
    }
    if data.len() < expected {
        data.resize(expected, 0.0);
    }

    ObservationProto {
        shape: spec.shape().iter().map(|&dimension| dimension as i32).collect(),
        observation_data: Some(observation_proto::ObservationData::FloatData(FloatDataProto {
            data,
        })),
        dimension_properties: spec
            .dimension_properties()
            .iter()
            .map(|&property| property as i32)
            .collect(),
        observation_type: spec.observation_type() as i32,
        name: sensor.name().to_string(),
        ..Default::default()
    }
}

fn to_action_spec_proto(action_spec: &ActionSpec) -> ActionSpecProto {
    ActionSpecProto {
        num_continuous_actions: action_spec.num_continuous_actions as i32,
        num_discrete_actions: action_spec.num_discrete_actions() as i32,
        discrete_branch_sizes: action_spec.branch_sizes.iter().map(|&size| size as i32).collect(),
        action_descriptions: Vec::new(),
    }
}

fn to_brain_parameters_proto(action_spec: &ActionSpec, name: &str, is_training: bool) -> BrainParametersProto {
    BrainParametersProto {
        brain_name: name.to_string(),
        is_training,
        action_spec: Some(to_action_spec_proto(action_spec)),
    }
}

fn to_action_buffers(proto: AgentActionProto) -> ActionBuffers {
    ActionBuffers::from_vecs(proto.continuous_actions, proto.discrete_actions)
}
