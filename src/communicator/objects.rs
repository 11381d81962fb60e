//! Messages exchanged with the trainer, package `communicator_objects`.
//!
//! Maps are encoded from `BTreeMap`s so a batch always serializes in the same
//! order.

use std::collections::BTreeMap;

pub const STATUS_OK: i32 = 200;
pub const STATUS_CLOSING: i32 = 400;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HeaderProto {
    #[prost(int32, tag = "1")]
    pub status: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnrealMessageProto {
    #[prost(message, optional, tag = "1")]
    pub header: Option<HeaderProto>,
    #[prost(message, optional, tag = "2")]
    pub unreal_output: Option<UnrealOutputProto>,
    #[prost(message, optional, tag = "3")]
    pub unreal_input: Option<UnrealInputProto>,
}

impl UnrealMessageProto {
    /// Status of the header, `0` when the header is missing.
    pub fn status(&self) -> i32 {
        self.header.as_ref().map_or(0, |header| header.status)
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnrealOutputProto {
    #[prost(message, optional, tag = "1")]
    pub rl_output: Option<UnrealRlOutputProto>,
    #[prost(message, optional, tag = "2")]
    pub rl_initialization_output: Option<UnrealRlInitializationOutputProto>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnrealInputProto {
    #[prost(message, optional, tag = "1")]
    pub rl_input: Option<UnrealRlInputProto>,
    #[prost(message, optional, tag = "2")]
    pub rl_initialization_input: Option<UnrealRlInitializationInputProto>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnrealRlInitializationOutputProto {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub communication_version: String,
    #[prost(string, tag = "3")]
    pub log_path: String,
    #[prost(message, repeated, tag = "5")]
    pub brain_parameters: Vec<BrainParametersProto>,
    #[prost(string, tag = "7")]
    pub package_version: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnrealRlInitializationInputProto {
    #[prost(int32, tag = "1")]
    pub seed: i32,
    #[prost(string, tag = "2")]
    pub communication_version: String,
    #[prost(string, tag = "3")]
    pub package_version: String,
    #[prost(int32, tag = "5")]
    pub num_areas: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BrainParametersProto {
    #[prost(string, tag = "7")]
    pub brain_name: String,
    #[prost(bool, tag = "8")]
    pub is_training: bool,
    #[prost(message, optional, tag = "9")]
    pub action_spec: Option<ActionSpecProto>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ActionSpecProto {
    #[prost(int32, tag = "1")]
    pub num_continuous_actions: i32,
    #[prost(int32, tag = "2")]
    pub num_discrete_actions: i32,
    #[prost(int32, repeated, tag = "3")]
    pub discrete_branch_sizes: Vec<i32>,
    #[prost(string, repeated, tag = "4")]
    pub action_descriptions: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnrealRlOutputProto {
    #[prost(btree_map = "string, message", tag = "2")]
    pub agent_infos: BTreeMap<String, ListAgentInfoProto>,
    #[prost(bytes = "vec", tag = "3")]
    pub side_channel: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListAgentInfoProto {
    #[prost(message, repeated, tag = "1")]
    pub value: Vec<AgentInfoProto>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentInfoProto {
    #[prost(float, tag = "7")]
    pub reward: f32,
    #[prost(bool, tag = "8")]
    pub done: bool,
    #[prost(bool, tag = "9")]
    pub max_step_reached: bool,
    #[prost(int32, tag = "10")]
    pub id: i32,
    #[prost(bool, repeated, tag = "11")]
    pub action_mask: Vec<bool>,
    #[prost(message, repeated, tag = "13")]
    pub observations: Vec<ObservationProto>,
    #[prost(int32, tag = "14")]
    pub group_id: i32,
    #[prost(float, tag = "15")]
    pub group_reward: f32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ObservationProto {
    #[prost(int32, repeated, tag = "1")]
    pub shape: Vec<i32>,
    #[prost(enumeration = "CompressionTypeProto", tag = "2")]
    pub compression_type: i32,
    #[prost(oneof = "observation_proto::ObservationData", tags = "3, 4")]
    pub observation_data: Option<observation_proto::ObservationData>,
    #[prost(int32, repeated, tag = "5")]
    pub compressed_channel_mapping: Vec<i32>,
    #[prost(int32, repeated, tag = "6")]
    pub dimension_properties: Vec<i32>,
    #[prost(enumeration = "ObservationTypeProto", tag = "7")]
    pub observation_type: i32,
    #[prost(string, tag = "8")]
    pub name: String,
}

pub mod observation_proto {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum ObservationData {
        #[prost(bytes, tag = "3")]
        CompressedData(Vec<u8>),
        #[prost(message, tag = "4")]
        FloatData(super::FloatDataProto),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FloatDataProto {
    #[prost(float, repeated, tag = "1")]
    pub data: Vec<f32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnrealRlInputProto {
    #[prost(btree_map = "string, message", tag = "1")]
    pub agent_actions: BTreeMap<String, ListAgentActionProto>,
    #[prost(enumeration = "CommandProto", tag = "4")]
    pub command: i32,
    #[prost(bytes = "vec", tag = "5")]
    pub side_channel: Vec<u8>,
    #[prost(bool, tag = "6")]
    pub is_training: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListAgentActionProto {
    #[prost(message, repeated, tag = "1")]
    pub value: Vec<AgentActionProto>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentActionProto {
    #[prost(float, repeated, tag = "6")]
    pub continuous_actions: Vec<f32>,
    #[prost(int32, repeated, tag = "7")]
    pub discrete_actions: Vec<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum CommandProto {
    Step = 0,
    Reset = 1,
    Quit = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum CompressionTypeProto {
    None = 0,
    Png = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ObservationTypeProto {
    Default = 0,
    GoalSignal = 1,
}
