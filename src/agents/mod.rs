pub mod agent;
pub mod agent_info;
pub mod decision_requester;
pub mod episode_id_counter;

pub use agent::{Agent, DoneReason};
pub use agent_info::AgentInfo;
pub use decision_requester::DecisionRequester;
pub use episode_id_counter::EpisodeIdCounter;
