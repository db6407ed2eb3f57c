//! Core logic including the agent reply pipeline, group chats, function
//! calls and code execution.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod code;
pub mod conversation;
mod error;
pub mod function;
pub mod group;
mod human;
mod model_client;
mod transcript;

pub use agent::{
    Agent, AgentId, ConversableAgent, ConversableAgentBuilder,
    DEFAULT_ASSISTANT_SYSTEM_MESSAGE, Reply, ReplyResult, ReplyStrategy,
    TerminationPredicate,
};
pub use error::{Error, ErrorKind, Result};
pub use human::{HumanInputMode, HumanInputRequest};
pub use transcript::TranscriptRecord;
