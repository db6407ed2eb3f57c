//! Conversations between more than two agents.
//!
//! A [`GroupChatManager`] sits between the members of a [`GroupChat`]. It
//! keeps the shared transcript, forwards every message to the members, and
//! picks who speaks next.

mod chat;
mod manager;
mod selector;

pub use chat::{GroupChat, GroupChatBuilder};
pub use manager::GroupChatManager;
pub use selector::{ModelSelector, RoundRobin, SpeakerSelector};
