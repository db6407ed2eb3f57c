//! An abstraction layer for different LLMs.
//!
//! This crate establishes an unified protocol for agents to interact
//! with various completion services, so that an agent can seamlessly
//! switch between them without modifying the core codebase.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to. The [`Message`]
//! type doubles as the record shape agents keep in their histories.

#![deny(missing_docs)]

mod error;
mod message;
mod provider;
mod request;
mod response;

pub use error::*;
pub use message::*;
pub use provider::*;
pub use request::*;
pub use response::*;
