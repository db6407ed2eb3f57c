//! A ready-made multi-agent team built on conversable agents.
//!
//! The crate includes a CLI tool that runs the team in the terminal. You
//! can also use it as a library and assemble your own agents with the
//! re-exported [`core`] crate.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod functions;
mod team;

pub use team::{Team, TeamBuilder};

/// Re-exports of [`colloquy_core`] crate.
pub mod core {
    pub use colloquy_core::*;
}
