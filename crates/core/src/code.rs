//! Extracting code blocks from free text and running them.
//!
//! Both operations are plain functions taking all of their configuration
//! as parameters, there is no process-wide state.

mod config;
mod execute;
mod extract;

pub use config::{CodeExecutionConfig, CodeExecutionConfigBuilder, Language};
pub use execute::{
    CodeExecutionResult, TIMEOUT_EXIT_CODE, code_file_name, execute_code,
};
pub use extract::extract_code;

/// A snippet of source text found in a message.
///
/// Blocks are only produced by [`extract_code`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CodeBlock {
    language: Option<String>,
    source: String,
}

impl CodeBlock {
    /// Returns the language tag of the opening fence, if any.
    #[inline]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Returns the body of the block.
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }
}
