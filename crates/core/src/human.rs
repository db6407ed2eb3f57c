//! Human participation in a conversation.

use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use tokio::sync::oneshot;

/// When an agent asks a human before replying.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HumanInputMode {
    /// Ask every time a message is received.
    Always,
    /// Ask only when a termination message is received or the
    /// consecutive auto-reply limit is reached.
    Terminate,
    /// Never ask. The conversation stops when a termination message is
    /// received or the consecutive auto-reply limit is reached.
    #[default]
    Never,
}

pub(crate) type HumanInputHandler = Arc<dyn Fn(HumanInputRequest) + Send + Sync>;

/// A request for human input.
///
/// The request must be answered with [`respond`] or [`skip`]. Dropping it
/// without an answer is the same as skipping.
///
/// [`respond`]: HumanInputRequest::respond
/// [`skip`]: HumanInputRequest::skip
pub struct HumanInputRequest {
    agent: String,
    prompt: String,
    on_result: Option<oneshot::Sender<Option<String>>>,
}

impl HumanInputRequest {
    /// Returns the name of the agent asking for input.
    #[inline]
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Returns the prompt to show to the human.
    #[inline]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Answers the request. Typing `exit` stops the conversation, an empty
    /// string is treated like [`skip`](Self::skip).
    #[inline]
    pub fn respond<S: Into<String>>(mut self, input: S) {
        if let Some(on_result) = self.on_result.take() {
            on_result.send(Some(input.into())).ok();
        }
    }

    /// Gives no input, letting the agent decide on its own.
    #[inline]
    pub fn skip(mut self) {
        if let Some(on_result) = self.on_result.take() {
            on_result.send(None).ok();
        }
    }
}

impl Debug for HumanInputRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HumanInputRequest")
            .field("agent", &self.agent)
            .field("prompt", &self.prompt)
            .finish_non_exhaustive()
    }
}

impl Display for HumanInputRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.agent, self.prompt)
    }
}

/// Asks the human through `handler` and waits for the answer.
///
/// Returns `None` when there is no handler, or the human gave nothing.
pub(crate) async fn ask(
    handler: Option<HumanInputHandler>,
    agent: &str,
    prompt: String,
) -> Option<String> {
    let handler = handler?;
    let (tx, rx) = oneshot::channel();
    handler(HumanInputRequest {
        agent: agent.to_owned(),
        prompt,
        on_result: Some(tx),
    });
    let input = rx.await.ok().flatten()?;
    let input = input.trim();
    if input.is_empty() {
        None
    } else {
        Some(input.to_owned())
    }
}
