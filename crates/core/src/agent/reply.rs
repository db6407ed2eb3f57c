use std::fmt::{self, Debug};
use std::sync::Arc;

use async_trait::async_trait;
use colloquy_model::{Message, ModelRequest};

use super::{Agent, ConversableAgent, lock};
use crate::code::{execute_code, extract_code};
use crate::human::{self, HumanInputMode};
use crate::{Error, Result};

/// The outcome of one reply strategy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplyResult {
    /// Whether the chain stops here. A final result without a message
    /// means there is no reply.
    pub final_reply: bool,
    /// The reply, if any.
    pub message: Option<Message>,
}

impl ReplyResult {
    /// Lets the next strategy in the chain decide.
    #[inline]
    pub fn decline() -> Self {
        Self::default()
    }

    /// Stops the chain with `message` as the reply.
    #[inline]
    pub fn final_reply(message: Option<Message>) -> Self {
        Self {
            final_reply: true,
            message,
        }
    }
}

/// A custom reply strategy.
///
/// Strategies are registered with [`ConversableAgent::register_reply`] and
/// take precedence over the ones registered before them.
#[async_trait]
pub trait Reply: Send + Sync {
    /// Inspects the conversation of `agent` with `sender` and optionally
    /// produces the next reply.
    async fn reply(
        &self,
        agent: &ConversableAgent,
        sender: &dyn Agent,
        messages: &[Message],
    ) -> Result<ReplyResult>;
}

/// An entry of the reply strategy chain.
#[derive(Clone)]
pub enum ReplyStrategy {
    /// Stops on termination messages or when the auto-reply limit is
    /// reached, and asks a human according to the human input mode.
    CheckTerminationAndHumanReply,
    /// Runs the function call suggested by the last message.
    FunctionCall,
    /// Runs code blocks found in the recent messages.
    CodeExecution,
    /// Asks the model.
    ModelCompletion,
    /// A strategy registered by the user.
    Custom(Arc<dyn Reply>),
}

impl ReplyStrategy {
    /// The chain every agent starts with.
    pub fn default_chain() -> Vec<Self> {
        vec![
            Self::CheckTerminationAndHumanReply,
            Self::FunctionCall,
            Self::CodeExecution,
            Self::ModelCompletion,
        ]
    }
}

impl Debug for ReplyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CheckTerminationAndHumanReply => {
                f.write_str("CheckTerminationAndHumanReply")
            }
            Self::FunctionCall => f.write_str("FunctionCall"),
            Self::CodeExecution => f.write_str("CodeExecution"),
            Self::ModelCompletion => f.write_str("ModelCompletion"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

const NO_HUMAN_INPUT_MSG: &str = "NO HUMAN INPUT RECEIVED.";

impl ConversableAgent {
    pub(super) async fn run_strategy(
        &self,
        strategy: &ReplyStrategy,
        sender: &dyn Agent,
        messages: &[Message],
    ) -> Result<ReplyResult> {
        match strategy {
            ReplyStrategy::CheckTerminationAndHumanReply => {
                Ok(self.check_termination_and_human_reply(sender, messages).await)
            }
            ReplyStrategy::FunctionCall => Ok(self.function_call_reply(messages).await),
            ReplyStrategy::CodeExecution => Ok(self.code_execution_reply(messages).await),
            ReplyStrategy::ModelCompletion => self.model_completion_reply(messages).await,
            ReplyStrategy::Custom(reply) => reply.reply(self, sender, messages).await,
        }
    }

    async fn check_termination_and_human_reply(
        &self,
        sender: &dyn Agent,
        messages: &[Message],
    ) -> ReplyResult {
        let Some(last) = messages.last() else {
            return ReplyResult::decline();
        };
        let peer = sender.id();
        let terminate = self.is_termination_msg(last);
        let limit_reached =
            self.consecutive_auto_reply_count(peer) >= self.max_consecutive_auto_reply;

        let prompt = match self.human_input_mode {
            HumanInputMode::Always => Some(format!(
                "Provide feedback to {}. Press enter to skip and use auto-reply, \
                 or type 'exit' to end the conversation: ",
                sender.name()
            )),
            HumanInputMode::Terminate if terminate => Some(format!(
                "Please give feedback to {}. Press enter or type 'exit' to stop \
                 the conversation: ",
                sender.name()
            )),
            HumanInputMode::Terminate if limit_reached => Some(format!(
                "Please give feedback to {}. Press enter to skip and use \
                 auto-reply, or type 'exit' to stop the conversation: ",
                sender.name()
            )),
            HumanInputMode::Never if terminate || limit_reached => {
                debug!("{} stops replying to {}", self.name, sender.name());
                self.reset_consecutive_auto_reply_counter(Some(peer));
                return ReplyResult::final_reply(None);
            }
            _ => None,
        };

        if let Some(prompt) = prompt {
            let input = human::ask(self.on_human_input.clone(), &self.name, prompt).await;
            match input.as_deref() {
                Some("exit") => {
                    self.reset_consecutive_auto_reply_counter(Some(peer));
                    return ReplyResult::final_reply(None);
                }
                Some(input) => {
                    self.reset_consecutive_auto_reply_counter(Some(peer));
                    return ReplyResult::final_reply(Some(Message::user(input)));
                }
                None => {
                    info!("{NO_HUMAN_INPUT_MSG}");
                    if terminate {
                        self.reset_consecutive_auto_reply_counter(Some(peer));
                        return ReplyResult::final_reply(None);
                    }
                    if limit_reached {
                        return ReplyResult::final_reply(self.default_auto_reply());
                    }
                }
            }
        }

        *lock(&self.auto_reply_counts).entry(peer).or_default() += 1;
        ReplyResult::decline()
    }

    async fn function_call_reply(&self, messages: &[Message]) -> ReplyResult {
        let Some(call) = messages.last().and_then(|m| m.function_call.as_ref()) else {
            return ReplyResult::decline();
        };
        let functions = lock(&self.functions).clone();
        let message = functions.call(call).await;
        ReplyResult::final_reply(Some(message))
    }

    async fn code_execution_reply(&self, messages: &[Message]) -> ReplyResult {
        let Some(config) = &self.code_execution else {
            return ReplyResult::decline();
        };

        let recent = messages.iter().rev().take(config.last_n_messages());
        for message in recent {
            let Some(content) = message.content.as_deref() else {
                continue;
            };
            let blocks = extract_code(content, false);
            let runnable = blocks
                .iter()
                .any(|block| config.resolve(block.language()).is_some());
            if !runnable {
                continue;
            }

            let result = execute_code(&blocks, config).await;
            let status = if result.succeeded() {
                "execution succeeded"
            } else {
                "execution failed"
            };
            let content = format!(
                "exitcode: {} ({status})\nCode output: {}",
                result.exit_code, result.output
            );
            return ReplyResult::final_reply(Some(Message::user(content)));
        }

        trace!("no runnable code in the last {} messages", config.last_n_messages());
        ReplyResult::decline()
    }

    async fn model_completion_reply(&self, messages: &[Message]) -> Result<ReplyResult> {
        let Some(model_client) = &self.model_client else {
            return Ok(ReplyResult::decline());
        };

        let mut request_messages = Vec::with_capacity(messages.len() + 1);
        request_messages.push(Message::system(self.system_message()));
        request_messages.extend_from_slice(messages);
        let functions = lock(&self.functions).definitions();
        let req = ModelRequest {
            messages: request_messages,
            functions,
        };

        let message = model_client.complete(req).await.map_err(Error::model)?;
        Ok(ReplyResult::final_reply(Some(message)))
    }
}
