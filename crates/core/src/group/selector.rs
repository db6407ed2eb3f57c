use std::sync::Arc;

use async_trait::async_trait;
use colloquy_model::{Message, ModelProvider, ModelRequest};
use regex::Regex;

use super::GroupChat;
use crate::model_client::ModelClient;
use crate::{Agent, AgentId, Error, Result};

/// Decides who speaks next in a group chat.
#[async_trait]
pub trait SpeakerSelector: Send + Sync {
    /// Returns the member that speaks after `last_speaker`.
    ///
    /// The chat replaces a repeated speaker afterwards if repeats are not
    /// allowed, implementations don't need to check it.
    async fn select(&self, chat: &GroupChat, last_speaker: AgentId) -> Result<Arc<dyn Agent>>;
}

/// Selects members in roster order.
#[derive(Clone, Copy, Debug, Default)]
pub struct RoundRobin;

#[async_trait]
impl SpeakerSelector for RoundRobin {
    async fn select(&self, chat: &GroupChat, last_speaker: AgentId) -> Result<Arc<dyn Agent>> {
        Ok(chat.next_agent(last_speaker))
    }
}

/// Asks a model to pick the next speaker from the transcript.
///
/// The answer is matched against the member names. If it names no member,
/// or more than one, the round-robin successor is selected instead.
#[derive(Clone)]
pub struct ModelSelector {
    model_client: ModelClient,
    roles: Vec<(String, String)>,
}

impl ModelSelector {
    /// Creates a selector asking `provider`.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            roles: vec![],
        }
    }

    /// Describes the role of the member named `name` to the model.
    #[inline]
    pub fn with_role<N, D>(mut self, name: N, description: D) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        self.roles.push((name.into(), description.into()));
        self
    }

    fn system_message(&self, chat: &GroupChat) -> String {
        let roles = chat
            .agent_names()
            .into_iter()
            .map(|name| {
                let description = self
                    .roles
                    .iter()
                    .find(|(role, _)| role == name)
                    .map(|(_, description)| description.as_str())
                    .unwrap_or_default();
                format!("{name}: {description}")
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "You are in a role play game. The following roles are available:\n\
             {roles}.\n\n\
             Read the following conversation.\n\
             Then select the next role from {:?} to play. Only return the role.",
            chat.agent_names()
        )
    }
}

#[async_trait]
impl SpeakerSelector for ModelSelector {
    async fn select(&self, chat: &GroupChat, last_speaker: AgentId) -> Result<Arc<dyn Agent>> {
        let mut messages = vec![Message::system(self.system_message(chat))];
        messages.extend(chat.messages());
        messages.push(Message::system(format!(
            "Read the above conversation. Then select the next role from {:?} to play. \
             Only return the role.",
            chat.agent_names()
        )));
        let req = ModelRequest {
            messages,
            functions: vec![],
        };
        let answer = self.model_client.complete(req).await.map_err(Error::model)?;

        let answer = answer.text();
        let mut mentioned = chat
            .agents()
            .iter()
            .filter(|agent| mentions(answer, agent.name()));
        match (mentioned.next(), mentioned.next()) {
            (Some(agent), None) => Ok(Arc::clone(agent)),
            _ => {
                warn!("cannot tell the next speaker from: {answer}");
                Ok(chat.next_agent(last_speaker))
            }
        }
    }
}

fn mentions(text: &str, name: &str) -> bool {
    let pattern = format!(r"(?:^|\W){}(?:\W|$)", regex::escape(name));
    Regex::new(&pattern).is_ok_and(|re| re.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mentions() {
        assert!(mentions("coder", "coder"));
        assert!(mentions("I think Product_manager.", "Product_manager"));
        assert!(!mentions("the coders", "coder"));
        assert!(mentions("a.b next", "a.b"));
    }
}
