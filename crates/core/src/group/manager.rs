use std::sync::Arc;

use async_trait::async_trait;
use colloquy_model::Message;

use super::GroupChat;
use crate::agent::{ConversableAgentBuilder, Reply, ReplyResult};
use crate::{Agent, AgentId, ConversableAgent, Result};

/// An agent that runs a [`GroupChat`].
///
/// A message sent to the manager starts a chat: the manager forwards it to
/// the other members, asks the selected speaker for the next message, and
/// repeats until a message ends the conversation, a speaker has nothing to
/// say, or the round limit is reached. A last message that the agent who
/// started the chat has not seen yet is delivered to it without asking for
/// a reply, so the round limit bounds the whole conversation.
pub struct GroupChatManager {
    agent: ConversableAgent,
    chat: Arc<GroupChat>,
}

impl GroupChatManager {
    /// Returns a builder with the manager defaults: it never asks a human
    /// and has no practical auto-reply limit.
    pub fn builder() -> ConversableAgentBuilder {
        ConversableAgentBuilder::new("chat_manager")
            .with_system_message("Group chat manager.")
            .with_max_consecutive_auto_reply(usize::MAX)
    }

    /// Creates a manager running `chat`, with the agent built from
    /// `builder`.
    pub fn new(chat: Arc<GroupChat>, builder: ConversableAgentBuilder) -> Result<Self> {
        let agent = builder.build()?;
        agent.register_reply(RunChat {
            chat: Arc::clone(&chat),
        });
        Ok(Self { agent, chat })
    }

    /// Returns the chat this manager runs.
    #[inline]
    pub fn chat(&self) -> &Arc<GroupChat> {
        &self.chat
    }

    /// Returns the underlying agent, which holds the manager's histories
    /// with every member.
    #[inline]
    pub fn agent(&self) -> &ConversableAgent {
        &self.agent
    }
}

#[async_trait]
impl Agent for GroupChatManager {
    #[inline]
    fn id(&self) -> AgentId {
        self.agent.id()
    }

    #[inline]
    fn name(&self) -> &str {
        self.agent.name()
    }

    async fn send(
        &self,
        recipient: &dyn Agent,
        message: Message,
        request_reply: bool,
        silent: bool,
    ) -> Result<()> {
        self.agent
            .send(recipient, message, request_reply, silent)
            .await
    }

    async fn receive(
        &self,
        sender: &dyn Agent,
        message: Message,
        request_reply: bool,
        silent: bool,
    ) -> Result<()> {
        self.agent
            .receive(sender, message, request_reply, silent)
            .await
    }

    async fn generate_reply(&self, sender: &dyn Agent) -> Result<Option<Message>> {
        self.agent.generate_reply(sender).await
    }
}

/// The reply strategy running the broadcast loop.
struct RunChat {
    chat: Arc<GroupChat>,
}

#[async_trait]
impl Reply for RunChat {
    async fn reply(
        &self,
        manager: &ConversableAgent,
        sender: &dyn Agent,
        messages: &[Message],
    ) -> Result<ReplyResult> {
        let Some(message) = messages.last() else {
            return Ok(ReplyResult::decline());
        };
        let chat = &self.chat;
        let max_round = chat.max_round();
        let mut message = message.clone();
        let mut speaker_id = sender.id();
        let mut speaker_name = sender.name().to_owned();
        let mut broadcast = false;

        for round in 0..max_round {
            if !message.is_function() {
                message.name = Some(speaker_name.clone());
            }
            chat.append(message.clone());

            if manager.is_termination_msg(&message) {
                debug!("round {round}: {speaker_name} ended the chat");
                break;
            }
            if round + 1 == max_round {
                debug!("round {round}: reached the round limit");
                break;
            }

            for member in chat.agents() {
                if member.id() != speaker_id {
                    manager
                        .send(member.as_ref(), message.clone(), false, true)
                        .await?;
                }
            }
            broadcast = true;

            let speaker = chat.select_speaker(speaker_id).await?;
            trace!("round {round}: {} speaks next", speaker.name());
            let Some(reply) = speaker.generate_reply(manager).await? else {
                debug!("round {round}: {} has nothing to say", speaker.name());
                break;
            };
            speaker.send(manager, reply, false, false).await?;

            message = manager.last_message(speaker.id())?;
            speaker_id = speaker.id();
            speaker_name = speaker.name().to_owned();
            broadcast = false;
        }

        if !broadcast && speaker_id != sender.id() {
            manager.send(sender, message, false, false).await?;
        }
        Ok(ReplyResult::final_reply(None))
    }
}
