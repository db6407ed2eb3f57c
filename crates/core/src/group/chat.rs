use std::collections::HashSet;
use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use colloquy_model::Message;

use super::{RoundRobin, SpeakerSelector};
use crate::{Agent, AgentId, Error, Result};

/// A roster of agents sharing one transcript.
pub struct GroupChat {
    admin_name: String,
    agents: Vec<Arc<dyn Agent>>,
    messages: Mutex<Vec<Message>>,
    max_round: usize,
    allow_repeat_speaker: bool,
    selector: Arc<dyn SpeakerSelector>,
}

impl GroupChat {
    /// Returns a builder with an empty roster.
    #[inline]
    pub fn builder() -> GroupChatBuilder {
        GroupChatBuilder::default()
    }

    /// Returns the name of the chat admin.
    #[inline]
    pub fn admin_name(&self) -> &str {
        &self.admin_name
    }

    /// Returns the roster, in speaking order.
    #[inline]
    pub fn agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }

    /// Returns the names of the roster members.
    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(|agent| agent.name()).collect()
    }

    /// Returns the first member named `name`.
    pub fn agent_by_name(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents
            .iter()
            .find(|agent| agent.name() == name)
            .cloned()
    }

    /// Returns the maximum number of messages per chat.
    #[inline]
    pub fn max_round(&self) -> usize {
        self.max_round
    }

    /// Returns whether a member may speak twice in a row.
    #[inline]
    pub fn allow_repeat_speaker(&self) -> bool {
        self.allow_repeat_speaker
    }

    /// Returns a copy of the transcript.
    #[inline]
    pub fn messages(&self) -> Vec<Message> {
        self.lock_messages().clone()
    }

    /// Appends a message to the transcript.
    #[inline]
    pub fn append(&self, message: Message) {
        self.lock_messages().push(message);
    }

    /// Clears the transcript.
    #[inline]
    pub fn reset(&self) {
        self.lock_messages().clear();
    }

    /// Returns the member after `agent` in roster order, wrapping around.
    /// An agent outside the roster is followed by the first member.
    pub fn next_agent(&self, agent: AgentId) -> Arc<dyn Agent> {
        let next = self
            .agents
            .iter()
            .position(|member| member.id() == agent)
            .map_or(0, |index| (index + 1) % self.agents.len());
        Arc::clone(&self.agents[next])
    }

    /// Selects who speaks after `last_speaker`.
    ///
    /// When repeats are not allowed, the selector's choice is replaced by
    /// the round-robin successor if it is `last_speaker` again.
    pub async fn select_speaker(&self, last_speaker: AgentId) -> Result<Arc<dyn Agent>> {
        if !self.allow_repeat_speaker && self.agents.len() < 2 {
            return Err(Error::invalid_config().with_reason(
                "at least two agents are needed when repeating speakers is not allowed",
            ));
        }

        let speaker = self.selector.select(self, last_speaker).await?;
        if !self.allow_repeat_speaker && speaker.id() == last_speaker {
            debug!("{} cannot speak twice in a row", speaker.name());
            return Ok(self.next_agent(last_speaker));
        }
        Ok(speaker)
    }

    #[inline]
    fn lock_messages(&self) -> MutexGuard<'_, Vec<Message>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for GroupChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupChat")
            .field("admin_name", &self.admin_name)
            .field("agents", &self.agent_names())
            .field("max_round", &self.max_round)
            .field("allow_repeat_speaker", &self.allow_repeat_speaker)
            .finish_non_exhaustive()
    }
}

/// [`GroupChat`] builder.
pub struct GroupChatBuilder {
    admin_name: String,
    agents: Vec<Arc<dyn Agent>>,
    max_round: usize,
    allow_repeat_speaker: bool,
    selector: Option<Arc<dyn SpeakerSelector>>,
}

impl Default for GroupChatBuilder {
    fn default() -> Self {
        Self {
            admin_name: "Admin".to_owned(),
            agents: vec![],
            max_round: 10,
            allow_repeat_speaker: true,
            selector: None,
        }
    }
}

impl GroupChatBuilder {
    /// Sets the name of the chat admin.
    #[inline]
    pub fn with_admin_name<S: Into<String>>(mut self, admin_name: S) -> Self {
        self.admin_name = admin_name.into();
        self
    }

    /// Adds a member at the end of the roster.
    #[inline]
    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    /// Sets the maximum number of messages per chat.
    #[inline]
    pub fn with_max_round(mut self, max_round: usize) -> Self {
        self.max_round = max_round;
        self
    }

    /// Sets whether a member may speak twice in a row.
    #[inline]
    pub fn allow_repeat_speaker(mut self, allow: bool) -> Self {
        self.allow_repeat_speaker = allow;
        self
    }

    /// Sets how the next speaker is selected. Defaults to [`RoundRobin`].
    #[inline]
    pub fn with_speaker_selector<S: SpeakerSelector + 'static>(mut self, selector: S) -> Self {
        self.selector = Some(Arc::new(selector));
        self
    }

    /// Validates and builds the chat.
    pub fn build(self) -> Result<GroupChat> {
        if self.agents.is_empty() {
            return Err(Error::invalid_config().with_reason("the roster is empty"));
        }
        if self.max_round == 0 {
            return Err(Error::invalid_config().with_reason("`max_round` must be at least 1"));
        }
        let mut ids = HashSet::new();
        for agent in &self.agents {
            if !ids.insert(agent.id()) {
                return Err(Error::invalid_config()
                    .with_reason(format!("{} joins the roster twice", agent.name())));
            }
        }

        let selector: Arc<dyn SpeakerSelector> = match self.selector {
            Some(selector) => selector,
            None => Arc::new(RoundRobin),
        };
        Ok(GroupChat {
            admin_name: self.admin_name,
            agents: self.agents,
            messages: Mutex::new(vec![]),
            max_round: self.max_round,
            allow_repeat_speaker: self.allow_repeat_speaker,
            selector,
        })
    }
}
