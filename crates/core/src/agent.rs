mod builder;
mod reply;

use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use colloquy_model::{Message, Role};
use tracing::Instrument;

use crate::code::CodeExecutionConfig;
use crate::conversation::Conversations;
use crate::function::{Function, FunctionObjectImpl, Registry};
use crate::human::{HumanInputHandler, HumanInputMode};
use crate::model_client::ModelClient;
use crate::transcript::{TranscriptHandler, TranscriptRecord};
use crate::{Error, Result};
pub use builder::{ConversableAgentBuilder, DEFAULT_ASSISTANT_SYSTEM_MESSAGE};
pub use reply::{Reply, ReplyResult, ReplyStrategy};

/// The identity of an agent.
///
/// Ids are unique within a process. Agents are compared and keyed by id,
/// never by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentId(u64);

impl AgentId {
    /// Allocates a new unique id.
    #[inline]
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A participant that can exchange messages and produce replies.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the identity of the agent.
    fn id(&self) -> AgentId;

    /// Returns the display name of the agent.
    fn name(&self) -> &str;

    /// Sends `message` to `recipient`, which receives it before this
    /// method returns.
    async fn send(
        &self,
        recipient: &dyn Agent,
        message: Message,
        request_reply: bool,
        silent: bool,
    ) -> Result<()>;

    /// Receives `message` from `sender`, replying to it when
    /// `request_reply` is set.
    async fn receive(
        &self,
        sender: &dyn Agent,
        message: Message,
        request_reply: bool,
        silent: bool,
    ) -> Result<()>;

    /// Produces the next reply to `sender`, based on the conversation
    /// with it so far.
    async fn generate_reply(&self, sender: &dyn Agent) -> Result<Option<Message>>;
}

/// The predicate deciding whether a message ends the conversation.
pub type TerminationPredicate = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

/// An agent that replies through a chain of strategies.
///
/// For every message that asks for a reply, the strategies are evaluated in
/// order and the first final result wins. The default chain checks for
/// termination and human input, then runs a suggested function call, then
/// executes code found in recent messages, and finally asks the model.
/// [`register_reply`] puts a custom strategy in front of all others.
///
/// The agent keeps one history per peer. Roles in a history are relative to
/// this agent: what it sent is `assistant`, what it received is `user`.
///
/// # Concurrency
///
/// An agent is expected to take at most one turn at a time. Concurrent
/// turns don't corrupt the histories, but how their messages interleave is
/// unspecified.
///
/// [`register_reply`]: ConversableAgent::register_reply
pub struct ConversableAgent {
    id: AgentId,
    name: String,
    system_message: Mutex<String>,
    model_client: Option<ModelClient>,
    functions: Mutex<Registry>,
    code_execution: Option<CodeExecutionConfig>,
    human_input_mode: HumanInputMode,
    is_termination_msg: TerminationPredicate,
    max_consecutive_auto_reply: usize,
    default_auto_reply: String,
    on_human_input: Option<HumanInputHandler>,
    on_transcript: Option<TranscriptHandler>,
    conversations: Mutex<Conversations>,
    auto_reply_counts: Mutex<HashMap<AgentId, usize>>,
    replies: Mutex<Vec<ReplyStrategy>>,
}

impl ConversableAgent {
    /// Returns a builder for an agent named `name`.
    #[inline]
    pub fn builder<S: Into<String>>(name: S) -> ConversableAgentBuilder {
        ConversableAgentBuilder::new(name)
    }

    /// Returns the current system message.
    #[inline]
    pub fn system_message(&self) -> String {
        lock(&self.system_message).clone()
    }

    /// Replaces the system message used for later model requests.
    #[inline]
    pub fn update_system_message<S: Into<String>>(&self, system_message: S) {
        *lock(&self.system_message) = system_message.into();
    }

    /// Returns the human input mode of this agent.
    #[inline]
    pub fn human_input_mode(&self) -> HumanInputMode {
        self.human_input_mode
    }

    /// Returns `true` if `message` would end the conversation.
    #[inline]
    pub fn is_termination_msg(&self, message: &Message) -> bool {
        (self.is_termination_msg)(message)
    }

    /// Puts `reply` in front of the strategy chain.
    pub fn register_reply<R: Reply + 'static>(&self, reply: R) {
        lock(&self.replies).insert(0, ReplyStrategy::Custom(Arc::new(reply)));
    }

    /// Returns a snapshot of the strategy chain, in evaluation order.
    #[inline]
    pub fn reply_strategies(&self) -> Vec<ReplyStrategy> {
        lock(&self.replies).clone()
    }

    /// Registers a function that models can suggest calling, replacing a
    /// registered one with the same name.
    pub fn register_function<F: Function>(&self, function: F) {
        lock(&self.functions).insert(Arc::new(FunctionObjectImpl(function)));
    }

    /// Returns `true` if a function named `name` is registered.
    #[inline]
    pub fn can_execute_function(&self, name: &str) -> bool {
        lock(&self.functions).contains(name)
    }

    /// Returns the messages exchanged with `peer`.
    ///
    /// Fails with [`ErrorKind::UnknownAgent`] if they never conversed.
    ///
    /// [`ErrorKind::UnknownAgent`]: crate::ErrorKind::UnknownAgent
    pub fn chat_messages(&self, peer: AgentId) -> Result<Vec<Message>> {
        lock(&self.conversations)
            .get(peer)
            .map(<[Message]>::to_vec)
            .ok_or_else(|| unknown_peer(peer))
    }

    /// Returns the last message exchanged with `peer`.
    ///
    /// Fails with [`ErrorKind::UnknownAgent`] if they never conversed.
    ///
    /// [`ErrorKind::UnknownAgent`]: crate::ErrorKind::UnknownAgent
    pub fn last_message(&self, peer: AgentId) -> Result<Message> {
        lock(&self.conversations)
            .last(peer)
            .cloned()
            .ok_or_else(|| unknown_peer(peer))
    }

    /// Returns a copy of every history this agent holds.
    #[inline]
    pub fn conversations(&self) -> Conversations {
        lock(&self.conversations).clone()
    }

    /// Forgets the history with `peer`, or with everyone if `None`.
    pub fn clear_history(&self, peer: Option<AgentId>) {
        lock(&self.conversations).clear(peer);
        match peer {
            Some(peer) => {
                lock(&self.auto_reply_counts).remove(&peer);
            }
            None => lock(&self.auto_reply_counts).clear(),
        }
    }

    /// Resets the consecutive auto-reply counter for `peer`, or for
    /// everyone if `None`.
    pub fn reset_consecutive_auto_reply_counter(&self, peer: Option<AgentId>) {
        let mut counts = lock(&self.auto_reply_counts);
        match peer {
            Some(peer) => {
                counts.remove(&peer);
            }
            None => counts.clear(),
        }
    }

    /// Returns how many automatic replies have been sent to `peer` since
    /// the last human input.
    #[inline]
    pub fn consecutive_auto_reply_count(&self, peer: AgentId) -> usize {
        lock(&self.auto_reply_counts)
            .get(&peer)
            .copied()
            .unwrap_or_default()
    }

    /// Starts a conversation by sending `message` to `recipient` and
    /// asking for a reply.
    ///
    /// The conversation goes back and forth until one side stops replying.
    pub async fn initiate_chat<M>(&self, recipient: &dyn Agent, message: M) -> Result<()>
    where
        M: Into<Message>,
    {
        self.reset_consecutive_auto_reply_counter(Some(recipient.id()));
        let message = message.into();
        info!("{} starts a chat with {}", self.name, recipient.name());
        self.send(recipient, message, true, false).await
    }

    fn emit_transcript(&self, sender: &dyn Agent, message: &Message) {
        let record = TranscriptRecord {
            sender: sender.name().to_owned(),
            recipient: self.name.clone(),
            message: message.clone(),
        };
        match &self.on_transcript {
            Some(on_transcript) => on_transcript(&record),
            None => info!("\n{record}"),
        }
    }

    async fn generate_reply_with(&self, sender: &dyn Agent) -> Result<Option<Message>> {
        let messages = lock(&self.conversations)
            .get(sender.id())
            .map(<[Message]>::to_vec)
            .unwrap_or_default();

        // Strategies may register new ones, so the chain is snapshotted.
        let strategies = self.reply_strategies();
        for strategy in strategies {
            let result = self.run_strategy(&strategy, sender, &messages).await?;
            if result.final_reply {
                trace!("{strategy:?} gave the final reply");
                return Ok(result.message);
            }
        }

        debug!("no strategy gave a final reply");
        Ok(self.default_auto_reply())
    }

    fn default_auto_reply(&self) -> Option<Message> {
        if self.default_auto_reply.is_empty() {
            None
        } else {
            Some(Message::user(self.default_auto_reply.clone()))
        }
    }
}

impl Debug for ConversableAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversableAgent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("human_input_mode", &self.human_input_mode)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Agent for ConversableAgent {
    #[inline]
    fn id(&self) -> AgentId {
        self.id
    }

    #[inline]
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(
        &self,
        recipient: &dyn Agent,
        message: Message,
        request_reply: bool,
        silent: bool,
    ) -> Result<()> {
        if message.content.is_none() && message.function_call.is_none() {
            return Err(Error::invalid_config().with_reason(
                "a message must have content or a function call",
            ));
        }
        lock(&self.conversations).record(recipient.id(), &message, Role::Assistant);
        recipient.receive(self, message, request_reply, silent).await
    }

    async fn receive(
        &self,
        sender: &dyn Agent,
        message: Message,
        request_reply: bool,
        silent: bool,
    ) -> Result<()> {
        lock(&self.conversations).record(sender.id(), &message, Role::User);
        if !silent {
            self.emit_transcript(sender, &message);
        }
        if !request_reply {
            return Ok(());
        }

        if let Some(reply) = self.generate_reply(sender).await? {
            self.send(sender, reply, true, false).await?;
        }
        Ok(())
    }

    async fn generate_reply(&self, sender: &dyn Agent) -> Result<Option<Message>> {
        let span = debug_span!("generate reply", agent = %self.name, sender = %sender.name());
        self.generate_reply_with(sender).instrument(span).await
    }
}

#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unknown_peer(peer: AgentId) -> Error {
    Error::unknown_agent().with_reason(format!("no conversation with agent {peer}"))
}
