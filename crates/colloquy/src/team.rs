use std::path::PathBuf;
use std::sync::Arc;

use colloquy_core::code::CodeExecutionConfig;
use colloquy_core::group::{GroupChat, GroupChatManager};
use colloquy_core::{
    ConversableAgent, ConversableAgentBuilder, HumanInputMode, HumanInputRequest, Result,
    TranscriptRecord,
};
use colloquy_model::{Message, ModelProvider};

use crate::functions::ListFiles;

type TranscriptFn = Arc<dyn Fn(&TranscriptRecord) + Send + Sync>;
type HumanInputFn = Arc<dyn Fn(HumanInputRequest) + Send + Sync>;

/// A team builder.
///
/// See [`Team`].
pub struct TeamBuilder<P> {
    provider: P,
    work_dir: PathBuf,
    max_round: usize,
    on_transcript: Option<TranscriptFn>,
    on_human_input: Option<HumanInputFn>,
}

impl<P: ModelProvider + Clone + 'static> TeamBuilder<P> {
    /// Creates a team builder with a specified model provider, shared by
    /// the model-backed members.
    pub fn with_model_provider(provider: P) -> Self {
        Self {
            provider,
            work_dir: PathBuf::from("data/group_chat"),
            max_round: 12,
            on_transcript: None,
            on_human_input: None,
        }
    }

    /// Sets the directory code is executed in.
    #[inline]
    pub fn with_work_dir<D: Into<PathBuf>>(mut self, work_dir: D) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Sets the maximum number of messages in the group chat.
    #[inline]
    pub fn with_max_round(mut self, max_round: usize) -> Self {
        self.max_round = max_round;
        self
    }

    /// Attaches a callback to be invoked for every visible message.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&TranscriptRecord) + Send + Sync + 'static,
    ) -> Self {
        self.on_transcript = Some(Arc::new(on_transcript));
        self
    }

    /// Attaches a callback to be invoked when the user proxy needs input.
    #[inline]
    pub fn on_human_input(
        mut self,
        on_human_input: impl Fn(HumanInputRequest) + Send + Sync + 'static,
    ) -> Self {
        self.on_human_input = Some(Arc::new(on_human_input));
        self
    }

    /// Builds a new team.
    pub fn build(self) -> Result<Team> {
        let code_execution = CodeExecutionConfig::builder()
            .with_work_dir(&self.work_dir)
            .with_last_n_messages(2)
            .build()?;

        let mut user_proxy = ConversableAgentBuilder::user_proxy("User_proxy")
            .with_system_message("A human admin.")
            .with_human_input_mode(HumanInputMode::Terminate)
            .with_code_execution(code_execution)
            .with_function(ListFiles::new(&self.work_dir));
        if let Some(on_human_input) = &self.on_human_input {
            let on_human_input = Arc::clone(on_human_input);
            user_proxy = user_proxy.on_human_input(move |req| on_human_input(req));
        }
        let user_proxy = Arc::new(self.attach_transcript(user_proxy).build()?);

        let coder = ConversableAgentBuilder::assistant("Coder")
            .with_model_provider(self.provider.clone());
        let coder = Arc::new(self.attach_transcript(coder).build()?);

        let product_manager = ConversableAgentBuilder::assistant("Product_manager")
            .with_system_message("Creative in software product ideas.")
            .with_model_provider(self.provider.clone());
        let product_manager = Arc::new(self.attach_transcript(product_manager).build()?);

        let chat = GroupChat::builder()
            .with_agent(user_proxy.clone())
            .with_agent(coder)
            .with_agent(product_manager)
            .with_max_round(self.max_round)
            .build()?;
        let manager_builder = self.attach_transcript(GroupChatManager::builder());
        let manager = GroupChatManager::new(Arc::new(chat), manager_builder)?;

        Ok(Team {
            user_proxy,
            manager,
        })
    }

    fn attach_transcript(&self, builder: ConversableAgentBuilder) -> ConversableAgentBuilder {
        match &self.on_transcript {
            Some(on_transcript) => {
                let on_transcript = Arc::clone(on_transcript);
                builder.on_transcript(move |record| on_transcript(record))
            }
            None => builder,
        }
    }
}

/// A ready-made group chat: a user proxy that runs code on behalf of the
/// human, a coder, and a product manager, all coordinated by a manager.
pub struct Team {
    user_proxy: Arc<ConversableAgent>,
    manager: GroupChatManager,
}

impl Team {
    /// Starts the group chat with a task, and returns when it ends.
    pub async fn run<S: Into<String>>(&self, task: S) -> Result<()> {
        self.manager.chat().reset();
        self.user_proxy
            .initiate_chat(&self.manager, Message::user(task))
            .await
    }

    /// Returns the transcript of the group chat.
    #[inline]
    pub fn messages(&self) -> Vec<Message> {
        self.manager.chat().messages()
    }

    /// Returns the agent acting for the human.
    #[inline]
    pub fn user_proxy(&self) -> &ConversableAgent {
        &self.user_proxy
    }

    /// Returns the manager of the group chat.
    #[inline]
    pub fn manager(&self) -> &GroupChatManager {
        &self.manager
    }
}
