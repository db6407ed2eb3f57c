use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use colloquy_model::{Message, ModelProvider};

use super::{AgentId, ConversableAgent, ReplyStrategy, TerminationPredicate};
use crate::code::CodeExecutionConfig;
use crate::conversation::Conversations;
use crate::function::{Function, FunctionObject, FunctionObjectImpl, Registry};
use crate::human::{HumanInputHandler, HumanInputMode, HumanInputRequest};
use crate::model_client::ModelClient;
use crate::transcript::{TranscriptHandler, TranscriptRecord};
use crate::{Error, Result};

const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful AI assistant.";

/// The system message of agents built with
/// [`ConversableAgentBuilder::assistant`].
pub const DEFAULT_ASSISTANT_SYSTEM_MESSAGE: &str = "\
You are a helpful AI assistant.
Solve tasks using your coding and language skills.
In the following cases, suggest python code (in a python coding block) or shell script (in a sh coding block) for the user to execute.
    1. When you need to collect info, use the code to output the info you need, for example, browse or search the web, download/read a file, print the content of a webpage or a file, get the current date/time, check the operating system. After sufficient info is printed and the task is ready to be solved based on your language skill, you can solve the task by yourself.
    2. When you need to perform some task with code, use the code to perform the task and output the result. Finish the task smartly.
Solve the task step by step if you need to. If a plan is not provided, explain your plan first. Be clear which step uses code, and which step uses your language skill.
When using code, you must indicate the script type in the code block. The user cannot provide any other feedback or perform any other action beyond executing the code you suggest. The user can't modify your code. So do not suggest incomplete code which requires users to modify. Don't use a code block if it's not intended to be executed by the user.
If you want the user to save the code in a file before executing it, put # filename: <filename> inside the code block as the first line. Don't include multiple code blocks in one response. Do not ask users to copy and paste the result. Instead, use 'print' function for the output when relevant. Check the execution result returned by the user.
If the result indicates there is an error, fix the error and output the code again. Suggest the full code instead of partial code or code changes. If the error can't be fixed or if the task is not solved even after the code is executed successfully, analyze the problem, revisit your assumption, collect additional info you need, and think of a different approach to try.
When you find an answer, verify the answer carefully. Include verifiable evidence in your response if possible.
Reply \"TERMINATE\" in the end when everything is done.";

const DEFAULT_MAX_CONSECUTIVE_AUTO_REPLY: usize = 100;

/// [`ConversableAgent`] builder.
pub struct ConversableAgentBuilder {
    name: String,
    system_message: String,
    model_client: Option<ModelClient>,
    functions: Vec<Arc<dyn FunctionObject>>,
    code_execution: Option<CodeExecutionConfig>,
    human_input_mode: HumanInputMode,
    is_termination_msg: Option<TerminationPredicate>,
    max_consecutive_auto_reply: usize,
    default_auto_reply: String,
    on_human_input: Option<HumanInputHandler>,
    on_transcript: Option<TranscriptHandler>,
}

impl ConversableAgentBuilder {
    /// Creates a builder for a plain agent: no model, no code execution,
    /// and never asking a human.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            system_message: DEFAULT_SYSTEM_MESSAGE.to_owned(),
            model_client: None,
            functions: vec![],
            code_execution: None,
            human_input_mode: HumanInputMode::Never,
            is_termination_msg: None,
            max_consecutive_auto_reply: DEFAULT_MAX_CONSECUTIVE_AUTO_REPLY,
            default_auto_reply: String::new(),
            on_human_input: None,
            on_transcript: None,
        }
    }

    /// Creates a builder for an agent that solves tasks with a model.
    ///
    /// A model provider still has to be set.
    pub fn assistant<S: Into<String>>(name: S) -> Self {
        Self::new(name).with_system_message(DEFAULT_ASSISTANT_SYSTEM_MESSAGE)
    }

    /// Creates a builder for an agent acting on behalf of a human: it asks
    /// for input on every turn and runs the code it receives.
    pub fn user_proxy<S: Into<String>>(name: S) -> Self {
        Self::new(name)
            .with_human_input_mode(HumanInputMode::Always)
            .with_code_execution(CodeExecutionConfig::default())
    }

    /// Sets the system message sent ahead of the history to the model.
    #[inline]
    pub fn with_system_message<S: Into<String>>(mut self, system_message: S) -> Self {
        self.system_message = system_message.into();
        self
    }

    /// Sets the model provider used for model completion replies.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(mut self, provider: P) -> Self {
        self.model_client = Some(ModelClient::new(provider));
        self
    }

    /// Registers a function that models can suggest calling.
    #[inline]
    pub fn with_function<F: Function>(mut self, function: F) -> Self {
        self.functions.push(Arc::new(FunctionObjectImpl(function)));
        self
    }

    /// Enables code execution replies.
    #[inline]
    pub fn with_code_execution(mut self, config: CodeExecutionConfig) -> Self {
        self.code_execution = Some(config);
        self
    }

    /// Disables code execution replies.
    #[inline]
    pub fn without_code_execution(mut self) -> Self {
        self.code_execution = None;
        self
    }

    /// Sets when the agent asks a human.
    #[inline]
    pub fn with_human_input_mode(mut self, mode: HumanInputMode) -> Self {
        self.human_input_mode = mode;
        self
    }

    /// Sets the predicate deciding whether a received message ends the
    /// conversation. By default, a message ends it when its content ends
    /// with `TERMINATE`.
    #[inline]
    pub fn with_termination_msg(
        mut self,
        is_termination_msg: impl Fn(&Message) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_termination_msg = Some(Arc::new(is_termination_msg));
        self
    }

    /// Sets how many automatic replies are sent to the same peer before a
    /// human is involved or the agent stops.
    #[inline]
    pub fn with_max_consecutive_auto_reply(mut self, max: usize) -> Self {
        self.max_consecutive_auto_reply = max;
        self
    }

    /// Sets the reply used when no strategy produces one.
    #[inline]
    pub fn with_default_auto_reply<S: Into<String>>(mut self, reply: S) -> Self {
        self.default_auto_reply = reply.into();
        self
    }

    /// Attaches a callback answering human input requests.
    ///
    /// Without one, every request is treated as if the human gave no input.
    #[inline]
    pub fn on_human_input(
        mut self,
        on_human_input: impl Fn(HumanInputRequest) + Send + Sync + 'static,
    ) -> Self {
        self.on_human_input = Some(Arc::new(on_human_input));
        self
    }

    /// Attaches a callback receiving a record of every message received
    /// without `silent`.
    ///
    /// Without one, records are logged at info level.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&TranscriptRecord) + Send + Sync + 'static,
    ) -> Self {
        self.on_transcript = Some(Arc::new(on_transcript));
        self
    }

    /// Builds the agent.
    pub fn build(self) -> Result<ConversableAgent> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_config().with_reason("agent name must not be empty"));
        }

        let is_termination_msg: TerminationPredicate = match self.is_termination_msg {
            Some(is_termination_msg) => is_termination_msg,
            None => Arc::new(ends_with_terminate),
        };
        Ok(ConversableAgent {
            id: AgentId::next(),
            name: self.name,
            system_message: Mutex::new(self.system_message),
            model_client: self.model_client,
            functions: Mutex::new(Registry::with_functions(self.functions)),
            code_execution: self.code_execution,
            human_input_mode: self.human_input_mode,
            is_termination_msg,
            max_consecutive_auto_reply: self.max_consecutive_auto_reply,
            default_auto_reply: self.default_auto_reply,
            on_human_input: self.on_human_input,
            on_transcript: self.on_transcript,
            conversations: Mutex::new(Conversations::default()),
            auto_reply_counts: Mutex::new(HashMap::new()),
            replies: Mutex::new(ReplyStrategy::default_chain()),
        })
    }
}

fn ends_with_terminate(message: &Message) -> bool {
    message
        .content
        .as_deref()
        .is_some_and(|content| content.trim_end().ends_with("TERMINATE"))
}
