use std::collections::HashMap;
use std::sync::Arc;

use colloquy_model::{FunctionCall, Message, ModelFunction};

use crate::function::{Error, FunctionObject};

/// The name-to-function mapping of an agent.
#[derive(Clone, Default)]
pub struct Registry {
    functions: HashMap<String, Arc<dyn FunctionObject>>,
}

impl Registry {
    pub fn with_functions(functions: Vec<Arc<dyn FunctionObject>>) -> Self {
        let mut registry = Self::default();
        for function in functions {
            registry.insert(function);
        }
        registry
    }

    /// Inserts a function, replacing the one with the same name.
    #[inline]
    pub fn insert(&mut self, function: Arc<dyn FunctionObject>) {
        let name = function.name().to_owned();
        if self.functions.insert(name, function).is_some() {
            debug!("replaced a registered function");
        }
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    #[inline]
    pub fn definitions(&self) -> Vec<ModelFunction> {
        let mut definitions: Vec<_> = self
            .functions
            .values()
            .map(|function| function.definition())
            .collect();
        // Keeps requests stable across runs.
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Executes the call and wraps the outcome into a function-role message.
    ///
    /// Unknown functions and failing calls are reported in the message
    /// content rather than as errors.
    pub async fn call(&self, call: &FunctionCall) -> Message {
        let Some(function) = self.functions.get(&call.name) else {
            warn!("function not found: {}", call.name);
            let err = Error::not_found(&call.name);
            return Message::function(&call.name, err.to_string());
        };
        trace!("calling {} with args: {}", call.name, call.arguments);

        let content = match function.execute(&call.arguments).await {
            Ok(output) => output,
            Err(err) => {
                debug!("{} failed: {}", call.name, err.reason());
                err.to_string()
            }
        };
        Message::function(&call.name, content)
    }
}
