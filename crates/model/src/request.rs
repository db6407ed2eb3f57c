use serde_json::Value;

use crate::Message;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelRequest {
    /// The input messages, the system message (if any) comes first.
    pub messages: Vec<Message>,
    /// Functions that the model may suggest calling.
    pub functions: Vec<ModelFunction>,
}

/// Describes a function that can be suggested by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelFunction {
    /// Name of the function.
    pub name: String,
    /// Description of the function.
    pub description: String,
    /// Parameters definition of the function.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}
