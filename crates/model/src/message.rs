use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// The role of a message's author, relative to the observer.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The system instructions.
    System,
    /// A peer speaking to the observer.
    #[default]
    User,
    /// The observer itself.
    Assistant,
    /// The result of calling a function.
    Function,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Function => "function",
        };
        f.write_str(s)
    }
}

/// A function call suggested by a model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionCall {
    /// The name of the function to call.
    pub name: String,
    /// The arguments to pass to the function, encoded as a JSON object.
    pub arguments: String,
}

/// A complete chat message.
///
/// Histories hold clones of messages, so a sender mutating its own
/// instance later cannot change what has been recorded.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct Message {
    /// The role of the author.
    pub role: Role,
    /// The text content, absent for pure function calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// The name of the author. For function-role messages, this is the
    /// name of the function that has been called.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The function call suggested by the author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl Message {
    /// Creates a system message.
    #[inline]
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Creates a message carrying the result of the function `name`.
    #[inline]
    pub fn function<N: Into<String>, S: Into<String>>(
        name: N,
        content: S,
    ) -> Self {
        Self {
            role: Role::Function,
            content: Some(content.into()),
            name: Some(name.into()),
            function_call: None,
        }
    }

    #[inline]
    fn with_role<S: Into<String>>(role: Role, content: S) -> Self {
        Self {
            role,
            content: Some(content.into()),
            name: None,
            function_call: None,
        }
    }

    /// Sets the author name.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches a function call.
    #[inline]
    pub fn with_function_call(mut self, function_call: FunctionCall) -> Self {
        self.function_call = Some(function_call);
        self
    }

    /// Returns the text content, or an empty string if there is none.
    #[inline]
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// Returns `true` if this message is a function result.
    #[inline]
    pub fn is_function(&self) -> bool {
        self.role == Role::Function
    }
}

impl From<&str> for Message {
    #[inline]
    fn from(content: &str) -> Self {
        Message::user(content)
    }
}

impl From<String> for Message {
    #[inline]
    fn from(content: String) -> Self {
        Message::user(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_function_call() {
        let msg = Message {
            role: Role::Assistant,
            content: None,
            name: Some("coder".to_owned()),
            function_call: Some(FunctionCall {
                name: "list_files".to_owned(),
                arguments: r#"{"pattern":"*.rs"}"#.to_owned(),
            }),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "assistant");
        assert!(value.get("content").is_none());
        assert_eq!(value["function_call"]["name"], "list_files");
    }

    #[test]
    fn test_deserialize_defaults() {
        let msg: Message =
            serde_json::from_str(r#"{"role":"function","name":"f"}"#).unwrap();
        assert!(msg.is_function());
        assert_eq!(msg.text(), "");
        assert_eq!(msg.function_call, None);
    }
}
