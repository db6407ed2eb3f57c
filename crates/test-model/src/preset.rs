use colloquy_model::FunctionCall;
use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "function_call")]
    FunctionCall(FunctionCall),
}

/// A preset response for one model request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request will fail in the first `failures` attempts.
    /// `Some(0)` means the request will fail infinitely.
    pub failures: Option<u64>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failures: None,
        }
    }

    /// Creates a `PresetResponse` that answers with a single text.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Creates a `PresetResponse` that suggests a function call.
    #[inline]
    pub fn function_call<N: Into<String>, A: Into<String>>(
        name: N,
        arguments: A,
    ) -> Self {
        Self::with_events([PresetEvent::FunctionCall(FunctionCall {
            name: name.into(),
            arguments: arguments.into(),
        })])
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let response = PresetResponse::with_events([
            PresetEvent::MessageDelta("Let me look around.".to_string()),
            PresetEvent::FunctionCall(FunctionCall {
                name: "list_files".to_string(),
                arguments: r#"{"pattern":"*.md"}"#.to_string(),
            }),
        ])
        .with_failures(2);

        let serialized = serde_json::to_string(&response).unwrap();
        assert!(serialized.contains(r#""type":"function_call""#));
        let deserialized: PresetResponse =
            serde_json::from_str(&serialized).unwrap();

        assert_eq!(response, deserialized);
    }
}
