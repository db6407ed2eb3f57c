use colloquy_model::{FunctionCall, Message as ModelMessage, ModelFunction, ModelRequest, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChatCompletion {
    pub id: Option<String>,
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
    pub function_call: Option<FunctionCall>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(default)]
    pub code: Option<Value>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct Function {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Message {
    role: Role,
    // Always present, assistant messages with a function call carry `null`.
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    functions: Vec<Function>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(req: &ModelRequest, config: &OpenAIConfig) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        functions: req.functions.iter().map(create_function).collect(),
        temperature: config.temperature,
        stream: false,
    }
}

#[inline]
fn create_message(msg: &ModelMessage) -> Message {
    Message {
        role: msg.role,
        content: msg.content.clone(),
        name: msg.name.as_deref().map(sanitize_name),
        function_call: msg.function_call.clone(),
    }
}

#[inline]
fn create_function(function: &ModelFunction) -> Function {
    Function {
        name: function.name.clone(),
        description: function.description.clone(),
        parameters: function.parameters.clone(),
    }
}

/// Names may only contain ASCII letters, digits, `_` and `-`, and are at
/// most 64 characters long.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::OpenAIConfigBuilder;

    #[test]
    fn test_create_request() {
        let request = ModelRequest {
            messages: vec![
                ModelMessage::system("You are a helpful assistant."),
                ModelMessage::user("Hello").with_name("Product Manager"),
                ModelMessage::default().with_function_call(FunctionCall {
                    name: "list_files".to_owned(),
                    arguments: "{}".to_owned(),
                }),
                ModelMessage::function("list_files", "a.txt"),
            ],
            functions: vec![ModelFunction {
                name: "list_files".to_owned(),
                description: "Lists files.".to_owned(),
                parameters: json!({"type": "object"}),
            }],
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_model("custom")
            .build();

        let body = serde_json::to_value(create_request(&request, &config)).unwrap();
        let expected = json!({
            "model": "custom",
            "messages": [
                {"role": "system", "content": "You are a helpful assistant."},
                {"role": "user", "content": "Hello", "name": "Product_Manager"},
                {
                    "role": "user",
                    "content": null,
                    "function_call": {"name": "list_files", "arguments": "{}"}
                },
                {"role": "function", "content": "a.txt", "name": "list_files"},
            ],
            "functions": [
                {
                    "name": "list_files",
                    "description": "Lists files.",
                    "parameters": {"type": "object"}
                }
            ],
            "stream": false
        });
        assert_eq!(body, expected);
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "function_call": {"name": "list_files", "arguments": "{}"}
                },
                "finish_reason": "function_call"
            }]
        }"#;
        let completion: ChatCompletion = serde_json::from_str(body).unwrap();
        let choice = &completion.choices[0];
        assert_eq!(choice.message.content, None);
        assert_eq!(choice.message.function_call.as_ref().unwrap().name, "list_files");
        assert_eq!(choice.finish_reason.as_deref(), Some("function_call"));
    }
}
