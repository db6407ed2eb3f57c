use std::fmt::{self, Display};
use std::sync::Arc;

use colloquy_model::Message;

pub(crate) type TranscriptHandler = Arc<dyn Fn(&TranscriptRecord) + Send + Sync>;

/// One received message, as shown in a conversation transcript.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptRecord {
    /// Name of the agent that sent the message.
    pub sender: String,
    /// Name of the agent that received the message.
    pub recipient: String,
    /// The message as it was sent.
    pub message: Message,
}

impl Display for TranscriptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (to {}):\n", self.sender, self.recipient)?;

        let message = &self.message;
        if message.is_function() {
            let banner = format!(
                "***** Response from calling function \"{}\" *****",
                message.name.as_deref().unwrap_or_default()
            );
            writeln!(f, "{banner}")?;
            writeln!(f, "{}", message.text())?;
            writeln!(f, "{}", "*".repeat(banner.len()))?;
        } else {
            let content = message.content.as_deref().filter(|c| !c.is_empty());
            if let Some(content) = content {
                writeln!(f, "{content}")?;
            }
            if let Some(call) = &message.function_call {
                let banner =
                    format!("***** Suggested function Call: {} *****", call.name);
                writeln!(f, "{banner}")?;
                writeln!(f, "Arguments: \n{}", call.arguments)?;
                writeln!(f, "{}", "*".repeat(banner.len()))?;
            }
        }
        write!(f, "\n{}", "-".repeat(80))
    }
}

#[cfg(test)]
mod tests {
    use colloquy_model::FunctionCall;

    use super::*;

    fn record(message: Message) -> String {
        TranscriptRecord {
            sender: "coder".to_owned(),
            recipient: "manager".to_owned(),
            message,
        }
        .to_string()
    }

    #[test]
    fn test_display_text() {
        let text = record(Message::assistant("Done."));
        assert!(text.starts_with("coder (to manager):\n\nDone.\n"));
        assert!(text.ends_with(&"-".repeat(80)));
    }

    #[test]
    fn test_display_function_messages() {
        let text = record(Message::function("add", "3"));
        assert!(text.contains("***** Response from calling function \"add\" *****\n3\n"));

        let text = record(Message::default().with_function_call(FunctionCall {
            name: "add".to_owned(),
            arguments: r#"{"a":1}"#.to_owned(),
        }));
        assert!(text.contains("***** Suggested function Call: add *****"));
        assert!(text.contains("Arguments: \n{\"a\":1}"));
    }
}
