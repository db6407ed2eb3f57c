use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use colloquy_model::{ModelFinishReason, ModelResponse, ModelResponseEvent};

use crate::proto::ChatCompletion;

/// A complete response, replayed as events.
#[derive(Debug)]
pub struct OpenAIResponse {
    events: VecDeque<ModelResponseEvent>,
}

impl OpenAIResponse {
    pub(crate) fn from_completion(completion: ChatCompletion) -> Self {
        let mut events = VecDeque::new();
        let Some(choice) = completion.choices.into_iter().next() else {
            warn!("the completion has no choices");
            events.push_back(ModelResponseEvent::Completed(ModelFinishReason::Stop));
            return Self { events };
        };

        let message = choice.message;
        if let Some(content) = message.content.filter(|c| !c.is_empty()) {
            events.push_back(ModelResponseEvent::MessageDelta(content));
        }
        let has_function_call = message.function_call.is_some();
        if let Some(call) = message.function_call {
            events.push_back(ModelResponseEvent::FunctionCall(call));
        }

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("length") => ModelFinishReason::Length,
            Some("function_call") => ModelFinishReason::FunctionCall,
            _ if has_function_call => ModelFinishReason::FunctionCall,
            _ => ModelFinishReason::Stop,
        };
        events.push_back(ModelResponseEvent::Completed(finish_reason));
        Self { events }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        Poll::Ready(Ok(self.get_mut().events.pop_front()))
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use super::*;

    async fn collect(resp: OpenAIResponse) -> Vec<ModelResponseEvent> {
        let mut resp = pin!(resp);
        let mut events = vec![];
        while let Some(event) = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
            .await
            .unwrap()
        {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_text_completion() {
        let completion: ChatCompletion = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "Hi!"}, "finish_reason": "stop"}]}"#,
        )
        .unwrap();
        let events = collect(OpenAIResponse::from_completion(completion)).await;
        assert_eq!(
            events,
            [
                ModelResponseEvent::MessageDelta("Hi!".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::Stop),
            ]
        );
    }

    #[tokio::test]
    async fn test_function_call_completion() {
        let completion: ChatCompletion = serde_json::from_str(
            r#"{"choices": [{
                "message": {
                    "content": "",
                    "function_call": {"name": "f", "arguments": "{}"}
                },
                "finish_reason": null
            }]}"#,
        )
        .unwrap();
        let events = collect(OpenAIResponse::from_completion(completion)).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ModelResponseEvent::FunctionCall(call) if call.name == "f"));
        assert_eq!(
            events[1],
            ModelResponseEvent::Completed(ModelFinishReason::FunctionCall)
        );
    }
}
