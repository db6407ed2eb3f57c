use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use colloquy_model::{
    Message, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ModelResponseEvent, Role,
};
use tracing::Instrument;

type CompleteResult = Result<Message, Box<dyn ModelProviderError>>;
type BoxedCompleteFuture = Pin<Box<dyn Future<Output = CompleteResult> + Send>>;
type HandlerFn = Arc<dyn Fn(ModelRequest) -> BoxedCompleteFuture + Send + Sync>;

/// A wrapper around a model provider that provides a type-erased
/// interface for the other modules.
///
/// The client turns the event stream of a response into one complete
/// assistant message.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since agents hold clients of
        // different providers side by side.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and returns the complete message.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops being polled when
    /// this operation is cancelled.
    #[inline]
    pub async fn complete(&self, req: ModelRequest) -> CompleteResult {
        (self.handler_fn)(req).await
    }
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
) -> CompleteResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut content: Option<String> = None;
    let mut function_call = None;

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(delta) => {
                content.get_or_insert_default().push_str(&delta);
            }
            ModelResponseEvent::FunctionCall(call) => {
                if function_call.is_some() {
                    warn!("only the last function call is kept: {}", call.name);
                }
                function_call = Some(call);
            }
            ModelResponseEvent::Completed(reason) => {
                debug!("response completed: {reason:?}");
                break;
            }
        }
    }

    Ok(Message {
        role: Role::Assistant,
        content,
        name: None,
        function_call,
    })
}

#[cfg(test)]
mod tests {
    use colloquy_model::FunctionCall;
    use colloquy_test_model::{PresetEvent, PresetResponse, TestModelProvider};

    use super::*;

    fn request() -> ModelRequest {
        ModelRequest {
            messages: vec![Message::user("Hi")],
            functions: vec![],
        }
    }

    #[tokio::test]
    async fn test_complete() {
        let model_provider = TestModelProvider::default();
        model_provider.add_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("How ".to_owned()),
            PresetEvent::MessageDelta("are ".to_owned()),
            PresetEvent::MessageDelta("you?".to_owned()),
        ]));
        model_provider.add_response(PresetResponse::with_events([
            PresetEvent::FunctionCall(FunctionCall {
                name: "get_time".to_owned(),
                arguments: "{}".to_owned(),
            }),
        ]));

        let model_client = ModelClient::new(model_provider);

        let msg = model_client.complete(request()).await.unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.text(), "How are you?");
        assert!(msg.function_call.is_none());

        let msg = model_client.complete(request()).await.unwrap();
        assert_eq!(msg.content, None);
        assert_eq!(msg.function_call.unwrap().name, "get_time");
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider);
        let resp_or_err = model_client.complete(request()).await;
        assert!(resp_or_err.is_err());
    }
}
