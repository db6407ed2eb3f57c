use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::{poll_fn, ready};
use std::pin::Pin;
use std::task::{self, Poll, ready};
use std::time::Duration;

use colloquy_model::{
    ErrorKind, FunctionCall, Message, ModelFinishReason, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent, Role,
};
use tokio::time::{Sleep, sleep};

#[derive(Debug)]
struct FakeModelProviderError(ErrorKind);

impl Display for FakeModelProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for FakeModelProviderError {}

impl ModelProviderError for FakeModelProviderError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Echoes the last user message word by word, or suggests a function call
/// when the message starts with `call `.
#[derive(Debug)]
struct FakeModelResponse {
    events: VecDeque<ModelResponseEvent>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl FakeModelResponse {
    fn new(input: &str) -> Self {
        let mut events = VecDeque::new();
        if let Some(name) = input.strip_prefix("call ") {
            events.push_back(ModelResponseEvent::FunctionCall(FunctionCall {
                name: name.to_owned(),
                arguments: "{}".to_owned(),
            }));
            events.push_back(ModelResponseEvent::Completed(
                ModelFinishReason::FunctionCall,
            ));
        } else {
            let text = format!("You said {input}");
            let mut words = text.split(' ').peekable();
            while let Some(word) = words.next() {
                let mut delta = word.to_owned();
                if words.peek().is_some() {
                    delta.push(' ');
                }
                events.push_back(ModelResponseEvent::MessageDelta(delta));
            }
            events
                .push_back(ModelResponseEvent::Completed(ModelFinishReason::Stop));
        }
        Self {
            events,
            sleep: None,
        }
    }
}

impl ModelResponse for FakeModelResponse {
    type Error = FakeModelProviderError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;
            return Poll::Ready(Ok(this.events.pop_front()));
        }
        this.sleep = Some(Box::pin(sleep(Duration::from_millis(1))));
        Pin::new(this).poll_next_event(cx)
    }
}

struct FakeModelProvider;

impl ModelProvider for FakeModelProvider {
    type Error = FakeModelProviderError;
    type Response = FakeModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let last_user = req.messages.iter().rev().find(|m| m.role == Role::User);
        let result = match last_user {
            Some(msg) => Ok(FakeModelResponse::new(msg.text())),
            None => Err(FakeModelProviderError(ErrorKind::Other)),
        };
        ready(result)
    }
}

async fn collect(
    mut resp: FakeModelResponse,
) -> (String, Option<FunctionCall>, Option<ModelFinishReason>) {
    let mut text = String::new();
    let mut function_call = None;
    let mut finish_reason = None;
    while let Some(event) = poll_fn(|cx| Pin::new(&mut resp).poll_next_event(cx))
        .await
        .unwrap()
    {
        match event {
            ModelResponseEvent::MessageDelta(delta) => text.push_str(&delta),
            ModelResponseEvent::FunctionCall(call) => function_call = Some(call),
            ModelResponseEvent::Completed(reason) => finish_reason = Some(reason),
        }
    }
    (text, function_call, finish_reason)
}

#[tokio::test]
async fn test_completion() {
    let req = ModelRequest {
        messages: vec![
            Message::system("You are a parrot."),
            Message::user("Good morning"),
        ],
        functions: vec![],
    };
    let resp = FakeModelProvider.send_request(&req).await.unwrap();
    let (text, function_call, reason) = collect(resp).await;
    assert_eq!(text, "You said Good morning");
    assert!(function_call.is_none());
    assert_eq!(reason, Some(ModelFinishReason::Stop));
}

#[tokio::test]
async fn test_function_call() {
    let req = ModelRequest {
        messages: vec![Message::user("call get_time")],
        functions: vec![],
    };
    let resp = FakeModelProvider.send_request(&req).await.unwrap();
    let (text, function_call, reason) = collect(resp).await;
    assert!(text.is_empty());
    assert_eq!(function_call.unwrap().name, "get_time");
    assert_eq!(reason, Some(ModelFinishReason::FunctionCall));
}

#[tokio::test]
async fn test_error() {
    let req = ModelRequest {
        messages: vec![Message::system("nobody speaks")],
        functions: vec![],
    };
    let err = FakeModelProvider.send_request(&req).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Other);
    assert!(!err.kind().is_transient());
}
