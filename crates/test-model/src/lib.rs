//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use colloquy_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: VecDeque<ModelResponseEvent>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl TestModelResponse {
    fn new(preset: PresetResponse, delay: Duration) -> Self {
        let has_function_call = preset
            .events
            .iter()
            .any(|event| matches!(event, PresetEvent::FunctionCall(_)));
        let mut events: VecDeque<_> = preset
            .events
            .into_iter()
            .map(|event| match event {
                PresetEvent::MessageDelta(msg) => {
                    ModelResponseEvent::MessageDelta(msg)
                }
                PresetEvent::FunctionCall(call) => {
                    ModelResponseEvent::FunctionCall(call)
                }
            })
            .collect();
        events.push_back(ModelResponseEvent::Completed(if has_function_call {
            ModelFinishReason::FunctionCall
        } else {
            ModelFinishReason::Stop
        }));
        Self {
            events,
            delay,
            sleep: None,
        }
    }
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;
            // Returns `None` forever once the events run out.
            return Poll::Ready(Ok(this.events.pop_front()));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Default)]
struct Script {
    responses: VecDeque<PresetResponse>,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to queue the responses the model
/// should give. Every request consumes the front response, regardless of
/// its content, and is recorded so tests can inspect what the model has
/// been asked. If the queue runs dry, an error is returned.
///
/// Clones share the same script, so a test can keep a clone around after
/// handing the provider to an agent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_response(&self, preset: PresetResponse) {
        self.lock().responses.push_back(preset);
    }

    #[inline]
    pub fn add_text_response<S: Into<String>>(&self, text: S) {
        self.add_response(PresetResponse::text(text));
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns how many requests have been sent, including failed ones.
    #[inline]
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Returns a copy of every request received so far.
    #[inline]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    /// Returns how many queued responses have not been consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.lock().responses.len()
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_response(&self, req: &ModelRequest) -> Result<PresetResponse, Error> {
        let mut script = self.lock();
        script.requests.push(req.clone());

        let Some(front) = script.responses.front_mut() else {
            return Err(Error {
                message: "no enough responses",
                kind: ErrorKind::Other,
            });
        };
        match front.failures {
            Some(0) => {
                return Err(Error {
                    message: "preset failure",
                    kind: ErrorKind::Other,
                });
            }
            Some(ref mut failures) => {
                *failures -= 1;
                if *failures == 0 {
                    front.failures = None;
                }
                return Err(Error {
                    message: "preset failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
            None => {}
        }
        Ok(script
            .responses
            .pop_front()
            .expect("front response has been checked"))
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let delay = self.delay.unwrap_or(Duration::from_millis(1));
        let resp = self
            .next_response(req)
            .map(|preset| TestModelResponse::new(preset, delay));
        ready(resp)
    }
}
