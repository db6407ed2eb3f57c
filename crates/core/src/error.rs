use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display};

use colloquy_model::ModelProviderError;

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A configuration is invalid, or an agent is used in a way its
    /// configuration doesn't allow.
    InvalidConfig,
    /// An agent was looked up but has never been conversed with.
    UnknownAgent,
    /// The completion service failed.
    Model,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidConfig => write!(f, "Invalid configuration"),
            ErrorKind::UnknownAgent => write!(f, "Unknown agent"),
            ErrorKind::Model => write!(f, "Model request failed"),
        }
    }
}

/// The error type for agent operations.
///
/// Only failures that should abort the current turn are represented here.
/// Expected branches like an unknown function or a failing code block are
/// folded into reply messages instead.
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

/// A specialized `Result` type for agent operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    #[inline]
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            reason: None,
            source: None,
        }
    }

    /// Creates a new error with the `InvalidConfig` kind.
    #[inline]
    pub fn invalid_config() -> Self {
        Self::new(ErrorKind::InvalidConfig)
    }

    /// Creates a new error with the `UnknownAgent` kind.
    #[inline]
    pub fn unknown_agent() -> Self {
        Self::new(ErrorKind::UnknownAgent)
    }

    /// Creates a new error with the `Model` kind from a provider error.
    #[inline]
    pub fn model(err: Box<dyn ModelProviderError>) -> Self {
        let reason = format!("{} ({})", err, err.kind());
        let source: Box<dyn StdError + Send + Sync> = err;
        Self {
            kind: ErrorKind::Model,
            reason: Some(reason),
            source: Some(source),
        }
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {}", self.kind, reason),
            None => Display::fmt(&self.kind, f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn StdError + 'static))
    }
}
