use std::fmt::{self, Display};

/// What went wrong with a function call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No function with the requested name is registered.
    NotFound,
    /// The arguments of the call could not be decoded.
    InvalidInput,
    /// The function ran and failed.
    ExecutionError,
}

/// A failed function call.
///
/// These errors never abort a conversation. They are rendered into the
/// content of the function-role reply so the model can react to them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: String,
}

impl Error {
    /// Creates a `NotFound` error for the function `name`.
    pub fn not_found(name: &str) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            reason: format!("Function {name} not found."),
        }
    }

    /// Creates a new error with the `InvalidInput` kind.
    #[inline]
    pub fn invalid_input() -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            reason: "Invalid arguments".to_owned(),
        }
    }

    /// Creates a new error with the `ExecutionError` kind.
    #[inline]
    pub fn execution_error() -> Self {
        Self {
            kind: ErrorKind::ExecutionError,
            reason: "Execution failed".to_owned(),
        }
    }

    /// Replaces the reason shown to the model.
    #[inline]
    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = reason.into();
        self
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason shown to the model.
    #[inline]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_input().with_reason(err.to_string())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.reason)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            Error::not_found("launch").to_string(),
            "Error: Function launch not found."
        );
        assert_eq!(
            Error::execution_error().with_reason("disk full").to_string(),
            "Error: disk full"
        );

        let err: Error = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
