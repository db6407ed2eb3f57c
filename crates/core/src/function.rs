//! Functions that models can suggest calling.

mod error;
mod object;
mod registry;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{Error, ErrorKind};
pub(crate) use object::{FunctionObject, FunctionObjectImpl};
pub(crate) use registry::Registry;

/// The result of a function call.
pub type FunctionResult = Result<String, Error>;

/// A function that can be called on behalf of a model.
///
/// Implementations of this trait should be stateless. A function that
/// needs context (a working directory, a client) should keep it as an
/// immutable field set during initialization, and copy it when executing.
pub trait Function: Send + Sync + 'static {
    /// The type of input that the function accepts, deserialized from the
    /// JSON arguments of the call.
    type Input: DeserializeOwned;

    /// Returns the name of the function.
    fn name(&self) -> &str;

    /// Returns the description of the function.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the function.
    fn parameter_schema(&self) -> &Value;

    /// Executes the function with the given input.
    ///
    /// This method must return a future that is fully independent of
    /// `self`.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = FunctionResult> + Send + 'static;
}
