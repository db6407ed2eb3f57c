use std::future::ready;
use std::pin::Pin;

use colloquy_model::ModelFunction;
use tracing::Instrument;

use super::{Error, Function, FunctionResult};

pub(crate) trait FunctionObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn definition(&self) -> ModelFunction;

    fn execute(
        &self,
        arguments: &str,
    ) -> Pin<Box<dyn Future<Output = FunctionResult> + Send>>;
}

pub(crate) struct FunctionObjectImpl<F: Function>(pub F);

impl<F: Function> FunctionObject for FunctionObjectImpl<F> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn definition(&self) -> ModelFunction {
        ModelFunction {
            name: self.0.name().to_owned(),
            description: self.0.description().to_owned(),
            parameters: self.0.parameter_schema().clone(),
        }
    }

    fn execute(
        &self,
        arguments: &str,
    ) -> Pin<Box<dyn Future<Output = FunctionResult> + Send>> {
        // Models may send an empty string for functions without parameters.
        let arguments = if arguments.trim().is_empty() {
            "{}"
        } else {
            arguments
        };
        let input = match serde_json::from_str::<F::Input>(arguments) {
            Ok(input) => input,
            Err(err) => return Box::pin(ready(Err(Error::from(err)))),
        };
        Box::pin(
            self.0
                .execute(input)
                .instrument(debug_span!("function execute", name = self.0.name())),
        )
    }
}
