use std::path::{Path, PathBuf};

use colloquy_core::function::{Error as FunctionError, Function, FunctionResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tokio::task::spawn_blocking;

const MAX_ENTRIES: usize = 50;

#[derive(Deserialize, JsonSchema)]
pub struct ListFilesParameters {
    #[schemars(description = "The glob pattern, relative to the work directory.")]
    pattern: String,
}

/// Lists the files in a directory that match a glob pattern.
///
/// Patterns are resolved against a fixed root, usually the work directory
/// of the code executing agent. At most 50 entries are returned.
pub struct ListFiles {
    root: PathBuf,
    parameter_schema: Value,
}

impl ListFiles {
    /// Creates the function, resolving patterns against `root`.
    #[inline]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            parameter_schema: schema_for!(ListFilesParameters).to_value(),
        }
    }
}

impl Function for ListFiles {
    type Input = ListFilesParameters;

    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "Lists files in the work directory. \
         Supports standard glob syntax like *, ? and ** for recursive searches."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: ListFilesParameters,
    ) -> impl Future<Output = FunctionResult> + Send + 'static {
        let root = self.root.clone();
        async move {
            let relative = Path::new(&input.pattern);
            if relative.is_absolute()
                || relative.components().any(|c| c.as_os_str() == "..")
            {
                return Err(FunctionError::execution_error()
                    .with_reason("`pattern` must stay inside the work directory"));
            }

            let pattern = root.join(relative);
            debug!("listing files matching {}", pattern.display());
            let entries = glob::glob(&pattern.to_string_lossy()).map_err(|err| {
                FunctionError::execution_error().with_reason(err.to_string())
            })?;

            spawn_blocking(move || {
                let mut result = String::new();
                for entry in entries.flatten().take(MAX_ENTRIES) {
                    let entry = entry.strip_prefix(&root).unwrap_or(&entry);
                    result.push_str(&entry.to_string_lossy());
                    result.push('\n');
                }
                if result.is_empty() {
                    result.push_str("No files found.");
                }
                result
            })
            .await
            .map_err(|_| {
                FunctionError::execution_error().with_reason("Failed to list files")
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(pattern: &str) -> ListFilesParameters {
        ListFilesParameters {
            pattern: pattern.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_list_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "print(1)").unwrap();
        std::fs::write(dir.path().join("b.sh"), "echo 1").unwrap();
        let function = ListFiles::new(dir.path());

        let output = function.execute(input("*.py")).await.unwrap();
        assert_eq!(output, "a.py\n");

        let output = function.execute(input("*.rs")).await.unwrap();
        assert_eq!(output, "No files found.");
    }

    #[tokio::test]
    async fn test_input_validation() {
        let function = ListFiles::new("/tmp");
        assert!(function.execute(input("/etc/*")).await.is_err());
        assert!(function.execute(input("../*")).await.is_err());
        assert!(function.execute(input("[")).await.is_err());
    }
}
