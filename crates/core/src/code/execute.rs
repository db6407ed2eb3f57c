use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::{CodeBlock, CodeExecutionConfig, Language};

/// The exit code reported when a block runs past its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

// How long to wait for the pipes to close after the process is gone.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// The outcome of running a sequence of code blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeExecutionResult {
    /// The exit code of the last block that ran, `0` if all succeeded.
    pub exit_code: i32,
    /// Standard output and error of every block that ran, interleaved in
    /// the order they were written.
    pub output: String,
}

impl CodeExecutionResult {
    #[inline]
    fn failed(output: String) -> Self {
        Self {
            exit_code: 1,
            output,
        }
    }

    /// Returns `true` if every block exited with `0`.
    #[inline]
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns `true` if the last block was killed for running too long.
    #[inline]
    pub fn timed_out(&self) -> bool {
        self.exit_code == TIMEOUT_EXIT_CODE
    }
}

/// Returns the script file name kept for `source`.
///
/// Names are derived from a digest of the source, so different snippets
/// never share a file. Runs that delete their file afterwards add a
/// per-run suffix to this name.
pub fn code_file_name(language: Language, source: &str) -> String {
    format!("tmp_code_{}.{}", source_digest(source), language.extension())
}

fn scratch_file_name(language: Language, source: &str) -> String {
    static NEXT_RUN: AtomicU64 = AtomicU64::new(0);
    let run = NEXT_RUN.fetch_add(1, Ordering::Relaxed);
    format!(
        "tmp_code_{}_{}_{run}.{}",
        source_digest(source),
        std::process::id(),
        language.extension()
    )
}

fn source_digest(source: &str) -> String {
    hex::encode(Sha256::digest(source.as_bytes()))
}

/// Runs the blocks in order, stopping at the first non-zero exit code.
///
/// Blocks in a language the config doesn't allow are skipped. If none
/// is runnable, the result is a failure naming the unknown languages.
pub async fn execute_code(
    blocks: &[CodeBlock],
    config: &CodeExecutionConfig,
) -> CodeExecutionResult {
    let runnable: Vec<_> = blocks
        .iter()
        .filter_map(|block| {
            config
                .resolve(block.language())
                .map(|language| (language, block))
        })
        .collect();
    if runnable.is_empty() {
        let tags: Vec<_> = blocks
            .iter()
            .map(|block| block.language().unwrap_or("untagged"))
            .collect();
        warn!("no runnable code block in: {tags:?}");
        return CodeExecutionResult::failed(format!(
            "unknown language {}",
            tags.join(", ")
        ));
    }

    let mut result = CodeExecutionResult {
        exit_code: 0,
        output: String::new(),
    };
    for (index, (language, block)) in runnable.into_iter().enumerate() {
        debug!("running code block {index} ({language})");
        let block_result = run_block(language, block.source(), config).await;
        result.output.push_str(&block_result.output);
        result.exit_code = block_result.exit_code;
        if !block_result.succeeded() {
            debug!("code block {index} exited with {}", result.exit_code);
            break;
        }
    }
    result
}

async fn run_block(
    language: Language,
    source: &str,
    config: &CodeExecutionConfig,
) -> CodeExecutionResult {
    let work_dir = config.work_dir();
    if let Err(err) = tokio::fs::create_dir_all(work_dir).await {
        error!("failed to create {}: {err}", work_dir.display());
        return CodeExecutionResult::failed(format!(
            "failed to create work directory: {err}"
        ));
    }

    let file_name = if config.keep_files() {
        code_file_name(language, source)
    } else {
        scratch_file_name(language, source)
    };
    let path = work_dir.join(&file_name);
    if let Err(err) = tokio::fs::write(&path, source).await {
        error!("failed to write {}: {err}", path.display());
        return CodeExecutionResult::failed(format!(
            "failed to write code file: {err}"
        ));
    }
    let _file = CodeFile {
        path,
        keep: config.keep_files(),
    };

    let mut command = Command::new(language.interpreter());
    command
        .arg(&file_name)
        .current_dir(work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    run_command(command, config.timeout()).await
}

async fn run_command(
    mut command: Command,
    limit: Duration,
) -> CodeExecutionResult {
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!("failed to spawn {:?}: {err}", command.as_std().get_program());
            return CodeExecutionResult::failed(format!(
                "failed to start the interpreter: {err}"
            ));
        }
    };

    let buffer = Arc::new(Mutex::new(Vec::new()));
    let mut readers = vec![];
    if let Some(stdout) = child.stdout.take() {
        readers.push(capture(stdout, Arc::clone(&buffer)));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(capture(stderr, Arc::clone(&buffer)));
    }

    let (exit_code, note) = match timeout(limit, child.wait()).await {
        Ok(Ok(status)) => (status.code().unwrap_or(1), None),
        Ok(Err(err)) => {
            error!("failed to wait for the process: {err}");
            (1, Some(format!("{err}")))
        }
        Err(_) => {
            warn!("code execution timed out after {limit:?}");
            if let Err(err) = child.kill().await {
                warn!("failed to kill the process: {err}");
            }
            (TIMEOUT_EXIT_CODE, Some("Timeout".to_owned()))
        }
    };

    // Background processes may keep the pipes open, so the readers get a
    // bounded amount of time to finish.
    for mut reader in readers {
        if timeout(DRAIN_TIMEOUT, &mut reader).await.is_err() {
            trace!("output reader did not finish, aborting");
            reader.abort();
        }
    }

    let mut output = {
        let bytes = buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    };
    if let Some(note) = note {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&note);
    }
    CodeExecutionResult { exit_code, output }
}

fn capture<R>(mut reader: R, buffer: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            let n = match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    trace!("stopped reading output: {err}");
                    break;
                }
            };
            buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(&chunk[..n]);
        }
    })
}

/// Removes the script file when dropped, unless asked to keep it.
struct CodeFile {
    path: PathBuf,
    keep: bool,
}

impl Drop for CodeFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => trace!("removed {}", self.path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!("failed to remove {}: {err}", self.path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::code::extract_code;

    fn config(work_dir: &Path) -> CodeExecutionConfig {
        CodeExecutionConfig::builder()
            .with_work_dir(work_dir)
            .with_timeout(Duration::from_secs(10))
            .build()
            .unwrap()
    }

    fn leftover_files(work_dir: &Path) -> usize {
        std::fs::read_dir(work_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[test]
    fn test_code_file_name() {
        let a = code_file_name(Language::Shell, "echo a");
        let b = code_file_name(Language::Shell, "echo b");
        assert_ne!(a, b);
        assert_eq!(a, code_file_name(Language::Shell, "echo a"));
        assert!(a.starts_with("tmp_code_"));
        assert!(a.ends_with(".sh"));
        assert_eq!(a.len(), "tmp_code_".len() + 64 + ".sh".len());

        let first = scratch_file_name(Language::Shell, "echo a");
        let second = scratch_file_name(Language::Shell, "echo a");
        assert_ne!(first, second);
        assert!(first.starts_with(a.trim_end_matches(".sh")));
    }

    #[tokio::test]
    async fn test_execute_shell() {
        let dir = tempfile::tempdir().unwrap();
        let blocks = extract_code("```sh\necho TOKEN_42\necho oops >&2\n```", false);

        let result = execute_code(&blocks, &config(dir.path())).await;
        assert!(result.succeeded());
        assert!(result.output.contains("TOKEN_42"));
        assert!(result.output.contains("oops"));
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_execute_stops_at_failure() {
        let dir = tempfile::tempdir().unwrap();
        let text = "```sh\necho first\n```\n\
                    ```bash\necho second; exit 3\n```\n\
                    ```sh\necho third\n```";
        let blocks = extract_code(text, false);

        let result = execute_code(&blocks, &config(dir.path())).await;
        assert_eq!(result.exit_code, 3);
        assert!(result.output.contains("first"));
        assert!(result.output.contains("second"));
        assert!(!result.output.contains("third"));
    }

    #[tokio::test]
    async fn test_execute_unknown_language() {
        let dir = tempfile::tempdir().unwrap();
        let blocks = extract_code("```rust\nfn main() {}\n```", false);

        let result = execute_code(&blocks, &config(dir.path())).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.output.starts_with("unknown language"));
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let config = CodeExecutionConfig::builder()
            .with_work_dir(dir.path())
            .with_timeout(Duration::from_millis(500))
            .build()
            .unwrap();
        let blocks = extract_code("```sh\necho started\nsleep 5\n```", false);

        let result = execute_code(&blocks, &config).await;
        assert!(result.timed_out());
        assert!(result.output.contains("started"));
        assert!(result.output.ends_with("Timeout"));
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_execute_identical_code_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let blocks = extract_code("```sh\nsleep 0.2\necho SHARED\n```", false);

        let (first, second) = tokio::join!(
            execute_code(&blocks, &config),
            execute_code(&blocks, &config)
        );
        assert!(first.succeeded(), "{}", first.output);
        assert!(second.succeeded(), "{}", second.output);
        assert!(first.output.contains("SHARED"));
        assert!(second.output.contains("SHARED"));
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_keep_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = CodeExecutionConfig::builder()
            .with_work_dir(dir.path())
            .keep_files(true)
            .build()
            .unwrap();
        let blocks = extract_code("```sh\ntouch created.txt\n```", false);

        let result = execute_code(&blocks, &config).await;
        assert!(result.succeeded());
        let name = code_file_name(Language::Shell, "touch created.txt");
        assert!(dir.path().join(name).exists());
        assert!(dir.path().join("created.txt").exists());
    }
}
