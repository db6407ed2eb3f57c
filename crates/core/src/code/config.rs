use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// A language that code blocks can be executed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Language {
    /// POSIX shell scripts, run with `sh`.
    Shell,
    /// Python scripts, run with `python3`.
    Python,
}

impl Language {
    /// Resolves a code block tag, like `bash` or `py`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "sh" | "bash" | "shell" => Some(Self::Shell),
            "python" | "py" | "python3" => Some(Self::Python),
            _ => None,
        }
    }

    /// Returns the extension of the script files.
    #[inline]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Shell => "sh",
            Self::Python => "py",
        }
    }

    /// Returns the program that runs the script files.
    #[inline]
    pub fn interpreter(self) -> &'static str {
        match self {
            Self::Shell => "sh",
            Self::Python => "python3",
        }
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell => f.write_str("shell"),
            Self::Python => f.write_str("python"),
        }
    }
}

/// How an agent runs the code it receives.
#[derive(Clone, Debug)]
pub struct CodeExecutionConfig {
    work_dir: PathBuf,
    last_n_messages: usize,
    timeout: Duration,
    languages: Vec<Language>,
    keep_files: bool,
}

impl CodeExecutionConfig {
    /// Returns a builder with the default settings.
    #[inline]
    pub fn builder() -> CodeExecutionConfigBuilder {
        CodeExecutionConfigBuilder::default()
    }

    /// The directory scripts are written to and run in.
    #[inline]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// How many of the most recent messages are scanned for code.
    #[inline]
    pub fn last_n_messages(&self) -> usize {
        self.last_n_messages
    }

    /// How long a single block may run.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether scripts are left in the work directory after running.
    #[inline]
    pub fn keep_files(&self) -> bool {
        self.keep_files
    }

    /// Returns the language a block tag maps to, if it is allowed here.
    pub fn resolve(&self, tag: Option<&str>) -> Option<Language> {
        let language = Language::from_tag(tag?)?;
        self.languages.contains(&language).then_some(language)
    }
}

impl Default for CodeExecutionConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("extensions"),
            last_n_messages: 1,
            timeout: Duration::from_secs(600),
            languages: vec![Language::Shell, Language::Python],
            keep_files: false,
        }
    }
}

/// [`CodeExecutionConfig`] builder.
#[derive(Default)]
pub struct CodeExecutionConfigBuilder {
    config: CodeExecutionConfig,
}

impl CodeExecutionConfigBuilder {
    /// Sets the work directory. It is created on first use.
    #[inline]
    pub fn with_work_dir<P: Into<PathBuf>>(mut self, work_dir: P) -> Self {
        self.config.work_dir = work_dir.into();
        self
    }

    /// Sets how many recent messages are scanned for code.
    #[inline]
    pub fn with_last_n_messages(mut self, n: usize) -> Self {
        self.config.last_n_messages = n;
        self
    }

    /// Sets the per-block timeout.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Restricts the languages that are executed.
    #[inline]
    pub fn with_languages<I>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = Language>,
    {
        self.config.languages = languages.into_iter().collect();
        self
    }

    /// Keeps the script files after running them.
    #[inline]
    pub fn keep_files(mut self, keep_files: bool) -> Self {
        self.config.keep_files = keep_files;
        self
    }

    /// Validates and builds the config.
    pub fn build(self) -> Result<CodeExecutionConfig> {
        let config = self.config;
        if config.last_n_messages == 0 {
            return Err(Error::invalid_config()
                .with_reason("`last_n_messages` must be at least 1"));
        }
        if config.timeout.is_zero() {
            return Err(
                Error::invalid_config().with_reason("`timeout` must be positive")
            );
        }
        if config.languages.is_empty() {
            return Err(Error::invalid_config()
                .with_reason("at least one language must be allowed"));
        }
        if config.work_dir.as_os_str().is_empty() {
            return Err(
                Error::invalid_config().with_reason("`work_dir` must not be empty")
            );
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_language_tags() {
        assert_eq!(Language::from_tag("bash"), Some(Language::Shell));
        assert_eq!(Language::from_tag("Python3"), Some(Language::Python));
        assert_eq!(Language::from_tag("rust"), None);

        let config = CodeExecutionConfig::builder()
            .with_languages([Language::Python])
            .build()
            .unwrap();
        assert_eq!(config.resolve(Some("py")), Some(Language::Python));
        assert_eq!(config.resolve(Some("sh")), None);
        assert_eq!(config.resolve(None), None);
    }

    #[test]
    fn test_build_validation() {
        let config = CodeExecutionConfig::builder().build().unwrap();
        assert_eq!(config.work_dir(), Path::new("extensions"));
        assert_eq!(config.last_n_messages(), 1);

        let invalid = [
            CodeExecutionConfig::builder().with_last_n_messages(0),
            CodeExecutionConfig::builder().with_timeout(Duration::ZERO),
            CodeExecutionConfig::builder().with_languages([]),
            CodeExecutionConfig::builder().with_work_dir(""),
        ];
        for builder in invalid {
            let err = builder.build().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        }
    }
}
