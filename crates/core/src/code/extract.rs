use std::sync::LazyLock;

use regex::Regex;

use super::CodeBlock;

// A fence may carry a language tag and must be followed by a line break.
// The body is matched lazily and the closing fence may be indented.
const FENCED: &str = r"```[ \t]*(\w+)?[ \t]*\r?\n(.*?)\r?\n[ \t]*```";
const INLINE: &str = r"`([^`]+)`";

static FENCED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?s){FENCED}")).expect("pattern is valid")
});

static FENCED_OR_INLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?s){FENCED}|{INLINE}")).expect("pattern is valid")
});

/// Extracts code blocks from `text`, in the order they appear.
///
/// With `detect_single_line_code`, inline spans quoted by single backticks
/// are returned as well, without a language. Text without any code gives
/// an empty vector.
pub fn extract_code(text: &str, detect_single_line_code: bool) -> Vec<CodeBlock> {
    let re = if detect_single_line_code {
        &*FENCED_OR_INLINE_RE
    } else {
        &*FENCED_RE
    };
    re.captures_iter(text)
        .filter_map(|caps| {
            if let Some(source) = caps.get(2) {
                return Some(CodeBlock {
                    language: caps.get(1).map(|m| m.as_str().to_owned()),
                    source: source.as_str().to_owned(),
                });
            }
            caps.get(3).map(|source| CodeBlock {
                language: None,
                source: source.as_str().to_owned(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_blocks() {
        let text = "Run this:\n\
                    ```python\n\
                    print('a')\n\
                    \n    print('b')\n\
                    ```\n\
                    then\n\
                    ``` sh \r\n\
                    echo hi\r\n  \
                    ```\n\
                    and\n\
                    ```\n\
                    plain\n\
                    ```";
        let blocks = extract_code(text, false);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].language(), Some("python"));
        assert_eq!(blocks[0].source(), "print('a')\n\n    print('b')");
        assert_eq!(blocks[1].language(), Some("sh"));
        assert_eq!(blocks[1].source(), "echo hi");
        assert_eq!(blocks[2].language(), None);
        assert_eq!(blocks[2].source(), "plain");
    }

    #[test]
    fn test_no_code() {
        assert!(extract_code("", false).is_empty());
        assert!(extract_code("", true).is_empty());
        assert!(extract_code("no code here, `not` fenced", false).is_empty());
        // The closing fence must start a line.
        assert!(extract_code("```sh\necho hi```", false).is_empty());
    }

    #[test]
    fn test_single_line_code() {
        let blocks = extract_code("`echo hi`", true);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language(), None);
        assert_eq!(blocks[0].source(), "echo hi");

        let text = "Try `ls` first, then:\n```bash\nls -la\n```";
        let blocks = extract_code(text, true);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].source(), "ls");
        assert_eq!(blocks[1].language(), Some("bash"));
        assert_eq!(blocks[1].source(), "ls -la");
    }
}
