//! Fenced code block extraction
//!
//! A textual heuristic, not a markdown parser: the first ```` ```python ````
//! fence wins, then the first fence of any kind, then the whole response.

const PYTHON_FENCE: &str = "```python";
const FENCE: &str = "```";

/// Language tags dropped from the first line of a generic fence
const LANGUAGE_TAGS: &[&str] = &[
    "py", "py3", "python3", "pycon", "ipython", "bash", "sh", "shell", "console", "json",
    "yaml", "yml", "toml", "ini", "text", "txt", "plaintext",
];

/// Pull the source text out of a model response.
///
/// Returns the trimmed body of the selected fence, or the trimmed input
/// when there is no fence at all. An opening fence with no closing marker
/// yields everything after it, which is what a response cut off at the
/// token limit looks like.
pub fn extract_code(content: &str) -> &str {
    let opened = content
        .split_once(PYTHON_FENCE)
        .or_else(|| content.split_once(FENCE))
        .map(|(_, rest)| rest);

    let Some(rest) = opened else {
        return content.trim();
    };

    let rest = skip_info_string(rest);
    match rest.split_once(FENCE) {
        Some((body, _)) => body.trim(),
        None => {
            tracing::warn!(bytes = rest.len(), "Code fence never closed, keeping the remainder");
            rest.trim()
        }
    }
}

/// Drop the remainder of the opening fence line when it is a language tag.
fn skip_info_string(rest: &str) -> &str {
    match rest.split_once('\n') {
        Some((line, body)) if is_info_string(line) => body,
        _ => rest,
    }
}

fn is_info_string(line: &str) -> bool {
    let tag = line.trim();
    tag.is_empty() || LANGUAGE_TAGS.iter().any(|known| tag.eq_ignore_ascii_case(known))
}
