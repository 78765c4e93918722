//! JSON with comments
//!
//! Bundle descriptors may carry `//` and `/* */` comments; they are stripped
//! before the content is handed to `serde_json`.

/// Strip JSONC comments from content
///
/// Comment markers inside string literals are preserved, including strings
/// with escaped quotes.
pub fn strip_comments(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut in_single_comment = false;
    let mut in_multi_comment = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_single_comment {
            if c == '\n' {
                in_single_comment = false;
                result.push(c);
            }
        } else if in_multi_comment {
            if c == '*' && chars.peek() == Some(&'/') {
                in_multi_comment = false;
                chars.next();
            } else if c == '\n' {
                // keep line numbers stable for parse errors
                result.push(c);
            }
        } else if in_string {
            result.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else {
            match (c, chars.peek()) {
                ('/', Some('/')) => {
                    in_single_comment = true;
                    chars.next();
                }
                ('/', Some('*')) => {
                    in_multi_comment = true;
                    chars.next();
                }
                ('"', _) => {
                    in_string = true;
                    result.push(c);
                }
                _ => result.push(c),
            }
        }
    }

    result
}

/// Parse JSONC content into a JSON value
pub fn parse(content: &str) -> serde_json::Result<serde_json::Value> {
    serde_json::from_str(&strip_comments(content))
}
