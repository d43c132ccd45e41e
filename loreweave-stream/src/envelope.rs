//! Token envelope extraction.
//!
//! The narration service wraps every generated token in a JSON fragment with
//! a `"text": "…"` field. [`EnvelopeScanner`] pulls those values out of the
//! raw channel as chunks arrive. It is a resumable state machine: each input
//! character is examined once, and a field split at any point across chunks
//! is still recognised.

use tracing::warn;

const KEY: &[char] = &['"', 't', 'e', 'x', 't', '"'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Looking for `"text"`; `matched` characters of the key seen so far.
    Key { matched: usize },
    /// Key seen, waiting for `:`.
    Colon,
    /// Colon seen, waiting for the opening quote.
    Quote,
    /// Inside the string value.
    Value,
    /// Directly after a backslash inside the value.
    Escape,
}

/// Resumable extractor for `"text"` field values.
#[derive(Debug, Clone)]
pub struct EnvelopeScanner {
    state: ScanState,
    raw_value: String,
    consumed: usize,
}

impl Default for EnvelopeScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeScanner {
    /// A scanner at the start of a channel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ScanState::Key { matched: 0 },
            raw_value: String::new(),
            consumed: 0,
        }
    }

    /// Total bytes of raw input processed.
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Feed newly arrived raw input, appending each completed and unescaped
    /// field value to `out`. Returns the number of values completed.
    pub fn push(&mut self, chunk: &str, out: &mut String) -> usize {
        let mut completed = 0;
        for ch in chunk.chars() {
            if self.step(ch, out) {
                completed += 1;
            }
        }
        self.consumed += chunk.len();
        completed
    }

    fn step(&mut self, ch: char, out: &mut String) -> bool {
        match self.state {
            ScanState::Key { matched } => {
                if ch == KEY[matched] {
                    self.state = if matched + 1 == KEY.len() {
                        ScanState::Colon
                    } else {
                        ScanState::Key { matched: matched + 1 }
                    };
                } else {
                    self.restart(ch);
                }
                false
            }
            ScanState::Colon => {
                if ch == ':' {
                    self.state = ScanState::Quote;
                } else if !ch.is_whitespace() {
                    self.restart(ch);
                }
                false
            }
            ScanState::Quote => {
                if ch == '"' {
                    self.raw_value.clear();
                    self.state = ScanState::Value;
                } else if !ch.is_whitespace() {
                    self.restart(ch);
                }
                false
            }
            ScanState::Value => match ch {
                '\\' => {
                    self.raw_value.push(ch);
                    self.state = ScanState::Escape;
                    false
                }
                '"' => {
                    out.push_str(&unescape(&self.raw_value));
                    self.raw_value.clear();
                    self.state = ScanState::Key { matched: 0 };
                    true
                }
                _ => {
                    self.raw_value.push(ch);
                    false
                }
            },
            ScanState::Escape => {
                self.raw_value.push(ch);
                self.state = ScanState::Value;
                false
            }
        }
    }

    /// Mismatch: `ch` may itself open a new key.
    fn restart(&mut self, ch: char) {
        self.state = ScanState::Key {
            matched: usize::from(ch == KEY[0]),
        };
    }
}

/// Decode a JSON string body. Undecodable escapes fall back to the raw text.
#[must_use]
pub fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    match serde_json::from_str::<String>(&format!("\"{raw}\"")) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, token = raw, "Undecodable token escape, using raw text");
            raw.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(chunks: &[&str]) -> String {
        let mut scanner = EnvelopeScanner::new();
        let mut out = String::new();
        for chunk in chunks {
            scanner.push(chunk, &mut out);
        }
        out
    }

    #[test]
    fn extracts_values_in_order() {
        let raw = r#"{"text":"Hello"}{"text": " world"}"#;
        assert_eq!(scan_all(&[raw]), "Hello world");
    }

    #[test]
    fn value_split_across_chunks() {
        assert_eq!(scan_all(&[r#"{"te"#, r#"xt" :  "Hel"#, r#"lo"}"#]), "Hello");
    }

    #[test]
    fn escapes_are_decoded() {
        let raw = r#"{"text":"<narrative>\"Hi\"\né</narrative>"}"#;
        assert_eq!(scan_all(&[raw]), "<narrative>\"Hi\"\n\u{e9}</narrative>");
    }

    #[test]
    fn escaped_quote_split_at_backslash() {
        assert_eq!(scan_all(&[r#"{"text":"a\"#, r#""b"}"#]), "a\"b");
    }

    #[test]
    fn other_fields_are_ignored() {
        let raw = r#"{"type":"token","context":"x","text":"ok","textual":"no"}"#;
        assert_eq!(scan_all(&[raw]), "ok");
    }

    #[test]
    fn bad_escape_falls_back_to_raw() {
        assert_eq!(scan_all(&[r#"{"text":"bad \q escape"}"#]), r"bad \q escape");
    }

    #[test]
    fn consumed_counts_bytes() {
        let mut scanner = EnvelopeScanner::new();
        let mut out = String::new();
        scanner.push("{\"text\":\"é\"}", &mut out);
        assert_eq!(scanner.consumed(), 13);
        assert_eq!(out, "é");
    }
}
