// src/llm/extraction.rs
// Extraction helpers for LLM responses that wrap JSON in prose

use crate::error::{MnemoError, Result};

/// Find the first balanced `[…]` outside quoted strings.
///
/// Models routinely emit prose around the array they were asked for; this
/// scans for the first top-level bracket pair, honouring string literals
/// and escapes.
pub fn first_balanced_array(text: &str) -> Option<&str> {
    first_balanced(text, '[', ']')
}

/// Find the first balanced `{…}` outside quoted strings
pub fn first_balanced_object(text: &str) -> Option<&str> {
    first_balanced(text, '{', '}')
}

fn first_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            c if c == open => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            c if c == close => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        let s = start?;
                        return Some(&text[s..i + ch.len_utf8()]);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a concept list out of an LLM response.
///
/// Accepts prose around the array, flattens one level of nesting, drops
/// empty strings, and stringifies scalar non-strings. Balanced segments
/// that aren't valid JSON (e.g. a leading `[JSON]` tag) are skipped and
/// the scan continues. Empty input returns `[]`; input with no parseable
/// balanced array is a `ParseError`.
pub fn parse_concepts(text: &str) -> Result<Vec<String>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut rest = text;
    let items = loop {
        let raw = first_balanced_array(rest).ok_or_else(|| {
            MnemoError::Parse("no balanced JSON array in concept response".to_string())
        })?;
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Array(items)) => break items,
            _ => {
                // skip this segment and keep scanning
                let offset = raw.as_ptr() as usize - rest.as_ptr() as usize;
                rest = &rest[offset + raw.len()..];
            }
        }
    };

    let mut concepts = Vec::new();
    for item in &items {
        match item {
            serde_json::Value::Array(nested) => {
                for inner in nested {
                    push_concept(&mut concepts, inner);
                }
            }
            other => push_concept(&mut concepts, other),
        }
    }
    Ok(concepts)
}

fn push_concept(out: &mut Vec<String>, value: &serde_json::Value) {
    let text = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        // objects/null inside a concept list carry no usable label
        _ => return,
    };
    if !text.is_empty() && !out.contains(&text) {
        out.push(text);
    }
}

/// Hedging tokens that lower hypothesis confidence
const HEDGES: &[&str] = &[
    "might", "may", "perhaps", "possibly", "likely", "unclear", "uncertain", "speculat",
    "could be", "not sure", "unknown", "hypothetical",
];

/// Deterministic confidence heuristic for a hypothetical answer.
///
/// Starts from response length (longer answers carry more committed
/// content, saturating around 400 chars) and subtracts a penalty per
/// distinct hedging token. Result is clamped to [0.05, 0.95].
pub fn estimate_confidence(text: &str) -> f32 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.05;
    }
    let length_score = (trimmed.len() as f32 / 400.0).min(1.0) * 0.7 + 0.2;
    let lower = trimmed.to_lowercase();
    let hedge_count = HEDGES.iter().filter(|h| lower.contains(*h)).count() as f32;
    (length_score - hedge_count * 0.1).clamp(0.05, 0.95)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_array_plain() {
        assert_eq!(first_balanced_array(r#"["a","b"]"#), Some(r#"["a","b"]"#));
    }

    #[test]
    fn test_balanced_array_with_prose() {
        let text = r#"Sure! Here are the concepts: ["alpha", "beta"], hope that helps."#;
        assert_eq!(first_balanced_array(text), Some(r#"["alpha", "beta"]"#));
    }

    #[test]
    fn test_balanced_array_ignores_brackets_in_strings() {
        let text = r#"["a]b", "c"]"#;
        assert_eq!(first_balanced_array(text), Some(r#"["a]b", "c"]"#));
    }

    #[test]
    fn test_balanced_array_handles_escapes() {
        let text = r#"["quote \" and ] bracket", "x"]"#;
        assert_eq!(first_balanced_array(text), Some(text));
    }

    #[test]
    fn test_balanced_array_none() {
        assert_eq!(first_balanced_array("no json here"), None);
        assert_eq!(first_balanced_array("unclosed [1, 2"), None);
    }

    #[test]
    fn test_parse_concepts_flattens_one_level() {
        let text = r#"[JSON] [["a","b"],["c"]]"#;
        assert_eq!(parse_concepts(text).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_concepts_empty_input() {
        assert_eq!(parse_concepts("").unwrap(), Vec::<String>::new());
        assert_eq!(parse_concepts("   ").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_parse_concepts_drops_empties_and_dupes() {
        let text = r#"["a", "", "a", "  ", "b"]"#;
        assert_eq!(parse_concepts(text).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_concepts_no_array_is_parse_error() {
        let err = parse_concepts("the model refused").unwrap_err();
        assert_eq!(err.code(), "PARSE_ERROR");
        // a balanced but non-JSON segment alone doesn't count either
        let err = parse_concepts("[not json]").unwrap_err();
        assert_eq!(err.code(), "PARSE_ERROR");
    }

    #[test]
    fn test_parse_concepts_stringifies_scalars() {
        let text = r#"["a", 42, true]"#;
        assert_eq!(parse_concepts(text).unwrap(), vec!["a", "42", "true"]);
    }

    #[test]
    fn test_balanced_object() {
        let text = r#"prefix {"k": "v{}"} suffix"#;
        assert_eq!(first_balanced_object(text), Some(r#"{"k": "v{}"}"#));
    }

    #[test]
    fn test_confidence_hedging_lowers_score() {
        let confident = "The capital of France is Paris. It has been the capital since 987 \
                         and hosts the national government, parliament, and judiciary.";
        let hedged = "It might be Paris, but this is uncertain and possibly wrong.";
        assert!(estimate_confidence(confident) > estimate_confidence(hedged));
    }

    #[test]
    fn test_confidence_bounds() {
        assert_eq!(estimate_confidence(""), 0.05);
        let long = "word ".repeat(500);
        let c = estimate_confidence(&long);
        assert!(c <= 0.95 && c > 0.5);
        let c2 = estimate_confidence("might may perhaps possibly unclear uncertain unknown");
        assert!(c2 >= 0.05);
    }

    #[test]
    fn test_confidence_is_deterministic() {
        let text = "Atlantis may have been located near Santorini.";
        assert_eq!(estimate_confidence(text), estimate_confidence(text));
    }
}
