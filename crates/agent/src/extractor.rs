//! Tool-call extraction from a finished turn's full text.
//!
//! The model embeds its invocation as a JSON object in free text, which
//! makes parsing inherently best-effort: three strategies are tried in
//! order and every failure mode collapses to "no invocation found". The
//! extractor never panics and never returns an error.

use crate::marker::find_ci;
use std::ops::Range;

/// A parsed `{name, arguments}` call, with the byte range of the text it
/// was extracted from (kept for diagnostics).
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: serde_json::Value,
    pub source_span: Range<usize>,
}

pub struct ToolCallExtractor {
    fence_marker: String,
}

impl ToolCallExtractor {
    pub fn new(fence_marker: impl Into<String>) -> Self {
        Self {
            fence_marker: fence_marker.into(),
        }
    }

    /// Strategies in order: fenced block, whole text, brace-balance scan.
    /// First success wins; `None` means the turn carries no invocation.
    pub fn extract(&self, text: &str) -> Option<ToolInvocation> {
        self.fenced(text)
            .or_else(|| Self::whole_text(text))
            .or_else(|| Self::brace_scan(text))
    }

    /// A brace-balanced object inside a fence opened by the marker.
    fn fenced(&self, text: &str) -> Option<ToolInvocation> {
        let (_, fence_end) = find_ci(text, &self.fence_marker)?;
        let rel = text[fence_end..].find('{')?;
        let start = fence_end + rel;
        let end = balanced_object_end(text, start)?;
        let (name, arguments) = parse_candidate(&text[start..end])?;
        Some(ToolInvocation {
            name,
            arguments,
            source_span: start..end,
        })
    }

    /// The trimmed text is itself exactly one object.
    fn whole_text(text: &str) -> Option<ToolInvocation> {
        let trimmed = text.trim();
        if !trimmed.starts_with('{') || !trimmed.ends_with('}') {
            return None;
        }
        let start = text.len() - text.trim_start().len();
        if balanced_object_end(text, start)? != start + trimmed.len() {
            return None;
        }
        let (name, arguments) = parse_candidate(trimmed)?;
        Some(ToolInvocation {
            name,
            arguments,
            source_span: start..start + trimmed.len(),
        })
    }

    /// Walk every opening brace; first balanced candidate that parses and
    /// names a tool wins.
    fn brace_scan(text: &str) -> Option<ToolInvocation> {
        for (start, c) in text.char_indices() {
            if c != '{' {
                continue;
            }
            if let Some(end) = balanced_object_end(text, start)
                && let Some((name, arguments)) = parse_candidate(&text[start..end])
            {
                return Some(ToolInvocation {
                    name,
                    arguments,
                    source_span: start..end,
                });
            }
        }
        None
    }
}

/// End offset (exclusive) of the object opening at `start`, tracking
/// string literals and escapes so braces inside strings don't count.
fn balanced_object_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (off, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start + off + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Strict decode first, then a permissive one; the candidate must name a
/// tool (`tool` or `name`) and its arguments (`args` or `arguments`)
/// must be an object when present.
fn parse_candidate(raw: &str) -> Option<(String, serde_json::Value)> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .or_else(|_| serde_json::from_str(&lenient_normalize(raw)))
        .ok()?;
    let name = value
        .get("tool")
        .or_else(|| value.get("name"))?
        .as_str()?
        .to_string();
    let arguments = match value.get("args").or_else(|| value.get("arguments")) {
        Some(serde_json::Value::Object(map)) => serde_json::Value::Object(map.clone()),
        Some(serde_json::Value::Null) | None => serde_json::json!({}),
        Some(_) => return None,
    };
    Some((name, arguments))
}

/// Tolerate the two deviations small models actually produce: single
/// quotes as string delimiters and trailing commas.
fn lenient_normalize(raw: &str) -> String {
    let mut requoted = String::with_capacity(raw.len());
    let mut in_double = false;
    let mut in_single = false;
    let mut escaped = false;
    for c in raw.chars() {
        if escaped {
            requoted.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                requoted.push(c);
                escaped = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                requoted.push(c);
            }
            '\'' if !in_double => {
                in_single = !in_single;
                requoted.push('"');
            }
            _ => requoted.push(c),
        }
    }

    // Second pass: drop commas whose next significant char closes a scope.
    let mut out = String::with_capacity(requoted.len());
    let mut in_string = false;
    escaped = false;
    let chars: Vec<char> = requoted.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => {
                out.push(c);
                escaped = true;
            }
            '"' => {
                in_string = !in_string;
                out.push(c);
            }
            ',' if !in_string => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}
