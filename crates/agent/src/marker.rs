//! Bounded-lookback marker matching.
//!
//! Markers arrive split across arbitrary chunk boundaries, so every scan
//! works over the unemitted tail of the buffer plus a fixed backtrack
//! window. Comparison is case-insensitive character by character; a
//! lowercased copy would shift byte offsets for characters like `É`.

/// How many characters before the unemitted region a scan backs up.
/// Enough to re-see a marker whose head was already emitted.
pub const LOOKBACK_CHARS: usize = 25;

pub(crate) fn chars_eq_ci(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Case-insensitive prefix test.
pub(crate) fn starts_with_ci(haystack: &str, needle: &str) -> bool {
    let mut hay = haystack.chars();
    needle
        .chars()
        .all(|nc| hay.next().is_some_and(|hc| chars_eq_ci(hc, nc)))
}

/// First case-insensitive occurrence of `needle`; returns the byte range
/// of the match within `haystack`.
pub(crate) fn find_ci(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    for (start, _) in haystack.char_indices() {
        let mut end = start;
        let mut hay = haystack[start..].chars();
        let mut matched = true;
        for nc in needle.chars() {
            match hay.next() {
                Some(hc) if chars_eq_ci(hc, nc) => end += hc.len_utf8(),
                _ => {
                    matched = false;
                    break;
                }
            }
        }
        if matched {
            return Some((start, end));
        }
    }
    None
}

/// Byte offset `n_chars` characters before `from` (clamped to the start).
pub(crate) fn back_up(s: &str, from: usize, n_chars: usize) -> usize {
    let mut offset = from;
    for _ in 0..n_chars {
        match s[..offset].char_indices().next_back() {
            Some((idx, _)) => offset = idx,
            None => return 0,
        }
    }
    offset
}

/// Outcome of matching the answer pattern at a fixed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerMatch {
    /// Matched; the byte offset just past the marker (and one following
    /// space, if present).
    Complete(usize),
    /// The input ran out while the pattern could still complete.
    Partial,
    No,
}

/// What ended the thought segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    /// The configured answer marker; already consumed into the thought.
    Marker,
    /// A blank line; the answer marker may still follow it.
    BlankLine,
}

#[derive(Debug, Clone, Copy)]
pub struct Split {
    /// Byte offset where the message segment begins.
    pub end: usize,
    pub kind: SplitKind,
}

/// Detects the thought→message transition: the configured answer marker
/// (optionally wrapped in `*` emphasis, optional spaces, then a colon)
/// or a blank line.
#[derive(Debug, Clone)]
pub struct AnswerMatcher {
    marker: String,
}

impl AnswerMatcher {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// Earliest split past `unemitted_from`. The marker itself stays on
    /// the thought side, along with one space after the colon.
    ///
    /// Scans from `LOOKBACK_CHARS` characters before `unemitted_from` so a
    /// marker straddling a chunk boundary is still caught; a match that
    /// ended inside already-emitted text clamps to `unemitted_from`, since
    /// emitted thought cannot be retracted.
    pub fn split_point(&self, buffer: &str, unemitted_from: usize) -> Option<Split> {
        let scan_start = back_up(buffer, unemitted_from, LOOKBACK_CHARS);
        for (off, _) in buffer[scan_start..].char_indices() {
            let pos = scan_start + off;
            let split = if buffer[pos..].starts_with("\n\n") {
                Some(Split {
                    end: pos + 2,
                    kind: SplitKind::BlankLine,
                })
            } else if let MarkerMatch::Complete(end) = self.match_at(buffer, pos, false) {
                Some(Split {
                    end,
                    kind: SplitKind::Marker,
                })
            } else {
                None
            };
            if let Some(mut split) = split {
                split.end = split.end.max(unemitted_from);
                return Some(split);
            }
        }
        None
    }

    /// Match the answer pattern anchored at `pos`: `*`* marker `*`/space*
    /// `:` and optionally one space. With `at_end` false, running out of
    /// input mid-pattern reports [`MarkerMatch::Partial`].
    pub fn match_at(&self, buffer: &str, pos: usize, at_end: bool) -> MarkerMatch {
        let exhausted = || {
            if at_end {
                MarkerMatch::No
            } else {
                MarkerMatch::Partial
            }
        };
        let mut it = buffer[pos..].char_indices().peekable();
        loop {
            match it.peek() {
                Some(&(_, '*')) => {
                    it.next();
                }
                Some(_) => break,
                None => return exhausted(),
            }
        }
        for mc in self.marker.chars() {
            match it.next() {
                Some((_, c)) if chars_eq_ci(c, mc) => {}
                Some(_) => return MarkerMatch::No,
                None => return exhausted(),
            }
        }
        loop {
            match it.peek() {
                Some(&(_, c)) if c == '*' || c == ' ' => {
                    it.next();
                }
                Some(_) => break,
                None => return exhausted(),
            }
        }
        match it.next() {
            Some((colon_off, ':')) => match it.peek() {
                Some(&(space_off, ' ')) => MarkerMatch::Complete(pos + space_off + 1),
                Some(_) => MarkerMatch::Complete(pos + colon_off + 1),
                None if at_end => MarkerMatch::Complete(pos + colon_off + 1),
                None => MarkerMatch::Partial,
            },
            Some(_) => MarkerMatch::No,
            None => exhausted(),
        }
    }
}
