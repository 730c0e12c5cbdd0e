//! Incremental stream classification.
//!
//! The model's output for one turn is a single stream of text chunks that
//! interleaves hidden reasoning, user-visible prose and possibly an
//! embedded tool block. The classifier partitions that stream on the fly
//! so the transport can forward thought and message tokens as they
//! arrive, while the tool block is suppressed entirely and recovered
//! later from the full buffer.
//!
//! Invariant: concatenating every emitted chunk with the hidden span,
//! reinserted at its original offset, reconstructs the buffer exactly.

use crate::marker::{AnswerMatcher, MarkerMatch, SplitKind, back_up, find_ci, starts_with_ci};

/// Undecided START content defaults to message once the buffer grows past
/// this many characters. Long enough to recognize a reasoning marker.
const START_THRESHOLD_CHARS: usize = 10;

/// Classification of one emitted chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkTag {
    Thought,
    Message,
}

/// A contiguous run of classified text, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedChunk {
    pub tag: ChunkTag,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    /// Buffer too short to classify; emission withheld.
    Start,
    /// Inside hidden reasoning, watching for the answer marker.
    Thought,
    /// User-visible prose, emitted verbatim.
    Message,
    /// A tool block opened; nothing further is emitted this turn.
    ToolHiding,
}

/// One classifier instance per generation turn.
pub struct StreamClassifier {
    buffer: String,
    /// Everything before this byte offset has been emitted.
    emitted_until: usize,
    /// Set when a tool block is detected; start of the hidden span.
    hidden_from: Option<usize>,
    state: StreamState,
    /// After a blank-line split the answer marker may still open the
    /// message segment; if so it is absorbed into the thought.
    awaiting_answer_marker: bool,
    thought_marker: String,
    answer: AnswerMatcher,
    tool_marker: String,
}

impl StreamClassifier {
    pub fn new(
        thought_marker: impl Into<String>,
        answer_marker: impl Into<String>,
        tool_marker: impl Into<String>,
    ) -> Self {
        Self {
            buffer: String::new(),
            emitted_until: 0,
            hidden_from: None,
            state: StreamState::Start,
            awaiting_answer_marker: false,
            thought_marker: thought_marker.into(),
            answer: AnswerMatcher::new(answer_marker),
            tool_marker: tool_marker.into(),
        }
    }

    /// Feed one incoming chunk; returns the chunks to forward, in order.
    pub fn push(&mut self, chunk: &str) -> Vec<TaggedChunk> {
        let chunk_start = self.buffer.len();
        self.buffer.push_str(chunk);
        let mut out = Vec::new();

        if self.state != StreamState::ToolHiding {
            // The opening marker may straddle the chunk boundary, so back
            // up by one less than its length before scanning.
            let lookback = self.tool_marker.chars().count().saturating_sub(1);
            let scan_from = back_up(&self.buffer, chunk_start, lookback);
            if let Some((_, end)) = find_ci(&self.buffer[scan_from..], &self.tool_marker)
                && scan_from + end > chunk_start
            {
                // Everything not yet emitted becomes the hidden span, so
                // the reconstruction invariant holds even when prose and
                // tool block share a chunk.
                self.hidden_from = Some(self.emitted_until);
                self.state = StreamState::ToolHiding;
                return out;
            }
        }

        self.drain(&mut out, false);
        out
    }

    /// Classify the unemitted tail of the buffer under the current state,
    /// following transitions until nothing more can be decided.
    fn drain(&mut self, out: &mut Vec<TaggedChunk>, at_end: bool) {
        loop {
            match self.state {
                StreamState::Start => {
                    if starts_with_ci(self.buffer.trim_start(), &self.thought_marker) {
                        self.state = StreamState::Thought;
                        continue;
                    }
                    // A marker longer than the default must still get a
                    // chance to complete before the buffer defaults.
                    let threshold =
                        START_THRESHOLD_CHARS.max(self.thought_marker.chars().count());
                    if at_end || self.buffer.chars().count() > threshold {
                        self.state = StreamState::Message;
                        continue;
                    }
                    // Withhold; finish() flushes whatever never decides.
                    return;
                }
                StreamState::Thought => {
                    match self.answer.split_point(&self.buffer, self.emitted_until) {
                        Some(split) => {
                            // Marker text stays on the thought side.
                            self.emit(out, ChunkTag::Thought, split.end);
                            self.awaiting_answer_marker = split.kind == SplitKind::BlankLine;
                            self.state = StreamState::Message;
                        }
                        None => {
                            self.emit(out, ChunkTag::Thought, self.buffer.len());
                            return;
                        }
                    }
                }
                StreamState::Message => {
                    if self.awaiting_answer_marker && self.absorb_marker(out, at_end) {
                        return; // marker may still be completing
                    }
                    self.emit(out, ChunkTag::Message, self.buffer.len());
                    return;
                }
                StreamState::ToolHiding => return,
            }
        }
    }

    /// Look for the answer marker at the head of the message segment
    /// (after a blank-line thought split). Returns true while emission
    /// must stay withheld pending more input.
    fn absorb_marker(&mut self, out: &mut Vec<TaggedChunk>, at_end: bool) -> bool {
        let tail = &self.buffer[self.emitted_until..];
        let Some(rel) = tail.find(|c: char| !c.is_whitespace()) else {
            // Nothing but whitespace so far.
            if at_end {
                self.awaiting_answer_marker = false;
            }
            return !at_end;
        };
        match self
            .answer
            .match_at(&self.buffer, self.emitted_until + rel, at_end)
        {
            MarkerMatch::Complete(end) => {
                // Leading whitespace and the marker join the thought.
                self.emit(out, ChunkTag::Thought, end);
                self.awaiting_answer_marker = false;
                false
            }
            MarkerMatch::Partial => true,
            MarkerMatch::No => {
                self.awaiting_answer_marker = false;
                false
            }
        }
    }

    fn emit(&mut self, out: &mut Vec<TaggedChunk>, tag: ChunkTag, until: usize) {
        if until > self.emitted_until {
            out.push(TaggedChunk {
                tag,
                text: self.buffer[self.emitted_until..until].to_string(),
            });
            self.emitted_until = until;
        }
    }

    /// The turn's stream has ended. Flushes anything still withheld (short
    /// undecided replies, a pending marker that never completed) so no
    /// output is silently dropped.
    pub fn finish(&mut self) -> Vec<TaggedChunk> {
        let mut out = Vec::new();
        if self.state != StreamState::ToolHiding {
            self.drain(&mut out, true);
        }
        out
    }

    /// Full raw text of the turn, for extraction and tracing.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// The suppressed tool-block span, if one was detected.
    pub fn hidden_span(&self) -> Option<&str> {
        self.hidden_from.map(|from| &self.buffer[from..])
    }

    pub fn into_buffer(self) -> String {
        self.buffer
    }
}
