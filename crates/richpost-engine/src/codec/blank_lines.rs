//! The blank-line scheme layered over plain markdown.
//!
//! Stored posts write every logical line as its own paragraph (followed by
//! an empty line) and spell an intentionally empty line as [`SENTINEL`].
//! Ordinary renderers would otherwise fold runs of empty lines into one
//! gap. Fenced code is exempt in both directions: its lines are written
//! with single newlines and read back verbatim.

use crate::transform::block::Fence;

/// Marker for an intentionally empty line.
pub const SENTINEL: &str = "&nbsp;";

/// Turns logical lines (blocks joined by `\n`) into stored text.
pub fn encode(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(raw.len() * 2);
    let mut fence: Option<Fence> = None;
    for line in raw.split('\n') {
        if let Some(f) = &fence {
            out.push_str(line);
            if f.closes(line) {
                fence = None;
                out.push_str("\n\n");
            } else {
                out.push('\n');
            }
            continue;
        }
        if line.is_empty() {
            out.push_str(SENTINEL);
            out.push_str("\n\n");
        } else if let Some(f) = Fence::open(line) {
            out.push_str(line);
            out.push('\n');
            fence = Some(f);
        } else {
            out.push_str(line);
            out.push_str("\n\n");
        }
    }
    out
}

/// A logical line and the 1-based stored line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    pub number: usize,
    pub text: String,
}

/// Turns stored text back into logical lines.
///
/// A run of `n` empty lines between two content lines stands for `n / 2`
/// empty logical lines, so the single separator written by [`encode`]
/// vanishes. Leading and trailing empty lines are dropped. `\r\n` is
/// accepted.
pub fn decode_lines(text: &str) -> Vec<LogicalLine> {
    let text = text.replace("\r\n", "\n");
    let mut out = Vec::new();
    let mut fence: Option<Fence> = None;
    let mut blanks = 0usize;
    let mut blank_start = 0usize;
    let mut seen_content = false;

    for (idx, line) in text.split('\n').enumerate() {
        let number = idx + 1;
        if let Some(f) = &fence {
            if f.closes(line) {
                fence = None;
            }
            out.push(LogicalLine {
                number,
                text: line.to_string(),
            });
            continue;
        }
        if line.is_empty() {
            if blanks == 0 {
                blank_start = number;
            }
            blanks += 1;
            continue;
        }
        if seen_content {
            for _ in 0..blanks / 2 {
                out.push(LogicalLine {
                    number: blank_start,
                    text: String::new(),
                });
            }
        }
        blanks = 0;
        seen_content = true;
        if line.trim() == SENTINEL {
            out.push(LogicalLine {
                number,
                text: String::new(),
            });
            continue;
        }
        fence = Fence::open(line);
        out.push(LogicalLine {
            number,
            text: line.to_string(),
        });
    }
    out
}

/// [`decode_lines`] joined back into one string.
pub fn decode(text: &str) -> String {
    decode_lines(text)
        .into_iter()
        .map(|l| l.text)
        .collect::<Vec<_>>()
        .join("\n")
}
