use crate::error::{EditorError, Result};
use crate::model::{Document, NodeKey, NodeKind, TextFormat};

use super::{escape_destination, escape_text, CodeSpan, Emphasis, Run};

/// Writes runs as markdown, opening and closing emphasis delimiters as the
/// format changes from one run to the next.
///
/// Open delimiters form a stack in [`Emphasis::ORDER`]; a format change
/// closes everything above the longest shared prefix and reopens the rest,
/// so the output is always properly nested.
#[derive(Debug, Default)]
pub struct InlineWriter {
    out: String,
    open: Vec<TextFormat>,
}

impl InlineWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_format(&mut self, format: TextFormat) {
        let desired: Vec<TextFormat> = Emphasis::ORDER
            .into_iter()
            .filter(|&f| format.contains(f))
            .collect();
        let common = self
            .open
            .iter()
            .zip(&desired)
            .take_while(|(a, b)| a == b)
            .count();
        while self.open.len() > common {
            if let Some(f) = self.open.pop() {
                self.out.push_str(Emphasis::delimiter(f));
            }
        }
        for &f in &desired[common..] {
            self.out.push_str(Emphasis::delimiter(f));
            self.open.push(f);
        }
    }

    /// Writes one run. `before_link` escapes a trailing `!` that would
    /// otherwise turn the following link into an image.
    pub fn text(&mut self, text: &str, format: TextFormat, before_link: bool) {
        self.set_format(format);
        if format.contains(TextFormat::CODE) {
            write_code_span(text, &mut self.out);
        } else if before_link && let Some(head) = text.strip_suffix('!') {
            escape_text(head, &mut self.out);
            self.out.push_str("\\!");
        } else {
            escape_text(text, &mut self.out);
        }
    }

    pub fn link(&mut self, url: &str, label: &[Run]) {
        self.set_format(TextFormat::PLAIN);
        let mut inner = InlineWriter::new();
        for run in label {
            inner.text(&run.text, run.format, false);
        }
        self.out.push('[');
        self.out.push_str(&inner.finish());
        self.out.push_str("](");
        self.out.push_str(&escape_destination(url));
        self.out.push(')');
    }

    pub fn finish(mut self) -> String {
        self.set_format(TextFormat::PLAIN);
        self.out
    }
}

fn write_code_span(text: &str, out: &mut String) {
    let text = text.replace('\n', " ");
    let mut longest = 0;
    let mut run = 0;
    for b in text.bytes() {
        if b == CodeSpan::TICK {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    let fence = "`".repeat(longest + 1);
    let all_spaces = text.bytes().all(|b| b == b' ');
    let pad = text.starts_with('`')
        || text.ends_with('`')
        || (!all_spaces && text.starts_with(' ') && text.ends_with(' '));
    out.push_str(&fence);
    if pad {
        out.push(' ');
    }
    out.push_str(&text);
    if pad {
        out.push(' ');
    }
    out.push_str(&fence);
}

/// Text runs under a link, in order.
pub(crate) fn link_runs(doc: &Document, link: NodeKey) -> Result<Vec<Run>> {
    doc.children(link)?
        .iter()
        .map(|&c| match doc.kind(c)? {
            NodeKind::Text { text, format } => Ok(Run::new(text.clone(), *format)),
            other => Err(EditorError::StructuralViolation {
                parent: "link",
                child: other.name(),
            }),
        })
        .collect()
}

/// Serialises the inline children of a text block.
pub fn export_inline(doc: &Document, block: NodeKey) -> Result<String> {
    let children = doc.children(block)?;
    let mut w = InlineWriter::new();
    for (i, &child) in children.iter().enumerate() {
        let before_link = children
            .get(i + 1)
            .is_some_and(|&n| matches!(doc.get(n), Some(NodeKind::Link { .. })));
        match doc.kind(child)? {
            NodeKind::Text { text, format } => w.text(text, *format, before_link),
            NodeKind::Link { url } => w.link(url, &link_runs(doc, child)?),
            other => {
                return Err(EditorError::StructuralViolation {
                    parent: doc.kind(block)?.name(),
                    child: other.name(),
                });
            }
        }
    }
    Ok(w.finish())
}
