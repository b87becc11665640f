//! Format toggles and the toolbar state derived from the selection.

use crate::error::Result;
use crate::model::{Document, FormatKind, NodeKind, TextFormat};
use crate::selection::{self, Point, runs, split_at};

use super::text::format_at;
use super::{Editor, is_code_block};

/// Pressed/unpressed state of the format buttons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolbarState {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub underline: bool,
    pub code: bool,
}

impl From<TextFormat> for ToolbarState {
    fn from(f: TextFormat) -> Self {
        Self {
            bold: f.contains(TextFormat::BOLD),
            italic: f.contains(TextFormat::ITALIC),
            strikethrough: f.contains(TextFormat::STRIKETHROUGH),
            underline: f.contains(TextFormat::UNDERLINE),
            code: f.contains(TextFormat::CODE),
        }
    }
}

impl ToolbarState {
    pub fn is_active(&self, kind: FormatKind) -> bool {
        match kind {
            FormatKind::Bold => self.bold,
            FormatKind::Italic => self.italic,
            FormatKind::Strikethrough => self.strikethrough,
            FormatKind::Underline => self.underline,
            FormatKind::Code => self.code,
        }
    }
}

/// Per-block char ranges covered by `start..end`, code blocks and leaves
/// skipped.
pub(crate) fn text_spans(
    doc: &Document,
    start: Point,
    end: Point,
) -> Result<Vec<(crate::model::NodeKey, usize, usize)>> {
    let blocks = selection::selectable_blocks(doc);
    let i = selection::index_of(doc, start.block)?;
    let j = selection::index_of(doc, end.block)?;
    let mut out = Vec::new();
    for &block in &blocks[i..=j] {
        let kind = doc.kind(block)?;
        if !kind.is_text_block() || is_code_block(doc, block) {
            continue;
        }
        let from = if block == start.block { start.offset } else { 0 };
        let to = if block == end.block {
            end.offset
        } else {
            selection::block_len(doc, block)?
        };
        if from < to {
            out.push((block, from, to));
        }
    }
    Ok(out)
}

/// Swaps every run inside the given spans for a fresh run carrying the
/// mapped format. Run formats are never changed in place.
pub(crate) fn map_formats(
    doc: &mut Document,
    spans: &[(crate::model::NodeKey, usize, usize)],
    f: impl Fn(TextFormat) -> TextFormat,
) -> Result<()> {
    for &(block, from, to) in spans {
        split_at(doc, block, from)?;
        split_at(doc, block, to)?;
        for run in runs(doc, block)? {
            if run.start >= from && run.end <= to {
                let text = selection::run_text(doc, run.key)?.to_string();
                let fresh = doc.create(NodeKind::text(text, f(run.format)));
                doc.replace(run.key, fresh)?;
            }
        }
        doc.normalize_inline(block)?;
    }
    Ok(())
}

impl Editor {
    /// Flips `kind` on every run in the selection. On a collapsed caret the
    /// flip is remembered and applied to the next typed text instead.
    pub(crate) fn toggle_format(&mut self, kind: FormatKind) -> Result<bool> {
        let (start, end) = self.range()?;
        let flag = kind.flag();
        if start == end {
            self.pending = self.pending ^ flag;
            return Ok(false);
        }
        let spans = text_spans(&self.document, start, end)?;
        map_formats(&mut self.document, &spans, |f| f ^ flag)?;
        Ok(!spans.is_empty())
    }

    /// Formats shared by the whole selection; for a caret, the format typed
    /// text would get.
    pub fn active_formats(&self) -> Result<TextFormat> {
        let (start, end) = self.range()?;
        if start == end {
            if !self.document.kind(start.block)?.is_text_block()
                || is_code_block(&self.document, start.block)
            {
                return Ok(self.pending);
            }
            return Ok(format_at(&self.document, start.block, start.offset)? ^ self.pending);
        }
        let mut common: Option<TextFormat> = None;
        for (block, from, to) in text_spans(&self.document, start, end)? {
            for run in runs(&self.document, block)? {
                if run.end <= from || run.start >= to || run.start == run.end {
                    continue;
                }
                let bits = common.map_or(run.format.bits(), |c| c.bits() & run.format.bits());
                common = Some(TextFormat::from_bits(bits));
            }
        }
        Ok(common.unwrap_or(TextFormat::PLAIN))
    }

    /// Toolbar state for the current selection; all off when there is none.
    pub fn toolbar(&self) -> ToolbarState {
        self.active_formats().map(ToolbarState::from).unwrap_or_default()
    }
}
