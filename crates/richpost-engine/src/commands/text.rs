//! Typing, deleting, Enter and caret movement.

use crate::error::Result;
use crate::model::{Document, ListKind, NodeKey, NodeKind, TextFormat};
use crate::selection::{self, Point, RunSpan, Selection, byte_at, run_text, runs, split_at};

use super::{Editor, is_code_block};

/// Deletes chars `from..to` of a text block.
pub(crate) fn delete_in_block(
    doc: &mut Document,
    block: NodeKey,
    from: usize,
    to: usize,
) -> Result<()> {
    if from >= to {
        return Ok(());
    }
    split_at(doc, block, from)?;
    split_at(doc, block, to)?;
    for run in runs(doc, block)? {
        if run.start >= from && run.end <= to {
            doc.remove(run.key)?;
        }
    }
    doc.normalize_inline(block)
}

/// Format that text typed at `offset` picks up: the run to its left, or the
/// first run at the start of the block.
pub(crate) fn format_at(doc: &Document, block: NodeKey, offset: usize) -> Result<TextFormat> {
    let spans = runs(doc, block)?;
    let left = spans
        .iter()
        .rev()
        .find(|r| r.start < offset && offset <= r.end);
    let chosen = left.or_else(|| spans.iter().find(|r| r.start < r.end));
    Ok(chosen.map_or(TextFormat::PLAIN, |r| r.format))
}

fn append_text(doc: &mut Document, run: NodeKey, text: &str) -> Result<()> {
    let mut s = run_text(doc, run)?.to_string();
    s.push_str(text);
    doc.set_text(run, s)
}

fn prepend_text(doc: &mut Document, run: NodeKey, text: &str) -> Result<()> {
    let s = format!("{text}{}", run_text(doc, run)?);
    doc.set_text(run, s)
}

/// Inserts `text` at a char offset of a text block.
///
/// The text joins a neighbouring run of the same format when there is one.
/// It only lands inside a link when the offset is strictly inside that
/// link, so typing at a link's edge extends the surrounding text instead.
pub(crate) fn insert_in_block(
    doc: &mut Document,
    block: NodeKey,
    offset: usize,
    text: &str,
    format: TextFormat,
) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    let format = if is_code_block(doc, block) {
        TextFormat::PLAIN
    } else {
        format
    };
    let spans = runs(doc, block)?;
    if let Some(run) = spans.iter().find(|r| r.contains_strictly(offset)) {
        if run.format == format {
            let mut s = run_text(doc, run.key)?.to_string();
            s.insert_str(byte_at(&s, offset - run.start), text);
            return doc.set_text(run.key, s);
        }
        split_at(doc, block, offset)?;
    }

    let spans = runs(doc, block)?;
    let left: Option<RunSpan> = spans
        .iter()
        .rev()
        .find(|r| r.end == offset && r.start < r.end)
        .copied();
    let right: Option<RunSpan> = spans
        .iter()
        .find(|r| r.start == offset && r.start < r.end)
        .copied();

    if let (Some(l), Some(r)) = (left, right)
        && l.link.is_some()
        && l.link == r.link
    {
        if l.format == format {
            return append_text(doc, l.key, text);
        }
        let node = doc.create(NodeKind::text(text, format));
        return doc.insert_after(l.key, node);
    }
    if let Some(l) = left
        && l.link.is_none()
        && l.format == format
    {
        return append_text(doc, l.key, text);
    }
    if let Some(r) = right
        && r.link.is_none()
        && r.format == format
    {
        return prepend_text(doc, r.key, text);
    }
    let node = doc.create(NodeKind::text(text, format));
    match left {
        Some(l) => doc.insert_after(l.link.unwrap_or(l.key), node),
        None => doc.insert_at(block, 0, node),
    }
}

/// Moves everything after `offset` in `block` to the (empty) block
/// `target`. A link that straddles the offset is split in two.
pub(crate) fn move_inline_after(
    doc: &mut Document,
    block: NodeKey,
    offset: usize,
    target: NodeKey,
) -> Result<()> {
    split_at(doc, block, offset)?;
    let mut pos = 0;
    for child in doc.children(block)?.to_vec() {
        let len = doc.text_content(child).chars().count();
        let start = pos;
        pos += len;
        if start >= offset {
            doc.append(target, child)?;
            continue;
        }
        if pos > offset
            && let NodeKind::Link { url } = doc.kind(child)?.clone()
        {
            let tail = doc.append_new(target, NodeKind::Link { url })?;
            let mut inner_pos = start;
            for inner in doc.children(child)?.to_vec() {
                if inner_pos >= offset {
                    doc.append(tail, inner)?;
                }
                inner_pos += doc.text_content(inner).chars().count();
            }
        }
    }
    doc.normalize_inline(block)?;
    doc.normalize_inline(target)
}

/// Appends the content of `source` to `target` and removes `source`.
///
/// Code blocks only take plain text; text leaving a code block has its
/// newlines turned into spaces.
pub(crate) fn merge_blocks(doc: &mut Document, target: NodeKey, source: NodeKey) -> Result<()> {
    let target_code = is_code_block(doc, target);
    if target_code || is_code_block(doc, source) {
        let mut text = doc.text_content(source);
        if !target_code {
            text = text.replace('\n', " ");
        }
        let end = selection::block_len(doc, target)?;
        insert_in_block(doc, target, end, &text, TextFormat::PLAIN)?;
    } else {
        for child in doc.children(source)?.to_vec() {
            doc.append(target, child)?;
        }
    }
    doc.remove(source)?;
    doc.normalize_inline(target)
}

/// Replaces newlines in a block's runs with spaces.
pub(crate) fn flatten_newlines(doc: &mut Document, block: NodeKey) -> Result<()> {
    for run in runs(doc, block)? {
        let text = run_text(doc, run.key)?;
        if text.contains('\n') {
            let flat = text.replace('\n', " ");
            doc.set_text(run.key, flat)?;
        }
    }
    Ok(())
}

/// Turns a list item into a paragraph placed between the items before it
/// and the items after it. Returns the paragraph.
pub(crate) fn lift_list_item(doc: &mut Document, item: NodeKey) -> Result<NodeKey> {
    let list = doc
        .parent(item)
        .ok_or(crate::error::EditorError::NodeNotFound(item))?;
    let NodeKind::List { kind } = *doc.kind(list)? else {
        return Err(crate::error::EditorError::StructuralViolation {
            parent: doc.kind(list)?.name(),
            child: "listitem",
        });
    };
    let siblings = doc.children(list)?.to_vec();
    let idx = siblings.iter().position(|&k| k == item).unwrap_or(0);
    let after = siblings[idx + 1..].to_vec();

    let paragraph = doc.create(NodeKind::Paragraph);
    doc.insert_after(list, paragraph)?;
    for child in doc.children(item)?.to_vec() {
        doc.append(paragraph, child)?;
    }
    doc.remove(item)?;

    if !after.is_empty() {
        let kind = match kind {
            ListKind::Bullet => ListKind::Bullet,
            ListKind::Ordered { start } => ListKind::Ordered {
                start: start.saturating_add(u32::try_from(idx + 1).unwrap_or(u32::MAX)),
            },
        };
        let rest = doc.create(NodeKind::List { kind });
        doc.insert_after(paragraph, rest)?;
        for moved in after {
            doc.append(rest, moved)?;
        }
    }
    Ok(paragraph)
}

/// Removes a leaf block and returns where the caret goes.
pub(crate) fn remove_leaf(doc: &mut Document, leaf: NodeKey) -> Result<Point> {
    let prev = selection::previous_block(doc, leaf);
    let next = selection::next_block(doc, leaf);
    doc.remove(leaf)?;
    match (prev, next) {
        (Some(p), _) => selection::end_of(doc, p),
        (None, Some(n)) => Ok(selection::start_of(n)),
        (None, None) => {
            let p = doc.append_new(doc.root(), NodeKind::Paragraph)?;
            Ok(selection::start_of(p))
        }
    }
}

/// Deletes everything between two ordered points.
pub(crate) fn delete_range(doc: &mut Document, start: Point, end: Point) -> Result<Point> {
    let start_leaf = doc.kind(start.block)?.is_leaf_block();
    if start.block == end.block {
        if start_leaf {
            return if start.offset < end.offset {
                remove_leaf(doc, start.block)
            } else {
                Ok(start)
            };
        }
        delete_in_block(doc, start.block, start.offset, end.offset)?;
        return Ok(start);
    }

    let blocks = selection::selectable_blocks(doc);
    let i = selection::index_of(doc, start.block)?;
    let j = selection::index_of(doc, end.block)?;
    for &b in &blocks[i + 1..j] {
        doc.remove(b)?;
    }

    let end_leaf = doc.kind(end.block)?.is_leaf_block();
    let start_removed = start_leaf && start.offset == 0;
    let end_removed = end_leaf && end.offset == 1;
    let placeholder = if start_removed && end_removed {
        let p = doc.create(NodeKind::Paragraph);
        doc.insert_before(start.block, p)?;
        Some(p)
    } else {
        None
    };

    if end_removed {
        doc.remove(end.block)?;
    } else if !end_leaf {
        delete_in_block(doc, end.block, 0, end.offset)?;
    }
    if start_removed {
        doc.remove(start.block)?;
    } else if !start_leaf {
        let len = selection::block_len(doc, start.block)?;
        delete_in_block(doc, start.block, start.offset, len)?;
    }

    if !start_leaf && !end_leaf {
        merge_blocks(doc, start.block, end.block)?;
        return Ok(start);
    }
    Ok(match placeholder {
        Some(p) => selection::start_of(p),
        None if start_removed => selection::start_of(end.block),
        None => start,
    })
}

/// Enter at `at`; returns the caret afterwards.
pub(crate) fn split_block_at(doc: &mut Document, at: Point) -> Result<Point> {
    let kind = doc.kind(at.block)?.clone();
    if kind.is_leaf_block() {
        let p = doc.create(NodeKind::Paragraph);
        if at.offset == 0 {
            doc.insert_before(at.block, p)?;
            return Ok(at);
        }
        doc.insert_after(at.block, p)?;
        return Ok(selection::start_of(p));
    }
    let len = selection::block_len(doc, at.block)?;
    let next_kind = match kind {
        NodeKind::CodeBlock { .. } => {
            insert_in_block(doc, at.block, at.offset, "\n", TextFormat::PLAIN)?;
            return Ok(Point::new(at.block, at.offset + 1));
        }
        NodeKind::ListItem if len == 0 => {
            let p = lift_list_item(doc, at.block)?;
            return Ok(selection::start_of(p));
        }
        NodeKind::ListItem => NodeKind::ListItem,
        NodeKind::Heading { level } if at.offset < len => NodeKind::Heading { level },
        _ => NodeKind::Paragraph,
    };
    let next = doc.create(next_kind);
    doc.insert_after(at.block, next)?;
    move_inline_after(doc, at.block, at.offset, next)?;
    Ok(selection::start_of(next))
}

impl Editor {
    /// Deletes a non-collapsed selection. Returns the caret and whether
    /// anything was removed.
    pub(crate) fn take_selection(&mut self) -> Result<(Point, bool)> {
        let (start, end) = self.range()?;
        if start == end {
            return Ok((start, false));
        }
        let caret = delete_range(&mut self.document, start, end)?;
        Ok((caret, true))
    }

    /// A text position for typing at `at`: a caret on a leaf block gets a
    /// fresh paragraph on that side of it.
    fn text_position(&mut self, at: Point) -> Result<Point> {
        if !self.document.kind(at.block)?.is_leaf_block() {
            return Ok(at);
        }
        let p = self.document.create(NodeKind::Paragraph);
        if at.offset == 0 {
            self.document.insert_before(at.block, p)?;
        } else {
            self.document.insert_after(at.block, p)?;
        }
        Ok(selection::start_of(p))
    }

    pub(crate) fn insert_text(&mut self, text: &str) -> Result<bool> {
        let (caret, deleted) = self.take_selection()?;
        if text.is_empty() {
            self.collapse_to(caret);
            return Ok(deleted);
        }
        let mut caret = self.text_position(caret)?;
        let format = format_at(&self.document, caret.block, caret.offset)? ^ self.pending;
        let lines: Vec<&str> = if is_code_block(&self.document, caret.block) {
            vec![text]
        } else {
            text.split('\n').collect()
        };
        for (i, line) in lines.into_iter().enumerate() {
            if i > 0 {
                caret = split_block_at(&mut self.document, caret)?;
            }
            insert_in_block(&mut self.document, caret.block, caret.offset, line, format)?;
            caret.offset += line.chars().count();
        }
        self.pending = TextFormat::PLAIN;
        self.collapse_to(caret);
        Ok(true)
    }

    pub(crate) fn delete_selection(&mut self) -> Result<bool> {
        let (caret, deleted) = self.take_selection()?;
        self.collapse_to(caret);
        Ok(deleted)
    }

    pub(crate) fn split_block(&mut self) -> Result<bool> {
        let (caret, _) = self.take_selection()?;
        let caret = split_block_at(&mut self.document, caret)?;
        self.collapse_to(caret);
        Ok(true)
    }

    /// Backspace.
    pub(crate) fn delete_backward(&mut self) -> Result<bool> {
        let sel = self.require_selection()?;
        if !sel.is_collapsed() {
            return self.delete_selection();
        }
        let at = sel.focus;
        let kind = self.document.kind(at.block)?.clone();

        if kind.is_leaf_block() && at.offset == 1 {
            let caret = remove_leaf(&mut self.document, at.block)?;
            self.collapse_to(caret);
            return Ok(true);
        }
        if at.offset > 0 {
            delete_in_block(&mut self.document, at.block, at.offset - 1, at.offset)?;
            self.collapse_to(Point::new(at.block, at.offset - 1));
            return Ok(true);
        }

        match kind {
            NodeKind::Heading { .. } | NodeKind::Quote => {
                self.document.retag(at.block, NodeKind::Paragraph)?;
                Ok(true)
            }
            NodeKind::CodeBlock { .. } => {
                flatten_newlines(&mut self.document, at.block)?;
                self.document.retag(at.block, NodeKind::Paragraph)?;
                Ok(true)
            }
            NodeKind::ListItem => {
                let p = lift_list_item(&mut self.document, at.block)?;
                self.collapse_to(selection::start_of(p));
                Ok(true)
            }
            _ => {
                let Some(prev) = selection::previous_block(&self.document, at.block) else {
                    return Ok(false);
                };
                if self.document.kind(prev)?.is_leaf_block() {
                    self.document.remove(prev)?;
                    return Ok(true);
                }
                let prev_end = selection::end_of(&self.document, prev)?;
                if kind.is_leaf_block() {
                    if prev_end.offset == 0 {
                        self.document.remove(prev)?;
                        return Ok(true);
                    }
                    self.collapse_to(prev_end);
                    return Ok(false);
                }
                merge_blocks(&mut self.document, prev, at.block)?;
                self.collapse_to(prev_end);
                Ok(true)
            }
        }
    }

    fn step_back(&self, p: Point) -> Result<Point> {
        if p.offset > 0 {
            return Ok(Point::new(p.block, p.offset - 1));
        }
        match selection::previous_block(&self.document, p.block) {
            Some(b) => selection::end_of(&self.document, b),
            None => Ok(p),
        }
    }

    fn step_forward(&self, p: Point) -> Result<Point> {
        if p.offset < selection::block_len(&self.document, p.block)? {
            return Ok(Point::new(p.block, p.offset + 1));
        }
        Ok(selection::next_block(&self.document, p.block)
            .map_or(p, selection::start_of))
    }

    fn move_focus(&mut self, extend: bool, forward: bool) -> Result<bool> {
        let sel = self.require_selection()?;
        if !extend && !sel.is_collapsed() {
            let (start, end) = sel.ordered(&self.document)?;
            self.collapse_to(if forward { end } else { start });
        } else {
            let to = if forward {
                self.step_forward(sel.focus)?
            } else {
                self.step_back(sel.focus)?
            };
            self.selection = Some(if extend {
                Selection::new(sel.anchor, to)
            } else {
                Selection::caret(to)
            });
        }
        self.pending = TextFormat::PLAIN;
        Ok(false)
    }

    pub(crate) fn move_left(&mut self, extend: bool) -> Result<bool> {
        self.move_focus(extend, false)
    }

    pub(crate) fn move_right(&mut self, extend: bool) -> Result<bool> {
        self.move_focus(extend, true)
    }

    pub(crate) fn select_all(&mut self) -> Result<bool> {
        let blocks = selection::selectable_blocks(&self.document);
        let (Some(&first), Some(&last)) = (blocks.first(), blocks.last()) else {
            return Ok(false);
        };
        let end = selection::end_of(&self.document, last)?;
        self.selection = Some(Selection::new(selection::start_of(first), end));
        self.pending = TextFormat::PLAIN;
        Ok(false)
    }
}
