//! Links, images, rules and block-type changes.

use crate::error::{EditorError, Result};
use crate::model::{Document, HeadingLevel, ListKind, NodeKey, NodeKind};
use crate::selection::{self, Point, Selection, runs, split_at};

use super::format::text_spans;
use super::text::{delete_in_block, flatten_newlines, lift_list_item, move_inline_after};
use super::history::Change;
use super::{Editor, Patch, is_code_block, list_kind};

/// What the toolbar's block dropdown can turn a block into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockType {
    Paragraph,
    Heading(HeadingLevel),
    Quote,
    Code { language: Option<String> },
    BulletList,
    NumberedList,
}

impl BlockType {
    /// The node kind for the non-list types.
    fn text_kind(&self) -> Option<NodeKind> {
        match self {
            BlockType::Paragraph => Some(NodeKind::Paragraph),
            BlockType::Heading(level) => Some(NodeKind::heading(*level)),
            BlockType::Quote => Some(NodeKind::Quote),
            BlockType::Code { language } => Some(NodeKind::CodeBlock {
                language: language.clone(),
            }),
            BlockType::BulletList | BlockType::NumberedList => None,
        }
    }

    fn list(&self) -> Option<bool> {
        match self {
            BlockType::BulletList => Some(false),
            BlockType::NumberedList => Some(true),
            _ => None,
        }
    }
}

/// Where an inserted image ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePlacement {
    AtSelection(NodeKey),
    Appended(NodeKey),
}

impl ImagePlacement {
    pub fn key(self) -> NodeKey {
        match self {
            ImagePlacement::AtSelection(k) | ImagePlacement::Appended(k) => k,
        }
    }
}

pub(crate) enum Placement {
    Before(NodeKey),
    After(NodeKey),
    Replace(NodeKey),
}

/// Finds (or makes) room for a new top-level block at `at`. A text block
/// with the caret in its middle is split in two.
pub(crate) fn make_room(doc: &mut Document, at: Point) -> Result<Placement> {
    let kind = doc.kind(at.block)?.clone();
    if kind.is_leaf_block() {
        return Ok(if at.offset == 0 {
            Placement::Before(at.block)
        } else {
            Placement::After(at.block)
        });
    }
    if let NodeKind::ListItem = kind {
        let list = doc
            .parent(at.block)
            .ok_or(EditorError::NodeNotFound(at.block))?;
        return Ok(Placement::After(list));
    }
    let len = selection::block_len(doc, at.block)?;
    if len == 0 && kind == NodeKind::Paragraph {
        return Ok(Placement::Replace(at.block));
    }
    if at.offset == 0 {
        return Ok(Placement::Before(at.block));
    }
    if at.offset >= len {
        return Ok(Placement::After(at.block));
    }
    let tail = doc.create(kind);
    doc.insert_after(at.block, tail)?;
    move_inline_after(doc, at.block, at.offset, tail)?;
    Ok(Placement::After(at.block))
}

pub(crate) fn place(doc: &mut Document, placement: Placement, node: NodeKey) -> Result<()> {
    match placement {
        Placement::Before(k) => doc.insert_before(k, node),
        Placement::After(k) => doc.insert_after(k, node),
        Placement::Replace(k) => doc.replace(k, node),
    }
}

/// Puts an inline node at a char offset of a text block.
pub(crate) fn place_inline(
    doc: &mut Document,
    block: NodeKey,
    offset: usize,
    node: NodeKey,
) -> Result<()> {
    split_at(doc, block, offset)?;
    let children = doc.children(block)?;
    let mut idx = children.len();
    let mut pos = 0;
    for (i, &child) in children.iter().enumerate() {
        if pos >= offset {
            idx = i;
            break;
        }
        pos += doc.text_content(child).chars().count();
    }
    doc.insert_at(block, idx, node)
}

/// Dissolves the link that `offset` sits strictly inside, if any.
fn unwrap_link_at(doc: &mut Document, block: NodeKey, offset: usize) -> Result<()> {
    let spans = runs(doc, block)?;
    let inside = spans.iter().find_map(|r| {
        let link = r.link?;
        let straddles = r.contains_strictly(offset)
            || (r.end == offset
                && r.start < r.end
                && spans
                    .iter()
                    .any(|o| o.start == offset && o.start < o.end && o.link == Some(link)));
        straddles.then_some(link)
    });
    if let Some(link) = inside {
        for child in doc.children(link)?.to_vec() {
            doc.insert_before(link, child)?;
        }
        doc.remove(link)?;
    }
    Ok(())
}

/// Converts one selectable block; returns the key the block's text now
/// lives under.
pub(crate) fn set_block_of(
    doc: &mut Document,
    block: NodeKey,
    target: &BlockType,
) -> Result<NodeKey> {
    let kind = doc.kind(block)?.clone();
    if !kind.is_text_block() {
        return Ok(block);
    }
    let mut block = block;
    if kind == NodeKind::ListItem {
        let list = doc.parent(block).ok_or(EditorError::NodeNotFound(block))?;
        let same = match (doc.kind(list)?, target.list()) {
            (NodeKind::List { kind: ListKind::Bullet }, Some(false)) => true,
            (NodeKind::List { kind: ListKind::Ordered { .. } }, Some(true)) => true,
            _ => false,
        };
        if same {
            return Ok(block);
        }
        block = lift_list_item(doc, block)?;
    }

    if let Some(numbered) = target.list() {
        flatten_newlines(doc, block)?;
        let list = doc.create(NodeKind::List {
            kind: list_kind(numbered, 1),
        });
        doc.insert_before(block, list)?;
        let item = doc.append_new(list, NodeKind::ListItem)?;
        for child in doc.children(block)?.to_vec() {
            doc.append(item, child)?;
        }
        doc.remove(block)?;
        return Ok(item);
    }

    let Some(new_kind) = target.text_kind() else {
        return Ok(block);
    };
    if let NodeKind::CodeBlock { .. } = new_kind
        && !is_code_block(doc, block)
    {
        let text = doc.text_content(block);
        for child in doc.children(block)?.to_vec() {
            doc.remove(child)?;
        }
        doc.retag(block, new_kind)?;
        if !text.is_empty() {
            doc.append_new(block, NodeKind::plain(text))?;
        }
        return Ok(block);
    }
    if !matches!(new_kind, NodeKind::CodeBlock { .. }) {
        flatten_newlines(doc, block)?;
    }
    doc.retag(block, new_kind)?;
    Ok(block)
}

impl Editor {
    /// Inserts a new top-level block at the caret (after deleting any
    /// selection).
    fn insert_block_node(&mut self, kind: NodeKind) -> Result<NodeKey> {
        let (caret, _) = self.take_selection()?;
        let placement = make_room(&mut self.document, caret)?;
        let node = self.document.create(kind);
        place(&mut self.document, placement, node)?;
        self.collapse_to(Point::new(node, 1));
        Ok(node)
    }

    /// Inserts an image at the selection, or appends it as the last block
    /// when there is no valid selection.
    pub fn insert_image(&mut self, src: &str, alt_text: &str) -> Result<ImagePlacement> {
        if self.require_selection().is_ok() {
            let key = self.insert_block_node(NodeKind::image(src, alt_text))?;
            return Ok(ImagePlacement::AtSelection(key));
        }
        self.selection = None;
        let root = self.document.root();
        let key = self
            .document
            .append_new(root, NodeKind::image(src, alt_text))?;
        Ok(ImagePlacement::Appended(key))
    }

    /// [`Editor::insert_image`] as a complete transaction.
    pub fn place_image(&mut self, src: &str, alt_text: &str) -> Result<(ImagePlacement, Patch)> {
        self.transact(|ed| Ok((ed.insert_image(src, alt_text)?, Change::Edit)))
    }

    pub(crate) fn insert_horizontal_rule(&mut self) -> Result<bool> {
        self.insert_block_node(NodeKind::HorizontalRule)?;
        Ok(true)
    }

    /// Wraps the selection in a link. At a caret, inserts a link labelled
    /// with its own URL and puts the caret after it.
    pub(crate) fn insert_link(&mut self, url: &str) -> Result<bool> {
        let (start, end) = self.range()?;
        if start == end {
            return self.insert_link_at_caret(start, url);
        }
        let spans = text_spans(&self.document, start, end)?;
        let mut focus = None;
        for &(block, from, to) in &spans {
            let label = selection::text_between(&self.document, block, from, to).replace('\n', " ");
            let label_len = label.chars().count();
            delete_in_block(&mut self.document, block, from, to)?;
            unwrap_link_at(&mut self.document, block, from)?;
            let link = self.document.create(NodeKind::link(url));
            self.document.append_new(link, NodeKind::plain(label))?;
            place_inline(&mut self.document, block, from, link)?;
            focus = Some(Point::new(block, from + label_len));
        }
        let Some(focus) = focus else {
            return Ok(false);
        };
        let anchor = spans
            .first()
            .map_or(focus, |&(block, from, _)| Point::new(block, from));
        self.selection = Some(Selection::new(anchor, focus));
        Ok(true)
    }

    fn insert_link_at_caret(&mut self, at: Point, url: &str) -> Result<bool> {
        if url.is_empty() {
            return Ok(false);
        }
        if is_code_block(&self.document, at.block) {
            return self.insert_text(&format!("[{url}]({url})"));
        }
        let url_len = url.chars().count();
        if !self.document.kind(at.block)?.is_text_block() {
            // Typing on a leaf opens a paragraph; link what was typed.
            self.insert_text(url)?;
            let end = self.require_selection()?.focus;
            let start = Point::new(end.block, end.offset.saturating_sub(url_len));
            self.selection = Some(Selection::new(start, end));
            let changed = self.insert_link(url)?;
            self.collapse_to(end);
            return Ok(changed);
        }
        unwrap_link_at(&mut self.document, at.block, at.offset)?;
        let link = self.document.create(NodeKind::link(url));
        self.document.append_new(link, NodeKind::plain(url))?;
        place_inline(&mut self.document, at.block, at.offset, link)?;
        self.collapse_to(Point::new(at.block, at.offset + url_len));
        Ok(true)
    }

    /// Changes the type of every block the selection touches.
    pub(crate) fn set_block(&mut self, target: &BlockType) -> Result<bool> {
        let sel = self.require_selection()?;
        let (start, end) = sel.ordered(&self.document)?;
        let blocks = selection::selectable_blocks(&self.document);
        let i = selection::index_of(&self.document, start.block)?;
        let j = selection::index_of(&self.document, end.block)?;
        let mut moved = Vec::new();
        for &block in &blocks[i..=j] {
            let now = set_block_of(&mut self.document, block, target)?;
            if now != block {
                moved.push((block, now));
            }
        }
        let remap = |p: Point| {
            moved
                .iter()
                .find(|(old, _)| *old == p.block)
                .map_or(p, |&(_, new)| Point::new(new, p.offset))
        };
        self.selection = Some(Selection::new(remap(sel.anchor), remap(sel.focus)));
        Ok(true)
    }
}
