//! Caret and selection positions over the document model.
//!
//! A [`Point`] names a *selectable* block and a char offset into it. Text
//! blocks (paragraphs, headings, quotes, code blocks, list items) count the
//! chars of their flattened inline text; leaf blocks (images, rules) have
//! exactly two positions, before (`0`) and after (`1`).

use std::cmp::Ordering;

use crate::error::{EditorError, Result};
use crate::model::{Document, NodeKey, NodeKind, TextFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub block: NodeKey,
    pub offset: usize,
}

impl Point {
    pub fn new(block: NodeKey, offset: usize) -> Self {
        Self { block, offset }
    }
}

/// An anchor/focus pair. The anchor is where the selection started, so it
/// may come after the focus in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn caret(point: Point) -> Self {
        Self::new(point, point)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// Both ends in document order.
    pub fn ordered(&self, doc: &Document) -> Result<(Point, Point)> {
        match compare(doc, self.anchor, self.focus)? {
            Ordering::Greater => Ok((self.focus, self.anchor)),
            _ => Ok((self.anchor, self.focus)),
        }
    }

    pub fn validate(&self, doc: &Document) -> Result<()> {
        validate(doc, self.anchor)?;
        validate(doc, self.focus)
    }
}

pub fn is_selectable(doc: &Document, key: NodeKey) -> bool {
    let Some(kind) = doc.get(key) else {
        return false;
    };
    (kind.is_text_block() || kind.is_leaf_block()) && doc.top_level_block(key).is_some()
}

/// Blocks a caret can sit in, in document order. List items stand in for
/// their lists.
pub fn selectable_blocks(doc: &Document) -> Vec<NodeKey> {
    let mut out = Vec::new();
    for &block in doc.blocks() {
        match doc.get(block) {
            Some(NodeKind::List { .. }) => {
                if let Ok(items) = doc.children(block) {
                    out.extend_from_slice(items);
                }
            }
            Some(_) => out.push(block),
            None => {}
        }
    }
    out
}

/// Number of caret positions past the start of `block`.
pub fn block_len(doc: &Document, block: NodeKey) -> Result<usize> {
    let kind = doc.kind(block)?;
    if kind.is_leaf_block() {
        Ok(1)
    } else if kind.is_text_block() {
        Ok(doc.text_content(block).chars().count())
    } else {
        Err(EditorError::InvalidSelection)
    }
}

pub fn validate(doc: &Document, point: Point) -> Result<()> {
    if !is_selectable(doc, point.block) || point.offset > block_len(doc, point.block)? {
        return Err(EditorError::InvalidSelection);
    }
    Ok(())
}

/// Index of `block` in [`selectable_blocks`].
pub fn index_of(doc: &Document, block: NodeKey) -> Result<usize> {
    selectable_blocks(doc)
        .iter()
        .position(|&b| b == block)
        .ok_or(EditorError::InvalidSelection)
}

pub fn compare(doc: &Document, a: Point, b: Point) -> Result<Ordering> {
    if a.block == b.block {
        return Ok(a.offset.cmp(&b.offset));
    }
    Ok(index_of(doc, a.block)?.cmp(&index_of(doc, b.block)?))
}

pub fn start_of(block: NodeKey) -> Point {
    Point::new(block, 0)
}

pub fn end_of(doc: &Document, block: NodeKey) -> Result<Point> {
    Ok(Point::new(block, block_len(doc, block)?))
}

pub fn previous_block(doc: &Document, block: NodeKey) -> Option<NodeKey> {
    let blocks = selectable_blocks(doc);
    let idx = blocks.iter().position(|&b| b == block)?;
    idx.checked_sub(1).map(|i| blocks[i])
}

pub fn next_block(doc: &Document, block: NodeKey) -> Option<NodeKey> {
    let blocks = selectable_blocks(doc);
    let idx = blocks.iter().position(|&b| b == block)?;
    blocks.get(idx + 1).copied()
}

/// A text run inside a text block and the chars it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSpan {
    pub key: NodeKey,
    pub start: usize,
    pub end: usize,
    pub format: TextFormat,
    /// The link wrapping this run, if any.
    pub link: Option<NodeKey>,
}

impl RunSpan {
    pub fn contains_strictly(&self, offset: usize) -> bool {
        self.start < offset && offset < self.end
    }
}

/// The runs of `block` in order, links flattened.
pub fn runs(doc: &Document, block: NodeKey) -> Result<Vec<RunSpan>> {
    let mut out = Vec::new();
    let mut pos = 0;
    for &child in doc.children(block)? {
        match doc.kind(child)? {
            NodeKind::Text { text, format } => {
                let end = pos + text.chars().count();
                out.push(RunSpan {
                    key: child,
                    start: pos,
                    end,
                    format: *format,
                    link: None,
                });
                pos = end;
            }
            NodeKind::Link { .. } => {
                for &inner in doc.children(child)? {
                    if let NodeKind::Text { text, format } = doc.kind(inner)? {
                        let end = pos + text.chars().count();
                        out.push(RunSpan {
                            key: inner,
                            start: pos,
                            end,
                            format: *format,
                            link: Some(child),
                        });
                        pos = end;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(out)
}

/// Byte index of the `n`th char (or the end).
pub(crate) fn byte_at(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

pub(crate) fn run_text(doc: &Document, key: NodeKey) -> Result<&str> {
    match doc.kind(key)? {
        NodeKind::Text { text, .. } => Ok(text),
        other => Err(EditorError::StructuralViolation {
            parent: other.name(),
            child: "text",
        }),
    }
}

/// Makes sure no run straddles `offset` in `block`, splitting one if needed.
pub fn split_at(doc: &mut Document, block: NodeKey, offset: usize) -> Result<()> {
    let Some(run) = runs(doc, block)?
        .into_iter()
        .find(|r| r.contains_strictly(offset))
    else {
        return Ok(());
    };
    let text = run_text(doc, run.key)?;
    let cut = byte_at(text, offset - run.start);
    let (left, right) = (text[..cut].to_string(), text[cut..].to_string());
    doc.set_text(run.key, left)?;
    let tail = doc.create(NodeKind::text(right, run.format));
    doc.insert_after(run.key, tail)
}

/// Plain text of `block` between two char offsets.
pub fn text_between(doc: &Document, block: NodeKey, from: usize, to: usize) -> String {
    doc.text_content(block)
        .chars()
        .skip(from)
        .take(to.saturating_sub(from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ListKind;
    use pretty_assertions::assert_eq;

    fn sample() -> (Document, NodeKey, NodeKey, NodeKey, NodeKey) {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.append_new(root, NodeKind::Paragraph).unwrap();
        doc.append_new(p, NodeKind::plain("ab")).unwrap();
        let link = doc.append_new(p, NodeKind::link("u")).unwrap();
        doc.append_new(link, NodeKind::text("cd", TextFormat::BOLD))
            .unwrap();
        let img = doc.append_new(root, NodeKind::image("s", "a")).unwrap();
        let list = doc
            .append_new(root, NodeKind::List { kind: ListKind::Bullet })
            .unwrap();
        let item = doc.append_new(list, NodeKind::ListItem).unwrap();
        doc.append_new(item, NodeKind::plain("x")).unwrap();
        (doc, p, link, img, item)
    }

    #[test]
    fn test_selectable_blocks_flatten_lists() {
        let (doc, p, _, img, item) = sample();
        assert_eq!(selectable_blocks(&doc), vec![p, img, item]);
    }

    #[test]
    fn test_runs_see_through_links() {
        let (doc, p, link, _, _) = sample();
        let spans = runs(&doc, p).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!((spans[0].start, spans[0].end, spans[0].link), (0, 2, None));
        assert_eq!((spans[1].start, spans[1].end, spans[1].link), (2, 4, Some(link)));
    }

    #[test]
    fn test_split_at_inside_link() {
        let (mut doc, p, link, _, _) = sample();
        split_at(&mut doc, p, 3).unwrap();
        assert_eq!(doc.children(link).unwrap().len(), 2);
        assert_eq!(doc.text_content(p), "abcd");
        // on a boundary nothing happens
        split_at(&mut doc, p, 2).unwrap();
        assert_eq!(runs(&doc, p).unwrap().len(), 3);
    }

    #[test]
    fn test_split_at_counts_chars() {
        let mut doc = Document::new();
        let p = doc.append_new(doc.root(), NodeKind::Paragraph).unwrap();
        let t = doc.append_new(p, NodeKind::plain("héllo")).unwrap();
        split_at(&mut doc, p, 2).unwrap();
        assert_eq!(run_text(&doc, t).unwrap(), "hé");
    }

    #[test]
    fn test_ordering_and_validation() {
        let (doc, p, _, img, item) = sample();
        let sel = Selection::new(Point::new(item, 1), Point::new(p, 1));
        assert_eq!(
            sel.ordered(&doc).unwrap(),
            (Point::new(p, 1), Point::new(item, 1))
        );
        assert!(validate(&doc, Point::new(img, 1)).is_ok());
        assert!(validate(&doc, Point::new(img, 2)).is_err());
        assert!(validate(&doc, Point::new(p, 5)).is_err());
        assert!(validate(&doc, Point::new(doc.root(), 0)).is_err());
    }

    #[test]
    fn test_neighbours() {
        let (doc, p, _, img, item) = sample();
        assert_eq!(previous_block(&doc, p), None);
        assert_eq!(next_block(&doc, p), Some(img));
        assert_eq!(previous_block(&doc, item), Some(img));
        assert_eq!(text_between(&doc, p, 1, 3), "bc");
    }
}
