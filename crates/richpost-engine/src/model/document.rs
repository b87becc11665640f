use std::collections::{HashMap, HashSet};

use crate::error::{EditorError, Result};

use super::format::TextFormat;
use super::node::{NodeKey, NodeKind};

#[derive(Debug, Clone)]
struct Slot {
    kind: NodeKind,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
}

/// Arena-backed document tree.
///
/// Every node lives in one map keyed by [`NodeKey`]; parents own an ordered
/// list of child keys and each child records its single parent. Nodes that
/// are created but not yet attached are "detached" and are reachable only
/// through the key returned by [`Document::create`].
///
/// ## Invariants
/// - Exactly one `Root`, created with the document and never removed.
/// - Every attached node has exactly one parent and appears once in that
///   parent's child list; no cycles.
/// - Parent/child pairs satisfy [`NodeKind::can_contain`].
/// - Keys are never reused, even after the node they named is removed.
///
/// Equality compares structure only (see [`Document::export_portable`]), so
/// two documents with different keys but the same content are equal.
#[derive(Debug, Clone)]
pub struct Document {
    slots: HashMap<NodeKey, Slot>,
    root: NodeKey,
    next_key: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.export_portable() == other.export_portable()
    }
}

impl Document {
    /// Creates a document holding only its root.
    pub fn new() -> Self {
        let root = NodeKey(0);
        let mut slots = HashMap::new();
        slots.insert(
            root,
            Slot {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            slots,
            root,
            next_key: 1,
        }
    }

    /// The canonical empty document: one empty paragraph.
    pub fn empty() -> Self {
        let mut doc = Self::new();
        let p = doc.create(NodeKind::Paragraph);
        doc.slots_mut_attach(doc.root, p);
        doc
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Number of nodes in the arena, detached ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks().is_empty()
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.slots.contains_key(&key)
    }

    fn slot(&self, key: NodeKey) -> Result<&Slot> {
        self.slots.get(&key).ok_or(EditorError::NodeNotFound(key))
    }

    fn slot_mut(&mut self, key: NodeKey) -> Result<&mut Slot> {
        self.slots.get_mut(&key).ok_or(EditorError::NodeNotFound(key))
    }

    /// Allocates a detached node.
    pub fn create(&mut self, kind: NodeKind) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        self.slots.insert(
            key,
            Slot {
                kind,
                parent: None,
                children: Vec::new(),
            },
        );
        key
    }

    /// Creates a node and appends it to `parent` in one step.
    pub fn append_new(&mut self, parent: NodeKey, kind: NodeKind) -> Result<NodeKey> {
        let key = self.create(kind);
        if let Err(e) = self.append(parent, key) {
            self.slots.remove(&key);
            return Err(e);
        }
        Ok(key)
    }

    pub fn kind(&self, key: NodeKey) -> Result<&NodeKind> {
        Ok(&self.slot(key)?.kind)
    }

    pub fn get(&self, key: NodeKey) -> Option<&NodeKind> {
        self.slots.get(&key).map(|s| &s.kind)
    }

    pub fn children(&self, key: NodeKey) -> Result<&[NodeKey]> {
        Ok(&self.slot(key)?.children)
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.slots.get(&key).and_then(|s| s.parent)
    }

    /// Top-level blocks in document order.
    pub fn blocks(&self) -> &[NodeKey] {
        self.slots
            .get(&self.root)
            .map(|s| s.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn index_in_parent(&self, key: NodeKey) -> Option<usize> {
        let parent = self.parent(key)?;
        self.slots
            .get(&parent)?
            .children
            .iter()
            .position(|&c| c == key)
    }

    pub fn previous_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let parent = self.parent(key)?;
        let idx = self.index_in_parent(key)?;
        let siblings = &self.slots.get(&parent)?.children;
        idx.checked_sub(1).map(|i| siblings[i])
    }

    pub fn next_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let parent = self.parent(key)?;
        let idx = self.index_in_parent(key)?;
        self.slots.get(&parent)?.children.get(idx + 1).copied()
    }

    /// True when `ancestor` is `key` or one of its parents.
    pub fn is_ancestor(&self, ancestor: NodeKey, key: NodeKey) -> bool {
        let mut cur = Some(key);
        while let Some(k) = cur {
            if k == ancestor {
                return true;
            }
            cur = self.parent(k);
        }
        false
    }

    /// The top-level block containing `key`.
    pub fn top_level_block(&self, key: NodeKey) -> Option<NodeKey> {
        let mut cur = key;
        loop {
            let parent = self.parent(cur)?;
            if parent == self.root {
                return Some(cur);
            }
            cur = parent;
        }
    }

    fn check_placement(&self, parent: NodeKey, child: NodeKey) -> Result<()> {
        let parent_kind = self.kind(parent)?;
        let child_kind = self.kind(child)?;
        if !parent_kind.can_contain(child_kind) || self.is_ancestor(child, parent) {
            return Err(EditorError::StructuralViolation {
                parent: parent_kind.name(),
                child: child_kind.name(),
            });
        }
        Ok(())
    }

    fn slots_mut_attach(&mut self, parent: NodeKey, child: NodeKey) {
        if let Some(s) = self.slots.get_mut(&child) {
            s.parent = Some(parent);
        }
        if let Some(s) = self.slots.get_mut(&parent) {
            s.children.push(child);
        }
    }

    /// Appends `child` as the last child of `parent`, moving it if it is
    /// attached elsewhere.
    pub fn append(&mut self, parent: NodeKey, child: NodeKey) -> Result<()> {
        let len = self.children(parent)?.len();
        self.insert_at(parent, len, child)
    }

    /// Inserts `child` at `index` under `parent` (clamped to the end).
    pub fn insert_at(&mut self, parent: NodeKey, index: usize, child: NodeKey) -> Result<()> {
        self.check_placement(parent, child)?;
        let mut index = index;
        if self.parent(child) == Some(parent)
            && let Some(old) = self.index_in_parent(child)
            && old < index
        {
            index -= 1;
        }
        self.detach(child)?;
        let slot = self.slot_mut(parent)?;
        let index = index.min(slot.children.len());
        slot.children.insert(index, child);
        self.slot_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn insert_before(&mut self, sibling: NodeKey, child: NodeKey) -> Result<()> {
        let parent = self.parent(sibling).ok_or(EditorError::NodeNotFound(sibling))?;
        self.detach(child)?;
        let idx = self
            .index_in_parent(sibling)
            .ok_or(EditorError::NodeNotFound(sibling))?;
        self.insert_at(parent, idx, child)
    }

    pub fn insert_after(&mut self, sibling: NodeKey, child: NodeKey) -> Result<()> {
        let parent = self.parent(sibling).ok_or(EditorError::NodeNotFound(sibling))?;
        self.detach(child)?;
        let idx = self
            .index_in_parent(sibling)
            .ok_or(EditorError::NodeNotFound(sibling))?;
        self.insert_at(parent, idx + 1, child)
    }

    /// Unlinks `key` from its parent, keeping the subtree in the arena.
    pub fn detach(&mut self, key: NodeKey) -> Result<()> {
        let Some(parent) = self.slot(key)?.parent else {
            return Ok(());
        };
        self.slot_mut(parent)?.children.retain(|&c| c != key);
        self.slot_mut(key)?.parent = None;
        Ok(())
    }

    /// Destroys `key` and its whole subtree.
    pub fn remove(&mut self, key: NodeKey) -> Result<()> {
        if key == self.root {
            return Err(EditorError::StructuralViolation {
                parent: "document",
                child: "root",
            });
        }
        self.detach(key)?;
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            if let Some(slot) = self.slots.remove(&k) {
                stack.extend(slot.children);
            }
        }
        Ok(())
    }

    /// Puts `new` where `old` is and destroys `old`.
    pub fn replace(&mut self, old: NodeKey, new: NodeKey) -> Result<()> {
        let parent = self.parent(old).ok_or(EditorError::NodeNotFound(old))?;
        self.check_placement(parent, new)?;
        self.insert_before(old, new)?;
        self.remove(old)
    }

    /// Deep copy of `key` with fresh keys; the copy is detached.
    pub fn clone_node(&mut self, key: NodeKey) -> Result<NodeKey> {
        let slot = self.slot(key)?;
        let kind = slot.kind.clone();
        let children = slot.children.clone();
        let copy = self.create(kind);
        for child in children {
            let c = self.clone_node(child)?;
            self.slots_mut_attach(copy, c);
        }
        Ok(copy)
    }

    /// Replaces the text of a text run. The format stays as it was.
    pub fn set_text(&mut self, key: NodeKey, text: impl Into<String>) -> Result<()> {
        match &mut self.slot_mut(key)?.kind {
            NodeKind::Text { text: t, .. } => {
                *t = text.into();
                Ok(())
            }
            other => Err(EditorError::StructuralViolation {
                parent: other.name(),
                child: "text",
            }),
        }
    }

    /// Changes a block's kind in place, keeping its children.
    ///
    /// Fails when the new kind cannot sit under the current parent or cannot
    /// hold the current children. Text runs are immutable and cannot be
    /// retagged; replace them instead.
    pub fn retag(&mut self, key: NodeKey, kind: NodeKind) -> Result<()> {
        let slot = self.slot(key)?;
        if matches!(slot.kind, NodeKind::Text { .. }) {
            return Err(EditorError::StructuralViolation {
                parent: "text",
                child: kind.name(),
            });
        }
        if let Some(parent) = slot.parent {
            let parent_kind = self.kind(parent)?;
            if !parent_kind.can_contain(&kind) {
                return Err(EditorError::StructuralViolation {
                    parent: parent_kind.name(),
                    child: kind.name(),
                });
            }
        }
        for &child in &slot.children {
            let child_kind = self.kind(child)?;
            if !kind.can_contain(child_kind) {
                return Err(EditorError::StructuralViolation {
                    parent: kind.name(),
                    child: child_kind.name(),
                });
            }
        }
        self.slot_mut(key)?.kind = kind;
        Ok(())
    }

    /// Concatenated text of every run under `key`.
    pub fn text_content(&self, key: NodeKey) -> String {
        let mut out = String::new();
        self.collect_text(key, &mut out);
        out
    }

    fn collect_text(&self, key: NodeKey, out: &mut String) {
        let Some(slot) = self.slots.get(&key) else {
            return;
        };
        if let NodeKind::Text { text, .. } = &slot.kind {
            out.push_str(text);
        }
        for &c in &slot.children {
            self.collect_text(c, out);
        }
    }

    /// Restores the canonical shape of the tree.
    ///
    /// - adjacent text runs with identical formats under one parent merge,
    ///   empty runs and empty links disappear
    /// - adjacent lists of the same shape merge, empty lists disappear
    /// - a document without blocks gets one empty paragraph
    /// - nodes no longer reachable from the root are freed
    pub fn normalize(&mut self) -> Result<()> {
        let blocks = self.blocks().to_vec();
        for block in blocks {
            if matches!(self.kind(block)?, NodeKind::List { .. }) {
                for item in self.children(block)?.to_vec() {
                    self.normalize_inline(item)?;
                }
            } else if self.kind(block)?.is_text_block() {
                self.normalize_inline(block)?;
            }
        }
        self.merge_lists()?;
        if self.blocks().is_empty() {
            self.append_new(self.root, NodeKind::Paragraph)?;
        }
        self.sweep();
        Ok(())
    }

    /// Frees every node that cannot be reached from the root.
    fn sweep(&mut self) {
        let mut reachable = HashSet::with_capacity(self.slots.len());
        let mut stack = vec![self.root];
        while let Some(key) = stack.pop() {
            if reachable.insert(key)
                && let Some(slot) = self.slots.get(&key)
            {
                stack.extend(slot.children.iter().copied());
            }
        }
        let before = self.slots.len();
        self.slots.retain(|key, _| reachable.contains(key));
        let freed = before - self.slots.len();
        if freed > 0 {
            log::trace!("freed {freed} detached nodes");
        }
    }

    /// Becomes `earlier`, a previous state of this document, without
    /// winding the key counter back.
    pub(crate) fn rewind_to(&mut self, earlier: Document) {
        let next_key = self.next_key.max(earlier.next_key);
        *self = earlier;
        self.next_key = next_key;
    }

    /// Merges adjacent equal-format runs and drops empty inline nodes under
    /// a text block.
    pub fn normalize_inline(&mut self, block: NodeKey) -> Result<()> {
        for child in self.children(block)?.to_vec() {
            if matches!(self.kind(child)?, NodeKind::Link { .. }) {
                self.merge_runs(child)?;
                if self.children(child)?.is_empty() {
                    self.remove(child)?;
                }
            }
        }
        self.merge_runs(block)
    }

    fn merge_runs(&mut self, parent: NodeKey) -> Result<()> {
        let children = self.children(parent)?.to_vec();
        let mut prev: Option<(NodeKey, TextFormat)> = None;
        for child in children {
            let NodeKind::Text { text, format } = self.kind(child)? else {
                prev = None;
                continue;
            };
            if text.is_empty() {
                self.remove(child)?;
                continue;
            }
            let format = *format;
            match prev {
                Some((left, left_format)) if left_format == format => {
                    let tail = text.clone();
                    let mut merged = self.text_content(left);
                    merged.push_str(&tail);
                    self.set_text(left, merged)?;
                    self.remove(child)?;
                }
                _ => prev = Some((child, format)),
            }
        }
        Ok(())
    }

    fn merge_lists(&mut self) -> Result<()> {
        let blocks = self.blocks().to_vec();
        let mut prev: Option<NodeKey> = None;
        for block in blocks {
            let NodeKind::List { kind } = *self.kind(block)? else {
                prev = None;
                continue;
            };
            if self.children(block)?.is_empty() {
                self.remove(block)?;
                continue;
            }
            if let Some(left) = prev
                && let NodeKind::List { kind: left_kind } = *self.kind(left)?
                && left_kind.same_shape(kind)
            {
                for item in self.children(block)?.to_vec() {
                    self.append(left, item)?;
                }
                self.remove(block)?;
                continue;
            }
            prev = Some(block);
        }
        Ok(())
    }
}
