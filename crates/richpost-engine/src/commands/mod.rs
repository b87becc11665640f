//! Edits against the document at the current selection.
//!
//! Every user action is a [`Cmd`]; [`Editor::apply`] runs it as one
//! transaction, renormalises the tree and reports a [`Patch`]. A command
//! that fails leaves the document and selection as they were. Commands
//! keep the tree valid by construction, so a `StructuralViolation` coming
//! out of here is a bug in the command, not bad input.

pub mod format;
pub mod history;
pub mod insert;
pub mod shortcut;
pub mod text;

use crate::error::{EditorError, Result};
use crate::model::{Document, FormatKind, HeadingLevel, ListKind, NodeKey, TextFormat};
use crate::selection::{self, Point, Selection};

use history::{Change, History, Snapshot};

pub use format::ToolbarState;
pub use insert::BlockType;

/// Commands that can be applied to the document.
#[derive(Debug, Clone, PartialEq)]
pub enum Cmd {
    /// Types text at the caret, replacing the selection. `\n` splits the
    /// block except inside code.
    InsertText { text: String },
    DeleteBackward,
    DeleteSelection,
    /// Enter.
    SplitBlock,
    ToggleFormat(FormatKind),
    InsertLink { url: String },
    InsertEmoji { emoji: String },
    InsertImage { src: String, alt_text: String },
    InsertHorizontalRule,
    SetBlock(BlockType),
    MoveLeft { extend: bool },
    MoveRight { extend: bool },
    SelectAll,
    Select(Option<Selection>),
    /// Steps back through the edit history.
    Undo,
    Redo,
}

impl Cmd {
    /// Commands that only move the selection.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Cmd::MoveLeft { .. } | Cmd::MoveRight { .. } | Cmd::SelectAll | Cmd::Select(_)
        )
    }
}

/// Result of applying a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Whether the tree changed (and so the serialised value may have).
    pub changed: bool,
    pub selection: Option<Selection>,
    pub version: u64,
}

/// A document together with the selection and pending format it is edited
/// through.
#[derive(Debug, Clone)]
pub struct Editor {
    pub(crate) document: Document,
    pub(crate) selection: Option<Selection>,
    /// Format bits flipped on a collapsed caret, applied to the next
    /// inserted text.
    pub(crate) pending: TextFormat,
    version: u64,
    history: History,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(Document::empty())
    }
}

impl Editor {
    /// Wraps a document. There is no selection until the host focuses it.
    pub fn new(document: Document) -> Self {
        Self {
            document,
            selection: None,
            pending: TextFormat::PLAIN,
            version: 0,
            history: History::default(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn pending_format(&self) -> TextFormat {
        self.pending
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Swaps in a freshly imported document; the old selection cannot point
    /// into it, and the undo history no longer applies.
    pub fn replace_document(&mut self, document: Document) {
        self.document = document;
        self.selection = None;
        self.pending = TextFormat::PLAIN;
        self.history.clear();
        self.version += 1;
    }

    /// Puts a caret at the end of the document if nothing is selected.
    pub fn focus(&mut self) -> Result<Selection> {
        if let Some(sel) = self.selection
            && sel.validate(&self.document).is_ok()
        {
            return Ok(sel);
        }
        let last = *selection::selectable_blocks(&self.document)
            .last()
            .ok_or(EditorError::InvalidSelection)?;
        let sel = Selection::caret(selection::end_of(&self.document, last)?);
        self.selection = Some(sel);
        Ok(sel)
    }

    /// Drops the selection, as when the editor loses focus.
    pub fn blur(&mut self) {
        self.selection = None;
        self.pending = TextFormat::PLAIN;
    }

    /// Replaces the selection. `None` blurs.
    pub fn set_selection(&mut self, selection: Option<Selection>) -> Result<()> {
        if let Some(sel) = selection {
            sel.validate(&self.document)?;
        }
        self.selection = selection;
        self.pending = TextFormat::PLAIN;
        Ok(())
    }

    /// The current selection, checked against the tree.
    pub(crate) fn require_selection(&self) -> Result<Selection> {
        let sel = self.selection.ok_or(EditorError::InvalidSelection)?;
        sel.validate(&self.document)?;
        Ok(sel)
    }

    /// The selection ends in document order.
    pub(crate) fn range(&self) -> Result<(Point, Point)> {
        self.require_selection()?.ordered(&self.document)
    }

    /// Applies one command as a single transaction.
    pub fn apply(&mut self, cmd: Cmd) -> Result<Patch> {
        log::debug!("apply {cmd:?}");
        match cmd {
            Cmd::Undo => return self.undo(),
            Cmd::Redo => return self.redo(),
            _ => {}
        }
        if cmd.is_navigation() {
            self.history.seal();
        }
        let (_, patch) = self.transact(|ed| {
            let change = ed.run(cmd)?;
            Ok(((), change))
        })?;
        Ok(patch)
    }

    fn run(&mut self, cmd: Cmd) -> Result<Change> {
        let change = match cmd {
            Cmd::InsertText { text } => {
                let typed = self.insert_text(&text)?;
                match typed {
                    true if !text.contains('\n') => Change::Typing,
                    changed => Change::from_changed(changed),
                }
            }
            Cmd::DeleteBackward => Change::from_changed(self.delete_backward()?),
            Cmd::DeleteSelection => Change::from_changed(self.delete_selection()?),
            Cmd::SplitBlock => Change::from_changed(self.split_block()?),
            Cmd::ToggleFormat(kind) => Change::from_changed(self.toggle_format(kind)?),
            Cmd::InsertLink { url } => Change::from_changed(self.insert_link(&url)?),
            Cmd::InsertEmoji { emoji } => Change::from_changed(self.insert_text(&emoji)?),
            Cmd::InsertImage { src, alt_text } => {
                self.insert_image(&src, &alt_text)?;
                Change::Edit
            }
            Cmd::InsertHorizontalRule => Change::from_changed(self.insert_horizontal_rule()?),
            Cmd::SetBlock(block) => Change::from_changed(self.set_block(&block)?),
            Cmd::MoveLeft { extend } => Change::from_changed(self.move_left(extend)?),
            Cmd::MoveRight { extend } => Change::from_changed(self.move_right(extend)?),
            Cmd::SelectAll => Change::from_changed(self.select_all()?),
            Cmd::Select(sel) => {
                self.set_selection(sel)?;
                Change::None
            }
            Cmd::Undo | Cmd::Redo => Change::None,
        };
        Ok(change)
    }

    /// Runs `edit` as one transaction. On success a change is committed
    /// and recorded for undo; on failure the document, selection and
    /// pending format are put back as they were.
    pub(crate) fn transact<T>(
        &mut self,
        edit: impl FnOnce(&mut Self) -> Result<(T, Change)>,
    ) -> Result<(T, Patch)> {
        let before = self.snapshot();
        let pending = self.pending;
        let outcome = edit(self).and_then(|(value, change)| {
            let patch = if change.is_change() {
                self.commit()?
            } else {
                self.unchanged()
            };
            Ok((value, patch, change))
        });
        match outcome {
            Ok((value, patch, change)) => {
                self.history.record(before, change);
                Ok((value, patch))
            }
            Err(err) => {
                log::debug!("command failed, rolled back: {err}");
                self.restore(before);
                self.pending = pending;
                Err(err)
            }
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            document: self.document.clone(),
            selection: self.selection,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.document.rewind_to(snapshot.document);
        self.selection = snapshot.selection;
    }

    fn undo(&mut self) -> Result<Patch> {
        if !self.history.can_undo() {
            return Ok(self.unchanged());
        }
        let current = self.snapshot();
        let Some(previous) = self.history.undo(current) else {
            return Ok(self.unchanged());
        };
        self.restore(previous);
        self.pending = TextFormat::PLAIN;
        self.commit()
    }

    fn redo(&mut self) -> Result<Patch> {
        if !self.history.can_redo() {
            return Ok(self.unchanged());
        }
        let current = self.snapshot();
        let Some(next) = self.history.redo(current) else {
            return Ok(self.unchanged());
        };
        self.restore(next);
        self.pending = TextFormat::PLAIN;
        self.commit()
    }

    fn unchanged(&self) -> Patch {
        Patch {
            changed: false,
            selection: self.selection,
            version: self.version,
        }
    }

    /// Closes a transaction that changed the tree.
    pub(crate) fn commit(&mut self) -> Result<Patch> {
        self.settle()?;
        self.version += 1;
        Ok(Patch {
            changed: true,
            selection: self.selection,
            version: self.version,
        })
    }

    /// Renormalises the tree and pulls the selection back inside it.
    pub(crate) fn settle(&mut self) -> Result<()> {
        self.document.normalize()?;
        let Some(sel) = self.selection else {
            return Ok(());
        };
        let anchor = self.clamp(sel.anchor)?;
        let focus = self.clamp(sel.focus)?;
        self.selection = Some(Selection::new(anchor, focus));
        Ok(())
    }

    fn clamp(&self, point: Point) -> Result<Point> {
        let doc = &self.document;
        if selection::is_selectable(doc, point.block) {
            let len = selection::block_len(doc, point.block)?;
            return Ok(Point::new(point.block, point.offset.min(len)));
        }
        let last = *selection::selectable_blocks(doc)
            .last()
            .ok_or(EditorError::InvalidSelection)?;
        selection::end_of(doc, last)
    }

    pub(crate) fn collapse_to(&mut self, point: Point) {
        self.selection = Some(Selection::caret(point));
    }
}

/// A heading level from a count of `#`s, clamped into range.
pub(crate) fn heading_level(hashes: usize) -> HeadingLevel {
    let n = hashes.clamp(1, usize::from(HeadingLevel::MAX));
    HeadingLevel::new(u8::try_from(n).unwrap_or(1)).unwrap_or_default()
}

/// The list kind a list-item conversion produces.
pub(crate) fn list_kind(ordered: bool, start: u32) -> ListKind {
    if ordered {
        ListKind::Ordered { start }
    } else {
        ListKind::Bullet
    }
}

pub(crate) fn is_code_block(doc: &Document, key: NodeKey) -> bool {
    matches!(
        doc.get(key),
        Some(crate::model::NodeKind::CodeBlock { .. })
    )
}
