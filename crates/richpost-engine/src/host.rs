//! The editor host: owns one live document and turns every local edit into
//! a freshly encoded value for the surrounding application.
//!
//! A host starts [`HostState::Uninitialized`] holding the external value it
//! was constructed with. [`EditorHost::mount`] imports that value exactly
//! once. After that, every edit re-encodes the whole tree and hands the
//! result to the change listener; external value changes only get in
//! through [`EditorHost::reset`] or a [`ExternalValuePolicy::ReimportOnChange`]
//! policy.

use uuid::Uuid;

use crate::codec::{MarkdownCodec, ParseAmbiguity};
use crate::commands::insert::ImagePlacement;
use crate::commands::{Cmd, Editor, Patch, ToolbarState};
use crate::error::{EditorError, Result, UploadError};
use crate::model::{Document, NodeKey};
use crate::selection::Selection;
use crate::transform::shortcut::ShortcutMatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Uninitialized,
    Live,
}

/// What [`EditorHost::set_value`] does once the host is live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExternalValuePolicy {
    /// Keep editing the mounted document; later values are logged and
    /// dropped.
    #[default]
    IgnoreAfterMount,
    /// Reimport whenever the value differs from the last one emitted.
    ReimportOnChange,
}

#[derive(Debug, Clone, Default)]
pub struct HostOptions {
    pub placeholder: String,
    /// A disabled host still moves its selection but refuses edits.
    pub disabled: bool,
    pub external_value: ExternalValuePolicy,
}

/// Handed out when an upload starts and given back when it finishes, so a
/// result that arrives after a reset can be recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTicket {
    epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    InsertedAtSelection(NodeKey),
    /// The selection was gone, so the image became the last block.
    Appended(NodeKey),
    /// The host was reset or dropped while the upload ran.
    Discarded,
}

type ChangeListener = Box<dyn FnMut(&str)>;

pub struct EditorHost {
    id: Uuid,
    state: HostState,
    /// Before mount, the value to import; afterwards the last value
    /// encoded from the tree.
    value: String,
    editor: Editor,
    codec: MarkdownCodec,
    shortcuts: ShortcutMatcher,
    options: HostOptions,
    on_change: Option<ChangeListener>,
    /// Bumped on every import; uploads from an older epoch are stale.
    epoch: u64,
}

impl EditorHost {
    pub fn new(value: impl Into<String>, options: HostOptions) -> Result<Self> {
        Self::with_codec(value, options, MarkdownCodec::default())
    }

    pub fn with_codec(
        value: impl Into<String>,
        options: HostOptions,
        codec: MarkdownCodec,
    ) -> Result<Self> {
        let shortcuts = ShortcutMatcher::new(codec.registry())?;
        Ok(Self {
            id: Uuid::new_v4(),
            state: HostState::Uninitialized,
            value: value.into(),
            editor: Editor::default(),
            codec,
            shortcuts,
            options,
            on_change: None,
            epoch: 0,
        })
    }

    /// Registers the listener called with the new value after every local
    /// edit.
    pub fn on_change(&mut self, listener: impl FnMut(&str) + 'static) {
        self.on_change = Some(Box::new(listener));
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn options(&self) -> &HostOptions {
        &self.options
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.options.disabled = disabled;
    }

    pub fn document(&self) -> &Document {
        self.editor.document()
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn codec(&self) -> &MarkdownCodec {
        &self.codec
    }

    pub fn selection(&self) -> Option<Selection> {
        self.editor.selection()
    }

    /// The current stored value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether the placeholder should be drawn over the editor.
    pub fn show_placeholder(&self) -> bool {
        self.state == HostState::Live && self.value.is_empty()
    }

    pub fn placeholder(&self) -> &str {
        &self.options.placeholder
    }

    /// Imports the construction value. Runs once; later calls do nothing.
    pub fn mount(&mut self) -> Result<Vec<ParseAmbiguity>> {
        if self.state == HostState::Live {
            log::debug!("host {} already mounted", self.id);
            return Ok(Vec::new());
        }
        let value = std::mem::take(&mut self.value);
        let ambiguities = self.import(&value)?;
        log::info!(
            "host {} mounted with {} blocks",
            self.id,
            self.document().blocks().len()
        );
        Ok(ambiguities)
    }

    /// A new external value. Before mount it replaces the value to import;
    /// afterwards it follows the host's [`ExternalValuePolicy`]. Returns
    /// whether the document was reimported.
    pub fn set_value(&mut self, value: &str) -> Result<bool> {
        if self.state == HostState::Uninitialized {
            self.value = value.to_string();
            return Ok(false);
        }
        if value == self.value {
            return Ok(false);
        }
        match self.options.external_value {
            ExternalValuePolicy::IgnoreAfterMount => {
                log::warn!(
                    "host {}: ignoring external value change after mount",
                    self.id
                );
                Ok(false)
            }
            ExternalValuePolicy::ReimportOnChange => {
                self.import(value)?;
                log::info!("host {} reimported a changed external value", self.id);
                Ok(true)
            }
        }
    }

    /// Replaces the document with `value` unconditionally, mounting first
    /// if needed. Does not call the change listener; in-flight uploads
    /// become stale.
    pub fn reset(&mut self, value: &str) -> Result<Vec<ParseAmbiguity>> {
        let ambiguities = self.import(value)?;
        log::info!("host {} reset", self.id);
        Ok(ambiguities)
    }

    fn import(&mut self, value: &str) -> Result<Vec<ParseAmbiguity>> {
        let parsed = self.codec.decode(value);
        self.editor.replace_document(parsed.document);
        self.value = self.codec.encode(self.editor.document())?;
        self.epoch += 1;
        if self.state == HostState::Uninitialized {
            log::debug!("host {}: uninitialized -> live", self.id);
            self.state = HostState::Live;
        }
        Ok(parsed.ambiguities)
    }

    fn ensure_live(&self) -> Result<()> {
        match self.state {
            HostState::Live => Ok(()),
            HostState::Uninitialized => Err(EditorError::NotMounted),
        }
    }

    fn ensure_editable(&self) -> Result<()> {
        self.ensure_live()?;
        if self.options.disabled {
            return Err(EditorError::ReadOnly);
        }
        Ok(())
    }

    pub fn focus(&mut self) -> Result<Selection> {
        self.ensure_live()?;
        self.editor.focus()
    }

    pub fn blur(&mut self) {
        self.editor.blur();
    }

    /// Runs one command and, if the tree changed, emits the new value.
    pub fn apply(&mut self, cmd: Cmd) -> Result<Patch> {
        if cmd.is_navigation() {
            self.ensure_live()?;
        } else {
            self.ensure_editable()?;
        }
        let patch = self.editor.apply(cmd)?;
        if patch.changed {
            self.emit()?;
        }
        Ok(patch)
    }

    /// Types one character, firing any shortcut it completes.
    pub fn type_char(&mut self, ch: char) -> Result<Patch> {
        self.ensure_editable()?;
        let patch = self.editor.type_char(ch, &self.shortcuts)?;
        if patch.changed {
            self.emit()?;
        }
        Ok(patch)
    }

    pub fn toolbar(&self) -> ToolbarState {
        self.editor.toolbar()
    }

    fn emit(&mut self) -> Result<()> {
        self.value = self.codec.encode(self.editor.document())?;
        log::trace!("host {} emits {} bytes", self.id, self.value.len());
        if let Some(listener) = self.on_change.as_mut() {
            listener(&self.value);
        }
        Ok(())
    }

    /// Starts an image upload against the current document.
    pub fn begin_image_upload(&self) -> Result<UploadTicket> {
        self.ensure_editable()?;
        Ok(UploadTicket { epoch: self.epoch })
    }

    /// Finishes an upload started with [`EditorHost::begin_image_upload`].
    ///
    /// A failed upload leaves the tree untouched and is returned as
    /// [`EditorError::UploadFailure`]. A successful one lands at the
    /// selection if it is still valid, otherwise at the end of the
    /// document.
    pub fn complete_image_upload(
        &mut self,
        ticket: UploadTicket,
        result: std::result::Result<String, UploadError>,
        alt_text: &str,
    ) -> Result<UploadOutcome> {
        if ticket.epoch != self.epoch {
            log::warn!(
                "host {}: discarding upload from before the last reset",
                self.id
            );
            return Ok(UploadOutcome::Discarded);
        }
        let url = match result {
            Ok(url) => url,
            Err(e) => {
                log::warn!("host {}: image upload failed: {e}", self.id);
                return Err(e.into());
            }
        };
        self.ensure_live()?;
        let (placed, _) = self.editor.place_image(&url, alt_text)?;
        self.emit()?;
        Ok(match placed {
            ImagePlacement::AtSelection(key) => {
                UploadOutcome::InsertedAtSelection(key)
            }
            ImagePlacement::Appended(key) => {
                log::debug!("host {}: no selection, image appended", self.id);
                UploadOutcome::Appended(key)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FormatKind, NodeKind};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn live(value: &str) -> EditorHost {
        let mut host = EditorHost::new(value, HostOptions::default()).unwrap();
        host.mount().unwrap();
        host
    }

    fn recorded(host: &mut EditorHost) -> Rc<RefCell<Vec<String>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        host.on_change(move |v| sink.borrow_mut().push(v.to_string()));
        seen
    }

    #[test]
    fn test_edits_before_mount_are_refused() {
        let mut host = EditorHost::new("hi", HostOptions::default()).unwrap();
        assert_eq!(host.state(), HostState::Uninitialized);
        let err = host.apply(Cmd::InsertText { text: "x".into() });
        assert!(matches!(err, Err(EditorError::NotMounted)));
    }

    #[test]
    fn test_mount_imports_once() {
        let mut host = EditorHost::new("hello\n\n", HostOptions::default()).unwrap();
        host.mount().unwrap();
        assert_eq!(host.state(), HostState::Live);
        host.focus().unwrap();
        host.apply(Cmd::InsertText { text: "!".into() }).unwrap();
        host.mount().unwrap();
        assert_eq!(host.value(), "hello!\n\n");
    }

    #[test]
    fn test_every_edit_emits_the_encoded_value() {
        let mut host = live("");
        let seen = recorded(&mut host);
        host.focus().unwrap();
        for ch in "ab".chars() {
            host.type_char(ch).unwrap();
        }
        host.apply(Cmd::SplitBlock).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec!["a\n\n", "ab\n\n", "ab\n\n&nbsp;\n\n"]
        );
    }

    #[test]
    fn test_navigation_does_not_emit() {
        let mut host = live("ab\n\n");
        let seen = recorded(&mut host);
        host.focus().unwrap();
        host.apply(Cmd::MoveLeft { extend: true }).unwrap();
        host.apply(Cmd::ToggleFormat(FormatKind::Bold)).unwrap();
        assert_eq!(*seen.borrow(), vec!["a**b**\n\n"]);
    }

    #[test]
    fn test_undo_emits_and_reset_forgets_history() {
        let mut host = live("one\n\n");
        let seen = recorded(&mut host);
        host.focus().unwrap();
        host.type_char('!').unwrap();
        host.apply(Cmd::Undo).unwrap();
        assert_eq!(*seen.borrow(), vec!["one!\n\n", "one\n\n"]);

        host.type_char('?').unwrap();
        host.reset("two\n\n").unwrap();
        host.focus().unwrap();
        assert!(!host.apply(Cmd::Undo).unwrap().changed);
        assert_eq!(host.value(), "two\n\n");
    }

    #[test]
    fn test_external_value_ignored_after_mount_by_default() {
        let mut host = live("one\n\n");
        assert!(!host.set_value("two\n\n").unwrap());
        assert_eq!(host.value(), "one\n\n");
    }

    #[test]
    fn test_external_value_reimported_when_asked() {
        let options = HostOptions {
            external_value: ExternalValuePolicy::ReimportOnChange,
            ..Default::default()
        };
        let mut host = EditorHost::new("one\n\n", options).unwrap();
        host.mount().unwrap();
        assert!(!host.set_value("one\n\n").unwrap());
        assert!(host.set_value("two\n\n").unwrap());
        assert_eq!(host.value(), "two\n\n");
        assert_eq!(host.selection(), None);
    }

    #[test]
    fn test_set_value_before_mount_replaces_initial_value() {
        let mut host = EditorHost::new("one", HostOptions::default()).unwrap();
        host.set_value("two").unwrap();
        host.mount().unwrap();
        assert_eq!(host.value(), "two\n\n");
    }

    #[test]
    fn test_reset_always_reimports_without_emitting() {
        let mut host = live("one\n\n");
        let seen = recorded(&mut host);
        host.reset("# two").unwrap();
        assert_eq!(host.value(), "# two\n\n");
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_disabled_host_refuses_edits_but_moves() {
        let options = HostOptions {
            disabled: true,
            ..Default::default()
        };
        let mut host = EditorHost::new("ab", options).unwrap();
        host.mount().unwrap();
        host.focus().unwrap();
        assert!(host.apply(Cmd::MoveLeft { extend: false }).is_ok());
        assert!(matches!(
            host.type_char('x'),
            Err(EditorError::ReadOnly)
        ));
        assert!(matches!(
            host.begin_image_upload(),
            Err(EditorError::ReadOnly)
        ));
    }

    #[test]
    fn test_placeholder_only_for_empty_documents() {
        let mut host = live("");
        assert!(host.show_placeholder());
        host.focus().unwrap();
        host.type_char('a').unwrap();
        assert!(!host.show_placeholder());
    }

    #[test]
    fn test_upload_lands_at_selection() {
        let mut host = live("ab\n\ncd\n\n");
        host.focus().unwrap();
        let ticket = host.begin_image_upload().unwrap();
        let outcome = host
            .complete_image_upload(ticket, Ok("http://x/p.png".into()), "p.png")
            .unwrap();
        let UploadOutcome::InsertedAtSelection(key) = outcome else {
            panic!("expected an insert at the selection, got {outcome:?}");
        };
        assert_eq!(host.document().blocks().last(), Some(&key));
        assert_eq!(host.value(), "ab\n\ncd\n\n![p.png](http://x/p.png)\n\n");
    }

    #[test]
    fn test_upload_without_selection_appends() {
        let mut host = live("ab\n\ncd\n\n");
        host.focus().unwrap();
        let ticket = host.begin_image_upload().unwrap();
        host.blur();
        let outcome = host
            .complete_image_upload(ticket, Ok("u".into()), "a")
            .unwrap();
        assert!(matches!(outcome, UploadOutcome::Appended(_)));
        let last = *host.document().blocks().last().unwrap();
        assert_eq!(
            host.document().kind(last).unwrap(),
            &NodeKind::image("u", "a")
        );
    }

    #[test]
    fn test_rejected_upload_leaves_tree_alone() {
        let mut host = live("ab\n\n");
        let seen = recorded(&mut host);
        host.focus().unwrap();
        let before = host.document().clone();
        let ticket = host.begin_image_upload().unwrap();
        let err = host.complete_image_upload(
            ticket,
            Err(UploadError::Rejected("too large".into())),
            "a",
        );
        assert!(matches!(err, Err(EditorError::UploadFailure(_))));
        assert_eq!(host.document(), &before);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_upload_from_before_reset_is_discarded() {
        let mut host = live("ab\n\n");
        let ticket = host.begin_image_upload().unwrap();
        host.reset("cd").unwrap();
        let outcome = host
            .complete_image_upload(ticket, Ok("u".into()), "a")
            .unwrap();
        assert_eq!(outcome, UploadOutcome::Discarded);
        assert_eq!(host.value(), "cd\n\n");
    }
}
