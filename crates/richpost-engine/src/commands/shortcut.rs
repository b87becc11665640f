//! Applying live-typing shortcuts to the document.

use std::ops::Range;

use crate::error::Result;
use crate::model::{ListKind, NodeKey, NodeKind, TextFormat};
use crate::selection::{self, Point, runs};
use crate::transform::shortcut::{ShortcutMatch, ShortcutMatcher};
use crate::transform::{Transformer, TransformerKind};

use super::format::map_formats;
use super::insert::{BlockType, make_room, place, place_inline, set_block_of};
use super::text::delete_in_block;
use super::history::Change;
use super::{Editor, Patch, heading_level, is_code_block};

impl Editor {
    /// Types `ch` at the caret, then lets the shortcut it completes rewrite
    /// the text in front of the caret.
    pub fn type_char(&mut self, ch: char, matcher: &ShortcutMatcher) -> Result<Patch> {
        log::debug!("type {ch:?}");
        let (_, patch) = self.transact(|ed| {
            if !ed.insert_text(&ch.to_string())? {
                return Ok(((), Change::None));
            }
            ed.settle()?;
            let change = if ed.apply_shortcut(ch, matcher)? || ch == '\n' {
                Change::Edit
            } else {
                Change::Typing
            };
            Ok(((), change))
        })?;
        Ok(patch)
    }

    fn apply_shortcut(&mut self, trigger: char, matcher: &ShortcutMatcher) -> Result<bool> {
        let Some(sel) = self.selection else {
            return Ok(false);
        };
        if !sel.is_collapsed() {
            return Ok(false);
        }
        let at = sel.focus;
        let kind = self.document.kind(at.block)?.clone();
        if !kind.is_text_block() || is_code_block(&self.document, at.block) {
            return Ok(false);
        }
        let before = selection::text_between(&self.document, at.block, 0, at.offset);
        let Some(m) = matcher.find(&before, trigger) else {
            return Ok(false);
        };
        let applicable = match m.transformer.kind() {
            TransformerKind::Element => kind == NodeKind::Paragraph,
            _ => !self.is_protected(at.block, &m.span)?,
        };
        if !applicable {
            log::debug!("shortcut {} does not apply here", m.transformer.name());
            return Ok(false);
        }
        match m.transformer.kind() {
            TransformerKind::Element => self.apply_element(at, &m)?,
            TransformerKind::TextMatch => self.apply_text_match(at.block, &m)?,
            TransformerKind::TextFormat => self.apply_text_format(at.block, &m)?,
        }
        Ok(true)
    }

    /// Text inside links and code spans is never rewritten.
    fn is_protected(&self, block: NodeKey, span: &Range<usize>) -> Result<bool> {
        Ok(runs(&self.document, block)?.iter().any(|r| {
            r.start < span.end
                && r.end > span.start
                && (r.link.is_some() || r.format.contains(TextFormat::CODE))
        }))
    }

    fn apply_element(&mut self, at: Point, m: &ShortcutMatch) -> Result<()> {
        let doc = &mut self.document;
        delete_in_block(doc, at.block, 0, at.offset)?;
        let capture = m.captures.first().cloned().unwrap_or_default();
        let block = match m.transformer {
            Transformer::CodeFence => {
                let language = (!capture.is_empty()).then_some(capture);
                set_block_of(doc, at.block, &BlockType::Code { language })?
            }
            Transformer::Heading => set_block_of(
                doc,
                at.block,
                &BlockType::Heading(heading_level(capture.len())),
            )?,
            Transformer::Quote => set_block_of(doc, at.block, &BlockType::Quote)?,
            Transformer::UnorderedList => set_block_of(doc, at.block, &BlockType::BulletList)?,
            Transformer::OrderedList => {
                let item = set_block_of(doc, at.block, &BlockType::NumberedList)?;
                let start = capture.parse().unwrap_or(1);
                if let Some(list) = doc.parent(item) {
                    doc.retag(list, NodeKind::List {
                        kind: ListKind::Ordered { start },
                    })?;
                }
                item
            }
            Transformer::HorizontalRule => {
                let rule = doc.create(NodeKind::HorizontalRule);
                doc.insert_before(at.block, rule)?;
                at.block
            }
            _ => at.block,
        };
        self.collapse_to(selection::start_of(block));
        Ok(())
    }

    fn apply_text_match(&mut self, block: NodeKey, m: &ShortcutMatch) -> Result<()> {
        let doc = &mut self.document;
        let capture = |i: usize| m.captures.get(i).cloned().unwrap_or_default();
        delete_in_block(doc, block, m.span.start, m.span.end)?;
        match m.transformer {
            Transformer::Image => {
                let placement = make_room(doc, Point::new(block, m.span.start))?;
                let image = doc.create(NodeKind::image(capture(1), capture(0)));
                place(doc, placement, image)?;
                self.collapse_to(Point::new(image, 1));
            }
            _ => {
                let label = capture(0);
                let label_len = label.chars().count();
                let link = doc.create(NodeKind::link(capture(1)));
                doc.append_new(link, NodeKind::plain(label))?;
                place_inline(doc, block, m.span.start, link)?;
                self.collapse_to(Point::new(block, m.span.start + label_len));
            }
        }
        Ok(())
    }

    fn apply_text_format(&mut self, block: NodeKey, m: &ShortcutMatch) -> Result<()> {
        let Some(flag) = m.transformer.format() else {
            return Ok(());
        };
        let inner = m.captures.first().map_or(0, |c| c.chars().count());
        let delim = (m.span.len() - inner) / 2;
        let (start, end) = (m.span.start, m.span.end);
        let doc = &mut self.document;
        delete_in_block(doc, block, end - delim, end)?;
        delete_in_block(doc, block, start, start + delim)?;
        map_formats(doc, &[(block, start, start + inner)], |f| f.with(flag))?;
        self.collapse_to(Point::new(block, start + inner));
        self.pending = flag;
        Ok(())
    }
}
