//! Markdown codec: stored post text ⇄ [`Document`].
//!
//! Decoding runs the blank-line pass first, then reads one logical line at
//! a time, asking the registry's element transformers (in order) which
//! block the line opens; anything else is a paragraph. Encoding writes each
//! block through its transformer and finishes with the blank-line pass.
//!
//! Round trip: for any normalized document `d`,
//! `decode(encode(d)).document == d` (keys aside), and therefore encoding
//! the result of a decode a second time changes nothing.

pub mod blank_lines;

use std::fmt;

use crate::error::Result;
use crate::model::{Document, ListKind, NodeKey, NodeKind};
use crate::transform::block::{export_block, LineMatch};
use crate::transform::inline::{parse_inline, Construct, InlineContext, InlineItem};
use crate::transform::Registry;

pub use blank_lines::SENTINEL;

/// Markup that degraded to literal text during a decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseAmbiguity {
    /// 1-based line of the stored text.
    pub line: usize,
    /// Byte column within that line.
    pub column: usize,
    pub construct: Construct,
}

impl fmt::Display for ParseAmbiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.line,
            self.column + 1,
            self.construct.describe()
        )
    }
}

/// Result of a decode. Decoding never fails.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub document: Document,
    pub ambiguities: Vec<ParseAmbiguity>,
}

#[derive(Debug, Clone)]
pub struct MarkdownCodec {
    registry: Registry,
    inline: InlineContext,
    /// Same grammar without images, for every text block but paragraphs.
    text_block_inline: InlineContext,
}

impl Default for MarkdownCodec {
    fn default() -> Self {
        Self::new(Registry::standard())
    }
}

impl MarkdownCodec {
    pub fn new(registry: Registry) -> Self {
        let inline = InlineContext::new(&registry);
        let text_block_inline = inline.without_images();
        Self {
            registry,
            inline,
            text_block_inline,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Stored text to document.
    pub fn decode(&self, text: &str) -> Parsed {
        let lines = blank_lines::decode_lines(text);
        let mut reader = BlockReader::new(self);
        let mut i = 0;
        while i < lines.len() {
            i = reader.read(&lines, i);
        }
        reader.finish()
    }

    /// Document to logical lines, before the blank-line pass.
    pub fn serialize_raw(&self, doc: &Document) -> Result<String> {
        let blocks = doc
            .blocks()
            .iter()
            .map(|&b| export_block(doc, b))
            .collect::<Result<Vec<_>>>()?;
        Ok(blocks.join("\n"))
    }

    /// Document to stored text.
    pub fn encode(&self, doc: &Document) -> Result<String> {
        Ok(blank_lines::encode(&self.serialize_raw(doc)?))
    }
}

struct BlockReader<'c> {
    codec: &'c MarkdownCodec,
    doc: Document,
    ambiguities: Vec<ParseAmbiguity>,
    open_list: Option<(NodeKey, ListKind)>,
}

impl<'c> BlockReader<'c> {
    fn new(codec: &'c MarkdownCodec) -> Self {
        Self {
            codec,
            doc: Document::new(),
            ambiguities: Vec::new(),
            open_list: None,
        }
    }

    fn finish(mut self) -> Parsed {
        if let Err(e) = self.doc.normalize() {
            log::warn!("normalizing a decoded document failed: {e}");
        }
        for a in &self.ambiguities {
            log::debug!("read literally at {a}");
        }
        Parsed {
            document: self.doc,
            ambiguities: self.ambiguities,
        }
    }

    fn note(&mut self, line: usize, found: Vec<(usize, Construct)>) {
        self.ambiguities
            .extend(found.into_iter().map(|(column, construct)| ParseAmbiguity {
                line,
                column,
                construct,
            }));
    }

    /// Reads the block starting at `lines[i]`; returns the next index.
    fn read(&mut self, lines: &[blank_lines::LogicalLine], i: usize) -> usize {
        let line = &lines[i];
        let found = self
            .codec
            .registry
            .elements()
            .find_map(|t| t.match_line(&line.text));
        let root = self.doc.root();

        if !matches!(found, Some(LineMatch::ListItem { .. })) {
            self.open_list = None;
        }

        let result = match found {
            Some(LineMatch::Fence(fence)) => {
                let mut body: Vec<&str> = Vec::new();
                let mut next = i + 1;
                let mut closed = false;
                while next < lines.len() {
                    let l = &lines[next].text;
                    next += 1;
                    if fence.closes(l) {
                        closed = true;
                        break;
                    }
                    body.push(l);
                }
                if !closed {
                    while body.last().is_some_and(|l| l.is_empty()) {
                        body.pop();
                    }
                    self.note(line.number, vec![(0, Construct::UnclosedFence)]);
                }
                let language = (!fence.info.is_empty()).then(|| fence.info.clone());
                let added = self
                    .doc
                    .append_new(root, NodeKind::CodeBlock { language })
                    .and_then(|code| {
                        let content = body.join("\n");
                        if !content.is_empty() {
                            self.doc.append_new(code, NodeKind::plain(content))?;
                        }
                        Ok(())
                    });
                if let Err(e) = added {
                    log::warn!("dropping code block at line {}: {e}", line.number);
                }
                return next;
            }
            Some(LineMatch::HorizontalRule) => {
                self.doc.append_new(root, NodeKind::HorizontalRule).map(|_| ())
            }
            Some(LineMatch::Heading {
                level,
                content,
                column,
            }) => self
                .doc
                .append_new(root, NodeKind::Heading { level })
                .and_then(|h| self.fill_text_block(h, content, column, line.number)),
            Some(LineMatch::Quote { content, column }) => self
                .doc
                .append_new(root, NodeKind::Quote)
                .and_then(|q| self.fill_text_block(q, content, column, line.number)),
            Some(LineMatch::ListItem {
                kind,
                content,
                column,
            }) => self.list_item(kind, content, column, line.number),
            None => self.paragraph(&line.text, line.number),
        };
        if let Err(e) = result {
            log::warn!("dropping block at line {}: {e}", line.number);
        }
        i + 1
    }

    fn list_item(
        &mut self,
        kind: ListKind,
        content: &str,
        column: usize,
        number: usize,
    ) -> Result<()> {
        let list = match self.open_list {
            Some((list, open_kind)) if open_kind.same_shape(kind) => list,
            _ => {
                let root = self.doc.root();
                let list = self.doc.append_new(root, NodeKind::List { kind })?;
                self.open_list = Some((list, kind));
                list
            }
        };
        let item = self.doc.append_new(list, NodeKind::ListItem)?;
        self.fill_text_block(item, content, column, number)
    }

    fn fill_text_block(
        &mut self,
        block: NodeKey,
        content: &str,
        column: usize,
        number: usize,
    ) -> Result<()> {
        let parsed = parse_inline(content, column, &self.codec.text_block_inline);
        self.note(number, parsed.ambiguities);
        append_items(&mut self.doc, block, parsed.items)
    }

    /// A paragraph line; images in it become blocks of their own.
    fn paragraph(&mut self, text: &str, number: usize) -> Result<()> {
        let parsed = parse_inline(text, 0, &self.codec.inline);
        self.note(number, parsed.ambiguities);
        let root = self.doc.root();
        let p = self.doc.append_new(root, NodeKind::Paragraph)?;
        append_items(&mut self.doc, p, parsed.items)
    }
}

/// Appends inline items to `block`. Images are blocks, so each one splits
/// the block: the image goes after it and the items that follow start a new
/// paragraph. Pieces left holding only whitespace are dropped.
fn append_items(doc: &mut Document, block: NodeKey, items: Vec<InlineItem>) -> Result<()> {
    let mut current = block;
    let mut split = false;
    for item in items {
        match item {
            InlineItem::Text(run) => {
                doc.append_new(current, NodeKind::text(run.text, run.format))?;
            }
            InlineItem::Link { url, label } => {
                let link = doc.append_new(current, NodeKind::Link { url })?;
                for run in label {
                    doc.append_new(link, NodeKind::text(run.text, run.format))?;
                }
            }
            InlineItem::Image { src, alt_text } => {
                let image = doc.create(NodeKind::Image { src, alt_text });
                doc.insert_after(current, image)?;
                remove_if_blank(doc, current)?;
                current = doc.create(NodeKind::Paragraph);
                doc.insert_after(image, current)?;
                split = true;
            }
        }
    }
    if split {
        remove_if_blank(doc, current)?;
    }
    Ok(())
}

fn remove_if_blank(doc: &mut Document, block: NodeKey) -> Result<()> {
    let blank = doc.children(block)?.iter().all(|&child| {
        matches!(doc.get(child), Some(NodeKind::Text { text, .. }) if text.trim().is_empty())
    });
    if blank {
        doc.remove(block)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HeadingLevel, TextFormat};
    use pretty_assertions::assert_eq;

    fn codec() -> MarkdownCodec {
        MarkdownCodec::default()
    }

    fn kinds(doc: &Document) -> Vec<&'static str> {
        doc.blocks()
            .iter()
            .map(|&b| doc.kind(b).unwrap().name())
            .collect()
    }

    #[test]
    fn test_empty_text_is_one_empty_paragraph() {
        let parsed = codec().decode("");
        assert_eq!(parsed.document, Document::empty());
        assert_eq!(codec().encode(&parsed.document).unwrap(), "");
    }

    #[test]
    fn test_reads_every_block_kind() {
        let text = "# Title\n\n> quote\n\n- a\n\n- b\n\n1. one\n\n---\n\n![cat](http://x/cat.png)\n\n```rust\nfn main() {}\n```\n\nplain\n\n";
        let doc = codec().decode(text).document;
        assert_eq!(
            kinds(&doc),
            vec!["heading", "quote", "list", "list", "horizontalrule", "image", "code", "paragraph"]
        );
        let code = doc.blocks()[6];
        assert_eq!(
            doc.kind(code).unwrap(),
            &NodeKind::CodeBlock {
                language: Some("rust".into())
            }
        );
        assert_eq!(doc.text_content(code), "fn main() {}");
        assert_eq!(doc.children(doc.blocks()[2]).unwrap().len(), 2);
    }

    #[test]
    fn test_encodes_a_small_post() {
        let mut doc = Document::new();
        let root = doc.root();
        let h = doc
            .append_new(root, NodeKind::heading(HeadingLevel::new(2).unwrap()))
            .unwrap();
        doc.append_new(h, NodeKind::plain("Hi")).unwrap();
        doc.append_new(root, NodeKind::Paragraph).unwrap();
        let p = doc.append_new(root, NodeKind::Paragraph).unwrap();
        doc.append_new(p, NodeKind::text("bold", TextFormat::BOLD))
            .unwrap();
        doc.append_new(root, NodeKind::image("http://x/cat.png", "cat"))
            .unwrap();
        assert_eq!(
            codec().encode(&doc).unwrap(),
            "## Hi\n\n&nbsp;\n\n**bold**\n\n![cat](http://x/cat.png)\n\n"
        );
    }

    #[test]
    fn test_inline_image_splits_its_paragraph() {
        let doc = codec().decode("before ![a](u) after").document;
        assert_eq!(kinds(&doc), vec!["paragraph", "image", "paragraph"]);
        assert_eq!(doc.text_content(doc.blocks()[0]), "before ");
        assert_eq!(doc.text_content(doc.blocks()[2]), " after");
    }

    #[test]
    fn test_images_alone_on_a_line_leave_no_blank_paragraphs() {
        let doc = codec().decode(" ![a](1) ![b](2) ").document;
        assert_eq!(kinds(&doc), vec!["image", "image"]);
        let doc = codec().decode("[l](u) ![a](1)").document;
        assert_eq!(kinds(&doc), vec!["paragraph", "image"]);
    }

    #[test]
    fn test_image_syntax_in_a_heading_stays_text() {
        let codec = codec();
        let doc = codec.decode("# ![a](u)").document;
        assert_eq!(kinds(&doc), vec!["heading"]);
        assert_eq!(codec.encode(&doc).unwrap(), "# \\![a](u)\n\n");
    }

    #[test]
    fn test_unclosed_fence_runs_to_the_end() {
        let parsed = codec().decode("```\ncode\n\n");
        assert_eq!(kinds(&parsed.document), vec!["code"]);
        assert_eq!(parsed.document.text_content(parsed.document.blocks()[0]), "code");
        assert_eq!(parsed.ambiguities.len(), 1);
        assert_eq!(parsed.ambiguities[0].construct, Construct::UnclosedFence);
    }

    #[test]
    fn test_ambiguities_point_at_stored_lines() {
        let parsed = codec().decode("fine\n\n# a **b\n\n");
        assert_eq!(
            parsed.ambiguities,
            vec![ParseAmbiguity {
                line: 3,
                column: 4,
                construct: Construct::UnclosedEmphasis,
            }]
        );
        assert_eq!(parsed.ambiguities[0].to_string(), "3:5: unclosed emphasis delimiter");
    }

    #[test]
    fn test_ordered_lists_keep_their_start() {
        let codec = codec();
        let doc = codec.decode("3. c\n\n4. d").document;
        assert_eq!(codec.encode(&doc).unwrap(), "3. c\n\n4. d\n\n");
    }

    #[test]
    fn test_mixed_list_kinds_split() {
        let doc = codec().decode("- a\n1. b\n- c").document;
        assert_eq!(kinds(&doc), vec!["list", "list", "list"]);
    }
}
