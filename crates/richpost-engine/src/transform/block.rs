//! Line-level grammar: which block a logical line opens, and how each block
//! kind is written back out.

use crate::error::{EditorError, Result};
use crate::model::{Document, HeadingLevel, ListKind, NodeKey, NodeKind};

use super::inline::{escape_alt, escape_destination, export_inline};
use super::Transformer;

/// A fenced code block delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fence {
    pub ch: u8,
    pub len: usize,
    pub info: String,
}

impl Fence {
    pub const BACKTICK: u8 = b'`';
    pub const TILDE: u8 = b'~';
    pub const MIN_LEN: usize = 3;

    /// Recognises an opening fence at column 0.
    ///
    /// A backtick fence's info string may not contain backticks, which is
    /// what keeps a paragraph that starts with a long code span from being
    /// read as a fence.
    pub fn open(line: &str) -> Option<Fence> {
        let ch = *line.as_bytes().first()?;
        if ch != Self::BACKTICK && ch != Self::TILDE {
            return None;
        }
        let len = line.bytes().take_while(|&b| b == ch).count();
        if len < Self::MIN_LEN {
            return None;
        }
        let info = line[len..].trim();
        if ch == Self::BACKTICK && info.contains('`') {
            return None;
        }
        Some(Fence {
            ch,
            len,
            info: info.to_string(),
        })
    }

    pub fn closes(&self, line: &str) -> bool {
        let line = line.trim_end();
        line.len() >= self.len && line.bytes().all(|b| b == self.ch)
    }

    /// The shortest fence that `content` cannot close early.
    pub fn for_content(content: &str, language: Option<&str>) -> Fence {
        let ch = if language.is_some_and(|l| l.contains('`')) {
            Self::TILDE
        } else {
            Self::BACKTICK
        };
        let longest = content
            .lines()
            .map(|l| l.bytes().take_while(|&b| b == ch).count())
            .max()
            .unwrap_or(0);
        Fence {
            ch,
            len: (longest + 1).max(Self::MIN_LEN),
            info: language.unwrap_or_default().to_string(),
        }
    }

    pub fn marker(&self) -> String {
        (self.ch as char).to_string().repeat(self.len)
    }
}

/// What a logical line opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMatch<'a> {
    Fence(Fence),
    HorizontalRule,
    Heading {
        level: HeadingLevel,
        content: &'a str,
        column: usize,
    },
    Quote {
        content: &'a str,
        column: usize,
    },
    ListItem {
        kind: ListKind,
        content: &'a str,
        column: usize,
    },
}

/// Content after a marker: nothing, or one space and the rest.
fn after_marker(line: &str, marker_len: usize) -> Option<(&str, usize)> {
    let rest = line.get(marker_len..)?;
    if rest.is_empty() {
        Some(("", marker_len))
    } else {
        rest.strip_prefix(' ').map(|r| (r, marker_len + 1))
    }
}

impl Transformer {
    /// Tries this transformer's block pattern against a logical line.
    pub fn match_line(self, line: &str) -> Option<LineMatch<'_>> {
        match self {
            Transformer::CodeFence => Fence::open(line).map(LineMatch::Fence),
            Transformer::HorizontalRule => (line.len() >= 3 && line.bytes().all(|b| b == b'-'))
                .then_some(LineMatch::HorizontalRule),
            Transformer::Heading => {
                let hashes = line.bytes().take_while(|&b| b == b'#').count();
                let level = HeadingLevel::new(u8::try_from(hashes).ok()?)?;
                let (content, column) = after_marker(line, hashes)?;
                Some(LineMatch::Heading {
                    level,
                    content,
                    column,
                })
            }
            Transformer::Quote => {
                let rest = line.strip_prefix('>')?;
                let (content, column) = match rest.strip_prefix(' ') {
                    Some(r) => (r, 2),
                    None => (rest, 1),
                };
                Some(LineMatch::Quote { content, column })
            }
            Transformer::UnorderedList => {
                let first = *line.as_bytes().first()?;
                // `*` is left out: a paragraph may legitimately start with
                // an italic run whose text begins with a space.
                if !matches!(first, b'-' | b'+') {
                    return None;
                }
                let (content, column) = after_marker(line, 1)?;
                Some(LineMatch::ListItem {
                    kind: ListKind::Bullet,
                    content,
                    column,
                })
            }
            Transformer::OrderedList => {
                let digits = line.bytes().take_while(u8::is_ascii_digit).count();
                if digits == 0 || digits > 9 || line.as_bytes().get(digits) != Some(&b'.') {
                    return None;
                }
                let start = line[..digits].parse().ok()?;
                let (content, column) = after_marker(line, digits + 1)?;
                Some(LineMatch::ListItem {
                    kind: ListKind::Ordered { start },
                    content,
                    column,
                })
            }
            _ => None,
        }
    }
}

/// Backslash-escapes a paragraph line that would otherwise open some other
/// block when read back.
pub fn escape_line_start(line: String) -> String {
    match line.as_bytes().first() {
        Some(b'#' | b'>' | b'-' | b'+') => format!("\\{line}"),
        Some(b) if b.is_ascii_digit() => {
            let digits = line.bytes().take_while(u8::is_ascii_digit).count();
            if line.as_bytes().get(digits) == Some(&b'.') {
                format!("{}\\{}", &line[..digits], &line[digits..])
            } else {
                line
            }
        }
        _ => line,
    }
}

fn prefixed(marker: &str, inline: String) -> String {
    if inline.is_empty() {
        marker.to_string()
    } else {
        format!("{marker} {inline}")
    }
}

pub fn export_image(src: &str, alt_text: &str) -> String {
    format!("![{}]({})", escape_alt(alt_text), escape_destination(src))
}

/// Serialises one top-level block. Multi-line blocks (lists, code) join
/// their lines with `\n`.
pub fn export_block(doc: &Document, key: NodeKey) -> Result<String> {
    let kind = doc.kind(key)?;
    Ok(match kind {
        NodeKind::Paragraph => escape_line_start(export_inline(doc, key)?),
        NodeKind::Heading { level } => {
            prefixed(&"#".repeat(usize::from(level.get())), export_inline(doc, key)?)
        }
        NodeKind::Quote => prefixed(">", export_inline(doc, key)?),
        NodeKind::CodeBlock { language } => {
            let content = doc.text_content(key);
            let fence = Fence::for_content(&content, language.as_deref());
            let marker = fence.marker();
            if content.is_empty() {
                format!("{marker}{}\n{marker}", fence.info)
            } else {
                format!("{marker}{}\n{content}\n{marker}", fence.info)
            }
        }
        NodeKind::List { kind } => {
            let mut lines = Vec::new();
            for (i, &item) in doc.children(key)?.iter().enumerate() {
                let marker = match kind {
                    ListKind::Bullet => "-".to_string(),
                    ListKind::Ordered { start } => {
                        let n = start.saturating_add(u32::try_from(i).unwrap_or(u32::MAX));
                        format!("{n}.")
                    }
                };
                lines.push(prefixed(&marker, export_inline(doc, item)?));
            }
            lines.join("\n")
        }
        NodeKind::HorizontalRule => "---".to_string(),
        NodeKind::Image { src, alt_text } => export_image(src, alt_text),
        other => {
            return Err(EditorError::StructuralViolation {
                parent: "root",
                child: other.name(),
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("```", Some(("`", 3, "")))]
    #[case("````rust", Some(("`", 4, "rust")))]
    #[case("~~~ py ", Some(("~", 3, "py")))]
    #[case("``", None)]
    #[case("```a``b```", None)]
    #[case(" ```", None)]
    fn test_fence_openers(#[case] line: &str, #[case] expected: Option<(&str, usize, &str)>) {
        let got = Fence::open(line);
        let got = got
            .as_ref()
            .map(|f| ((f.ch as char).to_string(), f.len, f.info.as_str()));
        let expected = expected.map(|(c, l, i)| (c.to_string(), l, i));
        assert_eq!(got, expected);
    }

    #[test]
    fn test_closing_fence_needs_same_char_and_length() {
        let f = Fence::open("````").unwrap();
        assert!(!f.closes("```"));
        assert!(f.closes("````"));
        assert!(f.closes("`````  "));
        assert!(!f.closes("~~~~"));
    }

    #[test]
    fn test_fence_outgrows_content() {
        let f = Fence::for_content("```\ninner\n```", None);
        assert_eq!(f.marker(), "````");
        let f = Fence::for_content("x", Some("we`ird"));
        assert_eq!(f.marker(), "~~~");
    }

    #[rstest]
    #[case("# Title", Transformer::Heading, Some(("Title", 2)))]
    #[case("###### six", Transformer::Heading, Some(("six", 7)))]
    #[case("##", Transformer::Heading, Some(("", 2)))]
    #[case("####### seven", Transformer::Heading, None)]
    #[case("#hashtag", Transformer::Heading, None)]
    #[case("> quoted", Transformer::Quote, Some(("quoted", 2)))]
    #[case(">", Transformer::Quote, Some(("", 1)))]
    #[case("- item", Transformer::UnorderedList, Some(("item", 2)))]
    #[case("-", Transformer::UnorderedList, Some(("", 1)))]
    #[case("+ plus", Transformer::UnorderedList, Some(("plus", 2)))]
    #[case("* a*", Transformer::UnorderedList, None)]
    #[case("12. twelve", Transformer::OrderedList, Some(("twelve", 4)))]
    #[case("1.5 apples", Transformer::OrderedList, None)]
    fn test_line_matchers(
        #[case] line: &str,
        #[case] t: Transformer,
        #[case] expected: Option<(&str, usize)>,
    ) {
        let got = t.match_line(line).map(|m| match m {
            LineMatch::Heading {
                content, column, ..
            }
            | LineMatch::Quote { content, column }
            | LineMatch::ListItem {
                content, column, ..
            } => (content, column),
            other => panic!("unexpected {other:?}"),
        });
        assert_eq!(got, expected);
    }

    #[test]
    fn test_ordered_marker_keeps_start() {
        assert_eq!(
            Transformer::OrderedList.match_line("7. x"),
            Some(LineMatch::ListItem {
                kind: ListKind::Ordered { start: 7 },
                content: "x",
                column: 3,
            })
        );
    }

    #[rstest]
    #[case("# not a heading", r"\# not a heading")]
    #[case("- not a list", r"\- not a list")]
    #[case("1. not a list", r"1\. not a list")]
    #[case("2024 was fine", "2024 was fine")]
    #[case("plain", "plain")]
    fn test_paragraph_line_starts(#[case] line: &str, #[case] expected: &str) {
        assert_eq!(escape_line_start(line.to_string()), expected);
    }

    #[test]
    fn test_image_export_escapes_alt_and_src() {
        assert_eq!(export_image("http://x/cat.png", "cat"), "![cat](http://x/cat.png)");
        assert_eq!(export_image("http://x/a b.png", "[1]"), r"![\[1\]](<http://x/a b.png>)");
    }
}
