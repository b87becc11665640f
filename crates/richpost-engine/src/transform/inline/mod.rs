//! Inline grammar: text runs, emphasis, code spans, links and images.
//!
//! Delimiters toggle format bits rather than nest, so `***` after bold text
//! means "flip bold and italic". The exporter only ever writes well-nested
//! output in the order underline, strikethrough, bold, italic, which keeps
//! the markdown readable by ordinary renderers.

pub mod cursor;
pub mod export;
pub mod parser;

use crate::model::TextFormat;

pub use export::{export_inline, InlineWriter};
pub use parser::{parse_inline, InlineContext, InlineParse};

/// A contiguous piece of text with one format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub format: TextFormat,
}

impl Run {
    pub fn new(text: impl Into<String>, format: TextFormat) -> Self {
        Self {
            text: text.into(),
            format,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineItem {
    Text(Run),
    Link { url: String, label: Vec<Run> },
    /// Only produced where images are allowed; the block layer lifts these
    /// out into their own blocks.
    Image { src: String, alt_text: String },
}

/// Markup that was not well formed and was read as literal text instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Construct {
    UnclosedEmphasis,
    UnclosedCodeSpan,
    UnclosedFence,
    MalformedLink,
    MalformedImage,
}

impl Construct {
    pub fn describe(self) -> &'static str {
        match self {
            Construct::UnclosedEmphasis => "unclosed emphasis delimiter",
            Construct::UnclosedCodeSpan => "unclosed code span",
            Construct::UnclosedFence => "unclosed code fence",
            Construct::MalformedLink => "malformed link",
            Construct::MalformedImage => "malformed image",
        }
    }
}

/// Emphasis delimiters and their bits.
pub struct Emphasis;

impl Emphasis {
    pub const STAR: u8 = b'*';
    pub const BOLD: &'static str = "**";
    pub const ITALIC: &'static str = "*";
    pub const UNDERLINE: &'static str = "__";
    pub const STRIKETHROUGH: &'static str = "~~";

    /// Writing order, outermost first.
    pub const ORDER: [TextFormat; 4] = [
        TextFormat::UNDERLINE,
        TextFormat::STRIKETHROUGH,
        TextFormat::BOLD,
        TextFormat::ITALIC,
    ];

    pub fn delimiter(flag: TextFormat) -> &'static str {
        if flag == TextFormat::BOLD {
            Self::BOLD
        } else if flag == TextFormat::ITALIC {
            Self::ITALIC
        } else if flag == TextFormat::UNDERLINE {
            Self::UNDERLINE
        } else if flag == TextFormat::STRIKETHROUGH {
            Self::STRIKETHROUGH
        } else {
            ""
        }
    }

    /// Bits flipped by a run of `n` stars: italic when odd, bold from two up.
    pub fn star_run(n: usize) -> TextFormat {
        let mut f = TextFormat::PLAIN;
        if n % 2 == 1 {
            f = f | TextFormat::ITALIC;
        }
        if n >= 2 {
            f = f | TextFormat::BOLD;
        }
        f
    }
}

pub struct CodeSpan;

impl CodeSpan {
    pub const TICK: u8 = b'`';
}

/// Characters that are always backslash-escaped in literal text. `<`
/// would otherwise open inline HTML or an autolink.
pub const ESCAPED: &[char] = &['\\', '*', '_', '~', '`', '[', ']', '<'];

/// Whether `s` starts with something a renderer would read as an entity,
/// such as `&amp;`, `&#60;` or the blank-line sentinel.
fn starts_entity(s: &str) -> bool {
    let Some(body) = s.strip_prefix('&') else {
        return false;
    };
    let name_len = body
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'#')
        .count();
    name_len > 0 && body.as_bytes().get(name_len) == Some(&b';')
}

/// Appends `text` with every markup character escaped.
pub fn escape_text(text: &str, out: &mut String) {
    let mut rest = text;
    while let Some(ch) = rest.chars().next() {
        match ch {
            '\n' => out.push(' '),
            '&' if starts_entity(rest) => out.push_str("\\&"),
            c if ESCAPED.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
        rest = &rest[ch.len_utf8()..];
    }
}

/// Link and image destinations: escapes delimiters, and uses the `<…>`
/// form when the URL has whitespace or is empty.
pub fn escape_destination(url: &str) -> String {
    let mut out = String::with_capacity(url.len() + 2);
    for c in url.chars() {
        if matches!(c, '\\' | '(' | ')' | '<' | '>') {
            out.push('\\');
        }
        out.push(if c == '\n' { ' ' } else { c });
    }
    if url.is_empty() || url.chars().any(char::is_whitespace) {
        format!("<{out}>")
    } else {
        out
    }
}

pub fn escape_alt(alt: &str) -> String {
    let mut out = String::with_capacity(alt.len());
    for c in alt.chars() {
        if matches!(c, '\\' | '[' | ']') {
            out.push('\\');
        }
        out.push(if c == '\n' { ' ' } else { c });
    }
    out
}
