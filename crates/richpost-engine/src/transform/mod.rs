//! Transformers: the bidirectional rules between markdown constructs and
//! document nodes.
//!
//! The set is closed ([`Transformer`]); precedence is the order a
//! [`Registry`] was built with. Bulk import walks the registry with the
//! recursive-descent matchers in [`block`] and [`inline`]; live typing uses
//! the regex shortcuts in [`shortcut`].

pub mod block;
pub mod inline;
pub mod shortcut;

use crate::model::{NodeKind, TextFormat};

/// What a transformer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformerKind {
    /// Turns a line prefix into a block node.
    Element,
    /// Replaces matched text with a dedicated node (links, images).
    TextMatch,
    /// Flips a format bit on the matched text.
    TextFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transformer {
    CodeFence,
    Heading,
    Quote,
    HorizontalRule,
    UnorderedList,
    OrderedList,
    Image,
    Link,
    InlineCode,
    Bold,
    Underline,
    Strikethrough,
    Italic,
}

impl Transformer {
    pub const ALL: [Transformer; 13] = [
        Transformer::CodeFence,
        Transformer::Heading,
        Transformer::Quote,
        Transformer::HorizontalRule,
        Transformer::UnorderedList,
        Transformer::OrderedList,
        Transformer::Image,
        Transformer::Link,
        Transformer::InlineCode,
        Transformer::Bold,
        Transformer::Underline,
        Transformer::Strikethrough,
        Transformer::Italic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Transformer::CodeFence => "code-fence",
            Transformer::Heading => "heading",
            Transformer::Quote => "quote",
            Transformer::HorizontalRule => "horizontal-rule",
            Transformer::UnorderedList => "unordered-list",
            Transformer::OrderedList => "ordered-list",
            Transformer::Image => "image",
            Transformer::Link => "link",
            Transformer::InlineCode => "inline-code",
            Transformer::Bold => "bold",
            Transformer::Underline => "underline",
            Transformer::Strikethrough => "strikethrough",
            Transformer::Italic => "italic",
        }
    }

    pub fn kind(self) -> TransformerKind {
        match self {
            Transformer::CodeFence
            | Transformer::Heading
            | Transformer::Quote
            | Transformer::HorizontalRule
            | Transformer::UnorderedList
            | Transformer::OrderedList => TransformerKind::Element,
            Transformer::Image | Transformer::Link => TransformerKind::TextMatch,
            Transformer::InlineCode
            | Transformer::Bold
            | Transformer::Underline
            | Transformer::Strikethrough
            | Transformer::Italic => TransformerKind::TextFormat,
        }
    }

    /// The typed character that fires this transformer's shortcut.
    pub fn trigger(self) -> char {
        match self.kind() {
            TransformerKind::Element => ' ',
            TransformerKind::TextMatch => ')',
            TransformerKind::TextFormat => match self {
                Transformer::InlineCode => '`',
                Transformer::Underline => '_',
                Transformer::Strikethrough => '~',
                _ => '*',
            },
        }
    }

    /// Regex tried against the text before the caret once the trigger has
    /// been typed. Capture group 1 is the replaced span when the pattern has
    /// to look at a guard character in front of it.
    pub fn shortcut_pattern(self) -> &'static str {
        match self {
            Transformer::CodeFence => r"^```([A-Za-z0-9_+\-]*) $",
            Transformer::Heading => r"^(#{1,6}) $",
            Transformer::Quote => r"^> $",
            Transformer::HorizontalRule => r"^--- $",
            Transformer::UnorderedList => r"^[-+] $",
            Transformer::OrderedList => r"^(\d{1,9})\. $",
            Transformer::Image => r"(!\[([^\]]*)\]\(([^)\s]+)\))$",
            Transformer::Link => r"(?:^|[^!])(\[([^\]]+)\]\(([^)\s]+)\))$",
            Transformer::InlineCode => r"(`([^`]+)`)$",
            Transformer::Bold => r"(\*\*([^*]+)\*\*)$",
            Transformer::Underline => r"(__([^_]+)__)$",
            Transformer::Strikethrough => r"(~~([^~]+)~~)$",
            Transformer::Italic => r"(?:^|[^*])(\*([^*]+)\*)$",
        }
    }

    /// The format bit a text-format transformer flips.
    pub fn format(self) -> Option<TextFormat> {
        match self {
            Transformer::InlineCode => Some(TextFormat::CODE),
            Transformer::Bold => Some(TextFormat::BOLD),
            Transformer::Underline => Some(TextFormat::UNDERLINE),
            Transformer::Strikethrough => Some(TextFormat::STRIKETHROUGH),
            Transformer::Italic => Some(TextFormat::ITALIC),
            _ => None,
        }
    }

    /// The element transformer that exports a block of this kind.
    pub fn for_block(kind: &NodeKind) -> Option<Transformer> {
        match kind {
            NodeKind::CodeBlock { .. } => Some(Transformer::CodeFence),
            NodeKind::Heading { .. } => Some(Transformer::Heading),
            NodeKind::Quote => Some(Transformer::Quote),
            NodeKind::HorizontalRule => Some(Transformer::HorizontalRule),
            NodeKind::List { kind } => Some(match kind {
                crate::model::ListKind::Bullet => Transformer::UnorderedList,
                crate::model::ListKind::Ordered { .. } => Transformer::OrderedList,
            }),
            NodeKind::Image { .. } => Some(Transformer::Image),
            _ => None,
        }
    }
}

/// An ordered transformer list. Earlier entries win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    order: Vec<Transformer>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

impl Registry {
    /// The dialect used for stored posts.
    ///
    /// Fences come first because nothing inside them is markup. Images sit
    /// before links so `![a](b)` is never read as `!` plus a link, and every
    /// text-match rule sits before emphasis so a delimiter inside a URL is
    /// not taken as formatting. Bold precedes italic for `**`.
    pub fn standard() -> Self {
        Self {
            order: vec![
                Transformer::CodeFence,
                Transformer::HorizontalRule,
                Transformer::Heading,
                Transformer::Quote,
                Transformer::UnorderedList,
                Transformer::OrderedList,
                Transformer::Image,
                Transformer::Link,
                Transformer::InlineCode,
                Transformer::Bold,
                Transformer::Underline,
                Transformer::Strikethrough,
                Transformer::Italic,
            ],
        }
    }

    /// A registry with a caller-chosen order. Duplicates keep their first
    /// position.
    pub fn from_order(order: impl IntoIterator<Item = Transformer>) -> Self {
        let mut out: Vec<Transformer> = Vec::new();
        for t in order {
            if !out.contains(&t) {
                out.push(t);
            }
        }
        Self { order: out }
    }

    pub fn iter(&self) -> impl Iterator<Item = Transformer> + '_ {
        self.order.iter().copied()
    }

    pub fn contains(&self, t: Transformer) -> bool {
        self.order.contains(&t)
    }

    pub fn position(&self, t: Transformer) -> Option<usize> {
        self.order.iter().position(|&x| x == t)
    }

    pub fn elements(&self) -> impl Iterator<Item = Transformer> + '_ {
        self.iter()
            .filter(|t| t.kind() == TransformerKind::Element)
    }

    /// Transformers whose shortcut fires on `ch`, in precedence order.
    pub fn triggered_by(&self, ch: char) -> impl Iterator<Item = Transformer> + '_ {
        self.iter().filter(move |t| t.trigger() == ch)
    }

    /// The format bits this registry can read and write.
    pub fn formats(&self) -> TextFormat {
        self.iter()
            .filter_map(Transformer::format)
            .fold(TextFormat::PLAIN, |acc, f| acc | f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn before(a: Transformer, b: Transformer) -> bool {
        let r = Registry::standard();
        r.position(a).unwrap() < r.position(b).unwrap()
    }

    #[rstest]
    #[case(Transformer::Image, Transformer::Link)]
    #[case(Transformer::Image, Transformer::Bold)]
    #[case(Transformer::Image, Transformer::Italic)]
    #[case(Transformer::Image, Transformer::Underline)]
    #[case(Transformer::Link, Transformer::Italic)]
    #[case(Transformer::Bold, Transformer::Italic)]
    #[case(Transformer::Heading, Transformer::Image)]
    #[case(Transformer::CodeFence, Transformer::Image)]
    #[case(Transformer::HorizontalRule, Transformer::UnorderedList)]
    #[case(Transformer::InlineCode, Transformer::Bold)]
    fn test_standard_precedence(#[case] first: Transformer, #[case] second: Transformer) {
        assert!(
            before(first, second),
            "{} must be tried before {}",
            first.name(),
            second.name()
        );
    }

    #[test]
    fn test_standard_registry_holds_every_transformer_once() {
        let r = Registry::standard();
        assert_eq!(r.iter().count(), Transformer::ALL.len());
        for t in Transformer::ALL {
            assert!(r.contains(t), "missing {}", t.name());
        }
    }

    #[test]
    fn test_from_order_drops_duplicates() {
        let r = Registry::from_order([Transformer::Bold, Transformer::Italic, Transformer::Bold]);
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![Transformer::Bold, Transformer::Italic]);
        assert_eq!(r.formats(), TextFormat::BOLD | TextFormat::ITALIC);
    }

    #[test]
    fn test_image_fires_on_closing_paren() {
        assert_eq!(Transformer::Image.trigger(), ')');
        let triggered: Vec<_> = Registry::standard().triggered_by(')').collect();
        assert_eq!(triggered, vec![Transformer::Image, Transformer::Link]);
    }
}
