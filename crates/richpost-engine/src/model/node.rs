use std::fmt;

use serde::{Deserialize, Serialize};

use super::format::TextFormat;

/// Stable identity of a node inside one [`Document`](super::Document).
///
/// Keys come from a per-document counter and are never handed out twice,
/// so a key that was deleted stays dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub(crate) u64);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Heading depth, 1 through 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct HeadingLevel(u8);

impl HeadingLevel {
    pub const MAX: u8 = 6;

    pub fn new(level: u8) -> Option<Self> {
        (1..=Self::MAX).contains(&level).then_some(Self(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for HeadingLevel {
    fn default() -> Self {
        Self(1)
    }
}

impl TryFrom<u8> for HeadingLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("heading level out of range: {value}"))
    }
}

impl From<HeadingLevel> for u8 {
    fn from(level: HeadingLevel) -> Self {
        level.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Bullet,
    Ordered { start: u32 },
}

impl ListKind {
    /// Lists of the same shape merge when they end up adjacent.
    pub fn same_shape(self, other: ListKind) -> bool {
        matches!(
            (self, other),
            (ListKind::Bullet, ListKind::Bullet) | (ListKind::Ordered { .. }, ListKind::Ordered { .. })
        )
    }
}

/// Every node variant of the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Paragraph,
    Heading { level: HeadingLevel },
    Quote,
    CodeBlock { language: Option<String> },
    List { kind: ListKind },
    ListItem,
    HorizontalRule,
    /// Decorator block: renders an image, owns no children.
    Image { src: String, alt_text: String },
    Text { text: String, format: TextFormat },
    Link { url: String },
}

/// How a node participates in layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderHint {
    /// Owns other blocks (root, lists).
    Container,
    /// A block whose children are inline content.
    TextBlock,
    /// A block with custom non-text content.
    Decorator,
    /// A childless block that is not a decorator.
    Leaf,
    Inline,
}

impl NodeKind {
    pub fn text(text: impl Into<String>, format: TextFormat) -> Self {
        NodeKind::Text {
            text: text.into(),
            format,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::text(text, TextFormat::PLAIN)
    }

    pub fn heading(level: HeadingLevel) -> Self {
        NodeKind::Heading { level }
    }

    pub fn image(src: impl Into<String>, alt_text: impl Into<String>) -> Self {
        NodeKind::Image {
            src: src.into(),
            alt_text: alt_text.into(),
        }
    }

    pub fn link(url: impl Into<String>) -> Self {
        NodeKind::Link { url: url.into() }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Paragraph => "paragraph",
            NodeKind::Heading { .. } => "heading",
            NodeKind::Quote => "quote",
            NodeKind::CodeBlock { .. } => "code",
            NodeKind::List { .. } => "list",
            NodeKind::ListItem => "listitem",
            NodeKind::HorizontalRule => "horizontalrule",
            NodeKind::Image { .. } => "image",
            NodeKind::Text { .. } => "text",
            NodeKind::Link { .. } => "link",
        }
    }

    pub fn render_hint(&self) -> RenderHint {
        match self {
            NodeKind::Root | NodeKind::List { .. } => RenderHint::Container,
            NodeKind::Paragraph
            | NodeKind::Heading { .. }
            | NodeKind::Quote
            | NodeKind::CodeBlock { .. }
            | NodeKind::ListItem => RenderHint::TextBlock,
            NodeKind::Image { .. } => RenderHint::Decorator,
            NodeKind::HorizontalRule => RenderHint::Leaf,
            NodeKind::Text { .. } | NodeKind::Link { .. } => RenderHint::Inline,
        }
    }

    pub fn is_inline(&self) -> bool {
        self.render_hint() == RenderHint::Inline
    }

    pub fn is_text_block(&self) -> bool {
        self.render_hint() == RenderHint::TextBlock
    }

    /// Blocks without children that a caret can sit on (images, rules).
    pub fn is_leaf_block(&self) -> bool {
        matches!(self.render_hint(), RenderHint::Decorator | RenderHint::Leaf)
    }

    /// Nesting rules of the tree.
    pub fn can_contain(&self, child: &NodeKind) -> bool {
        match self {
            NodeKind::Root => matches!(
                child,
                NodeKind::Paragraph
                    | NodeKind::Heading { .. }
                    | NodeKind::Quote
                    | NodeKind::CodeBlock { .. }
                    | NodeKind::List { .. }
                    | NodeKind::HorizontalRule
                    | NodeKind::Image { .. }
            ),
            NodeKind::List { .. } => matches!(child, NodeKind::ListItem),
            NodeKind::Paragraph | NodeKind::Heading { .. } | NodeKind::Quote | NodeKind::ListItem => {
                child.is_inline()
            }
            NodeKind::CodeBlock { .. } => matches!(
                child,
                NodeKind::Text { format, .. } if format.is_plain()
            ),
            NodeKind::Link { .. } => matches!(child, NodeKind::Text { .. }),
            NodeKind::HorizontalRule | NodeKind::Image { .. } | NodeKind::Text { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_level_bounds() {
        assert!(HeadingLevel::new(0).is_none());
        assert_eq!(HeadingLevel::new(3).map(HeadingLevel::get), Some(3));
        assert!(HeadingLevel::new(7).is_none());
    }

    #[test]
    fn test_image_is_a_childless_block() {
        let image = NodeKind::image("http://x/cat.png", "cat");
        assert!(NodeKind::Root.can_contain(&image));
        assert!(!NodeKind::Paragraph.can_contain(&image));
        assert!(!image.can_contain(&NodeKind::plain("x")));
        assert_eq!(image.render_hint(), RenderHint::Decorator);
    }

    #[test]
    fn test_inline_and_block_children_do_not_mix() {
        assert!(!NodeKind::Root.can_contain(&NodeKind::plain("x")));
        assert!(!NodeKind::Paragraph.can_contain(&NodeKind::Paragraph));
        assert!(NodeKind::Paragraph.can_contain(&NodeKind::link("u")));
        assert!(!NodeKind::link("u").can_contain(&NodeKind::link("v")));
    }

    #[test]
    fn test_code_blocks_hold_only_plain_text() {
        let code = NodeKind::CodeBlock { language: None };
        assert!(code.can_contain(&NodeKind::plain("fn main() {}")));
        assert!(!code.can_contain(&NodeKind::text("x", TextFormat::BOLD)));
    }

    #[test]
    fn test_list_shapes() {
        assert!(ListKind::Bullet.same_shape(ListKind::Bullet));
        assert!(ListKind::Ordered { start: 1 }.same_shape(ListKind::Ordered { start: 4 }));
        assert!(!ListKind::Bullet.same_shape(ListKind::Ordered { start: 1 }));
    }
}
