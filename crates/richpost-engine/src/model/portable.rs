//! Portable node records, the markdown-independent persistence format.
//!
//! Each node exports as `{kind, version, ...attrs}` plus its children, e.g.
//! an image becomes `{"kind":"image","version":1,"src":"…","altText":"…"}`.

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};

use super::document::Document;
use super::format::TextFormat;
use super::node::{HeadingLevel, ListKind, NodeKey, NodeKind};

/// Record version written by this crate.
pub const PORTABLE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortableListType {
    Bullet,
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PortableNode {
    Root {
        version: u32,
        children: Vec<PortableNode>,
    },
    Paragraph {
        version: u32,
        children: Vec<PortableNode>,
    },
    Heading {
        version: u32,
        level: HeadingLevel,
        children: Vec<PortableNode>,
    },
    Quote {
        version: u32,
        children: Vec<PortableNode>,
    },
    Code {
        version: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        children: Vec<PortableNode>,
    },
    List {
        version: u32,
        #[serde(rename = "listType")]
        list_type: PortableListType,
        #[serde(default = "default_start")]
        start: u32,
        children: Vec<PortableNode>,
    },
    #[serde(rename = "listitem")]
    ListItem {
        version: u32,
        children: Vec<PortableNode>,
    },
    #[serde(rename = "horizontalrule")]
    HorizontalRule { version: u32 },
    Image {
        version: u32,
        src: String,
        #[serde(rename = "altText")]
        alt_text: String,
    },
    Text {
        version: u32,
        text: String,
        #[serde(default)]
        format: TextFormat,
    },
    Link {
        version: u32,
        url: String,
        children: Vec<PortableNode>,
    },
}

fn default_start() -> u32 {
    1
}

impl PortableNode {
    fn into_parts(self) -> (NodeKind, Vec<PortableNode>) {
        match self {
            PortableNode::Root { children, .. } => (NodeKind::Root, children),
            PortableNode::Paragraph { children, .. } => (NodeKind::Paragraph, children),
            PortableNode::Heading {
                level, children, ..
            } => (NodeKind::Heading { level }, children),
            PortableNode::Quote { children, .. } => (NodeKind::Quote, children),
            PortableNode::Code {
                language, children, ..
            } => (NodeKind::CodeBlock { language }, children),
            PortableNode::List {
                list_type,
                start,
                children,
                ..
            } => {
                let kind = match list_type {
                    PortableListType::Bullet => ListKind::Bullet,
                    PortableListType::Number => ListKind::Ordered { start },
                };
                (NodeKind::List { kind }, children)
            }
            PortableNode::ListItem { children, .. } => (NodeKind::ListItem, children),
            PortableNode::HorizontalRule { .. } => (NodeKind::HorizontalRule, Vec::new()),
            PortableNode::Image { src, alt_text, .. } => (NodeKind::Image { src, alt_text }, Vec::new()),
            PortableNode::Text { text, format, .. } => (NodeKind::Text { text, format }, Vec::new()),
            PortableNode::Link { url, children, .. } => (NodeKind::Link { url }, children),
        }
    }
}

impl Document {
    /// Exports the whole tree, starting at the root.
    pub fn export_portable(&self) -> PortableNode {
        self.export_node(self.root())
            .unwrap_or(PortableNode::Root {
                version: PORTABLE_VERSION,
                children: Vec::new(),
            })
    }

    /// Exports one node and its subtree.
    pub fn export_node(&self, key: NodeKey) -> Result<PortableNode> {
        let children = self
            .children(key)?
            .iter()
            .map(|&c| self.export_node(c))
            .collect::<Result<Vec<_>>>()?;
        let version = PORTABLE_VERSION;
        Ok(match self.kind(key)?.clone() {
            NodeKind::Root => PortableNode::Root { version, children },
            NodeKind::Paragraph => PortableNode::Paragraph { version, children },
            NodeKind::Heading { level } => PortableNode::Heading {
                version,
                level,
                children,
            },
            NodeKind::Quote => PortableNode::Quote { version, children },
            NodeKind::CodeBlock { language } => PortableNode::Code {
                version,
                language,
                children,
            },
            NodeKind::List { kind } => {
                let (list_type, start) = match kind {
                    ListKind::Bullet => (PortableListType::Bullet, 1),
                    ListKind::Ordered { start } => (PortableListType::Number, start),
                };
                PortableNode::List {
                    version,
                    list_type,
                    start,
                    children,
                }
            }
            NodeKind::ListItem => PortableNode::ListItem { version, children },
            NodeKind::HorizontalRule => PortableNode::HorizontalRule { version },
            NodeKind::Image { src, alt_text } => PortableNode::Image {
                version,
                src,
                alt_text,
            },
            NodeKind::Text { text, format } => PortableNode::Text {
                version,
                text,
                format,
            },
            NodeKind::Link { url } => PortableNode::Link {
                version,
                url,
                children,
            },
        })
    }

    /// Rebuilds a document from an exported root, assigning fresh keys.
    ///
    /// Every placement is validated, so a record that nests nodes illegally
    /// fails with [`EditorError::StructuralViolation`].
    pub fn from_portable(node: PortableNode) -> Result<Document> {
        let (kind, children) = node.into_parts();
        if kind != NodeKind::Root {
            return Err(EditorError::StructuralViolation {
                parent: "document",
                child: kind.name(),
            });
        }
        let mut doc = Document::new();
        let root = doc.root();
        for child in children {
            doc.import_into(root, child)?;
        }
        Ok(doc)
    }

    fn import_into(&mut self, parent: NodeKey, node: PortableNode) -> Result<NodeKey> {
        let (kind, children) = node.into_parts();
        let key = self.append_new(parent, kind)?;
        for child in children {
            self.import_into(key, child)?;
        }
        Ok(key)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export_portable())?)
    }

    pub fn from_json(json: &str) -> Result<Document> {
        let node: PortableNode = serde_json::from_str(json)?;
        Self::from_portable(node)
    }
}
