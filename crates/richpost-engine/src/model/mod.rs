//! The in-memory document tree.

mod document;
mod format;
mod node;
mod portable;

pub use document::Document;
pub use format::{FormatKind, TextFormat};
pub use node::{HeadingLevel, ListKind, NodeKey, NodeKind, RenderHint};
pub use portable::{PORTABLE_VERSION, PortableListType, PortableNode};
