pub mod codec;
pub mod commands;
pub mod emoji;
pub mod error;
pub mod host;
pub mod model;
pub mod render;
pub mod selection;
pub mod transform;
pub mod upload;

// Re-export key types for easier usage
pub use codec::{MarkdownCodec, ParseAmbiguity, Parsed};
pub use commands::insert::ImagePlacement;
pub use commands::{BlockType, Cmd, Editor, Patch, ToolbarState};
pub use error::{EditorError, Result, UploadError};
pub use host::{EditorHost, ExternalValuePolicy, HostOptions, HostState, UploadOutcome, UploadTicket};
pub use model::{Document, FormatKind, NodeKey, NodeKind, TextFormat};
pub use selection::{Point, Selection};
pub use transform::Registry;
pub use upload::{ImageUploader, UploadFile, upload_image};
