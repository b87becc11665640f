//! The async image upload flow.
//!
//! The upload itself belongs to the application ([`ImageUploader`]); this
//! module only makes sure the host is never borrowed across the await and
//! that a result arriving after the host is gone does nothing.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Weak;

use crate::error::{Result, UploadError};
use crate::host::{EditorHost, UploadOutcome};

/// A file picked by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Stores a file somewhere public and returns its URL.
pub trait ImageUploader {
    fn upload(&self, file: &UploadFile) -> impl Future<Output = Result<String, UploadError>>;
}

/// Uploads `file` and inserts the resulting image into the host. The file
/// name becomes the image's alt text.
///
/// Typing can continue while the upload runs. If the host is dropped in
/// the meantime the result is [`UploadOutcome::Discarded`].
pub async fn upload_image<U: ImageUploader>(
    host: Weak<RefCell<EditorHost>>,
    uploader: &U,
    file: UploadFile,
) -> Result<UploadOutcome> {
    let ticket = {
        let Some(host) = host.upgrade() else {
            return Ok(UploadOutcome::Discarded);
        };
        host.borrow().begin_image_upload()?
    };
    log::debug!("uploading {} ({} bytes)", file.name, file.bytes.len());

    let result = uploader.upload(&file).await;

    let Some(host) = host.upgrade() else {
        log::warn!("editor went away while {} was uploading", file.name);
        return Ok(UploadOutcome::Discarded);
    };
    host.borrow_mut()
        .complete_image_upload(ticket, result, &file.name)
}
