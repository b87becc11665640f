//! Image "uploads" for the terminal editor: picked files are copied into
//! the configured uploads directory under a fresh name.

use richpost_config::Config;
use richpost_engine::{ImageUploader, UploadError, UploadFile};
use std::future::Future;
use std::path::Path;
use uuid::Uuid;

pub struct DirectoryUploader {
    config: Config,
}

impl DirectoryUploader {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn store(&self, file: &UploadFile) -> Result<String, UploadError> {
        let Some(extension) = image_extension(&file.name) else {
            return Err(UploadError::Rejected(format!(
                "{} is not an image",
                file.name
            )));
        };
        if file.bytes.is_empty() {
            return Err(UploadError::Rejected(format!("{} is empty", file.name)));
        }

        std::fs::create_dir_all(&self.config.uploads_path)?;
        let stored_name = format!("{}.{extension}", Uuid::new_v4());
        std::fs::write(self.config.uploads_path.join(&stored_name), &file.bytes)?;
        log::info!("Stored {} as {stored_name}", file.name);

        Ok(self.config.upload_url(&stored_name))
    }
}

impl ImageUploader for DirectoryUploader {
    fn upload(&self, file: &UploadFile) -> impl Future<Output = Result<String, UploadError>> {
        std::future::ready(self.store(file))
    }
}

/// Reads a file from disk for uploading.
pub fn read_upload_file(path: &Path) -> std::io::Result<UploadFile> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = match image_extension(&name).and_then(|ext| content_type(&ext)) {
        Some(mime) => UploadFile::new(name, bytes).with_content_type(mime),
        None => UploadFile::new(name, bytes),
    };
    Ok(file)
}

fn image_extension(name: &str) -> Option<String> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    content_type(&extension).map(|_| extension)
}

fn content_type(extension: &str) -> Option<&'static str> {
    match extension {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn uploader(dir: &TempDir, prefix: Option<&str>) -> DirectoryUploader {
        DirectoryUploader::new(Config {
            uploads_path: dir.path().join("uploads"),
            public_url_prefix: prefix.map(str::to_string),
            ..Default::default()
        })
    }

    #[test]
    fn test_stores_under_a_fresh_name() {
        let dir = TempDir::new().unwrap();
        let up = uploader(&dir, Some("https://cdn.example.com/img"));

        let url = block_on(up.upload(&UploadFile::new("Cat.PNG", b"png".to_vec()))).unwrap();

        let stored = url
            .strip_prefix("https://cdn.example.com/img/")
            .unwrap()
            .to_string();
        assert!(stored.ends_with(".png"));
        assert_ne!(stored, "Cat.png");
        let bytes = std::fs::read(dir.path().join("uploads").join(&stored)).unwrap();
        assert_eq!(bytes, b"png");
    }

    #[test]
    fn test_two_uploads_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let up = uploader(&dir, None);
        let file = UploadFile::new("a.jpg", b"x".to_vec());

        let first = block_on(up.upload(&file)).unwrap();
        let second = block_on(up.upload(&file)).unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("file://"));
    }

    #[test]
    fn test_rejects_non_images() {
        let dir = TempDir::new().unwrap();
        let up = uploader(&dir, None);

        let err = block_on(up.upload(&UploadFile::new("notes.txt", b"hi".to_vec()))).unwrap_err();
        assert!(matches!(err, UploadError::Rejected(_)));

        let err = block_on(up.upload(&UploadFile::new("blank.gif", Vec::new()))).unwrap_err();
        assert!(matches!(err, UploadError::Rejected(_)));
        assert!(!dir.path().join("uploads").exists());
    }

    #[test]
    fn test_read_upload_file_sets_content_type() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.jpeg");
        std::fs::write(&path, b"jpeg").unwrap();

        let file = read_upload_file(&path).unwrap();

        assert_eq!(file.name, "photo.jpeg");
        assert_eq!(file.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(file.bytes, b"jpeg");
    }
}
