//! Multipart upload parsing and storage.
//!
//! A request is handled in two phases. The whole multipart body is read
//! first, so a malformed body is reported before anything touches the disk.
//! Collected `file` parts are then stored one by one in arrival order; the
//! first failure stops the request and files already written stay in place.
//! Parts too large for the memory budget wait in temporary files, which are
//! removed once the request is done with them.

use axum::{
    extract::multipart::{Field, Multipart, MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::{NamedTempFile, TempPath};
use thiserror::Error;
use tokio::{
    fs::File,
    io::{self, AsyncWriteExt},
};

use crate::constants::{FILE_FIELD, SNIFF_LEN};
use crate::models::StoredFile;
use crate::registry;
use crate::sniff;

/// Size limits applied while reading an upload
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    /// Largest accepted file part, in bytes
    pub max_file_size: u64,
    /// Bytes of form data held in memory; larger file parts spill to disk
    pub max_form_memory: u64,
}

/// Errors that end an upload request.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The body is not a readable multipart form.
    #[error("{0}")]
    Parse(String),

    /// A file part over the memory budget could not be written to a temporary file.
    #[error("{0}")]
    Spool(std::io::Error),

    /// A file part is larger than the configured maximum.
    #[error("The uploaded file is too big: {file_name}. Please use a file less than {limit_mb}MB in size")]
    SizeExceeded { file_name: String, limit_mb: u64 },

    /// A file part has no bytes to sniff.
    #[error("unexpected end of file: {file_name}")]
    EmptyFile { file_name: String },

    /// The sniffed content type is not registered.
    #[error("The provided file format is not allowed.")]
    UnsupportedType { content_type: String },

    /// The destination file could not be created.
    #[error("{0}")]
    CreateFailed(std::io::Error),

    /// The destination file was created but writing to it failed.
    #[error("{0}")]
    WriteFailed(std::io::Error),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = match &self {
            UploadError::Parse(_)
            | UploadError::Spool(_)
            | UploadError::EmptyFile { .. }
            | UploadError::WriteFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::SizeExceeded { .. }
            | UploadError::UnsupportedType { .. }
            | UploadError::CreateFailed(_) => StatusCode::BAD_REQUEST,
        };

        (status, self.to_string()).into_response()
    }
}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        UploadError::Parse(err.body_text())
    }
}

/// Where the bytes of a `file` part live between the two phases
#[derive(Debug)]
pub enum PartBody {
    Memory(Vec<u8>),
    /// Spilled to a temporary file, removed when dropped
    Spooled { head: Vec<u8>, path: TempPath },
    /// Exceeded the size limit; only the byte count was kept
    Discarded,
}

impl PartBody {
    /// Leading bytes available for sniffing
    pub fn head(&self) -> &[u8] {
        match self {
            PartBody::Memory(bytes) => &bytes[..bytes.len().min(SNIFF_LEN)],
            PartBody::Spooled { head, .. } => head,
            PartBody::Discarded => &[],
        }
    }
}

/// A `file` part read from the form
#[derive(Debug)]
pub struct FilePart {
    pub file_name: String,
    pub size: u64,
    pub body: PartBody,
}

/// Read the whole multipart body, keeping every `file` part in arrival order.
///
/// Form values and in-memory file parts share the `max_form_memory` budget.
/// A file part that does not fit in what is left is spooled to a temporary
/// file instead.
pub async fn read_form(
    mut multipart: Multipart,
    limits: UploadLimits,
) -> Result<Vec<FilePart>, UploadError> {
    let mut files = Vec::new();
    let mut value_bytes = 0u64;
    let mut memory_left = limits.max_form_memory;

    while let Some(mut field) = multipart.next_field().await? {
        let file_name = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_owned);

        match file_name {
            Some(file_name) if field.name() == Some(FILE_FIELD) => {
                let part =
                    buffer_file(&mut field, file_name, limits.max_file_size, memory_left).await?;
                if let PartBody::Memory(bytes) = &part.body {
                    memory_left -= bytes.len() as u64;
                }
                files.push(part);
            }
            Some(_) => {
                drain(&mut field).await?;
            }
            None => {
                let size = drain(&mut field).await?;
                value_bytes += size;
                if value_bytes > limits.max_form_memory {
                    return Err(UploadError::Parse(
                        "multipart: message too large".to_string(),
                    ));
                }
                memory_left = memory_left.saturating_sub(size);
            }
        }
    }

    Ok(files)
}

async fn buffer_file(
    field: &mut Field<'_>,
    file_name: String,
    max_file_size: u64,
    memory_left: u64,
) -> Result<FilePart, UploadError> {
    let mut buffer = Vec::new();
    let mut spool: Option<(File, TempPath)> = None;
    let mut head = Vec::new();
    let mut size = 0u64;
    let mut discarded = false;

    while let Some(chunk) = field.chunk().await? {
        size += chunk.len() as u64;
        if discarded {
            continue;
        }
        if size > max_file_size {
            // Keep counting, stop holding bytes
            discarded = true;
            buffer = Vec::new();
            spool = None;
            continue;
        }

        match spool.as_mut() {
            Some((file, _)) => file.write_all(&chunk).await.map_err(UploadError::Spool)?,
            None => {
                buffer.extend_from_slice(&chunk);
                if buffer.len() as u64 > memory_left {
                    let (mut file, path) = spool_file()?;
                    file.write_all(&buffer).await.map_err(UploadError::Spool)?;
                    head = buffer[..buffer.len().min(SNIFF_LEN)].to_vec();
                    buffer = Vec::new();
                    spool = Some((file, path));
                }
            }
        }
    }

    let body = if discarded {
        PartBody::Discarded
    } else if let Some((mut file, path)) = spool {
        file.flush().await.map_err(UploadError::Spool)?;
        PartBody::Spooled { head, path }
    } else {
        PartBody::Memory(buffer)
    };

    Ok(FilePart {
        file_name,
        size,
        body,
    })
}

fn spool_file() -> Result<(File, TempPath), UploadError> {
    let (file, path) = NamedTempFile::new()
        .map_err(UploadError::Spool)?
        .into_parts();
    Ok((File::from_std(file), path))
}

async fn drain(field: &mut Field<'_>) -> Result<u64, UploadError> {
    let mut size = 0u64;
    while let Some(chunk) = field.chunk().await? {
        size += chunk.len() as u64;
    }
    Ok(size)
}

/// Validate a part and write it under `<uploads_root>/<category>/`.
pub async fn store(
    uploads_root: &Path,
    part: FilePart,
    max_file_size: u64,
) -> Result<StoredFile, UploadError> {
    if matches!(part.body, PartBody::Discarded) || part.size > max_file_size {
        return Err(UploadError::SizeExceeded {
            file_name: part.file_name,
            limit_mb: max_file_size >> 20,
        });
    }

    if part.size == 0 {
        return Err(UploadError::EmptyFile {
            file_name: part.file_name,
        });
    }

    let content_type = sniff::detect_content_type(part.body.head());
    let category = registry::category_for(&content_type).ok_or_else(|| {
        UploadError::UnsupportedType {
            content_type: content_type.clone(),
        }
    })?;

    let file_name = stored_file_name(&part.file_name);
    let destination: PathBuf = uploads_root.join(category.dir_name()).join(&file_name);

    let mut file = File::create(&destination)
        .await
        .map_err(UploadError::CreateFailed)?;
    match &part.body {
        PartBody::Memory(bytes) => file
            .write_all(bytes)
            .await
            .map_err(UploadError::WriteFailed)?,
        PartBody::Spooled { path, .. } => {
            let mut source = File::open(path).await.map_err(UploadError::Spool)?;
            io::copy(&mut source, &mut file)
                .await
                .map_err(UploadError::WriteFailed)?;
        }
        // Rejected above
        PartBody::Discarded => {}
    }
    file.flush().await.map_err(UploadError::WriteFailed)?;

    Ok(StoredFile {
        category,
        file_name,
        content_type,
        size: part.size,
    })
}

/// `<unix-nanos>_<basename>`
fn stored_file_name(client_name: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    format!("{}_{}", nanos, base_name(client_name))
}

/// Last `/`-separated component of a client-supplied filename.
/// Trailing slashes are ignored; an empty name becomes `.`.
pub fn base_name(name: &str) -> &str {
    if name.is_empty() {
        return ".";
    }
    let trimmed = name.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use tempfile::TempDir;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01";

    fn uploads_root() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for category in Category::ALL {
            std::fs::create_dir(dir.path().join(category.dir_name())).unwrap();
        }
        dir
    }

    fn part(file_name: &str, contents: &[u8]) -> FilePart {
        FilePart {
            file_name: file_name.to_string(),
            size: contents.len() as u64,
            body: PartBody::Memory(contents.to_vec()),
        }
    }

    #[test]
    fn base_name_takes_last_component() {
        assert_eq!(base_name("photo.png"), "photo.png");
        assert_eq!(base_name("a/b/photo.png"), "photo.png");
        assert_eq!(base_name("/etc/passwd"), "passwd");
        assert_eq!(base_name("dir/"), "dir");
        assert_eq!(base_name("../../x"), "x");
        assert_eq!(base_name(""), ".");
        assert_eq!(base_name("///"), "/");
    }

    #[tokio::test]
    async fn stores_png_under_pictures() {
        let root = uploads_root();
        let stored = store(root.path(), part("photo.png", PNG), 1024).await.unwrap();

        assert_eq!(stored.category, Category::Pictures);
        assert_eq!(stored.content_type, "image/png");
        let (stamp, rest) = stored.file_name.split_once('_').unwrap();
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(rest, "photo.png");

        let written = std::fs::read(root.path().join(stored.relative_path())).unwrap();
        assert_eq!(written, PNG);
    }

    #[tokio::test]
    async fn oversized_part_is_rejected_without_writing() {
        let root = uploads_root();
        let oversized = FilePart {
            file_name: "big.png".to_string(),
            size: 2048,
            body: PartBody::Discarded,
        };

        let err = store(root.path(), oversized, 1024).await.unwrap_err();
        assert!(matches!(err, UploadError::SizeExceeded { .. }));
        assert_eq!(std::fs::read_dir(root.path().join("pictures")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unsupported_type_is_rejected() {
        let root = uploads_root();
        let gzip = part("archive.gz", b"\x1F\x8B\x08\0\0\0\0\0\0\x03");

        let err = store(root.path(), gzip, 1024).await.unwrap_err();
        match err {
            UploadError::UnsupportedType { content_type } => {
                assert_eq!(content_type, "application/x-gzip")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn spooled_part_is_copied_and_its_temp_file_removed() {
        let root = uploads_root();
        let mut contents = PNG.to_vec();
        contents.resize(4096, 0xAB);

        let mut spool = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut spool, &contents).unwrap();
        let path = spool.into_temp_path();
        let spool_path = path.to_path_buf();

        let part = FilePart {
            file_name: "large.png".to_string(),
            size: contents.len() as u64,
            body: PartBody::Spooled {
                head: contents[..SNIFF_LEN].to_vec(),
                path,
            },
        };
        let stored = store(root.path(), part, 1 << 20).await.unwrap();

        assert_eq!(stored.category, Category::Pictures);
        let written = std::fs::read(root.path().join(stored.relative_path())).unwrap();
        assert_eq!(written, contents);
        assert!(!spool_path.exists());
    }

    #[test]
    fn head_is_limited_to_sniff_window() {
        let body = PartBody::Memory(vec![b'a'; SNIFF_LEN * 2]);
        assert_eq!(body.head().len(), SNIFF_LEN);
        assert!(PartBody::Discarded.head().is_empty());
    }

    #[tokio::test]
    async fn missing_category_directory_fails_creation() {
        let root = tempfile::tempdir().unwrap();
        let err = store(root.path(), part("photo.png", PNG), 1024)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::CreateFailed(_)));
        assert!(!root.path().join("pictures").exists());
    }

    #[tokio::test]
    async fn empty_part_cannot_be_sniffed() {
        let root = uploads_root();
        let err = store(root.path(), part("empty.txt", b""), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::EmptyFile { .. }));
    }

    #[test]
    fn error_statuses() {
        let status = |err: UploadError| err.into_response().status();

        assert_eq!(
            status(UploadError::Parse("bad".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(UploadError::Spool(std::io::ErrorKind::Other.into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(UploadError::SizeExceeded {
                file_name: "x".into(),
                limit_mb: 100
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(UploadError::UnsupportedType {
                content_type: "application/x-gzip".into()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(UploadError::CreateFailed(std::io::ErrorKind::NotFound.into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(UploadError::WriteFailed(std::io::ErrorKind::Other.into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
