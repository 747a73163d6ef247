use askama::Template;
use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::io;
use std::path::{Path as FsPath, PathBuf};
use thiserror::Error;
use tokio::fs;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::constants;
use crate::models::{Category, DirectoryEntry};
use crate::registry;
use crate::templates::{AcceptedTypes, IndexTemplate, ListingTemplate};
use crate::upload::{self, UploadError, UploadLimits};

/// Characters escaped when a file name is placed in a URL path
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// URL prefix under which stored files are served
const UPLOADS_PREFIX: &str = "/uploads/";

#[derive(Clone)]
pub struct AppState {
    pub uploads_dir: PathBuf,
    pub limits: UploadLimits,
}

/// Handler for the root path - renders the upload form
pub async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let accepted = Category::ALL
        .iter()
        .map(|category| AcceptedTypes {
            category: category.dir_name(),
            types: registry::supported_types()
                .filter(|(_, c)| c == category)
                .map(|(mime, _)| mime)
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();

    let template = IndexTemplate {
        app_name: constants::APP_NAME,
        max_file_size_mb: state.limits.max_file_size >> 20,
        accepted,
    };
    Ok(Html(template.render()?))
}

/// Handler for multipart uploads
pub async fn upload_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<&'static str, UploadError> {
    let multipart = multipart.map_err(|rejection| UploadError::Parse(rejection.body_text()))?;
    let parts = upload::read_form(multipart, state.limits).await?;

    for part in parts {
        let client_name = part.file_name.clone();
        match upload::store(&state.uploads_dir, part, state.limits.max_file_size).await {
            Ok(stored) => {
                tracing::info!(
                    file = %stored.relative_path(),
                    content_type = %stored.content_type,
                    size = stored.size,
                    "Stored upload"
                );
            }
            Err(err) => {
                match &err {
                    UploadError::UnsupportedType { content_type } => tracing::warn!(
                        file = %client_name,
                        content_type = %content_type,
                        "Upload rejected: content type not allowed"
                    ),
                    _ => tracing::warn!(file = %client_name, error = %err, "Upload rejected"),
                }
                return Err(err);
            }
        }
    }

    Ok("Upload successful")
}

/// Handler for `/uploads/` - lists the uploads root
pub async fn uploads_root_handler(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, AppError> {
    serve_path(&state.uploads_dir, "", request).await
}

/// Handler for stored files and category directories
pub async fn serve_upload_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    serve_path(&state.uploads_dir, &path, request).await
}

async fn serve_path(root: &FsPath, path: &str, request: Request) -> Result<Response, AppError> {
    let relative = clean_path(path);
    let target = root.join(&relative);
    let metadata = fs::metadata(&target).await.map_err(AppError::from_io)?;
    let has_trailing_slash = path.is_empty() || path.ends_with('/');

    if !metadata.is_dir() {
        if has_trailing_slash {
            return Ok(redirect(&relative));
        }
        return serve_file(&target, request).await;
    }

    if !has_trailing_slash {
        return Ok(redirect(&format!("{relative}/")));
    }

    let index = target.join("index.html");
    if fs::metadata(&index).await.is_ok_and(|m| m.is_file()) {
        return serve_file(&index, request).await;
    }

    render_listing(&target, &relative).await
}

async fn serve_file(path: &FsPath, request: Request) -> Result<Response, AppError> {
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => Ok(response.map(Body::new)),
        Err(never) => match never {},
    }
}

async fn render_listing(dir: &FsPath, relative: &str) -> Result<Response, AppError> {
    let mut entries = Vec::new();
    let mut read_dir = fs::read_dir(dir).await.map_err(AppError::from_io)?;

    while let Some(entry) = read_dir.next_entry().await.map_err(AppError::from_io)? {
        let metadata = entry.metadata().await.map_err(AppError::from_io)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let mut href = utf8_percent_encode(&name, PATH_SEGMENT).to_string();
        if metadata.is_dir() {
            href.push('/');
        }

        entries.push(DirectoryEntry {
            name,
            href,
            is_dir: metadata.is_dir(),
            size: metadata.len(),
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let path = if relative.is_empty() {
        UPLOADS_PREFIX.to_string()
    } else {
        format!("{UPLOADS_PREFIX}{relative}/")
    };
    let template = ListingTemplate { path, entries };
    Ok(Html(template.render()?).into_response())
}

fn redirect(relative: &str) -> Response {
    let location = format!(
        "{UPLOADS_PREFIX}{}",
        relative
            .split('/')
            .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/")
    );
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}

/// Resolve `.` and `..` lexically so the result never leaves the root.
fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("404 page not found")]
    NotFound,
    #[error("403 Forbidden")]
    Forbidden,
    #[error("500 Internal Server Error")]
    Io(io::Error),
    #[error("{0}")]
    Render(#[from] askama::Error),
}

impl AppError {
    fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => AppError::NotFound,
            io::ErrorKind::PermissionDenied => AppError::Forbidden,
            _ => AppError::Io(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Io(err) => {
                tracing::error!(error = %err, "Failed to read from uploads directory");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}
