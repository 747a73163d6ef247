use crate::models::Category;

/// Content types accepted for upload, keyed by the sniffed MIME string
const SUPPORTED_TYPES: &[(&str, Category)] = &[
    ("audio/basic", Category::Audio),
    ("audio/mpeg", Category::Audio),
    ("audio/mp3", Category::Audio),
    ("audio/ogg", Category::Audio),
    ("audio/wav", Category::Audio),
    ("audio/wave", Category::Audio),
    ("audio/avi", Category::Audio),
    ("audio/midi", Category::Audio),
    ("image/jpeg", Category::Pictures),
    ("image/png", Category::Pictures),
    ("image/gif", Category::Pictures),
    ("image/bmp", Category::Pictures),
    ("image/tiff", Category::Pictures),
    ("image/webp", Category::Pictures),
    ("image/svg", Category::Pictures),
    ("video/mp4", Category::Video),
    ("video/ogg", Category::Video),
    ("video/webm", Category::Video),
    ("video/avi", Category::Video),
    ("video/mpeg", Category::Video),
    ("video/quicktime", Category::Video),
    ("application/octet-stream", Category::Documents),
    ("application/pdf", Category::Documents),
    ("application/zip", Category::Documents),
    ("text/plain; charset=utf-8", Category::Documents),
    ("text/html; charset=utf-8", Category::Documents),
    ("text/css", Category::Documents),
    ("text/javascript", Category::Documents),
    ("application/json", Category::Documents),
    ("application/msword", Category::Documents),
    ("application/vnd.ms-excel", Category::Documents),
    ("application/vnd.ms-powerpoint", Category::Documents),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Category::Documents,
    ),
];

/// Look up the storage category for a sniffed content type.
///
/// The match is exact: `text/plain; charset=utf-16le` is not the same type as
/// `text/plain; charset=utf-8`.
pub fn category_for(content_type: &str) -> Option<Category> {
    SUPPORTED_TYPES
        .iter()
        .find(|(mime, _)| *mime == content_type)
        .map(|(_, category)| *category)
}

/// All registered content types, in declaration order
pub fn supported_types() -> impl Iterator<Item = (&'static str, Category)> {
    SUPPORTED_TYPES.iter().copied()
}
