/// Application name
pub const APP_NAME: &str = "filedrop";

/// Multipart field name carrying uploaded files
pub const FILE_FIELD: &str = "file";

/// Number of leading bytes inspected when sniffing a content type
pub const SNIFF_LEN: usize = 512;

/// Default maximum size of a single uploaded file (100 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 << 20;

/// Default in-memory budget for non-file form values (32 MiB)
pub const DEFAULT_MAX_FORM_MEMORY: u64 = 32 << 20;

/// Default listening port
pub const DEFAULT_PORT: u16 = 3030;

/// Default uploads root, relative to the working directory
pub const DEFAULT_UPLOADS_DIR: &str = "./uploads";

/// Cache-disabling headers attached to every response
pub const NO_CACHE_HEADERS: &[(&str, &str)] = &[
    ("cache-control", "no-cache, no-store, must-revalidate"),
    ("pragma", "no-cache"),
    ("expires", "0"),
];
