use std::fmt;

/// Storage bucket for an uploaded file. The name doubles as the directory
/// name under the uploads root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Audio,
    Pictures,
    Video,
    Documents,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Audio,
        Category::Pictures,
        Category::Video,
        Category::Documents,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Audio => "audio",
            Category::Pictures => "pictures",
            Category::Video => "video",
            Category::Documents => "documents",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A file written to disk by the upload handler
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub category: Category,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

impl StoredFile {
    /// Path relative to the uploads root, e.g. `pictures/1700000000_photo.png`
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.category, self.file_name)
    }
}

/// One row of a directory listing under `/uploads/`
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub name: String,
    pub href: String,
    pub is_dir: bool,
    pub size: u64,
}

impl DirectoryEntry {
    pub fn display_name(&self) -> String {
        if self.is_dir {
            format!("{}/", self.name)
        } else {
            self.name.clone()
        }
    }

    pub fn formatted_size(&self) -> String {
        if self.is_dir {
            "-".to_string()
        } else {
            format_bytes(self.size)
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let i = (bytes_f.log10() / 1024_f64.log10()).floor() as usize;
    let i = i.min(UNITS.len() - 1);

    let size = bytes_f / 1024_f64.powi(i as i32);

    format!("{:.2} {}", size, UNITS[i])
}
