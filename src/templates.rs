use askama::Template;
use crate::models::DirectoryEntry;

/// Content types accepted for one category, as shown on the upload form
pub struct AcceptedTypes {
    pub category: &'static str,
    pub types: String,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub app_name: &'static str,
    pub max_file_size_mb: u64,
    pub accepted: Vec<AcceptedTypes>,
}

#[derive(Template)]
#[template(path = "listing.html")]
pub struct ListingTemplate {
    pub path: String,
    pub entries: Vec<DirectoryEntry>,
}
