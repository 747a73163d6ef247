use clap::Parser;
use std::path::PathBuf;

use crate::constants;
use crate::models::Category;
use crate::upload::UploadLimits;

#[derive(Parser, Debug, Clone)]
#[command(name = "filedrop")]
#[command(version)]
#[command(about = "HTTP upload server that sorts files by sniffed content type")]
#[command(long_about = "\
filedrop - a small HTTP upload server

Serves an upload form at /, accepts multipart uploads at /upload and serves
stored files back under /uploads/. Every file is classified by its leading
bytes and written to <uploads-dir>/{audio,pictures,video,documents}/.
Those category directories must already exist.

EXAMPLES:
    # Defaults: 0.0.0.0:3030, ./uploads, 100MB per file
    filedrop

    # Custom root and a smaller file limit
    filedrop --uploads-dir /srv/uploads --max-file-size 10485760

    # Using environment variables
    export FILEDROP_PORT=8080
    export FILEDROP_JSON_LOGS=true
    filedrop
")]
pub struct Config {
    /// Host/IP address to bind to
    ///
    /// Use 0.0.0.0 to listen on all interfaces.
    #[arg(long, default_value = "0.0.0.0", env = "FILEDROP_HOST", value_name = "HOST")]
    pub host: String,

    /// Port to listen on
    #[arg(long, default_value_t = constants::DEFAULT_PORT, env = "FILEDROP_PORT", value_name = "PORT")]
    pub port: u16,

    /// Root directory holding the category directories
    #[arg(long, default_value = constants::DEFAULT_UPLOADS_DIR, env = "FILEDROP_UPLOADS_DIR", value_name = "DIR")]
    pub uploads_dir: PathBuf,

    /// Largest accepted file, in bytes
    #[arg(long, default_value_t = constants::DEFAULT_MAX_FILE_SIZE, env = "FILEDROP_MAX_FILE_SIZE", value_name = "BYTES")]
    pub max_file_size: u64,

    /// Memory budget for form data, in bytes; larger file parts spill to temporary files
    #[arg(long, default_value_t = constants::DEFAULT_MAX_FORM_MEMORY, env = "FILEDROP_MAX_FORM_MEMORY", value_name = "BYTES")]
    pub max_form_memory: u64,

    /// Emit logs as JSON lines
    #[arg(long, env = "FILEDROP_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.uploads_dir.exists() {
            anyhow::bail!("Uploads directory does not exist: {:?}", self.uploads_dir);
        }

        if !self.uploads_dir.is_dir() {
            anyhow::bail!("Uploads path is not a directory: {:?}", self.uploads_dir);
        }

        if self.max_file_size == 0 {
            anyhow::bail!("Maximum file size cannot be zero");
        }

        if self.max_form_memory == 0 {
            anyhow::bail!("Maximum form memory cannot be zero");
        }

        // Uploads into a missing category fail per request; nothing is created here
        for category in Category::ALL {
            let dir = self.uploads_dir.join(category.dir_name());
            if !dir.is_dir() {
                tracing::warn!(
                    "Category directory {:?} is missing, {} uploads will be rejected",
                    dir,
                    category
                );
            }
        }

        Ok(())
    }

    pub fn limits(&self) -> UploadLimits {
        UploadLimits {
            max_file_size: self.max_file_size,
            max_form_memory: self.max_form_memory,
        }
    }
}
