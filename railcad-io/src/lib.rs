mod reader;
mod writer;

use std::fs;
use std::io::Write;
use std::path::Path;

use railcad_core::document::Document;
use tempfile::NamedTempFile;
use thiserror::Error;

pub use writer::{DXF_VERSION, write_document};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        reader::parse_document(&data)
    }
}

impl DocumentSaver for DxfFacade {
    /// 序列化为 DXF 并整体替换目标文件：先写入同目录临时文件，再重命名覆盖。
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let content = write_document(document)?;
        let write_error = |source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        };

        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staging = NamedTempFile::new_in(directory).map_err(write_error)?;
        staging
            .write_all(content.as_bytes())
            .and_then(|()| staging.flush())
            .map_err(write_error)?;
        staging
            .persist(path)
            .map_err(|err| write_error(err.error))?;
        Ok(())
    }
}
