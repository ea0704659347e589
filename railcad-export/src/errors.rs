use std::path::PathBuf;

use railcad_config::ConfigError;
use railcad_engine::ParameterError;
use railcad_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid drawing parameters: {0}")]
    Parameter(#[from] ParameterError),
    #[error("failed to create export directory {path:?}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
