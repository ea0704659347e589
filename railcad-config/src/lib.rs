use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "RAILCAD_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub drawing: DrawingConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 自动发现配置文件：优先读取环境变量 `RAILCAD_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 导出目录与文件命名。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// 相对 `directory` 的基准目录，缺省为进程工作目录。
    pub root: Option<PathBuf>,
    pub directory: PathBuf,
    pub file_prefix: String,
    pub extension: String,
    /// 返回给调用方的下载路径前缀。
    pub download_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            root: None,
            directory: PathBuf::from("exports"),
            file_prefix: "skf_config".to_string(),
            extension: "dxf".to_string(),
            download_prefix: "/downloads".to_string(),
        }
    }
}

/// 参数缺失时的出图缺省值。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DrawingConfig {
    pub rail_width: f64,
    pub rail_length: f64,
    pub num_blocks: u32,
    /// 单张图纸允许的滑块数量上限。
    pub max_blocks: u32,
    pub part_prefix: String,
}

impl Default for DrawingConfig {
    fn default() -> Self {
        Self {
            rail_width: 20.0,
            rail_length: 500.0,
            num_blocks: 2,
            max_blocks: 1000,
            part_prefix: "SKF".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
