use std::env;
use std::path::{Path, PathBuf};

use railcad_config::ExportConfig;
use tracing::trace;

/// 根据导出配置确定输出目录、文件名与下载路径。
#[derive(Debug, Clone)]
pub struct ExportLocator {
    directory: PathBuf,
    file_prefix: String,
    extension: String,
    download_prefix: String,
}

impl ExportLocator {
    /// 绝对目录原样使用；相对目录拼接到 `root`，未配置时拼接到当前工作目录。
    pub fn from_config(config: &ExportConfig) -> Self {
        let directory = if config.directory.is_absolute() {
            config.directory.clone()
        } else {
            match &config.root {
                Some(root) => root.join(&config.directory),
                None => Self::relative_to_working_dir(&config.directory),
            }
        };
        trace!(directory = %directory.display(), "export locator directory");

        Self {
            directory,
            file_prefix: config.file_prefix.clone(),
            extension: config.extension.trim_start_matches('.').to_string(),
            download_prefix: config.download_prefix.clone(),
        }
    }

    #[inline]
    pub fn export_dir(&self) -> &Path {
        &self.directory
    }

    /// `<prefix>_<configId>.<ext>`，与参数取值无关。
    pub fn file_name(&self, config_id: u64) -> String {
        if self.extension.is_empty() {
            format!("{}_{config_id}", self.file_prefix)
        } else {
            format!("{}_{config_id}.{}", self.file_prefix, self.extension)
        }
    }

    pub fn download_path(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.download_prefix.trim_end_matches('/'))
    }

    fn relative_to_working_dir(directory: &Path) -> PathBuf {
        env::current_dir()
            .map(|cwd| cwd.join(directory))
            .unwrap_or_else(|_| directory.to_path_buf())
    }
}
