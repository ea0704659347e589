use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use railcad_config::{AppConfig, ConfigError};
use railcad_io::{DocumentLoader, DxfFacade};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod cli;
mod inspect;

use cli::{Cli, Command, GenerateArgs};

fn main() {
    let cli = Cli::parse();
    let (config, fallback) = load_configuration(cli.config.as_deref());
    init_logging(&config);
    if let Some(fallback) = fallback {
        fallback.report();
    }

    let outcome = match &cli.command {
        Command::Generate(args) => run_generate(&config, args),
        Command::Inspect { path } => run_inspect(path),
    };
    if let Err(err) = outcome {
        error!(error = %format!("{err:#}"), "命令执行失败");
        std::process::exit(1);
    }
}

fn run_generate(config: &AppConfig, args: &GenerateArgs) -> Result<()> {
    let (geometry, application) = args.resolve_params()?;
    info!(config_id = args.config_id, "开始生成导轨图纸");
    let download_path =
        railcad_export::generate_with(config, args.config_id, &geometry, application.as_ref())?;
    println!("{download_path}");
    Ok(())
}

fn run_inspect(path: &Path) -> Result<()> {
    let document = DxfFacade::new()
        .load(path)
        .with_context(|| format!("无法读取 {}", path.display()))?;
    print!("{}", inspect::summarize(&document));
    Ok(())
}

/// 配置加载失败后改用默认值的记录，待日志初始化后再输出。
enum ConfigFallback {
    Explicit { path: PathBuf, error: ConfigError },
    Discovered(ConfigError),
}

impl ConfigFallback {
    fn report(&self) {
        match self {
            ConfigFallback::Explicit { path, error } => {
                warn!(path = %path.display(), error = %error, "加载指定配置失败，使用默认配置");
            }
            ConfigFallback::Discovered(
                err @ (ConfigError::Io { path, .. } | ConfigError::Parse { path, .. }),
            ) => {
                warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
            }
            ConfigFallback::Discovered(err @ ConfigError::Context { .. }) => {
                warn!(error = %err, "加载默认配置失败，使用内建默认值");
            }
        }
    }
}

fn load_configuration(override_path: Option<&Path>) -> (AppConfig, Option<ConfigFallback>) {
    let loaded = match override_path {
        Some(path) => AppConfig::from_file(path).map_err(|error| ConfigFallback::Explicit {
            path: path.to_path_buf(),
            error,
        }),
        None => AppConfig::discover().map_err(ConfigFallback::Discovered),
    };
    match loaded {
        Ok(config) => (config, None),
        Err(fallback) => (AppConfig::default(), Some(fallback)),
    }
}

/// 日志输出到 stderr，stdout 只留给命令结果。
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
