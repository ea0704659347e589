use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use railcad_engine::{ApplicationParams, GeometryParams};
use serde::Deserialize;

#[derive(Debug, Parser)]
#[command(name = "railcad", version, about = "直线导轨 DXF 图纸生成器")]
pub struct Cli {
    /// 配置文件路径，缺省时读取 `RAILCAD_CONFIG` 或 `./config/default.toml`
    #[arg(long, global = true, value_name = "TOML")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 生成导轨图纸并输出下载路径
    Generate(GenerateArgs),
    /// 列出 DXF 文件中的图层与实体
    Inspect {
        #[arg(value_name = "DXF")]
        path: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    #[arg(long)]
    pub config_id: u64,
    /// 导轨宽度 W
    #[arg(long, allow_negative_numbers = true)]
    pub width: Option<f64>,
    /// 导轨长度 LS
    #[arg(long, allow_negative_numbers = true)]
    pub length: Option<f64>,
    /// 滑块数量 NOB
    #[arg(long, allow_negative_numbers = true)]
    pub blocks: Option<i64>,
    #[arg(long)]
    pub part_number: Option<String>,
    #[arg(long)]
    pub surface_treatment: Option<String>,
    /// JSON 参数文件：`{"geometry": {...}, "application": {...}}`
    #[arg(long, value_name = "JSON")]
    pub params: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ParamsFile {
    #[serde(default)]
    geometry: GeometryParams,
    #[serde(default)]
    application: Option<ApplicationParams>,
}

impl GenerateArgs {
    /// 合并参数文件与命令行选项，命令行优先。
    pub fn resolve_params(&self) -> Result<(GeometryParams, Option<ApplicationParams>)> {
        let file = match &self.params {
            Some(path) => read_params_file(path)?,
            None => ParamsFile::default(),
        };

        let mut geometry = file.geometry;
        if self.width.is_some() {
            geometry.rail_width = self.width;
        }
        if self.length.is_some() {
            geometry.rail_length = self.length;
        }

        let has_flags = self.blocks.is_some()
            || self.part_number.is_some()
            || self.surface_treatment.is_some();
        let application = match file.application {
            Some(application) => Some(application),
            None if has_flags => Some(ApplicationParams::default()),
            None => None,
        }
        .map(|mut application| {
            if self.blocks.is_some() {
                application.num_blocks = self.blocks;
            }
            if let Some(part_number) = &self.part_number {
                application.part_number = Some(part_number.clone());
            }
            if let Some(treatment) = &self.surface_treatment {
                application.surface_treatment = Some(treatment.clone());
            }
            application
        });

        Ok((geometry, application))
    }
}

fn read_params_file(path: &Path) -> Result<ParamsFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("读取参数文件 {} 失败", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("解析参数文件 {} 失败", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> GenerateArgs {
        let cli = Cli::try_parse_from(args).expect("valid arguments");
        match cli.command {
            Command::Generate(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn flags_without_params_file() {
        let args = parse(&[
            "railcad", "generate", "--config-id", "4", "--width", "25", "--blocks", "3",
        ]);
        let (geometry, application) = args.resolve_params().expect("resolve");
        assert_eq!(geometry.rail_width, Some(25.0));
        assert_eq!(geometry.rail_length, None);
        let application = application.expect("application params from flags");
        assert_eq!(application.num_blocks, Some(3));
        assert!(application.part_number.is_none());
    }

    #[test]
    fn no_application_flags_means_no_application_params() {
        let args = parse(&["railcad", "generate", "--config-id", "4"]);
        let (_, application) = args.resolve_params().expect("resolve");
        assert!(application.is_none());
    }

    #[test]
    fn explicit_flags_override_params_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"geometry": {{"W": 30, "LS": "750"}}, "application": {{"NOB": 4, "PN": "FROM-FILE"}}}}"#
        )
        .expect("write params");
        let path = file.path().to_string_lossy().into_owned();

        let args = parse(&[
            "railcad",
            "generate",
            "--config-id",
            "2",
            "--params",
            &path,
            "--length",
            "900",
            "--part-number",
            "FROM-FLAG",
        ]);
        let (geometry, application) = args.resolve_params().expect("resolve");
        assert_eq!(geometry.rail_width, Some(30.0));
        assert_eq!(geometry.rail_length, Some(900.0));
        let application = application.expect("application");
        assert_eq!(application.num_blocks, Some(4));
        assert_eq!(application.part_number.as_deref(), Some("FROM-FLAG"));
    }

    #[test]
    fn negative_block_count_is_passed_through() {
        let args = parse(&["railcad", "generate", "--config-id", "1", "--blocks", "-2"]);
        let (_, application) = args.resolve_params().expect("resolve");
        assert_eq!(application.and_then(|a| a.num_blocks), Some(-2));
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["railcad", "inspect", "a.dxf", "--config", "c.toml"])
            .expect("valid arguments");
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
        assert!(matches!(cli.command, Command::Inspect { .. }));
    }
}
