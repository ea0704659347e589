use std::fs;
use std::path::PathBuf;

use railcad_config::{AppConfig, DrawingConfig};
use railcad_engine::{
    ApplicationParams, BlockLayout, DrawingDefaults, GeometryParams, RailSpec, build_drawing,
    rail_registry,
};
use railcad_io::{DocumentSaver, DxfFacade};
use tracing::{debug, error, info};

use crate::errors::GenerationError;
use crate::locator::ExportLocator;

/// 一次出图的结果。
#[derive(Debug, Clone)]
pub struct GeneratedDrawing {
    pub spec: RailSpec,
    pub layout: BlockLayout,
    pub file_path: PathBuf,
    pub download_path: String,
}

/// 读取自动发现的配置并生成图纸，返回下载路径（如 `/downloads/skf_config_7.dxf`）。
pub fn generate(
    config_id: u64,
    geometry: &GeometryParams,
    application: Option<&ApplicationParams>,
) -> Result<String, GenerationError> {
    let config = AppConfig::discover().inspect_err(|err| {
        error!(config_id, error = %err, "加载配置失败");
    })?;
    generate_with(&config, config_id, geometry, application)
}

/// 使用显式配置生成图纸。
pub fn generate_with(
    config: &AppConfig,
    config_id: u64,
    geometry: &GeometryParams,
    application: Option<&ApplicationParams>,
) -> Result<String, GenerationError> {
    export_drawing(config, config_id, geometry, application).map(|drawing| drawing.download_path)
}

/// 完整出图流程：解析参数、构建文档、写出文件。同一 `config_id` 重复调用会覆盖旧文件。
pub fn export_drawing(
    config: &AppConfig,
    config_id: u64,
    geometry: &GeometryParams,
    application: Option<&ApplicationParams>,
) -> Result<GeneratedDrawing, GenerationError> {
    let result = run(config, config_id, geometry, application);
    match &result {
        Ok(drawing) => info!(
            config_id,
            path = %drawing.file_path.display(),
            blocks = drawing.spec.num_blocks,
            "导轨图纸已生成"
        ),
        Err(err) => error!(config_id, error = %err, "导轨图纸生成失败"),
    }
    result
}

fn run(
    config: &AppConfig,
    config_id: u64,
    geometry: &GeometryParams,
    application: Option<&ApplicationParams>,
) -> Result<GeneratedDrawing, GenerationError> {
    let defaults = drawing_defaults(&config.drawing);
    let spec = RailSpec::resolve(config_id, geometry, application, &defaults)?;
    debug!(
        config_id,
        rail_width = spec.rail_width,
        rail_length = spec.rail_length,
        num_blocks = spec.num_blocks,
        part_number = %spec.part_number,
        "出图参数已解析"
    );

    let drawing = build_drawing(&spec, rail_registry());

    let locator = ExportLocator::from_config(&config.export);
    let directory = locator.export_dir();
    fs::create_dir_all(directory).map_err(|source| GenerationError::CreateDirectory {
        path: directory.to_path_buf(),
        source,
    })?;

    let file_name = locator.file_name(config_id);
    let file_path = directory.join(&file_name);
    DxfFacade::new().save(&drawing.document, &file_path)?;

    Ok(GeneratedDrawing {
        spec,
        layout: drawing.layout,
        file_path,
        download_path: locator.download_path(&file_name),
    })
}

fn drawing_defaults(config: &DrawingConfig) -> DrawingDefaults {
    DrawingDefaults {
        rail_width: config.rail_width,
        rail_length: config.rail_length,
        num_blocks: config.num_blocks,
        max_blocks: config.max_blocks,
        part_prefix: config.part_prefix.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railcad_engine::ParameterError;

    #[test]
    fn configured_defaults_feed_parameter_resolution() {
        let config = DrawingConfig {
            rail_width: 35.0,
            rail_length: 1_000.0,
            num_blocks: 4,
            max_blocks: 6,
            part_prefix: "LG".to_string(),
        };
        let defaults = drawing_defaults(&config);
        let spec = RailSpec::resolve(3, &GeometryParams::default(), None, &defaults)
            .expect("resolve");
        assert_eq!(spec.rail_width, 35.0);
        assert_eq!(spec.rail_length, 1_000.0);
        assert_eq!(spec.num_blocks, 4);
        assert_eq!(spec.part_number, "LG-3");

        let application = ApplicationParams {
            num_blocks: Some(7),
            ..ApplicationParams::default()
        };
        let err = RailSpec::resolve(3, &GeometryParams::default(), Some(&application), &defaults)
            .unwrap_err();
        assert_eq!(
            err,
            ParameterError::TooManyBlocks {
                requested: 7,
                max: 6
            }
        );
    }
}
