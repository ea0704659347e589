use std::fs;
use std::path::Path;

use railcad_config::AppConfig;
use railcad_core::document::Entity;
use railcad_engine::{ApplicationParams, GeometryParams, ParameterError};
use railcad_export::{GenerationError, export_drawing, generate_with};
use railcad_io::{DocumentLoader, DxfFacade};
use tempfile::TempDir;

fn config_in(root: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.export.root = Some(root.to_path_buf());
    config
}

fn geometry(width: f64, length: f64) -> GeometryParams {
    GeometryParams {
        rail_width: Some(width),
        rail_length: Some(length),
    }
}

fn application(blocks: i64, part_number: &str) -> ApplicationParams {
    ApplicationParams {
        num_blocks: Some(blocks),
        part_number: Some(part_number.to_string()),
        surface_treatment: None,
    }
}

#[test]
fn generate_returns_download_path_and_writes_file() {
    let root = TempDir::new().expect("临时目录");
    let config = config_in(root.path());

    let download = generate_with(
        &config,
        1,
        &geometry(20.0, 500.0),
        Some(&application(2, "SKF-LLTHR20")),
    )
    .expect("生成失败");

    assert_eq!(download, "/downloads/skf_config_1.dxf");
    let written = root.path().join("exports").join("skf_config_1.dxf");
    assert!(written.is_file());

    let document = DxfFacade::new().load(&written).expect("读回 DXF");
    let contents: Vec<&str> = document
        .entities()
        .filter_map(|(_, entity)| match entity {
            Entity::Text(text) => Some(text.content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        contents,
        vec!["Part: SKF-LLTHR20", "L=500.0mm  W=20.0mm  Blocks=2"]
    );
}

#[test]
fn identical_input_produces_identical_bytes() {
    let root = TempDir::new().expect("临时目录");
    let config = config_in(root.path());
    let path = root.path().join("exports").join("skf_config_8.dxf");

    generate_with(&config, 8, &geometry(25.0, 900.0), None).expect("第一次生成");
    let first = fs::read(&path).expect("读取");
    generate_with(&config, 8, &geometry(25.0, 900.0), None).expect("第二次生成");
    let second = fs::read(&path).expect("读取");
    assert_eq!(first, second);
}

#[test]
fn file_name_depends_only_on_config_id() {
    let root = TempDir::new().expect("临时目录");
    let config = config_in(root.path());

    let a = generate_with(&config, 77, &geometry(15.0, 300.0), None).expect("生成");
    let b = generate_with(
        &config,
        77,
        &geometry(40.0, 2_000.0),
        Some(&application(6, "OTHER")),
    )
    .expect("生成");
    assert_eq!(a, b);
    let entries: Vec<_> = fs::read_dir(root.path().join("exports"))
        .expect("列目录")
        .filter_map(Result::ok)
        .map(|entry| entry.file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("skf_config_77.dxf")]);
}

#[test]
fn zero_blocks_draw_no_block_outlines() {
    let root = TempDir::new().expect("临时目录");
    let config = config_in(root.path());

    let drawing = export_drawing(
        &config,
        5,
        &geometry(20.0, 500.0),
        Some(&application(0, "")),
    )
    .expect("生成");
    assert!(drawing.layout.is_empty());
    assert_eq!(drawing.spec.part_number, "SKF-5");

    let document = DxfFacade::new()
        .load(&drawing.file_path)
        .expect("读回 DXF");
    let block_outlines = document
        .entities()
        .filter(|(_, entity)| entity.layer_name() == "BLOCKS")
        .count();
    assert_eq!(block_outlines, 0);
}

#[test]
fn overfull_rail_is_still_written() {
    let root = TempDir::new().expect("临时目录");
    let config = config_in(root.path());

    let drawing = export_drawing(&config, 6, &geometry(20.0, 100.0), Some(&application(5, "X")))
        .expect("负间距仍应生成");
    assert!(drawing.layout.is_degenerate());
    let spacing = drawing.layout.spacing.expect("spacing");
    assert!((spacing + 100.0 / 6.0).abs() < 1e-9);
    assert!(drawing.file_path.is_file());
}

#[test]
fn invalid_width_fails_without_writing() {
    let root = TempDir::new().expect("临时目录");
    let config = config_in(root.path());

    let err = generate_with(&config, 9, &geometry(-1.0, 500.0), None).unwrap_err();
    assert!(matches!(
        err,
        GenerationError::Parameter(ParameterError::InvalidRailWidth(_))
    ));
    assert!(!root.path().join("exports").exists());
}

#[test]
fn export_directory_blocked_by_file_is_reported() {
    let root = TempDir::new().expect("临时目录");
    fs::write(root.path().join("exports"), "not a directory").expect("占位文件");
    let config = config_in(root.path());

    let err = generate_with(&config, 10, &geometry(20.0, 500.0), None).unwrap_err();
    match err {
        GenerationError::CreateDirectory { path, .. } => {
            assert_eq!(path, root.path().join("exports"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn json_parameters_are_accepted_leniently() {
    let root = TempDir::new().expect("临时目录");
    let config = config_in(root.path());
    let geometry: GeometryParams =
        serde_json::from_str(r#"{"W": "30", "LS": 600}"#).expect("geometry");
    let application: ApplicationParams =
        serde_json::from_str(r#"{"NOB": "3", "PN": null, "ST": "black oxide"}"#)
            .expect("application");

    let drawing = export_drawing(&config, 12, &geometry, Some(&application)).expect("生成");
    assert_eq!(drawing.spec.rail_width, 30.0);
    assert_eq!(drawing.spec.num_blocks, 3);
    assert_eq!(drawing.spec.part_number, "SKF-12");
    assert_eq!(drawing.spec.surface_treatment.as_deref(), Some("black oxide"));
}

#[test]
fn oversized_block_count_fails_without_writing() {
    let root = TempDir::new().expect("临时目录");
    let config = config_in(root.path());
    let application: ApplicationParams =
        serde_json::from_str(r#"{"NOB": 1e13}"#).expect("application");

    let err = export_drawing(&config, 13, &geometry(20.0, 500.0), Some(&application)).unwrap_err();
    assert!(matches!(
        err,
        GenerationError::Parameter(ParameterError::TooManyBlocks {
            requested: 10_000_000_000_000,
            max: 1000
        })
    ));
    assert!(!root.path().join("exports").exists());
}

#[test]
fn multi_line_part_number_loads_back_as_single_line() {
    let root = TempDir::new().expect("临时目录");
    let config = config_in(root.path());

    let drawing = export_drawing(
        &config,
        14,
        &geometry(20.0, 500.0),
        Some(&application(2, "LLT\nHR20")),
    )
    .expect("生成");
    let document = DxfFacade::new()
        .load(&drawing.file_path)
        .expect("文件应可读回");
    let texts: Vec<String> = document
        .entities()
        .filter_map(|(_, entity)| match entity {
            Entity::Text(text) => Some(text.content.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(texts[0], "Part: LLT HR20");
    assert_eq!(texts[1], "L=500.0mm  W=20.0mm  Blocks=2");
}
