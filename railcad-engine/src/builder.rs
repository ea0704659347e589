use railcad_core::document::Document;
use railcad_core::geometry::Point2;
use railcad_core::style::StyleRegistry;
use tracing::{debug, warn};

use crate::layers::{CENTER_LINETYPE, LAYER_BLOCKS, LAYER_CENTERLINES, LAYER_DIMENSIONS, LAYER_RAIL};
use crate::layout::{BlockLayout, layout_blocks};
use crate::params::RailSpec;

/// 中心线两端超出导轨的比例（制图惯例）。
pub const CENTERLINE_OVERHANG: f64 = 0.1;
/// 尺寸线距导轨边缘的偏移，按导轨宽度比例。
pub const DIMENSION_OFFSET_RATIO: f64 = 0.8;
pub const DIMENSION_TEXT_RATIO: f64 = 0.15;
pub const PART_TEXT_RATIO: f64 = 0.3;
pub const SUMMARY_TEXT_RATIO: f64 = 0.2;

/// 出图结果：文档及其使用的滑块布局。
#[derive(Debug)]
pub struct RailDrawing {
    pub document: Document,
    pub layout: BlockLayout,
}

/// 由规格生成全部图元，顺序固定为：导轨、滑块、中心线、尺寸标注、标题文字。
pub fn build_drawing(spec: &RailSpec, styles: StyleRegistry) -> RailDrawing {
    let width = spec.rail_width;
    let length = spec.rail_length;
    let mut document = Document::new(styles);

    document.add_polyline(
        closed_rectangle(Point2::new(0.0, -width / 2.0), length, width),
        false,
        LAYER_RAIL,
    );

    let layout = layout_blocks(length, width, spec.num_blocks);
    if layout.is_degenerate() {
        warn!(
            config_id = spec.config_id,
            spacing = layout.spacing,
            num_blocks = spec.num_blocks,
            "滑块总长超过导轨长度，间距为负"
        );
    }
    for block in &layout.blocks {
        document.add_polyline(
            closed_rectangle(block.position, block.size.length, block.size.width),
            false,
            LAYER_BLOCKS,
        );
    }

    document.add_line(
        Point2::new(-length * CENTERLINE_OVERHANG, 0.0),
        Point2::new(length * (1.0 + CENTERLINE_OVERHANG), 0.0),
        Some(CENTER_LINETYPE.to_string()),
        LAYER_CENTERLINES,
    );

    add_dimensions(&mut document, length, width);

    document.add_text(
        Point2::new(0.0, -width * 2.0),
        format!("Part: {}", spec.part_number),
        width * PART_TEXT_RATIO,
        0.0,
        LAYER_DIMENSIONS,
    );
    document.add_text(
        Point2::new(0.0, -width * 2.5),
        summary_line(spec),
        width * SUMMARY_TEXT_RATIO,
        0.0,
        LAYER_DIMENSIONS,
    );

    debug!(
        config_id = spec.config_id,
        entity_count = document.entities().count(),
        "导轨图元构建完成"
    );
    RailDrawing { document, layout }
}

/// 以左下角和尺寸构造矩形轮廓，首尾重合共 5 个顶点。
pub fn closed_rectangle(origin: Point2, length: f64, width: f64) -> [Point2; 5] {
    let (x, y) = (origin.x(), origin.y());
    [
        Point2::new(x, y),
        Point2::new(x + length, y),
        Point2::new(x + length, y + width),
        Point2::new(x, y + width),
        Point2::new(x, y),
    ]
}

/// 标题栏第二行，例如 `L=500.0mm  W=20.0mm  Blocks=2`。
pub fn summary_line(spec: &RailSpec) -> String {
    format!(
        "L={}mm  W={}mm  Blocks={}",
        format_length(spec.rail_length),
        format_length(spec.rail_width),
        spec.num_blocks
    )
}

/// 整数值保留一位小数（`500.0`），其余按最短精确表示输出。
/// 科学计数法的指数带符号且至少两位，如 `1e+16`、`2.5e-05`。
fn format_length(value: f64) -> String {
    let text = format!("{value:?}");
    let Some((mantissa, exponent)) = text.split_once('e') else {
        return text;
    };
    match exponent.parse::<i32>() {
        Ok(exp) => {
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.unsigned_abs())
        }
        Err(_) => text,
    }
}

fn add_dimensions(document: &mut Document, length: f64, width: f64) {
    let offset = width * DIMENSION_OFFSET_RATIO;
    let text_height = width * DIMENSION_TEXT_RATIO;
    let lower_edge = -width / 2.0;

    // 导轨长度，标在下方
    document.add_dimension(
        Point2::new(length / 2.0, lower_edge - offset),
        Point2::new(0.0, lower_edge),
        Point2::new(length, lower_edge),
        0.0,
        text_height,
        LAYER_DIMENSIONS,
    );

    // 导轨宽度，标在左侧
    document.add_dimension(
        Point2::new(-offset, 0.0),
        Point2::new(0.0, lower_edge),
        Point2::new(0.0, width / 2.0),
        90.0,
        text_height,
        LAYER_DIMENSIONS,
    );
}
