//! ASCII DXF 写出（AutoCAD 2010 / AC1024）。
//!
//! 句柄按写出顺序分配，且不写入任何时间戳，相同文档总是得到相同字节。

use std::borrow::Cow;

use railcad_core::document::{Dimension, Document, Entity, Line, Polyline, Text};
use railcad_core::geometry::{Bounds2D, Point2};
use railcad_core::style::{BUILTIN_LINETYPES, DEFAULT_LAYER, Layer, Linetype};

use crate::IoError;

pub const DXF_VERSION: &str = "AC1024";

const STANDARD_STYLE: &str = "Standard";
const MODEL_SPACE: &str = "*Model_Space";
const PAPER_SPACE: &str = "*Paper_Space";

// 符号表与根字典使用固定句柄，其余对象自 FIRST_DYNAMIC_HANDLE 起顺序分配。
const HANDLE_BLOCK_RECORD_TABLE: u64 = 0x1;
const HANDLE_LAYER_TABLE: u64 = 0x2;
const HANDLE_STYLE_TABLE: u64 = 0x3;
const HANDLE_LTYPE_TABLE: u64 = 0x5;
const HANDLE_VIEW_TABLE: u64 = 0x6;
const HANDLE_UCS_TABLE: u64 = 0x7;
const HANDLE_VPORT_TABLE: u64 = 0x8;
const HANDLE_APPID_TABLE: u64 = 0x9;
const HANDLE_DIMSTYLE_TABLE: u64 = 0xA;
const HANDLE_ROOT_DICTIONARY: u64 = 0xC;
const HANDLE_GROUP_DICTIONARY: u64 = 0xD;
const FIRST_DYNAMIC_HANDLE: u64 = 0x20;

/// 标注箭头长度与文字高度之比。
const ARROW_RATIO: f64 = 1.0;

/// 将文档序列化为 DXF 文本。写出前校验图层与线型引用。
pub fn write_document(document: &Document) -> Result<String, IoError> {
    let problems = document.unresolved_references();
    if !problems.is_empty() {
        return Err(IoError::InvalidDocument(problems.join("; ")));
    }

    let mut writer = DxfWriter::new(document);
    writer.write_tables();
    writer.write_blocks();
    writer.write_entities();
    writer.write_objects();
    writer.pair(0, "EOF");
    Ok(writer.finish())
}

struct DxfWriter<'a> {
    document: &'a Document,
    out: String,
    next_handle: u64,
    model_space: u64,
    paper_space: u64,
    standard_style: u64,
    dimension_records: Vec<u64>,
}

impl<'a> DxfWriter<'a> {
    fn new(document: &'a Document) -> Self {
        Self {
            document,
            out: String::new(),
            next_handle: FIRST_DYNAMIC_HANDLE,
            model_space: 0,
            paper_space: 0,
            standard_style: 0,
            dimension_records: Vec::new(),
        }
    }

    /// HEADER 依赖最终的句柄种子，因此最后生成并置于文件开头。
    fn finish(self) -> String {
        let mut header = DxfWriter::new(self.document);
        header.write_header(self.next_handle);
        header.out.push_str(&self.out);
        header.out
    }

    fn allocate(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn dimensions(&self) -> impl Iterator<Item = &'a Dimension> + 'a {
        self.document
            .entities()
            .filter_map(|(_, entity)| match entity {
                Entity::Dimension(dimension) => Some(dimension),
                _ => None,
            })
    }

    // ---- 组码输出 ----

    fn pair(&mut self, code: i32, value: &str) {
        self.out.push_str(&format!("{code:>3}\n"));
        self.out.push_str(&single_line(value));
        self.out.push('\n');
    }

    fn int(&mut self, code: i32, value: i64) {
        self.pair(code, &value.to_string());
    }

    fn real(&mut self, code: i32, value: f64) {
        self.pair(code, &format_real(value));
    }

    fn handle(&mut self, code: i32, handle: u64) {
        self.pair(code, &format!("{handle:X}"));
    }

    fn point(&mut self, code: i32, point: Point2) {
        self.real(code, point.x());
        self.real(code + 10, point.y());
        self.real(code + 20, 0.0);
    }

    fn section_start(&mut self, name: &str) {
        self.pair(0, "SECTION");
        self.pair(2, name);
    }

    fn section_end(&mut self) {
        self.pair(0, "ENDSEC");
    }

    fn entity_start(&mut self, kind: &str, owner: u64, layer: &str) -> u64 {
        let handle = self.allocate();
        self.pair(0, kind);
        self.handle(5, handle);
        self.handle(330, owner);
        self.pair(100, "AcDbEntity");
        self.pair(8, layer);
        handle
    }

    // ---- HEADER ----

    fn write_header(&mut self, handle_seed: u64) {
        let (extents_min, extents_max) = match self.document.bounds() {
            Some(bounds) => (bounds.min(), bounds.max()),
            None => (Point2::new(0.0, 0.0), Point2::new(0.0, 0.0)),
        };

        self.section_start("HEADER");
        self.pair(9, "$ACADVER");
        self.pair(1, DXF_VERSION);
        self.pair(9, "$ACADMAINTVER");
        self.int(70, 6);
        self.pair(9, "$DWGCODEPAGE");
        self.pair(3, "ANSI_1252");
        self.pair(9, "$INSBASE");
        self.point(10, Point2::new(0.0, 0.0));
        self.pair(9, "$EXTMIN");
        self.point(10, extents_min);
        self.pair(9, "$EXTMAX");
        self.point(10, extents_max);
        self.pair(9, "$LIMMIN");
        self.real(10, extents_min.x());
        self.real(20, extents_min.y());
        self.pair(9, "$LIMMAX");
        self.real(10, extents_max.x());
        self.real(20, extents_max.y());
        self.pair(9, "$LTSCALE");
        self.real(40, 1.0);
        self.pair(9, "$CLAYER");
        self.pair(8, DEFAULT_LAYER);
        self.pair(9, "$CELTYPE");
        self.pair(6, "ByLayer");
        self.pair(9, "$TEXTSTYLE");
        self.pair(7, STANDARD_STYLE);
        self.pair(9, "$DIMSTYLE");
        self.pair(2, STANDARD_STYLE);
        // 公制，绘图单位为毫米
        self.pair(9, "$MEASUREMENT");
        self.int(70, 1);
        self.pair(9, "$INSUNITS");
        self.int(70, 4);
        self.pair(9, "$HANDSEED");
        self.handle(5, handle_seed);
        self.section_end();
    }

    // ---- TABLES ----

    fn write_tables(&mut self) {
        self.section_start("TABLES");
        self.write_vport_table();
        self.write_ltype_table();
        self.write_layer_table();
        self.write_style_table();
        self.write_empty_table("VIEW", HANDLE_VIEW_TABLE);
        self.write_empty_table("UCS", HANDLE_UCS_TABLE);
        self.write_appid_table();
        self.write_dimstyle_table();
        self.write_block_record_table();
        self.section_end();
    }

    fn table_start(&mut self, name: &str, handle: u64, count: usize) {
        self.pair(0, "TABLE");
        self.pair(2, name);
        self.handle(5, handle);
        self.handle(330, 0);
        self.pair(100, "AcDbSymbolTable");
        self.int(70, count as i64);
    }

    fn table_end(&mut self) {
        self.pair(0, "ENDTAB");
    }

    fn record_start(&mut self, kind: &str, owner: u64, subclass: &str, name: &str) -> u64 {
        let handle = self.allocate();
        self.pair(0, kind);
        self.handle(5, handle);
        self.handle(330, owner);
        self.pair(100, "AcDbSymbolTableRecord");
        self.pair(100, subclass);
        self.pair(2, name);
        self.int(70, 0);
        handle
    }

    fn write_empty_table(&mut self, name: &str, handle: u64) {
        self.table_start(name, handle, 0);
        self.table_end();
    }

    /// 活动视口按图纸范围居中，打开文件即显示全图。
    fn write_vport_table(&mut self) {
        let bounds = self.document.bounds().unwrap_or_else(|| {
            Bounds2D::new(Point2::new(0.0, 0.0), Point2::new(100.0, 100.0))
        });
        let center = bounds.center();
        let aspect = 1.5;
        let view_height = (bounds.height().max(bounds.width() / aspect) * 1.1).max(1.0);

        self.table_start("VPORT", HANDLE_VPORT_TABLE, 1);
        self.record_start("VPORT", HANDLE_VPORT_TABLE, "AcDbViewportTableRecord", "*Active");
        self.real(10, 0.0);
        self.real(20, 0.0);
        self.real(11, 1.0);
        self.real(21, 1.0);
        self.real(12, center.x());
        self.real(22, center.y());
        self.real(13, 0.0);
        self.real(23, 0.0);
        self.real(14, 10.0);
        self.real(24, 10.0);
        self.real(15, 10.0);
        self.real(25, 10.0);
        self.real(16, 0.0);
        self.real(26, 0.0);
        self.real(36, 1.0);
        self.real(17, 0.0);
        self.real(27, 0.0);
        self.real(37, 0.0);
        self.real(40, view_height);
        self.real(41, aspect);
        self.real(42, 50.0);
        self.real(43, 0.0);
        self.real(44, 0.0);
        self.real(50, 0.0);
        self.real(51, 0.0);
        self.int(71, 0);
        self.int(72, 100);
        self.int(73, 1);
        self.int(74, 3);
        self.int(75, 0);
        self.int(76, 0);
        self.int(77, 0);
        self.int(78, 0);
        self.table_end();
    }

    fn write_ltype_table(&mut self) {
        let document = self.document;
        let linetypes: Vec<&Linetype> = document.styles().linetypes().collect();
        self.table_start(
            "LTYPE",
            HANDLE_LTYPE_TABLE,
            BUILTIN_LINETYPES.len() + linetypes.len(),
        );
        for name in BUILTIN_LINETYPES {
            let description = if name == "Continuous" { "Solid line" } else { "" };
            self.write_ltype_entry(name, description, &[], 0.0);
        }
        for linetype in linetypes {
            self.write_ltype_entry(
                &linetype.name,
                &linetype.description,
                &linetype.pattern,
                linetype.pattern_length(),
            );
        }
        self.table_end();
    }

    fn write_ltype_entry(
        &mut self,
        name: &str,
        description: &str,
        pattern: &[f64],
        total_length: f64,
    ) {
        self.record_start("LTYPE", HANDLE_LTYPE_TABLE, "AcDbLinetypeTableRecord", name);
        self.pair(3, description);
        self.int(72, 65);
        self.int(73, pattern.len() as i64);
        self.real(40, total_length);
        for element in pattern {
            self.real(49, *element);
            self.int(74, 0);
        }
    }

    fn write_layer_table(&mut self) {
        let document = self.document;
        let layers: Vec<&Layer> = document.styles().layers().collect();
        self.table_start("LAYER", HANDLE_LAYER_TABLE, layers.len());
        for layer in layers {
            self.record_start("LAYER", HANDLE_LAYER_TABLE, "AcDbLayerTableRecord", &layer.name);
            // 关闭的图层以负颜色号表示
            let color = if layer.is_visible { layer.color } else { -layer.color };
            self.int(62, i64::from(color));
            self.pair(6, layer.linetype_name());
            self.int(370, -3);
        }
        self.table_end();
    }

    fn write_style_table(&mut self) {
        self.table_start("STYLE", HANDLE_STYLE_TABLE, 1);
        self.standard_style = self.record_start(
            "STYLE",
            HANDLE_STYLE_TABLE,
            "AcDbTextStyleTableRecord",
            STANDARD_STYLE,
        );
        self.real(40, 0.0);
        self.real(41, 1.0);
        self.real(50, 0.0);
        self.int(71, 0);
        self.real(42, 2.5);
        self.pair(3, "txt");
        self.pair(4, "");
        self.table_end();
    }

    fn write_appid_table(&mut self) {
        self.table_start("APPID", HANDLE_APPID_TABLE, 1);
        self.record_start("APPID", HANDLE_APPID_TABLE, "AcDbRegAppTableRecord", "ACAD");
        self.table_end();
    }

    fn write_dimstyle_table(&mut self) {
        self.table_start("DIMSTYLE", HANDLE_DIMSTYLE_TABLE, 1);
        self.pair(100, "AcDbDimStyleTable");
        // DIMSTYLE 记录的句柄使用组码 105
        let handle = self.allocate();
        self.pair(0, "DIMSTYLE");
        self.handle(105, handle);
        self.handle(330, HANDLE_DIMSTYLE_TABLE);
        self.pair(100, "AcDbSymbolTableRecord");
        self.pair(100, "AcDbDimStyleTableRecord");
        self.pair(2, STANDARD_STYLE);
        self.int(70, 0);
        self.real(40, 1.0);
        self.real(41, 2.5);
        self.real(42, 0.625);
        self.real(44, 1.25);
        self.real(140, 2.5);
        self.real(147, 0.625);
        self.handle(340, self.standard_style);
        self.table_end();
    }

    fn write_block_record_table(&mut self) {
        let dimension_count = self.dimensions().count();
        self.table_start("BLOCK_RECORD", HANDLE_BLOCK_RECORD_TABLE, 2 + dimension_count);
        self.model_space = self.write_block_record_entry(MODEL_SPACE);
        self.paper_space = self.write_block_record_entry(PAPER_SPACE);
        for index in 0..dimension_count {
            let handle = self.write_block_record_entry(&dimension_block_name(index));
            self.dimension_records.push(handle);
        }
        self.table_end();
    }

    fn write_block_record_entry(&mut self, name: &str) -> u64 {
        let handle = self.allocate();
        self.pair(0, "BLOCK_RECORD");
        self.handle(5, handle);
        self.handle(330, HANDLE_BLOCK_RECORD_TABLE);
        self.pair(100, "AcDbSymbolTableRecord");
        self.pair(100, "AcDbBlockTableRecord");
        self.pair(2, name);
        self.int(70, 0);
        self.int(280, 1);
        self.int(281, 0);
        handle
    }

    // ---- BLOCKS ----

    fn write_blocks(&mut self) {
        self.section_start("BLOCKS");
        let (model_space, paper_space) = (self.model_space, self.paper_space);
        self.block_start(MODEL_SPACE, model_space, 0);
        self.block_end(model_space);
        self.block_start(PAPER_SPACE, paper_space, 0);
        self.block_end(paper_space);

        let dimensions: Vec<&Dimension> = self.dimensions().collect();
        let records = self.dimension_records.clone();
        for (index, (dimension, record)) in dimensions.into_iter().zip(records).enumerate() {
            // 匿名块标志 1
            self.block_start(&dimension_block_name(index), record, 1);
            self.write_dimension_geometry(dimension, record);
            self.block_end(record);
        }
        self.section_end();
    }

    fn block_start(&mut self, name: &str, record: u64, flags: i64) {
        self.entity_start("BLOCK", record, DEFAULT_LAYER);
        self.pair(100, "AcDbBlockBegin");
        self.pair(2, name);
        self.int(70, flags);
        self.point(10, Point2::new(0.0, 0.0));
        self.pair(3, name);
        self.pair(1, "");
    }

    fn block_end(&mut self, record: u64) {
        self.entity_start("ENDBLK", record, DEFAULT_LAYER);
        self.pair(100, "AcDbBlockEnd");
    }

    /// 展开标注的图形：尺寸线、两条延伸线、两个实心箭头与测量值文字。
    /// 块内图元位于 0 层，随标注实体所在图层显示。
    fn write_dimension_geometry(&mut self, dimension: &Dimension, record: u64) {
        let layout = dimension.layout();
        for (start, end) in [
            (layout.line_start, layout.line_end),
            layout.first_extension,
            layout.second_extension,
        ] {
            self.entity_start("LINE", record, DEFAULT_LAYER);
            self.pair(100, "AcDbLine");
            self.point(10, start);
            self.point(11, end);
        }

        let arrow = dimension.text_height * ARROW_RATIO;
        if let Some(along) = layout.line_start.vector_to(layout.line_end).normalize() {
            let side = along.perp().scale(arrow / 6.0);
            for (tip, inward) in [
                (layout.line_start, along),
                (layout.line_end, along.scale(-1.0)),
            ] {
                let back = tip.translate(inward.scale(arrow));
                self.entity_start("SOLID", record, DEFAULT_LAYER);
                self.pair(100, "AcDbTrace");
                self.point(10, tip);
                self.point(11, back.translate(side));
                self.point(12, back.translate(side.scale(-1.0)));
                self.point(13, back.translate(side.scale(-1.0)));
            }
        }

        let direction = dimension.direction();
        self.entity_start("MTEXT", record, DEFAULT_LAYER);
        self.pair(100, "AcDbMText");
        self.point(10, layout.text_point);
        self.real(40, dimension.text_height);
        self.int(71, 5);
        self.int(72, 1);
        self.pair(1, &format_measurement(layout.measurement));
        self.pair(7, STANDARD_STYLE);
        self.real(11, direction.x());
        self.real(21, direction.y());
        self.real(31, 0.0);
    }

    // ---- ENTITIES ----

    fn write_entities(&mut self) {
        self.section_start("ENTITIES");
        let document = self.document;
        let mut dimension_index = 0;
        for (_, entity) in document.entities() {
            match entity {
                Entity::Polyline(polyline) => self.write_lwpolyline(polyline),
                Entity::Line(line) => self.write_line(line),
                Entity::Text(text) => self.write_text(text),
                Entity::Dimension(dimension) => {
                    self.write_dimension(dimension, dimension_index);
                    dimension_index += 1;
                }
            }
        }
        self.section_end();
    }

    fn write_lwpolyline(&mut self, polyline: &Polyline) {
        self.entity_start("LWPOLYLINE", self.model_space, &polyline.layer);
        self.pair(100, "AcDbPolyline");
        self.int(90, polyline.vertices.len() as i64);
        self.int(70, if polyline.is_closed { 1 } else { 0 });
        self.real(43, 0.0);
        for vertex in &polyline.vertices {
            self.real(10, vertex.x());
            self.real(20, vertex.y());
        }
    }

    fn write_line(&mut self, line: &Line) {
        self.entity_start("LINE", self.model_space, &line.layer);
        if let Some(linetype) = &line.linetype {
            self.pair(6, linetype);
        }
        self.pair(100, "AcDbLine");
        self.point(10, line.start);
        self.point(11, line.end);
    }

    fn write_text(&mut self, text: &Text) {
        self.entity_start("TEXT", self.model_space, &text.layer);
        self.pair(100, "AcDbText");
        self.point(10, text.insert);
        self.real(40, text.height);
        self.pair(1, &text.content);
        if text.rotation != 0.0 {
            self.real(50, text.rotation.to_degrees());
        }
        self.pair(7, STANDARD_STYLE);
        self.pair(100, "AcDbText");
    }

    fn write_dimension(&mut self, dimension: &Dimension, index: usize) {
        let layout = dimension.layout();
        self.entity_start("DIMENSION", self.model_space, &dimension.layer);
        self.pair(100, "AcDbDimension");
        self.int(280, 0);
        self.pair(2, &dimension_block_name(index));
        // 定义点取标注的基点：它位于尺寸线上，读回时可原样恢复
        self.point(10, dimension.base);
        self.point(11, layout.text_point);
        // 线性标注（0）且图块仅供本标注引用（32）
        self.int(70, 32);
        self.int(71, 5);
        self.real(42, layout.measurement);
        self.pair(3, STANDARD_STYLE);
        self.pair(100, "AcDbAlignedDimension");
        self.point(13, dimension.first_point);
        self.point(14, dimension.second_point);
        self.real(50, dimension.angle_degrees);
        self.pair(100, "AcDbRotatedDimension");
        // DIMTXT 覆盖，记录于 ACAD 扩展数据
        self.pair(1001, "ACAD");
        self.pair(1000, "DSTYLE");
        self.pair(1002, "{");
        self.int(1070, 140);
        self.real(1040, dimension.text_height);
        self.pair(1002, "}");
    }

    // ---- OBJECTS ----

    fn write_objects(&mut self) {
        self.section_start("OBJECTS");
        self.pair(0, "DICTIONARY");
        self.handle(5, HANDLE_ROOT_DICTIONARY);
        self.handle(330, 0);
        self.pair(100, "AcDbDictionary");
        self.int(281, 1);
        self.pair(3, "ACAD_GROUP");
        self.handle(350, HANDLE_GROUP_DICTIONARY);
        self.pair(0, "DICTIONARY");
        self.handle(5, HANDLE_GROUP_DICTIONARY);
        self.handle(330, HANDLE_ROOT_DICTIONARY);
        self.pair(100, "AcDbDictionary");
        self.int(281, 1);
        self.section_end();
    }
}

/// 组码值只能占一行，换行符（含 CRLF）替换为空格。
fn single_line(value: &str) -> Cow<'_, str> {
    if value.contains(['\r', '\n']) {
        Cow::Owned(value.replace("\r\n", " ").replace(['\r', '\n'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

fn dimension_block_name(index: usize) -> String {
    format!("*D{}", index + 1)
}

/// 浮点数输出：整数值保留一位小数，消除 `-0`，不使用科学计数法。
fn format_real(value: f64) -> String {
    let value = if value == 0.0 { 0.0 } else { value };
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// 标注文字：保留至多四位小数并去除末尾的 0。
fn format_measurement(value: f64) -> String {
    let fixed = format!("{value:.4}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railcad_core::style::StyleRegistry;

    #[test]
    fn reals_are_formatted_without_negative_zero() {
        assert_eq!(format_real(140.0), "140.0");
        assert_eq!(format_real(-0.0), "0.0");
        assert_eq!(format_real(-2.5), "-2.5");
        assert_eq!(format_real(0.1), "0.1");
    }

    #[test]
    fn measurements_drop_trailing_zeros() {
        assert_eq!(format_measurement(500.0), "500");
        assert_eq!(format_measurement(12.5), "12.5");
        assert_eq!(format_measurement(1.0 / 3.0), "0.3333");
        assert_eq!(format_measurement(0.0), "0");
    }

    #[test]
    fn line_breaks_in_values_are_flattened() {
        assert_eq!(single_line("SKF-20"), "SKF-20");
        assert_eq!(single_line("LLT\nHR20"), "LLT HR20");
        assert_eq!(single_line("A\r\nB\rC"), "A B C");

        let document = Document::new(StyleRegistry::new());
        let mut writer = DxfWriter::new(&document);
        writer.pair(1, "Part: LLT\nHR20");
        assert_eq!(writer.out, "  1\nPart: LLT HR20\n");
    }

    #[test]
    fn group_codes_are_right_aligned() {
        let document = Document::new(StyleRegistry::new());
        let mut writer = DxfWriter::new(&document);
        writer.pair(0, "SECTION");
        writer.pair(100, "AcDbEntity");
        writer.pair(1001, "ACAD");
        assert_eq!(writer.out, "  0\nSECTION\n100\nAcDbEntity\n1001\nACAD\n");
    }

    #[test]
    fn unresolved_layer_is_rejected_before_writing() {
        let mut document = Document::new(StyleRegistry::new());
        document.add_text(Point2::new(0.0, 0.0), "orphan", 2.5, 0.0, "NOWHERE");
        let err = write_document(&document).unwrap_err();
        match err {
            IoError::InvalidDocument(message) => assert!(message.contains("NOWHERE")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn handle_seed_exceeds_every_written_handle() {
        let mut document = Document::new(StyleRegistry::new());
        document.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), None, "0");
        document.add_dimension(
            Point2::new(5.0, -5.0),
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            0.0,
            1.0,
            "0",
        );
        let output = write_document(&document).expect("write");
        let lines: Vec<&str> = output.lines().collect();
        let seed_index = lines
            .iter()
            .position(|line| *line == "$HANDSEED")
            .expect("handle seed");
        let seed = u64::from_str_radix(lines[seed_index + 2], 16).expect("hex seed");
        let max_handle = lines
            .chunks(2)
            .filter(|pair| matches!(pair[0].trim(), "5" | "105"))
            .filter(|pair| pair.len() == 2)
            .filter_map(|pair| u64::from_str_radix(pair[1], 16).ok())
            .max()
            .expect("handles written");
        assert!(seed > max_handle);
    }
}
