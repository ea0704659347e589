//! ASCII DXF 读取。仅识别导轨图纸用到的表与实体，其余段整体跳过。

use railcad_core::document::{Dimension, Document, Entity, Line, Polyline, Text};
use railcad_core::geometry::Point2;
use railcad_core::style::{BUILTIN_LINETYPES, CONTINUOUS, DEFAULT_LAYER, Layer, Linetype, StyleRegistry};

use crate::IoError;

/// 标注未携带 DIMTXT 覆盖时使用的文字高度（DXF 默认值）。
const DEFAULT_DIMENSION_TEXT_HEIGHT: f64 = 2.5;
const DIMTXT_GROUP: i32 = 140;

pub(crate) fn parse_document(source: &str) -> Result<Document, IoError> {
    DxfParser::new(source).parse().map_err(|err| match err {
        DxfError::Unsupported { feature } => IoError::UnsupportedFeature(feature),
        DxfError::Invalid { message } => IoError::InvalidDocument(message),
    })
}

#[derive(Debug)]
enum DxfError {
    Unsupported { feature: String },
    Invalid { message: String },
}

impl DxfError {
    fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

struct DxfParser<'a> {
    reader: DxfReader<'a>,
    styles: StyleRegistry,
    entities: Vec<Entity>,
}

impl<'a> DxfParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: DxfReader::new(source),
            styles: StyleRegistry::new(),
            entities: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<Document, DxfError> {
        while let Some((code, value)) = self.reader.next_pair()? {
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match value.as_str() {
                "SECTION" => {
                    let (name_code, name) = self
                        .reader
                        .next_pair()?
                        .ok_or_else(|| DxfError::invalid("SECTION 缺少名称（组码 2）"))?;
                    if name_code != 2 {
                        return Err(DxfError::invalid(format!(
                            "SECTION 名称使用了组码 {name_code}（期望 2）"
                        )));
                    }
                    match name.as_str() {
                        "TABLES" => self.parse_tables()?,
                        "ENTITIES" => self.parse_entities()?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(DxfError::invalid(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }

        let mut document = Document::new(self.styles);
        for entity in self.entities {
            document.add_entity(entity);
        }
        Ok(document)
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value == "ENDSEC" => break,
                Some(_) => continue,
                None => {
                    return Err(DxfError::invalid("SECTION 未找到 ENDSEC 终止标记"));
                }
            }
        }
        Ok(())
    }

    fn skip_entity_body(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }

    // ---- TABLES ----

    fn parse_tables(&mut self) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("TABLES 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "TABLES 段遇到组码 {code}（期望 0 表示表或记录起始）"
                )));
            }
            match value.as_str() {
                "ENDSEC" => break,
                "LAYER" => {
                    let layer = self.parse_layer()?;
                    self.styles.add_layer(layer);
                }
                "LTYPE" => {
                    if let Some(linetype) = self.parse_ltype()? {
                        self.styles.register_linetype(linetype);
                    }
                }
                // TABLE / ENDTAB 以及其余符号表记录
                _ => self.skip_entity_body()?,
            }
        }
        Ok(())
    }

    fn parse_layer(&mut self) -> Result<Layer, DxfError> {
        let mut name = None;
        let mut color: i16 = 7;
        let mut linetype = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    2 => name = Some(value.trim().to_string()),
                    62 => color = parse_i16(&value, "LAYER 颜色")?,
                    6 => linetype = Some(value.trim().to_string()),
                    _ => {}
                },
                None => return Err(DxfError::invalid("LAYER 记录未正确结束")),
            }
        }

        let name = name.ok_or_else(|| DxfError::invalid("LAYER 缺少名称（组码 2）"))?;
        let mut layer = Layer::new(name, color.saturating_abs());
        // 负颜色号表示图层关闭
        layer.is_visible = color >= 0;
        if let Some(linetype) = linetype.filter(|lt| !lt.eq_ignore_ascii_case(CONTINUOUS)) {
            layer = layer.with_linetype(linetype);
        }
        Ok(layer)
    }

    /// 内置线型返回 `None`。
    fn parse_ltype(&mut self) -> Result<Option<Linetype>, DxfError> {
        let mut name = None;
        let mut description = String::new();
        let mut pattern = Vec::new();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    2 => name = Some(value.trim().to_string()),
                    3 => description = value,
                    49 => pattern.push(parse_f64(&value, "LTYPE 线段长度")?),
                    _ => {}
                },
                None => return Err(DxfError::invalid("LTYPE 记录未正确结束")),
            }
        }

        let name = name.ok_or_else(|| DxfError::invalid("LTYPE 缺少名称（组码 2）"))?;
        if BUILTIN_LINETYPES
            .iter()
            .any(|builtin| builtin.eq_ignore_ascii_case(&name))
        {
            return Ok(None);
        }
        Ok(Some(Linetype::new(name, description, pattern)))
    }

    // ---- ENTITIES ----

    fn parse_entities(&mut self) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("ENTITIES 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "ENTITIES 段遇到组码 {code}（期望 0 表示实体起始）"
                )));
            }

            let entity = match value.as_str() {
                "ENDSEC" => break,
                "LWPOLYLINE" => self.parse_lwpolyline()?,
                "LINE" => self.parse_line()?,
                "TEXT" => self.parse_text()?,
                "DIMENSION" => self.parse_dimension()?,
                other => {
                    return Err(DxfError::unsupported(format!("暂不支持的实体类型 {other}")));
                }
            };
            self.entities.push(entity);
        }
        Ok(())
    }

    fn parse_lwpolyline(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut flags = 0;
        let mut expected = None;
        let mut vertices = Vec::new();
        let mut pending_x: Option<f64> = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    70 => flags = parse_i32(&value, "LWPOLYLINE 标志")?,
                    90 => expected = Some(parse_i32(&value, "LWPOLYLINE 顶点数")?),
                    10 => assign_coord(&mut pending_x, &value, "LWPOLYLINE 顶点 X")?,
                    20 => {
                        let x = pending_x
                            .take()
                            .ok_or_else(|| DxfError::invalid("LWPOLYLINE 顶点缺少 X（组码 10）"))?;
                        let y = parse_f64(&value, "LWPOLYLINE 顶点 Y")?;
                        vertices.push(Point2::new(x, y));
                    }
                    _ => {}
                },
                None => return Err(DxfError::invalid("LWPOLYLINE 未正确结束")),
            }
        }

        if pending_x.is_some() {
            return Err(DxfError::invalid("LWPOLYLINE 顶点缺少 Y（组码 20）"));
        }
        if let Some(expected) = expected {
            if usize::try_from(expected).ok() != Some(vertices.len()) {
                return Err(DxfError::invalid(format!(
                    "LWPOLYLINE 声明 {expected} 个顶点，实际读取 {} 个",
                    vertices.len()
                )));
            }
        }

        Ok(Entity::Polyline(Polyline {
            vertices,
            is_closed: flags & 1 != 0,
            layer: layer.unwrap_or_else(|| DEFAULT_LAYER.to_string()),
        }))
    }

    fn parse_line(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut linetype = None;
        let (mut start_x, mut start_y) = (None, None);
        let (mut end_x, mut end_y) = (None, None);
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    6 => linetype = Some(value.trim().to_string()),
                    10 => assign_coord(&mut start_x, &value, "LINE 起点 X")?,
                    20 => assign_coord(&mut start_y, &value, "LINE 起点 Y")?,
                    11 => assign_coord(&mut end_x, &value, "LINE 终点 X")?,
                    21 => assign_coord(&mut end_y, &value, "LINE 终点 Y")?,
                    _ => {}
                },
                None => return Err(DxfError::invalid("LINE 未正确结束")),
            }
        }

        Ok(Entity::Line(Line {
            start: required_point(start_x, start_y, "LINE 起点（组码 10/20）")?,
            end: required_point(end_x, end_y, "LINE 终点（组码 11/21）")?,
            linetype,
            layer: layer.unwrap_or_else(|| DEFAULT_LAYER.to_string()),
        }))
    }

    fn parse_text(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let (mut insert_x, mut insert_y) = (None, None);
        let mut height = None;
        let mut content = None;
        let mut rotation = 0.0;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut insert_x, &value, "TEXT 插入点 X")?,
                    20 => assign_coord(&mut insert_y, &value, "TEXT 插入点 Y")?,
                    40 => assign_coord(&mut height, &value, "TEXT 字高")?,
                    1 => content = Some(value),
                    50 => rotation = parse_f64(&value, "TEXT 旋转角")?.to_radians(),
                    _ => {}
                },
                None => return Err(DxfError::invalid("TEXT 未正确结束")),
            }
        }

        Ok(Entity::Text(Text {
            insert: required_point(insert_x, insert_y, "TEXT 插入点（组码 10/20）")?,
            content: content.unwrap_or_default(),
            height: height.ok_or_else(|| DxfError::invalid("TEXT 缺少字高（组码 40）"))?,
            rotation,
            layer: layer.unwrap_or_else(|| DEFAULT_LAYER.to_string()),
        }))
    }

    /// 读取线性标注。尺寸线位置取组码 10 的定义点，文字高度取 ACAD
    /// 扩展数据中的 DIMTXT 覆盖。
    fn parse_dimension(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let (mut base_x, mut base_y) = (None, None);
        let (mut first_x, mut first_y) = (None, None);
        let (mut second_x, mut second_y) = (None, None);
        let mut angle = 0.0;
        let mut text_height = None;
        let mut awaiting_dimtxt = false;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut base_x, &value, "DIMENSION 定义点 X")?,
                    20 => assign_coord(&mut base_y, &value, "DIMENSION 定义点 Y")?,
                    13 => assign_coord(&mut first_x, &value, "DIMENSION 第一点 X")?,
                    23 => assign_coord(&mut first_y, &value, "DIMENSION 第一点 Y")?,
                    14 => assign_coord(&mut second_x, &value, "DIMENSION 第二点 X")?,
                    24 => assign_coord(&mut second_y, &value, "DIMENSION 第二点 Y")?,
                    50 => angle = parse_f64(&value, "DIMENSION 角度")?,
                    1070 => {
                        awaiting_dimtxt =
                            parse_i32(&value, "DIMENSION 样式覆盖组码")? == DIMTXT_GROUP;
                    }
                    1040 if awaiting_dimtxt => {
                        text_height = Some(parse_f64(&value, "DIMENSION 文字高度")?);
                        awaiting_dimtxt = false;
                    }
                    _ => {}
                },
                None => return Err(DxfError::invalid("DIMENSION 未正确结束")),
            }
        }

        Ok(Entity::Dimension(Dimension {
            base: required_point(base_x, base_y, "DIMENSION 定义点（组码 10/20）")?,
            first_point: required_point(first_x, first_y, "DIMENSION 第一点（组码 13/23）")?,
            second_point: required_point(second_x, second_y, "DIMENSION 第二点（组码 14/24）")?,
            angle_degrees: angle,
            text_height: text_height.unwrap_or(DEFAULT_DIMENSION_TEXT_HEIGHT),
            layer: layer.unwrap_or_else(|| DEFAULT_LAYER.to_string()),
        }))
    }
}

struct DxfReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<(i32, String)>,
    line_number: usize,
}

impl<'a> DxfReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            buffer: None,
            line_number: 0,
        }
    }

    fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }

        let code_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => return Ok(None),
        };

        let value_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => {
                return Err(DxfError::invalid(format!(
                    "文件在第 {} 行结束，缺少与组码对应的值行",
                    self.line_number
                )));
            }
        };

        let code = code_line.trim().parse::<i32>().map_err(|_| {
            DxfError::invalid(format!(
                "第 {} 行的组码 \"{}\" 无法解析为整数",
                self.line_number - 1,
                code_line.trim()
            ))
        })?;
        let value = value_line.trim_end_matches('\r').to_string();
        Ok(Some((code, value)))
    }

    /// 回退一个组码对；缓冲区只容纳一个。
    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.buffer.is_none(), "DXF pair 被重复回退");
        self.buffer = Some(pair);
    }
}

fn assign_coord(slot: &mut Option<f64>, raw: &str, context: &str) -> Result<(), DxfError> {
    if slot.is_some() {
        return Err(DxfError::invalid(format!("{context} 出现重复值")));
    }
    *slot = Some(parse_f64(raw, context)?);
    Ok(())
}

fn required_point(x: Option<f64>, y: Option<f64>, context: &str) -> Result<Point2, DxfError> {
    match (x, y) {
        (Some(x), Some(y)) => Ok(Point2::new(x, y)),
        _ => Err(DxfError::invalid(format!("缺少{context}"))),
    }
}

fn parse_f64(raw: &str, context: &str) -> Result<f64, DxfError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i32(raw: &str, context: &str) -> Result<i32, DxfError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i16(raw: &str, context: &str) -> Result<i16, DxfError> {
    let value = parse_i32(raw, context)?;
    i16::try_from(value)
        .map_err(|_| DxfError::invalid(format!("{context} 超出 i16 范围（值：{value}）")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dxf(pairs: &[(i32, &str)]) -> String {
        pairs
            .iter()
            .map(|(code, value)| format!("{code:>3}\n{value}\n"))
            .collect()
    }

    #[test]
    fn hidden_layer_and_custom_linetype_are_read_from_tables() {
        let source = dxf(&[
            (0, "SECTION"),
            (2, "TABLES"),
            (0, "TABLE"),
            (2, "LTYPE"),
            (70, "2"),
            (0, "LTYPE"),
            (2, "Continuous"),
            (0, "LTYPE"),
            (2, "DASHED"),
            (3, "Dashed"),
            (49, "0.5"),
            (49, "-0.25"),
            (0, "ENDTAB"),
            (0, "TABLE"),
            (2, "LAYER"),
            (0, "LAYER"),
            (2, "HIDDEN_ONE"),
            (62, "-3"),
            (6, "DASHED"),
            (0, "ENDTAB"),
            (0, "ENDSEC"),
            (0, "EOF"),
        ]);
        let document = parse_document(&source).expect("parse");
        let styles = document.styles();
        let layer = styles.layer("HIDDEN_ONE").expect("layer");
        assert_eq!(layer.color, 3);
        assert!(!layer.is_visible);
        assert_eq!(layer.linetype_name(), "DASHED");
        let linetypes: Vec<_> = styles.linetypes().collect();
        assert_eq!(linetypes.len(), 1);
        assert_eq!(linetypes[0].pattern, vec![0.5, -0.25]);
    }

    #[test]
    fn dimension_text_height_comes_from_dstyle_override() {
        let source = dxf(&[
            (0, "SECTION"),
            (2, "ENTITIES"),
            (0, "DIMENSION"),
            (8, "0"),
            (10, "10.0"),
            (20, "-5.0"),
            (13, "0.0"),
            (23, "0.0"),
            (14, "10.0"),
            (24, "0.0"),
            (50, "0.0"),
            (1001, "ACAD"),
            (1000, "DSTYLE"),
            (1002, "{"),
            (1070, "140"),
            (1040, "1.5"),
            (1002, "}"),
            (0, "ENDSEC"),
            (0, "EOF"),
        ]);
        let document = parse_document(&source).expect("parse");
        let (_, entity) = document.entities().next().expect("dimension");
        let Entity::Dimension(dimension) = entity else {
            panic!("expected a dimension");
        };
        assert!((dimension.text_height - 1.5).abs() < f64::EPSILON);
        assert!((dimension.measurement() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_entity_is_reported_as_unsupported() {
        let source = dxf(&[
            (0, "SECTION"),
            (2, "ENTITIES"),
            (0, "CIRCLE"),
            (10, "0.0"),
            (20, "0.0"),
            (40, "1.0"),
            (0, "ENDSEC"),
            (0, "EOF"),
        ]);
        let err = parse_document(&source).unwrap_err();
        assert!(matches!(err, IoError::UnsupportedFeature(message) if message.contains("CIRCLE")));
    }

    #[test]
    fn vertex_count_mismatch_is_invalid() {
        let source = dxf(&[
            (0, "SECTION"),
            (2, "ENTITIES"),
            (0, "LWPOLYLINE"),
            (8, "0"),
            (90, "3"),
            (70, "0"),
            (10, "0.0"),
            (20, "0.0"),
            (10, "1.0"),
            (20, "0.0"),
            (0, "ENDSEC"),
            (0, "EOF"),
        ]);
        let err = parse_document(&source).unwrap_err();
        assert!(matches!(err, IoError::InvalidDocument(_)));
    }

    #[test]
    fn truncated_pair_reports_line_number() {
        let err = parse_document("  0\nSECTION\n  2\n").unwrap_err();
        match err {
            IoError::InvalidDocument(message) => assert!(message.contains('3')),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
