pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，单位为毫米。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn midpoint(self, other: Point2) -> Point2 {
            Self((self.0 + other.0) * 0.5)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        /// 由角度（弧度）构造单位方向向量。
        #[inline]
        pub fn from_angle(angle: f64) -> Self {
            Self(DVec2::new(angle.cos(), angle.sin()))
        }

        #[inline]
        pub fn dot(self, other: Vector2) -> f64 {
            self.0.dot(other.0)
        }

        #[inline]
        pub fn scale(self, factor: f64) -> Self {
            Self(self.0 * factor)
        }

        /// 逆时针旋转 90° 得到的法向量。
        #[inline]
        pub fn perp(self) -> Self {
            Self(self.0.perp())
        }

        #[inline]
        pub fn normalize(self) -> Option<Self> {
            let len = self.0.length();
            if len <= f64::EPSILON {
                None
            } else {
                Some(Self(self.0 / len))
            }
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    /// 轴对齐边界框，用于估算文档/实体范围。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            self.min.midpoint(self.max)
        }
    }
}

pub mod style {
    use serde::{Deserialize, Serialize};

    /// DXF 强制存在的默认图层。
    pub const DEFAULT_LAYER: &str = "0";
    pub const CONTINUOUS: &str = "Continuous";
    pub const BUILTIN_LINETYPES: [&str; 3] = ["ByBlock", "ByLayer", CONTINUOUS];

    /// 图层定义。颜色使用 AutoCAD 颜色索引（ACI）。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        pub color: i16,
        pub linetype: Option<String>,
        pub is_visible: bool,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>, color: i16) -> Self {
            Self {
                name: name.into(),
                color,
                linetype: None,
                is_visible: true,
            }
        }

        pub fn with_linetype(mut self, linetype: impl Into<String>) -> Self {
            self.linetype = Some(linetype.into());
            self
        }

        /// 图层线型名，未设置时为 `Continuous`。
        #[inline]
        pub fn linetype_name(&self) -> &str {
            self.linetype.as_deref().unwrap_or(CONTINUOUS)
        }
    }

    /// 线型定义。`pattern` 中正值为实线段，负值为间隙，0 为点。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Linetype {
        pub name: String,
        pub description: String,
        pub pattern: Vec<f64>,
    }

    impl Linetype {
        pub fn new(name: impl Into<String>, description: impl Into<String>, pattern: Vec<f64>) -> Self {
            Self {
                name: name.into(),
                description: description.into(),
                pattern,
            }
        }

        #[inline]
        pub fn pattern_length(&self) -> f64 {
            self.pattern.iter().map(|element| element.abs()).sum()
        }
    }

    /// 一次出图所用的图层与线型集合，按注册顺序保存以保证输出稳定。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct StyleRegistry {
        layers: Vec<Layer>,
        linetypes: Vec<Linetype>,
    }

    impl Default for StyleRegistry {
        fn default() -> Self {
            Self::new()
        }
    }

    impl StyleRegistry {
        pub fn new() -> Self {
            Self {
                layers: vec![Layer::new(DEFAULT_LAYER, 7)],
                linetypes: Vec::new(),
            }
        }

        /// 添加图层；同名图层会被替换。
        pub fn add_layer(&mut self, layer: Layer) {
            match self
                .layers
                .iter_mut()
                .find(|existing| existing.name.eq_ignore_ascii_case(&layer.name))
            {
                Some(existing) => *existing = layer,
                None => self.layers.push(layer),
            }
        }

        /// 注册线型。名称已存在（含内建线型）时保留原定义并返回 `false`。
        pub fn register_linetype(&mut self, linetype: Linetype) -> bool {
            if self.has_linetype(&linetype.name) {
                return false;
            }
            self.linetypes.push(linetype);
            true
        }

        #[inline]
        pub fn layer(&self, name: &str) -> Option<&Layer> {
            self.layers
                .iter()
                .find(|layer| layer.name.eq_ignore_ascii_case(name))
        }

        #[inline]
        pub fn has_layer(&self, name: &str) -> bool {
            self.layer(name).is_some()
        }

        #[inline]
        pub fn linetype(&self, name: &str) -> Option<&Linetype> {
            self.linetypes
                .iter()
                .find(|linetype| linetype.name.eq_ignore_ascii_case(name))
        }

        pub fn has_linetype(&self, name: &str) -> bool {
            BUILTIN_LINETYPES
                .iter()
                .any(|builtin| builtin.eq_ignore_ascii_case(name))
                || self.linetype(name).is_some()
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.iter()
        }

        /// 仅包含注册的线型，不含内建线型。
        #[inline]
        pub fn linetypes(&self) -> impl Iterator<Item = &Linetype> {
            self.linetypes.iter()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn registry_starts_with_default_layer() {
            let registry = StyleRegistry::new();
            let names: Vec<_> = registry.layers().map(|l| l.name.as_str()).collect();
            assert_eq!(names, vec!["0"]);
            assert!(registry.has_linetype("continuous"));
            assert_eq!(registry.linetypes().count(), 0);
        }

        #[test]
        fn registering_linetype_twice_keeps_first_definition() {
            let mut registry = StyleRegistry::new();
            assert!(registry.register_linetype(Linetype::new("CENTER", "first", vec![1.0, -0.5])));
            assert!(!registry.register_linetype(Linetype::new("center", "second", vec![2.0])));
            assert_eq!(registry.linetypes().count(), 1);
            let center = registry.linetype("CENTER").expect("CENTER registered");
            assert_eq!(center.description, "first");
            assert!((center.pattern_length() - 1.5).abs() < f64::EPSILON);
        }

        #[test]
        fn adding_layer_with_same_name_replaces_it() {
            let mut registry = StyleRegistry::new();
            registry.add_layer(Layer::new("RAIL", 5));
            registry.add_layer(Layer::new("RAIL", 1).with_linetype("CENTER"));
            assert_eq!(registry.layers().count(), 2);
            let rail = registry.layer("rail").expect("RAIL present");
            assert_eq!(rail.color, 1);
            assert_eq!(rail.linetype_name(), "CENTER");
        }
    }
}

pub mod document {
    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2, Vector2};
    use crate::style::StyleRegistry;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Polyline(Polyline),
        Line(Line),
        Text(Text),
        Dimension(Dimension),
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Polyline(polyline) => &polyline.layer,
                Entity::Line(line) => &line.layer,
                Entity::Text(text) => &text.layer,
                Entity::Dimension(dimension) => &dimension.layer,
            }
        }

        #[inline]
        pub fn linetype_name(&self) -> Option<&str> {
            match self {
                Entity::Line(line) => line.linetype.as_deref(),
                _ => None,
            }
        }

        /// 计算实体的 2D 轴对齐范围，文本退化为插入点。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            match self {
                Entity::Polyline(polyline) => {
                    for vertex in &polyline.vertices {
                        bounds.include_point(*vertex);
                    }
                }
                Entity::Line(line) => {
                    bounds.include_point(line.start);
                    bounds.include_point(line.end);
                }
                Entity::Text(text) => {
                    bounds.include_point(text.insert);
                }
                Entity::Dimension(dimension) => {
                    let layout = dimension.layout();
                    bounds.include_point(dimension.first_point);
                    bounds.include_point(dimension.second_point);
                    bounds.include_point(layout.line_start);
                    bounds.include_point(layout.line_end);
                    bounds.include_point(layout.text_point);
                }
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }
    }

    /// 多段线。矩形轮廓以首尾重合的 5 个顶点表示闭合。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<Point2>,
        pub is_closed: bool,
        pub layer: String,
    }

    impl Polyline {
        /// 是否构成首尾相接的环（无论是否设置闭合标志）。
        pub fn is_loop(&self) -> bool {
            self.is_closed
                || (self.vertices.len() > 2 && self.vertices.first() == self.vertices.last())
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub linetype: Option<String>,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Text {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub rotation: f64,
        pub layer: String,
    }

    /// 线性标注。`angle_degrees` 为尺寸线方向（角度制，与 DXF 一致），
    /// 测量值为两定义点在该方向上的投影距离。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Dimension {
        pub base: Point2,
        pub first_point: Point2,
        pub second_point: Point2,
        pub angle_degrees: f64,
        pub text_height: f64,
        pub layer: String,
    }

    /// 标注展开后的几何：尺寸线、延伸线与文字位置。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct DimensionLayout {
        pub line_start: Point2,
        pub line_end: Point2,
        pub first_extension: (Point2, Point2),
        pub second_extension: (Point2, Point2),
        pub text_point: Point2,
        pub measurement: f64,
    }

    impl Dimension {
        /// 延伸线起点相对定义点的间隙，按文字高度比例取值。
        pub const EXTENSION_OFFSET_RATIO: f64 = 0.25;
        /// 延伸线越过尺寸线的长度比例。
        pub const EXTENSION_OVERSHOOT_RATIO: f64 = 0.5;
        /// 文字与尺寸线之间的间隙比例。
        pub const TEXT_GAP_RATIO: f64 = 0.25;

        #[inline]
        pub fn direction(&self) -> Vector2 {
            Vector2::from_angle(self.angle_degrees.to_radians())
        }

        pub fn measurement(&self) -> f64 {
            self.first_point
                .vector_to(self.second_point)
                .dot(self.direction())
                .abs()
        }

        pub fn layout(&self) -> DimensionLayout {
            let direction = self.direction();
            let project = |point: Point2| {
                let along = self.base.vector_to(point).dot(direction);
                self.base.translate(direction.scale(along))
            };
            let line_start = project(self.first_point);
            let line_end = project(self.second_point);

            let offset = self.text_height * Self::EXTENSION_OFFSET_RATIO;
            let overshoot = self.text_height * Self::EXTENSION_OVERSHOOT_RATIO;
            let extension = |origin: Point2, foot: Point2| match origin.vector_to(foot).normalize() {
                Some(unit) => (
                    origin.translate(unit.scale(offset)),
                    foot.translate(unit.scale(overshoot)),
                ),
                None => (origin, foot),
            };

            let gap = self.text_height * Self::TEXT_GAP_RATIO;
            let text_point = line_start
                .midpoint(line_end)
                .translate(direction.perp().scale(gap + self.text_height * 0.5));

            DimensionLayout {
                line_start,
                line_end,
                first_extension: extension(self.first_point, line_start),
                second_extension: extension(self.second_point, line_end),
                text_point,
                measurement: self.measurement(),
            }
        }
    }

    /// 单次出图的文档：样式注册表加上按添加顺序排列的实体。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Document {
        styles: StyleRegistry,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
    }

    impl Default for Document {
        fn default() -> Self {
            Self::new(StyleRegistry::new())
        }
    }

    impl Document {
        pub fn new(styles: StyleRegistry) -> Self {
            Self {
                styles,
                entities: Vec::new(),
                next_entity_id: 0,
            }
        }

        #[inline]
        pub fn styles(&self) -> &StyleRegistry {
            &self.styles
        }

        pub fn add_polyline<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = Point2>,
        {
            self.push(Entity::Polyline(Polyline {
                vertices: vertices.into_iter().collect(),
                is_closed,
                layer: layer.into(),
            }))
        }

        pub fn add_line(
            &mut self,
            start: Point2,
            end: Point2,
            linetype: Option<String>,
            layer: impl Into<String>,
        ) -> EntityId {
            self.push(Entity::Line(Line {
                start,
                end,
                linetype,
                layer: layer.into(),
            }))
        }

        pub fn add_text(
            &mut self,
            insert: Point2,
            content: impl Into<String>,
            height: f64,
            rotation: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.push(Entity::Text(Text {
                insert,
                content: content.into(),
                height,
                rotation,
                layer: layer.into(),
            }))
        }

        pub fn add_dimension(
            &mut self,
            base: Point2,
            first_point: Point2,
            second_point: Point2,
            angle_degrees: f64,
            text_height: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.push(Entity::Dimension(Dimension {
                base,
                first_point,
                second_point,
                angle_degrees,
                text_height,
                layer: layer.into(),
            }))
        }

        #[inline]
        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            self.push(entity)
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            let mut has = false;
            for (_, entity) in &self.entities {
                if let Some(entity_bounds) = entity.bounds() {
                    bounds.include_bounds(&entity_bounds);
                    has = true;
                }
            }
            if has { Some(bounds) } else { None }
        }

        /// 列出引用了未注册图层或线型的实体，供写出前校验。
        pub fn unresolved_references(&self) -> Vec<String> {
            let mut problems = Vec::new();
            for (id, entity) in &self.entities {
                let layer = entity.layer_name();
                if !self.styles.has_layer(layer) {
                    problems.push(format!("实体 #{} 引用了未定义的图层 {layer}", id.get()));
                }
                if let Some(linetype) = entity.linetype_name() {
                    if !self.styles.has_linetype(linetype) {
                        problems.push(format!(
                            "实体 #{} 引用了未定义的线型 {linetype}",
                            id.get()
                        ));
                    }
                }
            }
            for layer in self.styles.layers() {
                if !self.styles.has_linetype(layer.linetype_name()) {
                    problems.push(format!(
                        "图层 {} 引用了未定义的线型 {}",
                        layer.name,
                        layer.linetype_name()
                    ));
                }
            }
            problems
        }

        #[inline]
        fn push(&mut self, entity: Entity) -> EntityId {
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

}
