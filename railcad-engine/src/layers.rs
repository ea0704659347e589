use railcad_core::style::{Layer, Linetype, StyleRegistry};

pub const LAYER_RAIL: &str = "RAIL";
pub const LAYER_BLOCKS: &str = "BLOCKS";
pub const LAYER_DIMENSIONS: &str = "DIMENSIONS";
pub const LAYER_CENTERLINES: &str = "CENTERLINES";

// AutoCAD 颜色索引
pub const COLOR_RAIL: i16 = 5;
pub const COLOR_BLOCKS: i16 = 1;
pub const COLOR_DIMENSIONS: i16 = 7;
pub const COLOR_CENTERLINES: i16 = 3;

pub const CENTER_LINETYPE: &str = "CENTER";
const CENTER_DESCRIPTION: &str = "Center ____ _ ____ _ ____ _ ____";
const CENTER_PATTERN: [f64; 4] = [1.25, -0.25, 0.25, -0.25];

pub fn center_linetype() -> Linetype {
    Linetype::new(CENTER_LINETYPE, CENTER_DESCRIPTION, CENTER_PATTERN.to_vec())
}

/// 注册中心线线型，已存在时不做任何修改。
pub fn register_center_linetype(registry: &mut StyleRegistry) -> bool {
    registry.register_linetype(center_linetype())
}

/// 构建导轨图纸固定使用的四个图层及中心线线型。每次出图各自构建一份。
pub fn rail_registry() -> StyleRegistry {
    let mut registry = StyleRegistry::new();
    registry.add_layer(Layer::new(LAYER_RAIL, COLOR_RAIL));
    registry.add_layer(Layer::new(LAYER_BLOCKS, COLOR_BLOCKS));
    registry.add_layer(Layer::new(LAYER_DIMENSIONS, COLOR_DIMENSIONS));
    registry.add_layer(Layer::new(LAYER_CENTERLINES, COLOR_CENTERLINES));
    register_center_linetype(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_the_four_rail_layers() {
        let registry = rail_registry();
        let names: Vec<_> = registry
            .layers()
            .map(|layer| layer.name.as_str())
            .filter(|name| *name != "0")
            .collect();
        assert_eq!(names, vec!["RAIL", "BLOCKS", "DIMENSIONS", "CENTERLINES"]);
        assert_eq!(registry.layer("RAIL").map(|l| l.color), Some(5));
        assert_eq!(registry.layer("BLOCKS").map(|l| l.color), Some(1));
        assert_eq!(registry.layer("DIMENSIONS").map(|l| l.color), Some(7));
        assert_eq!(registry.layer("CENTERLINES").map(|l| l.color), Some(3));
    }

    #[test]
    fn center_linetype_registration_is_idempotent() {
        let mut registry = rail_registry();
        assert!(!register_center_linetype(&mut registry));
        assert!(!register_center_linetype(&mut registry));
        let linetypes: Vec<_> = registry.linetypes().collect();
        assert_eq!(linetypes.len(), 1);
        assert_eq!(linetypes[0].pattern, vec![1.25, -0.25, 0.25, -0.25]);
        assert!((linetypes[0].pattern_length() - 2.0).abs() < f64::EPSILON);
    }
}
