pub mod builder;
pub mod layers;
pub mod layout;
pub mod params;

pub mod errors {
    use thiserror::Error;

    /// 参数在缺省值替换之后仍无法构成有效几何时返回。
    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum ParameterError {
        #[error("rail width W must be a positive finite number, got {0}")]
        InvalidRailWidth(f64),
        #[error("rail length LS must be a positive finite number, got {0}")]
        InvalidRailLength(f64),
        #[error("block count NOB must not be negative, got {0}")]
        NegativeBlockCount(i64),
        #[error("block count NOB must not exceed {max}, got {requested}")]
        TooManyBlocks { requested: i64, max: u32 },
    }
}

pub use builder::{RailDrawing, build_drawing};
pub use errors::ParameterError;
pub use layers::rail_registry;
pub use layout::{Block, BlockLayout, BlockSize, layout_blocks};
pub use params::{ApplicationParams, DrawingDefaults, GeometryParams, RailSpec};
