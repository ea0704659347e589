pub mod errors;
pub mod generator;
pub mod locator;

pub use errors::GenerationError;
pub use generator::{GeneratedDrawing, export_drawing, generate, generate_with};
pub use locator::ExportLocator;
