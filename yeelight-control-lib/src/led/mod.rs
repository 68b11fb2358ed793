pub mod color;
pub mod pattern;
