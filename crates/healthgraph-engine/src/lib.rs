pub mod engine;
pub mod graph;

pub use engine::*;
pub use graph::*;
