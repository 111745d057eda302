pub mod generation;

pub use generation::{CodeGenerator, StreamEvent};
