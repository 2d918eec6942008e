//! Output nodes

mod text_output;

pub use text_output::TextOutputExecutor;
