pub mod extraction_flow;
pub mod script_ctx;

pub use extraction_flow::{extract_pages, ExtractionFlow};
pub use script_ctx::ScriptCtx;
