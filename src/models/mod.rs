pub mod loaders;
pub mod mcq;
pub mod ocr;

pub use loaders::{load_all_input_files, load_input_file, pages_from_value, ScriptInput};
pub use mcq::{ExtractionResult, ExtractionSummary, McqRecord, OptionLabel, ReviewReason, TokenUsage};
pub use ocr::{BoundingBox, NormalizedLine, OcrPageRecord, Token, TokenStream};
