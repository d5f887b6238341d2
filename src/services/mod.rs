pub mod answer_extractor;
pub mod confidence;
pub mod llm_service;
pub mod normalizer;
pub mod review_writer;
pub mod segmenter;

pub use answer_extractor::{build_record, extract_answer, AnswerEvidence};
pub use confidence::ConfidenceAnnotator;
pub use llm_service::{LlmService, RestructuredText};
pub use normalizer::normalize;
pub use review_writer::ReviewWriter;
pub use segmenter::{McqSegmenter, QuestionSpan, Segmentation};
