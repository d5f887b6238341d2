//! # MCQ Extract
//!
//! 从扫描答卷的 OCR 结果中提取选择题：题号、题干、A–D 选项与学生所选标签。
//! 学生作答只被读取，从不被修改或评判。
//!
//! ## 架构设计
//!
//! ### ① 数据层（Models）
//! - `models/ocr` - 上游页面记录与规范化后的行序列
//! - `models/mcq` - 题目记录、复核原因、提取结果
//! - `models/loaders` - 本地 JSON 输入
//!
//! ### ② 业务能力层（Services / Clients）
//! - `normalizer` - OCR 记录校验与规范化
//! - `segmenter` - 按题号与选项标记切分题目
//! - `answer_extractor` - 提取学生作答
//! - `confidence` - 置信度与复核标记
//! - `LlmService` - （可选）整理题干与选项文字
//! - `ReviewWriter` - 写 review.txt
//! - `OcrApiClient` - 文档服务 /ocr/ 与 /compare-text/
//!
//! ### ③ 流程层（Workflow）
//! - `ExtractionFlow` - 一份答卷的完整提取流程
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量处理与并发控制
//! - `orchestrator/script_processor` - 单份答卷：获取 → 提取 → 保存

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::OcrApiClient;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{ExtractionResult, McqRecord, OcrPageRecord, OptionLabel, ReviewReason};
pub use orchestrator::{App, ScriptFailure, ScriptOutcome, ScriptReport};
pub use utils::logging;
pub use workflow::{extract_pages, ExtractionFlow, ScriptCtx};
