//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量答卷处理器
//! - 管理应用生命周期（初始化、运行）
//! - 控制并发数量（Semaphore）
//! - 输出全局统计信息
//!
//! ### `script_processor` - 单份答卷处理器
//! - 获取页面、排序、提取、保存
//! - 输出单份答卷的统计信息
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<script_id>)
//!     ↓
//! script_processor (处理一份答卷的所有页面)
//!     ↓
//! workflow::ExtractionFlow (规范化 → 切分 → 作答 → 置信度)
//!     ↓
//! services / clients (能力层)
//! ```

pub mod batch_processor;
pub mod script_processor;

pub use batch_processor::App;
pub use script_processor::{process_local, process_script, ScriptFailure, ScriptOutcome, ScriptReport};
