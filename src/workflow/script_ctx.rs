//! 答卷处理上下文
//!
//! 封装"我正在处理哪一份答卷"这一信息

use std::fmt::Display;

/// 答卷处理上下文
#[derive(Debug, Clone)]
pub struct ScriptCtx {
    /// 答卷标识（上游 script_id 或本地文件名）
    pub script_id: String,

    /// 答卷索引（仅用于日志显示，从 1 开始）
    pub script_index: usize,
}

impl ScriptCtx {
    pub fn new(script_id: impl Into<String>, script_index: usize) -> Self {
        Self {
            script_id: script_id.into(),
            script_index,
        }
    }
}

impl Display for ScriptCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[脚本 {} ID#{}]", self.script_index, self.script_id)
    }
}
