//! 复核记录写入服务 - 业务能力层
//!
//! 只负责"写 review.txt"能力，不关心流程

use anyhow::Result;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::models::mcq::McqRecord;

/// 复核记录写入服务
///
/// 职责：
/// - 将需要人工复核的题目追加到 review.txt
/// - 每次只处理单个题目
pub struct ReviewWriter {
    review_file_path: String,
}

impl ReviewWriter {
    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            review_file_path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.review_file_path
    }

    /// 写入一条复核记录
    ///
    /// # 参数
    /// - `script_id`: 答题卡 ID（本地文件时为文件名）
    /// - `record`: 需要复核的题目
    pub async fn write(&self, script_id: &str, record: &McqRecord) -> Result<()> {
        debug!(
            "写入复核记录: 脚本 {} | 题目 {} | 原因数: {}",
            script_id,
            record.question_number,
            record.review_reasons.len()
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.review_file_path)
            .await?;

        file.write_all(format_review_line(script_id, record).as_bytes())
            .await?;
        file.flush().await?;

        Ok(())
    }
}

impl Default for ReviewWriter {
    fn default() -> Self {
        Self::with_path("review.txt")
    }
}

/// 单行复核记录
pub fn format_review_line(script_id: &str, record: &McqRecord) -> String {
    let reasons: Vec<&str> = record
        .review_reasons
        .iter()
        .map(|r| r.description())
        .collect();
    let selected = record
        .selected_label()
        .map(|l| l.to_string())
        .unwrap_or_else(|| "-".to_string());

    format!(
        "脚本 {} | 题目 {} | 作答: {} | 原文: {} | 原因: {}\n",
        script_id,
        record.question_number,
        selected,
        record.raw_answer.as_deref().unwrap_or("-"),
        reasons.join("; ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::mcq::{OptionLabel, ReviewReason};
    use std::collections::BTreeMap;

    fn flagged_record() -> McqRecord {
        let mut record = McqRecord::new(7, "q".to_string(), BTreeMap::new(), None, vec![2]);
        record.raw_answer = Some("B or C".to_string());
        record.flag(ReviewReason::UnrecognizedAnswer);
        record
    }

    #[test]
    fn test_format_review_line() {
        let line = format_review_line("42", &flagged_record());
        assert!(line.starts_with("脚本 42 | 题目 7 | 作答: - | 原文: B or C | 原因: "));
        assert!(line.contains(ReviewReason::UnrecognizedAnswer.description()));
        assert!(line.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_write_appends() {
        let path = std::env::temp_dir().join(format!("mcq_review_{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let writer = ReviewWriter::with_path(path.to_string_lossy().to_string());

        let mut answered = McqRecord::new(
            8,
            "q".to_string(),
            BTreeMap::new(),
            Some(OptionLabel::A),
            vec![2],
        );
        answered.flag(ReviewReason::MissingOptions);

        writer.write("s1", &flagged_record()).await.unwrap();
        writer.write("s1", &answered).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("题目 8 | 作答: A"));
        let _ = std::fs::remove_file(&path);
    }
}
