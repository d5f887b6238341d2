//! 置信度标注服务 - 业务能力层
//!
//! 为每道题计算 OCR 置信度，并标记需要人工复核的题目。

use crate::models::mcq::{McqRecord, OptionLabel, ReviewReason};
use crate::models::ocr::TokenStream;

/// 置信度标注器
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceAnnotator {
    threshold: f64,
}

impl ConfidenceAnnotator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// 计算片段置信度
    ///
    /// 取片段内已知行置信度的平均值，再与作答所在行的最低置信度取较小者；
    /// OCR 完全没有给出置信度时为 1.0。
    ///
    /// # 参数
    /// - `stream`: 行序列
    /// - `lines`: 片段包含的行下标
    /// - `evidence_lines`: 作答证据所在的行下标
    pub fn score(&self, stream: &TokenStream, lines: &[usize], evidence_lines: &[usize]) -> f64 {
        let known: Vec<f64> = lines
            .iter()
            .filter_map(|&i| stream.lines.get(i).and_then(|l| l.confidence))
            .collect();

        let mut score = if known.is_empty() {
            1.0
        } else {
            known.iter().sum::<f64>() / known.len() as f64
        };

        let evidence_min = evidence_lines
            .iter()
            .filter_map(|&i| stream.lines.get(i).and_then(|l| l.confidence))
            .fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.min(c))));
        if let Some(min) = evidence_min {
            score = score.min(min);
        }

        score.clamp(0.0, 1.0)
    }

    /// 写入置信度并补充复核标记
    pub fn annotate(&self, record: &mut McqRecord, confidence: f64) {
        record.confidence = confidence;
        if confidence < self.threshold {
            record.flag(ReviewReason::LowConfidence);
        }
        if record.options.len() < OptionLabel::ALL.len() {
            record.flag(ReviewReason::MissingOptions);
        }
        record.ambiguous = !record.review_reasons.is_empty();
    }
}
