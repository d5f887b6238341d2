//! 答卷提取流程 - 流程层
//!
//! 核心职责：定义"一份答卷"的完整提取流程
//!
//! 流程顺序：
//! 1. 规范化 OCR 记录
//! 2. 切分题目片段
//! 3. 逐题提取作答并标注置信度
//! 4. （可选）LLM 整理待复核题目的文字
//! 5. 写入 review.txt

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::mcq::ExtractionResult;
use crate::models::ocr::OcrPageRecord;
use crate::services::answer_extractor::{build_record, describe_sources, extract_answer};
use crate::services::normalizer::normalize;
use crate::services::{ConfidenceAnnotator, LlmService, McqSegmenter, ReviewWriter};
use crate::utils::logging::truncate_text;
use crate::workflow::script_ctx::ScriptCtx;

/// 答卷提取流程
///
/// - 编排完整的提取流程
/// - 不持有任何网络资源
/// - 只依赖业务能力（services）
pub struct ExtractionFlow {
    segmenter: McqSegmenter,
    annotator: ConfidenceAnnotator,
    llm_service: Option<LlmService>,
    review_writer: ReviewWriter,
    verbose_logging: bool,
}

impl ExtractionFlow {
    /// 创建新的提取流程
    pub fn new(config: &Config) -> AppResult<Self> {
        let segmenter = McqSegmenter::new()
            .map_err(|e| AppError::Other(format!("题目切分规则无效: {}", e)))?;

        Ok(Self {
            segmenter,
            annotator: ConfidenceAnnotator::new(config.low_confidence_threshold),
            llm_service: config
                .llm_refine_enabled
                .then(|| LlmService::new(config)),
            review_writer: ReviewWriter::with_path(config.review_file.clone()),
            verbose_logging: config.verbose_logging,
        })
    }

    /// 纯提取：规范化 → 切分 → 作答 → 置信度
    ///
    /// 不调用 LLM，不写文件
    pub fn extract(&self, pages: &[OcrPageRecord]) -> AppResult<ExtractionResult> {
        let stream = normalize(pages)?;
        debug!("规范化完成: {} 行, 页码 {:?}", stream.len(), stream.pages());

        let segmentation = self.segmenter.segment(&stream);
        debug!(
            "切分完成: {} 道题, 跳过 {} 个片段, 前言 {} 行",
            segmentation.spans.len(),
            segmentation.skipped_spans,
            segmentation.preamble_lines
        );

        let mut records = Vec::with_capacity(segmentation.spans.len());
        for span in segmentation.spans {
            let evidence = extract_answer(&span);
            let confidence = self
                .annotator
                .score(&stream, &span.lines, &evidence.evidence_lines);

            if self.verbose_logging {
                debug!(
                    "第 {} 题: {} | 选项 {} 个, 作答来源 {}, 置信度 {:.2}",
                    span.number,
                    truncate_text(&span.question_text, 30),
                    span.options.len(),
                    describe_sources(&span),
                    confidence
                );
            }

            let mut record = build_record(span, evidence);
            self.annotator.annotate(&mut record, confidence);
            records.push(record);
        }

        Ok(ExtractionResult::from_records(records, segmentation.skipped_spans))
    }

    /// 完整流程：提取 → LLM 整理 → 写入复核记录
    pub async fn run(&self, pages: &[OcrPageRecord], ctx: &ScriptCtx) -> Result<ExtractionResult> {
        info!("{} 🔍 开始提取选择题...", ctx);

        let mut result = self
            .extract(pages)
            .with_context(|| format!("{} 提取失败", ctx))?;

        info!(
            "{} ✓ 共 {} 题, 已作答 {}, 未作答 {}, 待复核 {}",
            ctx,
            result.summary.total_questions,
            result.summary.answered,
            result.summary.unanswered,
            result.summary.flagged
        );

        if let Some(llm) = &self.llm_service {
            llm.restructure_flagged(&mut result).await;
        }

        for record in result.records.iter().filter(|r| r.ambiguous) {
            if let Err(e) = self.review_writer.write(&ctx.script_id, record).await {
                warn!(
                    "{} ⚠️ 无法写入 {}: {}",
                    ctx,
                    self.review_writer.path(),
                    e
                );
            }
        }

        Ok(result)
    }
}

/// 使用默认规则提取一份答卷（不调用 LLM，不写文件）
///
/// # 参数
/// - `pages`: 页面记录
/// - `low_confidence_threshold`: 低置信度阈值
pub fn extract_pages(pages: &[OcrPageRecord], low_confidence_threshold: f64) -> AppResult<ExtractionResult> {
    let config = Config {
        low_confidence_threshold,
        llm_refine_enabled: false,
        ..Config::default()
    };
    ExtractionFlow::new(&config)?.extract(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use crate::models::mcq::{OptionLabel, ReviewReason};
    use serde_json::json;

    fn page(number: i64, lines: &[&str]) -> OcrPageRecord {
        OcrPageRecord::new(
            number,
            json!({ "lines": lines.iter().map(|l| json!({"text": l, "confidence": 0.95})).collect::<Vec<_>>() }),
        )
    }

    #[test]
    fn test_extract_across_pages() {
        let pages = vec![
            page(2, &["3. Largest planet?", "A. Mars B. Jupiter C. Venus D. Earth", "Ans: B"]),
            page(1, &[
                "Name: Test Student",
                "1. What is 2 + 2?",
                "A) 3",
                "B) 4",
                "C) 5",
                "D) 6",
                "Answer: B",
                "2) Colour of the sky?",
                "(a) red (b) blue (c) green (d) black",
            ]),
        ];

        let result = extract_pages(&pages, 0.6).unwrap();
        assert_eq!(result.summary.total_questions, 3);
        assert_eq!(result.record(1).unwrap().selected_label(), Some(OptionLabel::B));
        assert_eq!(result.record(2).unwrap().selected_label(), None);
        assert_eq!(result.record(3).unwrap().selected_label(), Some(OptionLabel::B));
        assert_eq!(result.record(3).unwrap().pages, vec![2]);
        assert!(result.flagged_questions.is_empty());
    }

    #[test]
    fn test_low_confidence_script_is_flagged() {
        let pages = vec![OcrPageRecord::new(
            1,
            json!({ "lines": [
                {"text": "1. Pick one", "confidence": 40},
                {"text": "A. x B. y C. z D. w", "confidence": 45},
                {"text": "Ans: C", "confidence": 30}
            ]}),
        )];

        let result = extract_pages(&pages, 0.6).unwrap();
        let record = result.record(1).unwrap();
        assert_eq!(record.selected_label(), Some(OptionLabel::C));
        assert!(record.review_reasons.contains(&ReviewReason::LowConfidence));
        assert_eq!(result.flagged_questions, vec![1]);
    }

    #[test]
    fn test_no_ocr_data_is_error() {
        let pages = vec![OcrPageRecord {
            page_number: Some(1),
            ocr_json: None,
        }];
        assert!(matches!(
            extract_pages(&pages, 0.6),
            Err(AppError::Ocr(OcrError::NoValidPages))
        ));
    }

    #[tokio::test]
    async fn test_run_writes_review_file() {
        let path = std::env::temp_dir().join(format!("mcq_flow_review_{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let config = Config {
            review_file: path.to_string_lossy().to_string(),
            ..Config::default()
        };
        let flow = ExtractionFlow::new(&config).unwrap();
        let pages = vec![page(1, &["1. Pick", "A. x", "B. y", "C. z", "D. w", "Ans: B or C"])];

        let result = flow.run(&pages, &ScriptCtx::new("local", 1)).await.unwrap();
        assert_eq!(result.flagged_questions, vec![1]);
        assert_eq!(result.record(1).unwrap().raw_answer.as_deref(), Some("B or C"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("脚本 local | 题目 1"));
        let _ = std::fs::remove_file(&path);
    }
}
