//! 单份答卷处理器 - 编排层
//!
//! ## 职责
//!
//! 1. **获取页面**：从文档服务拉取答卷的所有页面 OCR 记录
//! 2. **页面排序**：按页码排序，缺少 OCR 的页面跳过
//! 3. **流程调度**：委托 `ExtractionFlow` 完成提取
//! 4. **结果保存**：已有 compare-text 记录则更新，否则新建
//! 5. **统计输出**：记录答卷级别的统计与 token 用量
//!
//! 保存失败不影响提取结果，只在报告中标记 `database_saved = false`

use crate::clients::OcrApiClient;
use crate::models::mcq::ExtractionResult;
use crate::models::ocr::OcrPageRecord;
use crate::utils::logging::append_log_line;
use crate::workflow::{ExtractionFlow, ScriptCtx};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// 单份答卷的处理报告
#[derive(Debug, Clone, Serialize)]
pub struct ScriptReport {
    pub script_id: i64,
    pub total_pages: usize,
    /// 按处理顺序排列的页码（缺失页码为 null）
    pub pages_processed: Vec<Option<i64>>,
    pub result: ExtractionResult,
    pub database_saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_error: Option<String>,
}

/// 处理失败的答卷
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScriptFailure {
    pub script_id: i64,
    pub error: String,
}

/// 单份答卷的处理结果，批量输出中按输入顺序排列
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ScriptOutcome {
    Completed(ScriptReport),
    Failed(ScriptFailure),
}

impl ScriptOutcome {
    pub fn script_id(&self) -> i64 {
        match self {
            ScriptOutcome::Completed(report) => report.script_id,
            ScriptOutcome::Failed(failure) => failure.script_id,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ScriptOutcome::Failed(_))
    }
}

/// 按页码排序（缺失页码视为 0，保持原有相对顺序）
pub fn sort_pages(pages: &mut [OcrPageRecord]) {
    pages.sort_by_key(|p| p.page_number.unwrap_or(0));
}

/// 处理单份答卷
///
/// # 参数
/// - `client`: 文档服务客户端
/// - `flow`: 提取流程
/// - `script_id`: 答卷 ID
/// - `script_index`: 答卷索引（用于日志）
/// - `log_file_path`: 运行日志文件
pub async fn process_script(
    client: &OcrApiClient,
    flow: &ExtractionFlow,
    script_id: i64,
    script_index: usize,
    log_file_path: &str,
) -> Result<ScriptReport> {
    let ctx = ScriptCtx::new(script_id.to_string(), script_index);

    info!("{} 📥 获取 OCR 数据...", ctx);
    let mut pages = client
        .fetch_ocr_pages(script_id)
        .await
        .with_context(|| format!("{} 获取 OCR 数据失败", ctx))?;

    if pages.is_empty() {
        anyhow::bail!("没有找到答卷 {} 的 OCR 数据", script_id);
    }

    sort_pages(&mut pages);
    let pages_processed: Vec<Option<i64>> = pages.iter().map(|p| p.page_number).collect();
    let pages_with_ocr = pages.iter().filter(|p| p.has_ocr()).count();
    info!("{} 共 {} 页, 页码: {:?}", ctx, pages.len(), pages_processed);

    let result = flow.run(&pages, &ctx).await?;

    if let Some(usage) = result.token_usage {
        info!(
            "{} 🎯 TOKEN 用量 - 总计: {}, 提示: {}, 生成: {}",
            ctx, usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
        );
    }

    let mcq = serde_json::to_value(&result).context("无法序列化提取结果")?;
    let (database_saved, database_response, database_error) =
        match client.persist(script_id, &mcq, pages_with_ocr).await {
            Ok(response) => {
                info!("{} 💾 结果已保存", ctx);
                (true, Some(response), None)
            }
            Err(e) => {
                warn!("{} ⚠️ 提取完成但保存失败: {}", ctx, e);
                (false, None, Some(e.to_string()))
            }
        };

    let report = ScriptReport {
        script_id,
        total_pages: pages.len(),
        pages_processed,
        result,
        database_saved,
        database_response,
        database_error,
    };

    if let Err(e) = append_log_line(log_file_path, &format_log_line(&report)).await {
        warn!("{} ⚠️ 无法写入日志文件 {}: {}", ctx, log_file_path, e);
    }
    log_script_complete(&ctx, &report);

    Ok(report)
}

/// 处理本地页面记录（不访问文档服务）
pub async fn process_local(
    flow: &ExtractionFlow,
    name: &str,
    mut pages: Vec<OcrPageRecord>,
    script_index: usize,
) -> Result<ExtractionResult> {
    let ctx = ScriptCtx::new(name, script_index);
    sort_pages(&mut pages);
    flow.run(&pages, &ctx).await
}

/// 运行日志中的单行记录
pub fn format_log_line(report: &ScriptReport) -> String {
    let summary = &report.result.summary;
    format!(
        "脚本 {} | 页数 {} | 题目 {} | 已作答 {} | 待复核 {:?} | 保存: {}",
        report.script_id,
        report.total_pages,
        summary.total_questions,
        summary.answered,
        report.result.flagged_questions,
        if report.database_saved { "成功" } else { "失败" }
    )
}

fn log_script_complete(ctx: &ScriptCtx, report: &ScriptReport) {
    let summary = &report.result.summary;
    info!(
        "{} 题目统计: 共 {}, 已作答 {}, 未作答 {}, 待复核 {}",
        ctx, summary.total_questions, summary.answered, summary.unanswered, summary.flagged
    );
    info!("{} ✅ 答卷处理完成\n", ctx);
}
