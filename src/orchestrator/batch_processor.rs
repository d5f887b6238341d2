//! 批量答卷处理器 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：创建 HTTP 客户端与提取流程，初始化运行日志
//! 2. **并发控制**：使用 Semaphore 限制同时处理的答卷数量
//! 3. **分批处理**：每批完成后再开始下一批
//! 4. **全局统计**：汇总所有答卷的处理结果
//!
//! 单份答卷的细节委托给 `script_processor`

use crate::clients::{HealthStatus, OcrApiClient};
use crate::config::Config;
use crate::models::loaders::{load_all_input_files, load_input_file};
use crate::models::mcq::ExtractionResult;
use crate::orchestrator::script_processor::{self, ScriptFailure, ScriptOutcome};
use crate::utils::logging;
use crate::workflow::ExtractionFlow;
use anyhow::{Context, Result};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    client: Arc<OcrApiClient>,
    flow: Arc<ExtractionFlow>,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        config.validate()?;
        let client = OcrApiClient::new(&config)?;
        let flow = ExtractionFlow::new(&config)?;

        Ok(Self {
            config,
            client: Arc::new(client),
            flow: Arc::new(flow),
        })
    }

    /// 通过文档服务处理多份答卷
    ///
    /// # 返回
    /// 每份答卷的处理结果（按输入顺序）；失败的答卷带有错误信息
    pub async fn run(&self, script_ids: &[i64]) -> Result<Vec<ScriptOutcome>> {
        logging::init_log_file(&self.config.output_log_file)
            .await
            .with_context(|| format!("无法初始化日志文件: {}", self.config.output_log_file))?;
        logging::log_startup(self.config.max_concurrent_scripts, self.config.llm_refine_enabled);

        if script_ids.is_empty() {
            warn!("⚠️ 没有需要处理的答卷，程序结束");
            return Ok(Vec::new());
        }
        logging::log_scripts_loaded(script_ids.len(), self.config.max_concurrent_scripts);

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_scripts));
        let batch_size = self.config.max_concurrent_scripts;
        let total = script_ids.len();
        let total_batches = (total + batch_size - 1) / batch_size;
        let mut stats = ProcessingStats {
            total,
            ..Default::default()
        };
        let mut outcomes = Vec::with_capacity(total);

        for (batch_idx, batch) in script_ids.chunks(batch_size).enumerate() {
            let batch_start = batch_idx * batch_size;
            logging::log_batch_start(
                batch_idx + 1,
                total_batches,
                batch_start + 1,
                batch_start + batch.len(),
                total,
            );

            let batch_outcomes = self.process_batch(batch, batch_start, semaphore.clone()).await?;
            let success = batch_outcomes.iter().filter(|o| !o.is_failed()).count();
            stats.success += success;
            stats.failed += batch.len() - success;
            logging::log_batch_complete(batch_idx + 1, success, batch.len());

            for outcome in batch_outcomes {
                if let ScriptOutcome::Completed(report) = &outcome {
                    stats.flagged += report.result.summary.flagged;
                }
                outcomes.push(outcome);
            }
        }

        logging::print_final_stats(
            stats.success,
            stats.failed,
            stats.total,
            stats.flagged,
            &self.config.output_log_file,
            &self.config.review_file,
        );

        Ok(outcomes)
    }

    /// 处理单个批次，失败的答卷对应 `ScriptOutcome::Failed`
    async fn process_batch(
        &self,
        batch: &[i64],
        batch_start: usize,
        semaphore: Arc<Semaphore>,
    ) -> Result<Vec<ScriptOutcome>> {
        let mut handles = Vec::with_capacity(batch.len());

        for (idx, &script_id) in batch.iter().enumerate() {
            let script_index = batch_start + idx + 1;
            let permit = semaphore.clone().acquire_owned().await?;
            let client = Arc::clone(&self.client);
            let flow = Arc::clone(&self.flow);
            let log_file = self.config.output_log_file.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                script_processor::process_script(&client, &flow, script_id, script_index, &log_file).await
            }));
        }

        let results = join_all(handles).await;
        let outcomes = results
            .into_iter()
            .zip(batch)
            .map(|(joined, &script_id)| {
                let error = match joined {
                    Ok(Ok(report)) => return ScriptOutcome::Completed(report),
                    Ok(Err(e)) => {
                        error!("[脚本 {}] ❌ 处理过程中发生错误: {:#}", script_id, e);
                        format!("{:#}", e)
                    }
                    Err(e) => {
                        error!("[脚本 {}] 任务执行失败: {}", script_id, e);
                        format!("任务执行失败: {}", e)
                    }
                };
                ScriptOutcome::Failed(ScriptFailure { script_id, error })
            })
            .collect();

        Ok(outcomes)
    }

    /// 提取本地文件（单个文件或文件夹）
    ///
    /// 单个文件返回该答卷的结果；文件夹返回 `{文件名: 结果}`
    pub async fn extract_local(&self, input: &Path) -> Result<serde_json::Value> {
        if input.is_dir() {
            let inputs = load_all_input_files(input).await?;
            info!("✓ 找到 {} 个输入文件", inputs.len());

            let mut results: BTreeMap<String, ExtractionResult> = BTreeMap::new();
            for (idx, script) in inputs.into_iter().enumerate() {
                match script_processor::process_local(&self.flow, &script.name, script.pages, idx + 1).await {
                    Ok(result) => {
                        results.insert(script.name, result);
                    }
                    Err(e) => error!(
                        "[脚本 {}] ❌ {} 提取失败: {:#}",
                        idx + 1,
                        script.file_path.display(),
                        e
                    ),
                }
            }
            Ok(serde_json::to_value(results)?)
        } else {
            let script = load_input_file(input).await?;
            let result = script_processor::process_local(&self.flow, &script.name, script.pages, 1).await?;
            Ok(serde_json::to_value(result)?)
        }
    }

    /// 检查文档服务连通性
    pub async fn health(&self) -> HealthStatus {
        info!("🔌 检查文档服务: {}", self.client.base_url());
        self.client.health().await
    }
}

/// 处理统计
#[derive(Debug, Default)]
struct ProcessingStats {
    success: usize,
    failed: usize,
    total: usize,
    flagged: usize,
}
