/// 文档服务 API 客户端
///
/// 封装所有与 /ocr/ 和 /compare-text/ 相关的调用逻辑
use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult};
use crate::models::ocr::OcrPageRecord;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

const HEALTH_TIMEOUT_SECS: u64 = 5;

/// 上游健康检查结果
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthStatus {
    pub status: String,
    pub upstream_api: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub endpoints_available: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// 文档服务客户端
pub struct OcrApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl OcrApiClient {
    /// 创建新的客户端
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| AppError::Other(format!("无法创建 HTTP 客户端: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.ocr_api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/", self.base_url, path)
    }

    fn api_error(&self, endpoint: &str, err: reqwest::Error) -> ApiError {
        ApiError::from_reqwest(&self.base_url, endpoint, err)
    }

    /// 获取答卷的所有页面 OCR 记录
    ///
    /// # 参数
    /// - `script_id`: 答卷 ID
    pub async fn fetch_ocr_pages(&self, script_id: i64) -> AppResult<Vec<OcrPageRecord>> {
        let endpoint = self.endpoint("ocr");
        debug!("GET {}?script_id={}", endpoint, script_id);

        let pages: Vec<OcrPageRecord> = self
            .http
            .get(&endpoint)
            .query(&[("script_id", script_id)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.api_error(&endpoint, e))?
            .json()
            .await
            .map_err(|e| self.api_error(&endpoint, e))?;

        Ok(pages)
    }

    /// 查找答卷已有的 compare-text 记录
    ///
    /// 查询失败只记录警告并视为不存在
    pub async fn find_compare_text(&self, script_id: i64) -> Option<Value> {
        let endpoint = self.endpoint("compare-text");

        let response = self
            .http
            .get(&endpoint)
            .query(&[("script_id", script_id)])
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let records: Vec<Value> = match response {
            Ok(r) => match r.json().await {
                Ok(records) => records,
                Err(e) => {
                    warn!("无法解析已有 compare-text 记录: {}", e);
                    return None;
                }
            },
            Err(e) => {
                warn!("无法查询已有 compare-text 记录: {}", e);
                return None;
            }
        };

        records.into_iter().next()
    }

    /// 新建 compare-text 记录
    ///
    /// # 参数
    /// - `script_id`: 答卷 ID
    /// - `mcq`: 序列化后的提取结果
    /// - `total_pages`: 参与提取的页数
    pub async fn save_compare_text(
        &self,
        script_id: i64,
        mcq: &Value,
        total_pages: usize,
    ) -> AppResult<Value> {
        let endpoint = self.endpoint("compare-text");
        info!("💾 保存脚本 {} 的提取结果...", script_id);

        let result: Value = self
            .http
            .post(&endpoint)
            .json(&create_payload(script_id, mcq, total_pages))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.api_error(&endpoint, e))?
            .json()
            .await
            .map_err(|e| self.api_error(&endpoint, e))?;

        let compare_text_id = result
            .get("compare_text_id")
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        info!("✅ 已保存，CompareText ID: {}", compare_text_id);
        Ok(result)
    }

    /// 更新已有 compare-text 记录的 mcq 字段
    pub async fn update_compare_text(&self, compare_text_id: &Value, mcq: &Value) -> AppResult<Value> {
        let endpoint = self.endpoint("compare-text");
        info!("💾 更新 CompareText 记录 {}...", compare_text_id);

        let result: Value = self
            .http
            .put(&endpoint)
            .json(&update_payload(compare_text_id, mcq))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.api_error(&endpoint, e))?
            .json()
            .await
            .map_err(|e| self.api_error(&endpoint, e))?;

        Ok(result)
    }

    /// 保存提取结果：已有记录则更新，否则新建
    ///
    /// # 返回
    /// 上游返回的 JSON
    pub async fn persist(&self, script_id: i64, mcq: &Value, total_pages: usize) -> AppResult<Value> {
        match self.find_compare_text(script_id).await {
            Some(existing) => {
                let endpoint = self.endpoint("compare-text");
                let id = existing
                    .get("compare_text_id")
                    .cloned()
                    .ok_or_else(|| ApiError::MissingField {
                        endpoint,
                        field: "compare_text_id".to_string(),
                    })?;
                self.update_compare_text(&id, mcq).await
            }
            None => self.save_compare_text(script_id, mcq, total_pages).await,
        }
    }

    /// 检查上游服务是否可用
    pub async fn health(&self) -> HealthStatus {
        let endpoint = self.endpoint("ocr");
        let response = self
            .http
            .get(&endpoint)
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => HealthStatus {
                status: "healthy".to_string(),
                upstream_api: "connected".to_string(),
                endpoints_available: vec!["ocr".to_string(), "compare-text".to_string()],
                details: None,
            },
            Ok(r) => HealthStatus {
                status: "unhealthy".to_string(),
                upstream_api: "error".to_string(),
                endpoints_available: Vec::new(),
                details: Some(format!("Status: {}", r.status().as_u16())),
            },
            Err(e) => HealthStatus {
                status: "unhealthy".to_string(),
                upstream_api: "disconnected".to_string(),
                endpoints_available: Vec::new(),
                details: Some(e.to_string()),
            },
        }
    }
}

/// 新建记录的请求体
pub fn create_payload(script_id: i64, mcq: &Value, total_pages: usize) -> Value {
    json!({
        "script_id": script_id,
        "vlmdesc": { "source": "MCQ processing", "pages": total_pages },
        "restructured": { "processed": true, "total_pages": total_pages },
        "final_corrected_text": format!("MCQ processing completed for {} pages", total_pages),
        "mcq": mcq,
    })
}

/// 更新记录的请求体
pub fn update_payload(compare_text_id: &Value, mcq: &Value) -> Value {
    json!({
        "compare_text_id": compare_text_id,
        "mcq": mcq,
    })
}
