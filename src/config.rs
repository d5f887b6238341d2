use crate::error::{AppError, AppResult, ConfigError, FileError};
use serde::Deserialize;
use std::path::Path;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 文档服务地址（提供 /ocr/ 与 /compare-text/）
    pub ocr_api_base_url: String,
    /// 同时处理的答卷数量
    pub max_concurrent_scripts: usize,
    /// 低于该置信度的题目需要人工复核
    pub low_confidence_threshold: f64,
    /// HTTP 请求超时（秒）
    pub http_timeout_secs: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 待复核题目写入的文件
    pub review_file: String,
    // --- LLM 配置 ---
    /// 是否对需要复核的题目调用 LLM 整理文本
    pub llm_refine_enabled: bool,
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ocr_api_base_url: "http://65.0.249.245:8000".to_string(),
            max_concurrent_scripts: 4,
            low_confidence_threshold: 0.6,
            http_timeout_secs: 30,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            review_file: "review.txt".to_string(),
            llm_refine_enabled: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
        }
    }
}

impl Config {
    /// 从环境变量读取配置，未设置的项使用默认值
    pub fn from_env() -> Self {
        Self::default().overlay_env()
    }

    /// 先读取 TOML 配置文件，再用环境变量覆盖
    ///
    /// # 参数
    /// - `path`: TOML 文件路径
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            AppError::File(FileError::TomlParseFailed {
                path: path.display().to_string(),
                source: e,
            })
        })?;
        let config = config.overlay_env();
        config.validate()?;
        Ok(config)
    }

    /// 校验配置值
    pub fn validate(&self) -> AppResult<()> {
        if !(0.0..=1.0).contains(&self.low_confidence_threshold) {
            return Err(ConfigError::InvalidValue {
                name: "low_confidence_threshold".to_string(),
                reason: format!("{} 不在 [0, 1] 范围内", self.low_confidence_threshold),
            }
            .into());
        }
        if self.max_concurrent_scripts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_concurrent_scripts".to_string(),
                reason: "必须大于 0".to_string(),
            }
            .into());
        }
        if self.llm_refine_enabled && self.llm_api_key.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "llm_api_key".to_string(),
                reason: "启用 LLM 整理时必须设置 LLM_API_KEY".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn overlay_env(self) -> Self {
        Self {
            ocr_api_base_url: std::env::var("OCR_API_BASE_URL").unwrap_or(self.ocr_api_base_url),
            max_concurrent_scripts: std::env::var("MAX_CONCURRENT_SCRIPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.max_concurrent_scripts),
            low_confidence_threshold: std::env::var("LOW_CONFIDENCE_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(self.low_confidence_threshold),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.http_timeout_secs),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(self.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
            review_file: std::env::var("REVIEW_FILE").unwrap_or(self.review_file),
            llm_refine_enabled: std::env::var("LLM_REFINE_ENABLED").ok().and_then(|v| v.parse().ok()).unwrap_or(self.llm_refine_enabled),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            low_confidence_threshold = 0.75
            review_file = "flagged.txt"
            "#,
        )
        .unwrap();

        assert_eq!(config.low_confidence_threshold, 0.75);
        assert_eq!(config.review_file, "flagged.txt");
        assert_eq!(config.max_concurrent_scripts, 4);
        assert!(!config.llm_refine_enabled);
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let config = Config {
            low_confidence_threshold: 1.5,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AppError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_validate_requires_key_when_refine_enabled() {
        let config = Config {
            llm_refine_enabled: true,
            llm_api_key: String::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }
}
