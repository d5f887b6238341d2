use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 上游 API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// OCR 数据校验错误
    #[error("OCR数据错误: {0}")]
    Ocr(#[from] OcrError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 上游 API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 无法连接到上游服务
    #[error("无法连接到 {base_url}，请确认文档服务已启动: {source}")]
    ConnectionFailed {
        base_url: String,
        #[source]
        source: reqwest::Error,
    },
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 返回非成功状态码
    #[error("API返回错误状态 ({endpoint}): HTTP {status}")]
    BadStatus { endpoint: String, status: u16 },
    /// 返回内容不是合法 JSON
    #[error("API返回的 JSON 无效 ({endpoint}): {source}")]
    InvalidJson {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 响应缺少必要字段
    #[error("API响应缺少字段 {field} ({endpoint})")]
    MissingField { endpoint: String, field: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// OCR 数据校验错误
#[derive(Debug, Error, PartialEq)]
pub enum OcrError {
    /// 所有页面都没有 OCR 数据
    #[error("所有页面都没有有效的 OCR 数据")]
    NoValidPages,
    /// 置信度超出范围
    #[error("第 {page} 页置信度无效: {value}")]
    InvalidConfidence { page: i64, value: f64 },
    /// 字段类型不符合预期
    #[error("第 {page} 页字段 {field} 类型无效")]
    InvalidField { page: i64, field: String },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 返回内容无法解析
    #[error("无法解析LLM响应: {response}")]
    ResponseParseFailed { response: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置值超出允许范围
    #[error("配置项 {name} 无效: {reason}")]
    InvalidValue { name: String, reason: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }
}

impl ApiError {
    /// 根据 reqwest 错误类型区分连接失败、状态码错误与其他请求错误
    pub fn from_reqwest(base_url: &str, endpoint: &str, err: reqwest::Error) -> Self {
        if err.is_connect() {
            ApiError::ConnectionFailed {
                base_url: base_url.to_string(),
                source: err,
            }
        } else if let Some(status) = err.status() {
            ApiError::BadStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            ApiError::InvalidJson {
                endpoint: endpoint.to_string(),
                source: err,
            }
        } else {
            ApiError::RequestFailed {
                endpoint: endpoint.to_string(),
                source: err,
            }
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ocr_error_converts_into_app_error() {
        let err: AppError = OcrError::NoValidPages.into();
        assert!(matches!(err, AppError::Ocr(OcrError::NoValidPages)));
        assert_eq!(err.to_string(), "OCR数据错误: 所有页面都没有有效的 OCR 数据");
    }

    #[test]
    fn test_invalid_confidence_message_names_page() {
        let err = OcrError::InvalidConfidence {
            page: 3,
            value: 140.0,
        };
        assert_eq!(err.to_string(), "第 3 页置信度无效: 140");
    }
}
