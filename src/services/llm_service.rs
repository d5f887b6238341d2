//! LLM 服务 - 业务能力层
//!
//! 只负责"整理题干与选项文字"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务
//!
//! ## 约束
//! - 只发送需要复核的题目
//! - 只接受题干与已有选项的文字；模型返回的任何作答字段都会被忽略
//! - 合并通过 [`McqRecord::with_restructured_text`] 完成，作答标签没有写入口

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::LlmError;
use crate::models::mcq::{ExtractionResult, McqRecord, OptionLabel, TokenUsage};

const MAX_ATTEMPTS: usize = 3;

const SYSTEM_MESSAGE: &str = "You clean up OCR text of multiple-choice questions taken from scanned student answer scripts. \
Fix OCR noise such as broken words, stray symbols and wrong spacing in the question text and option texts. \
Never answer the question, never evaluate or correct the student's answer, and never add or remove options.";

/// 模型返回的整理结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestructuredText {
    pub question_text: Option<String>,
    pub options: BTreeMap<OptionLabel, String>,
    /// 模型是否试图给出作答（会被忽略，仅用于日志）
    pub attempted_answer: bool,
}

#[derive(Debug, Deserialize)]
struct RawRestructured {
    #[serde(default)]
    question_text: Option<String>,
    #[serde(default)]
    options: BTreeMap<String, String>,
    #[serde(default)]
    selected: Option<serde_json::Value>,
    #[serde(default)]
    answer: Option<serde_json::Value>,
}

/// LLM 服务
///
/// 职责：
/// - 调用 LLM API 整理单道题的文字
/// - 统计 token 用量
/// - 不关心流程顺序
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// `(响应内容, token 用量)`
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<(String, TokenUsage)> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.0)
            .max_tokens(1024u32)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            LlmError::ApiCallFailed {
                model: self.model_name.clone(),
                message: e.to_string(),
            }
        })?;

        let usage = response
            .usage
            .as_ref()
            .map(|u| TokenUsage {
                prompt_tokens: u64::from(u.prompt_tokens),
                completion_tokens: u64::from(u.completion_tokens),
                total_tokens: u64::from(u.total_tokens),
            })
            .unwrap_or_default();

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        debug!("LLM API 调用成功, tokens: {}", usage.total_tokens);

        Ok((content.trim().to_string(), usage))
    }

    /// 整理单道题的文字（最多尝试 3 次）
    ///
    /// # 返回
    /// `(整理结果, 累计 token 用量)`；3 次都失败时整理结果为 `None`
    pub async fn restructure_record(&self, record: &McqRecord) -> (Option<RestructuredText>, TokenUsage) {
        let user_message = build_restructure_message(record);
        let mut usage = TokenUsage::default();

        for attempt in 1..=MAX_ATTEMPTS {
            match self.send_to_llm(&user_message, Some(SYSTEM_MESSAGE)).await {
                Ok((response, used)) => {
                    usage.add(used);
                    match parse_restructure_response(&response) {
                        Ok(parsed) => return (Some(parsed), usage),
                        Err(e) => warn!(
                            "第 {} 题 LLM 响应无法解析 (尝试 {}/{}): {}",
                            record.question_number, attempt, MAX_ATTEMPTS, e
                        ),
                    }
                }
                Err(e) => warn!(
                    "第 {} 题 LLM 调用失败 (尝试 {}/{}): {}",
                    record.question_number, attempt, MAX_ATTEMPTS, e
                ),
            }
        }

        (None, usage)
    }

    /// 整理所有需要复核的题目
    ///
    /// 返回累计 token 用量，同时写入 `result.token_usage`
    pub async fn restructure_flagged(&self, result: &mut ExtractionResult) -> TokenUsage {
        let mut total = TokenUsage::default();
        let flagged: Vec<usize> = result
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.ambiguous)
            .map(|(i, _)| i)
            .collect();

        if flagged.is_empty() {
            return total;
        }
        info!("🤖 使用 LLM 整理 {} 道待复核题目的文字...", flagged.len());

        for index in flagged {
            let record = &result.records[index];
            let (restructured, usage) = self.restructure_record(record).await;
            total.add(usage);

            if let Some(text) = restructured {
                if text.attempted_answer {
                    warn!("第 {} 题 LLM 返回了作答字段，已忽略", record.question_number);
                }
                let updated = record
                    .clone()
                    .with_restructured_text(text.question_text, &text.options);
                result.records[index] = updated;
            }
        }

        let mut accumulated = result.token_usage.unwrap_or_default();
        accumulated.add(total);
        result.token_usage = Some(accumulated);
        info!(
            "📊 TOKEN 用量 - 总计: {}, 提示: {}, 生成: {}",
            total.total_tokens, total.prompt_tokens, total.completion_tokens
        );

        total
    }
}

/// 构建整理请求
fn build_restructure_message(record: &McqRecord) -> String {
    let options: serde_json::Map<String, serde_json::Value> = record
        .options
        .iter()
        .map(|(label, text)| (label.to_string(), serde_json::Value::String(text.clone())))
        .collect();

    let payload = serde_json::json!({
        "question_number": record.question_number,
        "question_text": record.question_text,
        "options": options,
    });

    format!(
        r#"Clean up the OCR text of this multiple-choice question.

Input:
{}

Rules:
- Keep the meaning and wording; only repair OCR damage.
- Return only the option labels that appear in the input.
- Do not include any answer, selection, or correctness information.

Return only JSON of the form:
{{"question_text": "...", "options": {{"A": "...", "B": "..."}}}}"#,
        serde_json::to_string_pretty(&payload).unwrap_or_default()
    )
}

/// 解析整理请求的响应
///
/// 允许响应被 ```json 代码块包裹；选项键必须是 A–D。
pub fn parse_restructure_response(response: &str) -> Result<RestructuredText, LlmError> {
    let body = strip_code_fence(response);
    let start = body.find('{');
    let end = body.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &body[s..=e],
        _ => {
            return Err(LlmError::ResponseParseFailed {
                response: response.to_string(),
            })
        }
    };

    let raw: RawRestructured = serde_json::from_str(json).map_err(|_| LlmError::ResponseParseFailed {
        response: response.to_string(),
    })?;

    let mut options = BTreeMap::new();
    for (key, text) in raw.options {
        match OptionLabel::parse_answer(&key) {
            Some(label) => {
                options.insert(label, text);
            }
            None => debug!("忽略未知选项键: {}", key),
        }
    }

    Ok(RestructuredText {
        question_text: raw.question_text,
        options,
        attempted_answer: raw.selected.is_some() || raw.answer.is_some(),
    })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> McqRecord {
        let mut options = BTreeMap::new();
        options.insert(OptionLabel::A, "Pa ris".to_string());
        options.insert(OptionLabel::B, "R0me".to_string());
        McqRecord::new(3, "Capi tal of Fr ance?".to_string(), options, Some(OptionLabel::B), vec![1])
    }

    #[test]
    fn test_parse_plain_json() {
        let parsed = parse_restructure_response(
            r#"{"question_text": "Capital of France?", "options": {"A": "Paris", "B": "Rome"}}"#,
        )
        .unwrap();
        assert_eq!(parsed.question_text.as_deref(), Some("Capital of France?"));
        assert_eq!(parsed.options.get(&OptionLabel::B).map(String::as_str), Some("Rome"));
        assert!(!parsed.attempted_answer);
    }

    #[test]
    fn test_parse_fenced_json_and_unknown_keys() {
        let parsed = parse_restructure_response(
            "```json\n{\"question_text\": \"Q\", \"options\": {\"A\": \"x\", \"E\": \"y\", \"note\": \"z\"}}\n```",
        )
        .unwrap();
        assert_eq!(parsed.options.len(), 1);
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(matches!(
            parse_restructure_response("Sorry, I cannot help with that."),
            Err(LlmError::ResponseParseFailed { .. })
        ));
    }

    #[test]
    fn test_model_answer_is_ignored_when_merging() {
        let parsed = parse_restructure_response(
            r#"{"question_text": "Capital of France?", "options": {"A": "Paris", "B": "Rome"}, "selected": "A"}"#,
        )
        .unwrap();
        assert!(parsed.attempted_answer);

        let merged = record().with_restructured_text(parsed.question_text, &parsed.options);
        assert_eq!(merged.selected_label(), Some(OptionLabel::B));
        assert_eq!(merged.options.get(&OptionLabel::A).map(String::as_str), Some("Paris"));
    }

    #[test]
    fn test_request_never_mentions_selected_label() {
        let message = build_restructure_message(&record());
        assert!(message.contains("Capi tal of Fr ance?"));
        assert!(!message.contains("selected_label"));
    }

    /// 测试 LLM API 连接性
    ///
    /// 运行方式：
    /// ```bash
    /// LLM_API_KEY=... cargo test test_restructure_live -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_restructure_live() {
        let _ = tracing_subscriber::fmt::try_init();

        let service = LlmService::new(&Config::from_env());
        let (restructured, usage) = service.restructure_record(&record()).await;

        println!("整理结果: {:?}", restructured);
        println!("token 用量: {:?}", usage);
        assert!(restructured.is_some());
    }
}
