use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 选项标签（A–D）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptionLabel {
    A,
    B,
    C,
    D,
}

impl OptionLabel {
    pub const ALL: [OptionLabel; 4] = [OptionLabel::A, OptionLabel::B, OptionLabel::C, OptionLabel::D];

    /// 从单个字母解析（大小写均可）
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(OptionLabel::A),
            'B' => Some(OptionLabel::B),
            'C' => Some(OptionLabel::C),
            'D' => Some(OptionLabel::D),
            _ => None,
        }
    }

    /// 从圈号字母解析（Ⓐ–Ⓓ / ⓐ–ⓓ）
    pub fn from_circled(c: char) -> Option<Self> {
        match c {
            'Ⓐ' | 'ⓐ' => Some(OptionLabel::A),
            'Ⓑ' | 'ⓑ' => Some(OptionLabel::B),
            'Ⓒ' | 'ⓒ' => Some(OptionLabel::C),
            'Ⓓ' | 'ⓓ' => Some(OptionLabel::D),
            _ => None,
        }
    }

    /// 严格解析学生作答值
    ///
    /// 只接受"一个字母"的写法，如 `B`、`(b)`、`[C].`、`Ⓓ`；
    /// `B or C`、`E`、`2` 之类一律返回 `None`，由调用方保留原文并标记复核。
    pub fn parse_answer(raw: &str) -> Option<Self> {
        let core: String = raw
            .trim()
            .trim_matches(|c: char| matches!(c, '(' | ')' | '[' | ']' | '.' | ':' | '-' | '"' | '\''))
            .trim()
            .to_string();
        let mut chars = core.chars();
        let first = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Self::from_char(first).or_else(|| Self::from_circled(first))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OptionLabel::A => "A",
            OptionLabel::B => "B",
            OptionLabel::C => "C",
            OptionLabel::D => "D",
        }
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 需要人工复核的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    /// OCR 置信度过低
    LowConfidence,
    /// 出现多个互相矛盾的作答标记
    MultipleMarks,
    /// 作答内容不是 A–D 中的单个字母
    UnrecognizedAnswer,
    /// 作答字母对应的选项未识别到
    AnswerNotInOptions,
    /// 选项不足四个
    MissingOptions,
    /// 题号重复
    DuplicateQuestionNumber,
    /// 题号未递增
    OutOfSequence,
}

impl ReviewReason {
    pub fn description(self) -> &'static str {
        match self {
            ReviewReason::LowConfidence => "OCR置信度过低",
            ReviewReason::MultipleMarks => "存在多个作答标记",
            ReviewReason::UnrecognizedAnswer => "作答内容无法识别",
            ReviewReason::AnswerNotInOptions => "作答选项未在题目中识别到",
            ReviewReason::MissingOptions => "选项不完整",
            ReviewReason::DuplicateQuestionNumber => "题号重复",
            ReviewReason::OutOfSequence => "题号顺序异常",
        }
    }
}

impl fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// 一道选择题的提取结果
///
/// `selected_label` 没有任何写入口：构造时确定后，后续阶段只能读取。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct McqRecord {
    pub question_number: u32,
    pub question_text: String,
    pub options: BTreeMap<OptionLabel, String>,
    selected_label: Option<OptionLabel>,
    /// 学生作答原文（来自 "Ans:" 行），原样保留
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_answer: Option<String>,
    /// 检测到的全部作答标记（多于一个时需复核）
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidate_labels: Vec<OptionLabel>,
    pub confidence: f64,
    pub ambiguous: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub review_reasons: Vec<ReviewReason>,
    pub pages: Vec<i64>,
}

impl McqRecord {
    pub(crate) fn new(
        question_number: u32,
        question_text: String,
        options: BTreeMap<OptionLabel, String>,
        selected_label: Option<OptionLabel>,
        pages: Vec<i64>,
    ) -> Self {
        Self {
            question_number,
            question_text,
            options,
            selected_label,
            raw_answer: None,
            candidate_labels: Vec::new(),
            confidence: 1.0,
            ambiguous: false,
            review_reasons: Vec::new(),
            pages,
        }
    }

    /// 学生选择的选项（未检测到时为 `None`）
    pub fn selected_label(&self) -> Option<OptionLabel> {
        self.selected_label
    }

    pub fn is_answered(&self) -> bool {
        self.selected_label.is_some()
    }

    /// 添加复核原因（去重）并同步 ambiguous 标记
    pub fn flag(&mut self, reason: ReviewReason) {
        if !self.review_reasons.contains(&reason) {
            self.review_reasons.push(reason);
        }
        self.ambiguous = true;
    }

    /// 用整理后的文本替换题干与选项文本
    ///
    /// 只替换已存在标签的选项文本；作答、置信度与复核标记保持不变。
    pub fn with_restructured_text(
        mut self,
        question_text: Option<String>,
        options: &BTreeMap<OptionLabel, String>,
    ) -> Self {
        if let Some(text) = question_text {
            if !text.trim().is_empty() {
                self.question_text = text.trim().to_string();
            }
        }
        for (label, text) in options {
            if text.trim().is_empty() {
                continue;
            }
            if let Some(existing) = self.options.get_mut(label) {
                *existing = text.trim().to_string();
            }
        }
        self
    }
}

/// LLM 调用的 token 用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// 提取统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    pub total_questions: usize,
    pub answered: usize,
    pub unanswered: usize,
    pub flagged: usize,
    /// 被判定为非选择题而跳过的题目片段数
    pub skipped_spans: usize,
}

/// 一份答卷的提取结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub records: Vec<McqRecord>,
    pub summary: ExtractionSummary,
    pub flagged_questions: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

impl ExtractionResult {
    /// 根据记录重新计算统计与待复核题号
    pub fn from_records(records: Vec<McqRecord>, skipped_spans: usize) -> Self {
        let mut result = Self {
            records,
            summary: ExtractionSummary::default(),
            flagged_questions: Vec::new(),
            token_usage: None,
        };
        result.summary.skipped_spans = skipped_spans;
        result.refresh_summary();
        result
    }

    pub fn refresh_summary(&mut self) {
        let answered = self.records.iter().filter(|r| r.is_answered()).count();
        self.flagged_questions = self
            .records
            .iter()
            .filter(|r| r.ambiguous)
            .map(|r| r.question_number)
            .collect();
        self.summary = ExtractionSummary {
            total_questions: self.records.len(),
            answered,
            unanswered: self.records.len() - answered,
            flagged: self.flagged_questions.len(),
            skipped_spans: self.summary.skipped_spans,
        };
    }

    pub fn record(&self, question_number: u32) -> Option<&McqRecord> {
        self.records.iter().find(|r| r.question_number == question_number)
    }
}
