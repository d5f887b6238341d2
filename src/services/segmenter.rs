//! 选择题切分服务 - 业务能力层
//!
//! 按题号与选项标记把行序列切成一道道题目片段。
//! 只识别结构与可见的作答标记（勾选、圈号），不解释作答含义。

use crate::models::mcq::{OptionLabel, ReviewReason};
use crate::models::ocr::TokenStream;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use tracing::debug;

const TICK: &str = r"(?:[✓✔☑☒]|\[\s*[xX✓✔]\s*\]|\(\s*[xX✓✔]\s*\))";

/// 可见作答标记的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkSource {
    /// "Ans: B" 之类的作答行
    AnswerLine,
    /// 选项旁的勾选符号
    Tick,
    /// 圈出的选项字母
    Circled,
}

/// 片段中的一个作答标记
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pub label: OptionLabel,
    pub source: MarkSource,
    /// 标记所在行在 [`TokenStream`] 中的下标
    pub line: usize,
}

/// 作答行原文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerLine {
    pub raw: String,
    pub line: usize,
}

/// 一道题的片段
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionSpan {
    pub number: u32,
    pub question_text: String,
    pub options: BTreeMap<OptionLabel, String>,
    pub marks: Vec<Mark>,
    pub answer_lines: Vec<AnswerLine>,
    /// 片段包含的所有行下标
    pub lines: Vec<usize>,
    pub pages: Vec<i64>,
    /// 切分阶段发现的问题（题号重复、顺序异常）
    pub flags: Vec<ReviewReason>,
}

impl QuestionSpan {
    fn new(number: u32) -> Self {
        Self {
            number,
            question_text: String::new(),
            options: BTreeMap::new(),
            marks: Vec::new(),
            answer_lines: Vec::new(),
            lines: Vec::new(),
            pages: Vec::new(),
            flags: Vec::new(),
        }
    }

    /// 是否具备选择题特征
    pub fn looks_like_mcq(&self) -> bool {
        !self.options.is_empty() || !self.answer_lines.is_empty() || !self.marks.is_empty()
    }

    fn flag(&mut self, reason: ReviewReason) {
        if !self.flags.contains(&reason) {
            self.flags.push(reason);
        }
    }
}

/// 切分结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    pub spans: Vec<QuestionSpan>,
    /// 未生成题目的片段数（非选择题或重复题号）
    pub skipped_spans: usize,
    /// 第一道题之前被忽略的行数
    pub preamble_lines: usize,
}

/// 一行中解析出的选项
#[derive(Debug, Clone, PartialEq)]
struct ParsedOption {
    label: OptionLabel,
    text: String,
    ticked: bool,
    circled: bool,
}

/// 构建中的片段（记录圈号选项以便收尾时判断是否为印刷样式）
struct SpanBuilder {
    span: QuestionSpan,
    last_option: Option<OptionLabel>,
    circled_options: Vec<(OptionLabel, usize)>,
    plain_options: usize,
}

impl SpanBuilder {
    fn new(number: u32) -> Self {
        Self {
            span: QuestionSpan::new(number),
            last_option: None,
            circled_options: Vec::new(),
            plain_options: 0,
        }
    }

    fn touch(&mut self, index: usize, page: i64) {
        self.span.lines.push(index);
        if !self.span.pages.contains(&page) {
            self.span.pages.push(page);
        }
    }

    fn append_question_text(&mut self, text: &str) {
        append_text(&mut self.span.question_text, text);
    }

    fn add_option(&mut self, option: ParsedOption, index: usize) {
        if self.span.options.contains_key(&option.label) {
            // 同一标签重复出现时当作上一段文字的续行
            let text = format!("{} {}", option.label, option.text);
            self.append_continuation(text.trim());
            return;
        }
        if option.ticked {
            self.span.marks.push(Mark {
                label: option.label,
                source: MarkSource::Tick,
                line: index,
            });
        }
        if option.circled {
            self.circled_options.push((option.label, index));
        } else {
            self.plain_options += 1;
        }
        self.span.options.insert(option.label, option.text);
        self.last_option = Some(option.label);
    }

    fn append_continuation(&mut self, text: &str) {
        match self.last_option.and_then(|label| self.span.options.get_mut(&label)) {
            Some(option_text) => append_text(option_text, text),
            None => append_text(&mut self.span.question_text, text),
        }
    }

    fn finish(mut self) -> QuestionSpan {
        // 全部选项都用圈号字母时视为印刷样式，只有与普通标记混用时才算作答
        if self.plain_options > 0 {
            for (label, line) in self.circled_options {
                self.span.marks.push(Mark {
                    label,
                    source: MarkSource::Circled,
                    line,
                });
            }
        }
        self.span
    }
}

fn append_text(target: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}

/// 选择题切分器
pub struct McqSegmenter {
    question_re: Regex,
    prefixed_question_re: Regex,
    option_marker_re: Regex,
    tick_re: Regex,
    answer_re: Regex,
    inline_answer_re: Regex,
    loose_circled_re: Regex,
    circled_re: Regex,
    footer_re: Regex,
}

impl McqSegmenter {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            // 1.  1)  (1)  12:  3-
            // 题干以数字开头时，题号后必须有空白或右括号（排除 3.14 之类）
            question_re: Regex::new(
                r"^\(?(\d{1,3})(?:\s*[.):]\s+(?P<a>.*)|\s*\)(?P<b>.*)|\s*[.:](?P<c>[^\d\s].*)|\s*-\s*(?P<d>[^\d\s].*)|\s*[.):\-]\s*)$",
            )?,
            // Q1  Q.1  Q 1)  Question 3:  Qn 4.
            prefixed_question_re: Regex::new(
                r"^(?i:q(?:uestion|ues|n)?)\s*[.:#-]?\s*(\d{1,3})(?:\s*[.):\-]\s+(?P<a>.*)|\s*[.):\-](?P<b>[^\d\s].*)?|\s+(?P<c>[^\d\s].*)|\s*)$",
            )?,
            option_marker_re: Regex::new(&format!(
                r"(?:(?P<tick>{TICK})\s*)?(?:\((?P<l1>[A-Da-d])\)|\[(?P<l2>[A-Da-d])\]|(?P<l3>[A-D])\s*[.):]|(?P<l4>[a-d])[.)]|(?P<circ>[ⒶⒷⒸⒹⓐⓑⓒⓓ]))"
            ))?,
            tick_re: Regex::new(&format!(r"\s*{TICK}\s*"))?,
            answer_re: Regex::new(
                r"^(?i:(?:student'?s?\s+)?ans(?:wer)?)(?:\s*[.:\-=>]+\s*(?P<v1>.*)|\s+(?P<v2>\S{1,3}))$",
            )?,
            inline_answer_re: Regex::new(r"\s*\b(?i:ans(?:wer)?)\s*[:=\-]\s*(?P<value>\S.{0,10}?)\s*$")?,
            loose_circled_re: Regex::new(r"^[ⒶⒷⒸⒹⓐⓑⓒⓓ]$")?,
            circled_re: Regex::new(r"[ⒶⒷⒸⒹⓐⓑⓒⓓ]")?,
            footer_re: Regex::new(r"^(?i:page)\s*\d+(?:\s*(?i:of)\s*\d+)?$")?,
        })
    }

    /// 把行序列切分成题目片段
    ///
    /// # 参数
    /// - `stream`: 规范化后的行序列
    ///
    /// # 返回
    /// 题目片段（已过滤非选择题、处理重复题号并标记顺序异常）
    pub fn segment(&self, stream: &TokenStream) -> Segmentation {
        let mut raw_spans = Vec::new();
        let mut current: Option<SpanBuilder> = None;
        let mut preamble_lines = 0;

        for (index, line) in stream.lines.iter().enumerate() {
            let text = line.text.as_str();

            if self.footer_re.is_match(text) {
                continue;
            }

            if let Some((number, rest)) = self.parse_question_start(text) {
                if let Some(done) = current.take() {
                    raw_spans.push(done.finish());
                }
                let mut builder = SpanBuilder::new(number);
                builder.touch(index, line.page);
                self.absorb_question_line(&mut builder, &rest, index);
                current = Some(builder);
                continue;
            }

            let Some(builder) = current.as_mut() else {
                preamble_lines += 1;
                continue;
            };
            builder.touch(index, line.page);

            if let Some(raw) = self.parse_answer_line(text) {
                if !raw.is_empty() {
                    builder.span.answer_lines.push(AnswerLine { raw, line: index });
                }
                continue;
            }

            if self.loose_circled_re.is_match(text) {
                if let Some(label) = text.chars().next().and_then(OptionLabel::from_circled) {
                    builder.span.marks.push(Mark {
                        label,
                        source: MarkSource::Circled,
                        line: index,
                    });
                }
                continue;
            }

            let (body, inline_answer) = self.split_inline_answer(text);
            if let Some(raw) = inline_answer {
                builder.span.answer_lines.push(AnswerLine { raw, line: index });
            }

            match self.split_options(&body, true) {
                Some((_, options)) => {
                    for option in options {
                        builder.add_option(option, index);
                    }
                }
                None => {
                    self.mark_circled_in(builder, &body, index);
                    builder.append_continuation(&body);
                }
            }
        }

        if let Some(done) = current.take() {
            raw_spans.push(done.finish());
        }

        let mut segmentation = Self::reconcile(raw_spans);
        segmentation.preamble_lines = preamble_lines;
        debug!(
            "切分完成: {} 道题, 跳过 {} 个片段, 忽略 {} 行前言",
            segmentation.spans.len(),
            segmentation.skipped_spans,
            preamble_lines
        );
        segmentation
    }

    /// 过滤非选择题片段，处理重复题号，标记顺序异常
    fn reconcile(raw_spans: Vec<QuestionSpan>) -> Segmentation {
        let mut spans: Vec<QuestionSpan> = Vec::with_capacity(raw_spans.len());
        let mut skipped_spans = 0;
        let mut highest: Option<u32> = None;

        for mut span in raw_spans {
            if !span.looks_like_mcq() {
                skipped_spans += 1;
                continue;
            }

            if let Some(kept) = spans.iter_mut().find(|s| s.number == span.number) {
                kept.flag(ReviewReason::DuplicateQuestionNumber);
                skipped_spans += 1;
                continue;
            }

            if matches!(highest, Some(h) if span.number <= h) {
                span.flag(ReviewReason::OutOfSequence);
            }
            highest = Some(highest.map_or(span.number, |h| h.max(span.number)));
            spans.push(span);
        }

        Segmentation {
            spans,
            skipped_spans,
            preamble_lines: 0,
        }
    }

    /// 识别题目起始行，返回题号与剩余文本
    fn parse_question_start(&self, text: &str) -> Option<(u32, String)> {
        let caps = self
            .prefixed_question_re
            .captures(text)
            .or_else(|| self.question_re.captures(text))?;
        let number: u32 = caps.get(1)?.as_str().parse().ok()?;
        if number == 0 {
            return None;
        }
        let rest = ["a", "b", "c", "d"]
            .iter()
            .find_map(|name| caps.name(name))
            .map(|m| m.as_str().trim())
            .unwrap_or_default();
        Some((number, rest.to_string()))
    }

    /// 处理题目起始行的剩余部分：可能同时带有行内选项与作答
    fn absorb_question_line(&self, builder: &mut SpanBuilder, rest: &str, index: usize) {
        let (body, inline_answer) = self.split_inline_answer(rest);
        if let Some(raw) = inline_answer {
            builder.span.answer_lines.push(AnswerLine { raw, line: index });
        }

        match self.split_options(&body, false) {
            Some((stem, options)) => {
                self.mark_circled_in(builder, &stem, index);
                builder.append_question_text(&stem);
                for option in options {
                    builder.add_option(option, index);
                }
            }
            None => {
                self.mark_circled_in(builder, &body, index);
                builder.append_question_text(&body);
            }
        }
    }

    /// 题干或续行中圈出的字母（如 "I choose Ⓑ"）记为圈选
    fn mark_circled_in(&self, builder: &mut SpanBuilder, text: &str, index: usize) {
        for m in self.circled_re.find_iter(text) {
            if let Some(label) = m.as_str().chars().next().and_then(OptionLabel::from_circled) {
                builder.span.marks.push(Mark {
                    label,
                    source: MarkSource::Circled,
                    line: index,
                });
            }
        }
    }

    /// 识别独立的作答行，返回作答原文
    fn parse_answer_line(&self, text: &str) -> Option<String> {
        let caps = self.answer_re.captures(text)?;
        let value = caps
            .name("v1")
            .or_else(|| caps.name("v2"))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        Some(value)
    }

    /// 拆出行尾的 "Ans: X"
    ///
    /// 值里出现两个以上选项标记时（"the correct answer: A. 1 B. 2"）不算作答
    fn split_inline_answer(&self, text: &str) -> (String, Option<String>) {
        let caps = self.inline_answer_re.captures(text).filter(|caps| {
            caps.name("value")
                .map_or(true, |v| self.option_marker_re.find_iter(v.as_str()).count() < 2)
        });
        match caps {
            Some(caps) => {
                let start = caps.get(0).map(|m| m.start()).unwrap_or(text.len());
                let value = caps.name("value").map(|m| m.as_str().trim().to_string());
                (text[..start].trim().to_string(), value)
            }
            None => (text.to_string(), None),
        }
    }

    /// 拆分一行中的选项
    ///
    /// # 参数
    /// - `text`: 行文本
    /// - `line_start`: 为 true 时要求选项标记位于行首；否则要求行内出现从 A 开始的连续标记
    ///
    /// # 返回
    /// `(选项前的文本, 选项列表)`；不构成选项时返回 `None`
    fn split_options(&self, text: &str, line_start: bool) -> Option<(String, Vec<ParsedOption>)> {
        let markers: Vec<(usize, usize, OptionLabel, bool, bool)> = self
            .option_marker_re
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let preceded_ok = text[..whole.start()]
                    .chars()
                    .next_back()
                    .map_or(true, char::is_whitespace);
                if !preceded_ok {
                    return None;
                }
                let (label, circled) = marker_label(&caps)?;
                Some((whole.start(), whole.end(), label, caps.name("tick").is_some(), circled))
            })
            .collect();

        let first = if line_start {
            match markers.first() {
                Some(m) if m.0 == 0 => 0,
                _ => return None,
            }
        } else {
            markers.iter().enumerate().position(|(i, m)| {
                m.2 == OptionLabel::A
                    && markers
                        .get(i + 1)
                        .map_or(false, |next| next_label(m.2) == Some(next.2))
            })?
        };

        let mut sequence = vec![markers[first]];
        for marker in &markers[first + 1..] {
            let last = sequence[sequence.len() - 1].2;
            if next_label(last) == Some(marker.2) {
                sequence.push(*marker);
            }
        }

        let stem = text[..sequence[0].0].trim().to_string();
        let mut options = Vec::with_capacity(sequence.len());
        for (i, &(_, end, label, ticked, circled)) in sequence.iter().enumerate() {
            let next = sequence.get(i + 1);
            let stop = next.map_or(text.len(), |next| next.0);
            let raw = &text[end..stop];
            // 行中标记前的勾选属于上一个选项（与 "B. Blue ✓" 同样是尾随勾选）
            let ticked = (i == 0 && ticked) || next.map_or(false, |next| next.3);
            let trailing_tick = self.tick_re.is_match(raw);
            let cleaned = self.tick_re.replace_all(raw, " ");
            options.push(ParsedOption {
                label,
                text: cleaned.split_whitespace().collect::<Vec<_>>().join(" "),
                ticked: ticked || trailing_tick,
                circled,
            });
        }

        Some((stem, options))
    }
}

fn marker_label(caps: &Captures<'_>) -> Option<(OptionLabel, bool)> {
    if let Some(m) = caps.name("circ") {
        return m.as_str().chars().next().and_then(OptionLabel::from_circled).map(|l| (l, true));
    }
    ["l1", "l2", "l3", "l4"]
        .iter()
        .find_map(|name| caps.name(name))
        .and_then(|m| m.as_str().chars().next())
        .and_then(OptionLabel::from_char)
        .map(|l| (l, false))
}

fn next_label(label: OptionLabel) -> Option<OptionLabel> {
    match label {
        OptionLabel::A => Some(OptionLabel::B),
        OptionLabel::B => Some(OptionLabel::C),
        OptionLabel::C => Some(OptionLabel::D),
        OptionLabel::D => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ocr::NormalizedLine;
    use crate::services::answer_extractor::{build_record, extract_answer};

    fn stream(lines: &[&str]) -> TokenStream {
        TokenStream {
            lines: lines
                .iter()
                .enumerate()
                .map(|(i, text)| NormalizedLine {
                    page: 1,
                    line_no: i,
                    text: text.to_string(),
                    confidence: None,
                    tokens: Vec::new(),
                    bbox: None,
                })
                .collect(),
        }
    }

    fn segment(lines: &[&str]) -> Segmentation {
        McqSegmenter::new().unwrap().segment(&stream(lines))
    }

    #[test]
    fn test_basic_question_with_option_lines() {
        let seg = segment(&[
            "Section A - Multiple choice",
            "1. What is the capital of France?",
            "A. Berlin",
            "B. Paris",
            "C. Rome",
            "D. Madrid",
            "Ans: B",
        ]);

        assert_eq!(seg.preamble_lines, 1);
        assert_eq!(seg.spans.len(), 1);
        let span = &seg.spans[0];
        assert_eq!(span.number, 1);
        assert_eq!(span.question_text, "What is the capital of France?");
        assert_eq!(span.options.len(), 4);
        assert_eq!(span.options[&OptionLabel::B], "Paris");
        assert_eq!(span.answer_lines, vec![AnswerLine { raw: "B".to_string(), line: 6 }]);
        assert_eq!(span.lines, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_inline_options_on_question_line() {
        let seg = segment(&["Q2) Which is a mammal? A. Shark B. Whale C. Trout D. Eel"]);

        let span = &seg.spans[0];
        assert_eq!(span.number, 2);
        assert_eq!(span.question_text, "Which is a mammal?");
        assert_eq!(span.options[&OptionLabel::A], "Shark");
        assert_eq!(span.options[&OptionLabel::D], "Eel");
    }

    #[test]
    fn test_single_letter_in_stem_is_not_split() {
        let seg = segment(&["3. Which food has Vitamin C. in it?", "(a) Orange (b) Bread", "(c) Rice (d) Salt"]);

        let span = &seg.spans[0];
        assert_eq!(span.question_text, "Which food has Vitamin C. in it?");
        assert_eq!(span.options.len(), 4);
        assert_eq!(span.options[&OptionLabel::C], "Rice");
    }

    #[test]
    fn test_tick_marks_detected_and_stripped() {
        let seg = segment(&["4. Pick one", "A. Red", "B. Blue ✓", "[x] C. Green", "D. Pink"]);

        let span = &seg.spans[0];
        assert_eq!(span.options[&OptionLabel::B], "Blue");
        assert_eq!(span.options[&OptionLabel::C], "Green");
        let labels: Vec<OptionLabel> = span.marks.iter().map(|m| m.label).collect();
        assert_eq!(labels, vec![OptionLabel::B, OptionLabel::C]);
        assert!(span.marks.iter().all(|m| m.source == MarkSource::Tick));
    }

    #[test]
    fn test_circled_marker_mixed_with_plain_is_a_mark() {
        let seg = segment(&["5. Largest planet?", "A. Mars", "Ⓑ Jupiter", "C. Venus", "D. Earth"]);
        let span = &seg.spans[0];
        assert_eq!(span.marks.len(), 1);
        assert_eq!(span.marks[0].label, OptionLabel::B);
        assert_eq!(span.marks[0].source, MarkSource::Circled);
    }

    #[test]
    fn test_all_circled_markers_are_print_style() {
        let seg = segment(&["6. Smallest?", "Ⓐ 1", "Ⓑ 2", "Ⓒ 3", "Ⓓ 4"]);
        let span = &seg.spans[0];
        assert_eq!(span.options.len(), 4);
        assert!(span.marks.is_empty());
    }

    #[test]
    fn test_continuation_lines() {
        let seg = segment(&[
            "7. Read the passage and",
            "choose the best title.",
            "A. The sea",
            "and its creatures",
            "B. Mountains",
        ]);
        let span = &seg.spans[0];
        assert_eq!(span.question_text, "Read the passage and choose the best title.");
        assert_eq!(span.options[&OptionLabel::A], "The sea and its creatures");
    }

    #[test]
    fn test_non_mcq_span_skipped() {
        let seg = segment(&["1. Explain photosynthesis.", "Plants use light.", "2. Pick", "A. x", "B. y"]);
        assert_eq!(seg.skipped_spans, 1);
        assert_eq!(seg.spans.len(), 1);
        assert_eq!(seg.spans[0].number, 2);
    }

    #[test]
    fn test_duplicate_and_out_of_sequence_numbers() {
        let seg = segment(&[
            "1. First", "A. a1", "B. b1",
            "3. Third", "A. a3", "B. b3",
            "2. Second", "A. a2", "B. b2",
            "3. Third again", "A. x", "B. y",
        ]);

        let numbers: Vec<u32> = seg.spans.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1, 3, 2]);
        assert_eq!(seg.skipped_spans, 1);
        assert_eq!(seg.spans[1].flags, vec![ReviewReason::DuplicateQuestionNumber]);
        assert_eq!(seg.spans[1].options[&OptionLabel::A], "a3");
        assert_eq!(seg.spans[2].flags, vec![ReviewReason::OutOfSequence]);
    }

    #[test]
    fn test_answer_line_variants() {
        let segmenter = McqSegmenter::new().unwrap();
        assert_eq!(segmenter.parse_answer_line("Ans: (c)"), Some("(c)".to_string()));
        assert_eq!(segmenter.parse_answer_line("Answer - B or C"), Some("B or C".to_string()));
        assert_eq!(segmenter.parse_answer_line("ANS D"), Some("D".to_string()));
        assert_eq!(segmenter.parse_answer_line("Student answer: A"), Some("A".to_string()));
        assert_eq!(segmenter.parse_answer_line("Answer the following questions"), None);
    }

    #[test]
    fn test_inline_answer_on_option_line() {
        let seg = segment(&["8. Two plus two?", "A. 3 B. 4 C. 5 D. 6 Ans: b"]);
        let span = &seg.spans[0];
        assert_eq!(span.options[&OptionLabel::D], "6");
        assert_eq!(span.answer_lines[0].raw, "b");
    }

    #[test]
    fn test_question_number_forms() {
        let segmenter = McqSegmenter::new().unwrap();
        assert_eq!(segmenter.parse_question_start("Q.12 Name it"), Some((12, "Name it".to_string())));
        assert_eq!(segmenter.parse_question_start("Question 3: Why"), Some((3, "Why".to_string())));
        assert_eq!(segmenter.parse_question_start("(4) What"), Some((4, "What".to_string())));
        assert_eq!(segmenter.parse_question_start("5.Which"), Some((5, "Which".to_string())));
        assert_eq!(segmenter.parse_question_start("3.14 is pi"), None);
        assert_eq!(segmenter.parse_question_start("2 marks"), None);
        assert_eq!(segmenter.parse_question_start("0. zero"), None);
    }

    #[test]
    fn test_digit_led_stems_and_dash_numbers() {
        let segmenter = McqSegmenter::new().unwrap();
        assert_eq!(
            segmenter.parse_question_start("1. 12 x 4 = ?"),
            Some((1, "12 x 4 = ?".to_string()))
        );
        assert_eq!(segmenter.parse_question_start("Q2. 7 + 8 = ?"), Some((2, "7 + 8 = ?".to_string())));
        assert_eq!(segmenter.parse_question_start("3- Which planet"), Some((3, "Which planet".to_string())));
        assert_eq!(segmenter.parse_question_start("1.5 kg of rice"), None);
        assert_eq!(segmenter.parse_question_start("2 - 1 = 1"), None);

        let seg = segment(&["1. 12 x 4 = ?", "A. 46", "B. 48", "C. 50", "D. 52", "Ans: B"]);
        assert_eq!(seg.spans.len(), 1);
        assert_eq!(seg.spans[0].question_text, "12 x 4 = ?");
        assert_eq!(seg.spans[0].options.len(), 4);
        assert_eq!(seg.spans[0].answer_lines[0].raw, "B");
    }

    #[test]
    fn test_tick_between_inline_options_belongs_to_preceding_option() {
        let seg = segment(&["1. Colour of the sky?", "A. Blue ✓ B. Red C. Green D. Pink"]);
        let span = &seg.spans[0];
        assert_eq!(span.options[&OptionLabel::A], "Blue");
        assert_eq!(span.options[&OptionLabel::B], "Red");
        let labels: Vec<OptionLabel> = span.marks.iter().map(|m| m.label).collect();
        assert_eq!(labels, vec![OptionLabel::A]);

        let record = build_record(span.clone(), extract_answer(span));
        assert_eq!(record.selected_label(), Some(OptionLabel::A));
    }

    #[test]
    fn test_circled_letter_in_continuation_is_a_mark() {
        let seg = segment(&["1. Pick", "A. x", "B. y", "C. z", "D. w", "I choose Ⓑ"]);
        let span = &seg.spans[0];
        assert_eq!(span.marks.len(), 1);
        assert_eq!(span.marks[0].label, OptionLabel::B);
        assert_eq!(span.marks[0].source, MarkSource::Circled);
    }

    #[test]
    fn test_answer_word_in_stem_before_inline_options() {
        let seg = segment(&["1. Choose the answer: A. 1 B. 2"]);
        let span = &seg.spans[0];
        assert_eq!(span.question_text, "Choose the answer:");
        assert_eq!(span.options.len(), 2);
        assert!(span.answer_lines.is_empty());
    }

    #[test]
    fn test_footer_lines_ignored() {
        let seg = segment(&["1. Pick", "A. x", "Page 2 of 4", "B. y"]);
        assert_eq!(seg.spans[0].options[&OptionLabel::A], "x");
        assert_eq!(seg.spans[0].lines, vec![0, 1, 3]);
    }
}
