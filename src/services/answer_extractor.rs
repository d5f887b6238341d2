//! 作答提取服务 - 业务能力层
//!
//! 在单个题目片段内找出学生选择的选项。
//! 只读取学生写下/标出的内容，不判断对错，也不在多个标记之间猜测。

use crate::models::mcq::{McqRecord, OptionLabel, ReviewReason};
use crate::services::segmenter::{MarkSource, QuestionSpan};

/// 单道题的作答证据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerEvidence {
    pub selected: Option<OptionLabel>,
    /// 所有检测到的不同标签（按出现顺序）
    pub candidates: Vec<OptionLabel>,
    /// 作答行原文；多行时以 " | " 连接
    pub raw_answer: Option<String>,
    /// 携带作答证据的行下标
    pub evidence_lines: Vec<usize>,
    pub reasons: Vec<ReviewReason>,
}

/// 从片段中提取作答
pub fn extract_answer(span: &QuestionSpan) -> AnswerEvidence {
    let mut evidence = AnswerEvidence::default();
    let mut unrecognized = false;

    for mark in &span.marks {
        push_candidate(&mut evidence, mark.label, mark.line);
    }

    for answer in &span.answer_lines {
        match OptionLabel::parse_answer(&answer.raw) {
            Some(label) => push_candidate(&mut evidence, label, answer.line),
            None => {
                unrecognized = true;
                if !evidence.evidence_lines.contains(&answer.line) {
                    evidence.evidence_lines.push(answer.line);
                }
            }
        }
    }

    if !span.answer_lines.is_empty() {
        let raws: Vec<&str> = span.answer_lines.iter().map(|a| a.raw.as_str()).collect();
        evidence.raw_answer = Some(raws.join(" | "));
    }

    if unrecognized {
        evidence.reasons.push(ReviewReason::UnrecognizedAnswer);
    } else if evidence.candidates.len() > 1 {
        evidence.reasons.push(ReviewReason::MultipleMarks);
    } else if let Some(&label) = evidence.candidates.first() {
        evidence.selected = Some(label);
        if !span.options.contains_key(&label) {
            evidence.reasons.push(ReviewReason::AnswerNotInOptions);
        }
    }

    evidence
}

fn push_candidate(evidence: &mut AnswerEvidence, label: OptionLabel, line: usize) {
    if !evidence.candidates.contains(&label) {
        evidence.candidates.push(label);
    }
    if !evidence.evidence_lines.contains(&line) {
        evidence.evidence_lines.push(line);
    }
}

/// 由片段与作答证据组装题目记录
///
/// 作答标签在这里一次性写入记录，之后没有任何修改入口。
pub fn build_record(span: QuestionSpan, evidence: AnswerEvidence) -> McqRecord {
    let has_conflict = evidence.selected.is_none() && !evidence.candidates.is_empty();
    let QuestionSpan {
        number,
        question_text,
        options,
        pages,
        flags,
        ..
    } = span;

    let mut record = McqRecord::new(number, question_text, options, evidence.selected, pages);
    record.raw_answer = evidence.raw_answer;
    if has_conflict {
        record.candidate_labels = evidence.candidates;
    }
    for reason in flags.into_iter().chain(evidence.reasons) {
        record.flag(reason);
    }
    record
}

/// 作答来源的简短描述（用于日志）
pub fn describe_sources(span: &QuestionSpan) -> String {
    let mut parts = Vec::new();
    if span.marks.iter().any(|m| m.source == MarkSource::Tick) {
        parts.push("勾选");
    }
    if span.marks.iter().any(|m| m.source == MarkSource::Circled) {
        parts.push("圈选");
    }
    if !span.answer_lines.is_empty() {
        parts.push("作答行");
    }
    if parts.is_empty() {
        "无".to_string()
    } else {
        parts.join("+")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::segmenter::{AnswerLine, Mark};
    use std::collections::BTreeMap;

    fn span_with(options: &[OptionLabel], marks: Vec<Mark>, answers: &[&str]) -> QuestionSpan {
        let options: BTreeMap<OptionLabel, String> =
            options.iter().map(|l| (*l, format!("option {}", l))).collect();
        QuestionSpan {
            number: 1,
            question_text: "Pick".to_string(),
            options,
            marks,
            answer_lines: answers
                .iter()
                .enumerate()
                .map(|(i, raw)| AnswerLine {
                    raw: raw.to_string(),
                    line: 10 + i,
                })
                .collect(),
            lines: vec![0, 1, 2],
            pages: vec![1],
            flags: Vec::new(),
        }
    }

    fn tick(label: OptionLabel, line: usize) -> Mark {
        Mark {
            label,
            source: MarkSource::Tick,
            line,
        }
    }

    const ALL: [OptionLabel; 4] = OptionLabel::ALL;

    #[test]
    fn test_single_answer_line_selected_verbatim() {
        let evidence = extract_answer(&span_with(&ALL, vec![], &["(c)"]));
        assert_eq!(evidence.selected, Some(OptionLabel::C));
        assert_eq!(evidence.raw_answer.as_deref(), Some("(c)"));
        assert!(evidence.reasons.is_empty());
    }

    #[test]
    fn test_tick_agreeing_with_answer_line() {
        let evidence = extract_answer(&span_with(&ALL, vec![tick(OptionLabel::B, 2)], &["B"]));
        assert_eq!(evidence.selected, Some(OptionLabel::B));
        assert_eq!(evidence.evidence_lines, vec![2, 10]);
    }

    #[test]
    fn test_conflicting_marks_not_guessed() {
        let span = span_with(&ALL, vec![tick(OptionLabel::A, 1)], &["D"]);
        let evidence = extract_answer(&span);
        assert_eq!(evidence.selected, None);
        assert_eq!(evidence.candidates, vec![OptionLabel::A, OptionLabel::D]);
        assert_eq!(evidence.reasons, vec![ReviewReason::MultipleMarks]);

        let record = build_record(span, evidence);
        assert_eq!(record.selected_label(), None);
        assert_eq!(record.candidate_labels, vec![OptionLabel::A, OptionLabel::D]);
        assert!(record.ambiguous);
    }

    #[test]
    fn test_unrecognized_answer_kept_raw() {
        let span = span_with(&ALL, vec![], &["B or C"]);
        let evidence = extract_answer(&span);
        assert_eq!(evidence.selected, None);
        assert_eq!(evidence.reasons, vec![ReviewReason::UnrecognizedAnswer]);

        let record = build_record(span, evidence);
        assert_eq!(record.raw_answer.as_deref(), Some("B or C"));
        assert!(record.candidate_labels.is_empty());
    }

    #[test]
    fn test_answer_not_in_options_still_preserved() {
        let span = span_with(&[OptionLabel::A, OptionLabel::B], vec![], &["D"]);
        let evidence = extract_answer(&span);
        assert_eq!(evidence.selected, Some(OptionLabel::D));
        assert_eq!(evidence.reasons, vec![ReviewReason::AnswerNotInOptions]);
    }

    #[test]
    fn test_unanswered_is_not_flagged() {
        let span = span_with(&ALL, vec![], &[]);
        let evidence = extract_answer(&span);
        let record = build_record(span, evidence);
        assert_eq!(record.selected_label(), None);
        assert!(!record.ambiguous);
        assert_eq!(record.raw_answer, None);
    }

    #[test]
    fn test_segmentation_flags_carry_into_record() {
        let mut span = span_with(&ALL, vec![], &["A"]);
        span.flags.push(ReviewReason::OutOfSequence);
        let evidence = extract_answer(&span);
        let record = build_record(span, evidence);
        assert_eq!(record.selected_label(), Some(OptionLabel::A));
        assert_eq!(record.review_reasons, vec![ReviewReason::OutOfSequence]);
        assert!(record.ambiguous);
    }
}
