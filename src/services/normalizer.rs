//! OCR 规范化服务 - 业务能力层
//!
//! 把结构不固定的 OCR JSON 校验并转换成统一的行序列（[`TokenStream`]）。
//!
//! 支持的结构（可嵌套）：
//! - 纯文本字符串（按换行切分）
//! - 含 `pages` / `blocks` / `paragraphs` / `lines` / `words` / `tokens` 数组的对象
//! - 含 `text` / `full_text` 字符串的对象
//! - 以上任意结构组成的数组

use crate::error::OcrError;
use crate::models::ocr::{BoundingBox, NormalizedLine, OcrPageRecord, Token, TokenStream};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const TEXT_KEYS: [&str; 4] = ["text", "full_text", "description", "content"];
const CONFIDENCE_KEYS: [&str; 3] = ["confidence", "conf", "score"];
const BBOX_KEYS: [&str; 3] = ["bbox", "bounding_box", "boundingBox"];
const LINE_INDEX_KEYS: [&str; 3] = ["line", "line_num", "line_no"];

/// 规范化前的一行
#[derive(Debug, Clone)]
struct RawLine {
    text: String,
    confidence: Option<f64>,
    tokens: Vec<Token>,
    bbox: Option<BoundingBox>,
}

/// 校验并规范化一份答卷的所有页面
///
/// # 参数
/// - `pages`: 上游返回的页面记录（顺序任意）
///
/// # 返回
/// 按页码排序后的行序列；所有页面都缺少 OCR 数据时返回 [`OcrError::NoValidPages`]
pub fn normalize(pages: &[OcrPageRecord]) -> Result<TokenStream, OcrError> {
    let mut ordered: Vec<&OcrPageRecord> = pages.iter().collect();
    ordered.sort_by_key(|record| record.page_number.unwrap_or(0));

    let mut stream = TokenStream::default();
    let mut valid_pages = 0;

    for record in ordered {
        let page = record.page_number.unwrap_or(0);
        let ocr_json = match &record.ocr_json {
            Some(value) if record.has_ocr() => value,
            _ => {
                warn!("第 {} 页没有 ocr_json（或为空），已跳过", page);
                continue;
            }
        };
        valid_pages += 1;

        let mut raw_lines = Vec::new();
        collect_value(ocr_json, page, &mut raw_lines)?;

        let mut line_no = 0;
        for raw in raw_lines {
            if let Some(line) = finish_line(raw, page, line_no) {
                stream.lines.push(line);
                line_no += 1;
            }
        }
        debug!("第 {} 页规范化完成，共 {} 行", page, line_no);
    }

    if valid_pages == 0 {
        return Err(OcrError::NoValidPages);
    }

    Ok(stream)
}

fn collect_value(value: &Value, page: i64, out: &mut Vec<RawLine>) -> Result<(), OcrError> {
    match value {
        Value::Null => Ok(()),
        Value::String(text) => {
            push_text_block(text, None, None, out);
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                collect_value(item, page, out)?;
            }
            Ok(())
        }
        Value::Object(map) => collect_object(map, page, out),
        _ => Err(OcrError::InvalidField {
            page,
            field: "ocr_json".to_string(),
        }),
    }
}

fn collect_object(map: &Map<String, Value>, page: i64, out: &mut Vec<RawLine>) -> Result<(), OcrError> {
    for key in ["pages", "blocks", "paragraphs"] {
        if let Some(value) = map.get(key) {
            let items = as_array(value, page, key)?;
            for item in items {
                collect_value(item, page, out)?;
            }
            return Ok(());
        }
    }

    if let Some(value) = map.get("lines") {
        for item in as_array(value, page, "lines")? {
            match item {
                Value::String(text) => push_text_block(text, None, None, out),
                Value::Object(line) => out.push(line_from_object(line, page)?),
                Value::Null => {}
                _ => {
                    return Err(OcrError::InvalidField {
                        page,
                        field: "lines".to_string(),
                    })
                }
            }
        }
        return Ok(());
    }

    for key in ["words", "tokens"] {
        if let Some(value) = map.get(key) {
            let words = parse_words(as_array(value, page, key)?, page)?;
            out.extend(group_words(words));
            return Ok(());
        }
    }

    if let Some(text) = text_of(map) {
        let confidence = confidence_of(map, page)?;
        push_text_block(text, confidence, bbox_of(map), out);
        return Ok(());
    }

    Err(OcrError::InvalidField {
        page,
        field: "ocr_json".to_string(),
    })
}

/// 一行对象：`{"text": ..., "confidence": ..., "words": [...]}`
fn line_from_object(map: &Map<String, Value>, page: i64) -> Result<RawLine, OcrError> {
    let words = match map.get("words").or_else(|| map.get("tokens")) {
        Some(value) => parse_words(as_array(value, page, "words")?, page)?
            .into_iter()
            .map(|w| w.token)
            .collect(),
        None => Vec::new(),
    };

    let text = match text_of(map) {
        Some(text) => text.to_string(),
        None if !words.is_empty() => join_tokens(&words),
        None => {
            return Err(OcrError::InvalidField {
                page,
                field: "lines.text".to_string(),
            })
        }
    };

    Ok(RawLine {
        text,
        confidence: confidence_of(map, page)?,
        tokens: words,
        bbox: bbox_of(map),
    })
}

struct RawWord {
    token: Token,
    line_index: Option<i64>,
    bbox: Option<BoundingBox>,
}

fn parse_words(items: &[Value], page: i64) -> Result<Vec<RawWord>, OcrError> {
    let mut words = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(text) => words.push(RawWord {
                token: Token {
                    text: text.clone(),
                    confidence: None,
                },
                line_index: None,
                bbox: None,
            }),
            Value::Object(map) => {
                let text = text_of(map).ok_or_else(|| OcrError::InvalidField {
                    page,
                    field: "words.text".to_string(),
                })?;
                let line_index = LINE_INDEX_KEYS
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_i64));
                words.push(RawWord {
                    token: Token {
                        text: text.to_string(),
                        confidence: confidence_of(map, page)?,
                    },
                    line_index,
                    bbox: bbox_of(map),
                });
            }
            Value::Null => {}
            _ => {
                return Err(OcrError::InvalidField {
                    page,
                    field: "words".to_string(),
                })
            }
        }
    }
    Ok(words)
}

/// 把散落的词元组合成行
///
/// 优先使用显式行号，其次按坐标框的纵向位置聚类，都没有时整体作为一行。
fn group_words(words: Vec<RawWord>) -> Vec<RawLine> {
    if words.is_empty() {
        return Vec::new();
    }

    if words.iter().all(|w| w.line_index.is_some()) {
        let mut grouped: BTreeMap<i64, Vec<Token>> = BTreeMap::new();
        for word in words {
            grouped.entry(word.line_index.unwrap_or(0)).or_default().push(word.token);
        }
        return grouped.into_values().map(line_from_tokens).collect();
    }

    if words.iter().all(|w| w.bbox.is_some()) {
        return cluster_by_position(words);
    }

    vec![line_from_tokens(words.into_iter().map(|w| w.token).collect())]
}

fn cluster_by_position(words: Vec<RawWord>) -> Vec<RawLine> {
    let mut placed: Vec<(BoundingBox, Token)> = words
        .into_iter()
        .filter_map(|w| w.bbox.map(|b| (b, w.token)))
        .collect();
    placed.sort_by(|a, b| a.0.y.total_cmp(&b.0.y).then(a.0.x.total_cmp(&b.0.x)));

    let mut rows: Vec<(f64, f64, Vec<(BoundingBox, Token)>)> = Vec::new();
    for (bbox, token) in placed {
        let center = bbox.y + bbox.height / 2.0;
        match rows.last_mut() {
            Some((row_center, row_height, members)) if (center - *row_center).abs() <= row_height.max(bbox.height) / 2.0 => {
                members.push((bbox, token));
                *row_height = row_height.max(bbox.height);
            }
            _ => rows.push((center, bbox.height, vec![(bbox, token)])),
        }
    }

    rows.into_iter()
        .map(|(_, _, mut members)| {
            members.sort_by(|a, b| a.0.x.total_cmp(&b.0.x));
            let bbox = members.iter().map(|(b, _)| *b).reduce(union_bbox);
            let mut line = line_from_tokens(members.into_iter().map(|(_, t)| t).collect());
            line.bbox = bbox;
            line
        })
        .collect()
}

fn union_bbox(a: BoundingBox, b: BoundingBox) -> BoundingBox {
    let x0 = a.x.min(b.x);
    let y0 = a.y.min(b.y);
    let x1 = (a.x + a.width).max(b.x + b.width);
    let y1 = (a.y + a.height).max(b.y + b.height);
    BoundingBox {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    }
}

fn line_from_tokens(tokens: Vec<Token>) -> RawLine {
    RawLine {
        text: join_tokens(&tokens),
        confidence: None,
        tokens,
        bbox: None,
    }
}

fn join_tokens(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.text.as_str()).collect::<Vec<_>>().join(" ")
}

fn push_text_block(text: &str, confidence: Option<f64>, bbox: Option<BoundingBox>, out: &mut Vec<RawLine>) {
    for line in text.lines() {
        out.push(RawLine {
            text: line.to_string(),
            confidence,
            tokens: Vec::new(),
            bbox,
        });
    }
}

/// 清理文本并计算行置信度；清理后为空的行返回 `None`
fn finish_line(raw: RawLine, page: i64, line_no: usize) -> Option<NormalizedLine> {
    let text = clean_text(&raw.text);
    if text.is_empty() {
        return None;
    }

    let tokens: Vec<Token> = if raw.tokens.is_empty() {
        text.split_whitespace()
            .map(|t| Token {
                text: t.to_string(),
                confidence: None,
            })
            .collect()
    } else {
        raw.tokens
            .into_iter()
            .filter_map(|t| {
                let cleaned = clean_text(&t.text);
                (!cleaned.is_empty()).then_some(Token {
                    text: cleaned,
                    confidence: t.confidence,
                })
            })
            .collect()
    };

    let confidence = raw.confidence.or_else(|| mean_confidence(&tokens));

    Some(NormalizedLine {
        page,
        line_no,
        text,
        confidence,
        tokens,
        bbox: raw.bbox,
    })
}

fn mean_confidence(tokens: &[Token]) -> Option<f64> {
    let known: Vec<f64> = tokens.iter().filter_map(|t| t.confidence).collect();
    if known.is_empty() {
        None
    } else {
        Some(known.iter().sum::<f64>() / known.len() as f64)
    }
}

/// 统一空白与标点，去掉控制字符与零宽字符
///
/// 勾选符号与圈号字母原样保留，它们是学生作答的标记。
pub fn clean_text(text: &str) -> String {
    let mapped: String = text
        .chars()
        .filter_map(|c| match c {
            '\u{00A0}' | '\u{2007}' | '\u{202F}' | '\t' => Some(' '),
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' => None,
            '\u{2018}' | '\u{2019}' | '\u{201B}' | '\u{2032}' => Some('\''),
            '\u{201C}' | '\u{201D}' | '\u{201F}' | '\u{2033}' => Some('"'),
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}' => Some('-'),
            '\u{FF08}' => Some('('),
            '\u{FF09}' => Some(')'),
            '\u{FF1A}' => Some(':'),
            '\u{FF0E}' => Some('.'),
            c if c.is_control() => Some(' '),
            c => Some(c),
        })
        .collect();

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn as_array<'a>(value: &'a Value, page: i64, field: &str) -> Result<&'a [Value], OcrError> {
    value.as_array().map(Vec::as_slice).ok_or_else(|| OcrError::InvalidField {
        page,
        field: field.to_string(),
    })
}

fn text_of(map: &Map<String, Value>) -> Option<&str> {
    TEXT_KEYS.iter().find_map(|key| map.get(*key).and_then(Value::as_str))
}

fn confidence_of(map: &Map<String, Value>, page: i64) -> Result<Option<f64>, OcrError> {
    match CONFIDENCE_KEYS.iter().find_map(|key| map.get(*key)) {
        Some(value) => parse_confidence(value, page),
        None => Ok(None),
    }
}

/// 解析置信度
///
/// `[0, 1]` 原样使用，`(1, 100]` 视为百分比；`-1` 表示引擎未给出置信度。
pub fn parse_confidence(value: &Value, page: i64) -> Result<Option<f64>, OcrError> {
    let number = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| OcrError::InvalidField {
        page,
        field: "confidence".to_string(),
    })?;

    if number == -1.0 {
        return Ok(None);
    }
    if !number.is_finite() || number < 0.0 || number > 100.0 {
        return Err(OcrError::InvalidConfidence { page, value: number });
    }
    if number > 1.0 {
        Ok(Some(number / 100.0))
    } else {
        Ok(Some(number))
    }
}

fn bbox_of(map: &Map<String, Value>) -> Option<BoundingBox> {
    let value = BBOX_KEYS.iter().find_map(|key| map.get(*key))?;
    match value {
        Value::Array(items) => {
            let numbers: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
            if numbers.len() == 4 && items.len() == 4 {
                let (x0, y0, x1, y1) = (numbers[0], numbers[1], numbers[2], numbers[3]);
                return Some(BoundingBox {
                    x: x0.min(x1),
                    y: y0.min(y1),
                    width: (x1 - x0).abs(),
                    height: (y1 - y0).abs(),
                });
            }
            // 多边形顶点 [[x, y], ...]
            let points: Vec<(f64, f64)> = items
                .iter()
                .filter_map(|p| {
                    let pair = p.as_array()?;
                    Some((pair.first()?.as_f64()?, pair.get(1)?.as_f64()?))
                })
                .collect();
            if points.len() < 2 {
                return None;
            }
            let min_x = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
            let min_y = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
            let max_x = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
            let max_y = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
            Some(BoundingBox {
                x: min_x,
                y: min_y,
                width: max_x - min_x,
                height: max_y - min_y,
            })
        }
        Value::Object(b) => {
            let x = b.get("x").or_else(|| b.get("left")).and_then(Value::as_f64)?;
            let y = b.get("y").or_else(|| b.get("top")).and_then(Value::as_f64)?;
            let width = b.get("width").or_else(|| b.get("w")).and_then(Value::as_f64)?;
            let height = b.get("height").or_else(|| b.get("h")).and_then(Value::as_f64)?;
            Some(BoundingBox { x, y, width, height })
        }
        _ => None,
    }
}
