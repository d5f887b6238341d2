use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 上游返回的一页 OCR 记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrPageRecord {
    #[serde(default, deserialize_with = "deserialize_page_number")]
    pub page_number: Option<i64>,
    /// 原始 OCR 结果，结构不固定
    #[serde(default)]
    pub ocr_json: Option<Value>,
}

impl OcrPageRecord {
    pub fn new(page_number: i64, ocr_json: Value) -> Self {
        Self {
            page_number: Some(page_number),
            ocr_json: Some(ocr_json),
        }
    }

    /// 是否携带可用的 OCR 数据
    ///
    /// null、空字符串、空对象、空数组、`false` 与 `0` 都视为没有数据
    pub fn has_ocr(&self) -> bool {
        match &self.ocr_json {
            None | Some(Value::Null) => false,
            Some(Value::String(text)) => !text.trim().is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(map)) => !map.is_empty(),
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(n)) => n.as_f64().map_or(true, |v| v != 0.0),
        }
    }
}

// 页码既可能是整数也可能是字符串
fn deserialize_page_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct PageNumberVisitor;

    impl<'de> Visitor<'de> for PageNumberVisitor {
        type Value = Option<i64>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer page number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<i64>()
                .map(Some)
                .map_err(|_| E::custom(format!("invalid page number: {}", value)))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            i64::try_from(value)
                .map(Some)
                .map_err(|_| E::custom(format!("page number out of range: {}", value)))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if value.fract() == 0.0 && value.is_finite() {
                Ok(Some(value as i64))
            } else {
                Err(E::custom(format!("invalid page number: {}", value)))
            }
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(PageNumberVisitor)
}

/// 坐标框（左上角 + 宽高）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// 单个词元
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub text: String,
    pub confidence: Option<f64>,
}

/// 规范化后的一行文本
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedLine {
    pub page: i64,
    /// 页内行号（从 0 开始）
    pub line_no: usize,
    pub text: String,
    pub confidence: Option<f64>,
    pub tokens: Vec<Token>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

/// 规范化后的整份答卷
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TokenStream {
    pub lines: Vec<NormalizedLine>,
}

impl TokenStream {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// 所有页码（去重，按出现顺序）
    pub fn pages(&self) -> Vec<i64> {
        let mut pages: Vec<i64> = Vec::new();
        for line in &self.lines {
            if !pages.contains(&line.page) {
                pages.push(line.page);
            }
        }
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_number_accepts_int_and_string() {
        let a: OcrPageRecord = serde_json::from_value(json!({"page_number": 2, "ocr_json": "x"})).unwrap();
        let b: OcrPageRecord = serde_json::from_value(json!({"page_number": " 7 ", "ocr_json": "x"})).unwrap();
        let c: OcrPageRecord = serde_json::from_value(json!({"ocr_json": "x"})).unwrap();
        let d: OcrPageRecord = serde_json::from_value(json!({"page_number": null})).unwrap();

        assert_eq!(a.page_number, Some(2));
        assert_eq!(b.page_number, Some(7));
        assert_eq!(c.page_number, None);
        assert_eq!(d.page_number, None);
        assert!(!d.has_ocr());
    }

    #[test]
    fn test_page_number_rejects_garbage() {
        let r: Result<OcrPageRecord, _> = serde_json::from_value(json!({"page_number": "two"}));
        assert!(r.is_err());
    }
}
