use crate::models::ocr::OcrPageRecord;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 本地输入文件（一份答卷）
#[derive(Debug, Clone)]
pub struct ScriptInput {
    /// 文件名（不含扩展名），用作答卷标识
    pub name: String,
    pub pages: Vec<OcrPageRecord>,
    pub file_path: PathBuf,
}

/// 把任意形态的输入 JSON 转成页面记录列表
///
/// 支持三种形态：
/// - 页面记录数组 `[{"page_number": 1, "ocr_json": ...}, ...]`
/// - 单个页面记录 `{"page_number": 1, "ocr_json": ...}`
/// - 裸 OCR 结果（视为第 1 页）
pub fn pages_from_value(value: Value) -> Result<Vec<OcrPageRecord>> {
    match value {
        Value::Array(items) if !items.is_empty() && items.iter().all(is_page_record) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).context("页面记录格式无效"))
            .collect(),
        Value::Object(ref map) if map.contains_key("ocr_json") => {
            Ok(vec![serde_json::from_value(value).context("页面记录格式无效")?])
        }
        other => Ok(vec![OcrPageRecord::new(1, other)]),
    }
}

fn is_page_record(value: &Value) -> bool {
    value
        .as_object()
        .map(|m| m.contains_key("ocr_json"))
        .unwrap_or(false)
}

/// 读取单个输入文件
pub async fn load_input_file(path: &Path) -> Result<ScriptInput> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取输入文件: {}", path.display()))?;

    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("无法解析JSON文件: {}", path.display()))?;

    let pages = pages_from_value(value)
        .with_context(|| format!("输入文件结构无效: {}", path.display()))?;

    let name = path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    Ok(ScriptInput {
        name,
        pages,
        file_path: path.to_path_buf(),
    })
}

/// 读取文件夹中的所有 JSON 输入文件（按文件名排序）
pub async fn load_all_input_files(folder_path: &Path) -> Result<Vec<ScriptInput>> {
    if !folder_path.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path.display());
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(folder_path)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut inputs = Vec::new();
    for path in paths {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_input_file(&path).await {
            Ok(input) => {
                tracing::info!("成功加载 {} 页", input.pages.len());
                inputs.push(input);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pages_from_record_array() {
        let pages = pages_from_value(json!([
            {"page_number": 2, "ocr_json": "2. x"},
            {"page_number": "1", "ocr_json": {"text": "1. y"}}
        ]))
        .unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].page_number, Some(1));
    }

    #[test]
    fn test_bare_ocr_value_becomes_page_one() {
        let pages = pages_from_value(json!({"lines": [{"text": "1. What?"}]})).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_number, Some(1));
        assert!(pages[0].has_ocr());

        let pages = pages_from_value(json!(["1. a", "A. b"])).unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_load_input_file_from_disk() {
        let dir = std::env::temp_dir().join(format!("mcq_loader_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("script_17.json");
        std::fs::write(&path, r#"{"page_number": 1, "ocr_json": "1. Q\nA. x\nB. y"}"#).unwrap();

        let input = tokio_test::block_on(load_input_file(&path)).unwrap();
        assert_eq!(input.name, "script_17");
        assert_eq!(input.pages.len(), 1);

        let all = tokio_test::block_on(load_all_input_files(&dir)).unwrap();
        assert_eq!(all.len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
