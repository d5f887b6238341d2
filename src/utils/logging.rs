use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化、运行日志文件和统计输出的辅助函数
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 日志
///
/// `RUST_LOG` 优先；未设置时默认 `info`，`verbose` 为 true 时本 crate 使用 `debug`
pub fn init(verbose: bool) {
    let default_directive = if verbose {
        "mcq_extract=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化运行日志文件（覆盖写入表头）
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub async fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n答卷选择题提取日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header).await?;
    Ok(())
}

/// 向运行日志文件追加一行
pub async fn append_log_line(log_file_path: &str, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .await?;
    file.write_all(format!("{}\n", line).as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(max_concurrent: usize, llm_enabled: bool) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 答卷选择题批量提取");
    info!("📊 最大并发数: {}", max_concurrent);
    info!("🤖 LLM 文本整理: {}", if llm_enabled { "开启" } else { "关闭" });
    info!("{}", "=".repeat(60));
}

/// 记录答卷数量
pub fn log_scripts_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 共 {} 份待处理的答卷", total);
    info!("📋 将以每批 {} 份的方式处理", max_concurrent);
}

/// 记录批次开始信息
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `total_batches`: 批次总数
/// - `start`: 起始答卷编号
/// - `end`: 结束答卷编号
/// - `total`: 答卷总数
pub fn log_batch_start(batch_num: usize, total_batches: usize, start: usize, end: usize, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 批", batch_num, total_batches);
    info!("📄 本批答卷: {}-{} / 共 {} 份", start, end, total);
    info!("{}", "=".repeat(60));
}

pub fn log_batch_complete(batch_num: usize, success: usize, total: usize) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 第 {} 批完成: 成功 {}/{}", batch_num, success, total);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `success`: 成功数量
/// - `failed`: 失败数量
/// - `total`: 总数
/// - `flagged`: 待复核题目数
/// - `log_file_path`: 日志文件路径
/// - `review_file_path`: 复核清单路径
pub fn print_final_stats(
    success: usize,
    failed: usize,
    total: usize,
    flagged: usize,
    log_file_path: &str,
    review_file_path: &str,
) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!("完成时间: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    info!("📝 待复核题目: {}", flagged);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
    if flagged > 0 {
        info!("复核清单: {}", review_file_path);
    }
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("选择题提取", 3), "选择题...");
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[tokio::test]
    async fn test_log_file_header_then_append() {
        let path = std::env::temp_dir().join(format!("mcq_run_log_{}.txt", std::process::id()));
        let path = path.to_string_lossy().to_string();

        init_log_file(&path).await.unwrap();
        append_log_line(&path, "脚本 1 | 成功").await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("答卷选择题提取日志"));
        assert!(content.ends_with("脚本 1 | 成功\n"));
        let _ = std::fs::remove_file(&path);
    }
}
