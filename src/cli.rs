use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mcq_extract::{logging, App, Config};
use std::path::PathBuf;
use tracing::info;

/// 从 OCR 结果中提取答卷选择题（题干、选项与学生作答）
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML 配置文件（环境变量优先）
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// 输出 debug 日志
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 提取本地 OCR JSON 文件或文件夹
    Extract {
        /// 输入文件或文件夹
        #[arg(long, short)]
        input: PathBuf,
        /// 输出文件（默认打印到标准输出）
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// 通过文档服务处理答卷
    Run {
        /// 答卷 ID
        #[arg(required = true)]
        script_ids: Vec<i64>,
    },
    /// 检查文档服务连通性
    Health,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::from_env(),
        };
        config.verbose_logging |= self.verbose;
        logging::init(config.verbose_logging);

        let app = App::initialize(config)?;

        match self.command {
            Commands::Extract { input, output } => {
                let value = app.extract_local(&input).await?;
                let json = serde_json::to_string_pretty(&value)?;
                match output {
                    Some(path) => {
                        tokio::fs::write(&path, json)
                            .await
                            .with_context(|| format!("无法写入输出文件: {}", path.display()))?;
                        info!("✓ 结果已写入: {}", path.display());
                    }
                    None => println!("{}", json),
                }
            }
            Commands::Run { script_ids } => {
                let outcomes = app.run(&script_ids).await?;
                println!("{}", serde_json::to_string_pretty(&outcomes)?);
                let failed: Vec<i64> = outcomes
                    .iter()
                    .filter(|o| o.is_failed())
                    .map(|o| o.script_id())
                    .collect();
                if !failed.is_empty() {
                    anyhow::bail!("{} 份答卷处理失败: {:?}", failed.len(), failed);
                }
            }
            Commands::Health => {
                let status = app.health().await;
                println!("{}", serde_json::to_string_pretty(&status)?);
                if !status.is_healthy() {
                    anyhow::bail!("文档服务不可用");
                }
            }
        }

        Ok(())
    }
}
