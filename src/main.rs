mod app;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use taskloop_core::{logging::init_logging, AppConfig};

use crate::app::{load_tasks, App};

#[derive(Parser)]
#[command(name = "taskloop", about = "定时任务调度与执行引擎", version)]
struct Cli {
    /// 配置文件路径，不存在时使用内置缺省配置
    #[arg(short, long, default_value = "taskloop.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 启动Worker执行循环
    Run {
        /// 任务清单文件（TOML，[[tasks]]条目数组）
        #[arg(long)]
        tasks: Option<PathBuf>,
    },
    /// 打印当前到期的任务后退出
    Due {
        #[arg(long)]
        tasks: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        AppConfig::from_toml_file(&cli.config)?
    } else {
        AppConfig::default()
    };
    init_logging(&config.logging);

    let app = App::new(config)?;

    match cli.command {
        Command::Run { tasks } => {
            let tasks = tasks.map(load_tasks).transpose()?.unwrap_or_default();
            app.run_worker(tasks).await?;
        }
        Command::Due { tasks } => {
            let tasks = tasks.map(load_tasks).transpose()?.unwrap_or_default();
            app.print_due_tasks(tasks).await?;
        }
    }

    Ok(())
}
