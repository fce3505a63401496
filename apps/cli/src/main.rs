//! # Pollbatch CLI
//!
//! 批次配置的校验与试运行工具。
//!
//! ```bash
//! # 校验配置并打印点布局
//! pollbatch-cli check plc.toml
//!
//! # 在内存设备上执行 3 个读写周期，打印触发的事件
//! pollbatch-cli simulate plc.toml --cycles 3 --set speed=1200 --device temperature=21.5
//! ```
//!
//! 日志级别通过 `RUST_LOG` 控制。

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{CheckCommand, SimulateCommand};

/// Pollbatch CLI - 批次配置工具
#[derive(Parser, Debug)]
#[command(name = "pollbatch-cli")]
#[command(about = "Validate and dry-run pollbatch batch configurations", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 校验配置并打印点布局
    Check {
        #[command(flatten)]
        args: CheckCommand,
    },

    /// 在内存设备上试运行读写周期
    Simulate {
        #[command(flatten)]
        args: SimulateCommand,
    },
}

fn main() -> Result<()> {
    pollbatch_sdk::init_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check { args } => args.execute(),
        Commands::Simulate { args } => args.execute(),
    }
}
