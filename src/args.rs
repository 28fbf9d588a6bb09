use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// wirebox - 声明式服务容器工具
#[derive(Parser, Debug)]
#[command(name = "wirebox")]
#[command(about = "校验、列出并解析声明式服务定义")]
pub struct Args {
    /// 子命令
    #[command(subcommand)]
    pub command: Command,

    /// 服务定义文件（默认读取配置或 WIREBOX_DEFINITIONS）
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,

    /// application_root 参数（默认为定义文件所在目录）
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// 日志级别
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// 日志格式 (pretty|json|compact)
    #[arg(long, global = true)]
    pub log_format: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 编译容器并输出摘要
    Check,
    /// 列出所有服务定义
    List,
    /// 解析一个服务并输出
    Get {
        /// 服务ID
        id: String,
    },
}
