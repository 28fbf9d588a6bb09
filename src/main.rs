use clap::Parser;
use std::process::ExitCode;

use wirebox::app::WireboxApp;
use wirebox::args::Args;
use wirebox::config::app_config::parse_log_level;
use wirebox::config::AppConfig;
use wirebox::errors::{AppError, ConfigError};
use wirebox::logging::{init_logging, LogFormat};

fn main() -> ExitCode {
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "wirebox failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    // 命令行参数优先于配置文件和环境变量
    if let Some(level) = &args.log_level {
        config.logging.level = parse_log_level(level)?;
    }
    if let Some(format) = &args.log_format {
        config.logging.format = format.parse::<LogFormat>().map_err(|reason| ConfigError::InvalidValue {
            key: "--log-format".to_string(),
            reason,
        })?;
    }
    init_logging(&config.logging)?;

    let app = WireboxApp::new(config);
    let stdout = std::io::stdout();
    app.run(args, &mut stdout.lock())
}
