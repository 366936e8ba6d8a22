mod commands;
pub mod config;
pub mod editor;

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use clap::Parser;
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

pub use commands::{execute, Action, Cli, Command};
pub use config::{default_config_path, load_config, save_config, AppConfig, ConfigError};
pub use editor::{
    ClickOutcome, ClickSnapshot, EditorMode, EditorSession, PromptTarget, SessionOptions,
    TextPrompt,
};

fn init_logging(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        let file = File::create(path).with_context(|| format!("创建日志文件 {:?} 失败", path))?;
        loggers.push(WriteLogger::new(level, Config::default(), file));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = load_config(&config_path)
        .with_context(|| format!("加载配置 {:?} 失败", config_path))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute(cli.command, &config))
}
