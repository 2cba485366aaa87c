use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

pub mod api;
pub mod commands;
pub mod error;
pub mod events;
pub mod models;
pub mod services;
pub mod storage;

fn init_logging(log_file: Option<&std::path::Path>) -> error::Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

/// Parse arguments, run one command and return the process exit code.
pub async fn run() -> i32 {
    let cli = commands::Cli::parse();
    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        eprintln!("error: cannot open log file: {}", e);
        return 1;
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; finishing the current step");
            flag.store(true, Ordering::Relaxed);
        }
    });

    let state = commands::AppState::new(cli.home, cli.profile, cancel);
    match commands::dispatch(cli.command, &state).await {
        Ok(()) => 0,
        Err(e) => {
            log::debug!("Command failed: {:?}", e);
            eprintln!("error: {}", e);
            1
        }
    }
}
