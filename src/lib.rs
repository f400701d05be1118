// src/lib.rs

pub mod chain;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::{ChainFile, build_invoker, load_and_validate, spawner_for};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - chain file loading
/// - the spawner for the configured executor
/// - the engine, started on a blocking thread of the tokio runtime
/// - Ctrl-C handling (rejects the run in progress)
///
/// Returns an error if the chain was rejected.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let chain = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&chain);
        return Ok(());
    }

    let spawner = spawner_for(chain.config.executor)?;
    let (invoker, failure) = build_invoker(&chain, spawner);

    // Ctrl-C → reject; stages not yet launched are skipped.
    {
        let invoker = invoker.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("Ctrl+C received; rejecting chain");
            invoker.reject(anyhow!("interrupted by Ctrl+C"));
        });
    }

    info!(
        path = %config_path.display(),
        stages = chain.stage.len(),
        tasks = chain.task_count(),
        "running chain"
    );

    // `start` may return before detached stages are done; the process must
    // outlive them.
    let runner = invoker.clone();
    tokio::task::spawn_blocking(move || {
        runner.start();
        runner.wait_until_ended();
    })
    .await?;

    match failure.get() {
        Some(message) => Err(anyhow!("chain rejected: {message}")),
        None => {
            info!("chain completed");
            Ok(())
        }
    }
}

/// Simple dry-run output: print stages, their commands, and handlers.
fn print_dry_run(chain: &ChainFile) {
    println!("stagechain dry-run");
    println!("  config.executor = {:?}", chain.config.executor);
    println!();

    println!("stages ({}):", chain.stage.len());
    for (index, stage) in chain.stage.iter().enumerate() {
        let mode = if stage.detach { "detached" } else { "blocking" };
        println!("  - stage {index} ({mode})");
        for cmd in &stage.tasks {
            println!("      task: {cmd}");
        }
    }

    if let Some(ref cmd) = chain.handlers.on_failure {
        println!("on_failure: {cmd}");
    }
    if let Some(ref cmd) = chain.handlers.on_success {
        println!("on_success: {cmd}");
    }
}
