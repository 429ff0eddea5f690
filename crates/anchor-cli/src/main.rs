//! `anchor-reason`: score news pairs over anchor graphs.
//!
//! # Usage
//!
//! ```bash
//! anchor-reason reason --batch pairs.json --knowledge knowledge.safetensors
//! anchor-reason recommend --batch pairs.json --base-dir /data/anchor
//! anchor-reason mine-pairs --histories clicks.json -o positives.json
//! ```
//!
//! Artifact locations fall back to `ANCHOR_*` environment variables, then the
//! `[artifacts]` table of the config file, then the per-user data directory.

use anchor_cli::{
    run_mine_pairs, run_reason, run_recommend, write_json, MinePairsArgs, ReasonArgs,
    RecommendArgs,
};
use anyhow::Result;
use burn::tensor::backend::Backend;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "anchor-reason")]
#[command(author, version, about = "Anchor-graph reasoning for news-pair relevance")]
struct Cli {
    /// Log debug events
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Run on the WGPU backend instead of the CPU
    #[cfg(feature = "gpu")]
    #[arg(long, global = true)]
    gpu: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Path-reasoning relevance with per-pair traces
    Reason(ReasonArgs),
    /// Neighbor-aggregation similarity
    Recommend(RecommendArgs),
    /// Co-click positive pairs from click histories
    MinePairs(MinePairsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    #[cfg(feature = "gpu")]
    if cli.gpu {
        let device = anchor_core::init_gpu_device();
        return dispatch::<anchor_core::WgpuBackend>(cli.command, &device);
    }

    let device = anchor_core::init_cpu_device();
    dispatch::<anchor_core::CpuBackend>(cli.command, &device)
}

fn dispatch<B: Backend>(command: Command, device: &B::Device) -> Result<()> {
    match command {
        Command::Reason(args) => {
            let traces = run_reason::<B>(&args, device)?;
            write_json(&traces, args.output.as_deref())
        }
        Command::Recommend(args) => {
            let predictions = run_recommend::<B>(&args, device)?;
            write_json(&predictions, args.output.as_deref())
        }
        Command::MinePairs(args) => {
            let pairs = run_mine_pairs(&args)?;
            write_json(&pairs, args.output.as_deref())
        }
    }
}
