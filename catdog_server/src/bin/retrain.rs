use catdog_server::{
    config,
    pipeline::{run_stages, DvcPipeline, Stage, StageResult},
};
use chrono::Utc;
use clap::Parser;
use std::{process::ExitCode, time::Instant};

/// Runs the training pipeline once, outside the server.
#[derive(Debug, Parser)]
#[command(name = "retrain", about = "Retrain the cat/dog classifier")]
struct Args {
    /// Reproduce every pipeline stage even when its inputs are unchanged
    #[arg(long)]
    force: bool,
}

fn banner(title: &str) {
    println!("{}", "=".repeat(60));
    println!("{}", title);
    println!("{}", "=".repeat(60));
}

fn report(stage: Stage, result: &StageResult) {
    banner(&format!("Stage: {}", stage));
    match (stage, result) {
        (Stage::Reproduce, Ok(output)) => {
            println!("Pipeline reproduced successfully");
            if !output.stdout.trim().is_empty() {
                println!("{}", output.stdout.trim_end());
            }
        }
        (_, Ok(_)) => println!("{} completed", stage),
        (Stage::Reproduce, Err(e)) => {
            println!("Pipeline reproduction failed");
            println!("{}", e);
        }
        (_, Err(e)) => println!("Warning: {} failed, continuing: {}", stage, e),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt().with_target(false).init();

    let config = match config::get_configuration() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let started = Instant::now();
    banner("Model retraining");
    println!("Started at: {}", Utc::now().to_rfc3339());
    println!("Working directory: {}", config.pipeline.working_dir.display());
    println!("Force mode: {}", args.force);

    let pipeline = DvcPipeline::new(&config.pipeline);
    let outcome = run_stages(&pipeline, args.force, report).await;

    if outcome.is_ok() {
        let model_path = config.model.get_path();
        if model_path.exists() {
            println!("Model artifact found at {}", model_path.display());
        } else {
            println!("Warning: no model artifact at {}", model_path.display());
        }
    }

    banner("Summary");
    println!("Duration: {:.2}s", started.elapsed().as_secs_f64());
    match outcome {
        Ok(_) => {
            println!("Status: completed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("Status: failed");
            println!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
