use crate::config::PipelineConfig;
use async_trait::async_trait;
use std::{fmt, path::PathBuf};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pull,
    Reproduce,
    Push,
}

impl Stage {
    /// Only reproduction failures abort a run; a stale pull or a failed push
    /// still leaves a usable model behind.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Stage::Reproduce)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Pull => "pull",
            Stage::Reproduce => "reproduce",
            Stage::Push => "push",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

pub type StageResult = Result<StageOutput, PipelineError>;

/// The external data and training pipeline.
#[async_trait]
pub trait Pipeline: Send + Sync + 'static {
    async fn pull(&self) -> StageResult;
    async fn reproduce(&self, force: bool) -> StageResult;
    async fn push(&self) -> StageResult;
}

/// Drives a DVC project through its command line.
#[derive(Debug, Clone)]
pub struct DvcPipeline {
    program: String,
    working_dir: PathBuf,
}

impl DvcPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            program: config.program.clone(),
            working_dir: config.working_dir.clone(),
        }
    }

    async fn run(&self, args: &[&str]) -> StageResult {
        let command = std::iter::once(self.program.as_str())
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        tracing::debug!("Running `{}` in {}", command, self.working_dir.display());

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(&self.working_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| PipelineError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(PipelineError::Failed {
                command,
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(StageOutput { stdout, stderr })
    }
}

#[async_trait]
impl Pipeline for DvcPipeline {
    async fn pull(&self) -> StageResult {
        self.run(&["pull"]).await
    }

    async fn reproduce(&self, force: bool) -> StageResult {
        if force {
            self.run(&["repro", "--force"]).await
        } else {
            self.run(&["repro"]).await
        }
    }

    async fn push(&self) -> StageResult {
        self.run(&["push"]).await
    }
}

/// Runs pull, reproduce and push in order, handing every stage result to
/// `report`. Returns the reproduce output, or the first fatal error.
pub async fn run_stages<P, F>(pipeline: &P, force: bool, mut report: F) -> StageResult
where
    P: Pipeline + ?Sized,
    F: FnMut(Stage, &StageResult) + Send,
{
    let pulled = pipeline.pull().await;
    log_stage(Stage::Pull, &pulled);
    report(Stage::Pull, &pulled);

    let reproduced = pipeline.reproduce(force).await;
    log_stage(Stage::Reproduce, &reproduced);
    report(Stage::Reproduce, &reproduced);
    let output = reproduced?;

    let pushed = pipeline.push().await;
    log_stage(Stage::Push, &pushed);
    report(Stage::Push, &pushed);

    Ok(output)
}

fn log_stage(stage: Stage, result: &StageResult) {
    match result {
        Ok(_) => tracing::info!("Pipeline {} succeeded", stage),
        Err(e) if stage.is_fatal() => tracing::error!("Pipeline {} failed: {}", stage, e),
        Err(e) => tracing::warn!("Pipeline {} failed, continuing anyway: {}", stage, e),
    }
}
