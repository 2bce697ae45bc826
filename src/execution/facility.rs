//! Execution facilities: where untrusted candidate code actually runs.
//!
//! Both facilities start a fresh interpreter per job, feed the job input on
//! stdin and enforce a wall-clock timeout. A job that times out is reported,
//! not raised; only a facility that cannot run the job at all is an error.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tracing::debug;
use uuid::Uuid;

use crate::error::ExecutionError;
use crate::pipeline::config::{ExecutionConfig, FacilityKind};

/// Bytes kept from each of stdout and stderr. Older output is dropped, so the
/// verdict line and the end of a traceback survive a chatty candidate.
pub const MAX_CAPTURED_BYTES: usize = 1 << 20;

/// One program run: interpreter source, stdin payload and time limit.
#[derive(Debug, Clone)]
pub struct ExecutionJob {
    /// Python source passed with `-c`.
    pub source: String,
    /// Bytes written to the program's stdin.
    pub input: String,
    pub timeout: Duration,
}

/// What happened to one job.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// `None` when the process was killed or timed out.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration: Duration,
}

/// A place that can run one Python job in isolation.
#[async_trait]
pub trait ExecutionFacility: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Run a job to completion or timeout.
    async fn run(&self, job: &ExecutionJob) -> Result<ExecutionReport, ExecutionError>;
}

/// Builds the facility selected by `config`.
pub fn facility_from_config(config: &ExecutionConfig) -> Box<dyn ExecutionFacility> {
    match config.facility {
        FacilityKind::Subprocess => Box::new(SubprocessFacility::new(config.python_bin.clone())),
        FacilityKind::Docker => Box::new(DockerFacility::from_config(config)),
    }
}

/// Runs jobs with a local interpreter in isolated mode (`-I`).
#[derive(Debug, Clone)]
pub struct SubprocessFacility {
    python_bin: String,
}

impl SubprocessFacility {
    pub fn new(python_bin: impl Into<String>) -> Self {
        Self {
            python_bin: python_bin.into(),
        }
    }
}

impl Default for SubprocessFacility {
    fn default() -> Self {
        Self::new("python3")
    }
}

#[async_trait]
impl ExecutionFacility for SubprocessFacility {
    fn name(&self) -> &str {
        "subprocess"
    }

    async fn run(&self, job: &ExecutionJob) -> Result<ExecutionReport, ExecutionError> {
        let mut cmd = Command::new(&self.python_bin);
        cmd.args(["-I", "-c", &job.source]);
        run_with_timeout(cmd, &self.python_bin, job).await
    }
}

/// Runs jobs in a throwaway container: `docker run --rm -i` with resource
/// caps and, by default, no network.
#[derive(Debug, Clone)]
pub struct DockerFacility {
    image: String,
    memory_mb: u64,
    cpu_cores: f64,
    network_disabled: bool,
}

impl DockerFacility {
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self {
            image: config.docker_image.clone(),
            memory_mb: config.docker_memory_mb,
            cpu_cores: config.docker_cpu_cores,
            network_disabled: config.network_disabled,
        }
    }

    /// Arguments for `docker`, ending with the interpreter invocation.
    pub fn docker_run_args(&self, container: &str, source: &str) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-i".to_string(),
            "--name".to_string(),
            container.to_string(),
        ];

        // Resource limits
        args.push(format!("--memory={}m", self.memory_mb));
        if self.cpu_cores > 0.0 {
            args.push(format!("--cpus={}", self.cpu_cores));
        }
        if self.network_disabled {
            args.push("--network=none".to_string());
        }

        args.push(self.image.clone());
        args.extend([
            "python3".to_string(),
            "-I".to_string(),
            "-c".to_string(),
            source.to_string(),
        ]);
        args
    }
}

#[async_trait]
impl ExecutionFacility for DockerFacility {
    fn name(&self) -> &str {
        "docker"
    }

    async fn run(&self, job: &ExecutionJob) -> Result<ExecutionReport, ExecutionError> {
        let container = format!("cot-bench-{}", Uuid::new_v4().simple());
        let mut cmd = Command::new("docker");
        cmd.args(self.docker_run_args(&container, &job.source));

        let report = run_with_timeout(cmd, "docker", job).await?;
        if report.timed_out {
            // Killing the client does not stop the container.
            docker_rm(&container).await;
        } else if report.exit_code == Some(125) {
            return Err(ExecutionError::DockerFailed(report.stderr.trim().to_string()));
        }
        Ok(report)
    }
}

async fn docker_rm(container: &str) {
    if let Err(e) = Command::new("docker")
        .args(["rm", "-f", container])
        .output()
        .await
    {
        debug!(container = container, error = %e, "Failed to remove container (may not exist)");
    }
}

/// Spawns `cmd` and, all within the job timeout, feeds the job input,
/// drains both output pipes and waits for exit. The child is killed when
/// the wait is abandoned.
async fn run_with_timeout(
    mut cmd: Command,
    program: &str,
    job: &ExecutionJob,
) -> Result<ExecutionReport, ExecutionError> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let started = Instant::now();
    let mut child = cmd.spawn().map_err(|e| ExecutionError::SpawnFailed {
        program: program.to_string(),
        reason: e.to_string(),
    })?;

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let io = async {
        let feed = async {
            match stdin {
                Some(stdin) => feed_input(stdin, job.input.as_bytes()).await,
                None => Ok(()),
            }
        };
        let out = async {
            match stdout {
                Some(reader) => read_tail(reader, MAX_CAPTURED_BYTES).await,
                None => Ok(Vec::new()),
            }
        };
        let err = async {
            match stderr {
                Some(reader) => read_tail(reader, MAX_CAPTURED_BYTES).await,
                None => Ok(Vec::new()),
            }
        };
        let (fed, out, err, status) = tokio::join!(feed, out, err, child.wait());
        fed?;
        Ok::<_, ExecutionError>((status?, out?, err?))
    };

    match tokio::time::timeout(job.timeout, io).await {
        Ok(Ok((status, stdout, stderr))) => Ok(ExecutionReport {
            exit_code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            timed_out: false,
            duration: started.elapsed(),
        }),
        Ok(Err(e)) => Err(e),
        Err(_) => Ok(ExecutionReport {
            exit_code: None,
            stdout: String::new(),
            stderr: format!("timed out after {}s", job.timeout.as_secs_f64()),
            timed_out: true,
            duration: started.elapsed(),
        }),
    }
}

/// Writes the job input and closes stdin. A child that exits without
/// reading its input is not a facility failure.
async fn feed_input(mut stdin: ChildStdin, input: &[u8]) -> Result<(), ExecutionError> {
    let written = async {
        stdin.write_all(input).await?;
        stdin.shutdown().await
    }
    .await;
    match written {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            debug!("Child closed stdin before reading the whole job input");
            Ok(())
        }
        Err(e) => Err(ExecutionError::InputFailed(e.to_string())),
    }
}

/// Reads `reader` to the end, keeping at most the last `cap` bytes.
async fn read_tail<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> std::io::Result<Vec<u8>> {
    let mut kept = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        kept.extend_from_slice(&chunk[..n]);
        if kept.len() > cap.saturating_mul(2) {
            let excess = kept.len() - cap;
            kept.drain(..excess);
        }
    }
    if kept.len() > cap {
        let excess = kept.len() - cap;
        kept.drain(..excess);
    }
    Ok(kept)
}
