use crate::error::{EbiError, EbiResult, ErrorContext};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, error};

/// Exit status and captured output of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// An external tool invoked with an argument list.
#[async_trait]
pub trait ExternalCommand: Send + Sync {
    async fn run(&self, args: &[String]) -> EbiResult<CommandOutput>;
}

/// Pass-through flags shared by every `eb` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EbCliOptions {
    pub profile: Option<String>,
    pub region: Option<String>,
    /// Minutes before `eb deploy` gives up waiting.
    pub timeout: Option<String>,
}

impl EbCliOptions {
    fn push_profile_and_region(&self, args: &mut Vec<String>) {
        if let Some(profile) = &self.profile {
            args.push(format!("--profile={}", profile));
        }
        if let Some(region) = &self.region {
            args.push(format!("--region={}", region));
        }
    }
}

/// The real `eb` executable. Output is echoed to the terminal as it arrives
/// and captured at the same time.
#[derive(Debug, Clone)]
pub struct EbCli {
    program: String,
}

impl EbCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl ExternalCommand for EbCli {
    async fn run(&self, args: &[String]) -> EbiResult<CommandOutput> {
        debug!(program = %self.program, ?args, "running external command");

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                EbiError::io(e, format!("failed to start '{}'", self.program))
                    .with_context(ErrorContext::new("run_eb").with_info(args.join(" ")))
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (stdout, stderr) = tokio::join!(
            echo_lines(stdout, false),
            echo_lines(stderr, true)
        );
        let status = child.wait().await?;

        Ok(CommandOutput {
            // Killed by a signal: report a plain failure.
            code: status.code().unwrap_or(1),
            stdout: stdout?,
            stderr: stderr?,
        })
    }
}

/// Drain `stream` to the end, echoing each line as it arrives.
///
/// Lines are decoded lossily; the pipe is never abandoned early, since the
/// child would die on its next write.
async fn echo_lines<R>(stream: Option<R>, to_stderr: bool) -> EbiResult<String>
where
    R: AsyncRead + Unpin,
{
    let mut captured = String::new();
    let Some(stream) = stream else {
        return Ok(captured);
    };

    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if to_stderr {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
        captured.push_str(line);
        captured.push('\n');
    }
    Ok(captured)
}

/// Run `args` and turn a non-zero exit into `EbiError::Subprocess`.
pub async fn run_checked(
    command: &dyn ExternalCommand,
    args: Vec<String>,
    what: &str,
) -> EbiResult<CommandOutput> {
    let output = command.run(&args).await?;
    if !output.success() {
        error!(code = output.code, "{} failed", what);
        return Err(EbiError::subprocess(output.code, format!("{} failed", what))
            .with_context(ErrorContext::new(what).with_info(args.join(" "))));
    }
    Ok(output)
}

/// `eb deploy <env> --version=<v> [--profile] [--region] [--timeout] [--staged]`
pub fn deploy_args(
    environment: &str,
    version_label: &str,
    options: &EbCliOptions,
    staged: bool,
) -> Vec<String> {
    let mut args = vec![
        "deploy".to_string(),
        environment.to_string(),
        format!("--version={}", version_label),
    ];
    options.push_profile_and_region(&mut args);
    if let Some(timeout) = &options.timeout {
        args.push(format!("--timeout={}", timeout));
    }
    if staged {
        args.push("--staged".to_string());
    }
    args
}

/// `eb clone <source> --exact --timeout=<m> --clone_name=<n> --cname=<c> [...]`
pub fn clone_args(
    source_environment: &str,
    clone_name: &str,
    cname: &str,
    timeout_minutes: u32,
    options: &EbCliOptions,
) -> Vec<String> {
    let mut args = vec![
        "clone".to_string(),
        source_environment.to_string(),
        "--exact".to_string(),
        format!("--timeout={}", timeout_minutes),
        format!("--clone_name={}", clone_name),
        format!("--cname={}", cname),
    ];
    options.push_profile_and_region(&mut args);
    args
}

/// `eb create <env> --timeout=<m> --version=<v> --cname=<c> [--profile] [--cfg] [--region]`
pub fn create_args(
    environment: &str,
    version_label: &str,
    cname: &str,
    timeout_minutes: u32,
    cfg_name: Option<&str>,
    options: &EbCliOptions,
) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        environment.to_string(),
        format!("--timeout={}", timeout_minutes),
        format!("--version={}", version_label),
        format!("--cname={}", cname),
    ];
    if let Some(profile) = &options.profile {
        args.push(format!("--profile={}", profile));
    }
    if let Some(cfg) = cfg_name {
        args.push(format!("--cfg={}", cfg));
    }
    if let Some(region) = &options.region {
        args.push(format!("--region={}", region));
    }
    args
}

/// `eb config put <name> --timeout=<m> [--profile] [--region]`
pub fn config_put_args(name: &str, timeout_minutes: u32, options: &EbCliOptions) -> Vec<String> {
    let mut args = vec![
        "config".to_string(),
        "put".to_string(),
        name.to_string(),
        format!("--timeout={}", timeout_minutes),
    ];
    options.push_profile_and_region(&mut args);
    args
}
