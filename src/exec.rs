//! 외부 명령 실행
//!
//! - `CommandRunner`: 일반 권한으로 셸 명령 실행 (certutil 등)
//! - `ElevatedRunner`: 관리자 권한으로 셸 명령 실행 (hosts 파일 수정 등)
//!
//! 두 trait 모두 실패 시 stdout/stderr 조각을 담은 `CommandError`를 반환합니다.

use async_trait::async_trait;
use std::process::Output;
use tokio::process::Command;

/// 명령 실행 오류
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {code:?}")]
    Failed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

impl CommandError {
    /// 실패한 명령이 남긴 출력 조각 (비어 있는 것은 제외)
    pub fn output_fragments(&self) -> Vec<&str> {
        match self {
            CommandError::Spawn { .. } => Vec::new(),
            CommandError::Failed { stdout, stderr, .. } => [stdout.as_str(), stderr.as_str()]
                .into_iter()
                .filter(|s| !s.trim().is_empty())
                .collect(),
        }
    }
}

/// 성공한 명령의 출력
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// 일반 권한 명령 실행기
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> Result<CommandOutput, CommandError>;
}

/// 관리자 권한 명령 실행기
#[async_trait]
pub trait ElevatedRunner: Send + Sync {
    async fn run_elevated(&self, command: &str) -> Result<CommandOutput, CommandError>;
}

/// 플랫폼 기본 셸(`cmd /C`, `sh -c`)로 명령을 실행
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput, CommandError> {
        let output = shell_command(command)
            .output()
            .await
            .map_err(|source| CommandError::Spawn {
                command: command.to_string(),
                source,
            })?;
        collect_output(command, output)
    }
}

/// 권한 상승 후 명령을 실행
///
/// Unix: `sudo sh -c <command>`
/// Windows: PowerShell `Start-Process -Verb RunAs -Wait` (UAC 프롬프트)
#[derive(Debug, Clone, Default)]
pub struct SudoRunner;

#[async_trait]
impl ElevatedRunner for SudoRunner {
    async fn run_elevated(&self, command: &str) -> Result<CommandOutput, CommandError> {
        let output = elevated_command(command)
            .output()
            .await
            .map_err(|source| CommandError::Spawn {
                command: command.to_string(),
                source,
            })?;
        collect_output(command, output)
    }
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn elevated_command(command: &str) -> Command {
    // PowerShell single-quoted 문자열: ' 는 '' 로 이스케이프
    let escaped = command.replace('\'', "''");
    let script = format!(
        "$p = Start-Process -FilePath cmd.exe -ArgumentList '/C {}' -Verb RunAs -Wait -PassThru -WindowStyle Hidden; exit $p.ExitCode",
        escaped
    );
    let mut cmd = Command::new("powershell");
    cmd.args(["-NoProfile", "-NonInteractive", "-Command", &script]);
    cmd
}

#[cfg(not(windows))]
fn elevated_command(command: &str) -> Command {
    let mut cmd = Command::new("sudo");
    cmd.args(["sh", "-c", command]);
    cmd
}

fn collect_output(command: &str, output: Output) -> Result<CommandOutput, CommandError> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if output.status.success() {
        Ok(CommandOutput { stdout, stderr })
    } else {
        Err(CommandError::Failed {
            command: command.to_string(),
            code: output.status.code(),
            stdout,
            stderr,
        })
    }
}
