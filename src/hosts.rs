//! 시스템 hosts 파일 편집
//!
//! 도메인이 hosts 파일 어딘가에 문자열로 존재하면 이미 등록된 것으로 간주합니다.
//! 라인 구조는 파싱하지 않으며, 기존 라인을 다시 쓰지 않고 append만 합니다.

use crate::exec::{CommandError, ElevatedRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// hosts 파일 오류
#[derive(Debug, thiserror::Error)]
pub enum HostsError {
    #[error("Failed to read hosts file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid domain: {0:?}")]
    InvalidDomain(String),

    #[error("Privileged hosts file update failed: {0}")]
    Privileged(#[from] CommandError),
}

/// `ensure_domain` 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostsUpdate {
    AlreadyPresent,
    Appended,
}

/// hosts 라인 포맷: `<loopback>  <domain>`
pub fn hosts_entry(loopback: &str, domain: &str) -> String {
    format!("{}  {}", loopback, domain)
}

/// 셸 명령에 그대로 들어가므로 호스트명에 쓰이는 문자만 허용
fn validate_domain(domain: &str) -> Result<(), HostsError> {
    let valid = !domain.is_empty()
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '*'));
    if valid {
        Ok(())
    } else {
        Err(HostsError::InvalidDomain(domain.to_string()))
    }
}

/// `entry`를 한 줄로 append하는 셸 명령
///
/// `entry`는 `validate_domain`을 통과한 값이므로 따옴표 처리만 합니다.
#[cfg(not(windows))]
fn append_command(path: &Path, entry: &str, newline_first: bool) -> String {
    let format = if newline_first { "\\n%s\\n" } else { "%s\\n" };
    format!(
        "printf '{}' {} >> {}",
        format,
        sh_quote(entry),
        sh_quote(&path.display().to_string())
    )
}

#[cfg(not(windows))]
fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// cmd의 `echo`는 인자 공백을 그대로 출력하고, `echo.`은 빈 줄을 출력
#[cfg(windows)]
fn append_command(path: &Path, entry: &str, newline_first: bool) -> String {
    if newline_first {
        format!("(echo.&echo {})>> \"{}\"", entry, path.display())
    } else {
        format!("(echo {})>> \"{}\"", entry, path.display())
    }
}

pub struct HostsFileEditor {
    path: PathBuf,
    loopback: String,
    runner: Arc<dyn ElevatedRunner>,
}

impl HostsFileEditor {
    pub fn new(
        path: impl Into<PathBuf>,
        loopback: impl Into<String>,
        runner: Arc<dyn ElevatedRunner>,
    ) -> Self {
        Self {
            path: path.into(),
            loopback: loopback.into(),
            runner,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 도메인이 hosts 파일에 없으면 loopback 매핑을 추가
    ///
    /// 권한 상승 append 실패는 치명적 오류로 그대로 반환합니다.
    pub async fn ensure_domain(&self, domain: &str) -> Result<HostsUpdate, HostsError> {
        validate_domain(domain)?;

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| HostsError::Io {
                path: self.path.clone(),
                source,
            })?;

        if contents.contains(domain) {
            debug!(domain, "domain already present in hosts file");
            return Ok(HostsUpdate::AlreadyPresent);
        }

        // 마지막 줄에 개행이 없으면 새 라인이 기존 라인에 붙으므로 먼저 개행
        let newline_first = !contents.is_empty() && !contents.ends_with('\n');
        let command = append_command(
            &self.path,
            &hosts_entry(&self.loopback, domain),
            newline_first,
        );
        self.runner.run_elevated(&command).await?;

        info!(domain, hosts = %self.path.display(), "added domain to hosts file");
        Ok(HostsUpdate::Appended)
    }
}
