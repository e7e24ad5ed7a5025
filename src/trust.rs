//! 루트 인증서 신뢰 설치
//!
//! Windows는 대부분의 앱(IE, Chrome, 시스템 유틸)이 OS 신뢰 저장소를 사용하며,
//! 이는 `certutil`(NSS certutil과는 다른 Windows 도구)로 갱신합니다.
//! Firefox는 자체 저장소를 쓰고 Windows에서 NSS certutil을 구하기 어려우므로
//! 브라우저를 띄워 사용자가 직접 가져오게 합니다.
//!
//! 두 단계 모두 best-effort: 서로의 결과와 무관하게 항상 실행되고, 실패해도 오류를 반환하지 않습니다.

use crate::browser::BrowserLauncher;
use crate::exec::CommandRunner;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 인증서 경로 치환 자리
pub const CERT_PLACEHOLDER: &str = "{cert}";

pub const DEFAULT_OS_STORE_COMMAND: &str = "certutil -addstore -user root {cert}";
pub const DEFAULT_BROWSER_COMMAND: &str = "firefox";

/// 인증서를 넣을 대상 저장소
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "camelCase")]
pub enum TrustTarget {
    OsStore,
    Browser(String),
}

impl fmt::Display for TrustTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustTarget::OsStore => write!(f, "OS trust store"),
            TrustTarget::Browser(name) => write!(f, "{} trust store", name),
        }
    }
}

/// 단계별 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StepStatus {
    Installed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub target: TrustTarget,
    pub status: StepStatus,
}

impl StepOutcome {
    pub fn is_installed(&self) -> bool {
        self.status == StepStatus::Installed
    }
}

/// 설치 결과 요약
///
/// 개별 단계 실패는 무시 가능하므로 `completed()`는 항상 true입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReport {
    pub steps: Vec<StepOutcome>,
}

impl InstallReport {
    pub fn completed(&self) -> bool {
        true
    }

    pub fn trusted_by_os(&self) -> bool {
        self.steps
            .iter()
            .any(|s| s.target == TrustTarget::OsStore && s.is_installed())
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| !s.is_installed())
    }
}

/// 설치 명령 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustSettings {
    /// `{cert}` 자리에 인증서 경로가 들어가는 OS 저장소 등록 명령
    pub os_store_command: String,
    /// 인증서 가져오기에 사용할 브라우저
    pub browser_command: String,
}

impl Default for TrustSettings {
    fn default() -> Self {
        Self {
            os_store_command: DEFAULT_OS_STORE_COMMAND.to_string(),
            browser_command: DEFAULT_BROWSER_COMMAND.to_string(),
        }
    }
}

impl TrustSettings {
    /// 경로는 공백이 있어도 한 인자가 되도록 큰따옴표로 감싸서 넣음
    pub fn os_store_command_for(&self, certificate_path: &Path) -> String {
        let path = format!("\"{}\"", certificate_path.display());
        if self.os_store_command.contains(CERT_PLACEHOLDER) {
            self.os_store_command.replace(CERT_PLACEHOLDER, &path)
        } else {
            format!("{} {}", self.os_store_command, path)
        }
    }
}

pub struct TrustStoreInstaller {
    runner: Arc<dyn CommandRunner>,
    browser: Arc<dyn BrowserLauncher>,
    settings: TrustSettings,
}

impl TrustStoreInstaller {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        browser: Arc<dyn BrowserLauncher>,
        settings: TrustSettings,
    ) -> Self {
        Self {
            runner,
            browser,
            settings,
        }
    }

    pub fn settings(&self) -> &TrustSettings {
        &self.settings
    }

    /// OS 저장소와 브라우저 저장소에 인증서 설치 (단축 평가 없음)
    pub async fn install(&self, certificate_path: &Path) -> InstallReport {
        let steps = vec![
            self.install_os_store(certificate_path).await,
            self.install_browser(certificate_path).await,
        ];
        InstallReport { steps }
    }

    /// 실패 시 명령 출력은 경고 로그로 남기고 계속 진행
    async fn install_os_store(&self, certificate_path: &Path) -> StepOutcome {
        debug!("adding devcert root to OS trust store");
        let command = self.settings.os_store_command_for(certificate_path);

        let status = match self.runner.run(&command).await {
            Ok(_) => {
                info!(cert = %certificate_path.display(), "devcert root added to OS trust store");
                StepStatus::Installed
            }
            Err(e) => {
                for fragment in e.output_fragments() {
                    warn!("{}", fragment.trim_end());
                }
                warn!(error = %e, "failed to add devcert root to OS trust store");
                StepStatus::Failed(e.to_string())
            }
        };

        StepOutcome {
            target: TrustTarget::OsStore,
            status,
        }
    }

    /// 실패는 조용히 무시 (대부분 브라우저 미설치)
    async fn install_browser(&self, certificate_path: &Path) -> StepOutcome {
        let browser = &self.settings.browser_command;
        debug!(browser = %browser, "adding devcert root to browser trust store");

        let status = match self.browser.open_certificate(browser, certificate_path).await {
            Ok(()) => StepStatus::Installed,
            Err(e) => {
                debug!(error = %e, "browser import skipped");
                StepStatus::Failed(e.to_string())
            }
        };

        StepOutcome {
            target: TrustTarget::Browser(browser.clone()),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserError;
    use crate::exec::{CommandError, CommandOutput};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRunner {
        fail: bool,
        commands: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, command: &str) -> Result<CommandOutput, CommandError> {
            self.commands.lock().unwrap().push(command.to_string());
            if self.fail {
                Err(CommandError::Failed {
                    command: command.to_string(),
                    code: Some(-2147024891),
                    stdout: "CertUtil: -addstore command FAILED".to_string(),
                    stderr: "Access is denied.".to_string(),
                })
            } else {
                Ok(CommandOutput::default())
            }
        }
    }

    #[derive(Default)]
    struct RecordingBrowser {
        fail: bool,
        opened: Mutex<Vec<(String, PathBuf)>>,
    }

    #[async_trait]
    impl BrowserLauncher for RecordingBrowser {
        async fn open_certificate(
            &self,
            launch_command: &str,
            certificate_path: &Path,
        ) -> Result<(), BrowserError> {
            self.opened
                .lock()
                .unwrap()
                .push((launch_command.to_string(), certificate_path.to_path_buf()));
            if self.fail {
                Err(BrowserError::Launch {
                    command: launch_command.to_string(),
                    message: "program not found".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn installer(
        runner: Arc<RecordingRunner>,
        browser: Arc<RecordingBrowser>,
    ) -> TrustStoreInstaller {
        TrustStoreInstaller::new(runner, browser, TrustSettings::default())
    }

    #[tokio::test]
    async fn test_installs_into_both_stores() {
        let runner = Arc::new(RecordingRunner::default());
        let browser = Arc::new(RecordingBrowser::default());
        let cert = Path::new("C:\\devcert\\devcert-ca-root.crt");

        let report = installer(runner.clone(), browser.clone()).install(cert).await;

        assert!(report.completed());
        assert!(report.trusted_by_os());
        assert_eq!(report.failures().count(), 0);
        assert_eq!(
            runner.commands.lock().unwrap().as_slice(),
            ["certutil -addstore -user root \"C:\\devcert\\devcert-ca-root.crt\""]
        );
        assert_eq!(
            browser.opened.lock().unwrap().as_slice(),
            [("firefox".to_string(), cert.to_path_buf())]
        );
    }

    #[tokio::test]
    async fn test_os_store_failure_still_runs_browser_step() {
        let runner = Arc::new(RecordingRunner {
            fail: true,
            ..Default::default()
        });
        let browser = Arc::new(RecordingBrowser::default());

        let report = installer(runner, browser.clone())
            .install(Path::new("ca.crt"))
            .await;

        assert!(report.completed());
        assert!(!report.trusted_by_os());
        assert_eq!(browser.opened.lock().unwrap().len(), 1);
        assert_eq!(report.steps[1].status, StepStatus::Installed);
        let failed: Vec<_> = report.failures().map(|s| s.target.clone()).collect();
        assert_eq!(failed, vec![TrustTarget::OsStore]);
    }

    #[tokio::test]
    async fn test_missing_browser_is_absorbed() {
        let runner = Arc::new(RecordingRunner::default());
        let browser = Arc::new(RecordingBrowser {
            fail: true,
            ..Default::default()
        });

        let report = installer(runner, browser).install(Path::new("ca.crt")).await;

        assert!(report.completed());
        assert!(report.trusted_by_os());
        assert_eq!(
            report.steps[1].target,
            TrustTarget::Browser("firefox".to_string())
        );
        assert!(matches!(report.steps[1].status, StepStatus::Failed(_)));
    }

    #[tokio::test]
    async fn test_both_steps_failing_still_completes() {
        let runner = Arc::new(RecordingRunner {
            fail: true,
            ..Default::default()
        });
        let browser = Arc::new(RecordingBrowser {
            fail: true,
            ..Default::default()
        });

        let report = installer(runner, browser).install(Path::new("ca.crt")).await;
        assert!(report.completed());
        assert_eq!(report.failures().count(), 2);
    }

    #[test]
    fn test_command_template_without_placeholder_appends_path() {
        let settings = TrustSettings {
            os_store_command: "certutil -addstore root".to_string(),
            ..Default::default()
        };
        assert_eq!(
            settings.os_store_command_for(Path::new("ca.crt")),
            "certutil -addstore root \"ca.crt\""
        );
    }

    #[test]
    fn test_certificate_path_with_spaces_is_quoted() {
        let settings = TrustSettings::default();
        assert_eq!(
            settings.os_store_command_for(Path::new("C:\\Users\\Jane Doe\\devcert\\ca.crt")),
            "certutil -addstore -user root \"C:\\Users\\Jane Doe\\devcert\\ca.crt\""
        );
    }
}
