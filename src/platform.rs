//! devcert 플랫폼 계층
//!
//! 신뢰 설치, hosts 편집, 보호 파일 읽기/쓰기를 한 객체로 묶습니다.
//! 보호 파일 마스터키 캐시는 이 객체가 가진 `KeyProvider` 하나를 공유합니다.

use crate::browser::{BrowserLauncher, OpenBrowserLauncher};
use crate::config::Config;
use crate::error::Result;
use crate::exec::{CommandRunner, ElevatedRunner, ShellRunner, SudoRunner};
use crate::hosts::{HostsFileEditor, HostsUpdate};
use crate::secrets::{
    CipherScheme, CredentialVault, EnvPasswordPrompt, KeyProvider, PasswordPrompt,
    StdinPasswordPrompt,
};
use crate::trust::{InstallReport, TrustStoreInstaller};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// 외부 수단 묶음 (권한 실행, 브라우저, 비밀번호 입력)
pub struct Collaborators {
    pub runner: Arc<dyn CommandRunner>,
    pub elevated: Arc<dyn ElevatedRunner>,
    pub browser: Arc<dyn BrowserLauncher>,
    pub prompt: Arc<dyn PasswordPrompt>,
}

impl Collaborators {
    /// 실제 시스템 구현으로 구성
    ///
    /// `password_env`가 설정되어 있으면 환경 변수에서, 아니면 터미널에서 비밀번호를 읽습니다.
    pub fn system(config: &Config) -> Self {
        let prompt: Arc<dyn PasswordPrompt> = if std::env::var_os(&config.password_env).is_some() {
            Arc::new(EnvPasswordPrompt::new(config.password_env.clone()))
        } else {
            Arc::new(StdinPasswordPrompt::default())
        };

        Self {
            runner: Arc::new(ShellRunner),
            elevated: Arc::new(SudoRunner),
            browser: Arc::new(OpenBrowserLauncher),
            prompt,
        }
    }
}

pub struct DevcertPlatform {
    installer: TrustStoreInstaller,
    hosts: HostsFileEditor,
    vault: CredentialVault,
}

impl DevcertPlatform {
    pub fn new(config: &Config, collaborators: Collaborators) -> Self {
        let keys = Arc::new(KeyProvider::new(collaborators.prompt));
        Self::with_key_provider(
            config,
            collaborators.runner,
            collaborators.elevated,
            collaborators.browser,
            keys,
        )
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config, Collaborators::system(config))
    }

    /// 이미 있는 마스터키 캐시를 공유해야 할 때 사용
    pub fn with_key_provider(
        config: &Config,
        runner: Arc<dyn CommandRunner>,
        elevated: Arc<dyn ElevatedRunner>,
        browser: Arc<dyn BrowserLauncher>,
        keys: Arc<KeyProvider>,
    ) -> Self {
        Self {
            installer: TrustStoreInstaller::new(runner, browser, config.trust_settings()),
            hosts: HostsFileEditor::new(&config.hosts_file, &config.loopback_address, elevated),
            vault: CredentialVault::new(keys, config.cipher),
        }
    }

    pub fn key_provider(&self) -> &Arc<KeyProvider> {
        self.vault.keys()
    }

    pub fn cipher(&self) -> CipherScheme {
        self.vault.scheme()
    }

    /// 루트 인증서를 OS/브라우저 신뢰 저장소에 설치 (실패해도 오류 없음)
    pub async fn add_to_trust_stores(&self, certificate_path: &Path) -> InstallReport {
        let report = self.installer.install(certificate_path).await;
        for step in report.failures() {
            warn!("could not add devcert root to the {}", step.target);
        }
        report
    }

    pub async fn add_domain_to_host_file_if_missing(&self, domain: &str) -> Result<HostsUpdate> {
        Ok(self.hosts.ensure_domain(domain).await?)
    }

    pub async fn read_protected_file(&self, path: &Path) -> Result<String> {
        Ok(self.vault.read(path).await?)
    }

    pub async fn write_protected_file(&self, path: &Path, contents: &str) -> Result<()> {
        Ok(self.vault.write(path, contents).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserError;
    use crate::error::DevcertError;
    use crate::exec::{CommandError, CommandOutput};
    use crate::secrets::key::tests::ScriptedPrompt;
    use crate::trust::TrustTarget;
    use async_trait::async_trait;
    use std::fs;
    use tempfile::tempdir;

    struct FailingRunner;

    #[async_trait]
    impl CommandRunner for FailingRunner {
        async fn run(&self, command: &str) -> std::result::Result<CommandOutput, CommandError> {
            Err(CommandError::Spawn {
                command: command.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "certutil not found"),
            })
        }
    }

    struct NoBrowser;

    #[async_trait]
    impl BrowserLauncher for NoBrowser {
        async fn open_certificate(
            &self,
            launch_command: &str,
            _certificate_path: &Path,
        ) -> std::result::Result<(), BrowserError> {
            Err(BrowserError::Launch {
                command: launch_command.to_string(),
                message: "not installed".to_string(),
            })
        }
    }

    fn platform(
        config: &Config,
        elevated: Arc<dyn ElevatedRunner>,
        prompt: Arc<ScriptedPrompt>,
    ) -> DevcertPlatform {
        DevcertPlatform::new(
            config,
            Collaborators {
                runner: Arc::new(FailingRunner),
                elevated,
                browser: Arc::new(NoBrowser),
                prompt,
            },
        )
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_end_to_end_with_failing_collaborators() {
        use crate::exec::tests::InlineShellRunner;

        let dir = tempdir().unwrap();
        let hosts = dir.path().join("hosts");
        fs::write(&hosts, "127.0.0.1 localhost\n").unwrap();

        let config = Config {
            hosts_file: hosts.clone(),
            ..Default::default()
        };
        let prompt = ScriptedPrompt::new(&["pw"]);
        let platform = platform(&config, Arc::new(InlineShellRunner::default()), prompt.clone());

        // 신뢰 설치: 두 단계 모두 실패해도 완료
        let report = platform
            .add_to_trust_stores(&dir.path().join("ca.crt"))
            .await;
        assert!(report.completed());
        assert_eq!(report.steps[0].target, TrustTarget::OsStore);
        assert_eq!(report.failures().count(), 2);

        // hosts: 추가 후 재실행은 no-op
        assert_eq!(
            platform
                .add_domain_to_host_file_if_missing("devcert.local")
                .await
                .unwrap(),
            HostsUpdate::Appended
        );
        assert_eq!(
            platform
                .add_domain_to_host_file_if_missing("devcert.local")
                .await
                .unwrap(),
            HostsUpdate::AlreadyPresent
        );
        let contents = fs::read_to_string(&hosts).unwrap();
        assert_eq!(contents.matches("devcert.local").count(), 1);
        assert!(contents.contains("127.0.0.1  devcert.local"));

        // 보호 파일: 프롬프트 1회
        let key_path = dir.path().join("ca.key");
        platform
            .write_protected_file(&key_path, "private key")
            .await
            .unwrap();
        assert_eq!(
            platform.read_protected_file(&key_path).await.unwrap(),
            "private key"
        );
        assert_eq!(prompt.calls(), 1);
    }

    #[tokio::test]
    async fn test_vault_errors_surface_with_code() {
        let dir = tempdir().unwrap();
        let platform = platform(
            &Config::default(),
            Arc::new(SudoRunner),
            ScriptedPrompt::new(&["pw"]),
        );

        let err = platform
            .read_protected_file(&dir.path().join("missing.key"))
            .await
            .unwrap_err();
        assert!(matches!(err, DevcertError::Vault(_)));
        assert_eq!(err.code(), "IO_ERROR");
    }
}
