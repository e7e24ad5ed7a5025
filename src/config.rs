//! 설정
//!
//! 우선순위: 기본값 < JSON 설정 파일 < `.env` / 환경 변수 (`DEVCERT_*`)

use crate::secrets::CipherScheme;
use crate::trust::{TrustSettings, DEFAULT_BROWSER_COMMAND, DEFAULT_OS_STORE_COMMAND};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(windows)]
pub const DEFAULT_HOSTS_FILE: &str = "C:\\Windows\\System32\\Drivers\\etc\\hosts";
#[cfg(not(windows))]
pub const DEFAULT_HOSTS_FILE: &str = "/etc/hosts";

pub const DEFAULT_LOOPBACK: &str = "127.0.0.1";
pub const DEFAULT_PASSWORD_ENV: &str = "DEVCERT_PASSWORD";

/// 설정 오류
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub hosts_file: PathBuf,
    pub loopback_address: String,
    pub os_store_command: String,
    pub browser_command: String,
    pub cipher: CipherScheme,
    /// 비밀번호를 읽을 환경 변수 (설정되어 있지 않으면 터미널에서 입력)
    pub password_env: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hosts_file: PathBuf::from(DEFAULT_HOSTS_FILE),
            loopback_address: DEFAULT_LOOPBACK.to_string(),
            os_store_command: DEFAULT_OS_STORE_COMMAND.to_string(),
            browser_command: DEFAULT_BROWSER_COMMAND.to_string(),
            cipher: CipherScheme::default(),
            password_env: DEFAULT_PASSWORD_ENV.to_string(),
        }
    }
}

impl Config {
    /// JSON 설정 파일 로드 (없는 키는 기본값)
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 기본값에 `.env` 및 환경 변수 적용
    pub fn from_env() -> Result<Self, ConfigError> {
        // .env 파일은 없어도 됨
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// `DEVCERT_*` 값 덮어쓰기 (빈 값은 무시)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DEVCERT_HOSTS_FILE") {
            self.hosts_file = PathBuf::from(v);
        }
        if let Some(v) = get("DEVCERT_LOOPBACK") {
            self.loopback_address = v;
        }
        if let Some(v) = get("DEVCERT_OS_STORE_COMMAND") {
            self.os_store_command = v;
        }
        if let Some(v) = get("DEVCERT_BROWSER") {
            self.browser_command = v;
        }
        if let Some(v) = get("DEVCERT_CIPHER") {
            self.cipher = CipherScheme::parse(&v).ok_or_else(|| ConfigError::InvalidValue {
                key: "DEVCERT_CIPHER".to_string(),
                value: v.clone(),
            })?;
        }
        if let Some(v) = get("DEVCERT_PASSWORD_ENV") {
            self.password_env = v;
        }
        Ok(())
    }

    pub fn trust_settings(&self) -> TrustSettings {
        TrustSettings {
            os_store_command: self.os_store_command.clone(),
            browser_command: self.browser_command.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_load_partial_json_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("devcert.json");
        std::fs::write(&path, r#"{ "browserCommand": "waterfox", "cipher": "sealed" }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.browser_command, "waterfox");
        assert_eq!(config.cipher, CipherScheme::Sealed);
        assert_eq!(config.loopback_address, DEFAULT_LOOPBACK);
        assert_eq!(config.hosts_file, PathBuf::from(DEFAULT_HOSTS_FILE));
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("devcert.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DEVCERT_HOSTS_FILE", "/tmp/hosts"),
            ("DEVCERT_CIPHER", "SEALED"),
            ("DEVCERT_BROWSER", "   "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.hosts_file, PathBuf::from("/tmp/hosts"));
        assert_eq!(config.cipher, CipherScheme::Sealed);
        assert_eq!(config.browser_command, DEFAULT_BROWSER_COMMAND);
    }

    #[test]
    fn test_invalid_cipher_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_env(|k| (k == "DEVCERT_CIPHER").then(|| "des".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
