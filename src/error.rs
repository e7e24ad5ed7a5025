//! devcert Error Types
//!
//! 플랫폼 계층 전역 에러 타입 정의

use crate::browser::BrowserError;
use crate::config::ConfigError;
use crate::exec::CommandError;
use crate::hosts::HostsError;
use crate::secrets::VaultError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevcertError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Hosts(#[from] HostsError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DevcertError {
    /// 호출자가 분기할 수 있는 고정 오류 코드
    pub fn code(&self) -> &'static str {
        match self {
            DevcertError::Vault(VaultError::WrongKey) => "WRONG_PASSWORD",
            DevcertError::Vault(VaultError::Io { .. }) => "IO_ERROR",
            DevcertError::Vault(VaultError::Malformed(_)) => "MALFORMED_CIPHERTEXT",
            DevcertError::Vault(VaultError::Key(_)) => "PASSWORD_UNAVAILABLE",
            DevcertError::Vault(_) => "CRYPTO_ERROR",
            DevcertError::Hosts(HostsError::Io { .. }) => "IO_ERROR",
            DevcertError::Hosts(HostsError::InvalidDomain(_)) => "INVALID_DOMAIN",
            DevcertError::Hosts(HostsError::Privileged(_)) => "PRIVILEGE_ERROR",
            DevcertError::Command(_) => "COMMAND_ERROR",
            DevcertError::Browser(_) => "BROWSER_ERROR",
            DevcertError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, DevcertError>;
