//! 마스터키 캐시
//!
//! - 프로세스 수명 동안 비밀번호 1개만 메모리에 보관 (디스크 저장 없음)
//! - 첫 사용 시 또는 무효화 이후에만 `PasswordPrompt`로 입력 요청
//! - 전역 변수 대신 `Arc<KeyProvider>` 핸들로 vault에 전달

use crate::secrets::prompt::{PasswordPrompt, PromptError};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// 마스터키 오류
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Password prompt failed: {0}")]
    Prompt(#[from] PromptError),

    #[error("Empty password is not allowed")]
    EmptyPassword,
}

/// Zeroize가 적용된 마스터키 (비밀번호 문자열)
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey(String);

impl MasterKey {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self(passphrase.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

pub struct KeyProvider {
    prompt: Arc<dyn PasswordPrompt>,
    cached: Mutex<Option<MasterKey>>,
}

impl KeyProvider {
    pub fn new(prompt: Arc<dyn PasswordPrompt>) -> Self {
        Self {
            prompt,
            cached: Mutex::new(None),
        }
    }

    /// 캐시된 마스터키 반환, 없으면 비밀번호를 요청해 캐시
    ///
    /// 입력 대기 중에도 lock을 잡고 있으므로 동시에 호출해도 프롬프트는 1회입니다.
    pub async fn get_key(&self) -> Result<MasterKey, KeyError> {
        let mut cached = self.cached.lock().await;
        if let Some(key) = cached.as_ref() {
            return Ok(key.clone());
        }

        debug!("no cached master key, prompting for password");
        let password = self.prompt.password().await?;
        if password.is_empty() {
            return Err(KeyError::EmptyPassword);
        }

        let key = MasterKey::new(password);
        *cached = Some(key.clone());
        Ok(key)
    }

    /// 캐시 비우기 (다음 `get_key`에서 다시 입력 요청)
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    pub async fn is_cached(&self) -> bool {
        self.cached.lock().await.is_some()
    }
}
