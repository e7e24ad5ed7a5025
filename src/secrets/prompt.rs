//! 비밀번호 입력 수단
//!
//! 보호 파일 암호화용 비밀번호를 사용자에게서 받아옵니다.
//! `KeyProvider`는 이 trait에만 의존합니다.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;

/// 비밀번호 입력 오류
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Environment variable {0} is not set")]
    MissingEnv(String),

    #[error("No password entered")]
    NoInput,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait PasswordPrompt: Send + Sync {
    /// 비밀번호 1회 요청 (사용자 입력을 무기한 기다릴 수 있음)
    async fn password(&self) -> Result<String, PromptError>;
}

/// 환경 변수에서 비밀번호 읽기 (CI, 스크립트용)
#[derive(Debug, Clone)]
pub struct EnvPasswordPrompt {
    var: String,
}

impl EnvPasswordPrompt {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl PasswordPrompt for EnvPasswordPrompt {
    async fn password(&self) -> Result<String, PromptError> {
        std::env::var(&self.var).map_err(|_| PromptError::MissingEnv(self.var.clone()))
    }
}

/// 터미널 stdin에서 한 줄 읽기
///
/// 입력이 화면에 그대로 보이므로 대화형 터미널 전용입니다.
/// 리더는 호출 사이에 유지되므로 버퍼에 남은 다음 줄이 재입력 요청에 사용됩니다.
pub struct StdinPasswordPrompt {
    message: String,
    reader: Mutex<Box<dyn AsyncBufRead + Send + Unpin>>,
}

impl StdinPasswordPrompt {
    pub fn new(message: impl Into<String>) -> Self {
        Self::from_reader(message, BufReader::new(tokio::io::stdin()))
    }

    /// stdin 대신 임의의 입력에서 읽기
    pub fn from_reader(
        message: impl Into<String>,
        reader: impl AsyncBufRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            reader: Mutex::new(Box::new(reader)),
        }
    }
}

impl Default for StdinPasswordPrompt {
    fn default() -> Self {
        Self::new("devcert password (used to encrypt the root CA key): ")
    }
}

#[async_trait]
impl PasswordPrompt for StdinPasswordPrompt {
    async fn password(&self) -> Result<String, PromptError> {
        let mut reader = self.reader.lock().await;
        eprint!("{}", self.message);

        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(PromptError::NoInput);
        }

        Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
    }
}

/// 고정 비밀번호 (임베딩, 테스트용)
#[derive(Clone)]
pub struct StaticPasswordPrompt {
    password: String,
}

impl StaticPasswordPrompt {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

#[async_trait]
impl PasswordPrompt for StaticPasswordPrompt {
    async fn password(&self) -> Result<String, PromptError> {
        Ok(self.password.clone())
    }
}
