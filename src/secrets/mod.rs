//! 보호 파일 관리 모듈
//!
//! 비밀번호 기반 마스터키 + 파일 단위 암호화 구조로 로컬 비밀 파일(루트 CA 개인키 등)을 보호합니다.
//!
//! - 마스터키는 프로세스당 1회 입력받아 메모리에만 보관 (`KeyProvider`)
//! - 파일 내용은 `CredentialVault`가 암호화하여 저장
//! - 비밀번호가 틀리면 캐시를 비우고 1회만 다시 묻기

pub mod cipher;
pub mod key;
pub mod prompt;
pub mod vault;

pub use cipher::CipherScheme;
pub use key::{KeyError, KeyProvider, MasterKey};
pub use prompt::{
    EnvPasswordPrompt, PasswordPrompt, PromptError, StaticPasswordPrompt, StdinPasswordPrompt,
};
pub use vault::{CredentialVault, VaultError, MAX_KEY_RETRIES};
