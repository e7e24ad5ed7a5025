//! 보호 파일 I/O 및 암호화/복호화
//!
//! - 디스크에는 항상 암호문만 저장 (헤더, 메타데이터 없음)
//! - 마스터키는 `KeyProvider`에서 가져오며 필요 시 비밀번호 입력 요청
//! - 키 불일치로 복호화 실패 시 캐시를 비우고 정확히 1회 재시도

use crate::secrets::cipher::CipherScheme;
use crate::secrets::key::{KeyError, KeyProvider};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// 키 불일치 시 추가로 시도하는 횟수
pub const MAX_KEY_RETRIES: usize = 1;

/// Vault 오류
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Decryption failed: wrong password")]
    WrongKey,

    #[error("Malformed ciphertext: {0}")]
    Malformed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error(transparent)]
    Key(#[from] KeyError),
}

impl VaultError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        VaultError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_wrong_key(&self) -> bool {
        matches!(self, VaultError::WrongKey)
    }
}

pub struct CredentialVault {
    keys: Arc<KeyProvider>,
    scheme: CipherScheme,
}

impl CredentialVault {
    pub fn new(keys: Arc<KeyProvider>, scheme: CipherScheme) -> Self {
        Self { keys, scheme }
    }

    pub fn scheme(&self) -> CipherScheme {
        self.scheme
    }

    pub fn keys(&self) -> &Arc<KeyProvider> {
        &self.keys
    }

    /// 평문을 암호화해 `path`를 통째로 교체
    pub async fn write(&self, path: &Path, plaintext: &str) -> Result<(), VaultError> {
        let key = self.keys.get_key().await?;
        let ciphertext = self.scheme.encrypt(plaintext, &key)?;

        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || write_atomic(&path, ciphertext.as_bytes()))
            .await
            .map_err(|e| VaultError::EncryptionFailed(format!("write task failed: {}", e)))?
    }

    /// `path`를 읽어 복호화
    ///
    /// `WrongKey`일 때만 캐시를 비우고 재시도하며, 그 외 오류는 즉시 반환합니다.
    pub async fn read(&self, path: &Path) -> Result<String, VaultError> {
        let mut attempt = 0;
        loop {
            let key = self.keys.get_key().await?;
            let contents = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| VaultError::io(path, e))?;

            match self.scheme.decrypt(&contents, &key) {
                Ok(plaintext) => return Ok(plaintext),
                Err(VaultError::WrongKey) if attempt < MAX_KEY_RETRIES => {
                    warn!(path = %path.display(), "bad decrypt, clearing cached password and retrying");
                    self.keys.invalidate().await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "protected file read failed");
                    return Err(e);
                }
            }
        }
    }
}

/// 임시 파일에 쓰고 rename (중간에 실패해도 기존 파일은 온전함)
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), VaultError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let mut file = fs::File::create(&tmp_path).map_err(|e| VaultError::io(&tmp_path, e))?;
    file.write_all(contents)
        .and_then(|_| file.sync_all())
        .map_err(|e| VaultError::io(&tmp_path, e))?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        VaultError::io(path, e)
    })
}
