//! 보호 파일 암호화 방식
//!
//! `Legacy` (기본값):
//! - 비밀번호만으로 key/IV 유도: OpenSSL `EVP_BytesToKey` (MD5, salt 없음, 1회)
//! - AES-256-CBC + PKCS#7, 결과는 소문자 hex 텍스트
//! - salt/IV가 파일에 없으므로 같은 평문은 항상 같은 암호문이 됨 (알려진 약점)
//! - 기존 devcert가 만든 파일과 바이트 단위로 호환
//!
//! `Sealed` (설정으로 선택):
//! - hex(salt 16 bytes || nonce 24 bytes || ciphertext + tag)
//! - Argon2id(비밀번호, salt) → 256-bit key, XChaCha20-Poly1305

use crate::secrets::key::MasterKey;
use crate::secrets::vault::VaultError;
use aes::Aes256;
use argon2::{Algorithm, Argon2, Params, Version};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const AES_KEY_LEN: usize = 32;
const AES_BLOCK_LEN: usize = 16;

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

/// Argon2id 파라미터 (m=19 MiB, t=2, p=1)
#[cfg(not(test))]
const ARGON2_MEMORY_KIB: u32 = 19_456;
#[cfg(not(test))]
const ARGON2_TIME_COST: u32 = 2;
// 테스트에서는 빠른 파라미터 사용
#[cfg(test)]
const ARGON2_MEMORY_KIB: u32 = 1024;
#[cfg(test)]
const ARGON2_TIME_COST: u32 = 1;
const ARGON2_PARALLELISM: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherScheme {
    #[default]
    Legacy,
    Sealed,
}

impl CipherScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            CipherScheme::Legacy => "legacy",
            CipherScheme::Sealed => "sealed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "legacy" => Some(CipherScheme::Legacy),
            "sealed" => Some(CipherScheme::Sealed),
            _ => None,
        }
    }

    /// 평문을 암호화해 파일에 쓸 hex 텍스트로 반환
    pub fn encrypt(&self, plaintext: &str, key: &MasterKey) -> Result<String, VaultError> {
        match self {
            CipherScheme::Legacy => legacy_encrypt(plaintext, key),
            CipherScheme::Sealed => sealed_encrypt(plaintext, key),
        }
    }

    /// 파일 내용(hex 텍스트)을 복호화
    ///
    /// 키가 틀린 경우는 `VaultError::WrongKey`, 형식 오류는 `VaultError::Malformed`.
    pub fn decrypt(&self, blob: &str, key: &MasterKey) -> Result<String, VaultError> {
        let bytes = hex::decode(blob.trim())
            .map_err(|e| VaultError::Malformed(format!("ciphertext is not hex: {}", e)))?;
        match self {
            CipherScheme::Legacy => legacy_decrypt(&bytes, key),
            CipherScheme::Sealed => sealed_decrypt(&bytes, key),
        }
    }
}

/// OpenSSL `EVP_BytesToKey(aes-256-cbc, md5, salt=NULL, count=1)`
///
/// D_1 = MD5(pass), D_i = MD5(D_{i-1} || pass), key||iv = D_1 || D_2 || D_3 의 앞 48 bytes
fn bytes_to_key(passphrase: &[u8]) -> (Zeroizing<[u8; AES_KEY_LEN]>, [u8; AES_BLOCK_LEN]) {
    let mut material = Zeroizing::new(Vec::with_capacity(AES_KEY_LEN + AES_BLOCK_LEN + 16));
    let mut prev: Option<md5::Digest> = None;

    while material.len() < AES_KEY_LEN + AES_BLOCK_LEN {
        let mut ctx = md5::Context::new();
        if let Some(digest) = prev {
            ctx.consume(digest.0);
        }
        ctx.consume(passphrase);
        let digest = ctx.compute();
        material.extend_from_slice(&digest.0);
        prev = Some(digest);
    }

    let mut key = Zeroizing::new([0u8; AES_KEY_LEN]);
    key.copy_from_slice(&material[..AES_KEY_LEN]);
    let mut iv = [0u8; AES_BLOCK_LEN];
    iv.copy_from_slice(&material[AES_KEY_LEN..AES_KEY_LEN + AES_BLOCK_LEN]);
    (key, iv)
}

fn legacy_encrypt(plaintext: &str, key: &MasterKey) -> Result<String, VaultError> {
    let (aes_key, iv) = bytes_to_key(key.as_bytes());
    let cipher = Aes256CbcEnc::new_from_slices(aes_key.as_slice(), &iv)
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    Ok(hex::encode(ciphertext))
}

fn legacy_decrypt(ciphertext: &[u8], key: &MasterKey) -> Result<String, VaultError> {
    if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_LEN != 0 {
        return Err(VaultError::Malformed(format!(
            "ciphertext length {} is not a whole number of AES blocks",
            ciphertext.len()
        )));
    }

    let (aes_key, iv) = bytes_to_key(key.as_bytes());
    let cipher = Aes256CbcDec::new_from_slices(aes_key.as_slice(), &iv)
        .map_err(|e| VaultError::Malformed(e.to_string()))?;

    // 패딩 오류 = OpenSSL "bad decrypt"
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| VaultError::WrongKey)?;

    // 우연히 패딩이 맞아도 틀린 키면 평문이 UTF-8이 아님
    String::from_utf8(plaintext).map_err(|e| {
        let mut bytes = e.into_bytes();
        zeroize::Zeroize::zeroize(&mut bytes);
        VaultError::WrongKey
    })
}

fn derive_sealed_key(
    key: &MasterKey,
    salt: &[u8],
) -> Result<Zeroizing<[u8; 32]>, VaultError> {
    let params = Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_TIME_COST,
        ARGON2_PARALLELISM,
        Some(32),
    )
    .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(key.as_bytes(), salt, output.as_mut_slice())
        .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;
    Ok(output)
}

fn sealed_encrypt(plaintext: &str, key: &MasterKey) -> Result<String, VaultError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill(&mut salt);
    rand::thread_rng().fill(&mut nonce);

    let derived = derive_sealed_key(key, &salt)?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(derived.as_slice()));
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(hex::encode(blob))
}

fn sealed_decrypt(blob: &[u8], key: &MasterKey) -> Result<String, VaultError> {
    if blob.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(VaultError::Malformed(format!(
            "sealed blob too short ({} bytes)",
            blob.len()
        )));
    }

    let (salt, rest) = blob.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let derived = derive_sealed_key(key, salt)?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(derived.as_slice()));

    // 태그 검증 실패 = 키 불일치
    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| VaultError::WrongKey)?;

    String::from_utf8(plaintext)
        .map_err(|_| VaultError::Malformed("sealed plaintext is not UTF-8".to_string()))
}
