//! devcert platform layer
//!
//! 로컬에서 생성한 개발용 루트 인증서를 OS/브라우저가 신뢰하도록 설치하고,
//! 루트 CA 개인키 같은 민감한 파일을 프로세스당 1회 입력받는 비밀번호로 암호화해 보관합니다.
//!
//! - `trust`: OS 신뢰 저장소 + 브라우저 저장소 설치 (best-effort)
//! - `hosts`: hosts 파일에 도메인 추가 (멱등, 관리자 권한)
//! - `secrets`: 마스터키 캐시와 보호 파일 암호화/복호화
//! - `exec`, `browser`: 외부 명령/브라우저 실행 수단

pub mod browser;
pub mod config;
pub mod error;
pub mod exec;
pub mod hosts;
pub mod platform;
pub mod secrets;
pub mod trust;

pub use config::Config;
pub use error::{DevcertError, Result};
pub use hosts::{HostsFileEditor, HostsUpdate};
pub use platform::{Collaborators, DevcertPlatform};
pub use secrets::{CipherScheme, CredentialVault, KeyProvider, MasterKey};
pub use trust::{InstallReport, TrustStoreInstaller, TrustTarget};
