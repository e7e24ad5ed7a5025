//! 브라우저 인증서 가져오기
//!
//! Firefox는 OS 저장소를 쓰지 않고 자체 NSS 저장소를 쓰므로,
//! 로컬 HTTP 서버로 인증서를 내려주고 브라우저를 그 페이지로 띄워 사용자가 직접 가져오게 합니다.
//!
//! - `/` : 안내 페이지 (인증서 링크)
//! - `/certificate` : `application/x-x509-ca-cert` 응답 → 브라우저의 인증서 가져오기 대화상자

use async_trait::async_trait;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

const CERTIFICATE_ROUTE: &str = "/certificate";
const MAX_REQUEST_HEAD: usize = 8 * 1024;
const REQUEST_HEAD_TIMEOUT: Duration = Duration::from_secs(10);

/// 브라우저 실행 오류
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("Failed to read certificate {path}: {source}")]
    Certificate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Import server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Failed to launch browser `{command}`: {message}")]
    Launch { command: String, message: String },
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// `launch_command` 브라우저를 인증서 가져오기 화면으로 띄우고 완료까지 대기
    async fn open_certificate(
        &self,
        launch_command: &str,
        certificate_path: &Path,
    ) -> Result<(), BrowserError>;
}

/// 인증서 1개를 내려주는 loopback 전용 HTTP 서버
pub struct CertificateImportServer {
    listener: TcpListener,
    certificate: Arc<[u8]>,
}

impl CertificateImportServer {
    pub async fn bind(certificate_path: &Path) -> Result<Self, BrowserError> {
        let certificate =
            tokio::fs::read(certificate_path)
                .await
                .map_err(|source| BrowserError::Certificate {
                    path: certificate_path.to_path_buf(),
                    source,
                })?;
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        Ok(Self {
            listener,
            certificate: certificate.into(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, BrowserError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn url(&self) -> Result<String, BrowserError> {
        Ok(format!("http://{}/", self.local_addr()?))
    }

    /// 브라우저가 인증서를 받아갈 때까지 요청 처리
    ///
    /// 연결마다 태스크를 띄우므로 요청 없이 열어 둔 연결(preconnect)이 다른 요청을 막지 않습니다.
    pub async fn serve_until_downloaded(self) -> Result<(), BrowserError> {
        let (done_tx, mut done_rx) = mpsc::channel::<SocketAddr>(1);

        loop {
            tokio::select! {
                Some(peer) = done_rx.recv() => {
                    debug!(%peer, "certificate downloaded by browser");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    let certificate = Arc::clone(&self.certificate);
                    let done = done_tx.clone();
                    tokio::spawn(async move {
                        match handle(stream, &certificate).await {
                            Ok(true) => {
                                let _ = done.send(peer).await;
                            }
                            Ok(false) => {}
                            Err(e) => debug!(%peer, error = %e, "import server connection failed"),
                        }
                    });
                }
            }
        }
    }
}

/// 요청 1건 처리, 인증서를 내려줬으면 `true`
async fn handle(mut stream: TcpStream, certificate: &[u8]) -> std::io::Result<bool> {
    let path = timeout(REQUEST_HEAD_TIMEOUT, read_request_path(&mut stream))
        .await
        .map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::TimedOut, "request head not received")
        })??;

    let (status, content_type, body, served) = match path.as_deref() {
        Some(CERTIFICATE_ROUTE) => (
            "200 OK",
            "application/x-x509-ca-cert",
            certificate.to_vec(),
            true,
        ),
        Some("/") => (
            "200 OK",
            "text/html; charset=utf-8",
            landing_page().into_bytes(),
            false,
        ),
        _ => ("404 Not Found", "text/plain", b"not found".to_vec(), false),
    };

    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        content_type,
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&body).await?;
    stream.shutdown().await?;
    Ok(served)
}

fn landing_page() -> String {
    format!(
        "<!doctype html><html><head><title>devcert</title></head><body>\
         <h1>Trust the devcert root certificate</h1>\
         <p>Click the link below, check \"Trust this CA to identify websites\", then press OK.</p>\
         <p><a href=\"{}\">Install certificate</a></p>\
         </body></html>",
        CERTIFICATE_ROUTE
    )
}

/// 요청 라인(`GET /path HTTP/1.1`)에서 path만 추출
async fn read_request_path(stream: &mut TcpStream) -> std::io::Result<Option<String>> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    while !buf.windows(4).any(|w| w == b"\r\n\r\n") && buf.len() < MAX_REQUEST_HEAD {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf);
    let mut parts = head.lines().next().unwrap_or_default().split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Ok(Some(
            target.split('?').next().unwrap_or(target).to_string(),
        )),
        _ => Ok(None),
    }
}

/// `open` crate로 지정한 브라우저를 띄우는 기본 구현
#[derive(Debug, Clone, Default)]
pub struct OpenBrowserLauncher;

#[async_trait]
impl BrowserLauncher for OpenBrowserLauncher {
    async fn open_certificate(
        &self,
        launch_command: &str,
        certificate_path: &Path,
    ) -> Result<(), BrowserError> {
        let server = CertificateImportServer::bind(certificate_path).await?;
        let url = server.url()?;

        let app = launch_command.to_string();
        let target = url.clone();
        let launched = tokio::task::spawn_blocking(move || open::with(target, app))
            .await
            .map_err(|e| BrowserError::Launch {
                command: launch_command.to_string(),
                message: e.to_string(),
            })?;
        launched.map_err(|e| BrowserError::Launch {
            command: launch_command.to_string(),
            message: e.to_string(),
        })?;

        debug!(%url, browser = launch_command, "waiting for certificate import");
        server.serve_until_downloaded().await
    }
}
