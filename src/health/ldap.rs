//! Directory bind checks.
//!
//! # Responsibilities
//! - Open a connection to the configured directory server
//! - Perform a simple bind with the configured credentials
//! - Unbind and release the connection on every exit path
//!
//! # Design Decisions
//! - Connect failures and rejected binds share the "Bind failed" reason;
//!   the distinction lives in details
//! - A failed unbind after a good bind is logged, not reported: the check
//!   already succeeded
//! - Connect, bind, unbind and teardown share one deadline of `timeout`

use std::time::Duration;

use async_trait::async_trait;
use ldap3::{LdapConnAsync, LdapConnSettings};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::health::backend::{Backend, BackendError};
use crate::health::result::CheckResult;

pub const REASON_BIND_FAILED: &str = "Bind failed";

/// Connection parameters for a directory bind check.
#[derive(Clone)]
pub struct DirectorySettings {
    pub uri: String,
    pub bind_dn: String,
    pub bind_password: String,
    /// Total budget for one check, from connect to teardown.
    pub timeout: Duration,
}

impl std::fmt::Debug for DirectorySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectorySettings")
            .field("uri", &self.uri)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Reports unavailable when a bind against the directory fails.
#[derive(Debug, Clone)]
pub struct DirectoryBindBackend {
    settings: Option<DirectorySettings>,
}

impl DirectoryBindBackend {
    pub fn new(settings: DirectorySettings) -> Self {
        Self {
            settings: Some(settings),
        }
    }

    /// Backend with no server configured. Always available.
    pub fn unconfigured() -> Self {
        Self { settings: None }
    }

    async fn bind_and_release(&self, settings: &DirectorySettings) -> CheckResult {
        let deadline = Instant::now() + settings.timeout;
        let conn_settings = LdapConnSettings::new().set_conn_timeout(remaining(deadline));
        let (conn, mut ldap) = match LdapConnAsync::with_settings(conn_settings, &settings.uri).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::debug!(uri = %settings.uri, error = %e, "Directory connection failed");
                return bind_failed(e);
            }
        };

        let uri = settings.uri.clone();
        let driver = ConnectionDriver(Some(tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::debug!(uri = %uri, error = %e, "Directory connection closed with error");
            }
        })));

        let bound = ldap
            .with_timeout(remaining(deadline))
            .simple_bind(&settings.bind_dn, &settings.bind_password)
            .await
            .and_then(|res| res.success());

        if let Err(e) = bound {
            tracing::debug!(uri = %settings.uri, error = %e, "Directory bind rejected");
            // Dropping the handle closes the request channel; the guard
            // tears the connection down if the driver lingers.
            drop(ldap);
            drop(driver);
            return bind_failed(e);
        }

        if let Err(e) = ldap.with_timeout(remaining(deadline)).unbind().await {
            tracing::warn!(uri = %settings.uri, error = %e, "Directory bind check failed to unbind cleanly");
        }
        drop(ldap);

        if !driver.finish(remaining(deadline)).await {
            tracing::warn!(
                uri = %settings.uri,
                "Directory bind check left a lingering connection; aborting it"
            );
        }

        CheckResult::ok()
    }
}

#[async_trait]
impl Backend for DirectoryBindBackend {
    async fn healthcheck(&self, _listening_port: u16) -> Result<CheckResult, BackendError> {
        match &self.settings {
            Some(settings) => Ok(self.bind_and_release(settings).await),
            None => Ok(CheckResult::ok()),
        }
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

fn bind_failed(error: impl std::fmt::Display) -> CheckResult {
    CheckResult::unavailable(REASON_BIND_FAILED).with_details(error.to_string())
}

/// Owns the task driving a directory connection. Aborts it on drop.
struct ConnectionDriver(Option<JoinHandle<()>>);

impl ConnectionDriver {
    /// Wait for the connection to close on its own. Returns false if it
    /// had to be aborted.
    async fn finish(mut self, grace: Duration) -> bool {
        let Some(mut handle) = self.0.take() else {
            return true;
        };
        match tokio::time::timeout(grace, &mut handle).await {
            Ok(_) => true,
            Err(_) => {
                handle.abort();
                false
            }
        }
    }
}

impl Drop for ConnectionDriver {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(uri: &str) -> DirectorySettings {
        DirectorySettings {
            uri: uri.to_string(),
            bind_dn: "cn=monitor,dc=example,dc=org".to_string(),
            bind_password: "s3cret".to_string(),
            timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_bind_failed() {
        // Nothing listens on port 1.
        let backend = DirectoryBindBackend::new(settings("ldap://127.0.0.1:1"));

        let result = backend.healthcheck(8000).await.unwrap();
        assert!(!result.is_available());
        assert_eq!(result.reason(), REASON_BIND_FAILED);
        assert!(result.details().is_some_and(|d| !d.is_empty()));
    }

    #[tokio::test]
    async fn test_malformed_uri_reports_bind_failed() {
        let backend = DirectoryBindBackend::new(settings("not a uri"));

        let result = backend.healthcheck(8000).await.unwrap();
        assert!(!result.is_available());
        assert_eq!(result.reason(), REASON_BIND_FAILED);
    }

    #[tokio::test]
    async fn test_unresponsive_server_is_bounded_by_timeout() {
        // Accepts TCP but never speaks LDAP.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut config = settings(&format!("ldap://{}", addr));
        config.timeout = Duration::from_millis(200);
        let backend = DirectoryBindBackend::new(config);

        let started = std::time::Instant::now();
        let result = backend.healthcheck(8000).await.unwrap();
        assert!(!result.is_available());
        assert_eq!(result.reason(), REASON_BIND_FAILED);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    /// How the in-process directory behaves once it has answered the bind.
    #[derive(Clone, Copy)]
    enum AfterBind {
        AwaitUnbind,
        HangUp,
    }

    /// What the in-process directory saw from the client.
    #[derive(Debug)]
    struct Exchange {
        unbind_received: bool,
        released: bool,
    }

    const TAG_UNBIND_REQUEST: u8 = 0x42;

    /// Serve one connection: answer its BindRequest with `result_code`.
    async fn start_directory(
        result_code: u8,
        after: AfterBind,
    ) -> (String, tokio::sync::oneshot::Receiver<Exchange>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let uri = format!("ldap://{}", listener.local_addr().unwrap());
        let (tx, rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Short-form length: the bind request is well under 128 bytes.
            let mut request = Vec::new();
            let mut chunk = [0u8; 512];
            while request.len() < 2 || request.len() < 2 + request[1] as usize {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed before sending a bind request");
                request.extend_from_slice(&chunk[..n]);
            }
            socket
                .write_all(&bind_response(message_id(&request), result_code))
                .await
                .unwrap();

            let exchange = match after {
                AfterBind::HangUp => Exchange {
                    unbind_received: false,
                    released: true,
                },
                AfterBind::AwaitUnbind => {
                    let mut rest = Vec::new();
                    let released = tokio::time::timeout(Duration::from_secs(5), async {
                        loop {
                            match socket.read(&mut chunk).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => rest.extend_from_slice(&chunk[..n]),
                            }
                        }
                    })
                    .await
                    .is_ok();
                    Exchange {
                        unbind_received: rest.contains(&TAG_UNBIND_REQUEST),
                        released,
                    }
                }
            };
            let _ = tx.send(exchange);
        });

        (uri, rx)
    }

    /// The messageID INTEGER right after the outer SEQUENCE header.
    fn message_id(request: &[u8]) -> &[u8] {
        assert_eq!(request[0], 0x30);
        assert_eq!(request[2], 0x02);
        let len = request[3] as usize;
        &request[4..4 + len]
    }

    /// LDAPMessage { messageID, BindResponse { resultCode, "", "" } }.
    fn bind_response(message_id: &[u8], result_code: u8) -> Vec<u8> {
        let op = [0x0a, 0x01, result_code, 0x04, 0x00, 0x04, 0x00];
        let mut body = vec![0x02, message_id.len() as u8];
        body.extend_from_slice(message_id);
        body.extend_from_slice(&[0x61, op.len() as u8]);
        body.extend_from_slice(&op);

        let mut message = vec![0x30, body.len() as u8];
        message.extend_from_slice(&body);
        message
    }

    #[tokio::test]
    async fn test_successful_bind_is_available_and_unbinds() {
        let (uri, exchange) = start_directory(0, AfterBind::AwaitUnbind).await;
        let backend = DirectoryBindBackend::new(settings(&uri));

        let result = backend.healthcheck(8000).await.unwrap();
        assert!(result.is_available());
        assert_eq!(result.reason(), "OK");

        let exchange = exchange.await.unwrap();
        assert!(exchange.unbind_received, "{:?}", exchange);
        assert!(exchange.released, "{:?}", exchange);
    }

    #[tokio::test]
    async fn test_failed_unbind_keeps_bind_result() {
        let (uri, exchange) = start_directory(0, AfterBind::HangUp).await;
        let backend = DirectoryBindBackend::new(settings(&uri));

        let result = backend.healthcheck(8000).await.unwrap();
        assert!(result.is_available());
        assert!(exchange.await.unwrap().released);
    }

    #[tokio::test]
    async fn test_rejected_credentials_report_bind_failed() {
        // 49: invalidCredentials
        let (uri, _exchange) = start_directory(49, AfterBind::HangUp).await;
        let backend = DirectoryBindBackend::new(settings(&uri));

        let result = backend.healthcheck(8000).await.unwrap();
        assert!(!result.is_available());
        assert_eq!(result.reason(), REASON_BIND_FAILED);
        assert!(result.details().is_some_and(|d| d.contains("49")));
    }

    #[tokio::test]
    async fn test_unconfigured_backend_passes_silently() {
        let result = DirectoryBindBackend::unconfigured().healthcheck(8000).await.unwrap();
        assert!(result.is_available());
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", settings("ldap://localhost"));
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }
}
