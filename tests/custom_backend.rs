//! Application-supplied backends registered next to the built-in ones.

use std::sync::Arc;

use async_trait::async_trait;
use healthgate::config::{AppConfig, HealthcheckConfig};
use healthgate::health::{Backend, BackendError, BuildError, CheckResult, Registry};
use reqwest::StatusCode;

mod common;

struct PortParity;

#[async_trait]
impl Backend for PortParity {
    async fn healthcheck(&self, listening_port: u16) -> Result<CheckResult, BackendError> {
        if listening_port % 2 == 0 {
            Ok(CheckResult::available("Even port"))
        } else {
            Ok(CheckResult::unavailable("Odd port").with_details(listening_port.to_string()))
        }
    }
}

struct Exploding;

#[async_trait]
impl Backend for Exploding {
    async fn healthcheck(&self, _listening_port: u16) -> Result<CheckResult, BackendError> {
        panic!("backend bug")
    }
}

fn port_parity(_: &HealthcheckConfig) -> Result<Arc<dyn Backend>, BuildError> {
    Ok(Arc::new(PortParity))
}

fn exploding(_: &HealthcheckConfig) -> Result<Arc<dyn Backend>, BuildError> {
    Ok(Arc::new(Exploding))
}

fn registry() -> Registry {
    Registry::builtin()
        .register("port_parity", port_parity)
        .register("exploding", exploding)
}

#[tokio::test]
async fn test_custom_backend_sees_listening_port() {
    let mut config = AppConfig::default();
    config.healthcheck.backends = vec!["port_parity".into()];
    config.healthcheck.detailed = true;
    let server = common::start_server_with_registry(config, registry()).await;

    let res = common::client()
        .get(server.url("/healthcheck"))
        .header("accept", "application/json")
        .send()
        .await
        .unwrap();
    let even = server.addr.port() % 2 == 0;
    let expected = if even {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    assert_eq!(res.status(), expected);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["backends"]["port_parity"]["available"], even);
    if !even {
        assert_eq!(body["backends"]["port_parity"]["details"], server.addr.port().to_string());
    }
}

#[tokio::test]
async fn test_panicking_backend_is_contained() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.healthcheck.backends = vec!["exploding".into(), "disable_by_file".into()];
    config.healthcheck.detailed = true;
    config.healthcheck.disable_by_file.path = Some(dir.path().join("down").to_string_lossy().into_owned());
    let server = common::start_server_with_registry(config, registry()).await;
    let client = common::client();

    for _ in 0..2 {
        let res = client
            .get(server.url("/healthcheck"))
            .header("accept", "application/json")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["backends"]["exploding"]["reason"], "Internal error evaluating backend");
        assert_eq!(body["backends"]["disable_by_file"]["available"], true);
    }
}
