//! Compiled health check configuration.

use std::time::Duration;

use crate::config::schema::HealthcheckConfig;
use crate::health::aggregator::{AggregateResult, Aggregator};
use crate::health::registry::{BuildError, Registry};
use crate::health::render::{render, RenderedResponse};

/// Backends plus rendering options, built once per configuration.
///
/// Immutable after construction; a reload builds a new engine and swaps it in.
#[derive(Clone)]
pub struct HealthEngine {
    aggregator: Aggregator,
    detailed: bool,
}

impl HealthEngine {
    pub fn new(aggregator: Aggregator, detailed: bool) -> Self {
        Self {
            aggregator,
            detailed,
        }
    }

    pub fn from_config(config: &HealthcheckConfig, registry: &Registry) -> Result<Self, BuildError> {
        let checks = registry.build(config)?;
        let aggregator = Aggregator::new(checks, Duration::from_millis(config.timeout_ms));
        Ok(Self::new(aggregator, config.detailed))
    }

    pub fn detailed(&self) -> bool {
        self.detailed
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub async fn evaluate(&self, listening_port: u16) -> AggregateResult {
        self.aggregator.evaluate(listening_port).await
    }

    /// Evaluate all backends and render the result for `accept`.
    pub async fn respond(&self, listening_port: u16, accept: Option<&str>) -> RenderedResponse {
        let result = self.evaluate(listening_port).await;
        render(&result, accept, self.detailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::registry::DISABLE_BY_FILE;

    #[tokio::test]
    async fn test_from_config_applies_detailed_flag() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("down");
        std::fs::write(&marker, "").unwrap();

        let mut config = HealthcheckConfig {
            backends: vec![DISABLE_BY_FILE.to_string()],
            detailed: true,
            ..HealthcheckConfig::default()
        };
        config.disable_by_file.path = Some(marker.to_string_lossy().into_owned());

        let engine = HealthEngine::from_config(&config, &Registry::builtin()).unwrap();
        assert!(engine.detailed());

        let rendered = engine.respond(8000, None).await;
        assert!(rendered.body.contains("is present"));
    }
}
