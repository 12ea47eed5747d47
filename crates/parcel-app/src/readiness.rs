//! Bounded wait for the measurement engine
//!
//! A session never blocks on vision for longer than the configured timeout;
//! past it, measurements are estimated and labelled as such.

use std::future::Future;
use std::time::Duration;

use parcel_types::{Error, Result};
use parcel_vision::{DimensionEngine, MarkerSpec, VisionCapability};
use tracing::{info, warn};

use crate::config::Config;

/// Resolve the capability for a session from an engine loader
pub async fn resolve_capability<F>(enabled: bool, timeout: Duration, load: F) -> VisionCapability
where
    F: Future<Output = Result<DimensionEngine>>,
{
    if !enabled {
        info!("vision disabled; measurements will be estimated");
        return VisionCapability::unavailable("vision disabled in configuration");
    }

    match tokio::time::timeout(timeout, load).await {
        Ok(Ok(engine)) => {
            info!(marker = ?engine.marker(), "vision engine ready");
            VisionCapability::ready(engine)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "vision engine failed to load");
            VisionCapability::unavailable(e.to_string())
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "vision engine not ready in time");
            VisionCapability::unavailable(format!(
                "engine not ready after {} ms",
                timeout.as_millis()
            ))
        }
    }
}

/// Build the engine off the async threads
pub async fn load_engine(marker: MarkerSpec) -> Result<DimensionEngine> {
    tokio::task::spawn_blocking(move || DimensionEngine::new(marker))
        .await
        .map_err(|e| Error::VisionUnavailable(format!("engine loader failed: {}", e)))?
}

/// Capability for a session under the given configuration
pub async fn vision_for(config: &Config) -> Result<VisionCapability> {
    let marker = config.marker()?;
    Ok(resolve_capability(
        config.vision_enabled,
        config.vision_ready_timeout(),
        load_engine(marker),
    )
    .await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_vision_is_unavailable() {
        let vision = resolve_capability(
            false,
            Duration::from_secs(1),
            load_engine(MarkerSpec::default()),
        )
        .await;
        assert!(!vision.is_ready());
    }

    #[tokio::test]
    async fn test_engine_loads() {
        let vision = resolve_capability(
            true,
            Duration::from_secs(5),
            load_engine(MarkerSpec::default()),
        )
        .await;
        assert!(vision.is_ready());
    }

    #[tokio::test]
    async fn test_slow_engine_times_out() {
        let vision = resolve_capability(
            true,
            Duration::from_millis(20),
            std::future::pending::<Result<DimensionEngine>>(),
        )
        .await;
        match vision {
            VisionCapability::Unavailable { reason } => assert!(reason.contains("20 ms")),
            VisionCapability::Ready(_) => panic!("expected timeout"),
        }
    }

    #[tokio::test]
    async fn test_loader_error_is_unavailable() {
        let vision = resolve_capability(true, Duration::from_secs(1), async {
            Err(Error::VisionUnavailable("model missing".to_string()))
        })
        .await;
        assert!(!vision.is_ready());
    }

    #[tokio::test]
    async fn test_invalid_marker_in_config() {
        let config = Config {
            marker_height_mm: 0.0,
            ..Config::default()
        };
        assert!(vision_for(&config).await.is_err());
    }
}
