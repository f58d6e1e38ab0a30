//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the Prometheus recorder as the global `metrics` recorder.
///
/// Returns the handle used to render `/metrics`. Fails if a recorder is
/// already installed.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// WebSocket upgrades accepted and handed to the hub (counter).
pub const WS_UPGRADES_TOTAL: &str = "ws_upgrades_total";
/// Upgrade requests refused before reaching the hub (counter, labels: reason).
pub const WS_UPGRADE_REJECTIONS_TOTAL: &str = "ws_upgrade_rejections_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_from_local_recorder() {
        // Local recorder only; a global install would leak across tests.
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(WS_UPGRADES_TOTAL).increment(2);
        });
        let output = render(&handle);
        assert!(output.contains("ws_upgrades_total 2"), "got: {output}");
    }

    #[test]
    fn metric_constants_are_snake_case() {
        for name in [WS_UPGRADES_TOTAL, WS_UPGRADE_REJECTIONS_TOTAL] {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
