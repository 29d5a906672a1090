//! Request metrics
//!
//! Recorded through the `metrics` facade; without an installed recorder every
//! call is a no-op. The embedding application decides whether to export.
//!
//! - `wrapblox_requests_total` (counter): labels `service`, `status`
//! - `wrapblox_request_duration_seconds` (histogram): label `service`
//! - `wrapblox_cache_total` (counter): label `result` (`hit` | `miss`)
//! - `wrapblox_retries_total` (counter): label `reason` (`csrf` | `rate_limit`)
//! - `wrapblox_token_refresh_total` (counter), recorded by `blox-session`
//!   for every upstream mint

/// Record one upstream call. `status` is the HTTP status, or the error kind
/// label when no response was received.
pub fn record_request(service: &str, status: &str, duration_secs: f64) {
    metrics::counter!(
        "wrapblox_requests_total",
        "service" => service.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("wrapblox_request_duration_seconds", "service" => service.to_string())
        .record(duration_secs);
}

pub fn record_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("wrapblox_cache_total", "result" => result).increment(1);
}

pub fn record_retry(reason: &'static str) {
    metrics::counter!("wrapblox_retries_total", "reason" => reason).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn no_recorder_is_a_noop() {
        record_request("Users", "200", 0.01);
        record_cache(true);
        record_retry("csrf");
    }

    #[test]
    fn request_counter_carries_service_and_status() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request("Users", "200", 0.02);
        record_request("Badges", "404", 0.5);

        let output = handle.render();
        assert!(output.contains("wrapblox_requests_total"));
        assert!(output.contains("service=\"Users\""));
        assert!(output.contains("status=\"404\""));
        assert!(output.contains("wrapblox_request_duration_seconds"));
    }

    #[test]
    fn cache_and_retry_counters() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_cache(true);
        record_cache(false);
        record_retry("rate_limit");
        record_retry("csrf");

        let output = handle.render();
        assert!(output.contains("result=\"hit\""));
        assert!(output.contains("result=\"miss\""));
        assert!(output.contains("reason=\"rate_limit\""));
        assert!(output.contains("reason=\"csrf\""));
    }
}
