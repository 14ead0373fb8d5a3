mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;
    use mock_service::MOCK_TOKEN;
    use parkbench::prelude::*;
    use std::io::Write;
    use std::num::NonZeroU32;
    use std::time::{Duration, Instant};
    use tempfile::NamedTempFile;

    fn quiet() -> Box<dyn FnMut(&LiveTick) + Send> {
        Box::new(|_: &LiveTick| {})
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn full_volume_is_issued() {
        let metrics = init();
        let addr = mock_service::spawn().await;

        let config = RunConfig {
            concurrency: 8,
            repeat: 2,
            ..config(addr, "")
        };

        let summary = run_with_sink(&config, TransportKind::Http, keys(50), quiet())
            .await
            .unwrap();

        assert_eq!(summary.total_requests, 100);
        assert_eq!(summary.error_count, 0);
        assert!(summary.requests_per_second > 0.);
        assert!(summary.p50_latency_ms <= summary.p95_latency_ms);
        assert!(summary.p95_latency_ms <= summary.p99_latency_ms);

        let rendered = metrics.render();
        assert!(rendered.contains("parkbench_success"));
        assert!(rendered.contains("parkbench_latency"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn latency_reflects_service_delay() {
        init();
        let addr = mock_service::spawn().await;

        let config = RunConfig {
            concurrency: 4,
            ..config(addr, "/delay/ms/50")
        };

        let summary = run_with_sink(&config, TransportKind::Http, keys(20), quiet())
            .await
            .unwrap();

        assert_eq!(summary.total_requests, 20);
        assert!(dbg!(summary.p50_latency_ms) >= 50.);
        assert!(summary.avg_latency_ms >= 50.);
        // 5 sequential 50ms lookups per worker.
        assert!(summary.elapsed >= Duration::from_millis(250));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn bearer_token_is_sent() {
        init();
        let addr = mock_service::spawn().await;

        let authorized = RunConfig {
            token: Some(MOCK_TOKEN.to_string()),
            ..config(addr, "/secure")
        };
        let summary = run_with_sink(&authorized, TransportKind::Http, keys(10), quiet())
            .await
            .unwrap();
        assert_eq!(summary.error_count, 0);

        let anonymous = config(addr, "/secure");
        let summary = run_with_sink(&anonymous, TransportKind::Http, keys(10), quiet())
            .await
            .unwrap();
        assert_eq!(summary.total_requests, 10);
        assert_eq!(summary.error_count, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn timeouts_are_request_failures() {
        init();
        let addr = mock_service::spawn().await;

        let config = RunConfig {
            concurrency: 4,
            timeout: Some(Duration::from_millis(50)),
            ..config(addr, "/delay/ms/300")
        };

        let summary = run_with_sink(&config, TransportKind::Http, keys(8), quiet())
            .await
            .unwrap();

        assert_eq!(summary.total_requests, 8);
        assert_eq!(summary.error_count, 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn rate_cap_spaces_requests() {
        init();
        let addr = mock_service::spawn().await;

        let config = RunConfig {
            concurrency: 4,
            max_rps: NonZeroU32::new(40),
            ..config(addr, "")
        };

        let start = Instant::now();
        let summary = run_with_sink(&config, TransportKind::Http, keys(20), quiet())
            .await
            .unwrap();

        assert_eq!(summary.total_requests, 20);
        assert!(dbg!(start.elapsed()) >= Duration::from_millis(450));
        assert!(summary.requests_per_second <= 50.);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn throttled_lookups_still_count() {
        init();
        let addr = mock_service::spawn().await;

        let config = RunConfig {
            concurrency: 8,
            ..config(addr, "/limited/5")
        };

        let summary = run_with_sink(&config, TransportKind::Http, keys(40), quiet())
            .await
            .unwrap();

        // 429s are failed lookups, not fatal errors.
        assert_eq!(summary.total_requests, 40);
        assert_eq!(summary.success_count + summary.error_count, 40);
        assert!(dbg!(summary.error_count) > 0);
        assert!(summary.success_count <= 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn refused_connection_aborts() {
        init();

        let config = RunConfig {
            http_address: Some("http://127.0.0.1:1".to_string()),
            account: Some("acct".to_string()),
            table: Some("users".to_string()),
            concurrency: 4,
            ..RunConfig::default()
        };

        let err = run_with_sink(&config, TransportKind::Http, keys(40), quiet())
            .await
            .unwrap_err();

        match &err {
            RunError::Aborted { failure, partial } => {
                assert!(failure.key.is_some());
                assert_eq!(partial.total_requests, 0);
            }
            other => panic!("expected an aborted run, got {other:?}"),
        }
        assert!(err.partial_summary().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn keys_from_csv() {
        init();
        let addr = mock_service::spawn().await;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"id,name\n1,a\n2,b\nmissing-3,c\n4,d\n")
            .unwrap();
        let source = KeySource::from_csv(file.path()).unwrap();
        assert_eq!(source.len(), 4);

        let config = RunConfig {
            concurrency: 3,
            repeat: 5,
            ..config(addr, "")
        };
        let summary = run_with_sink(&config, TransportKind::Http, source.into_keys(), quiet())
            .await
            .unwrap();

        assert_eq!(summary.total_requests, 20);
        assert_eq!(summary.error_count, 5);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["total_requests"], 20);
    }
}
