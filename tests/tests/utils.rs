use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use parkbench_core::RunConfig;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

/// Install logging and a Prometheus recorder once per test binary.
#[allow(unused)]
pub fn init() -> &'static PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

    HANDLE.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_env_filter("parkbench=debug,mock_service=info")
            .with_test_writer()
            .init();

        PrometheusBuilder::new().install_recorder().unwrap()
    })
}

/// Config pointing at a mock service, with `prefix` prepended to the lookup path.
#[allow(unused)]
pub fn config(addr: SocketAddr, prefix: &str) -> RunConfig {
    RunConfig {
        http_address: Some(format!("http://{addr}{prefix}")),
        account: Some("acct".to_string()),
        table: Some("users".to_string()),
        ..RunConfig::default()
    }
}

#[allow(unused)]
pub fn keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("user-{i:04}")).collect()
}
