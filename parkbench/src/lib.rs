#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod aggregator;
pub mod benchmark;
pub mod keys;
pub mod planner;
pub mod report;
pub mod transport;

mod error;
mod pool;
mod transaction;

pub use benchmark::{run, run_with_sink, Benchmark};
pub use error::RunError;
pub use keys::{KeySource, KeySourceError};
pub use pool::WorkerFailure;

pub mod prelude {
    pub use crate::benchmark::{run, run_with_sink, Benchmark};
    pub use crate::keys::KeySource;
    pub use crate::report::LiveTick;
    pub use crate::transport::{Connector, HttpConnector, RpcConnector, Transport};
    pub use crate::RunError;

    pub use parkbench_core::{RunConfig, Summary, TransportKind};
}
