//! Prometheus-based metrics for generation, execution and self-debug sessions.
//!
//! ```ignore
//! use cot_bench::metrics::{export_metrics, init_metrics, MetricsCollector};
//!
//! init_metrics()?;
//! MetricsCollector::new().record_session("passed", 2);
//! std::fs::write("metrics.prom", export_metrics())?;
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::MetricsCollector;
pub use prometheus::{export_metrics, init_metrics, REGISTRY};
