// Middleware module - request metrics

pub mod metrics;

pub use metrics::metrics_middleware;
