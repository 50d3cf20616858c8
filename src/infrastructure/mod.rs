//! Infrastructure layer - cache and storage backends, logging and metrics

pub mod cache;
pub mod logging;
pub mod metrics;
pub mod storage;
