pub mod app;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod instrumentation;
pub mod logging;
pub mod metrics;
pub mod shutdown;
