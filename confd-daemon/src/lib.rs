//! Agent runtime: Apollo polling client + tokio poll loop + tracing setup.

pub mod apollo;
mod error;
mod runtime;

pub use apollo::{diff_configurations, ApolloClient, ConfigResponse};
pub use error::DaemonError;
pub use runtime::{
    init_tracing, poll_task, preview_diff, run, run_once, start_blocking, LOG_FORMAT_ENV,
};
