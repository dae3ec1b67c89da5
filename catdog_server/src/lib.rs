mod error;
mod routes;
mod server;
mod telemetry;

pub mod app;
pub mod artifact;
pub mod config;
pub mod feedback;
pub mod jobs;
pub mod metrics_store;
pub mod pipeline;
pub mod prediction;

pub use app::start_app;
