pub mod health;
pub mod streamer;

pub use health::{ComponentHealth, HealthResponse, HealthServer, HealthState, HealthStatus};
pub use streamer::SnapshotStreamer;
