pub mod cli;
pub mod client;
pub mod collector;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod sources;

pub use client::{
    EventRouter, HandlerId, OutboundQueue, QueueStats, RouterStats, SessionClient, SessionStats,
};
pub use collector::Aggregator;
pub use config::AppConfig;
pub use domain::{ConnectionState, Session, Snapshot, StateChange, Subscription};
pub use error::{ArgusError, Result};
pub use services::{HealthServer, HealthState, SnapshotStreamer};
pub use sources::DataSource;
