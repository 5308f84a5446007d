//! Session protocol client - connection lifecycle, queueing, routing.

pub mod protocol;
pub mod queue;
pub mod router;
pub mod session;
pub mod transport;

pub use protocol::{SessionIntegrity, ViolationAlert};
pub use queue::{OutboundQueue, QueueStats};
pub use router::{EventRouter, HandlerId, RouterStats};
pub use session::{backoff_delay, SessionClient, SessionStats};
pub use transport::{ConnectionReader, ConnectionWriter, Frame, Transport, WsTransport};
