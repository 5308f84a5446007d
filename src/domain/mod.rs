pub mod device;
pub mod session;
pub mod snapshot;

pub use device::*;
pub use session::*;
pub use snapshot::*;
