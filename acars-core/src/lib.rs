//! acars-core: Pure decode + routing library for acarsdec UDP output.
//!
//! No async and no sockets, just the wire format, the retransmission
//! comparator and the label policy. `acars-server` wraps it with the UDP
//! loop and the database.

pub mod config;
pub mod decode;
pub mod enrich;
pub mod identity;
pub mod routing;
pub mod types;

// Re-export commonly used types at crate root
pub use decode::decode;
pub use enrich::ChannelPlan;
pub use identity::same;
pub use routing::{LabelPolicy, OnceKey, Outcome, Route};
pub use types::*;
