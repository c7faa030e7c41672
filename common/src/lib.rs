// Strata common library - main library exports

pub mod configuration;
pub mod hash;
pub mod merkle;
pub mod messages;
pub mod params;
pub mod time_source;
pub mod types;

// Flattened re-exports
pub use self::configuration::Network;
pub use self::hash::{BlockHash, Hash, TxHash};
pub use self::params::{ChainParams, Deployment};
pub use self::time_source::{FixedTimeSource, SystemTimeSource, TimeSource, TimeSourceError};
pub use self::types::*;
