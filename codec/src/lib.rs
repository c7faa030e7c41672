//! Boundary codecs for the RPC layer
//!
//! These formats carry block hashes and vote bits as single hex strings.
//! They perform no consensus validation but reject malformed input outright.

mod error;
mod hashes;
mod vote_bits;

pub use error::*;
pub use hashes::*;
pub use vote_bits::*;
