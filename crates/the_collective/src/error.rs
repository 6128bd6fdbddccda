//! The Collective shares one error taxonomy with the rest of the workspace
//! rather than keeping its own shadow copy.

pub use the_foundation::{CryptexError, CryptexResult};
