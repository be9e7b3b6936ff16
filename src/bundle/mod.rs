//! Bundle model
//!
//! A bundle is a named, ordered set of logical channels, each backed by one
//! or more concrete engine ports.  Bundles are owned by whoever created them
//! (routes, the session, control surfaces) and shared with the port groups
//! as `Rc<Bundle>`.

mod signal;
mod types;

pub use signal::{Connection, Signal, WeakSignal};
pub use types::*;
