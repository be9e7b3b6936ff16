//! portgroups - port group aggregation for a DAW connection matrix.
//!
//! A gather walks a session's routes, bundles, program ports and the
//! engine's port table and sorts everything into named groups of bundles
//! (Tracks, Busses, Hardware, ...), with change notifications that can be
//! suspended and coalesced while the list is being rebuilt.

pub mod bundle;
pub mod config;
pub mod portgroup;
pub mod session;

pub use bundle::{Bundle, BundleChange, ChanCount, Channel, Color, DataType};
pub use portgroup::{BundleRecord, GatherOptions, PortGroup, PortGroupList};
pub use session::{GatherContext, PortRegistry, Session, SessionSnapshot, SnapshotError};
