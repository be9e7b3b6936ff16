//! Port grouping
//!
//! Collects every port source of a session (routes, sidechains, session
//! bundles, program ports, IO plugins, unclaimed engine ports) into named
//! groups of bundles for a connection matrix.

pub mod group;
pub mod list;
mod natsort;
pub mod synth;

pub use group::{BundleRecord, PortGroup};
pub use list::{GatherOptions, PortGroupList};
pub use natsort::natural_cmp;
