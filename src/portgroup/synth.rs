//! Synthetic bundles for ports nobody else claims.
//!
//! Raw engine ports are grouped by the client/path prefix in their names:
//! `system:capture_1`, `system:capture_2` become one bundle `system` with
//! channels `capture_1` and `capture_2`.

use std::rc::Rc;

use super::group::PortGroup;
use crate::bundle::{Bundle, DataType};
use crate::session::PortEngine;

/// Split an already naturally-sorted list of port names into runs sharing
/// the same prefix and add one bundle per run to `group`.
///
/// The separator is `/` if every name has one, else `:` if every name has
/// one; without a common separator the whole list becomes a single bundle.
pub fn add_bundles_for_ports(
    group: &mut PortGroup,
    ports: &[String],
    data_type: DataType,
    inputs: bool,
    allow_dups: bool,
    engine: &dyn PortEngine,
) {
    let separator = if ports.iter().all(|p| p.contains('/')) {
        Some('/')
    } else if ports.iter().all(|p| p.contains(':')) {
        Some(':')
    } else {
        None
    };

    let Some(separator) = separator else {
        let bundle = make_bundle_from_ports(ports, data_type, inputs, None, engine);
        group.add_bundle(bundle, None, None, allow_dups);
        return;
    };

    let mut run: Vec<String> = Vec::new();
    let mut current_prefix = "";
    for port in ports {
        let prefix = prefix_through(port, separator).unwrap_or("");
        if prefix != current_prefix && !run.is_empty() {
            let bundle = make_bundle_from_ports(&run, data_type, inputs, None, engine);
            group.add_bundle(bundle, None, None, allow_dups);
            run.clear();
        }
        current_prefix = prefix;
        run.push(port.clone());
    }
    if !run.is_empty() {
        let bundle = make_bundle_from_ports(&run, data_type, inputs, None, engine);
        group.add_bundle(bundle, None, None, allow_dups);
    }
}

/// Build a bundle with one single-port channel per name.
///
/// The bundle is named `bundle_name` if given, else after the names' common
/// prefix (without its trailing separator).  A channel is named after the
/// port's pretty name when the engine has one, else after the port name
/// with the common prefix removed.
pub fn make_bundle_from_ports(
    ports: &[String],
    data_type: DataType,
    inputs: bool,
    bundle_name: Option<&str>,
    engine: &dyn PortEngine,
) -> Rc<Bundle> {
    let prefix = common_prefix(ports);
    let name = match bundle_name {
        Some(name) => name.to_string(),
        None => prefix
            .strip_suffix(['/', ':'])
            .unwrap_or(prefix)
            .to_string(),
    };

    let bundle = Bundle::new(name, inputs);
    for port in ports {
        let channel_name = engine
            .pretty_name(port)
            .unwrap_or_else(|| port[prefix.len()..].to_string());
        bundle.add_channel(channel_name, data_type, [port.as_str()]);
    }
    Rc::new(bundle)
}

/// Prefix, separator included, that every name shares: first tried up to
/// the first `/`, then up to the first `:`.  Empty if neither works.
pub fn common_prefix(ports: &[String]) -> &str {
    common_prefix_before(ports, '/')
        .or_else(|| common_prefix_before(ports, ':'))
        .unwrap_or("")
}

fn common_prefix_before(ports: &[String], separator: char) -> Option<&str> {
    let first = ports.first()?;
    let prefix = prefix_through(first, separator)?;
    ports[1..]
        .iter()
        .all(|p| p.starts_with(prefix))
        .then_some(prefix)
}

/// `name` up to and including the first `separator`.
fn prefix_through(name: &str, separator: char) -> Option<&str> {
    name.find(separator)
        .map(|i| &name[..i + separator.len_utf8()])
}

pub fn port_has_prefix(name: &str, prefix: &str) -> bool {
    name.starts_with(prefix)
}
