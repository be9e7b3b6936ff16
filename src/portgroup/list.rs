//! The full set of port groups shown on one side of a connection matrix.
//!
//! ## Gather
//! [`PortGroupList::gather`] rebuilds the list from scratch: route IOs
//! sorted by display order, plugin sidechains, session bundles, the
//! program's own special ports, IO plugins, and finally every engine port
//! none of those claimed, bundled by name prefix.
//!
//! ## Notifications
//! Group membership changes and member bundle changes are republished on
//! the list's own signals.  While suspended, at most one pending change and
//! the latest bundle change are kept and delivered on resume.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use super::group::{BundleRecord, PortGroup};
use super::natsort::natural_cmp;
use super::synth::{add_bundles_for_ports, make_bundle_from_ports, port_has_prefix};
use crate::bundle::{Bundle, BundleChange, ChanCount, Connection, DataType, Signal};
use crate::session::{GatherContext, Io, Route, Session};

pub const BUSSES: &str = "Busses";
pub const TRACKS: &str = "Tracks";
pub const SIDECHAINS: &str = "Sidechains";
pub const IO_PRE: &str = "I/O Pre";
pub const IO_POST: &str = "I/O Post";
pub const HARDWARE: &str = "Hardware";
pub const EXTERNAL: &str = "External";

/// Name of the group holding the program's own ports.
pub fn program_group_name(program_name: &str) -> String {
    format!("{} Misc", program_name)
}

/// Word identifying the program's monitor bus ports in engine port names.
const MONITOR: &str = "monitor";

/// What a gather collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherOptions {
    /// Only bundles with channels of this type; `None` for every type.
    #[serde(default)]
    pub data_type: Option<DataType>,
    /// Collect inputs (true) or outputs (false).
    #[serde(default)]
    pub inputs: bool,
    /// Allow several bundles offering the same ports in one group.
    #[serde(default)]
    pub allow_dups: bool,
    /// Also use the session's automatic bundles, which pair hardware ports.
    #[serde(default = "GatherOptions::default_use_session_bundles")]
    pub use_session_bundles: bool,
}

impl GatherOptions {
    fn default_use_session_bundles() -> bool {
        true
    }

    pub fn inputs() -> Self {
        Self {
            inputs: true,
            ..Self::default()
        }
    }

    pub fn outputs() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn allowing_dups(mut self) -> Self {
        self.allow_dups = true;
        self
    }

    pub fn without_session_bundles(mut self) -> Self {
        self.use_session_bundles = false;
        self
    }

    fn wants(&self, data_type: DataType) -> bool {
        data_type.matches(self.data_type)
    }
}

impl Default for GatherOptions {
    fn default() -> Self {
        Self {
            data_type: None,
            inputs: false,
            allow_dups: false,
            use_session_bundles: Self::default_use_session_bundles(),
        }
    }
}

// ── Notification state ─────────────────────────────────────────────────────

struct Notifier {
    suspended: Cell<bool>,
    pending_change: Cell<bool>,
    pending_bundle_change: Cell<Option<BundleChange>>,
    bundles_stale: Cell<bool>,
    changed: Signal<()>,
    bundle_changed: Signal<BundleChange>,
}

impl Notifier {
    fn new() -> Self {
        Self {
            suspended: Cell::new(false),
            pending_change: Cell::new(false),
            pending_bundle_change: Cell::new(None),
            bundles_stale: Cell::new(true),
            changed: Signal::new(),
            bundle_changed: Signal::new(),
        }
    }

    fn emit_changed(&self) {
        if self.suspended.get() {
            self.pending_change.set(true);
        } else {
            self.changed.emit(&());
        }
    }

    fn emit_bundle_changed(&self, change: BundleChange) {
        if self.suspended.get() {
            self.pending_bundle_change.set(Some(change));
        } else {
            self.bundle_changed.emit(&change);
        }
    }
}

// ── Gather scratch space ───────────────────────────────────────────────────

/// The fixed categories filled by one gather pass.
struct Categories {
    bus: PortGroup,
    track: PortGroup,
    sidechain: PortGroup,
    iop_pre: PortGroup,
    iop_post: PortGroup,
    system: PortGroup,
    program: PortGroup,
    other: PortGroup,
}

impl Categories {
    fn new(program_name: &str) -> Self {
        Self {
            bus: PortGroup::new(BUSSES),
            track: PortGroup::new(TRACKS),
            sidechain: PortGroup::new(SIDECHAINS),
            iop_pre: PortGroup::new(IO_PRE),
            iop_post: PortGroup::new(IO_POST),
            system: PortGroup::new(HARDWARE),
            program: PortGroup::new(program_group_name(program_name)),
            other: PortGroup::new(EXTERNAL),
        }
    }

    fn has_port(&self, port: &str) -> bool {
        [
            &self.system,
            &self.bus,
            &self.track,
            &self.iop_pre,
            &self.iop_post,
            &self.sidechain,
            &self.program,
            &self.other,
        ]
        .iter()
        .any(|g| g.has_port(port))
    }

    /// Publication order.
    fn into_ordered(self) -> [PortGroup; 8] {
        [
            self.bus,
            self.track,
            self.sidechain,
            self.iop_pre,
            self.iop_post,
            self.program,
            self.other,
            self.system,
        ]
    }
}

/// A route and the IOs whose bundles it contributes.
struct RouteIos {
    route: Rc<dyn Route>,
    ios: Vec<Rc<dyn Io>>,
}

/// Engine ports not claimed by any bundle, bucketed by type.
#[derive(Default)]
struct UnclaimedPorts {
    system: [Vec<String>; 2],
    program: [Vec<String>; 2],
    other: [Vec<String>; 2],
}

// ── PortGroupList ──────────────────────────────────────────────────────────

pub struct PortGroupList {
    groups: Vec<PortGroup>,
    /// Forwarding subscriptions to the groups' signals.
    connections: Vec<Connection>,
    /// Flattened bundle list, rebuilt on read when stale.
    bundles: RefCell<Vec<Rc<BundleRecord>>>,
    notifier: Rc<Notifier>,
}

impl PortGroupList {
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            connections: Vec::new(),
            bundles: RefCell::new(Vec::new()),
            notifier: Rc::new(Notifier::new()),
        }
    }

    /// The set of groups or their membership changed.
    pub fn changed(&self) -> &Signal<()> {
        &self.notifier.changed
    }

    /// A bundle in one of the groups changed.
    pub fn bundle_changed(&self) -> &Signal<BundleChange> {
        &self.notifier.bundle_changed
    }

    pub fn groups(&self) -> &[PortGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&PortGroup> {
        self.groups.iter().find(|g| g.name() == name)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every bundle of every group, in display order.
    pub fn bundles(&self) -> Vec<Rc<BundleRecord>> {
        if self.notifier.bundles_stale.replace(false) {
            *self.bundles.borrow_mut() = self
                .groups
                .iter()
                .flat_map(|g| g.records().cloned())
                .collect();
        }
        self.bundles.borrow().clone()
    }

    pub fn total_channels(&self) -> ChanCount {
        self.groups
            .iter()
            .fold(ChanCount::ZERO, |n, g| n + g.total_channels())
    }

    pub fn io_from_bundle(&self, bundle: &Rc<Bundle>) -> Option<Rc<dyn Io>> {
        self.groups.iter().find_map(|g| g.io_from_bundle(bundle))
    }

    pub fn clear(&mut self) {
        self.reset();
        self.notifier.emit_changed();
    }

    pub fn add_group(&mut self, group: PortGroup) {
        self.attach_group(group);
        self.notifier.emit_changed();
    }

    /// Remove a bundle (by identity) from every group.
    pub fn remove_bundle(&mut self, bundle: &Rc<Bundle>) {
        for group in &mut self.groups {
            group.remove_bundle(bundle);
        }
        self.notifier.emit_changed();
    }

    // ── Signal suspension ──────────────────────────────────────────────────

    pub fn suspend_signals(&self) {
        self.notifier.suspended.set(true);
    }

    /// Deliver what was held back while suspended (membership change first,
    /// then the latest bundle change) and resume normal delivery.
    pub fn resume_signals(&self) {
        if self.notifier.pending_change.replace(false) {
            self.notifier.changed.emit(&());
        }
        if let Some(change) = self.notifier.pending_bundle_change.take() {
            self.notifier.bundle_changed.emit(&change);
        }
        self.notifier.suspended.set(false);
    }

    pub fn signals_suspended(&self) -> bool {
        self.notifier.suspended.get()
    }

    fn reset(&mut self) {
        self.connections.clear();
        self.groups.clear();
        self.notifier.bundles_stale.set(true);
    }

    fn attach_group(&mut self, group: PortGroup) {
        let notifier: Weak<Notifier> = Rc::downgrade(&self.notifier);
        self.connections.push(group.changed().connect(move |_| {
            if let Some(n) = notifier.upgrade() {
                n.bundles_stale.set(true);
                n.emit_changed();
            }
        }));

        let notifier: Weak<Notifier> = Rc::downgrade(&self.notifier);
        self.connections
            .push(group.bundle_changed().connect(move |change| {
                if let Some(n) = notifier.upgrade() {
                    n.emit_bundle_changed(*change);
                }
            }));

        self.groups.push(group);
        self.notifier.bundles_stale.set(true);
    }

    // ── Gather ─────────────────────────────────────────────────────────────

    /// Rebuild the list from every port source of `session`.
    ///
    /// Emits exactly one `changed` notification (held back if suspended).
    /// Without a session the list is simply cleared.
    pub fn gather(
        &mut self,
        session: Option<&dyn Session>,
        ctx: &GatherContext<'_>,
        options: &GatherOptions,
    ) {
        let Some(session) = session else {
            self.clear();
            return;
        };

        self.reset();

        let mut cats = Categories::new(ctx.program_name);

        gather_routes(&mut cats, session, options);
        gather_session_bundles(&mut cats, session, options);
        gather_program_ports(&mut cats, session, ctx, options);
        gather_io_plugs(&mut cats, session, options);

        let unclaimed = collect_unclaimed_ports(&cats, ctx, options);
        add_unclaimed_bundles(&mut cats, unclaimed, ctx, options);

        if !options.allow_dups {
            cats.system.remove_duplicates();
        }

        for group in cats.into_ordered() {
            if !group.is_empty() {
                self.attach_group(group);
            }
        }

        log::info!(
            "Gathered {} {} groups ({} bundles, {} type)",
            self.groups.len(),
            if options.inputs { "input" } else { "output" },
            self.groups.iter().map(PortGroup::len).sum::<usize>(),
            options.data_type.map_or("any", |t| t.as_str())
        );

        self.notifier.emit_changed();
    }
}

impl Default for PortGroupList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PortGroupList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortGroupList")
            .field("groups", &self.groups)
            .field("suspended", &self.notifier.suspended.get())
            .finish()
    }
}

// ── Gather stages ──────────────────────────────────────────────────────────

/// Route IOs (sorted by display order) into Tracks / Busses, plus plugin
/// sidechains on the input side.
fn gather_routes(cats: &mut Categories, session: &dyn Session, options: &GatherOptions) {
    let inputs = options.inputs;
    let mut route_ios: Vec<RouteIos> = Vec::new();

    for route in session.routes() {
        // The monitor bus inputs are never offered.
        if inputs && route.is_monitor() {
            continue;
        }

        let main_io = if inputs { route.input() } else { route.output() };
        let mut ios = vec![main_io];

        for processor in route.processors() {
            let Some(processor) = processor.upgrade() else {
                continue;
            };
            let io = if inputs {
                processor.input()
            } else {
                processor.output()
            };
            // The main outs delivery shares the route's output IO.
            if let Some(io) = io
                && !ios.iter().any(|used| Rc::ptr_eq(used, &io))
            {
                ios.push(io);
            }
        }

        route_ios.push(RouteIos { route, ios });
    }

    route_ios.sort_by_key(|r| r.route.order());

    for RouteIos { route, ios } in &route_ios {
        let color = route.color();
        let group = if route.is_track() {
            &mut cats.track
        } else {
            &mut cats.bus
        };

        for io in ios {
            let wanted = options
                .data_type
                .is_none_or(|t| io.bundle().nchannels().n(t) > 0);
            if wanted {
                group.add_io_bundle(io, color);
            }
        }

        if inputs {
            for n in 0.. {
                let Some(plugin) = route.nth_plugin(n) else {
                    break;
                };
                if let Some(sidechain) = plugin.sidechain_input() {
                    cats.sidechain.add_io_bundle(&sidechain, color);
                }
            }
        }
    }
}

/// Session bundles into Hardware: user bundles first so they win over
/// automatic bundles offering the same ports.
fn gather_session_bundles(cats: &mut Categories, session: &dyn Session, options: &GatherOptions) {
    let bundles = session.bundles();

    for sb in bundles
        .iter()
        .filter(|sb| sb.user && sb.bundle.ports_are_inputs() == options.inputs)
    {
        cats.system
            .add_bundle(sb.bundle.clone(), None, None, options.allow_dups);
    }

    if options.use_session_bundles {
        for sb in bundles
            .iter()
            .filter(|sb| !sb.user && sb.bundle.ports_are_inputs() == options.inputs)
        {
            cats.system
                .add_bundle(sb.bundle.clone(), None, None, options.allow_dups);
        }
    }
}

/// Auditioner, click, LTC, sync, control surfaces and the virtual keyboard.
fn gather_program_ports(
    cats: &mut Categories,
    session: &dyn Session,
    ctx: &GatherContext<'_>,
    options: &GatherOptions,
) {
    let inputs = options.inputs;
    let engine = ctx.engine;

    if options.wants(DataType::Audio) {
        if !inputs {
            // Listed as program ports, not owned by their IO.
            if let Some(io) = session.auditioner_output() {
                cats.program.add_bundle(io.bundle(), None, None, false);
            }
            if let Some(io) = session.click_io() {
                cats.program.add_bundle(io.bundle(), None, None, false);
            }
            if let Some(port) = session.ltc_output_port() {
                let ltc = Bundle::new("LTC Out", inputs);
                ltc.add_channel(
                    "LTC Out",
                    DataType::Audio,
                    [engine.make_port_name_non_relative(&port)],
                );
                cats.program.add_bundle(Rc::new(ltc), None, None, false);
            }
        } else {
            let sync = Bundle::new("Sync", inputs);
            for master in ctx.transport_masters {
                let Some(port) = master.port.as_ref() else {
                    continue;
                };
                if port.data_type != DataType::Audio {
                    continue;
                }
                sync.add_channel(
                    master.name.as_str(),
                    DataType::Audio,
                    [engine.make_port_name_non_relative(&port.name)],
                );
            }
            add_if_populated(&mut cats.program, sync);
        }
    }

    if !options.wants(DataType::Midi) {
        return;
    }

    for surface in ctx.control_surfaces.iter().filter(|s| s.is_active()) {
        for bundle in surface.bundles() {
            if bundle.ports_are_inputs() == inputs {
                cats.program.add_bundle(bundle, None, None, false);
            }
        }
    }

    if !inputs && let Some(port) = session.vkbd_output_port() {
        let full = engine.make_port_name_non_relative(&port);
        let pretty = engine.pretty_name(&full).unwrap_or(port);
        let vkbd = Bundle::new(pretty.as_str(), inputs);
        vkbd.add_channel(pretty, DataType::Midi, [full]);
        cats.program.add_bundle(Rc::new(vkbd), None, None, false);
    }

    let sync = Bundle::new("Sync", inputs);
    if inputs {
        for master in ctx.transport_masters {
            let Some(port) = master.port.as_ref() else {
                continue;
            };
            if port.data_type != DataType::Midi {
                continue;
            }
            sync.add_channel(
                master.name.as_str(),
                DataType::Midi,
                [engine.make_port_name_non_relative(&port.name)],
            );
        }
        if let Some(port) = session.mmc_input_port() {
            sync.add_channel(
                "MMC in",
                DataType::Midi,
                [engine.make_port_name_non_relative(&port)],
            );
        }
    } else {
        let outs = [
            ("MTC out", session.mtc_output_port()),
            ("MIDI clock out", session.midi_clock_output_port()),
            ("MMC out", session.mmc_output_port()),
        ];
        for (name, port) in outs {
            if let Some(port) = port {
                sync.add_channel(
                    name,
                    DataType::Midi,
                    [engine.make_port_name_non_relative(&port)],
                );
            }
        }
    }
    add_if_populated(&mut cats.program, sync);
}

fn add_if_populated(group: &mut PortGroup, bundle: Bundle) {
    if bundle.n_total() > 0 {
        group.add_bundle(Rc::new(bundle), None, None, false);
    }
}

/// Session-level IO plugins into I/O Pre / I/O Post.
fn gather_io_plugs(cats: &mut Categories, session: &dyn Session, options: &GatherOptions) {
    for plug in session.io_plugs() {
        let io = if options.inputs {
            plug.input()
        } else {
            plug.output()
        };
        let n = io.n_ports();
        if n.n_total() == 0 || n.n_matching(options.data_type) == 0 {
            continue;
        }
        let group = if plug.is_pre() {
            &mut cats.iop_pre
        } else {
            &mut cats.iop_post
        };
        group.add_io_bundle(&io, None);
    }
}

/// Scan the engine for ports nothing gathered so far offers.
fn collect_unclaimed_ports(
    cats: &Categories,
    ctx: &GatherContext<'_>,
    options: &GatherOptions,
) -> UnclaimedPorts {
    let engine = ctx.engine;
    let program = ctx.program_name.to_lowercase();
    let program_prefix = format!("{}:", program);

    let mut ports: Vec<String> = DataType::ALL
        .into_iter()
        .filter(|t| options.wants(*t))
        .flat_map(|t| engine.get_ports(t, options.inputs))
        .collect();
    ports.sort_by(|a, b| natural_cmp(a, b));

    let mut unclaimed = UnclaimedPorts::default();

    for port in ports {
        if !options.allow_dups && cats.has_port(&port) {
            continue;
        }

        // MIDI through ports only get in the way of default connections.
        if port.contains("Midi-Through") || port.contains("Midi Through") {
            continue;
        }

        // Our own monitor bus inputs, skipped among the routes.
        let lower = port.to_lowercase();
        if lower.contains(MONITOR) && lower.contains(&program) {
            continue;
        }

        let Some(info) = engine.port_info(&port) else {
            log::debug!("Port {:?} vanished during scan", port);
            continue;
        };

        let index = info.data_type.index();
        if info.flags.hidden {
            continue;
        } else if port_has_prefix(&port, &program_prefix) {
            log::debug!("Unclaimed program port {:?}", port);
            unclaimed.program[index].push(port);
        } else if info.flags.physical {
            log::debug!("Unclaimed hardware port {:?}", port);
            unclaimed.system[index].push(port);
        } else {
            log::debug!("Unclaimed external port {:?}", port);
            unclaimed.other[index].push(port);
        }
    }

    unclaimed
}

fn add_unclaimed_bundles(
    cats: &mut Categories,
    unclaimed: UnclaimedPorts,
    ctx: &GatherContext<'_>,
    options: &GatherOptions,
) {
    let engine = ctx.engine;
    let inputs = options.inputs;
    let program = ctx.program_name.to_lowercase();

    for t in DataType::ALL {
        let ports = &unclaimed.system[t.index()];
        if !ports.is_empty() {
            add_bundles_for_ports(&mut cats.system, ports, t, inputs, options.allow_dups, engine);
        }
    }

    for t in DataType::ALL {
        let ports = &unclaimed.program[t.index()];
        if !ports.is_empty() {
            let bundle = make_bundle_from_ports(ports, t, inputs, Some(&program), engine);
            cats.program.add_bundle(bundle, None, None, false);
        }
    }

    for t in DataType::ALL {
        let ports = &unclaimed.other[t.index()];
        if !ports.is_empty() {
            add_bundles_for_ports(&mut cats.other, ports, t, inputs, options.allow_dups, engine);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionSnapshot, SnapshotModel};

    const SESSION: &str = r#"{
        "program_name": "Daw",
        "routes": [
            {
                "name": "Bass", "order": 2, "kind": "track",
                "input": { "name": "Bass in", "ports": [{ "name": "Bass/audio_in 1", "type": "audio" }] },
                "output": { "name": "Bass out", "ports": [
                    { "name": "Bass/audio_out 1", "type": "audio" },
                    { "name": "Bass/audio_out 2", "type": "audio" }
                ] }
            },
            {
                "name": "Vox", "order": 1, "kind": "track",
                "color": { "r": 10, "g": 20, "b": 30 },
                "input": { "name": "Vox in", "ports": [{ "name": "Vox/audio_in 1", "type": "audio" }] },
                "output": { "name": "Vox out", "ports": [{ "name": "Vox/audio_out 1", "type": "audio" }] },
                "processors": [
                    { "name": "Comp", "plugin": true,
                      "sidechain": { "name": "Comp sc", "ports": [{ "name": "Vox/Comp sc 1", "type": "audio" }] } }
                ]
            },
            {
                "name": "Monitor", "order": 10, "kind": "monitor",
                "input": { "name": "Monitor in", "ports": [{ "name": "Monitor/audio_in 1", "type": "audio" }] },
                "output": { "name": "Monitor out", "ports": [{ "name": "Monitor/audio_out 1", "type": "audio" }] }
            },
            {
                "name": "Reverb", "order": 3, "kind": "bus",
                "input": { "name": "Reverb in", "ports": [
                    { "name": "Reverb/audio_in 1", "type": "audio" },
                    { "name": "Reverb/audio_in 2", "type": "audio" }
                ] },
                "output": { "name": "Reverb out", "ports": [{ "name": "Reverb/audio_out 1", "type": "audio" }] }
            }
        ],
        "bundles": [
            { "name": "Mic pair", "inputs": false, "user": true, "channels": [
                { "name": "L", "type": "audio", "ports": ["system:capture_1"] },
                { "name": "R", "type": "audio", "ports": ["system:capture_2"] }
            ] },
            { "name": "auto 1+2", "inputs": false, "channels": [
                { "name": "1", "type": "audio", "ports": ["system:capture_1"] },
                { "name": "2", "type": "audio", "ports": ["system:capture_2"] }
            ] },
            { "name": "capture 3", "inputs": false, "channels": [
                { "name": "3", "type": "audio", "ports": ["system:capture_3"] }
            ] }
        ],
        "auditioner": { "name": "Auditioner", "ports": [{ "name": "Auditioner/audio_out 1", "type": "audio" }] },
        "click": { "name": "Click", "ports": [{ "name": "Click/audio_out 1", "type": "audio" }] },
        "special_ports": {
            "ltc_output": "LTC out",
            "vkbd_output": "x-virtual-keyboard",
            "mtc_output": "MTC out",
            "midi_clock_output": "MIDI clock out",
            "mmc_output": "MMC out",
            "mmc_input": "MMC in"
        },
        "control_surfaces": [
            { "name": "Mackie", "bundles": [
                { "name": "Mackie in", "inputs": true, "channels": [
                    { "name": "in", "type": "midi", "ports": ["daw:mackie control in"] }
                ] },
                { "name": "Mackie out", "inputs": false, "channels": [
                    { "name": "out", "type": "midi", "ports": ["daw:mackie control out"] }
                ] }
            ] },
            { "name": "Idle", "active": false, "bundles": [
                { "name": "Idle out", "inputs": false, "channels": [
                    { "name": "out", "type": "midi", "ports": ["daw:idle out"] }
                ] }
            ] }
        ],
        "io_plugs": [
            { "name": "Limiter", "pre": true,
              "input": { "name": "Limiter in", "ports": [{ "name": "Limiter/audio_in 1", "type": "audio" }] },
              "output": { "name": "Limiter out", "ports": [{ "name": "Limiter/audio_out 1", "type": "audio" }] } }
        ],
        "transport_masters": [
            { "name": "LTC", "port": { "name": "LTC in", "type": "audio" } },
            { "name": "Internal" }
        ],
        "ports": [
            { "name": "system:capture_1", "type": "audio", "direction": "output", "physical": true },
            { "name": "system:capture_2", "type": "audio", "direction": "output", "physical": true },
            { "name": "system:capture_3", "type": "audio", "direction": "output", "physical": true },
            { "name": "system:playback_1", "type": "audio", "direction": "input", "physical": true },
            { "name": "system:playback_2", "type": "audio", "direction": "input", "physical": true },
            { "name": "system:midi_capture_1", "type": "midi", "direction": "output", "physical": true },
            { "name": "Midi-Through:midi_out", "type": "midi", "direction": "output" },
            { "name": "synth:out_L", "type": "audio", "direction": "output" },
            { "name": "synth:out_R", "type": "audio", "direction": "output" },
            { "name": "synth:midi_in", "type": "midi", "direction": "input" },
            { "name": "jack:secret", "type": "audio", "direction": "output", "hidden": true },
            { "name": "daw:Aux 1", "type": "audio", "direction": "output" },
            { "name": "daw:x-virtual-keyboard", "type": "midi", "direction": "output",
              "pretty_name": "Virtual Keyboard" }
        ]
    }"#;

    fn model() -> SnapshotModel {
        SessionSnapshot::from_json(SESSION).unwrap().build()
    }

    fn gathered(model: &SnapshotModel, options: GatherOptions) -> PortGroupList {
        let mut list = PortGroupList::new();
        list.gather(Some(model.session()), &model.context(), &options);
        list
    }

    fn group_names(list: &PortGroupList) -> Vec<&str> {
        list.groups().iter().map(PortGroup::name).collect()
    }

    fn bundle_names(list: &PortGroupList, group: &str) -> Vec<String> {
        list.group(group)
            .map(|g| g.records().map(|r| r.bundle.name()).collect())
            .unwrap_or_default()
    }

    fn count_changes(list: &PortGroupList) -> (Rc<Cell<usize>>, Connection) {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let conn = list.changed().connect(move |_| c.set(c.get() + 1));
        (count, conn)
    }

    #[test]
    fn test_gather_without_session_clears() {
        let model = model();
        let mut list = gathered(&model, GatherOptions::outputs());
        assert!(!list.is_empty());

        let (count, _conn) = count_changes(&list);
        list.gather(None, &model.context(), &GatherOptions::outputs());
        assert!(list.is_empty());
        assert!(list.bundles().is_empty());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_gather_emits_changed_once() {
        let model = model();
        let mut list = PortGroupList::new();
        let (count, _conn) = count_changes(&list);
        list.gather(Some(model.session()), &model.context(), &GatherOptions::outputs());
        assert_eq!(count.get(), 1);
        list.gather(Some(model.session()), &model.context(), &GatherOptions::inputs());
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_output_groups() {
        let model = model();
        let list = gathered(&model, GatherOptions::outputs());

        assert_eq!(
            group_names(&list),
            vec![BUSSES, TRACKS, IO_PRE, "Daw Misc", EXTERNAL, HARDWARE]
        );
        assert_eq!(bundle_names(&list, TRACKS), vec!["Vox out", "Bass out"]);
        assert_eq!(bundle_names(&list, BUSSES), vec!["Reverb out", "Monitor out"]);
        assert_eq!(bundle_names(&list, IO_PRE), vec!["Limiter out"]);
        assert_eq!(
            bundle_names(&list, "Daw Misc"),
            vec![
                "Auditioner",
                "Click",
                "LTC Out",
                "Mackie out",
                "Virtual Keyboard",
                "Sync",
                "daw"
            ]
        );
        assert_eq!(bundle_names(&list, EXTERNAL), vec!["synth"]);
        assert_eq!(bundle_names(&list, HARDWARE), vec!["Mic pair", "capture 3", "system"]);
    }

    #[test]
    fn test_input_groups() {
        let model = model();
        let list = gathered(&model, GatherOptions::inputs());

        assert_eq!(
            group_names(&list),
            vec![BUSSES, TRACKS, SIDECHAINS, IO_PRE, "Daw Misc", EXTERNAL, HARDWARE]
        );
        // The monitor bus inputs are left out, along with its engine ports.
        assert_eq!(bundle_names(&list, BUSSES), vec!["Reverb in"]);
        assert_eq!(bundle_names(&list, TRACKS), vec!["Vox in", "Bass in"]);
        assert_eq!(bundle_names(&list, SIDECHAINS), vec!["Comp sc"]);
        assert_eq!(bundle_names(&list, "Daw Misc"), vec!["Sync", "Mackie in", "Sync"]);
        assert_eq!(bundle_names(&list, HARDWARE), vec!["system"]);

        let misc = list.group("Daw Misc").unwrap().bundles();
        assert_eq!(misc[0].bundle.channel_name(0).as_deref(), Some("LTC"));
        assert_eq!(misc[0].bundle.channel_ports(0), vec!["daw:LTC in"]);
        assert_eq!(misc[2].bundle.channel_name(0).as_deref(), Some("MMC in"));
        assert!(misc.iter().all(|r| r.bundle.ports_are_inputs()));

        let hw = list.group(HARDWARE).unwrap().only_bundle();
        assert_eq!(hw.all_ports(), vec!["system:playback_1", "system:playback_2"]);
    }

    #[test]
    fn test_route_colours_and_owners() {
        let model = model();
        let list = gathered(&model, GatherOptions::outputs());

        let tracks = list.group(TRACKS).unwrap().bundles();
        assert_eq!(tracks[0].color, Some(crate::bundle::Color::from_rgb(10, 20, 30)));
        assert!(!tracks[1].has_color());

        let io = list.io_from_bundle(&tracks[0].bundle).unwrap();
        assert_eq!(io.name(), "Vox out");

        let synth = list.group(EXTERNAL).unwrap().only_bundle();
        assert!(list.io_from_bundle(&synth).is_none());
    }

    #[test]
    fn test_unclaimed_ports_are_classified() {
        let model = model();
        let list = gathered(&model, GatherOptions::outputs());

        let every_port: Vec<String> = list
            .bundles()
            .iter()
            .flat_map(|r| r.bundle.all_ports())
            .collect();
        assert!(!every_port.iter().any(|p| p.contains("Midi-Through")));
        assert!(!every_port.contains(&"jack:secret".to_string()));

        let program = list.group("Daw Misc").unwrap().bundles();
        let own = &program[program.len() - 1].bundle;
        assert_eq!(own.all_ports(), vec!["daw:Aux 1"]);
        assert_eq!(own.channel_name(0).as_deref(), Some("Aux 1"));

        let synth = list.group(EXTERNAL).unwrap().only_bundle();
        assert_eq!(synth.channel_name(1).as_deref(), Some("out_R"));

        let hw = list.group(HARDWARE).unwrap().bundles();
        assert_eq!(hw[2].bundle.all_ports(), vec!["system:midi_capture_1"]);
        assert_eq!(hw[2].bundle.nchannels().midi, 1);
    }

    #[test]
    fn test_type_filter() {
        let model = model();
        let list = gathered(&model, GatherOptions::outputs().with_type(DataType::Midi));

        assert_eq!(group_names(&list), vec!["Daw Misc", HARDWARE]);
        assert_eq!(
            bundle_names(&list, "Daw Misc"),
            vec!["Mackie out", "Virtual Keyboard", "Sync"]
        );
        // Session bundles are not filtered by type.
        assert_eq!(
            bundle_names(&list, HARDWARE),
            vec!["Mic pair", "capture 3", "system"]
        );
    }

    #[test]
    fn test_without_session_bundles() {
        let model = model();
        let list = gathered(&model, GatherOptions::outputs().without_session_bundles());

        let hw = list.group(HARDWARE).unwrap().bundles();
        let names: Vec<String> = hw.iter().map(|r| r.bundle.name()).collect();
        assert_eq!(names, vec!["Mic pair", "system", "system"]);
        assert_eq!(hw[1].bundle.all_ports(), vec!["system:capture_3"]);
    }

    #[test]
    fn test_allow_dups_keeps_everything() {
        let model = model();
        let list = gathered(&model, GatherOptions::outputs().allowing_dups());

        assert_eq!(
            bundle_names(&list, HARDWARE),
            vec!["Mic pair", "auto 1+2", "capture 3", "system", "system"]
        );
        let hw = list.group(HARDWARE).unwrap().bundles();
        assert_eq!(
            hw[3].bundle.all_ports(),
            vec!["system:capture_1", "system:capture_2", "system:capture_3"]
        );
    }

    #[test]
    fn test_smaller_hardware_bundles_are_dropped() {
        let json = r#"{
            "bundles": [
                { "name": "Stereo", "inputs": false, "user": true, "channels": [
                    { "name": "L", "type": "audio", "ports": ["system:capture_1"] },
                    { "name": "R", "type": "audio", "ports": ["system:capture_2"] }
                ] },
                { "name": "Mono 1", "inputs": false, "channels": [
                    { "name": "1", "type": "audio", "ports": ["system:capture_1"] }
                ] }
            ]
        }"#;
        let model = SessionSnapshot::from_json(json).unwrap().build();
        let list = gathered(&model, GatherOptions::outputs());

        assert_eq!(group_names(&list), vec![HARDWARE]);
        assert_eq!(bundle_names(&list, HARDWARE), vec!["Stereo"]);
    }

    #[test]
    fn test_empty_session() {
        let model = SessionSnapshot::from_json("{}").unwrap().build();
        let list = gathered(&model, GatherOptions::inputs());
        assert!(list.is_empty());
        assert_eq!(list.total_channels(), ChanCount::ZERO);
    }

    #[test]
    fn test_bundles_cache_follows_membership() {
        let model = model();
        let mut list = gathered(&model, GatherOptions::outputs());

        let all = list.bundles();
        let expected: usize = list.groups().iter().map(PortGroup::len).sum();
        assert_eq!(all.len(), expected);
        assert_eq!(all[0].bundle.name(), "Reverb out");

        let victim = all[0].bundle.clone();
        list.remove_bundle(&victim);
        let after = list.bundles();
        assert_eq!(after.len(), expected - 1);
        assert!(!after.iter().any(|r| Rc::ptr_eq(&r.bundle, &victim)));

        list.add_group({
            let mut g = PortGroup::new("Extra");
            g.add_bundle(Rc::new(Bundle::new("x", false)), None, None, false);
            g
        });
        assert_eq!(list.bundles().len(), expected);
        assert_eq!(list.groups().last().map(PortGroup::name), Some("Extra"));
    }

    #[test]
    fn test_total_channels() {
        let model = model();
        let list = gathered(&model, GatherOptions::inputs().with_type(DataType::Audio));
        // Reverb 2, Vox 1, Bass 1, sidechain 1, limiter 1, LTC sync 1, playback 2
        assert_eq!(list.total_channels(), ChanCount::new(DataType::Audio, 9));
    }

    #[test]
    fn test_suspended_changes_are_coalesced() {
        let model = model();
        let mut list = gathered(&model, GatherOptions::outputs());
        let (count, _conn) = count_changes(&list);

        list.suspend_signals();
        assert!(list.signals_suspended());
        list.gather(Some(model.session()), &model.context(), &GatherOptions::outputs());
        list.add_group(PortGroup::new("Extra"));
        list.clear();
        assert_eq!(count.get(), 0);

        list.resume_signals();
        assert!(!list.signals_suspended());
        assert_eq!(count.get(), 1);

        list.resume_signals();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_bundle_changes_are_forwarded() {
        let model = model();
        let list = gathered(&model, GatherOptions::outputs());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let _conn = list
            .bundle_changed()
            .connect(move |change| s.borrow_mut().push(*change));

        let bundle = list.group(TRACKS).unwrap().bundles()[0].bundle.clone();
        bundle.set_name("Lead out");
        assert_eq!(*seen.borrow(), vec![BundleChange::NameChanged]);

        list.suspend_signals();
        bundle.set_name("Vox out");
        bundle.add_channel("extra", DataType::Audio, ["daw:Vox/audio_out 2"]);
        assert_eq!(seen.borrow().len(), 1);

        list.resume_signals();
        assert_eq!(
            *seen.borrow(),
            vec![BundleChange::NameChanged, BundleChange::ConfigurationChanged]
        );
    }

    #[test]
    fn test_bundle_changes_stop_after_regather() {
        let model = model();
        let mut list = gathered(&model, GatherOptions::outputs());
        let bundle = list.group(TRACKS).unwrap().bundles()[0].bundle.clone();

        let seen = Rc::new(Cell::new(0));
        let s = seen.clone();
        let _conn = list.bundle_changed().connect(move |_| s.set(s.get() + 1));

        list.gather(None, &model.context(), &GatherOptions::outputs());
        bundle.set_name("gone");
        assert_eq!(seen.get(), 0);
    }

    #[test]
    fn test_program_ports_on_the_output_side() {
        let model = model();
        let list = gathered(&model, GatherOptions::outputs());
        let misc = list.group("Daw Misc").unwrap().bundles();

        // Auditioner and click are listed without an owning IO.
        assert_eq!(misc[0].bundle.all_ports(), vec!["daw:Auditioner/audio_out 1"]);
        assert_eq!(misc[1].bundle.all_ports(), vec!["daw:Click/audio_out 1"]);
        assert!(list.io_from_bundle(&misc[0].bundle).is_none());
        assert!(list.io_from_bundle(&misc[1].bundle).is_none());

        let ltc = &misc[2].bundle;
        assert_eq!(ltc.channel_name(0).as_deref(), Some("LTC Out"));
        assert_eq!(ltc.channel_ports(0), vec!["daw:LTC out"]);

        let vkbd = &misc[4].bundle;
        assert_eq!(vkbd.channel_name(0).as_deref(), Some("Virtual Keyboard"));
        assert_eq!(vkbd.channel_type(0), Some(DataType::Midi));
        assert_eq!(vkbd.all_ports(), vec!["daw:x-virtual-keyboard"]);

        let sync = &misc[5].bundle;
        let names: Vec<String> = sync.channels().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["MTC out", "MIDI clock out", "MMC out"]);
        assert_eq!(
            sync.all_ports(),
            vec!["daw:MTC out", "daw:MIDI clock out", "daw:MMC out"]
        );
        assert_eq!(sync.nchannels(), ChanCount::new(DataType::Midi, 3));
    }

    #[test]
    fn test_only_active_surfaces_of_the_right_direction() {
        let model = model();

        let outputs = gathered(&model, GatherOptions::outputs());
        let out_names = bundle_names(&outputs, "Daw Misc");
        assert!(out_names.contains(&"Mackie out".to_string()));
        assert!(!out_names.contains(&"Mackie in".to_string()));
        assert!(!out_names.contains(&"Idle out".to_string()));

        let inputs = gathered(&model, GatherOptions::inputs());
        let in_names = bundle_names(&inputs, "Daw Misc");
        assert!(in_names.contains(&"Mackie in".to_string()));
        assert!(!in_names.contains(&"Mackie out".to_string()));

        let audio_only = gathered(&model, GatherOptions::outputs().with_type(DataType::Audio));
        assert!(!bundle_names(&audio_only, "Daw Misc").contains(&"Mackie out".to_string()));
    }

    #[test]
    fn test_vkbd_falls_back_to_port_name() {
        let json = r#"{ "special_ports": { "vkbd_output": "vkbd" } }"#;
        let model = SessionSnapshot::from_json(json).unwrap().build();
        let list = gathered(&model, GatherOptions::outputs().with_type(DataType::Midi));

        let vkbd = list.group("Daw Misc").unwrap().only_bundle();
        assert_eq!(vkbd.name(), "vkbd");
        assert_eq!(vkbd.all_ports(), vec!["daw:vkbd"]);
    }

    #[test]
    fn test_gather_options_serde_defaults() {
        let options: GatherOptions = serde_json::from_str(r#"{ "inputs": true }"#).unwrap();
        assert_eq!(options, GatherOptions::inputs());
        assert!(options.use_session_bundles);
    }
}
