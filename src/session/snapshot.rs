//! Session snapshots
//!
//! A JSON description of everything a gather reads: routes with their
//! processors, session bundles, the program's special ports, IO plugins,
//! transport masters, control surfaces and the engine's port table.
//! [`SessionSnapshot::build`] turns it into live objects implementing the
//! collaborator traits.
//!
//! IO ports listed on routes, processors and IO plugins are registered with
//! the engine automatically, so a snapshot only needs to list ports that
//! belong to nobody in the session (hardware, other clients).

use std::fmt;
use std::path::Path;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::registry::{EnginePort, PortDirection, PortRegistry};
use super::{
    ControlSurface, GatherContext, Io, IoPlug, PortEngine, Processor, Route, Session,
    SessionBundle, TransportMaster,
};
use crate::bundle::{Bundle, Channel, Color, DataType};

pub const DEFAULT_PROGRAM_NAME: &str = "Daw";

// ── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read session snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid session snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Document ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Track,
    Bus,
    Monitor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoPortSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoSnapshot {
    pub name: String,
    #[serde(default)]
    pub ports: Vec<IoPortSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorSnapshot {
    pub name: String,
    /// A plugin, as opposed to a send, insert or other processor.
    #[serde(default)]
    pub plugin: bool,
    #[serde(default)]
    pub input: Option<IoSnapshot>,
    #[serde(default)]
    pub output: Option<IoSnapshot>,
    #[serde(default)]
    pub sidechain: Option<IoSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSnapshot {
    pub name: String,
    #[serde(default)]
    pub order: u32,
    pub kind: RouteKind,
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default)]
    pub input: IoSnapshot,
    #[serde(default)]
    pub output: IoSnapshot,
    #[serde(default)]
    pub processors: Vec<ProcessorSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleSnapshot {
    pub name: String,
    pub inputs: bool,
    #[serde(default)]
    pub user: bool,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoPlugSnapshot {
    pub name: String,
    #[serde(default)]
    pub pre: bool,
    #[serde(default)]
    pub input: IoSnapshot,
    #[serde(default)]
    pub output: IoSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSnapshot {
    pub name: String,
    #[serde(default = "SurfaceSnapshot::default_active")]
    pub active: bool,
    #[serde(default)]
    pub bundles: Vec<BundleSnapshot>,
}

impl SurfaceSnapshot {
    fn default_active() -> bool {
        true
    }
}

/// Names of the program's special ports, relative to its engine client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialPorts {
    #[serde(default)]
    pub ltc_output: Option<String>,
    #[serde(default)]
    pub vkbd_output: Option<String>,
    #[serde(default)]
    pub mmc_input: Option<String>,
    #[serde(default)]
    pub mmc_output: Option<String>,
    #[serde(default)]
    pub mtc_output: Option<String>,
    #[serde(default)]
    pub midi_clock_output: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub program_name: Option<String>,
    #[serde(default)]
    pub routes: Vec<RouteSnapshot>,
    #[serde(default)]
    pub bundles: Vec<BundleSnapshot>,
    #[serde(default)]
    pub auditioner: Option<IoSnapshot>,
    #[serde(default)]
    pub click: Option<IoSnapshot>,
    #[serde(default)]
    pub special_ports: SpecialPorts,
    #[serde(default)]
    pub io_plugs: Vec<IoPlugSnapshot>,
    #[serde(default)]
    pub transport_masters: Vec<TransportMaster>,
    #[serde(default)]
    pub control_surfaces: Vec<SurfaceSnapshot>,
    #[serde(default)]
    pub ports: Vec<EnginePort>,
}

impl SessionSnapshot {
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let snapshot = Self::from_json(&text)?;
        log::info!(
            "Loaded session snapshot {:?}: {} routes, {} bundles, {} engine ports",
            path,
            snapshot.routes.len(),
            snapshot.bundles.len(),
            snapshot.ports.len()
        );
        Ok(snapshot)
    }

    pub fn program_name(&self) -> &str {
        self.program_name.as_deref().unwrap_or(DEFAULT_PROGRAM_NAME)
    }

    /// Materialise the snapshot.
    pub fn build(&self) -> SnapshotModel {
        let program_name = self.program_name().to_string();
        let registry = PortRegistry::new(program_name.to_lowercase());
        for port in &self.ports {
            registry.insert_port(port.clone());
        }

        let builder = Builder {
            registry: &registry,
        };

        let routes: Vec<Rc<dyn Route>> = self
            .routes
            .iter()
            .map(|r| Rc::new(builder.route(r)) as Rc<dyn Route>)
            .collect();

        let bundles = self
            .bundles
            .iter()
            .map(|b| SessionBundle {
                bundle: builder.bundle(b),
                user: b.user,
            })
            .collect();

        let special = &self.special_ports;
        builder.register_special(special.ltc_output.as_deref(), DataType::Audio, PortDirection::Output);
        builder.register_special(special.vkbd_output.as_deref(), DataType::Midi, PortDirection::Output);
        builder.register_special(special.mmc_input.as_deref(), DataType::Midi, PortDirection::Input);
        builder.register_special(special.mmc_output.as_deref(), DataType::Midi, PortDirection::Output);
        builder.register_special(special.mtc_output.as_deref(), DataType::Midi, PortDirection::Output);
        builder.register_special(
            special.midi_clock_output.as_deref(),
            DataType::Midi,
            PortDirection::Output,
        );

        let session = StaticSession {
            routes,
            bundles,
            auditioner: self.auditioner.as_ref().map(|io| builder.io(io, false)),
            click: self.click.as_ref().map(|io| builder.io(io, false)),
            special: special.clone(),
            io_plugs: self
                .io_plugs
                .iter()
                .map(|p| {
                    Rc::new(StaticIoPlug {
                        name: p.name.clone(),
                        pre: p.pre,
                        input: builder.io(&p.input, true),
                        output: builder.io(&p.output, false),
                    }) as Rc<dyn IoPlug>
                })
                .collect(),
        };

        let control_surfaces = self
            .control_surfaces
            .iter()
            .map(|s| {
                Rc::new(StaticSurface {
                    name: s.name.clone(),
                    active: s.active,
                    bundles: s.bundles.iter().map(|b| builder.bundle(b)).collect(),
                }) as Rc<dyn ControlSurface>
            })
            .collect();

        for master in &self.transport_masters {
            if let Some(port) = &master.port {
                builder.register(&port.name, port.data_type, PortDirection::Input);
            }
        }

        log::debug!(
            "Built snapshot model for {:?}: {} engine ports",
            program_name,
            registry.len()
        );

        SnapshotModel {
            program_name,
            session,
            registry,
            transport_masters: self.transport_masters.clone(),
            control_surfaces,
        }
    }
}

// ── Live model ─────────────────────────────────────────────────────────────

/// A built snapshot: the session plus the program-wide collaborators.
pub struct SnapshotModel {
    program_name: String,
    session: StaticSession,
    registry: Arc<PortRegistry>,
    transport_masters: Vec<TransportMaster>,
    control_surfaces: Vec<Rc<dyn ControlSurface>>,
}

impl SnapshotModel {
    pub fn session(&self) -> &dyn Session {
        &self.session
    }

    pub fn registry(&self) -> &Arc<PortRegistry> {
        &self.registry
    }

    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    pub fn context(&self) -> GatherContext<'_> {
        GatherContext::new(&*self.registry, &self.program_name)
            .with_transport_masters(&self.transport_masters)
            .with_control_surfaces(&self.control_surfaces)
    }
}

impl fmt::Debug for SnapshotModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotModel")
            .field("program_name", &self.program_name)
            .field("routes", &self.session.routes.len())
            .field("ports", &self.registry.len())
            .finish()
    }
}

struct Builder<'a> {
    registry: &'a PortRegistry,
}

impl Builder<'_> {
    fn register(&self, name: &str, data_type: DataType, direction: PortDirection) -> String {
        let full = self.registry.make_port_name_non_relative(name);
        if self.registry.get_port(&full).is_none() {
            self.registry
                .insert_port(EnginePort::new(full.clone(), data_type, direction));
        }
        full
    }

    fn register_special(&self, name: Option<&str>, data_type: DataType, direction: PortDirection) {
        if let Some(name) = name {
            self.register(name, data_type, direction);
        }
    }

    /// An IO whose bundle has one mono channel per port.
    fn io(&self, snapshot: &IoSnapshot, inputs: bool) -> Rc<dyn Io> {
        let direction = if inputs {
            PortDirection::Input
        } else {
            PortDirection::Output
        };
        let bundle = Bundle::new(snapshot.name.as_str(), inputs);
        for port in &snapshot.ports {
            let full = self.register(&port.name, port.data_type, direction);
            bundle.add_channel(short_port_name(&full), port.data_type, [full.as_str()]);
        }
        Rc::new(StaticIo {
            name: snapshot.name.clone(),
            bundle: Rc::new(bundle),
        })
    }

    fn bundle(&self, snapshot: &BundleSnapshot) -> Rc<Bundle> {
        let bundle = Bundle::new(snapshot.name.as_str(), snapshot.inputs);
        for channel in &snapshot.channels {
            bundle.add_channel(channel.name.as_str(), channel.data_type, channel.ports.iter().cloned());
        }
        Rc::new(bundle)
    }

    fn route(&self, snapshot: &RouteSnapshot) -> StaticRoute {
        let processors = snapshot
            .processors
            .iter()
            .map(|p| {
                Rc::new(StaticProcessor {
                    name: p.name.clone(),
                    plugin: p.plugin,
                    input: p.input.as_ref().map(|io| self.io(io, true)),
                    output: p.output.as_ref().map(|io| self.io(io, false)),
                    sidechain: p.sidechain.as_ref().map(|io| self.io(io, true)),
                }) as Rc<dyn Processor>
            })
            .collect();

        let plugins = snapshot
            .processors
            .iter()
            .enumerate()
            .filter(|(_, p)| p.plugin)
            .map(|(i, _)| i)
            .collect();

        StaticRoute {
            name: snapshot.name.clone(),
            order: snapshot.order,
            kind: snapshot.kind,
            color: snapshot.color,
            input: self.io(&snapshot.input, true),
            output: self.io(&snapshot.output, false),
            processors,
            plugins,
        }
    }
}

/// `client:path/port` → `port`.
fn short_port_name(name: &str) -> &str {
    let after_client = name.split_once(':').map_or(name, |(_, rest)| rest);
    after_client.rsplit('/').next().unwrap_or(after_client)
}

// ── Trait implementations ──────────────────────────────────────────────────

struct StaticIo {
    name: String,
    bundle: Rc<Bundle>,
}

impl Io for StaticIo {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn bundle(&self) -> Rc<Bundle> {
        self.bundle.clone()
    }
}

struct StaticProcessor {
    name: String,
    plugin: bool,
    input: Option<Rc<dyn Io>>,
    output: Option<Rc<dyn Io>>,
    sidechain: Option<Rc<dyn Io>>,
}

impl Processor for StaticProcessor {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn input(&self) -> Option<Rc<dyn Io>> {
        self.input.clone()
    }

    fn output(&self) -> Option<Rc<dyn Io>> {
        self.output.clone()
    }

    fn sidechain_input(&self) -> Option<Rc<dyn Io>> {
        if self.plugin {
            self.sidechain.clone()
        } else {
            None
        }
    }
}

struct StaticRoute {
    name: String,
    order: u32,
    kind: RouteKind,
    color: Option<Color>,
    input: Rc<dyn Io>,
    output: Rc<dyn Io>,
    processors: Vec<Rc<dyn Processor>>,
    /// Indices into `processors` of the plugins.
    plugins: Vec<usize>,
}

impl Route for StaticRoute {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn order(&self) -> u32 {
        self.order
    }

    fn is_track(&self) -> bool {
        self.kind == RouteKind::Track
    }

    fn is_monitor(&self) -> bool {
        self.kind == RouteKind::Monitor
    }

    fn color(&self) -> Option<Color> {
        self.color
    }

    fn input(&self) -> Rc<dyn Io> {
        self.input.clone()
    }

    fn output(&self) -> Rc<dyn Io> {
        self.output.clone()
    }

    fn processors(&self) -> Vec<Weak<dyn Processor>> {
        self.processors.iter().map(Rc::downgrade).collect()
    }

    fn nth_plugin(&self, n: usize) -> Option<Rc<dyn Processor>> {
        self.plugins
            .get(n)
            .and_then(|&i| self.processors.get(i))
            .cloned()
    }
}

struct StaticIoPlug {
    name: String,
    pre: bool,
    input: Rc<dyn Io>,
    output: Rc<dyn Io>,
}

impl IoPlug for StaticIoPlug {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn input(&self) -> Rc<dyn Io> {
        self.input.clone()
    }

    fn output(&self) -> Rc<dyn Io> {
        self.output.clone()
    }

    fn is_pre(&self) -> bool {
        self.pre
    }
}

struct StaticSurface {
    name: String,
    active: bool,
    bundles: Vec<Rc<Bundle>>,
}

impl ControlSurface for StaticSurface {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn bundles(&self) -> Vec<Rc<Bundle>> {
        self.bundles.clone()
    }
}

struct StaticSession {
    routes: Vec<Rc<dyn Route>>,
    bundles: Vec<SessionBundle>,
    auditioner: Option<Rc<dyn Io>>,
    click: Option<Rc<dyn Io>>,
    special: SpecialPorts,
    io_plugs: Vec<Rc<dyn IoPlug>>,
}

impl Session for StaticSession {
    fn routes(&self) -> Vec<Rc<dyn Route>> {
        self.routes.clone()
    }

    fn bundles(&self) -> Vec<SessionBundle> {
        self.bundles.clone()
    }

    fn auditioner_output(&self) -> Option<Rc<dyn Io>> {
        self.auditioner.clone()
    }

    fn click_io(&self) -> Option<Rc<dyn Io>> {
        self.click.clone()
    }

    fn ltc_output_port(&self) -> Option<String> {
        self.special.ltc_output.clone()
    }

    fn vkbd_output_port(&self) -> Option<String> {
        self.special.vkbd_output.clone()
    }

    fn mmc_input_port(&self) -> Option<String> {
        self.special.mmc_input.clone()
    }

    fn mmc_output_port(&self) -> Option<String> {
        self.special.mmc_output.clone()
    }

    fn mtc_output_port(&self) -> Option<String> {
        self.special.mtc_output.clone()
    }

    fn midi_clock_output_port(&self) -> Option<String> {
        self.special.midi_clock_output.clone()
    }

    fn io_plugs(&self) -> Vec<Rc<dyn IoPlug>> {
        self.io_plugs.clone()
    }
}
