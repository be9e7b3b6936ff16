//! Session-side collaborators
//!
//! The port grouping core only reads from the session and the audio engine.
//! Everything it needs is expressed as the traits below, so a live session,
//! a recorded snapshot or a test fixture can all drive a gather.

pub mod registry;
pub mod snapshot;

use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::bundle::{Bundle, ChanCount, Color, DataType};

pub use registry::PortRegistry;
pub use snapshot::{SessionSnapshot, SnapshotError, SnapshotModel};

/// A port-facing input or output terminus of a route or processor.
pub trait Io {
    fn name(&self) -> String;

    fn bundle(&self) -> Rc<Bundle>;

    fn n_ports(&self) -> ChanCount {
        self.bundle().nchannels()
    }
}

/// An entry in a route's processor chain.
pub trait Processor {
    fn name(&self) -> String;

    /// Input IO, for processors that own ports.
    fn input(&self) -> Option<Rc<dyn Io>> {
        None
    }

    /// Output IO, for processors that own ports.
    fn output(&self) -> Option<Rc<dyn Io>> {
        None
    }

    /// Sidechain input of a plugin, if it has one.
    fn sidechain_input(&self) -> Option<Rc<dyn Io>> {
        None
    }
}

/// A channel strip: a track or a bus.
pub trait Route {
    fn name(&self) -> String;

    /// User-visible display order.
    fn order(&self) -> u32;

    fn is_track(&self) -> bool;

    fn is_monitor(&self) -> bool {
        false
    }

    fn color(&self) -> Option<Color> {
        None
    }

    fn input(&self) -> Rc<dyn Io>;

    fn output(&self) -> Rc<dyn Io>;

    /// The processor chain, in signal order.
    fn processors(&self) -> Vec<Weak<dyn Processor>>;

    /// The `n`th plugin of the chain, or `None` past the end.
    fn nth_plugin(&self, n: usize) -> Option<Rc<dyn Processor>>;
}

/// A session-level signal processor with its own ports, outside any route.
pub trait IoPlug {
    fn name(&self) -> String;

    fn input(&self) -> Rc<dyn Io>;

    fn output(&self) -> Rc<dyn Io>;

    /// Runs before (true) or after (false) the route graph.
    fn is_pre(&self) -> bool;
}

/// A control-surface integration offering its own bundles.
pub trait ControlSurface {
    fn name(&self) -> String;

    fn is_active(&self) -> bool {
        true
    }

    fn bundles(&self) -> Vec<Rc<Bundle>>;
}

/// Flags reported by the engine for a port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortFlags {
    #[serde(default)]
    pub input: bool,
    #[serde(default)]
    pub output: bool,
    #[serde(default)]
    pub physical: bool,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortInfo {
    pub data_type: DataType,
    pub flags: PortFlags,
}

/// The audio engine's port table.
pub trait PortEngine {
    /// Absolute names of every port of `data_type` on the given side.
    fn get_ports(&self, data_type: DataType, inputs: bool) -> Vec<String>;

    /// Type and flags of a port, or `None` if it does not exist (anymore).
    fn port_info(&self, name: &str) -> Option<PortInfo>;

    fn pretty_name(&self, name: &str) -> Option<String>;

    /// Qualify a name relative to this program's engine client.
    fn make_port_name_non_relative(&self, name: &str) -> String;
}

/// A port exposed by a transport master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRef {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

/// A transport synchronisation source (LTC, MTC, MIDI clock, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMaster {
    pub name: String,
    #[serde(default)]
    pub port: Option<PortRef>,
}

/// A bundle registered with the session.
#[derive(Clone)]
pub struct SessionBundle {
    pub bundle: Rc<Bundle>,
    /// Created by the user, as opposed to set up automatically.
    pub user: bool,
}

impl fmt::Debug for SessionBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBundle")
            .field("bundle", &self.bundle.name())
            .field("user", &self.user)
            .finish()
    }
}

pub trait Session {
    fn routes(&self) -> Vec<Rc<dyn Route>>;

    fn bundles(&self) -> Vec<SessionBundle>;

    fn auditioner_output(&self) -> Option<Rc<dyn Io>> {
        None
    }

    fn click_io(&self) -> Option<Rc<dyn Io>> {
        None
    }

    fn ltc_output_port(&self) -> Option<String> {
        None
    }

    fn vkbd_output_port(&self) -> Option<String> {
        None
    }

    fn mmc_input_port(&self) -> Option<String> {
        None
    }

    fn mmc_output_port(&self) -> Option<String> {
        None
    }

    fn mtc_output_port(&self) -> Option<String> {
        None
    }

    fn midi_clock_output_port(&self) -> Option<String> {
        None
    }

    fn io_plugs(&self) -> Vec<Rc<dyn IoPlug>> {
        Vec::new()
    }
}

/// Program-wide collaborators a gather reads from.
#[derive(Clone, Copy)]
pub struct GatherContext<'a> {
    pub engine: &'a dyn PortEngine,
    pub transport_masters: &'a [TransportMaster],
    pub control_surfaces: &'a [Rc<dyn ControlSurface>],
    /// Name of the running program; its own engine ports are prefixed with
    /// the lower-cased form followed by `:`.
    pub program_name: &'a str,
}

impl<'a> GatherContext<'a> {
    pub fn new(engine: &'a dyn PortEngine, program_name: &'a str) -> Self {
        Self {
            engine,
            transport_masters: &[],
            control_surfaces: &[],
            program_name,
        }
    }

    pub fn with_transport_masters(mut self, masters: &'a [TransportMaster]) -> Self {
        self.transport_masters = masters;
        self
    }

    pub fn with_control_surfaces(mut self, surfaces: &'a [Rc<dyn ControlSurface>]) -> Self {
        self.control_surfaces = surfaces;
        self
    }
}
