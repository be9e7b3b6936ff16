use std::cell::{Ref, RefCell};
use std::fmt;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use super::signal::Signal;

/// Signal type carried by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Audio,
    Midi,
}

impl DataType {
    /// Every type, in display order.
    pub const ALL: [DataType; 2] = [DataType::Audio, DataType::Midi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Midi => "midi",
        }
    }

    /// Whether a gather filter (`None` = any type) admits this type.
    pub fn matches(self, filter: Option<DataType>) -> bool {
        filter.is_none_or(|t| t == self)
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Audio => 0,
            Self::Midi => 1,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Per-type channel counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChanCount {
    pub audio: u32,
    pub midi: u32,
}

impl ChanCount {
    pub const ZERO: ChanCount = ChanCount { audio: 0, midi: 0 };

    pub fn new(data_type: DataType, n: u32) -> Self {
        let mut count = Self::ZERO;
        count.set(data_type, n);
        count
    }

    pub fn n(&self, data_type: DataType) -> u32 {
        match data_type {
            DataType::Audio => self.audio,
            DataType::Midi => self.midi,
        }
    }

    pub fn set(&mut self, data_type: DataType, n: u32) {
        match data_type {
            DataType::Audio => self.audio = n,
            DataType::Midi => self.midi = n,
        }
    }

    pub fn n_total(&self) -> u32 {
        self.audio + self.midi
    }

    /// Count for a gather filter: the given type, or the total for `None`.
    pub fn n_matching(&self, filter: Option<DataType>) -> u32 {
        match filter {
            Some(t) => self.n(t),
            None => self.n_total(),
        }
    }
}

impl Add for ChanCount {
    type Output = ChanCount;

    fn add(self, other: ChanCount) -> ChanCount {
        ChanCount {
            audio: self.audio + other.audio,
            midi: self.midi + other.midi,
        }
    }
}

impl AddAssign for ChanCount {
    fn add_assign(&mut self, other: ChanCount) {
        *self = *self + other;
    }
}

/// One logical signal line of a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// Concrete engine ports, absolute names.  Usually one; more for linked
    /// channels.
    #[serde(default)]
    pub ports: Vec<String>,
}

impl Channel {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            ports: Vec::new(),
        }
    }
}

/// What changed about a bundle, carried by [`Bundle::changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BundleChange {
    NameChanged,
    /// Channels were added or removed.
    ConfigurationChanged,
    /// The ports behind an existing channel changed.
    PortsChanged,
}

/// A named ordered set of channels.
///
/// Shared as `Rc<Bundle>`; mutators take `&self` and emit on
/// [`Bundle::changed`] after the change has been applied.
pub struct Bundle {
    name: RefCell<String>,
    ports_are_inputs: bool,
    channels: RefCell<Vec<Channel>>,
    changed: Signal<BundleChange>,
}

impl Bundle {
    pub fn new(name: impl Into<String>, ports_are_inputs: bool) -> Self {
        Self {
            name: RefCell::new(name.into()),
            ports_are_inputs,
            channels: RefCell::new(Vec::new()),
            changed: Signal::new(),
        }
    }

    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        if *self.name.borrow() == name {
            return;
        }
        *self.name.borrow_mut() = name;
        self.changed.emit(&BundleChange::NameChanged);
    }

    pub fn ports_are_inputs(&self) -> bool {
        self.ports_are_inputs
    }

    pub fn ports_are_outputs(&self) -> bool {
        !self.ports_are_inputs
    }

    pub fn changed(&self) -> &Signal<BundleChange> {
        &self.changed
    }

    // ── Channels ───────────────────────────────────────────────────────────

    pub fn add_channel<I, S>(&self, name: impl Into<String>, data_type: DataType, ports: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut channel = Channel::new(name, data_type);
        channel.ports = ports.into_iter().map(Into::into).collect();
        self.channels.borrow_mut().push(channel);
        self.changed.emit(&BundleChange::ConfigurationChanged);
    }

    pub fn remove_channel(&self, index: usize) {
        {
            let mut channels = self.channels.borrow_mut();
            if index >= channels.len() {
                return;
            }
            channels.remove(index);
        }
        self.changed.emit(&BundleChange::ConfigurationChanged);
    }

    pub fn remove_channels(&self) {
        {
            let mut channels = self.channels.borrow_mut();
            if channels.is_empty() {
                return;
            }
            channels.clear();
        }
        self.changed.emit(&BundleChange::ConfigurationChanged);
    }

    /// Make `port` the only port behind channel `index`.
    pub fn set_port(&self, index: usize, port: impl Into<String>) {
        {
            let mut channels = self.channels.borrow_mut();
            let Some(channel) = channels.get_mut(index) else {
                return;
            };
            channel.ports = vec![port.into()];
        }
        self.changed.emit(&BundleChange::PortsChanged);
    }

    pub fn add_port_to_channel(&self, index: usize, port: impl Into<String>) {
        {
            let mut channels = self.channels.borrow_mut();
            let Some(channel) = channels.get_mut(index) else {
                return;
            };
            channel.ports.push(port.into());
        }
        self.changed.emit(&BundleChange::PortsChanged);
    }

    // ── Queries ────────────────────────────────────────────────────────────

    pub fn channels(&self) -> Ref<'_, Vec<Channel>> {
        self.channels.borrow()
    }

    pub fn nchannels(&self) -> ChanCount {
        let mut count = ChanCount::ZERO;
        for channel in self.channels.borrow().iter() {
            count += ChanCount::new(channel.data_type, 1);
        }
        count
    }

    pub fn n_total(&self) -> usize {
        self.channels.borrow().len()
    }

    pub fn channel_name(&self, index: usize) -> Option<String> {
        self.channels.borrow().get(index).map(|c| c.name.clone())
    }

    pub fn channel_type(&self, index: usize) -> Option<DataType> {
        self.channels.borrow().get(index).map(|c| c.data_type)
    }

    /// Ports behind channel `index`; empty when out of range.
    pub fn channel_ports(&self, index: usize) -> Vec<String> {
        self.channels
            .borrow()
            .get(index)
            .map(|c| c.ports.clone())
            .unwrap_or_default()
    }

    /// All ports of the bundle, in channel order.
    pub fn all_ports(&self) -> Vec<String> {
        self.channels
            .borrow()
            .iter()
            .flat_map(|c| c.ports.iter().cloned())
            .collect()
    }

    /// True if some channel is backed by exactly `port` and nothing else.
    pub fn offers_port_alone(&self, port: &str) -> bool {
        self.channels
            .borrow()
            .iter()
            .any(|c| c.ports.len() == 1 && c.ports[0] == port)
    }

    /// True if both bundles are backed by the same set of port names,
    /// regardless of channel layout or order.
    pub fn has_same_ports(&self, other: &Bundle) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let mut ours = self.all_ports();
        let mut theirs = other.all_ports();
        ours.sort_unstable();
        ours.dedup();
        theirs.sort_unstable();
        theirs.dedup();
        ours == theirs
    }
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("name", &*self.name.borrow())
            .field("ports_are_inputs", &self.ports_are_inputs)
            .field("channels", &*self.channels.borrow())
            .finish()
    }
}

/// Display colour attached to a bundle (usually its route's colour).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}
