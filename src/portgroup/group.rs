//! A named, ordered group of bundles.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::bundle::{Bundle, BundleChange, ChanCount, Color, Connection, Signal};
use crate::session::Io;

/// A bundle as placed in a [`PortGroup`], with its optional owner and
/// display colour.
pub struct BundleRecord {
    pub bundle: Rc<Bundle>,
    io: Option<Weak<dyn Io>>,
    pub color: Option<Color>,
}

impl BundleRecord {
    /// The IO owning the bundle's ports, if it was given and still exists.
    pub fn io(&self) -> Option<Rc<dyn Io>> {
        self.io.as_ref().and_then(Weak::upgrade)
    }

    pub fn has_color(&self) -> bool {
        self.color.is_some()
    }
}

impl fmt::Debug for BundleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleRecord")
            .field("bundle", &self.bundle.name())
            .field("io", &self.io().map(|io| io.name()))
            .field("color", &self.color)
            .finish()
    }
}

struct Member {
    record: Rc<BundleRecord>,
    /// Forwards the bundle's own change signal; dropped with the member.
    _bundle_changed: Connection,
}

pub struct PortGroup {
    name: String,
    members: Vec<Member>,
    changed: Signal<()>,
    bundle_changed: Signal<BundleChange>,
}

impl PortGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            changed: Signal::new(),
            bundle_changed: Signal::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Membership changed.
    pub fn changed(&self) -> &Signal<()> {
        &self.changed
    }

    /// A member bundle's contents changed.
    pub fn bundle_changed(&self) -> &Signal<BundleChange> {
        &self.bundle_changed
    }

    /// Append a bundle.
    ///
    /// Unless `allow_dups` is set, a bundle offering the same set of ports as
    /// an existing member is ignored.  Returns whether the bundle was added;
    /// `changed` fires only in that case.
    pub fn add_bundle(
        &mut self,
        bundle: Rc<Bundle>,
        io: Option<&Rc<dyn Io>>,
        color: Option<Color>,
        allow_dups: bool,
    ) -> bool {
        if !allow_dups
            && self
                .members
                .iter()
                .any(|m| bundle.has_same_ports(&m.record.bundle))
        {
            log::trace!(
                "{}: skipping bundle {:?}, ports already present",
                self.name,
                bundle.name()
            );
            return false;
        }

        let forward = self.bundle_changed.downgrade();
        let connection = bundle.changed().connect(move |change| {
            forward.emit(change);
        });

        self.members.push(Member {
            record: Rc::new(BundleRecord {
                bundle,
                io: io.map(Rc::downgrade),
                color,
            }),
            _bundle_changed: connection,
        });

        self.changed.emit(&());
        true
    }

    /// Append the bundle of `io`, owned by it.
    pub fn add_io_bundle(&mut self, io: &Rc<dyn Io>, color: Option<Color>) -> bool {
        self.add_bundle(io.bundle(), Some(io), color, false)
    }

    /// Remove the member referring to this exact bundle (by identity).
    pub fn remove_bundle(&mut self, bundle: &Rc<Bundle>) -> bool {
        let Some(index) = self
            .members
            .iter()
            .position(|m| Rc::ptr_eq(&m.record.bundle, bundle))
        else {
            return false;
        };

        self.members.remove(index);
        self.changed.emit(&());
        true
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.changed.emit(&());
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &Rc<BundleRecord>> {
        self.members.iter().map(|m| &m.record)
    }

    /// Member records, in display order.
    pub fn bundles(&self) -> Vec<Rc<BundleRecord>> {
        self.records().cloned().collect()
    }

    /// True if some member offers `port` as a channel of its own.
    pub fn has_port(&self, port: &str) -> bool {
        self.records().any(|r| r.bundle.offers_port_alone(port))
    }

    pub fn total_channels(&self) -> ChanCount {
        self.records().fold(ChanCount::ZERO, |n, r| n + r.bundle.nchannels())
    }

    /// The group's only bundle.
    ///
    /// # Panics
    /// Panics unless the group holds exactly one bundle.
    pub fn only_bundle(&self) -> Rc<Bundle> {
        assert_eq!(
            self.members.len(),
            1,
            "only_bundle() on group {:?} holding {} bundles",
            self.name,
            self.members.len()
        );
        self.members[0].record.bundle.clone()
    }

    pub fn io_from_bundle(&self, bundle: &Rc<Bundle>) -> Option<Rc<dyn Io>> {
        self.records()
            .find(|r| Rc::ptr_eq(&r.bundle, bundle))
            .and_then(|r| r.io())
    }

    /// Remove bundles whose channels are all represented by another, larger
    /// bundle of this group.
    pub fn remove_duplicates(&mut self) {
        let bundles: Vec<Rc<Bundle>> = self.records().map(|r| r.bundle.clone()).collect();
        let redundant: Vec<bool> = bundles
            .iter()
            .map(|small| {
                bundles
                    .iter()
                    .any(|large| covers(large, small))
            })
            .collect();

        if !redundant.contains(&true) {
            return;
        }

        let mut flags = redundant.into_iter();
        self.members.retain(|m| {
            let drop = flags.next().unwrap_or(false);
            if drop {
                log::debug!(
                    "{}: dropping {:?}, covered by a larger bundle",
                    self.name,
                    m.record.bundle.name()
                );
            }
            !drop
        });
        self.changed.emit(&());
    }
}

/// `large` has strictly more channels than `small`, and every channel of
/// `small` has a channel in `large` with an identical port list.
fn covers(large: &Bundle, small: &Bundle) -> bool {
    let small_channels = small.channels();
    let large_channels = large.channels();
    large_channels.len() > small_channels.len()
        && small_channels
            .iter()
            .all(|s| large_channels.iter().any(|l| l.ports == s.ports))
}

impl fmt::Debug for PortGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortGroup")
            .field("name", &self.name)
            .field("bundles", &self.bundles())
            .finish()
    }
}
