//! Force registry: the keyed set of force units applied every tick.
//!
//! Forces run in registration order. Re-registering a key swaps the unit in
//! place, keeping its slot. Removal through a [`ForceSubscription`] is
//! deferred to the start of the next iteration, so the set of forces is
//! fixed while an iteration runs, even if a force releases another one.

use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::error::{ForceError, SimulationError};
use super::params::SimulationParams;

/// Identity of a registered force.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ForceKey {
    /// Caller-chosen name.
    Named(Cow<'static, str>),
    /// Token handed out by the engine that owns the registry.
    Generated(u64),
}

impl fmt::Display for ForceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Generated(id) => write!(f, "#{id}"),
        }
    }
}

impl From<&'static str> for ForceKey {
    fn from(name: &'static str) -> Self {
        Self::Named(Cow::Borrowed(name))
    }
}

impl From<String> for ForceKey {
    fn from(name: String) -> Self {
        Self::Named(Cow::Owned(name))
    }
}

/// A pluggable force unit.
///
/// Forces read positions, `params.alpha` and `params.dim`, and add to node
/// velocities. They must not write positions; the engine integrates those.
pub trait Force<G: ?Sized> {
    fn apply(&mut self, graph: &mut G, params: &SimulationParams) -> Result<(), ForceError>;
}

impl<G: ?Sized, F> Force<G> for F
where
    F: FnMut(&mut G, &SimulationParams) -> Result<(), ForceError>,
{
    fn apply(&mut self, graph: &mut G, params: &SimulationParams) -> Result<(), ForceError> {
        self(graph, params)
    }
}

type ReleaseQueue = RefCell<Vec<ForceKey>>;

/// Handle returned on registration; releases exactly its key.
#[derive(Debug, Clone)]
pub struct ForceSubscription {
    key: ForceKey,
    released: Weak<ReleaseQueue>,
}

impl ForceSubscription {
    pub fn key(&self) -> &ForceKey {
        &self.key
    }

    /// Queue the key for removal before the next iteration.
    ///
    /// Safe to call from inside a running force. Returns false once the
    /// registry is gone.
    pub fn unsubscribe(&self) -> bool {
        let Some(queue) = self.released.upgrade() else {
            return false;
        };
        let mut queue = queue.borrow_mut();
        if !queue.contains(&self.key) {
            queue.push(self.key.clone());
        }
        true
    }
}

/// Ordered, keyed collection of force units.
pub struct ForceRegistry<G: ?Sized> {
    forces: IndexMap<ForceKey, Box<dyn Force<G>>>,
    released: Rc<ReleaseQueue>,
}

impl<G: ?Sized> ForceRegistry<G> {
    pub fn new() -> Self {
        Self {
            forces: IndexMap::new(),
            released: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Insert or replace the force under `key`.
    ///
    /// A pending deferred removal of the same key is cancelled.
    pub fn register(&mut self, key: ForceKey, force: Box<dyn Force<G>>) -> ForceSubscription {
        self.released.borrow_mut().retain(|pending| pending != &key);
        self.forces.insert(key.clone(), force);
        ForceSubscription {
            key,
            released: Rc::downgrade(&self.released),
        }
    }

    /// Remove the force under `key` right away. Absent keys are a no-op.
    pub fn unregister(&mut self, key: &ForceKey) -> bool {
        self.forces.shift_remove(key).is_some()
    }

    /// Run every force once, in registration order.
    ///
    /// Stops at the first failure; velocities written by earlier forces
    /// remain applied.
    pub fn apply_all(&mut self, graph: &mut G, params: &SimulationParams) -> Result<(), SimulationError> {
        self.flush_released();
        for (key, force) in self.forces.iter_mut() {
            force
                .apply(graph, params)
                .map_err(|source| SimulationError::Force {
                    key: key.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    fn flush_released(&mut self) {
        let released: Vec<_> = self.released.borrow_mut().drain(..).collect();
        for key in released {
            self.forces.shift_remove(&key);
        }
    }

    fn is_pending_release(&self, key: &ForceKey) -> bool {
        self.released.borrow().contains(key)
    }

    /// Whether `key` is registered and not queued for release.
    pub fn contains(&self, key: &ForceKey) -> bool {
        self.forces.contains_key(key) && !self.is_pending_release(key)
    }

    /// Registered keys in application order, excluding queued releases.
    pub fn keys(&self) -> Vec<ForceKey> {
        self.forces
            .keys()
            .filter(|key| !self.is_pending_release(key))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every force and every queued release.
    pub fn clear(&mut self) {
        self.forces.clear();
        self.released.borrow_mut().clear();
    }
}

impl<G: ?Sized> Default for ForceRegistry<G> {
    fn default() -> Self {
        Self::new()
    }
}
