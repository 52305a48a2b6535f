//! # Instrumentation Lifecycle
//!
//! An instrumentation unit goes through
//! `open → configure → load → attach`, and must be destroyed on every exit
//! path whichever state it reached. [`UnitGuard`] owns the unit for the
//! daemon and destroys it exactly once when dropped, so an early `?` return
//! after `open` cannot leak kernel resources.
//!
//! Steps are never retried here.

use std::ops::{Deref, DerefMut};

use crate::config::StaticParams;
use crate::daemon::channel::EventChannel;
use crate::domain::DaemonError;

/// State reached by an instrumentation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Opened,
    Configured,
    Loaded,
    Attached,
    Destroyed,
}

/// Source of instrumentation units (e.g. a compiled eBPF object)
pub trait Instrumentation {
    type Unit: InstrumentationUnit;

    /// Parse the program definitions; commits no kernel resources
    ///
    /// # Errors
    /// Returns [`DaemonError::OpenFailed`] if the definitions are unusable
    fn open(&self) -> Result<Self::Unit, DaemonError>;
}

/// An opened instrumentation unit
pub trait InstrumentationUnit {
    type Channel: EventChannel;

    /// Freeze static parameters into the unit before load
    fn configure(&mut self, params: &StaticParams);

    /// Verify and install the programs into the kernel
    ///
    /// # Errors
    /// Returns [`DaemonError::LoadFailed`] with a negative errno
    fn load(&mut self) -> Result<(), DaemonError>;

    /// Activate every probe; one failing probe fails the whole step
    ///
    /// # Errors
    /// Returns [`DaemonError::AttachFailed`]
    fn attach(&mut self) -> Result<(), DaemonError>;

    /// Create the event channel over the unit's ring buffer
    ///
    /// Only valid once the unit is attached.
    ///
    /// # Errors
    /// Returns [`DaemonError::ChannelCreateFailed`]
    fn open_channel(&mut self) -> Result<Self::Channel, DaemonError>;

    /// Release every kernel resource held by the unit. Idempotent.
    fn destroy(&mut self);
}

/// Owns a unit and destroys it on drop
pub struct UnitGuard<U: InstrumentationUnit> {
    unit: U,
}

impl<U: InstrumentationUnit> UnitGuard<U> {
    pub fn new(unit: U) -> Self {
        Self { unit }
    }
}

impl<U: InstrumentationUnit> Deref for UnitGuard<U> {
    type Target = U;

    fn deref(&self) -> &U {
        &self.unit
    }
}

impl<U: InstrumentationUnit> DerefMut for UnitGuard<U> {
    fn deref_mut(&mut self) -> &mut U {
        &mut self.unit
    }
}

impl<U: InstrumentationUnit> Drop for UnitGuard<U> {
    fn drop(&mut self) {
        self.unit.destroy();
    }
}
