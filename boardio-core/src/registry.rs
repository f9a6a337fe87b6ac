//! Device registry
//!
//! Tracks which device id of each peripheral class is open. Opening an id
//! yields a [`Lease`]; the id stays reserved until the lease is closed or
//! dropped. Each slot carries a generation that changes on every close, so
//! a handle outliving its session is detected instead of aliasing a later
//! one.

use std::fmt;
use std::sync::Arc;

use boardio_hal::device::MAX_DEVICES_PER_CLASS;
use boardio_hal::{DeviceClass, DeviceId, Error, Result};
use log::{debug, trace};

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    generation: u32,
    open: bool,
}

#[derive(Debug, Default)]
struct ClassTable {
    slots: heapless::Vec<Slot, MAX_DEVICES_PER_CLASS>,
}

impl ClassTable {
    fn with_capacity(capacity: usize) -> Result<Self> {
        let mut slots = heapless::Vec::new();
        for _ in 0..capacity {
            slots.push(Slot::default()).map_err(|_| Error::InvalidArgument)?;
        }
        Ok(Self { slots })
    }
}

/// Identity of one open session on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId {
    pub class: DeviceClass,
    pub id: DeviceId,
    generation: u32,
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.class, self.id)
    }
}

/// Open/closed bookkeeping for every peripheral class
///
/// Clones share the same tables.
#[derive(Clone)]
pub struct Registry {
    tables: Arc<[parking_lot::Mutex<ClassTable>; DeviceClass::COUNT]>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_map();
        for class in DeviceClass::ALL {
            list.entry(&class, &(self.open_count(class), self.capacity(class)));
        }
        list.finish()
    }
}

impl Registry {
    /// Registry with `capacities[class.index()]` ids per class
    pub fn new(capacities: [usize; DeviceClass::COUNT]) -> Result<Self> {
        let mut tables: [parking_lot::Mutex<ClassTable>; DeviceClass::COUNT] = Default::default();
        for (table, &capacity) in tables.iter_mut().zip(capacities.iter()) {
            *table.get_mut() = ClassTable::with_capacity(capacity)?;
        }
        Ok(Self {
            tables: Arc::new(tables),
        })
    }

    fn table(&self, class: DeviceClass) -> &parking_lot::Mutex<ClassTable> {
        &self.tables[class.index()]
    }

    /// Number of device ids in `class`
    pub fn capacity(&self, class: DeviceClass) -> usize {
        self.table(class).lock().slots.len()
    }

    /// Reserve device `id` of `class`
    ///
    /// `InvalidArgument` if the id does not exist, `Busy` if it is open.
    pub fn open(&self, class: DeviceClass, id: DeviceId) -> Result<Lease> {
        let mut table = self.table(class).lock();
        let slot = table
            .slots
            .get_mut(id as usize)
            .ok_or(Error::InvalidArgument)?;
        if slot.open {
            trace!("{}{} already open", class, id);
            return Err(Error::Busy);
        }
        slot.open = true;
        let handle = HandleId {
            class,
            id,
            generation: slot.generation,
        };
        debug!("opened {}", handle);
        Ok(Lease::new(self.clone(), handle))
    }

    /// Reserve the lowest free id of `class`; `Busy` when all are open
    pub fn open_any(&self, class: DeviceClass) -> Result<Lease> {
        let mut table = self.table(class).lock();
        let (index, slot) = table
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| !slot.open)
            .ok_or(Error::Busy)?;
        slot.open = true;
        let handle = HandleId {
            class,
            id: index as DeviceId,
            generation: slot.generation,
        };
        debug!("opened {}", handle);
        Ok(Lease::new(self.clone(), handle))
    }

    /// Release the session `handle`
    ///
    /// `InvalidHandle` if that session is no longer open.
    pub fn close(&self, handle: HandleId) -> Result<()> {
        let mut table = self.table(handle.class).lock();
        let slot = table
            .slots
            .get_mut(handle.id as usize)
            .filter(|slot| slot.open && slot.generation == handle.generation)
            .ok_or(Error::InvalidHandle)?;
        slot.open = false;
        slot.generation = slot.generation.wrapping_add(1);
        debug!("closed {}", handle);
        Ok(())
    }

    /// Whether the session `handle` is still open
    pub fn is_open(&self, handle: HandleId) -> bool {
        self.table(handle.class)
            .lock()
            .slots
            .get(handle.id as usize)
            .is_some_and(|slot| slot.open && slot.generation == handle.generation)
    }

    /// Open ids in `class`
    pub fn open_count(&self, class: DeviceClass) -> usize {
        self.table(class)
            .lock()
            .slots
            .iter()
            .filter(|slot| slot.open)
            .count()
    }
}

/// Reservation of one device id
///
/// Dropping the lease releases the id. Controllers call
/// [`Lease::check`] at the top of each operation so that a session closed
/// through [`Registry::close`] fails with `InvalidHandle`.
#[derive(Debug)]
pub struct Lease {
    registry: Registry,
    handle: HandleId,
    closed: bool,
}

impl Lease {
    fn new(registry: Registry, handle: HandleId) -> Self {
        Self {
            registry,
            handle,
            closed: false,
        }
    }

    pub fn handle(&self) -> HandleId {
        self.handle
    }

    pub fn id(&self) -> DeviceId {
        self.handle.id
    }

    pub fn class(&self) -> DeviceClass {
        self.handle.class
    }

    /// `InvalidHandle` unless this session is still open
    pub fn check(&self) -> Result<()> {
        if !self.closed && self.registry.is_open(self.handle) {
            Ok(())
        } else {
            Err(Error::InvalidHandle)
        }
    }

    /// Release the id now; a second close fails with `InvalidHandle`
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidHandle);
        }
        self.closed = true;
        self.registry.close(self.handle)
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if !self.closed {
            // Already released through the registry when this fails
            let _ = self.registry.close(self.handle);
        }
    }
}
