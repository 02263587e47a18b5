//! Generation-checked handle table.
//!
//! A [`Handle`] is a `{slot, generation}` pair packed into a `u64`. Destroying a
//! handle bumps its slot's generation before the slot is reused, so a stale handle
//! never resolves to a newer engine.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Opaque handle to a registry entry.
///
/// Layout: [32-bit generation | 32-bit slot index]. Generations start at 1, so
/// the raw value `0` is never a valid handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    slot: u32,
    generation: u32,
}

impl Handle {
    /// Get the slot index.
    #[inline]
    pub const fn slot(self) -> u32 {
        self.slot
    }

    /// Get the generation.
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Get the raw packed value.
    #[inline]
    pub const fn to_raw(self) -> u64 {
        ((self.generation as u64) << 32) | self.slot as u64
    }

    /// Unpack a raw value. Returns `None` for generation 0.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_raw(raw: u64) -> Option<Self> {
        let generation = (raw >> 32) as u32;
        if generation == 0 {
            return None;
        }
        Some(Self { slot: raw as u32, generation })
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.slot, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<Arc<T>>,
}

#[derive(Debug)]
struct Table<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

/// Maps handles to shared values.
///
/// The table lock is held only for the lookup itself; callers get an `Arc` and
/// work on the value without touching the registry again.
#[derive(Debug)]
pub struct HandleRegistry<T> {
    table: RwLock<Table<T>>,
    max_handles: usize,
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleRegistry<T> {
    /// Create a registry bounded only by the 32-bit slot space.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_handles(u32::MAX as usize)
    }

    /// Create a registry holding at most `max_handles` live entries.
    #[must_use]
    pub fn with_max_handles(max_handles: usize) -> Self {
        Self {
            table: RwLock::new(Table { slots: Vec::new(), free: Vec::new(), live: 0 }),
            max_handles,
        }
    }

    /// Store `value` and return its handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceExhausted`] when the registry is full.
    pub fn insert(&self, value: T) -> Result<Handle> {
        let mut table = self.table.write();
        if table.live >= self.max_handles {
            return Err(Error::ResourceExhausted(format!(
                "handle limit of {} reached",
                self.max_handles
            )));
        }

        let handle = if let Some(slot) = table.free.pop() {
            let entry = &mut table.slots[slot as usize];
            entry.value = Some(Arc::new(value));
            Handle { slot, generation: entry.generation }
        } else {
            let slot = u32::try_from(table.slots.len())
                .map_err(|_| Error::ResourceExhausted("handle slots exhausted".into()))?;
            table.slots.push(Slot { generation: 1, value: Some(Arc::new(value)) });
            Handle { slot, generation: 1 }
        };
        table.live += 1;
        Ok(handle)
    }

    /// Resolve a handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`] for an unknown or stale handle.
    pub fn get(&self, handle: Handle) -> Result<Arc<T>> {
        let table = self.table.read();
        match table.slots.get(handle.slot as usize) {
            Some(Slot { generation, value: Some(value) }) if *generation == handle.generation => {
                Ok(Arc::clone(value))
            }
            _ => Err(Error::InvalidHandle(handle.to_raw())),
        }
    }

    /// Resolve a raw handle value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`] for `0`, an unknown or a stale handle.
    pub fn get_raw(&self, raw: u64) -> Result<Arc<T>> {
        Handle::from_raw(raw).ok_or(Error::InvalidHandle(raw)).and_then(|h| self.get(h))
    }

    /// Remove a handle and return its value. The handle is invalid afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`] for an unknown or stale handle.
    pub fn remove(&self, handle: Handle) -> Result<Arc<T>> {
        let mut table = self.table.write();
        let entry = match table.slots.get_mut(handle.slot as usize) {
            Some(entry) if entry.generation == handle.generation && entry.value.is_some() => entry,
            _ => return Err(Error::InvalidHandle(handle.to_raw())),
        };
        let value = entry.value.take().ok_or(Error::InvalidHandle(handle.to_raw()))?;

        // A slot whose generation would wrap to 0 is retired instead of reused
        entry.generation = entry.generation.wrapping_add(1);
        if entry.generation != 0 {
            table.free.push(handle.slot);
        }
        table.live -= 1;
        Ok(value)
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.table.read().live
    }

    /// Whether there are no live handles.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
