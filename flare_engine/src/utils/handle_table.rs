/// Handle-indexed arena of GPU objects.
///
/// Every object kind the host can create (shaders, models, textures,
/// samplers, render textures, programs, cameras, lights, mesh instances)
/// lives in its own `HandleTable`. A handle is the slot index; it stays valid
/// until the slot is destroyed and is never handed out again while live.
///
/// The whole backing store is guarded by one lock. Reads and writes of an
/// entry go through closures (`with`, `with_mut`) or clone the value out, so
/// no reference into the store outlives the lock.
///
/// # Example
///
/// ```
/// use flare_engine::define_handle;
/// use flare_engine::flare::utils::HandleTable;
///
/// define_handle!(MeshHandle, "mesh");
///
/// let table: HandleTable<MeshHandle, &str> = HandleTable::new();
/// let a = table.generate("cube");
/// table.destroy(a).unwrap();
/// let b = table.generate("sphere"); // reuses slot 0
/// assert_eq!(a, b);
/// ```

use std::marker::PhantomData;
use parking_lot::Mutex;
use crate::error::Result;

/// Typed opaque slot index.
///
/// Implemented by the newtypes produced by [`define_handle!`](crate::define_handle).
pub trait Handle: Copy + Eq + std::hash::Hash + std::fmt::Debug + Send + Sync + 'static {
    /// Human-readable kind used in error messages ("camera", "model"...)
    const KIND: &'static str;

    /// Build a handle from a raw slot index
    fn from_index(index: u32) -> Self;

    /// Raw slot index
    fn index(self) -> u32;
}

/// Declare a `u32` handle newtype implementing [`Handle`].
#[macro_export]
macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Wrap a raw handle value received from the host
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// Raw handle value handed to the host
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl $crate::flare::utils::Handle for $name {
            const KIND: &'static str = $kind;

            fn from_index(index: u32) -> Self {
                Self(index)
            }

            fn index(self) -> u32 {
                self.0
            }
        }
    };
}

enum Slot<T> {
    Empty,
    Live(T),
}

struct TableInner<T> {
    slots: Vec<Slot<T>>,
    /// Empty slot indices; the most recently freed slot is reused first
    free_list: Vec<u32>,
    live: usize,
}

/// Slot-reusing, lock-guarded table of `T` indexed by handles of type `H`.
pub struct HandleTable<H: Handle, T> {
    inner: Mutex<TableInner<T>>,
    _handle: PhantomData<fn() -> H>,
}

impl<H: Handle, T> HandleTable<H, T> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TableInner {
                slots: Vec::new(),
                free_list: Vec::new(),
                live: 0,
            }),
            _handle: PhantomData,
        }
    }

    /// Store `value` in a free slot (or a new one) and return its handle
    pub fn generate(&self, value: T) -> H {
        let mut inner = self.inner.lock();
        inner.live += 1;

        if let Some(index) = inner.free_list.pop() {
            debug_assert!(matches!(inner.slots[index as usize], Slot::Empty));
            inner.slots[index as usize] = Slot::Live(value);
            return H::from_index(index);
        }

        let index = inner.slots.len() as u32;
        inner.slots.push(Slot::Live(value));
        H::from_index(index)
    }

    /// Free the slot and hand the value back so the caller can release
    /// whatever backend object it owns.
    ///
    /// # Errors
    ///
    /// `InvalidHandle` if the handle is out of bounds or already destroyed.
    pub fn destroy(&self, handle: H) -> Result<T> {
        let mut inner = self.inner.lock();
        let index = handle.index();

        let slot = match inner.slots.get_mut(index as usize) {
            Some(slot) => slot,
            None => crate::engine_bail!("flare::HandleTable",
                InvalidHandle: "destroy {} {}: out of bounds", H::KIND, index),
        };

        match std::mem::replace(slot, Slot::Empty) {
            Slot::Live(value) => {
                inner.free_list.push(index);
                inner.live -= 1;
                Ok(value)
            }
            Slot::Empty => crate::engine_bail!("flare::HandleTable",
                InvalidHandle: "destroy {} {}: already destroyed", H::KIND, index),
        }
    }

    /// Run `f` on the live value behind `handle`
    pub fn with<R>(&self, handle: H, f: impl FnOnce(&T) -> R) -> Result<R> {
        let inner = self.inner.lock();
        match inner.slots.get(handle.index() as usize) {
            Some(Slot::Live(value)) => Ok(f(value)),
            Some(Slot::Empty) => Err(Self::dead(handle)),
            None => Err(Self::out_of_bounds(handle)),
        }
    }

    /// Run `f` on the live value behind `handle`, mutably
    pub fn with_mut<R>(&self, handle: H, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut inner = self.inner.lock();
        match inner.slots.get_mut(handle.index() as usize) {
            Some(Slot::Live(value)) => Ok(f(value)),
            Some(Slot::Empty) => Err(Self::dead(handle)),
            None => Err(Self::out_of_bounds(handle)),
        }
    }

    /// Replace the live value behind `handle`
    pub fn set(&self, handle: H, value: T) -> Result<()> {
        self.with_mut(handle, |slot| *slot = value)
    }

    /// Whether `handle` refers to a live slot
    pub fn contains(&self, handle: H) -> bool {
        let inner = self.inner.lock();
        matches!(inner.slots.get(handle.index() as usize), Some(Slot::Live(_)))
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.inner.lock().live
    }

    /// Whether the table holds no live entry
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots ever allocated (live + free)
    pub fn slot_count(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Live handles in ascending slot order
    pub fn handles(&self) -> Vec<H> {
        let inner = self.inner.lock();
        inner.slots.iter().enumerate()
            .filter(|(_, slot)| matches!(slot, Slot::Live(_)))
            .map(|(index, _)| H::from_index(index as u32))
            .collect()
    }

    /// Number of live entries matching `f`
    pub fn count_where(&self, f: impl Fn(&T) -> bool) -> usize {
        let inner = self.inner.lock();
        inner.slots.iter()
            .filter(|slot| matches!(slot, Slot::Live(value) if f(value)))
            .count()
    }

    /// Apply `f` to every live entry, in ascending slot order
    pub fn map_live<R>(&self, f: impl Fn(&T) -> R) -> Vec<(H, R)> {
        let inner = self.inner.lock();
        inner.slots.iter().enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Live(value) => Some((H::from_index(index as u32), f(value))),
                Slot::Empty => None,
            })
            .collect()
    }

    /// Empty the table, returning every live entry (used at teardown to
    /// report leaks and release backend objects)
    pub fn drain(&self) -> Vec<(H, T)> {
        let mut inner = self.inner.lock();
        let slots = std::mem::take(&mut inner.slots);
        inner.free_list.clear();
        inner.live = 0;

        slots.into_iter().enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Live(value) => Some((H::from_index(index as u32), value)),
                Slot::Empty => None,
            })
            .collect()
    }

    fn dead(handle: H) -> crate::error::Error {
        crate::engine_err!("flare::HandleTable",
            InvalidHandle: "{} {} has been destroyed", H::KIND, handle.index())
    }

    fn out_of_bounds(handle: H) -> crate::error::Error {
        crate::engine_err!("flare::HandleTable",
            InvalidHandle: "{} {} out of bounds", H::KIND, handle.index())
    }
}

impl<H: Handle, T: Clone> HandleTable<H, T> {
    /// Clone the live value behind `handle`
    pub fn get(&self, handle: H) -> Result<T> {
        self.with(handle, T::clone)
    }

    /// Clone every live entry, in ascending slot order
    pub fn snapshot(&self) -> Vec<(H, T)> {
        let inner = self.inner.lock();
        inner.slots.iter().enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Live(value) => Some((H::from_index(index as u32), value.clone())),
                Slot::Empty => None,
            })
            .collect()
    }
}

impl<H: Handle, T> Default for HandleTable<H, T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "handle_table_tests.rs"]
mod tests;
