use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Rejected handle lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandleError {
    #[error("Unknown handle {0:#x}")]
    Unknown(i64),
    #[error("Stale handle {0:#x}: the object it referred to was destroyed")]
    Stale(i64),
}

/// Generations stay below 2^31 so encoded handles are never negative.
const GENERATION_MASK: u32 = 0x7fff_ffff;

struct Slot<T> {
    generation: u32,
    value: Option<Arc<T>>,
}

struct Slots<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    live: usize,
}

/// Arena of host-owned objects addressed by opaque 64-bit handles.
///
/// A handle packs `generation << 32 | (index + 1)`, so zero is never a valid
/// handle and a handle to a destroyed slot is recognized as stale even after the
/// slot is reused. Values are shared through `Arc`; callers that mutate a value
/// store it behind its own lock, so calls on different handles stay independent.
pub struct HandleTable<T> {
    inner: Mutex<Slots<T>>,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Slots {
                slots: Vec::new(),
                free: Vec::new(),
                live: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots<T>> {
        // the table is consistent after every statement, so a poisoned lock is still usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn encode(index: usize, generation: u32) -> i64 {
        ((generation as i64) << 32) | (index as i64 + 1)
    }

    fn decode(handle: i64) -> Option<(usize, u32)> {
        let low = (handle & 0xffff_ffff) as usize;
        let generation = (handle >> 32) as u32;
        if low == 0 || handle < 0 {
            return None;
        }
        Some((low - 1, generation))
    }

    pub fn insert(&self, value: T) -> i64 {
        let mut inner = self.lock();
        let value = Some(Arc::new(value));
        inner.live += 1;
        match inner.free.pop() {
            Some(index) => {
                let slot = &mut inner.slots[index];
                slot.value = value;
                Self::encode(index, slot.generation)
            }
            None => {
                inner.slots.push(Slot { generation: 0, value });
                Self::encode(inner.slots.len() - 1, 0)
            }
        }
    }

    /// Shared reference to the value behind `handle`.
    ///
    /// The table lock is released before returning, so a long call on one
    /// handle never blocks lookups of another.
    pub fn get(&self, handle: i64) -> Result<Arc<T>, HandleError> {
        let inner = self.lock();
        let (index, generation) = Self::decode(handle).ok_or(HandleError::Unknown(handle))?;
        let slot = inner.slots.get(index).ok_or(HandleError::Unknown(handle))?;
        if slot.generation != generation {
            return Err(HandleError::Stale(handle));
        }
        slot.value.clone().ok_or(HandleError::Stale(handle))
    }

    /// Removes the value and retires the handle.
    ///
    /// The value is dropped once the last in-flight call holding it returns.
    pub fn remove(&self, handle: i64) -> Result<(), HandleError> {
        let value = {
            let mut inner = self.lock();
            let (index, generation) = Self::decode(handle).ok_or(HandleError::Unknown(handle))?;
            let slot = inner.slots.get_mut(index).ok_or(HandleError::Unknown(handle))?;
            if slot.generation != generation || slot.value.is_none() {
                return Err(HandleError::Stale(handle));
            }
            let value = slot.value.take();
            slot.generation = slot.generation.wrapping_add(1) & GENERATION_MASK;
            inner.free.push(index);
            inner.live -= 1;
            value
        };
        // dropped outside the table lock
        drop(value);
        Ok(())
    }

    /// Number of values currently stored
    pub fn len(&self) -> usize {
        self.lock().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
