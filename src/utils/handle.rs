use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};

/// Types that can be named by a [`Handle`]. The tag travels inside the
/// handle so a type-erased [`RawHandle`] still knows what it points at.
pub trait Tagged: 'static {
    const TAG: u16;
}

/// Generational handle into a [`Pool`].
///
/// Generation `0` is never handed out, so `Handle::default()` is always
/// invalid.
#[repr(C)]
pub struct Handle<T> {
    pub slot: u32,
    pub generation: u32,
    tag: u16,
    _pad: u16,
    phantom: PhantomData<T>,
}

impl<T: Tagged> Handle<T> {
    pub fn new(slot: u32, generation: u32) -> Self {
        Self {
            slot,
            generation,
            tag: T::TAG,
            _pad: 0,
            phantom: PhantomData,
        }
    }

    /// Recover a typed handle from an erased one. Fails when the tag does
    /// not belong to `T`.
    pub fn from_raw(raw: RawHandle) -> Option<Self> {
        (raw.tag == T::TAG).then(|| Self::new(raw.slot, raw.generation))
    }
}

impl<T> Handle<T> {
    pub fn valid(&self) -> bool {
        self.generation != 0
    }

    pub fn tag(&self) -> u16 {
        self.tag
    }

    pub fn raw(&self) -> RawHandle {
        RawHandle {
            tag: self.tag,
            slot: self.slot,
            generation: self.generation,
        }
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}:{}v{})", self.tag, self.slot, self.generation)
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.generation == other.generation && self.tag == other.tag
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.slot.hash(state);
        self.generation.hash(state);
        self.tag.hash(state);
    }
}

impl<T: Tagged> Default for Handle<T> {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

unsafe impl<T: 'static> Zeroable for Handle<T> {}
unsafe impl<T: 'static> Pod for Handle<T> {}

/// A handle with its type erased. Used where resources of every kind are
/// kept in one list, e.g. lifetime scopes and in-flight reference sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle {
    pub tag: u16,
    pub slot: u32,
    pub generation: u32,
}

/// Slot storage with generation counters. Releasing a slot bumps its
/// generation, so stale handles stop resolving immediately. A slot whose
/// generation would wrap is retired instead of reused.
pub struct Pool<T> {
    items: Vec<Option<T>>,
    empty: Vec<u32>,
    generation: Vec<u32>,
    len: usize,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new(64)
    }
}

impl<T> Pool<T> {
    pub fn new(initial_size: usize) -> Self {
        Self {
            items: Vec::with_capacity(initial_size),
            empty: Vec::new(),
            generation: Vec::with_capacity(initial_size),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn resolve(&self, slot: u32, generation: u32) -> Option<usize> {
        let slot = slot as usize;
        match self.generation.get(slot) {
            Some(g) if *g == generation && generation != 0 => Some(slot),
            _ => None,
        }
    }

    pub fn get_ref(&self, item: Handle<T>) -> Option<&T> {
        let slot = self.resolve(item.slot, item.generation)?;
        self.items[slot].as_ref()
    }

    pub fn contains(&self, item: Handle<T>) -> bool {
        self.get_ref(item).is_some()
    }

    pub fn release(&mut self, item: Handle<T>) -> Option<T> {
        let slot = self.resolve(item.slot, item.generation)?;
        let value = self.items[slot].take()?;
        self.len -= 1;
        match self.generation[slot].checked_add(1) {
            Some(next) => {
                self.generation[slot] = next;
                self.empty.push(slot as u32);
            }
            // Exhausted: the slot is never handed out again.
            None => self.generation[slot] = 0,
        }
        Some(value)
    }
}

impl<T: Tagged> Pool<T> {
    pub fn insert(&mut self, item: T) -> Handle<T> {
        self.len += 1;
        if let Some(slot) = self.empty.pop() {
            self.items[slot as usize] = Some(item);
            return Handle::new(slot, self.generation[slot as usize]);
        }

        let slot = self.items.len() as u32;
        self.items.push(Some(item));
        self.generation.push(1);
        Handle::new(slot, 1)
    }

    /// Handles of every live entry, in slot order.
    pub fn handles(&self) -> Vec<Handle<T>> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_some())
            .map(|(slot, _)| Handle::new(slot as u32, self.generation[slot]))
            .collect()
    }
}
