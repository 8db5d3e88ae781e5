//! # Slot Pool
//!
//! Fixed-capacity slab allocator with two-cursor index reuse.
//!
//! All slot memory is allocated once at construction; create and destroy
//! never touch the heap afterwards. Two cursors keep the live region tight
//! under churn:
//!
//! - `first_free`: lowest index eligible for reuse
//! - `first_unallocated`: lowest index never yet constructed
//!
//! Invariant: `0 <= first_free <= first_unallocated <= capacity`.
//!
//! Create prefers reusing a freed slot below `first_unallocated`; only when
//! none exists does it grow into fresh territory. Destroy pulls `first_free`
//! down to the freed index and shrinks `first_unallocated` back over any
//! trailing dead slots, so iteration bounds stay minimal.
//!
//! Handles carry a generation counter: a handle taken before a slot was
//! destroyed and reused is detectably stale rather than silently aliasing
//! the new occupant.

use crate::error::{EntityError, EntityResult};

/// Stable reference to a live slot in a [`SlotPool`].
///
/// A handle stays valid until its slot is destroyed. After the slot is
/// reused, the old handle's generation no longer matches and every lookup
/// through it fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    index: u32,
    generation: u32,
}

impl SlotHandle {
    /// Returns the slot index this handle refers to.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation this handle was issued under.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

/// One slot: the stored value (if live) plus its reuse generation.
struct Slot<T> {
    value: Option<T>,
    generation: u32,
}

/// Fixed-capacity slab allocator with O(1) amortized create/destroy.
///
/// # Thread Safety
///
/// The pool is NOT internally synchronized. Wrap it in a lock when shared
/// across threads (the registries do exactly that).
///
/// # Example
///
/// ```rust,ignore
/// let mut pool: SlotPool<Particle> = SlotPool::new(10_000);
/// let handle = pool.create_with(Particle::default())?;
/// pool.destroy(handle);
/// ```
pub struct SlotPool<T> {
    /// Pre-allocated slot storage.
    slots: Box<[Slot<T>]>,
    /// Lowest index eligible for reuse.
    first_free: usize,
    /// Lowest index never yet constructed.
    first_unallocated: usize,
    /// Number of live slots.
    active_count: usize,
    /// Label used in logs and errors.
    label: &'static str,
}

impl<T> SlotPool<T> {
    /// Creates a pool with the given capacity.
    ///
    /// All slot storage is allocated here, up front.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (fatal at startup by design).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_label("slot-pool", capacity)
    }

    /// Creates a pool with a label that shows up in logs and errors.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_label(label: &'static str, capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            capacity <= u32::MAX as usize,
            "Capacity cannot exceed u32::MAX"
        );

        let slots = (0..capacity)
            .map(|_| Slot {
                value: None,
                generation: 0,
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            first_free: 0,
            first_unallocated: 0,
            active_count: 0,
            label,
        }
    }

    /// Returns the pool's fixed capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of live slots.
    #[inline]
    #[must_use]
    pub const fn active_count(&self) -> usize {
        self.active_count
    }

    /// Creates a default-constructed value in the pool.
    ///
    /// # Errors
    ///
    /// [`EntityError::PoolExhausted`] when every slot is live. Logged and
    /// non-fatal; the caller decides how to degrade.
    pub fn create(&mut self) -> EntityResult<SlotHandle>
    where
        T: Default,
    {
        self.create_with(T::default())
    }

    /// Creates `value` in the pool, reusing a freed slot when one exists.
    ///
    /// # Errors
    ///
    /// [`EntityError::PoolExhausted`] when every slot is live.
    pub fn create_with(&mut self, value: T) -> EntityResult<SlotHandle> {
        let index = if self.first_free < self.first_unallocated {
            // Reuse a previously freed slot, then advance the cursor past
            // any contiguous live slots. The scan is bounded by the freed
            // region, not the capacity.
            let index = self.first_free;
            self.first_free += 1;
            while self.first_free < self.first_unallocated
                && self.slots[self.first_free].value.is_some()
            {
                self.first_free += 1;
            }
            index
        } else if self.first_unallocated < self.capacity() {
            // Grow into fresh territory.
            let index = self.first_unallocated;
            self.first_unallocated += 1;
            self.first_free = self.first_unallocated;
            index
        } else {
            tracing::warn!(pool = self.label, capacity = self.capacity(), "pool exhausted");
            return Err(EntityError::PoolExhausted {
                pool: self.label,
                capacity: self.capacity(),
            });
        };

        debug_assert!(self.first_free <= self.first_unallocated);
        debug_assert!(self.first_unallocated <= self.capacity());

        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        slot.value = Some(value);
        self.active_count += 1;

        Ok(SlotHandle {
            index: index as u32,
            generation: slot.generation,
        })
    }

    /// Destroys the value behind `handle`, returning it.
    ///
    /// Invalid handles (out of range, dead, or stale generation) log a
    /// warning and no-op.
    pub fn destroy(&mut self, handle: SlotHandle) -> Option<T> {
        match self.try_destroy(handle) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(
                    pool = self.label,
                    index = handle.index,
                    generation = handle.generation,
                    "destroy of invalid handle ignored"
                );
                None
            }
        }
    }

    /// Destroys the value behind `handle`, reporting invalid handles.
    ///
    /// # Errors
    ///
    /// [`EntityError::InvalidHandle`] when the handle is out of range, the
    /// slot is not live, or the generation does not match.
    pub fn try_destroy(&mut self, handle: SlotHandle) -> EntityResult<T> {
        let index = handle.index as usize;
        let invalid = EntityError::InvalidHandle {
            pool: self.label,
            index: handle.index,
            generation: handle.generation,
        };

        if index >= self.capacity() {
            return Err(invalid);
        }

        let slot = &mut self.slots[index];
        if slot.value.is_none() || slot.generation != handle.generation {
            return Err(invalid);
        }

        let value = slot.value.take();
        self.active_count -= 1;

        // Keep both cursors tight so iteration bounds stay minimal.
        if index < self.first_free {
            self.first_free = index;
        }
        if index + 1 == self.first_unallocated {
            self.first_unallocated -= 1;
            while self.first_unallocated > 0
                && self.slots[self.first_unallocated - 1].value.is_none()
            {
                self.first_unallocated -= 1;
            }
            if self.first_free > self.first_unallocated {
                self.first_free = self.first_unallocated;
            }
        }

        debug_assert!(self.first_free <= self.first_unallocated);

        // The slot held a value and the generation matched, so take()
        // cannot have returned None.
        value.ok_or(EntityError::InvalidHandle {
            pool: self.label,
            index: handle.index,
            generation: handle.generation,
        })
    }

    /// Checks whether `handle` refers to a live slot.
    #[inline]
    #[must_use]
    pub fn is_active(&self, handle: SlotHandle) -> bool {
        self.slot(handle).is_some()
    }

    /// Gets a reference to the value behind `handle`.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: SlotHandle) -> Option<&T> {
        self.slot(handle).and_then(|s| s.value.as_ref())
    }

    /// Gets a mutable reference to the value behind `handle`.
    #[inline]
    pub fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut T> {
        let index = handle.index as usize;
        let slot = self.slots.get_mut(index)?;
        if slot.value.is_none() || slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Gets the value at a raw slot index, if that slot is live.
    #[inline]
    #[must_use]
    pub fn get_at(&self, index: usize) -> Option<&T> {
        self.slots.get(index)?.value.as_ref()
    }

    /// Returns the current handle for a raw slot index, if live.
    #[inline]
    #[must_use]
    pub fn handle_at(&self, index: usize) -> Option<SlotHandle> {
        let slot = self.slots.get(index)?;
        slot.value.as_ref()?;
        Some(SlotHandle {
            index: index as u32,
            generation: slot.generation,
        })
    }

    /// Iterates over live slots in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotHandle, &T)> {
        self.slots[..self.first_unallocated]
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.value.as_ref().map(|value| {
                    (
                        SlotHandle {
                            index: index as u32,
                            generation: slot.generation,
                        },
                        value,
                    )
                })
            })
    }

    /// Iterates mutably over live slots in ascending index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotHandle, &mut T)> {
        self.slots[..self.first_unallocated]
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| {
                let generation = slot.generation;
                slot.value.as_mut().map(|value| {
                    (
                        SlotHandle {
                            index: index as u32,
                            generation,
                        },
                        value,
                    )
                })
            })
    }

    /// Returns the handles of all live slots in ascending index order.
    pub fn handles(&self) -> impl Iterator<Item = SlotHandle> + '_ {
        self.iter().map(|(handle, _)| handle)
    }

    /// Destroys every live value and resets both cursors.
    ///
    /// Generations are preserved, so handles issued before the clear stay
    /// detectably stale.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.value = None;
        }
        self.first_free = 0;
        self.first_unallocated = 0;
        self.active_count = 0;
    }

    #[inline]
    fn slot(&self, handle: SlotHandle) -> Option<&Slot<T>> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.value.is_none() || slot.generation != handle.generation {
            return None;
        }
        Some(slot)
    }
}
