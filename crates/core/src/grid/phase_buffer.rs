//! Two-slot ring buffer with a single front index
//!
//! The front slot holds the committed state that readers see; the back slot
//! is the one being produced. `flip` swaps their roles without moving data.

/// A pair of equally-shaped values, one committed (front) and one in progress (back)
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseBuffer<T> {
    slots: [T; 2],
    front: usize,
}

impl<T> PhaseBuffer<T> {
    /// Buffer with slot 0 at the front
    pub fn new(slot0: T, slot1: T) -> Self {
        Self {
            slots: [slot0, slot1],
            front: 0,
        }
    }

    /// Index (0 or 1) of the committed slot
    #[inline]
    pub fn front_index(&self) -> usize {
        self.front
    }

    /// Index (0 or 1) of the slot being produced; always `1 - front_index()`
    #[inline]
    pub fn back_index(&self) -> usize {
        1 - self.front
    }

    /// Swap front and back
    #[inline]
    pub fn flip(&mut self) {
        self.front = 1 - self.front;
    }

    pub fn front(&self) -> &T {
        &self.slots[self.front]
    }

    pub fn back(&self) -> &T {
        &self.slots[self.back_index()]
    }

    /// Slot by absolute index
    pub fn slot(&self, index: usize) -> &T {
        &self.slots[index]
    }

    /// Mutable slot by absolute index
    pub fn slot_mut(&mut self, index: usize) -> &mut T {
        &mut self.slots[index]
    }

    /// Borrow the front for reading and the back for writing at the same time
    pub fn split_mut(&mut self) -> (&T, &mut T) {
        let [a, b] = &mut self.slots;
        if self.front == 0 {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Borrow both slots mutably, ordered `(slot[index], slot[1 - index])`
    pub fn pair_mut(&mut self, index: usize) -> (&mut T, &mut T) {
        let [a, b] = &mut self.slots;
        if index == 0 {
            (a, b)
        } else {
            (b, a)
        }
    }
}
