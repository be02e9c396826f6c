//! Double-buffered storage with an O(1) generation swap.
//!
//! `PingPong` owns two values of the same type. One is the *current*
//! generation (read), the other the *next* generation (written). Calling
//! `swap()` flips the roles by exchanging an index; the values themselves are
//! never moved or copied. Particle state and trail frames both use it.

/// Two generations of `T` with a flip-able current index.
///
/// The invariant `current_index() + next_index() == 1` always holds.
#[derive(Debug, Clone)]
pub struct PingPong<T> {
    buffers: [T; 2],
    current: usize,
}

impl<T> PingPong<T> {
    /// Creates a pair with `first` as the current generation.
    pub fn new(first: T, second: T) -> Self {
        Self {
            buffers: [first, second],
            current: 0,
        }
    }

    /// Index of the current (read) generation.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Index of the next (write) generation.
    pub fn next_index(&self) -> usize {
        1 - self.current
    }

    pub fn current(&self) -> &T {
        &self.buffers[self.current]
    }

    pub fn current_mut(&mut self) -> &mut T {
        &mut self.buffers[self.current]
    }

    pub fn next(&self) -> &T {
        &self.buffers[1 - self.current]
    }

    pub fn next_mut(&mut self) -> &mut T {
        &mut self.buffers[1 - self.current]
    }

    /// Borrows the current generation for reading and the next for writing.
    pub fn split(&mut self) -> (&T, &mut T) {
        let [a, b] = &mut self.buffers;
        if self.current == 0 {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Mutable access to both generations, in storage order.
    pub fn both_mut(&mut self) -> [&mut T; 2] {
        let [a, b] = &mut self.buffers;
        [a, b]
    }

    /// Flips which generation is current.
    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }
}

impl<T: Default> Default for PingPong<T> {
    fn default() -> Self {
        Self::new(T::default(), T::default())
    }
}
