/// Returned when a byte is pushed into a full buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Exhausted;

/// A fixed capacity circular byte buffer.
///
/// Sits between an interrupt handler and the foreground: one side only ever
/// calls [`push`](Self::push), the other only [`pop`](Self::pop). The buffer
/// itself does no locking, the owning [`Transport`](crate::Transport) holds it
/// inside its mutex.
///
/// `N` must be a power of two so indices can wrap with a mask.
#[derive(Debug)]
pub struct ByteRingBuffer<const N: usize> {
    storage: [u8; N],
    /// Next slot to write.
    head: usize,
    /// Next slot to read.
    tail: usize,
    count: usize,
}

impl<const N: usize> Default for ByteRingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ByteRingBuffer<N> {
    const MASK: usize = {
        core::assert!(
            N.is_power_of_two(),
            "ring buffer capacity must be a power of two"
        );
        N - 1
    };

    pub const fn new() -> Self {
        let _ = Self::MASK;
        Self {
            storage: [0; N],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == N
    }

    /// Number of bytes that can still be pushed.
    pub fn window(&self) -> usize {
        N - self.count
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }

    pub fn push(&mut self, byte: u8) -> Result<(), Exhausted> {
        if self.is_full() {
            return Err(Exhausted);
        }

        self.storage[self.head] = byte;
        self.head = (self.head + 1) & Self::MASK;
        self.count += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }

        let byte = self.storage[self.tail];
        self.tail = (self.tail + 1) & Self::MASK;
        self.count -= 1;
        Some(byte)
    }

    pub fn peek(&self) -> Option<u8> {
        if self.is_empty() {
            None
        } else {
            Some(self.storage[self.tail])
        }
    }

    /// Remove the `n` most recently pushed bytes, as if they never arrived.
    ///
    /// Returns `false` and leaves the buffer untouched when fewer than `n`
    /// bytes are buffered, since some of them have already been read.
    pub fn retract(&mut self, n: usize) -> bool {
        if n > self.count {
            return false;
        }

        self.head = self.head.wrapping_sub(n) & Self::MASK;
        self.count -= n;
        true
    }

    /// Iterate the buffered bytes from oldest to newest without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.count).map(move |i| self.storage[(self.tail + i) & Self::MASK])
    }
}
