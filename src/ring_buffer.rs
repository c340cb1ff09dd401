//! Fixed-capacity byte ring buffer.
//!
//! The buffer performs no locking of its own. Producers and consumers that
//! live on different threads must serialize access, as
//! [`StreamDataSource`](crate::data_source::StreamDataSource) does with its
//! mutex.

/// What happens to a write that does not fit in the free space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Keep the unread bytes and drop the tail of the new data
    #[default]
    DropNewest,
    /// Evict the oldest unread bytes to make room for the new data
    OverwriteOldest,
}

#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Box<[u8]>,
    /// Read cursor
    first_byte: usize,
    /// Unread bytes, never more than `data.len()`
    num_bytes: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            first_byte: 0,
            num_bytes: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of unread bytes
    pub fn len(&self) -> usize {
        self.num_bytes
    }

    /// Number of bytes that can be written without dropping anything
    pub fn free(&self) -> usize {
        self.data.len() - self.num_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.num_bytes == 0
    }

    pub fn is_full(&self) -> bool {
        self.num_bytes == self.data.len()
    }

    /// Discards every unread byte.
    pub fn clear(&mut self) {
        self.first_byte = 0;
        self.num_bytes = 0;
    }

    /// Appends as much of `data` as fits in the free space.
    ///
    /// Unread bytes are never overwritten: input beyond the free space is
    /// dropped. Returns the number of bytes stored, 0 when the buffer is full.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let capacity = self.data.len();
        let count = data.len().min(capacity - self.num_bytes);
        if count == 0 {
            return 0;
        }

        let next_byte = (self.first_byte + self.num_bytes) % capacity;

        // Tail segment, up to the end of the storage
        let tail = (capacity - next_byte).min(count);
        self.data[next_byte..next_byte + tail].copy_from_slice(&data[..tail]);

        // Head segment, wrapped to the start of the storage
        let head = count - tail;
        self.data[..head].copy_from_slice(&data[tail..count]);

        self.num_bytes += count;
        count
    }

    /// Appends `data`, evicting the oldest unread bytes when it does not fit.
    ///
    /// When `data` is larger than the whole buffer only its last `capacity`
    /// bytes are kept. Returns the number of unread bytes that were evicted.
    pub fn write_overwrite(&mut self, data: &[u8]) -> usize {
        let capacity = self.data.len();
        if capacity == 0 {
            return 0;
        }

        let data = &data[data.len().saturating_sub(capacity)..];
        let evicted = data.len().saturating_sub(self.free());
        if evicted > 0 {
            self.first_byte = (self.first_byte + evicted) % capacity;
            self.num_bytes -= evicted;
        }

        self.write(data);
        evicted
    }

    /// Moves up to `out.len()` unread bytes into `out`.
    ///
    /// Returns the number of bytes copied, 0 when the buffer is empty.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.num_bytes);
        if count == 0 {
            return 0;
        }

        let capacity = self.data.len();

        let tail = (capacity - self.first_byte).min(count);
        out[..tail].copy_from_slice(&self.data[self.first_byte..self.first_byte + tail]);

        let head = count - tail;
        out[tail..count].copy_from_slice(&self.data[..head]);

        self.first_byte = (self.first_byte + count) % capacity;
        self.num_bytes -= count;
        count
    }
}
