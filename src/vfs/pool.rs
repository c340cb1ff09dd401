use crate::vfs::VfsHandle;

/// Arena of slots addressed by [`VfsHandle`]s.
///
/// Removing an entry frees its slot for the next insert, and entries never
/// move, so a handle stays valid until its own entry is removed. Handles
/// encode `index + 1`, so no live entry ever gets the null handle.
#[derive(Debug)]
pub struct HandlePool<T> {
    slots: Vec<Option<T>>,
    free: Vec<usize>,
    len: usize,
}

impl<T> Default for HandlePool<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T> HandlePool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: T) -> VfsHandle {
        self.len += 1;
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(value);
                VfsHandle::from_index(index)
            }
            None => {
                self.slots.push(Some(value));
                VfsHandle::from_index(self.slots.len() - 1)
            }
        }
    }

    pub fn get(&self, handle: VfsHandle) -> Option<&T> {
        self.slots.get(handle.index()?)?.as_ref()
    }

    pub fn get_mut(&mut self, handle: VfsHandle) -> Option<&mut T> {
        self.slots.get_mut(handle.index()?)?.as_mut()
    }

    pub fn remove(&mut self, handle: VfsHandle) -> Option<T> {
        let index = handle.index()?;
        let value = self.slots.get_mut(index)?.take()?;
        self.free.push(index);
        self.len -= 1;
        Some(value)
    }

    /// First live entry matching `predicate`, in slot order.
    pub fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<VfsHandle> {
        self.iter()
            .find(|&(_, value)| predicate(value))
            .map(|(handle, _)| handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (VfsHandle, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|v| (VfsHandle::from_index(index), v)))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Removes every entry and returns how many there were.
    pub fn clear(&mut self) -> usize {
        let removed = self.len;
        self.slots.clear();
        self.free.clear();
        self.len = 0;
        removed
    }
}
