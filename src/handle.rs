// vaglx/src/handle.rs
//
//! A slot arena handing out generation-tagged integer handles.

/// Storage for objects addressed by `u64` handles.
///
/// The low 32 bits of a handle are the slot index; the high 32 bits are the generation of the
/// slot when the handle was issued. Freeing a slot bumps its generation, so stale handles stop
/// resolving even once the slot is reused.
pub(crate) struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

impl<T> HandleTable<T> {
    pub(crate) fn new() -> HandleTable<T> {
        HandleTable { slots: vec![], free_list: vec![] }
    }

    pub(crate) fn allocate(&mut self, value: T) -> u64 {
        let index = match self.free_list.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot { generation: 0, value: None });
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.value.is_none());
        slot.value = Some(value);
        handle(index, slot.generation)
    }

    pub(crate) fn free(&mut self, handle: u64) -> Option<T> {
        let index = self.resolve(handle)?;
        let slot = &mut self.slots[index];
        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(index as u32);
        value
    }

    pub(crate) fn get(&self, handle: u64) -> Option<&T> {
        let index = self.resolve(handle)?;
        self.slots[index].value.as_ref()
    }

    pub(crate) fn get_mut(&mut self, handle: u64) -> Option<&mut T> {
        let index = self.resolve(handle)?;
        self.slots[index].value.as_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    fn resolve(&self, handle: u64) -> Option<usize> {
        let (index, generation) = ((handle & 0xffff_ffff) as usize, (handle >> 32) as u32);
        match self.slots.get(index) {
            Some(slot) if slot.generation == generation && slot.value.is_some() => Some(index),
            _ => None,
        }
    }
}

#[inline]
fn handle(index: u32, generation: u32) -> u64 {
    (index as u64) | ((generation as u64) << 32)
}

#[cfg(test)]
mod tests {
    use super::HandleTable;

    #[test]
    fn test_stale_handles_do_not_resolve() {
        let mut table = HandleTable::new();
        let first = table.allocate("first");
        assert_eq!(table.free(first), Some("first"));
        assert_eq!(table.free(first), None);

        let second = table.allocate("second");
        assert_ne!(first, second);
        assert_eq!(second & 0xffff_ffff, first & 0xffff_ffff);
        assert!(table.get(first).is_none());
        assert_eq!(table.get(second), Some(&"second"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_slots_are_reused() {
        let mut table = HandleTable::new();
        let handles: Vec<u64> = (0..4).map(|value| table.allocate(value)).collect();
        table.free(handles[1]);
        table.free(handles[2]);
        table.allocate(10);
        table.allocate(20);
        table.allocate(30);
        assert_eq!(table.len(), 5);
        assert_eq!(table.get(handles[3]), Some(&3));
        *table.get_mut(handles[0]).unwrap() = 7;
        assert_eq!(table.get(handles[0]), Some(&7));
    }
}
