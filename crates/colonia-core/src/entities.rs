use colonia_protocol::EntityId;

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Deterministic, generational storage for world entities.
///
/// - Stable iteration order: ascending slot index.
/// - Disposal bumps the slot generation, so stale ids never resolve again.
#[derive(Clone, Debug)]
pub struct EntityStore<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for EntityStore<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T> EntityStore<T> {
    pub fn insert(&mut self, value: T) -> EntityId {
        self.insert_with(|_| value)
    }

    /// Insert a value that needs to know its own id.
    pub fn insert_with(&mut self, make: impl FnOnce(EntityId) -> T) -> EntityId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            let id = EntityId::new(index, slot.generation);
            slot.value = Some(make(id));
            id
        } else {
            let index = self.slots.len() as u32;
            let id = EntityId::new(index, 0);
            self.slots.push(Slot {
                generation: 0,
                value: Some(make(id)),
            });
            id
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation == id.generation {
            slot.value.as_ref()
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation == id.generation {
            slot.value.as_mut()
        } else {
            None
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter_ordered(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            Some((EntityId::new(index as u32, slot.generation), value))
        })
    }

    pub fn iter_ordered_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| {
                let value = slot.value.as_mut()?;
                Some((EntityId::new(index as u32, slot.generation), value))
            })
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.iter_ordered().map(|(id, _)| id).collect()
    }
}
