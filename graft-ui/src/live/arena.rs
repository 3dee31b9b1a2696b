use super::LiveObject;

/// Handle to a live object. Slots are recycled, so the generation tells a
/// stale handle apart from the object that reused its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LiveId {
    index: u32,
    generation: u32,
}

struct Slot {
    generation: u32,
    object: Option<LiveObject>,
}

pub struct LiveArena {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    len: usize,
}

impl LiveArena {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Store `object`, reusing a free slot if there is one.
    pub fn insert(&mut self, object: LiveObject) -> LiveId {
        self.len += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            return LiveId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            object: Some(object),
        });
        LiveId {
            index,
            generation: 0,
        }
    }

    /// Object behind `id`, unless its slot was reused.
    pub fn get(&self, id: LiveId) -> Option<&LiveObject> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.object.as_ref()
    }

    /// Mutable object behind `id`, unless its slot was reused.
    pub fn get_mut(&mut self, id: LiveId) -> Option<&mut LiveObject> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.object.as_mut()
    }

    /// Whether `id` still names a live object.
    pub fn contains(&self, id: LiveId) -> bool {
        self.get(id).is_some()
    }

    /// Take the object out and retire its handle.
    pub fn remove(&mut self, id: LiveId) -> Option<LiveObject> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let object = slot.object.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index);
        self.len -= 1;
        Some(object)
    }

    /// Ids of every live object.
    pub fn ids(&self) -> Vec<LiveId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.object.is_some())
            .map(|(index, slot)| LiveId {
                index: index as u32,
                generation: slot.generation,
            })
            .collect()
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for LiveArena {
    fn default() -> Self {
        Self::new()
    }
}
