use std::sync::Mutex;

use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::VoiceLimitReached;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub(crate) struct SlotKey(pub(crate) usize);

/// Fixed-capacity storage owned by the audio thread.
///
/// New items arrive through a ring buffer from the matching
/// [`SlotController`], so inserting never allocates or locks on the audio
/// thread.
pub(crate) struct SlotStorage<T> {
    slots: Vec<Option<T>>,
    new_item_consumer: Consumer<(SlotKey, T)>,
    freed_key_producer: Producer<SlotKey>,
}

impl<T> SlotStorage<T> {
    #[must_use]
    pub(crate) fn new(capacity: usize) -> (Self, SlotController<T>) {
        let (new_item_producer, new_item_consumer) = RingBuffer::new(capacity);
        let (mut freed_key_producer, freed_key_consumer) = RingBuffer::new(capacity);

        let mut slots = Vec::with_capacity(capacity);

        for key in 0..capacity {
            freed_key_producer
                .push(SlotKey(key))
                .expect("created more keys than capacity available");

            slots.push(None);
        }

        (
            Self {
                slots,
                new_item_consumer,
                freed_key_producer,
            },
            SlotController {
                new_item_producer: Mutex::new(new_item_producer),
                freed_key_consumer: Mutex::new(freed_key_consumer),
            },
        )
    }

    pub(crate) fn remove_and_add(&mut self, mut remove_test: impl FnMut(&T) -> bool) {
        // Remove items matching the predicate and recycle their keys.
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.as_ref().is_some_and(&mut remove_test) {
                slot.take();
                self.freed_key_producer
                    .push(SlotKey(index))
                    .unwrap_or_else(|_| panic!("freed key producer is full"));
            }
        }

        while let Ok((key, item)) = self.new_item_consumer.pop() {
            self.slots[key.0] = Some(item);
        }
    }

    #[must_use]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

pub(crate) struct SlotController<T> {
    new_item_producer: Mutex<Producer<(SlotKey, T)>>,
    freed_key_consumer: Mutex<Consumer<SlotKey>>,
}

impl<T> SlotController<T> {
    pub(crate) fn insert(&self, item: T) -> Result<SlotKey, VoiceLimitReached> {
        let key = self.try_reserve()?;

        self.new_item_producer
            .lock()
            .unwrap()
            .push((key, item))
            .map_err(|_| VoiceLimitReached)?;

        Ok(key)
    }

    fn try_reserve(&self) -> Result<SlotKey, VoiceLimitReached> {
        self.freed_key_consumer.lock().unwrap().pop().map_err(|_| VoiceLimitReached)
    }
}

#[cfg(test)]
mod tests {
    use super::SlotStorage;

    #[test]
    fn items_arrive_on_the_next_update() {
        let (mut storage, controller) = SlotStorage::new(2);

        controller.insert(1).unwrap();
        assert_eq!(storage.len(), 0);

        storage.remove_and_add(|_| false);
        assert_eq!(storage.iter().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn capacity_is_enforced_and_keys_are_recycled() {
        let (mut storage, controller) = SlotStorage::new(2);

        controller.insert(1).unwrap();
        controller.insert(2).unwrap();
        assert!(controller.insert(3).is_err());

        storage.remove_and_add(|_| false);
        storage.remove_and_add(|item| *item == 1);
        assert_eq!(storage.len(), 1);

        controller.insert(3).unwrap();
        storage.remove_and_add(|_| false);

        let mut items: Vec<_> = storage.iter().copied().collect();
        items.sort_unstable();
        assert_eq!(items, vec![2, 3]);
    }
}
