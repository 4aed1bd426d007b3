//! The game-slot pool: a fixed number of concurrently running games.
//!
//! Each [`GameSlot`] carries its own small worker pool, a semaphore with
//! one permit per player, that gates the per-player round tasks of the
//! session bound to it. Running out of slots is not an error; the
//! matchmaker just tries again on its next tick.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Semaphore;

/// One acquired slot.
///
/// Deliberately not `Clone`: the only way to get one is
/// [`GameSlotPool::acquire`] and the only way to give it back is
/// [`GameSlotPool::release`], which consumes it. Acquire and release are
/// therefore paired one to one.
#[derive(Debug)]
pub struct GameSlot {
    index: usize,
    workers: Arc<Semaphore>,
}

impl GameSlot {
    pub fn index(&self) -> usize {
        self.index
    }

    /// The slot's worker pool.
    pub fn workers(&self) -> Arc<Semaphore> {
        Arc::clone(&self.workers)
    }
}

/// A bounded pool of [`GameSlot`]s.
#[derive(Debug)]
pub struct GameSlotPool {
    available: Mutex<Vec<bool>>,
    workers: Vec<Arc<Semaphore>>,
}

impl GameSlotPool {
    /// Creates `max_games` slots, each with `workers_per_slot` workers.
    pub fn new(max_games: usize, workers_per_slot: usize) -> Self {
        Self {
            available: Mutex::new(vec![true; max_games]),
            workers: (0..max_games)
                .map(|_| Arc::new(Semaphore::new(workers_per_slot)))
                .collect(),
        }
    }

    /// Takes the first free slot, or `None` if every slot is busy.
    pub fn acquire(&self) -> Option<GameSlot> {
        let mut available = self.available.lock().unwrap_or_else(PoisonError::into_inner);
        let index = available.iter().position(|free| *free)?;
        available[index] = false;
        drop(available);

        tracing::debug!(slot = index, "game slot acquired");
        Some(GameSlot {
            index,
            workers: Arc::clone(&self.workers[index]),
        })
    }

    /// Returns a slot to the pool.
    pub fn release(&self, slot: GameSlot) {
        let mut available = self.available.lock().unwrap_or_else(PoisonError::into_inner);
        match available.get_mut(slot.index) {
            Some(free) if !*free => {
                *free = true;
                tracing::debug!(slot = slot.index, "game slot released");
            }
            _ => tracing::error!(slot = slot.index, "released a slot this pool never handed out"),
        }
    }

    /// Number of slots currently free.
    pub fn available(&self) -> usize {
        let available = self.available.lock().unwrap_or_else(PoisonError::into_inner);
        available.iter().filter(|free| **free).count()
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.workers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_returns_first_free_slot() {
        let pool = GameSlotPool::new(3, 2);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_eq!((a.index(), b.index()), (0, 1));

        pool.release(a);
        assert_eq!(pool.acquire().unwrap().index(), 0);
    }

    #[test]
    fn test_acquire_beyond_capacity_returns_none_until_release() {
        let pool = GameSlotPool::new(5, 2);
        let mut held: Vec<_> = (0..5).map(|_| pool.acquire().unwrap()).collect();

        assert!(pool.acquire().is_none());
        assert_eq!(pool.available(), 0);

        pool.release(held.pop().unwrap());
        assert_eq!(pool.available(), 1);
        assert!(pool.acquire().is_some());
        assert!(pool.acquire().is_none());
    }

    #[test]
    fn test_slot_workers_have_one_permit_per_player() {
        let pool = GameSlotPool::new(1, 2);
        let slot = pool.acquire().unwrap();
        assert_eq!(slot.workers().available_permits(), 2);
        assert_eq!(pool.capacity(), 1);
    }

    #[test]
    fn test_release_foreign_slot_is_ignored() {
        let small = GameSlotPool::new(1, 1);
        let big = GameSlotPool::new(4, 1);
        for _ in 0..3 {
            big.acquire();
        }
        // Index 3 does not exist in `small`.
        let foreign = big.acquire().unwrap();
        small.release(foreign);
        assert_eq!(small.available(), 1);
    }
}
