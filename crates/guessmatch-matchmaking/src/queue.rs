//! An ordered matchmaking queue of player ids.

use guessmatch_protocol::{GameMode, PlayerId};

/// One matchmaking queue.
///
/// Holds ids only; the registry owns the players. Insertion order is
/// preserved, which is what makes the normal queue FIFO and gives the
/// ranked queue its tie-break order.
#[derive(Debug, Clone)]
pub struct MatchQueue {
    mode: GameMode,
    entries: Vec<PlayerId>,
}

impl MatchQueue {
    pub fn new(mode: GameMode) -> Self {
        Self {
            mode,
            entries: Vec::new(),
        }
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    /// Appends a player. Returns `false` if they were already queued.
    pub fn push(&mut self, id: PlayerId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.entries.push(id);
        true
    }

    /// Removes a player wherever they are. Returns `false` if absent.
    pub fn remove(&mut self, id: PlayerId) -> bool {
        match self.entries.iter().position(|e| *e == id) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Removes every listed player.
    pub fn remove_all(&mut self, ids: &[PlayerId]) {
        self.entries.retain(|e| !ids.contains(e));
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.entries.contains(&id)
    }

    /// Queued ids, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_preserves_order_and_rejects_duplicates() {
        let mut q = MatchQueue::new(GameMode::Normal);
        assert!(q.push(PlayerId(3)));
        assert!(q.push(PlayerId(1)));
        assert!(!q.push(PlayerId(3)));
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![PlayerId(3), PlayerId(1)]);
    }

    #[test]
    fn test_remove_and_remove_all() {
        let mut q = MatchQueue::new(GameMode::Ranked);
        for i in 1..=4 {
            q.push(PlayerId(i));
        }
        assert!(q.remove(PlayerId(2)));
        assert!(!q.remove(PlayerId(2)));

        q.remove_all(&[PlayerId(1), PlayerId(4)]);
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![PlayerId(3)]);
        assert_eq!(q.len(), 1);
        assert_eq!(q.mode(), GameMode::Ranked);
    }
}
