use std::cell::Cell;
use std::rc::Rc;

/// Hands out episode ids shared by every agent of an academy. Ids are never reused.
#[derive(Debug, Clone, Default)]
pub struct EpisodeIdCounter {
    next: Rc<Cell<i32>>,
}

impl EpisodeIdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_episode_id(&self) -> i32 {
        let id = self.next.get();
        self.next.set(id + 1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_sequence() {
        let counter = EpisodeIdCounter::new();
        let other = counter.clone();

        assert_eq!(counter.next_episode_id(), 0);
        assert_eq!(other.next_episode_id(), 1);
        assert_eq!(counter.next_episode_id(), 2);
    }
}
