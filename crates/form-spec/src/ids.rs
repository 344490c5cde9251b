use std::collections::HashSet;

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Length of every generated node id.
pub const ID_LENGTH: usize = 7;

/// Draw a random alphanumeric id that is not in `used`, and claim it.
///
/// Ids are unique for the lifetime of `used`; collisions simply retry.
pub fn mint_unique(used: &mut HashSet<String>) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let candidate: String = (&mut rng)
            .sample_iter(Alphanumeric)
            .take(ID_LENGTH)
            .map(char::from)
            .collect();
        if used.insert(candidate.clone()) {
            return candidate;
        }
    }
}

/// Central allocator owning the set of ids live in one tree.
///
/// Structural changes (load, delete, replace) refresh the set through
/// [`IdAllocator::register`] and [`IdAllocator::release`]; minting never
/// rescans the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdAllocator {
    used: HashSet<String>,
}

impl IdAllocator {
    pub fn new() -> Self {
        IdAllocator::default()
    }

    pub fn with_used(ids: impl IntoIterator<Item = String>) -> Self {
        IdAllocator {
            used: ids.into_iter().collect(),
        }
    }

    /// Claim an externally supplied id (for example from a loaded snapshot).
    pub fn register(&mut self, id: &str) {
        self.used.insert(id.to_string());
    }

    pub fn release(&mut self, id: &str) {
        self.used.remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.used.contains(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.used.iter().map(String::as_str)
    }

    /// Mint a fresh id, unique against every id this allocator has seen.
    pub fn mint(&mut self) -> String {
        mint_unique(&mut self.used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_have_fixed_length() {
        let mut allocator = IdAllocator::new();
        let id = allocator.mint();
        assert_eq!(id.len(), ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn minted_ids_never_collide_within_a_burst() {
        let mut allocator = IdAllocator::new();
        let mut seen = HashSet::new();
        for _ in 0..500 {
            assert!(seen.insert(allocator.mint()));
        }
    }

    #[test]
    fn registered_ids_are_reserved() {
        let mut allocator = IdAllocator::with_used(["abc1234".to_string()]);
        assert!(allocator.contains("abc1234"));
        for _ in 0..50 {
            assert_ne!(allocator.mint(), "abc1234");
        }
    }
}
