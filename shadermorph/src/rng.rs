//! Deterministic randomness for mutation runs. The same seed and input tree
//! must always produce the same output tree, and each discovered mutation
//! draws from its own child stream spawned at discovery time, so that the
//! order in which mutations are later applied cannot perturb the random
//! choices made by any individual mutation.

use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

pub struct MutationRng {
    inner: SmallRng,
    description: String,
}

impl MutationRng {
    #[must_use]
    pub fn from_seed(seed: u64) -> MutationRng {
        MutationRng {
            inner: SmallRng::seed_from_u64(seed),
            description: format!("seed({seed:#x})"),
        }
    }

    /// Uniform value in `[0, bound)`. `bound` must be positive.
    pub fn next_int(&mut self, bound: u32) -> u32 {
        assert!(bound > 0, "next_int bound must be positive");
        self.inner.gen_range(0..bound)
    }

    /// Uniform value in `[origin, bound)`.
    pub fn next_int_in(&mut self, origin: i32, bound: i32) -> i32 {
        assert!(origin < bound, "empty range");
        self.inner.gen_range(origin..bound)
    }

    /// Uniform value in `[1, bound)`. `bound` must be at least 2.
    pub fn next_positive_int(&mut self, bound: u32) -> u32 {
        assert!(bound > 1, "next_positive_int bound must exceed 1");
        1 + self.next_int(bound - 1)
    }

    /// Uniform value in `[0, bound)`.
    pub fn next_long(&mut self, bound: u64) -> u64 {
        assert!(bound > 0, "next_long bound must be positive");
        self.inner.gen_range(0..bound)
    }

    pub fn next_bool(&mut self) -> bool {
        self.inner.r#gen()
    }

    /// Uniformly chosen index into a non-empty slice.
    pub fn choose_index(&mut self, len: usize) -> usize {
        assert!(len > 0, "cannot choose from an empty slice");
        self.inner.gen_range(0..len)
    }

    /// Spawns an independent child stream. The child is seeded from this
    /// stream's next draw and is thereafter unaffected by how either stream
    /// is consumed.
    pub fn spawn_child(&mut self) -> MutationRng {
        let child_seed: u64 = self.inner.r#gen();
        MutationRng {
            inner: SmallRng::seed_from_u64(child_seed),
            description: format!("{}>{child_seed:#x}", self.description),
        }
    }

    /// Human-readable stream identity for reproducibility logging.
    #[must_use]
    pub fn describe(&self) -> &str {
        &self.description
    }
}

impl RngCore for MutationRng {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = MutationRng::from_seed(7);
        let mut b = MutationRng::from_seed(7);
        for _ in 0..100 {
            assert_eq!(a.next_int(1000), b.next_int(1000));
        }
    }

    #[test]
    fn children_are_insulated_from_parent_consumption() {
        // Spawn a child, then consume the two parents differently; the
        // children must still agree.
        let mut parent_a = MutationRng::from_seed(42);
        let mut parent_b = MutationRng::from_seed(42);
        let mut child_a = parent_a.spawn_child();
        let mut child_b = parent_b.spawn_child();
        let _ = parent_a.next_int(10);
        for _ in 0..10 {
            let _ = parent_b.next_bool();
        }
        for _ in 0..100 {
            assert_eq!(child_a.next_long(1 << 40), child_b.next_long(1 << 40));
        }
    }

    #[test]
    fn bounds_are_respected() {
        let mut rng = MutationRng::from_seed(3);
        for _ in 0..1000 {
            assert!(rng.next_int(5) < 5);
            let v = rng.next_int_in(-3, 4);
            assert!((-3..4).contains(&v));
            let p = rng.next_positive_int(4);
            assert!((1..4).contains(&p));
        }
    }
}
