use rand::seq::SliceRandom;

/// The RNG contract consumed by every non-deterministic component.
///
/// Spec.md §5 requires every nondeterminism consumer to take an explicit RNG
/// parameter rather than reaching for a shared or thread-local generator, so
/// this trait is implemented for any [`rand::Rng`] and callers are expected
/// to thread a single seeded `rand::rngs::StdRng` through an entire pipeline
/// run for reproducibility.
pub trait Rng {
    /// Draws uniformly from `0..bound`. Panics if `bound == 0`.
    fn next_uint(&mut self, bound: usize) -> usize;

    /// Shuffles `slice` in place using a Fisher-Yates shuffle.
    fn shuffle<T>(&mut self, slice: &mut [T]);
}

impl<R: rand::Rng> Rng for R {
    fn next_uint(&mut self, bound: usize) -> usize {
        assert!(bound > 0, "next_uint requires a positive bound");
        self.random_range(0..bound)
    }

    fn shuffle<T>(&mut self, slice: &mut [T]) {
        slice.shuffle(self);
    }
}
