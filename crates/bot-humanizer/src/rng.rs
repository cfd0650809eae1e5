use rand::Rng;

/// Injectable randomness source.
pub trait RandomSource: Send + Sync {
    fn uniform(&self, low: u64, high: u64) -> u64;
    fn chance(&self, probability: f64) -> bool;
}

/// Default, time-seeded source used outside tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandomSource;

impl RandomSource for ThreadRandomSource {
    fn uniform(&self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        rand::thread_rng().gen_range(low..=high)
    }

    fn chance(&self, probability: f64) -> bool {
        rand::thread_rng().gen_bool(probability.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
pub mod test_support {
    use super::RandomSource;

    /// Deterministic source: `uniform` always returns the low bound,
    /// `chance` is fixed by construction. Keeps timing tests fast and
    /// reproducible.
    pub struct FixedRandomSource {
        pub chance_result: bool,
    }

    impl RandomSource for FixedRandomSource {
        fn uniform(&self, low: u64, _high: u64) -> u64 {
            low
        }

        fn chance(&self, _probability: f64) -> bool {
            self.chance_result
        }
    }
}
