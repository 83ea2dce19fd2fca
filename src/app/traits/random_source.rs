use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Randomness used for retry jitter, template id generation, and
/// challenge-response direction selection (spec §6.1). Abstracted so tests
/// can supply deterministic sequences.
pub trait RandomSource: Send + Sync {
    fn gen_f64(&self) -> f64;
    fn gen_range_usize(&self, lo: usize, hi: usize) -> usize;
}

/// Default implementation backed by `rand`'s `StdRng` (already a teacher
/// dependency via `features = ["std_rng"]`).
pub struct OsRandom(Mutex<StdRng>);

impl OsRandom {
    pub fn new() -> Self {
        OsRandom(Mutex::new(StdRng::from_entropy()))
    }
}

impl Default for OsRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for OsRandom {
    fn gen_f64(&self) -> f64 {
        self.0.lock().expect("rng lock poisoned").gen::<f64>()
    }

    fn gen_range_usize(&self, lo: usize, hi: usize) -> usize {
        self.0.lock().expect("rng lock poisoned").gen_range(lo..hi)
    }
}
