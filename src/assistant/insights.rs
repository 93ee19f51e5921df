use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of insight indices. `pick` is only called with `len > 0` and must
/// return a value below `len`.
pub trait InsightPicker: Send {
    fn pick(&mut self, len: usize) -> usize;
}

/// Uniform picker over any `rand` generator.
pub struct RngPicker<R> {
    rng: R,
}

impl<R: Rng + Send> RngPicker<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngPicker<StdRng> {
    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> InsightPicker for RngPicker<R> {
    fn pick(&mut self, len: usize) -> usize {
        self.rng.random_range(0..len)
    }
}

/// Candidate unsolicited notifications, in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InsightPool {
    entries: Vec<String>,
}

impl InsightPool {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// `None` for an empty pool. Out-of-range picks wrap around.
    pub fn sample(&self, picker: &mut dyn InsightPicker) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = picker.pick(self.entries.len()) % self.entries.len();
        Some(&self.entries[idx])
    }
}
