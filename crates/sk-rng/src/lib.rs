//! Xorshift64* random number generator.
//!
//! A small, fast generator whose entire state is one `u64`, which makes it
//! trivially serializable: a saved battle stores the state word and the
//! restored session continues the exact same stream. An optional call trace
//! records every draw for debugging replay divergences.

use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

/// Multiplier for the * step of xorshift64*.
const STAR_MULTIPLIER: u64 = 0x2545F4914F6CDD1D;

/// An RNG call trace entry for debugging divergences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngTraceEntry {
    /// Sequence number (0-indexed)
    pub seq: u64,
    /// Function name (e.g. "next_u64", "below")
    pub func: &'static str,
    /// Argument (e.g. modulus for `below`)
    pub arg: u64,
    /// Result value
    pub result: u64,
}

/// Xorshift64* generator context.
#[derive(Clone, Serialize, Deserialize)]
pub struct Xorshift64 {
    /// Current state word; never zero.
    state: u64,
    /// Total number of u64 values produced (for tracing)
    call_count: u64,
    /// If true, record all calls into the trace log
    #[serde(skip)]
    tracing: bool,
    /// Trace log (only populated when tracing is true)
    #[serde(skip)]
    trace: Vec<RngTraceEntry>,
}

impl core::fmt::Debug for Xorshift64 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Xorshift64")
            .field("state", &self.state)
            .field("call_count", &self.call_count)
            .finish()
    }
}

impl Xorshift64 {
    /// Create a new generator from a seed. A zero seed is remapped, since a
    /// zero state would lock the shift register at zero forever.
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { STAR_MULTIPLIER } else { seed },
            call_count: 0,
            tracing: false,
            trace: Vec::new(),
        }
    }

    /// The raw state word.
    pub fn state(&self) -> u64 {
        self.state
    }

    /// How many draws have been recorded so far.
    pub fn call_count(&self) -> u64 {
        self.call_count
    }

    /// Enable or disable call tracing.
    pub fn set_tracing(&mut self, enabled: bool) {
        self.tracing = enabled;
        if !enabled {
            self.trace.clear();
        }
    }

    /// Drain the recorded trace entries.
    pub fn take_trace(&mut self) -> Vec<RngTraceEntry> {
        core::mem::take(&mut self.trace)
    }

    /// Advance the shift register and return the next value.
    pub fn next_value(&mut self) -> u64 {
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        let result = self.state.wrapping_mul(STAR_MULTIPLIER);
        self.record("next_u64", 0, result);
        result
    }

    /// Uniform value in `0..n`. Returns 0 if `n` is 0.
    pub fn below(&mut self, n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        let result = self.next_value() % n;
        self.record("below", n, result);
        result
    }

    fn record(&mut self, func: &'static str, arg: u64, result: u64) {
        self.call_count += 1;
        if self.tracing {
            self.trace.push(RngTraceEntry {
                seq: self.call_count - 1,
                func,
                arg,
                result,
            });
        }
    }
}

impl RngCore for Xorshift64 {
    fn next_u32(&mut self) -> u32 {
        (self.next_value() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_value()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_value().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Xorshift64 {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reproducibility() {
        let mut a = Xorshift64::new(0xDEADBEEF);
        let mut b = Xorshift64::new(0xDEADBEEF);
        for _ in 0..1000 {
            assert_eq!(a.next_value(), b.next_value());
        }
    }

    #[test]
    fn test_zero_seed_remapped() {
        let mut rng = Xorshift64::new(0);
        assert_ne!(rng.state(), 0);
        // the stream must not be stuck
        let first = rng.next_value();
        let second = rng.next_value();
        assert_ne!(first, second);
    }

    #[test]
    fn test_below_bounds() {
        let mut rng = Xorshift64::new(42);
        for _ in 0..1000 {
            assert!(rng.below(10) < 10);
        }
        assert_eq!(rng.below(0), 0);
    }

    #[test]
    fn test_serde_resumes_stream() {
        let mut rng = Xorshift64::new(7);
        for _ in 0..37 {
            rng.next_value();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: Xorshift64 = serde_json::from_str(&json).unwrap();
        for _ in 0..100 {
            assert_eq!(rng.next_value(), restored.next_value());
        }
    }

    #[test]
    fn test_trace_records_calls() {
        let mut rng = Xorshift64::new(1);
        rng.set_tracing(true);
        rng.below(6);
        let trace = rng.take_trace();
        // a `below` draw consumes one raw value and logs both
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[1].func, "below");
        assert_eq!(trace[1].arg, 6);
    }

    #[test]
    fn test_fill_bytes_partial_chunk() {
        let mut rng = Xorshift64::new(3);
        let mut buf = [0u8; 13];
        rng.fill_bytes(&mut buf);
        assert!(buf.iter().any(|&b| b != 0));
    }
}
