//! Explicitly constructed random sources.
//!
//! Every random draw in this crate flows through a `PrepRng` instance owned
//! by the caller. There is no process-global generator; repeated runs in one
//! process stay independent, and a fixed seed reproduces a run bit-for-bit.

use rand::RngCore;

/// Seeding policy for a `PrepRng`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedMode {
    /// Deterministic stream reproducible across runs.
    Fixed(u64),
    /// Fresh OS-entropy seed per construction.
    Entropy,
}

#[derive(Debug, Clone)]
/// Small deterministic splitmix64 generator used for reproducible runs.
pub struct PrepRng {
    state: u64,
}

impl PrepRng {
    /// Build a generator from a seeding policy.
    pub fn new(mode: SeedMode) -> Self {
        match mode {
            SeedMode::Fixed(seed) => Self { state: seed },
            SeedMode::Entropy => Self {
                state: rand::random(),
            },
        }
    }

    /// Resume a generator from a previously captured `state()`.
    pub fn from_state(state: u64) -> Self {
        Self { state }
    }

    /// Current internal state, suitable for `from_state`.
    pub fn state(&self) -> u64 {
        self.state
    }

    fn next_u64_internal(&mut self) -> u64 {
        let mut z = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        self.state = z;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

impl RngCore for PrepRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64_internal() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_u64_internal()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut offset = 0;
        while offset < dest.len() {
            let value = self.next_u64_internal();
            let bytes = value.to_le_bytes();
            let remaining = dest.len() - offset;
            let copy_len = remaining.min(bytes.len());
            dest[offset..offset + copy_len].copy_from_slice(&bytes[..copy_len]);
            offset += copy_len;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_seed_reproduces_stream() {
        let mut a = PrepRng::new(SeedMode::Fixed(999));
        let mut b = PrepRng::new(SeedMode::Fixed(999));
        for _ in 0..16 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = PrepRng::new(SeedMode::Fixed(1));
        let mut b = PrepRng::new(SeedMode::Fixed(2));
        let first: Vec<u64> = (0..4).map(|_| a.next_u64()).collect();
        let second: Vec<u64> = (0..4).map(|_| b.next_u64()).collect();
        assert_ne!(first, second);
    }

    #[test]
    fn state_roundtrip_resumes_stream() {
        let mut a = PrepRng::new(SeedMode::Fixed(123));
        a.next_u64();
        let saved = a.state();
        let mut b = PrepRng::from_state(saved);
        assert_eq!(a.next_u64(), b.next_u64());
        assert_eq!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn fill_bytes_covers_partial_words() {
        let mut rng = PrepRng::new(SeedMode::Fixed(7));
        let mut buf = [0u8; 13];
        rng.fill_bytes(&mut buf);
        assert!(buf.iter().any(|byte| *byte != 0));
    }
}
