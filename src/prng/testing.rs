//! Deterministic raw core for unit tests.

use super::{RandomCore, RngError};

/// SplitMix64 core: fast, deterministic, 64-bit state. Statistical quality
/// is good enough to exercise the distribution algorithms, and the tiny
/// state makes entropy-cap behavior easy to assert.
pub(crate) struct SplitMixCore {
    state: u64,
}

impl SplitMixCore {
    pub(crate) fn new(state: u64) -> Self {
        Self { state }
    }
}

impl RandomCore for SplitMixCore {
    fn name(&self) -> &'static str {
        "SplitMix64"
    }

    fn next_raw(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    fn merge_seed(&mut self, seed: &[u8]) -> Result<(), RngError> {
        if seed.is_empty() {
            return Err(RngError::EmptySeed);
        }
        let mut word = [0u8; 8];
        let take = seed.len().min(8);
        word[..take].copy_from_slice(&seed[..take]);
        self.state ^= u64::from_be_bytes(word);
        Ok(())
    }

    fn merge_seed_u64(&mut self, seed: u64) {
        self.state ^= seed;
    }

    fn new_seed_length(&self) -> usize {
        8
    }

    fn max_state_bits(&self) -> i64 {
        64
    }

    fn seed_snapshot(&self) -> Vec<u8> {
        self.state.to_be_bytes().to_vec()
    }

    fn dump_state(&self) -> String {
        format!("state={:016x}", self.state)
    }
}
