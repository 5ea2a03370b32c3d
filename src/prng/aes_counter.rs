//! AES counter-mode generator core.
//!
//! The counter block is encrypted to produce one cipher block of keystream;
//! the counter then increments big-endian with carry across its full width.
//! Output is served from a one-block buffer and the next counter value is
//! only encrypted once the buffer runs dry.
//!
//! # Design
//! - **Seed layout**: the leading bytes become the cipher key (largest
//!   supported AES size that fits), the remainder seeds the initial counter
//!   block. Valid lengths are 16 through `max_key_length_bytes() + 16`.
//! - **Merge reseeds**: `merge_seed` XORs incoming bytes into the live
//!   key/counter instead of replacing them. Resupplying an old seed can
//!   therefore never rewind the counter onto already-emitted keystream, and
//!   repeated reseeds with the same bytes after a state restore stay
//!   convergent.
//! - **Restore advance**: a deserialized core steps its counter once on
//!   first use, so a restored generator never re-emits output the original
//!   already produced.
//!
//! # Security
//! - Key and counter state are zeroized on drop; the `aes` crate zeroizes
//!   its round keys. `dump_state` only ever shows a key fingerprint.

use std::sync::OnceLock;

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use zeroize::Zeroize;

use crate::seed::{OsSeedSource, SeedSource};

use super::tracked::TrackedRng;
use super::{RandomCore, RngError};

/// Width of the counter block and of each keystream refill, in bytes.
pub const COUNTER_SIZE_BYTES: usize = 16;

/// Seed length used when a caller does not pick one: a 16-byte key plus a
/// fully seeded counter block.
pub const DEFAULT_SEED_SIZE_BYTES: usize = 32;

const MIN_SEED_SIZE_BYTES: usize = 16;

/// An entropy-tracked AES counter-mode generator.
pub type AesCounterRandom = TrackedRng<AesCtrCore>;

/// Largest AES key this environment supports, in bytes. Queried once and
/// cached for the life of the process.
pub fn max_key_length_bytes() -> usize {
    static MAX_KEY: OnceLock<usize> = OnceLock::new();
    // No runtime policy restricts key sizes here; every RustCrypto AES
    // variant is compiled in, so the probe resolves to AES-256.
    *MAX_KEY.get_or_init(|| 32)
}

enum AesCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl AesCipher {
    /// `key` must be 16, 24 or 32 bytes; seed validation upholds this.
    fn new(key: &[u8]) -> Self {
        match key.len() {
            16 => Self::Aes128(Aes128::new(GenericArray::from_slice(key))),
            24 => Self::Aes192(Aes192::new(GenericArray::from_slice(key))),
            32 => Self::Aes256(Aes256::new(GenericArray::from_slice(key))),
            n => unreachable!("unsupported AES key size {} slipped past validation", n),
        }
    }

    fn encrypt(&self, block: &mut [u8; COUNTER_SIZE_BYTES]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.encrypt_block(block),
            Self::Aes192(c) => c.encrypt_block(block),
            Self::Aes256(c) => c.encrypt_block(block),
        }
    }
}

/// Raw source: a block cipher run in counter mode.
pub struct AesCtrCore {
    cipher: AesCipher,
    key: Vec<u8>,
    counter: [u8; COUNTER_SIZE_BYTES],
    buffer: [u8; COUNTER_SIZE_BYTES],
    /// Next unread buffer byte; `COUNTER_SIZE_BYTES` means exhausted.
    cursor: usize,
    /// Set after deserialization; cleared by first use or by a reseed.
    advance_on_use: bool,
}

impl AesCtrCore {
    /// Builds a core from `seed`: leading bytes key the cipher, the rest
    /// seed the counter block.
    pub fn from_seed(seed: &[u8]) -> Result<Self, RngError> {
        validate_seed_length(seed, max_key_length_bytes() + COUNTER_SIZE_BYTES)?;
        let key_len = key_length_for(seed.len());
        let key = seed[..key_len].to_vec();
        let mut counter = [0u8; COUNTER_SIZE_BYTES];
        let rest = &seed[key_len..];
        counter[..rest.len()].copy_from_slice(rest);
        Ok(Self {
            cipher: AesCipher::new(&key),
            key,
            counter,
            buffer: [0u8; COUNTER_SIZE_BYTES],
            cursor: COUNTER_SIZE_BYTES,
            advance_on_use: false,
        })
    }

    fn refill(&mut self) {
        let mut block = self.counter;
        self.cipher.encrypt(&mut block);
        self.buffer = block;
        increment_counter(&mut self.counter);
        self.cursor = 0;
    }
}

impl Drop for AesCtrCore {
    fn drop(&mut self) {
        self.key.zeroize();
        self.counter.zeroize();
        self.buffer.zeroize();
    }
}

/// Picks the key width for a seed of `seed_len` bytes: the largest supported
/// AES size that leaves the remainder for the counter.
fn key_length_for(seed_len: usize) -> usize {
    let cap = max_key_length_bytes();
    if seed_len >= 32 {
        32.min(cap)
    } else if seed_len >= 24 {
        24.min(cap)
    } else {
        16
    }
}

fn validate_seed_length(seed: &[u8], max: usize) -> Result<(), RngError> {
    if seed.is_empty() {
        return Err(RngError::EmptySeed);
    }
    if seed.len() < MIN_SEED_SIZE_BYTES || seed.len() > max {
        return Err(RngError::InvalidSeed {
            len: seed.len(),
            min: MIN_SEED_SIZE_BYTES,
            max,
        });
    }
    Ok(())
}

/// Big-endian increment with carry across the whole block.
fn increment_counter(counter: &mut [u8; COUNTER_SIZE_BYTES]) {
    for byte in counter.iter_mut().rev() {
        let (incremented, carry) = byte.overflowing_add(1);
        *byte = incremented;
        if !carry {
            break;
        }
    }
}

impl RandomCore for AesCtrCore {
    fn name(&self) -> &'static str {
        "AesCounterRandom"
    }

    fn next_raw(&mut self) -> u64 {
        if self.advance_on_use {
            // First use since a state restore: step past everything the
            // originating instance may already have emitted.
            self.advance_on_use = false;
            increment_counter(&mut self.counter);
            self.cursor = COUNTER_SIZE_BYTES;
        }
        if self.cursor >= COUNTER_SIZE_BYTES {
            self.refill();
        }
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.buffer[self.cursor..self.cursor + 8]);
        self.cursor += 8;
        u64::from_be_bytes(word)
    }

    fn merge_seed(&mut self, seed: &[u8]) -> Result<(), RngError> {
        validate_seed_length(seed, self.key.len() + COUNTER_SIZE_BYTES)?;
        let split = seed.len().min(self.key.len());
        for (key_byte, seed_byte) in self.key.iter_mut().zip(&seed[..split]) {
            *key_byte ^= seed_byte;
        }
        for (ctr_byte, seed_byte) in self.counter.iter_mut().zip(&seed[split..]) {
            *ctr_byte ^= seed_byte;
        }
        self.cipher = AesCipher::new(&self.key);
        // Buffered output belongs to the pre-merge stream.
        self.cursor = COUNTER_SIZE_BYTES;
        self.advance_on_use = false;
        Ok(())
    }

    fn merge_seed_u64(&mut self, seed: u64) {
        for (key_byte, seed_byte) in self.key.iter_mut().zip(seed.to_be_bytes()) {
            *key_byte ^= seed_byte;
        }
        self.cipher = AesCipher::new(&self.key);
        self.cursor = COUNTER_SIZE_BYTES;
        self.advance_on_use = false;
    }

    fn new_seed_length(&self) -> usize {
        self.key.len() + COUNTER_SIZE_BYTES
    }

    fn max_state_bits(&self) -> i64 {
        8 * (self.key.len() + COUNTER_SIZE_BYTES) as i64
    }

    fn seed_snapshot(&self) -> Vec<u8> {
        let mut snapshot = self.key.clone();
        snapshot.extend_from_slice(&self.counter);
        snapshot
    }

    fn dump_state(&self) -> String {
        format!(
            "key#{}, ctr={}, cursor={}",
            &blake3::hash(&self.key).to_hex()[..16],
            hex::encode(self.counter),
            self.cursor
        )
    }
}

impl TrackedRng<AesCtrCore> {
    /// Builds a generator from an explicit seed; see [`AesCtrCore::from_seed`]
    /// for the layout and the accepted lengths.
    pub fn from_seed(seed: &[u8]) -> Result<Self, RngError> {
        let core = AesCtrCore::from_seed(seed)?;
        Ok(TrackedRng::new(core, seed.to_vec()))
    }

    /// Builds a generator from `length` bytes pulled out of `source`.
    pub fn with_seed_length(length: usize, source: &dyn SeedSource) -> Result<Self, RngError> {
        let seed = source.generate_seed(length)?;
        Self::from_seed(&seed)
    }

    /// Builds a generator seeded by the operating system.
    pub fn from_os_seed() -> Result<Self, RngError> {
        Self::with_seed_length(DEFAULT_SEED_SIZE_BYTES, &OsSeedSource::new())
    }

    /// Builds an OS-seeded generator, then folds in the caller's 64-bit
    /// value the same way `set_seed_u64` would.
    pub fn from_u64(seed: u64) -> Result<Self, RngError> {
        let rng = Self::from_os_seed()?;
        rng.set_seed_u64(seed);
        Ok(rng)
    }
}

impl rand_core::CryptoRng for &TrackedRng<AesCtrCore> {}

#[cfg(feature = "serde")]
mod serde_impls {
    use serde::de::{Deserialize, Deserializer, Error as DeError};
    use serde::ser::{Serialize, SerializeStruct, Serializer};

    use super::*;

    impl Serialize for AesCtrCore {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut st = serializer.serialize_struct("AesCtrCore", 4)?;
            st.serialize_field("key", &self.key)?;
            st.serialize_field("counter", &self.counter)?;
            st.serialize_field("buffer", &self.buffer)?;
            st.serialize_field("cursor", &self.cursor)?;
            st.end()
        }
    }

    #[derive(serde::Deserialize)]
    #[serde(rename = "AesCtrCore")]
    struct AesCtrState {
        key: Vec<u8>,
        counter: [u8; COUNTER_SIZE_BYTES],
        buffer: [u8; COUNTER_SIZE_BYTES],
        cursor: usize,
    }

    impl<'de> Deserialize<'de> for AesCtrCore {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let state = AesCtrState::deserialize(deserializer)?;
            if !matches!(state.key.len(), 16 | 24 | 32) {
                return Err(D::Error::custom(format!(
                    "unsupported AES key size {}",
                    state.key.len()
                )));
            }
            if state.cursor > COUNTER_SIZE_BYTES || state.cursor % 8 != 0 {
                return Err(D::Error::custom(format!(
                    "invalid buffer cursor {}",
                    state.cursor
                )));
            }
            Ok(AesCtrCore {
                cipher: AesCipher::new(&state.key),
                key: state.key,
                counter: state.counter,
                buffer: state.buffer,
                cursor: state.cursor,
                advance_on_use: true,
            })
        }
    }
}
