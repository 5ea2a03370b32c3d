//! Entropy-accounting pseudorandom generation with autonomous reseeding.
//!
//! Every generator tracks how many bits of real randomness remain in its
//! state, stays safe under concurrent read and reseed, and can hand its
//! replenishment to a background seeder fed by an external seed source.

pub mod config;
pub mod entropy;
pub mod prng;
pub mod seed;
pub mod seeder;
