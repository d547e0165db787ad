//! Common utilities shared by the binaries and the test-suite.
//!
//! - **`generators`**: seeded constructors for the symmetric, diagonally dominant
//!   test problems Davidson is designed for. Dense matrices come with a random
//!   symmetric perturbation of strength `eps` around a chosen diagonal.

pub mod generators;
