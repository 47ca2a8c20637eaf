//! Per-run shared secret.
//!
//! Generated once before anything listens, published only through the run
//! file, and compared in constant time on every request.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;

/// The secret clients must present. `Debug` and `Display` are redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(Arc<str>);

impl SharedSecret {
    /// Generate a random alphanumeric secret of `len` characters.
    pub fn generate(len: usize) -> Self {
        let value: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        Self(value.into())
    }

    /// Wrap an existing value (read back from a run file).
    pub fn from_value(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    /// Check a presented token without short-circuiting on the first mismatch.
    pub fn verify(&self, presented: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), presented.as_bytes())
    }

    /// The raw secret. Only the run file writer should need this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedSecret").field(&"<redacted>").finish()
    }
}

impl std::fmt::Display for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
