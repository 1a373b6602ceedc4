//! Client-to-server payload masking (RFC 6455 Section 5.3).

/// XOR `data` in place with the 4-byte masking key.
///
/// Applying the same key twice restores the original data.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    let key = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ key;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }
    for (byte, k) in chunks.into_remainder().iter_mut().zip(mask) {
        *byte ^= k;
    }
}

/// Produces a fresh masking key per outgoing frame.
///
/// Seeded from the OS random source once, then advanced with a cheap mixer.
#[derive(Debug)]
pub struct MaskGenerator {
    state: u32,
}

impl MaskGenerator {
    /// Create a generator seeded from `getrandom`, falling back to the clock.
    #[must_use]
    pub fn new() -> Self {
        let mut seed = [0u8; 4];
        let state = if getrandom::getrandom(&mut seed).is_ok() {
            u32::from_le_bytes(seed)
        } else {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.subsec_nanos())
                .unwrap_or(0x1234_5678)
        };
        Self { state }
    }

    /// Next masking key.
    pub fn next_mask(&mut self) -> [u8; 4] {
        self.state = self.state.wrapping_add(0x9E37_79B9);
        let mut x = self.state.wrapping_mul(0x85EB_CA6B);
        x ^= x >> 13;
        x.wrapping_mul(0xC2B2_AE35).to_le_bytes()
    }
}

impl Default for MaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}
