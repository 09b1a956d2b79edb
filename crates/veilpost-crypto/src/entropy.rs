//! Sanity check for caller-supplied randomness.
//!
//! This catches a broken RNG (zero-filled buffer, stuck output), not a weak
//! one. It runs on every seed and coin before they reach a primitive.

use crate::error::CryptoError;

/// Reject buffers that cannot have come from a working CSPRNG.
///
/// # Errors
///
/// - `Entropy` if the buffer is empty, all zero, or one repeated byte
pub fn check_entropy(bytes: &[u8]) -> Result<(), CryptoError> {
    let Some((&first, rest)) = bytes.split_first() else {
        return Err(CryptoError::Entropy { reason: "empty random buffer" });
    };

    if first == 0 && rest.iter().all(|&b| b == 0) {
        return Err(CryptoError::Entropy { reason: "random buffer is all zero" });
    }

    if rest.iter().all(|&b| b == first) {
        return Err(CryptoError::Entropy { reason: "random buffer is constant" });
    }

    Ok(())
}
