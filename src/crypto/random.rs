//! Entropy source
//!
//! Cookies and salts must come from a cryptographically secure generator.
//! A failure to obtain randomness is reported as `AuthError::Entropy` and
//! aborts whatever handshake asked for it; it is never retried.

use crate::error::{AuthError, Result};

/// Random number generator trait - the platform provides the implementation
pub trait RandomSource: Send {
    /// Fill buffer with random bytes
    fn fill_bytes(&mut self, buf: &mut [u8]) -> Result<()>;
}

/// Operating system CSPRNG via `getrandom`
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        getrandom::getrandom(buf)?;
        Ok(())
    }
}

/// Fill a fixed-size array and sanity check the output
///
/// Detects obvious RNG failures (every byte identical, e.g. all zeros).
pub fn random_array<const N: usize>(rng: &mut dyn RandomSource) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    rng.fill_bytes(&mut out)?;

    if N >= 8 && out.iter().all(|&b| b == out[0]) {
        log::error!("❌ CRITICAL: RNG returned {} identical bytes!", N);
        return Err(AuthError::Entropy(format!(
            "RNG output is a constant 0x{:02x} pattern",
            out[0]
        )));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StuckRng;

    impl RandomSource for StuckRng {
        fn fill_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
            buf.fill(0);
            Ok(())
        }
    }

    struct BrokenRng;

    impl RandomSource for BrokenRng {
        fn fill_bytes(&mut self, _buf: &mut [u8]) -> Result<()> {
            Err(AuthError::Entropy("device unavailable".into()))
        }
    }

    #[test]
    fn test_os_random_produces_distinct_outputs() {
        let mut rng = OsRandom;
        let a: [u8; 16] = random_array(&mut rng).unwrap();
        let b: [u8; 16] = random_array(&mut rng).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_stuck_rng_detected() {
        let err = random_array::<16>(&mut StuckRng).unwrap_err();
        assert!(matches!(err, AuthError::Entropy(_)));
    }

    #[test]
    fn test_rng_failure_propagates() {
        let err = random_array::<8>(&mut BrokenRng).unwrap_err();
        assert!(err.is_fatal());
    }
}
