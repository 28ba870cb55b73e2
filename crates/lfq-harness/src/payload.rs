use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// A `len`-character string drawn uniformly from `[0-9A-Za-z]`.
pub fn random_string<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Deterministic when seeded, entropy-seeded otherwise.
pub fn payload_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_have_fixed_length_and_charset() {
        let mut rng = payload_rng(Some(1));
        for _ in 0..100 {
            let s = random_string(&mut rng, 128);
            assert_eq!(s.len(), 128);
            assert!(s.bytes().all(|b| b.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn seeded_streams_repeat() {
        let mut a = payload_rng(Some(99));
        let mut b = payload_rng(Some(99));
        assert_eq!(random_string(&mut a, 32), random_string(&mut b, 32));
    }
}
