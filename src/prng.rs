use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro128PlusPlus;

pub struct DPrng(Xoshiro128PlusPlus);

impl DPrng {
    pub fn from_seed(seed: [u8; 16]) -> Self {
        Self(Xoshiro128PlusPlus::from_seed(seed))
    }
    pub fn next_u32(&mut self) -> u32 { self.0.next_u32() }
    pub fn next_i8(&mut self) -> i8 { self.0.next_u32() as i8 }

    /// int8 value in [-bound, bound], like the verification inputs use.
    pub fn next_i8_in(&mut self, bound: i8) -> i8 {
        let span = (2 * bound as i32 + 1) as u32;
        ((self.0.next_u32() % span) as i32 - bound as i32) as i8
    }

    /// Uniform f32 in [0, 1).
    pub fn next_unit_f32(&mut self) -> f32 {
        (self.0.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }
}

/// Derive a 128-bit seed from an epoch hash (32B) + nonce (4B)
pub fn derive_seed(epoch_hash_32: &[u8; 32], nonce: u32) -> [u8; 16] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(epoch_hash_32);
    hasher.update(&nonce.to_le_bytes());
    let out = hasher.finalize();
    let mut s = [0u8; 16];
    s.copy_from_slice(&out.as_bytes()[..16]);
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_seed_is_stable_and_nonce_sensitive() {
        let epoch = [0xaau8; 32];
        let s1 = derive_seed(&epoch, 7);
        let s2 = derive_seed(&epoch, 7);
        let s3 = derive_seed(&epoch, 8);
        assert_eq!(s1, s2);
        assert_ne!(s1, s3);
    }

    #[test]
    fn same_seed_same_stream() {
        let seed = derive_seed(&[1u8; 32], 1);
        let mut a = DPrng::from_seed(seed);
        let mut b = DPrng::from_seed(seed);
        for _ in 0..64 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn bounded_values_stay_in_range() {
        let mut pr = DPrng::from_seed(derive_seed(&[2u8; 32], 3));
        for _ in 0..1000 {
            let v = pr.next_i8_in(16);
            assert!((-16..=16).contains(&v));
            let u = pr.next_unit_f32();
            assert!((0.0..1.0).contains(&u));
        }
    }
}
