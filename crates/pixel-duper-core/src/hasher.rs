use std::hash::Hasher as _;
use twox_hash::XxHash32;

/// XxHash32 with seed 0, used for store bucket keys and pixel-content hashes.
pub fn hash_data(data: &[u8]) -> u32 {
    let mut hasher = XxHash32::with_seed(0);
    hasher.write(data);
    hasher.finish() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash_data(b"/A/B.PNG"), hash_data(b"/A/B.PNG"));
        assert_ne!(hash_data(b"/A/B.PNG"), hash_data(b"/A/C.PNG"));
        // Reference value for the empty input with seed 0.
        assert_eq!(hash_data(b""), 0x02CC_5D05);
    }
}
