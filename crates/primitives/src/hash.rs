use ripemd::{Digest as RipemdDigest, Ripemd160};
use sha2::Sha256;

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}

pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = sha256(data);
    let digest = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256d_differs_from_sha256() {
        let data = b"shroudd";
        assert_ne!(sha256(data), sha256d(data));
        assert_eq!(sha256d(data), sha256(&sha256(data)));
    }

    #[test]
    fn hash160_is_20_bytes_of_ripemd_sha() {
        let data = [0x02u8; 33];
        let expected = Ripemd160::digest(sha256(&data));
        assert_eq!(hash160(&data), expected[..]);
    }
}
