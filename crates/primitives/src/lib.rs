pub mod base58;
pub mod encoding;
pub mod hash;
pub mod hex;
pub mod wif;

pub use base58::{base58_decode, base58_encode, base58check_decode, base58check_encode, Base58Error};
pub use encoding::{DecodeError, Decoder, Encoder};
pub use hash::{hash160, sha256, sha256d};
pub use hex::{hex_decode, hex_encode, is_hex};
pub use wif::{secret_key_to_wif, wif_to_secret_key};
