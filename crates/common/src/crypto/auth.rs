//! HMAC-SHA256 tags over ciphertext
//!
//! Tags are computed over the nonce and ciphertext, never the plaintext
//! (encrypt-then-MAC). Verification
//! recomputes the tag and compares in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::secret::{AuthKey, Tag, TAG_SIZE};

type HmacSha256 = Hmac<Sha256>;

fn keyed(key: &AuthKey, parts: &[&[u8]]) -> HmacSha256 {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
        .expect("HMAC accepts keys of any length");
    for part in parts {
        mac.update(part);
    }
    mac
}

/// Tag the concatenation of `parts` without copying them together
pub fn tag_parts(key: &AuthKey, parts: &[&[u8]]) -> Tag {
    let mut out = [0u8; TAG_SIZE];
    out.copy_from_slice(&keyed(key, parts).finalize().into_bytes());
    Tag::from(out)
}

/// Compute the tag of `ciphertext` under `key`
pub fn tag(key: &AuthKey, ciphertext: &[u8]) -> Tag {
    tag_parts(key, &[ciphertext])
}

/// Check `candidate` against the tag of the concatenated `parts`
///
/// The comparison runs in constant time with respect to where a mismatch
/// occurs. A candidate of the wrong length never verifies.
pub fn verify_parts(key: &AuthKey, parts: &[&[u8]], candidate: &[u8]) -> bool {
    keyed(key, parts).verify_slice(candidate).is_ok()
}

/// Check `candidate` against the tag of `ciphertext`
pub fn verify(key: &AuthKey, ciphertext: &[u8], candidate: &Tag) -> bool {
    verify_parts(key, &[ciphertext], candidate.as_bytes())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::secret::SECRET_SIZE;

    #[test]
    fn test_tag_is_deterministic() {
        let key = AuthKey::from([3u8; SECRET_SIZE]);
        let data = b"some ciphertext bytes";
        let first = tag(&key, data);
        for _ in 0..10 {
            assert_eq!(tag(&key, data), first);
        }
    }

    #[test]
    fn test_hmac_sha256_known_answer() {
        // RFC 4231 test case 2 uses a short key, so pad to our fixed size:
        // HMAC zero-pads keys internally, making this equivalent.
        let mut key = [0u8; SECRET_SIZE];
        key[..4].copy_from_slice(b"Jefe");
        let key = AuthKey::from(key);
        let expected =
            hex::decode("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
                .unwrap();
        assert_eq!(
            tag(&key, b"what do ya want for nothing?").as_bytes().as_slice(),
            expected.as_slice()
        );
    }

    #[test]
    fn test_single_bit_changes_tag() {
        let key = AuthKey::from([3u8; SECRET_SIZE]);
        let data = vec![0u8; 64];
        let original = tag(&key, &data);

        for bit in [0usize, 7, 100, 511] {
            let mut flipped = data.clone();
            flipped[bit / 8] ^= 1 << (bit % 8);
            assert_ne!(tag(&key, &flipped), original);
        }

        let mut other_key = [3u8; SECRET_SIZE];
        other_key[31] ^= 0x80;
        assert_ne!(tag(&AuthKey::from(other_key), &data), original);
    }

    #[test]
    fn test_verify() {
        let key = AuthKey::from([1u8; SECRET_SIZE]);
        let data: &[u8] = b"ciphertext";
        let good = tag(&key, data);
        assert!(verify(&key, data, &good));

        let mut bad = *good.as_bytes();
        bad[TAG_SIZE - 1] ^= 0x01;
        assert!(!verify(&key, data, &Tag::from(bad)));
        assert!(!verify(&key, b"ciphertexT", &good));
        assert!(!verify_parts(&key, &[data], &good.as_bytes()[..16]));
    }

    #[test]
    fn test_parts_equal_concatenation() {
        let key = AuthKey::from([8u8; SECRET_SIZE]);
        let whole = tag(&key, b"noncebytes-and-ciphertext");
        let split = tag_parts(&key, &[&b"noncebytes"[..], &b"-and-"[..], &b"ciphertext"[..]]);
        assert_eq!(whole, split);
        assert!(verify_parts(
            &key,
            &[&b"noncebytes-"[..], &b"and-ciphertext"[..]],
            whole.as_bytes()
        ));
    }
}
