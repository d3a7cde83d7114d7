//! Property tests for the cipher box and metadata codec.
//!
//! Runs over arbitrary passwords and payloads, including empty ones.

use std::collections::HashSet;

use ccfs_crypto::codec::{decode, encode, escape_for_url, unescape_transport};
use ccfs_crypto::{derive_key, CipherBox, CryptoError, MIN_SEALED_LEN};
use proptest::prelude::*;

proptest! {
    #[test]
    fn seal_open_roundtrip(password in proptest::collection::vec(any::<u8>(), 0..64),
                           message in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let cbox = CipherBox::from_key(&derive_key(&password));
        let sealed = cbox.seal(&message).unwrap();
        prop_assert_eq!(sealed.len(), message.len() + MIN_SEALED_LEN);
        prop_assert_eq!(cbox.open(&sealed).unwrap(), message);
    }

    #[test]
    fn single_bit_flip_is_detected(message in proptest::collection::vec(any::<u8>(), 0..256),
                                   bit in any::<prop::sample::Index>()) {
        let cbox = CipherBox::from_key(&derive_key(b"tamper"));
        let mut sealed = cbox.seal(&message).unwrap();
        let i = bit.index(sealed.len() * 8);
        sealed[i / 8] ^= 1 << (i % 8);
        prop_assert_eq!(cbox.open(&sealed), Err(CryptoError::Authentication));
    }

    #[test]
    fn wrong_password_fails(p1 in "[ -~]{0,32}", p2 in "[ -~]{0,32}",
                            message in proptest::collection::vec(any::<u8>(), 0..256)) {
        prop_assume!(p1 != p2);
        let sealed = CipherBox::from_key(&derive_key(p1.as_bytes())).seal(&message).unwrap();
        let other = CipherBox::from_key(&derive_key(p2.as_bytes()));
        prop_assert_eq!(other.open(&sealed), Err(CryptoError::Authentication));
    }

    #[test]
    fn codec_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let text = encode(&data);
        prop_assert_eq!(decode(&text).unwrap(), data.clone());

        // One layer of URL escaping must survive unchanged.
        let unescaped = unescape_transport(&escape_for_url(&text)).unwrap();
        prop_assert_eq!(&unescaped, &text);
        prop_assert_eq!(decode(&unescaped).unwrap(), data);
    }
}

#[test]
fn every_bit_flip_of_small_blob_is_detected() {
    let cbox = CipherBox::from_key(&derive_key(b"exhaustive"));
    let sealed = cbox.seal(b"report.pdf").unwrap();

    for i in 0..sealed.len() * 8 {
        let mut tampered = sealed.clone();
        tampered[i / 8] ^= 1 << (i % 8);
        assert_eq!(
            cbox.open(&tampered),
            Err(CryptoError::Authentication),
            "flip of bit {i} went unnoticed"
        );
    }
}

#[test]
fn nonce_uniqueness_over_10k_seals() {
    let cbox = CipherBox::from_key(&derive_key(b"nonce"));
    let mut seen = HashSet::with_capacity(10_000);

    for _ in 0..10_000 {
        let sealed = cbox.seal(b"same message").unwrap();
        assert!(seen.insert(sealed), "two seals produced identical output");
    }
}
