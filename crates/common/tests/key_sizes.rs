//! Integration tests for key sizes and wrapped-key lengths

mod common;

use ::common::bundle::KeyWrap;
use ::common::crypto::{wrap, KeyError, KeyPair, SECRET_SIZE};
use ::common::seal;

#[test]
fn test_wrapped_key_length_matches_modulus() {
    for (bits, seed) in [(2048usize, 20u64), (3072, 21), (4096, 22)] {
        let mut rng = common::rng(seed);
        let pair = KeyPair::generate(bits, &mut rng).unwrap();
        assert_eq!(pair.public.bits(), bits);
        assert_eq!(pair.public.size(), bits / 8);
        assert!(wrap::max_wrap_len(&pair.public) >= SECRET_SIZE);

        let bundle = seal::seal_with_rng(b"sized", &pair.public, &mut rng).unwrap();
        let KeyWrap::Rsa { data_key, auth_key } = bundle.key_wrap() else {
            panic!("expected an rsa bundle");
        };
        assert_eq!(data_key.len(), bits / 8);
        assert_eq!(auth_key.len(), bits / 8);
        assert_eq!(
            seal::open_with_rng(&bundle, &pair.private, &mut rng).unwrap(),
            b"sized"
        );
    }
}

#[test]
fn test_out_of_range_sizes_are_rejected() {
    let mut rng = common::rng(23);
    for bits in [512usize, 1024, 2047, 4097, 8192] {
        assert!(matches!(
            KeyPair::generate(bits, &mut rng),
            Err(KeyError::Generation(_))
        ));
    }
}

#[test]
fn test_der_round_trip_preserves_keys() {
    let pair = common::key_pair();
    let public_der = pair.public.to_der().unwrap();
    let private_der = pair.private.to_der().unwrap();

    let public = ::common::crypto::PublicKey::from_der(&public_der).unwrap();
    let private = ::common::crypto::PrivateKey::from_der(&private_der).unwrap();
    assert_eq!(public.to_der().unwrap(), public_der);
    assert_eq!(*private.to_der().unwrap(), *private_der);
    assert_eq!(private.public().fingerprint(), pair.public.fingerprint());
}
