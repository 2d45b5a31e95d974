//! Integration tests for sealing and opening from many threads at once

mod common;

use std::thread;

use ::common::seal;

#[test]
fn test_concurrent_seal_and_open() {
    let pair = common::key_pair();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                scope.spawn(move || {
                    let mut rng = common::rng(100 + i);
                    let payload = common::payload(1000 + i as usize);
                    let bundle = seal::seal_with_rng(&payload, &pair.public, &mut rng).unwrap();
                    let opened = seal::open_with_rng(&bundle, &pair.private, &mut rng).unwrap();
                    assert_eq!(opened, payload);
                    *bundle.nonce()
                })
            })
            .collect();

        let nonces: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for (i, a) in nonces.iter().enumerate() {
            for b in &nonces[i + 1..] {
                assert_ne!(a, b);
            }
        }
    });
}
