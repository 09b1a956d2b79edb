//! End-to-end messaging scenarios through the simulated relay.
//!
//! Every scenario ends by checking the relay against the standard invariants:
//! whatever happened, the relay held ciphertext and routing data only.

use std::time::Duration;

use veilpost_core::{CoreConfig, CoreError, SessionConfig, TransportError};
use veilpost_harness::{EntropyFault, InvariantRegistry, RelayFault, SendError, SimWorld};

const ALICE: usize = 0;
const BOB: usize = 1;
const CAROL: usize = 2;

fn config(lifetime_secs: u64, max_messages: u64) -> CoreConfig {
    CoreConfig::with_session(SessionConfig {
        lifetime: Duration::from_secs(lifetime_secs),
        max_messages_per_session: max_messages,
        sweep_interval: Duration::from_secs(10),
    })
}

fn world(seed: u64) -> SimWorld {
    SimWorld::with_parties(seed, config(3600, 1000), 3).unwrap()
}

fn assert_invariants(world: &SimWorld, context: &str) {
    InvariantRegistry::standard().assert_all(&world.snapshot(), context);
}

#[test]
fn bob_says_hello_then_reuses_the_session() {
    let mut world = world(1);

    let first = world.send(BOB, ALICE, b"hello").unwrap();
    assert!(first.cold_start, "first message carries the KEM ciphertext");

    let inbox = world.deliver(ALICE);
    assert_eq!(inbox.plaintexts(), vec![b"hello".to_vec()]);
    assert!(inbox.opened[0].cold_start);
    assert_eq!(inbox.opened[0].sender_key_id, world.party(BOB).keypair().key_id());
    let session_id = inbox.opened[0].session_id;

    let second = world.send(BOB, ALICE, b"how are you").unwrap();
    assert!(!second.cold_start);
    assert_eq!(second.session_id, Some(session_id));

    let inbox = world.deliver(ALICE);
    assert_eq!(inbox.plaintexts(), vec![b"how are you".to_vec()]);
    assert!(!inbox.opened[0].cold_start);
    assert!(inbox.rejected.is_empty());

    assert_invariants(&world, "after hello");
}

#[test]
fn each_direction_and_pair_has_its_own_session() {
    let mut world = world(2);

    world.send(BOB, ALICE, b"from bob").unwrap();
    world.send(ALICE, BOB, b"from alice").unwrap();
    world.send(CAROL, ALICE, b"from carol").unwrap();

    let alice_inbox = world.deliver(ALICE);
    let bob_inbox = world.deliver(BOB);
    assert_eq!(alice_inbox.opened.len(), 2);
    assert_eq!(bob_inbox.opened.len(), 1);

    let mut ids = vec![
        alice_inbox.opened[0].session_id,
        alice_inbox.opened[1].session_id,
        bob_inbox.opened[0].session_id,
    ];
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);

    for round in 0..5u8 {
        world.send(BOB, ALICE, &[b'b', round]).unwrap();
        world.send(ALICE, BOB, &[b'a', round]).unwrap();
    }
    assert_eq!(world.deliver(ALICE).opened.len(), 5);
    assert_eq!(world.deliver(BOB).opened.len(), 5);

    assert_invariants(&world, "after conversation");
}

#[test]
fn expired_receiver_session_falls_back_to_cold_start() {
    let mut world = SimWorld::with_parties(3, config(3600, 1000), 2).unwrap();

    world.send(BOB, ALICE, b"first").unwrap();
    assert_eq!(world.deliver(ALICE).opened.len(), 1);

    world.env().advance(Duration::from_secs(3500));
    let late = world.send(BOB, ALICE, b"second").unwrap();
    assert!(!late.cold_start, "sender session still live");

    world.env().advance(Duration::from_secs(200));
    let inbox = world.deliver(ALICE);
    assert!(inbox.opened.is_empty(), "expired session must not yield plaintext");
    let (_, err) = &inbox.rejected[0];
    assert!(matches!(err, CoreError::SessionNotFound { .. }));
    assert!(err.is_recoverable());

    world.party(BOB).reset_session(world.party(ALICE));
    let retry = world.send(BOB, ALICE, b"second").unwrap();
    assert!(retry.cold_start);
    assert_eq!(world.deliver(ALICE).plaintexts(), vec![b"second".to_vec()]);

    assert_invariants(&world, "after fallback");
}

#[test]
fn sender_rotates_after_lifetime() {
    let mut world = SimWorld::with_parties(4, config(60, 1000), 2).unwrap();

    let first = world.send(BOB, ALICE, b"one").unwrap();
    world.env().advance(Duration::from_secs(59));
    assert!(!world.send(BOB, ALICE, b"two").unwrap().cold_start);

    world.env().advance(Duration::from_secs(1));
    let rotated = world.send(BOB, ALICE, b"three").unwrap();
    assert!(first.cold_start && rotated.cold_start);

    let inbox = world.deliver(ALICE);
    assert_eq!(inbox.opened.len(), 3);
    assert_ne!(inbox.opened[0].session_id, inbox.opened[2].session_id);
}

#[test]
fn sender_rotates_at_message_cap() {
    let mut world = SimWorld::with_parties(5, config(3600, 3), 2).unwrap();

    let cold: Vec<bool> =
        (0..7u8).map(|i| world.send(BOB, ALICE, &[i]).unwrap().cold_start).collect();
    assert_eq!(cold, vec![true, false, false, true, false, false, true]);

    let inbox = world.deliver(ALICE);
    assert_eq!(inbox.opened.len(), 7);
    assert!(inbox.rejected.is_empty());
}

#[test]
fn old_envelopes_open_with_stale_flag() {
    let mut world = SimWorld::with_parties(6, config(3600, 1000), 2).unwrap();

    world.send(BOB, ALICE, b"sent yesterday").unwrap();
    world.env().advance(Duration::from_secs(25 * 3600));
    world.send(BOB, ALICE, b"sent today").unwrap();

    let inbox = world.deliver(ALICE);
    let stale: Vec<bool> = inbox.opened.iter().map(|opened| opened.stale).collect();
    assert_eq!(stale, vec![true, false]);
}

#[test]
fn corrupted_delivery_fails_authentication() {
    let mut world = world(7);
    world.send(BOB, ALICE, b"first").unwrap();
    world.deliver(ALICE);

    world.send(BOB, ALICE, b"a payload of reasonable length").unwrap();
    // Last byte belongs to the encrypted content.
    world.relay().inject_fault(RelayFault::FlipBit { offset: usize::MAX, bit: 0 });

    let inbox = world.deliver(ALICE);
    assert!(inbox.opened.is_empty());
    assert_eq!(inbox.rejected.len(), 1);
    assert_eq!(inbox.rejected[0].1, CoreError::Authentication);

    assert_invariants(&world, "after corruption");
}

#[test]
fn truncated_delivery_is_discarded() {
    let mut world = world(8);
    world.send(BOB, ALICE, b"will be cut").unwrap();
    world.relay().inject_fault(RelayFault::Truncate { len: 40 });

    let inbox = world.deliver(ALICE);
    assert_eq!(inbox.discarded, 1);
    assert!(inbox.opened.is_empty() && inbox.rejected.is_empty());
}

#[test]
fn lost_cold_envelope_leaves_warm_ones_unopenable() {
    let mut world = world(9);
    world.send(BOB, ALICE, b"lost").unwrap();
    world.send(BOB, ALICE, b"orphan").unwrap();
    world.relay().inject_fault(RelayFault::Drop);

    let inbox = world.deliver(ALICE);
    assert!(inbox.opened.is_empty());
    assert!(matches!(inbox.rejected[0].1, CoreError::SessionNotFound { .. }));
}

#[test]
fn entropy_failure_sends_nothing() {
    let mut world = world(10);

    world.env().inject_entropy_fault(EntropyFault::Unavailable);
    let err = world.send(BOB, ALICE, b"never sealed").unwrap_err();
    assert!(matches!(err, SendError::Core(CoreError::Entropy { .. })));

    world.env().inject_entropy_fault(EntropyFault::Constant(0x5A));
    let err = world.send(BOB, ALICE, b"never sealed").unwrap_err();
    assert!(matches!(err, SendError::Core(CoreError::Entropy { .. })));

    assert_eq!(world.relay().stored_count(), 0);
    assert!(world.party(BOB).core().sessions().is_empty());

    world.env().inject_entropy_fault(EntropyFault::Healthy);
    assert!(world.send(BOB, ALICE, b"sealed").unwrap().cold_start);
}

#[test]
fn degenerate_nonce_aborts_warm_seal() {
    let mut world = world(11);
    world.send(BOB, ALICE, b"cold").unwrap();

    world.env().inject_entropy_fault(EntropyFault::Constant(0));
    let err = world.send(BOB, ALICE, b"warm").unwrap_err();
    assert!(matches!(err, SendError::Core(CoreError::Entropy { .. })));
    assert_eq!(world.relay().stored_count(), 1);
}

#[test]
fn relay_refusal_surfaces_to_sender() {
    let mut world = world(12);
    world.relay().mark_unreachable(world.party(ALICE).account_id());

    let err = world.send(BOB, ALICE, b"undeliverable").unwrap_err();
    assert!(matches!(err, SendError::Transport(TransportError::Rejected { .. })));

    world.relay().set_available(false);
    let err = world.send(BOB, CAROL, b"offline").unwrap_err();
    assert!(matches!(err, SendError::Transport(TransportError::Unavailable { .. })));
}

#[test]
fn shutdown_destroys_sessions_and_forces_cold_starts() {
    let mut world = world(13);
    world.send(BOB, ALICE, b"one").unwrap();
    world.deliver(ALICE);
    world.send(BOB, ALICE, b"two").unwrap();

    world.party(ALICE).core().sessions().shutdown();
    assert!(world.party(ALICE).core().sessions().is_empty());

    let inbox = world.deliver(ALICE);
    assert!(matches!(inbox.rejected[0].1, CoreError::SessionNotFound { .. }));

    world.party(BOB).reset_session(world.party(ALICE));
    world.send(BOB, ALICE, b"three").unwrap();
    let inbox = world.deliver(ALICE);
    assert_eq!(inbox.plaintexts(), vec![b"three".to_vec()]);
    assert!(world.party(ALICE).core().sessions().is_empty(), "nothing cached after shutdown");
}

#[test]
fn relay_holds_no_plaintext_or_keys_after_busy_traffic() {
    let mut world = world(14);
    let long = b"a message long enough for the plaintext probe".to_vec();

    for i in 0..20u8 {
        let mut message = long.clone();
        message.push(i);
        world.send(usize::from(i % 3), usize::from((i + 1) % 3), &message).unwrap();
        if i % 4 == 0 {
            world.env().advance(Duration::from_secs(900));
        }
    }
    for party in 0..3 {
        world.deliver(party);
    }

    assert_eq!(world.relay().stored_count(), 20);
    assert_invariants(&world, "after busy traffic");
}
