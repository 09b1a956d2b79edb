//! Node runtime tests against the real system environment.

use std::sync::Arc;

use veilpost_core::{CoreError, SenderContext};
use veilpost_node::{
    EnvelopeFormat, EnvelopeSummary, Node, NodeConfig, NodeError, decode_envelope,
    encode_envelope, load_keypair, load_public_identity, save_keypair,
};

fn config() -> NodeConfig {
    NodeConfig { workers: 2, ..NodeConfig::default() }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn seal_then_open_through_key_files() {
    let dir = tempfile::tempdir().unwrap();
    let node = Node::start(config());

    let alice = node.generate_keypair().await.unwrap();
    let bob = node.generate_keypair().await.unwrap();
    let alice_files = save_keypair(&alice, &dir.path().join("alice")).unwrap();
    let bob_files = save_keypair(&bob, &dir.path().join("bob")).unwrap();

    let recipient = load_public_identity(&alice_files.public).unwrap();
    let sender = SenderContext::for_keypair(&load_keypair(&bob_files.secret).unwrap());

    let envelope = node.seal(b"over the wire".to_vec(), recipient, sender).await.unwrap();
    assert!(envelope.is_cold_start());

    for format in [EnvelopeFormat::Json, EnvelopeFormat::Binary] {
        let bytes = encode_envelope(&envelope, format).unwrap();
        let decoded = decode_envelope(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    // A separate node has no sessions, as a separate process would.
    let receiver = Node::start(config());
    let opened = receiver
        .open(envelope, Arc::new(load_keypair(&alice_files.secret).unwrap()))
        .await
        .unwrap();
    assert_eq!(opened.plaintext.as_slice(), b"over the wire");
    assert_eq!(opened.sender_key_id, bob.key_id());
    assert!(opened.cold_start);
    assert!(!opened.stale);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_seal_reuses_session() {
    let node = Node::start(config());
    let alice = Arc::new(node.generate_keypair().await.unwrap());
    let bob = node.generate_keypair().await.unwrap();
    let sender = SenderContext::for_keypair(&bob);

    let first = node.seal(b"one".to_vec(), alice.public_identity(), sender).await.unwrap();
    let second = node.seal(b"two".to_vec(), alice.public_identity(), sender).await.unwrap();
    assert!(first.is_cold_start());
    assert!(!second.is_cold_start());

    let receiver = Node::start(config());
    receiver.open(first, Arc::clone(&alice)).await.unwrap();
    let opened = receiver.open(second.clone(), Arc::clone(&alice)).await.unwrap();
    assert_eq!(opened.plaintext.as_slice(), b"two");
    assert!(!opened.cold_start);

    let summary = EnvelopeSummary::of(&second);
    assert_eq!(summary.key_exchange, "warm");
    assert_eq!(summary.session_id, Some(opened.session_id));
    assert_eq!(summary.content_len, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn warm_envelope_without_session_is_rejected() {
    let node = Node::start(config());
    let alice = Arc::new(node.generate_keypair().await.unwrap());
    let sender = SenderContext::for_keypair(&node.generate_keypair().await.unwrap());

    node.seal(b"one".to_vec(), alice.public_identity(), sender).await.unwrap();
    let warm = node.seal(b"two".to_vec(), alice.public_identity(), sender).await.unwrap();

    let fresh = Node::start(config());
    let err = fresh.open(warm, alice).await.unwrap_err();
    assert!(matches!(err, NodeError::Core(CoreError::SessionNotFound { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_destroys_sessions_and_refuses_work() {
    let mut node = Node::start(config());
    let alice = node.generate_keypair().await.unwrap();
    let sender = SenderContext::for_keypair(&alice);

    node.seal(b"hi".to_vec(), alice.public_identity(), sender).await.unwrap();
    assert_eq!(node.core().sessions().len(), 1);

    node.shutdown();
    node.shutdown();
    assert!(node.is_shut_down());
    assert!(node.core().sessions().is_empty());

    let err = node.seal(b"late".to_vec(), alice.public_identity(), sender).await.unwrap_err();
    assert!(matches!(err, NodeError::ShutDown));
}
