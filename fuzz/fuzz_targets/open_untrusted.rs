//! Fuzz target for opening modified envelopes
//!
//! Seals a real message, applies arbitrary byte edits to its wire form and
//! opens whatever still decodes.
//!
//! # Invariants
//!
//! - Opening never panics
//! - An envelope opens only if it is byte-identical to what was sealed
//! - A failed cold open leaves no session behind

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use veilpost_core::{Core, CoreConfig, SenderContext};
use veilpost_harness::SimEnv;
use veilpost_proto::EncryptedEnvelope;

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u64,
    plaintext: Vec<u8>,
    warm: bool,
    edits: Vec<Edit>,
}

#[derive(Debug, Arbitrary)]
enum Edit {
    Xor { offset: u16, mask: u8 },
    Truncate { len: u16 },
    Append { bytes: Vec<u8> },
}

fuzz_target!(|input: Input| {
    let sender = Core::new(SimEnv::with_seed(input.seed), CoreConfig::default());
    let receiver = Core::new(SimEnv::with_seed(input.seed ^ 1), CoreConfig::default());

    let alice = receiver.generate_keypair().expect("keygen");
    let bob = SenderContext { sender_key_id: sender.generate_keypair().expect("keygen").key_id() };

    let cold = sender.seal(&input.plaintext, &alice.public_identity(), &bob).expect("seal");
    let target = if input.warm {
        receiver.open(&cold, &alice).expect("cold open");
        sender.seal(&input.plaintext, &alice.public_identity(), &bob).expect("warm seal")
    } else {
        cold
    };

    let original = target.to_bytes().expect("encode");
    let mut bytes = original.clone();
    for edit in input.edits {
        match edit {
            Edit::Xor { offset, mask } => {
                if let Some(byte) = bytes.get_mut(usize::from(offset)) {
                    *byte ^= mask;
                }
            },
            Edit::Truncate { len } => bytes.truncate(usize::from(len)),
            Edit::Append { bytes: extra } => bytes.extend_from_slice(&extra),
        }
    }

    let Ok(envelope) = EncryptedEnvelope::decode(&bytes) else {
        return;
    };
    let sessions_before = receiver.sessions().len();

    match receiver.open(&envelope, &alice) {
        Ok(opened) => {
            assert_eq!(bytes, original, "modified envelope opened");
            assert_eq!(opened.plaintext.as_slice(), input.plaintext.as_slice());
        },
        Err(_) => assert_eq!(receiver.sessions().len(), sessions_before),
    }
});
