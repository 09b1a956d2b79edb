//! 128-bit identifiers for keys and sessions.
//!
//! Both are UUID-shaped: stored as a `u128`, rendered in the hyphenated
//! lowercase form, and written to the wire as 16 Big Endian bytes. Key
//! identifiers are random (version 4). Session identifiers are derived from
//! the KEM ciphertext that established the session (version 8), so both
//! parties compute the same value without transmitting it on cold start.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::errors::EnvelopeError;

/// Length of the hyphenated text form.
const TEXT_LEN: usize = 36;

/// Byte offsets of the hyphens in the text form.
const HYPHENS: [usize; 4] = [8, 13, 18, 23];

fn with_version(mut bytes: [u8; 16], version: u8) -> u128 {
    bytes[6] = (bytes[6] & 0x0F) | (version << 4);
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    u128::from_be_bytes(bytes)
}

fn format_uuid(value: u128, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let hex = hex::encode(value.to_be_bytes());
    write!(f, "{}-{}-{}-{}-{}", &hex[0..8], &hex[8..12], &hex[12..16], &hex[16..20], &hex[20..32])
}

fn parse_uuid(s: &str) -> Result<u128, EnvelopeError> {
    let invalid = || EnvelopeError::InvalidIdentifier(s.chars().take(TEXT_LEN).collect());

    if s.len() != TEXT_LEN || !s.is_ascii() {
        return Err(invalid());
    }
    if HYPHENS.iter().any(|&i| s.as_bytes()[i] != b'-') {
        return Err(invalid());
    }

    let digits: String = s.chars().filter(|c| *c != '-').collect();
    let mut bytes = [0u8; 16];
    hex::decode_to_slice(&digits, &mut bytes).map_err(|_| invalid())?;
    Ok(u128::from_be_bytes(bytes))
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u128);

        impl $name {
            /// Wrap a raw 128-bit value.
            pub const fn from_u128(value: u128) -> Self {
                Self(value)
            }

            /// Raw 128-bit value.
            pub const fn as_u128(self) -> u128 {
                self.0
            }

            /// Wire form (16 bytes, Big Endian).
            pub const fn to_bytes(self) -> [u8; 16] {
                self.0.to_be_bytes()
            }

            /// Parse the wire form.
            pub const fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(u128::from_be_bytes(bytes))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                format_uuid(self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(", stringify!($name))?;
                format_uuid(self.0, f)?;
                write!(f, ")")
            }
        }

        impl FromStr for $name {
            type Err = EnvelopeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_uuid(s).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                text.parse().map_err(de::Error::custom)
            }
        }
    };
}

uuid_id!(
    /// Identifies a long-term KEM keypair.
    KeyId
);

uuid_id!(
    /// Identifies an ephemeral session between two keys.
    SessionId
);

impl KeyId {
    /// Build a version-4 identifier from 16 random bytes.
    pub fn from_random_bytes(bytes: [u8; 16]) -> Self {
        Self(with_version(bytes, 4))
    }
}

impl SessionId {
    /// Build a version-8 identifier from the first 16 bytes of a digest.
    pub fn from_digest_prefix(bytes: [u8; 16]) -> Self {
        Self(with_version(bytes, 8))
    }
}
