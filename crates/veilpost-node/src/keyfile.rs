//! JSON key files.
//!
//! `keygen` writes two files: `<name>.pub.json` with the key id and public
//! key (safe to publish) and `<name>.key.json` with the full keypair
//! (readable by the owner only on Unix). Key bytes are base64, standard
//! alphabet.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use veilpost_core::{KeyId, KeyPair, PublicIdentity};
use veilpost_crypto::{PUBLIC_KEY_SIZE, PublicKey, SECRET_KEY_SIZE, SecretKey};
use zeroize::Zeroizing;

use crate::error::NodeError;

const KEY_FILE_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PublicKeyFile {
    version: u8,
    key_id: KeyId,
    public_key: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SecretKeyFile {
    version: u8,
    key_id: KeyId,
    created_at: i64,
    public_key: String,
    secret_key: String,
}

impl Drop for SecretKeyFile {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.secret_key);
    }
}

/// Paths written by [`save_keypair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFilePaths {
    /// Publishable identity
    pub public: PathBuf,
    /// Full keypair
    pub secret: PathBuf,
}

impl KeyFilePaths {
    /// Paths for the key named `base`.
    pub fn for_base(base: &Path) -> Self {
        let with_suffix = |suffix: &str| {
            let mut name = base.as_os_str().to_owned();
            name.push(suffix);
            PathBuf::from(name)
        };
        Self { public: with_suffix(".pub.json"), secret: with_suffix(".key.json") }
    }
}

fn decode_key(path: &Path, field: &str, text: &str, expected: usize) -> Result<Zeroizing<Vec<u8>>, NodeError> {
    let bytes = Zeroizing::new(
        STANDARD.decode(text).map_err(|_| NodeError::key_file(path, format!("{field} is not base64")))?,
    );
    if bytes.len() != expected {
        return Err(NodeError::key_file(
            path,
            format!("{field} has {} bytes, expected {expected}", bytes.len()),
        ));
    }
    Ok(bytes)
}

fn check_version(path: &Path, version: u8) -> Result<(), NodeError> {
    if version == KEY_FILE_VERSION {
        Ok(())
    } else {
        Err(NodeError::key_file(path, format!("unsupported version {version}")))
    }
}

fn write_secret(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)?.write_all(contents)
}

/// Write both key files for `keypair` next to `base`.
pub fn save_keypair(keypair: &KeyPair, base: &Path) -> Result<KeyFilePaths, NodeError> {
    let paths = KeyFilePaths::for_base(base);
    let public_key = STANDARD.encode(keypair.public_key().as_bytes());

    let public = PublicKeyFile {
        version: KEY_FILE_VERSION,
        key_id: keypair.key_id(),
        public_key: public_key.clone(),
    };
    let secret = SecretKeyFile {
        version: KEY_FILE_VERSION,
        key_id: keypair.key_id(),
        created_at: keypair.created_at_millis(),
        public_key,
        secret_key: STANDARD.encode(keypair.secret_key().as_bytes()),
    };

    let public_json = serde_json::to_vec_pretty(&public)
        .map_err(|e| NodeError::key_file(&paths.public, e.to_string()))?;
    let secret_json = Zeroizing::new(
        serde_json::to_vec_pretty(&secret)
            .map_err(|e| NodeError::key_file(&paths.secret, e.to_string()))?,
    );

    fs::write(&paths.public, public_json)?;
    write_secret(&paths.secret, &secret_json)?;

    tracing::debug!(key_id = %keypair.key_id(), path = %paths.public.display(), "wrote key files");
    Ok(paths)
}

/// Read a publishable identity.
pub fn load_public_identity(path: &Path) -> Result<PublicIdentity, NodeError> {
    let text = fs::read_to_string(path)?;
    let file: PublicKeyFile =
        serde_json::from_str(&text).map_err(|e| NodeError::key_file(path, e.to_string()))?;
    check_version(path, file.version)?;

    let public_key = decode_key(path, "publicKey", &file.public_key, PUBLIC_KEY_SIZE)?;
    Ok(PublicIdentity { key_id: file.key_id, public_key: public_key.to_vec() })
}

/// Read a full keypair.
pub fn load_keypair(path: &Path) -> Result<KeyPair, NodeError> {
    let text = Zeroizing::new(fs::read_to_string(path)?);
    let file: SecretKeyFile =
        serde_json::from_str(&text).map_err(|e| NodeError::key_file(path, e.to_string()))?;
    check_version(path, file.version)?;

    let public_bytes = decode_key(path, "publicKey", &file.public_key, PUBLIC_KEY_SIZE)?;
    let secret_bytes = decode_key(path, "secretKey", &file.secret_key, SECRET_KEY_SIZE)?;

    let public_key = PublicKey::from_slice(&public_bytes)
        .map_err(|e| NodeError::key_file(path, e.to_string()))?;
    let secret_key = SecretKey::from_slice(&secret_bytes)
        .map_err(|e| NodeError::key_file(path, e.to_string()))?;

    Ok(KeyPair::from_parts(file.key_id, public_key, secret_key, file.created_at))
}

#[cfg(test)]
mod tests {
    use veilpost_core::{Core, CoreConfig};

    use super::*;
    use crate::system_env::SystemEnv;

    fn keypair() -> KeyPair {
        Core::new(SystemEnv::new(), CoreConfig::default()).generate_keypair().unwrap()
    }

    #[test]
    fn keypair_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let original = keypair();

        let paths = save_keypair(&original, &dir.path().join("alice")).unwrap();
        assert!(paths.public.ends_with("alice.pub.json"));

        let loaded = load_keypair(&paths.secret).unwrap();
        assert_eq!(loaded.key_id(), original.key_id());
        assert_eq!(loaded.created_at_millis(), original.created_at_millis());
        assert_eq!(loaded.public_key().as_bytes(), original.public_key().as_bytes());
        assert_eq!(loaded.secret_key().as_bytes(), original.secret_key().as_bytes());

        assert_eq!(load_public_identity(&paths.public).unwrap(), original.public_identity());
    }

    #[test]
    fn public_file_holds_no_secret() {
        let dir = tempfile::tempdir().unwrap();
        let pair = keypair();
        let paths = save_keypair(&pair, &dir.path().join("bob")).unwrap();

        let text = fs::read_to_string(&paths.public).unwrap();
        assert!(!text.contains("secretKey"));
        assert!(!text.contains(&STANDARD.encode(&pair.secret_key().as_bytes()[..48])));
    }

    #[cfg(unix)]
    #[test]
    fn secret_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let paths = save_keypair(&keypair(), &dir.path().join("carol")).unwrap();
        let mode = fs::metadata(&paths.secret).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn wrong_length_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.pub.json");
        fs::write(
            &path,
            format!(
                r#"{{"version":1,"keyId":"{}","publicKey":"{}"}}"#,
                KeyId::from_u128(7),
                STANDARD.encode([1u8; 32])
            ),
        )
        .unwrap();

        let err = load_public_identity(&path).unwrap_err();
        assert!(matches!(err, NodeError::KeyFile { .. }));
        assert!(err.to_string().contains("publicKey has 32 bytes"));
    }
}
