//! Encrypted credential storage.
//!
//! The credentials file holds one record per line:
//!
//! ```text
//! user@hostPattern:base64(nonce ‖ tag ‖ ciphertext)
//! ```
//!
//! Passwords are encrypted with AES-256 in EAX mode using a 16-byte random
//! nonce and a 16-byte authentication tag. The master key is raw bytes of at
//! most 32 bytes, right-padded with `0x00` to 32 bytes. The padding is not a
//! key derivation; it only keeps existing records decryptable.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use aes::Aes256;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use eax::Eax;
use eax::aead::generic_array::GenericArray;
use eax::aead::{AeadInPlace, KeyInit};
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::{GroupSpec, expand_tilde};
use crate::error::{CredentialsError, CryptoError};

/// AES-256 key size.
pub const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 16;
const TAG_SIZE: usize = 16;

/// Replacement text for secrets in any echoed result.
pub const REDACTED: &str = "********";

/// A string that never shows up in debug output or serialized results.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the plain value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn redacted() -> Self {
        Self(REDACTED.to_string())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Secret)
    }
}

/// Symmetric key used to encrypt and decrypt stored passwords.
#[derive(Clone)]
pub struct MasterKey([u8; KEY_SIZE]);

impl MasterKey {
    /// Builds a key from raw bytes, padding with `0x00` up to 32 bytes.
    pub fn new(raw: &[u8]) -> Result<Self, CredentialsError> {
        if raw.len() > KEY_SIZE {
            return Err(CredentialsError::KeyTooLong(raw.len()));
        }
        let mut key = [0u8; KEY_SIZE];
        key[..raw.len()].copy_from_slice(raw);
        Ok(Self(key))
    }

    /// Builds a key from a value that is either a key file path or the key itself.
    ///
    /// An existing file contributes its first line, right-trimmed.
    pub fn from_source(source: &str) -> Result<Self, CredentialsError> {
        let path = expand_tilde(Path::new(source));
        if path.is_file() {
            let content = std::fs::read_to_string(&path)
                .map_err(|source| CredentialsError::Io { path, source })?;
            let first = content.lines().next().unwrap_or_default().trim_end();
            return Self::new(first.as_bytes());
        }
        Self::new(source.as_bytes())
    }

    /// The padded 32-byte key.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    fn cipher(&self) -> Eax<Aes256> {
        Eax::<Aes256>::new(GenericArray::from_slice(&self.0))
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MasterKey").field(&REDACTED).finish()
    }
}

/// Encrypts a password and returns `base64(nonce ‖ tag ‖ ciphertext)`.
///
/// A fresh random nonce is drawn for every call.
pub fn encrypt_pass(password: &str, key: &MasterKey) -> Result<String, CryptoError> {
    let nonce: [u8; NONCE_SIZE] = rand::random();
    let mut buffer = password.as_bytes().to_vec();
    let tag = key
        .cipher()
        .encrypt_in_place_detached(GenericArray::from_slice(&nonce), b"", &mut buffer)
        .map_err(|_| CryptoError::Verification)?;

    let mut encrypted = Vec::with_capacity(NONCE_SIZE + TAG_SIZE + buffer.len());
    encrypted.extend_from_slice(&nonce);
    encrypted.extend_from_slice(&tag);
    encrypted.extend_from_slice(&buffer);
    Ok(BASE64.encode(encrypted))
}

/// Decodes and decrypts a stored password, verifying its authentication tag.
pub fn decrypt_pass(encrypted_pass: &str, key: &MasterKey) -> Result<String, CryptoError> {
    let decoded = BASE64.decode(encrypted_pass.trim())?;
    if decoded.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Truncated(decoded.len()));
    }

    let (nonce, rest) = decoded.split_at(NONCE_SIZE);
    let (tag, ciphertext) = rest.split_at(TAG_SIZE);
    let mut buffer = ciphertext.to_vec();
    key.cipher()
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            b"",
            &mut buffer,
            GenericArray::from_slice(tag),
        )
        .map_err(|_| CryptoError::Verification)?;

    Ok(String::from_utf8(buffer)?)
}

/// One line of the credentials file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub user: String,
    /// Exact host name, or a pattern when it contains `*`.
    pub host_pattern: String,
    pub encrypted_pass: String,
}

impl CredentialRecord {
    /// Parses `user@hostPattern:encrypted_pass`.
    fn parse(line: &str) -> Option<Self> {
        let (identity, encrypted_pass) = line.rsplit_once(':')?;
        let (user, host_pattern) = identity.split_once('@')?;
        if user.is_empty() || host_pattern.is_empty() || encrypted_pass.trim().is_empty() {
            return None;
        }
        Some(Self {
            user: user.to_string(),
            host_pattern: host_pattern.to_string(),
            encrypted_pass: encrypted_pass.trim().to_string(),
        })
    }

    /// Whether the host pattern is matched as a regular expression.
    pub fn is_wildcard(&self) -> bool {
        self.host_pattern.contains('*')
    }

    /// Decrypts the stored password.
    pub fn decrypt(&self, key: &MasterKey) -> Result<String, CryptoError> {
        decrypt_pass(&self.encrypted_pass, key)
    }

    fn to_line(&self) -> String {
        format!("{}@{}:{}", self.user, self.host_pattern, self.encrypted_pass)
    }
}

/// Host segment of a raw credentials line, used for exact comparisons.
fn host_segment(line: &str) -> Option<&str> {
    let (identity, _) = line.rsplit_once(':')?;
    identity.split_once('@').map(|(_, host)| host)
}

/// Credentials resolved for one concrete host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCredentials {
    pub user: String,
    pub host: String,
    pub encrypted_pass: Secret,
    pub pass: Secret,
}

impl ResolvedCredentials {
    /// Replaces both secrets with [`REDACTED`].
    pub fn redact(&mut self) {
        self.encrypted_pass = Secret::redacted();
        self.pass = Secret::redacted();
    }
}

/// Credentials attached to a host: a complete record or the absent sentinel.
///
/// Serialized as the record object, or `false` when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    #[default]
    Absent,
    Present(ResolvedCredentials),
}

impl Credentials {
    pub fn is_absent(&self) -> bool {
        matches!(self, Credentials::Absent)
    }

    /// Redacts secrets in place; the absent sentinel is left untouched.
    pub fn redact(&mut self) {
        if let Credentials::Present(credentials) = self {
            credentials.redact();
        }
    }
}

impl Serialize for Credentials {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Credentials::Absent => serializer.serialize_bool(false),
            Credentials::Present(credentials) => credentials.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Credentials {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Record(ResolvedCredentials),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Flag(_) => Credentials::Absent,
            Repr::Record(credentials) => Credentials::Present(credentials),
        })
    }
}

/// Outcome of [`CredentialVault::upsert_entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryChange {
    Added,
    Replaced,
}

/// The credentials file, loaded once and read-only during a run.
#[derive(Debug, Clone)]
pub struct CredentialVault {
    path: PathBuf,
    records: Vec<CredentialRecord>,
}

impl CredentialVault {
    /// Reads all records from the credentials file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CredentialsError> {
        let path = expand_tilde(path.as_ref());
        let content = std::fs::read_to_string(&path).map_err(|source| CredentialsError::Io {
            path: path.clone(),
            source,
        })?;
        let records = parse_records(&content)?;
        debug!(
            "Loaded {} credential records from {}",
            records.len(),
            path.display()
        );
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[CredentialRecord] {
        &self.records
    }

    /// Finds the record for `host`.
    ///
    /// An exact host match wins in file order. Otherwise patterns containing
    /// `*` are compiled as regular expressions anchored at the start, and the
    /// first one matching `host` is returned.
    pub fn lookup_by_host(&self, host: &str) -> Result<Option<&CredentialRecord>, CredentialsError> {
        if let Some(record) = self.records.iter().find(|r| r.host_pattern == host) {
            return Ok(Some(record));
        }

        for record in self.records.iter().filter(|r| r.is_wildcard()) {
            let matcher = Regex::new(&format!("^(?:{})", record.host_pattern)).map_err(|source| {
                CredentialsError::InvalidPattern {
                    pattern: record.host_pattern.clone(),
                    source,
                }
            })?;
            if matcher.is_match(host) {
                debug!("{} matched credentials pattern {}", host, record.host_pattern);
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    /// Looks up and decrypts the credentials for `host`.
    pub fn resolve(&self, host: &str, key: &MasterKey) -> Result<Credentials, CredentialsError> {
        let Some(record) = self.lookup_by_host(host)? else {
            return Ok(Credentials::Absent);
        };
        let pass = record.decrypt(key).map_err(|source| CredentialsError::Crypto {
            host: host.to_string(),
            source,
        })?;
        Ok(Credentials::Present(ResolvedCredentials {
            user: record.user.clone(),
            host: host.to_string(),
            encrypted_pass: Secret::new(record.encrypted_pass.clone()),
            pass: Secret::new(pass),
        }))
    }

    /// Attaches credentials to every host of every group.
    ///
    /// Any decryption failure aborts the whole operation.
    pub fn attach(&self, groups: &mut [GroupSpec], key: &MasterKey) -> Result<(), CredentialsError> {
        for group in groups.iter_mut() {
            for host in group.hosts.iter_mut() {
                host.credentials = self.resolve(&host.host, key)?;
                if host.credentials.is_absent() {
                    warn!("No credentials found for {}", host.host);
                }
            }
        }
        Ok(())
    }

    /// Returns `user@host` of the first record whose host segment equals `host`.
    pub fn entry_exists(&self, host: &str) -> Option<String> {
        self.records
            .iter()
            .find(|r| r.host_pattern == host)
            .map(|r| format!("{}@{}", r.user, r.host_pattern))
    }

    /// Appends a new record to the credentials file.
    pub fn add_entry(
        &mut self,
        user: &str,
        host: &str,
        password: &str,
        key: &MasterKey,
    ) -> Result<CredentialRecord, CredentialsError> {
        let record = self.new_record(user, host, password, key)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        file.lock().map_err(|source| self.io_error(source))?;
        writeln!(file, "{}", record.to_line()).map_err(|source| self.io_error(source))?;

        self.records.push(record.clone());
        debug!("Added credentials entry {}@{}", user, host);
        Ok(record)
    }

    /// Rewrites the credentials file, replacing every line whose host segment
    /// equals `host` and keeping all other lines in place.
    pub fn override_entry(
        &mut self,
        user: &str,
        host: &str,
        password: &str,
        key: &MasterKey,
    ) -> Result<CredentialRecord, CredentialsError> {
        let record = self.new_record(user, host, password, key)?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        file.lock().map_err(|source| self.io_error(source))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|source| self.io_error(source))?;

        let mut rewritten = String::with_capacity(content.len());
        for line in content.lines() {
            if host_segment(line) == Some(host) {
                rewritten.push_str(&record.to_line());
            } else {
                rewritten.push_str(line);
            }
            rewritten.push('\n');
        }

        rewrite(&mut file, &rewritten).map_err(|source| self.io_error(source))?;
        self.records = parse_records(&rewritten)?;
        debug!("Replaced credentials entry for {}", host);
        Ok(record)
    }

    /// Replaces an existing exact entry for `host`, or appends a new one.
    pub fn upsert_entry(
        &mut self,
        user: &str,
        host: &str,
        password: &str,
        key: &MasterKey,
    ) -> Result<EntryChange, CredentialsError> {
        if self.entry_exists(host).is_some() {
            self.override_entry(user, host, password, key)?;
            Ok(EntryChange::Replaced)
        } else {
            self.add_entry(user, host, password, key)?;
            Ok(EntryChange::Added)
        }
    }

    fn new_record(
        &self,
        user: &str,
        host: &str,
        password: &str,
        key: &MasterKey,
    ) -> Result<CredentialRecord, CredentialsError> {
        Ok(CredentialRecord {
            user: user.to_string(),
            host_pattern: host.to_string(),
            encrypted_pass: encrypt_pass(password, key).map_err(CredentialsError::Encrypt)?,
        })
    }

    fn io_error(&self, source: std::io::Error) -> CredentialsError {
        CredentialsError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn parse_records(content: &str) -> Result<Vec<CredentialRecord>, CredentialsError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            CredentialRecord::parse(line).ok_or(CredentialsError::MalformedLine(idx + 1))
        })
        .collect()
}

fn rewrite(file: &mut File, content: &str) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(content.as_bytes())?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> MasterKey {
        MasterKey::new(raw.as_bytes()).expect("valid master key")
    }

    fn vault_with(lines: &[String]) -> (tempfile::TempDir, CredentialVault) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("credentials");
        let mut content = lines.join("\n");
        content.push('\n');
        std::fs::write(&path, content).expect("write credentials");
        let vault = CredentialVault::load(&path).expect("load credentials");
        (dir, vault)
    }

    #[test]
    fn encrypt_then_decrypt_returns_password() {
        for raw in ["", "k", "correct horse battery staple", "0123456789abcdef0123456789abcdef"] {
            let key = key(raw);
            for password in ["", "secret", "pässwörd with spaces", "a:b@c*"] {
                let encrypted = encrypt_pass(password, &key).expect("encrypt");
                assert_eq!(decrypt_pass(&encrypted, &key).expect("decrypt"), password);
            }
        }
    }

    #[test]
    fn encrypted_layout_is_nonce_tag_ciphertext() {
        let encrypted = encrypt_pass("secret", &key("master")).expect("encrypt");
        let decoded = BASE64.decode(encrypted).expect("base64");
        assert_eq!(decoded.len(), NONCE_SIZE + TAG_SIZE + "secret".len());
    }

    #[test]
    fn every_encryption_uses_a_fresh_nonce() {
        let key = key("master");
        let first = encrypt_pass("secret", &key).expect("encrypt");
        let second = encrypt_pass("secret", &key).expect("encrypt");
        assert_ne!(first, second);
    }

    #[test]
    fn wrong_key_fails_verification() {
        let encrypted = encrypt_pass("secret", &key("right")).expect("encrypt");
        assert!(matches!(
            decrypt_pass(&encrypted, &key("wrong")),
            Err(CryptoError::Verification)
        ));
    }

    #[test]
    fn tampered_record_fails_verification() {
        let key = key("master");
        let encrypted = encrypt_pass("secret", &key).expect("encrypt");
        let decoded = BASE64.decode(encrypted).expect("base64");

        for index in [0, NONCE_SIZE, decoded.len() - 1] {
            let mut tampered = decoded.clone();
            tampered[index] ^= 0x01;
            assert!(matches!(
                decrypt_pass(&BASE64.encode(&tampered), &key),
                Err(CryptoError::Verification)
            ));
        }
    }

    #[test]
    fn truncated_record_is_rejected() {
        let short = BASE64.encode([0u8; 20]);
        assert!(matches!(
            decrypt_pass(&short, &key("master")),
            Err(CryptoError::Truncated(20))
        ));
    }

    #[test]
    fn master_key_is_null_padded_and_bounded() {
        let key = key("abc");
        assert_eq!(&key.as_bytes()[..3], b"abc");
        assert!(key.as_bytes()[3..].iter().all(|b| *b == 0));

        assert!(MasterKey::new(&[b'x'; 32]).is_ok());
        assert!(matches!(
            MasterKey::new(&[b'x'; 33]),
            Err(CredentialsError::KeyTooLong(33))
        ));
    }

    #[test]
    fn master_key_source_reads_first_line_of_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("masterkey");
        std::fs::write(&path, "from-file  \nignored\n").expect("write key");

        let from_file = MasterKey::from_source(path.to_str().expect("utf-8 path")).expect("key");
        assert_eq!(from_file.as_bytes(), key("from-file").as_bytes());

        let literal = MasterKey::from_source("literal-key").expect("key");
        assert_eq!(literal.as_bytes(), key("literal-key").as_bytes());
    }

    #[test]
    fn wildcard_pattern_matches_prefix_only() {
        let key = key("master");
        let pass = encrypt_pass("pw", &key).expect("encrypt");
        let (_dir, vault) = vault_with(&[format!("admin@sw-*:{pass}")]);

        let record = vault.lookup_by_host("sw-12").expect("lookup").expect("match");
        assert_eq!(record.user, "admin");
        assert!(vault.lookup_by_host("other-sw").expect("lookup").is_none());
    }

    #[test]
    fn exact_match_wins_over_earlier_wildcard() {
        let key = key("master");
        let pass = encrypt_pass("pw", &key).expect("encrypt");
        let (_dir, vault) = vault_with(&[
            format!("wild@sw-*:{pass}"),
            format!("exact@sw-12:{pass}"),
        ]);

        let record = vault.lookup_by_host("sw-12").expect("lookup").expect("match");
        assert_eq!(record.user, "exact");
        let record = vault.lookup_by_host("sw-13").expect("lookup").expect("match");
        assert_eq!(record.user, "wild");
    }

    #[test]
    fn invalid_wildcard_pattern_is_an_error() {
        let (_dir, vault) = vault_with(&["admin@*sw:AAAA".to_string()]);
        assert!(matches!(
            vault.lookup_by_host("sw-1"),
            Err(CredentialsError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn malformed_line_is_reported_with_line_number() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("credentials");
        std::fs::write(&path, "admin@sw-1:AAAA\nnot a record\n").expect("write");

        assert!(matches!(
            CredentialVault::load(&path),
            Err(CredentialsError::MalformedLine(2))
        ));
    }

    #[test]
    fn resolve_decrypts_or_returns_absent() {
        let key = key("master");
        let pass = encrypt_pass("s3cret", &key).expect("encrypt");
        let (_dir, vault) = vault_with(&[format!("admin@sw-01:{pass}")]);

        match vault.resolve("sw-01", &key).expect("resolve") {
            Credentials::Present(credentials) => {
                assert_eq!(credentials.user, "admin");
                assert_eq!(credentials.host, "sw-01");
                assert_eq!(credentials.pass.expose(), "s3cret");
            }
            Credentials::Absent => panic!("credentials should be present"),
        }
        assert!(vault.resolve("sw-02", &key).expect("resolve").is_absent());
    }

    #[test]
    fn resolve_with_wrong_key_is_fatal() {
        let pass = encrypt_pass("s3cret", &key("master")).expect("encrypt");
        let (_dir, vault) = vault_with(&[format!("admin@sw-01:{pass}")]);

        assert!(matches!(
            vault.resolve("sw-01", &key("other")),
            Err(CredentialsError::Crypto { .. })
        ));
    }

    #[test]
    fn add_entry_appends_a_line() {
        let key = key("master");
        let pass = encrypt_pass("pw", &key).expect("encrypt");
        let (_dir, mut vault) = vault_with(&[format!("admin@sw-01:{pass}")]);

        vault.add_entry("ops", "sw-02", "new", &key).expect("add");

        let reloaded = CredentialVault::load(vault.path()).expect("reload");
        assert_eq!(reloaded.records().len(), 2);
        assert_eq!(reloaded.records()[1].user, "ops");
        assert_eq!(reloaded.records()[1].decrypt(&key).expect("decrypt"), "new");
    }

    #[test]
    fn override_entry_replaces_exact_host_and_keeps_order() {
        let key = key("master");
        let pass = encrypt_pass("pw", &key).expect("encrypt");
        let (_dir, mut vault) = vault_with(&[
            format!("a@sw-*:{pass}"),
            format!("b@sw-01:{pass}"),
            format!("c@sw-02:{pass}"),
        ]);

        vault.override_entry("z", "sw-01", "changed", &key).expect("override");

        let reloaded = CredentialVault::load(vault.path()).expect("reload");
        let users: Vec<_> = reloaded.records().iter().map(|r| r.user.as_str()).collect();
        assert_eq!(users, vec!["a", "z", "c"]);
        assert_eq!(reloaded.records()[1].decrypt(&key).expect("decrypt"), "changed");
        assert_eq!(reloaded.records()[0].host_pattern, "sw-*");
    }

    #[test]
    fn upsert_chooses_between_add_and_override() {
        let key = key("master");
        let (_dir, mut vault) = vault_with(&[]);

        assert_eq!(
            vault.upsert_entry("admin", "sw-01", "one", &key).expect("upsert"),
            EntryChange::Added
        );
        assert_eq!(vault.entry_exists("sw-01").as_deref(), Some("admin@sw-01"));
        assert_eq!(
            vault.upsert_entry("admin", "sw-01", "two", &key).expect("upsert"),
            EntryChange::Replaced
        );
        assert_eq!(vault.records().len(), 1);
        assert_eq!(vault.records()[0].decrypt(&key).expect("decrypt"), "two");
    }

    #[test]
    fn absent_credentials_serialize_as_false() {
        assert_eq!(
            serde_json::to_value(Credentials::Absent).expect("json"),
            serde_json::json!(false)
        );
        let parsed: Credentials = serde_json::from_value(serde_json::json!(false)).expect("parse");
        assert!(parsed.is_absent());
    }

    #[test]
    fn secrets_never_serialize_in_clear() {
        let credentials = Credentials::Present(ResolvedCredentials {
            user: "admin".to_string(),
            host: "sw-01".to_string(),
            encrypted_pass: Secret::new("ZW5jcnlwdGVk"),
            pass: Secret::new("s3cret"),
        });

        let json = serde_json::to_string(&credentials).expect("json");
        assert!(!json.contains("s3cret"));
        assert!(!json.contains("ZW5jcnlwdGVk"));
        assert!(!format!("{credentials:?}").contains("s3cret"));
    }
}
