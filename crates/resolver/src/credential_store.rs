//! Credential DB (spec.md §6): `credentials(site_id PK, site_name UNIQUE,
//! url, encrypted_username, encrypted_password)`, encrypted with a
//! per-host key. The key itself lives in the OS keychain where one is
//! available, falling back to an owner-only-permission file at
//! `~/.surfari/key_string` on headless hosts — mirroring the two storage
//! paths spec.md §6 names explicitly.
//!
//! Connections are opened per operation and closed (spec.md §5: "single-
//! writer; connections are opened per operation and closed").

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use nav_domain::credential::SiteCredential;
use nav_domain::error::{Error, Result};
use rand::RngCore;
use rusqlite::{params, Connection};

const KEYCHAIN_SERVICE: &str = "nav-agent";
const KEYCHAIN_ACCOUNT: &str = "credential-db-key";
const NONCE_LEN: usize = 12;

pub struct CredentialStore {
    db_path: PathBuf,
    key: [u8; 32],
}

impl CredentialStore {
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let key = load_or_create_key()?;
        let conn = Connection::open(&db_path).map_err(sqlite_err)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS credentials (
                site_id INTEGER PRIMARY KEY,
                site_name TEXT UNIQUE NOT NULL,
                url TEXT NOT NULL,
                encrypted_username BLOB NOT NULL,
                encrypted_password BLOB NOT NULL
            )",
            [],
        )
        .map_err(sqlite_err)?;
        Ok(Self { db_path, key })
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key))
    }

    fn encrypt(&self, plaintext: &str) -> Vec<u8> {
        let cipher = self.cipher();
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let mut ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .expect("AES-GCM encryption of a bounded plaintext cannot fail");
        let mut out = nonce_bytes.to_vec();
        out.append(&mut ciphertext);
        out
    }

    fn decrypt(&self, blob: &[u8]) -> Result<String> {
        if blob.len() < NONCE_LEN {
            return Err(Error::Other("credential ciphertext too short".into()));
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher()
            .decrypt(nonce, ciphertext)
            .map_err(|e| Error::Other(format!("credential decryption failed: {e}")))?;
        String::from_utf8(plaintext).map_err(|e| Error::Other(format!("credential is not UTF-8: {e}")))
    }

    pub fn upsert(&self, site_id: i64, site_name: &str, url: &str, username: &str, password: &str) -> Result<()> {
        let conn = Connection::open(&self.db_path).map_err(sqlite_err)?;
        conn.execute(
            "INSERT INTO credentials (site_id, site_name, url, encrypted_username, encrypted_password)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(site_name) DO UPDATE SET
               url = excluded.url,
               encrypted_username = excluded.encrypted_username,
               encrypted_password = excluded.encrypted_password",
            params![site_id, site_name, url, self.encrypt(username), self.encrypt(password)],
        )
        .map_err(sqlite_err)?;
        Ok(())
    }

    pub fn find_by_site_name(&self, site_name: &str) -> Result<Option<SiteCredential>> {
        let conn = Connection::open(&self.db_path).map_err(sqlite_err)?;
        let mut stmt = conn
            .prepare("SELECT site_id, site_name, url, encrypted_username, encrypted_password FROM credentials WHERE site_name = ?1")
            .map_err(sqlite_err)?;
        let mut rows = stmt
            .query_map(params![site_name], |row| {
                Ok(SiteCredential {
                    site_id: row.get(0)?,
                    site_name: row.get(1)?,
                    url: row.get(2)?,
                    username_enc: row.get(3)?,
                    password_enc: row.get(4)?,
                })
            })
            .map_err(sqlite_err)?;
        match rows.next() {
            Some(row) => Ok(Some(row.map_err(sqlite_err)?)),
            None => Ok(None),
        }
    }

    /// Decrypt a stored credential's username/password pair on demand
    /// (spec.md §3: "Decrypted only on demand via the process key").
    pub fn decrypt_credential(&self, cred: &SiteCredential) -> Result<(String, String)> {
        Ok((self.decrypt(&cred.username_enc)?, self.decrypt(&cred.password_enc)?))
    }
}

fn sqlite_err(e: rusqlite::Error) -> Error {
    Error::Sqlite(e.to_string())
}

fn load_or_create_key() -> Result<[u8; 32]> {
    if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT) {
        if let Ok(encoded) = entry.get_password() {
            if let Ok(key) = decode_key(&encoded) {
                return Ok(key);
            }
        }
        let fresh = random_key();
        if entry.set_password(&encode_key(&fresh)).is_ok() {
            return Ok(fresh);
        }
    }
    load_or_create_key_file()
}

fn load_or_create_key_file() -> Result<[u8; 32]> {
    let path = key_file_path()?;
    if let Ok(contents) = fs::read_to_string(&path) {
        if let Ok(key) = decode_key(contents.trim()) {
            return Ok(key);
        }
    }

    let fresh = random_key();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(&path)?;
    file.write_all(encode_key(&fresh).as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    Ok(fresh)
}

fn key_file_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| Error::Other("no home directory for key file".into()))?;
    Ok(home.join(".surfari").join("key_string"))
}

fn random_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

fn encode_key(key: &[u8; 32]) -> String {
    base64::engine::general_purpose::STANDARD.encode(key)
}

fn decode_key(encoded: &str) -> std::result::Result<[u8; 32], ()> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim()).map_err(|_| ())?;
    bytes.try_into().map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CredentialStore {
        let key = random_key();
        let db_path = tempfile_path();
        CredentialStore { db_path, key }
            .with_schema()
            .expect("schema init")
    }

    impl CredentialStore {
        fn with_schema(self) -> Result<Self> {
            let conn = Connection::open(&self.db_path).map_err(sqlite_err)?;
            conn.execute(
                "CREATE TABLE IF NOT EXISTS credentials (
                    site_id INTEGER PRIMARY KEY,
                    site_name TEXT UNIQUE NOT NULL,
                    url TEXT NOT NULL,
                    encrypted_username BLOB NOT NULL,
                    encrypted_password BLOB NOT NULL
                )",
                [],
            )
            .map_err(sqlite_err)?;
            Ok(self)
        }
    }

    fn tempfile_path() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("nav-agent-cred-test-{}.db", uuid_like()));
        p
    }

    fn uuid_like() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64
    }

    #[test]
    fn upsert_then_decrypt_round_trips() {
        let store = store();
        store.upsert(1, "Acme", "https://acme.test", "alice", "hunter2").unwrap();
        let cred = store.find_by_site_name("Acme").unwrap().unwrap();
        let (user, pass) = store.decrypt_credential(&cred).unwrap();
        assert_eq!(user, "alice");
        assert_eq!(pass, "hunter2");
    }

    #[test]
    fn upsert_replaces_existing_row_for_same_site_name() {
        let store = store();
        store.upsert(1, "Acme", "https://acme.test", "alice", "old").unwrap();
        store.upsert(1, "Acme", "https://acme.test", "alice", "new").unwrap();
        let cred = store.find_by_site_name("Acme").unwrap().unwrap();
        let (_, pass) = store.decrypt_credential(&cred).unwrap();
        assert_eq!(pass, "new");
    }

    #[test]
    fn unknown_site_name_returns_none() {
        let store = store();
        assert!(store.find_by_site_name("Nope").unwrap().is_none());
    }
}
