//! SQLite-backed credential store
//!
//! Hostnames and ids stay in clear text so records can be looked up while
//! usernames and passwords are encrypted per field under the DEK.

use crate::crypto::{
    cipher::{decrypt_to_string, encrypt_string, DataEncryptionKey, EncryptedField},
    CryptoError, KeyHierarchy, StoreKey, WrappedKey,
};
use crate::storage::{
    schema::{Database, CURRENT_SCHEMA_VERSION},
    LoginStore, Result, StorageError, StoredCredential,
};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "SELECT id, hostname, username, password, form_submit_url, http_realm,
        times_used, time_created, time_last_used, time_password_changed FROM logins";

/// Row as read from SQLite, before field decryption
struct RawRow {
    id: String,
    hostname: String,
    username: Vec<u8>,
    password: Vec<u8>,
    form_submit_url: Option<String>,
    http_realm: Option<String>,
    times_used: i64,
    time_created: i64,
    time_last_used: i64,
    time_password_changed: i64,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            hostname: row.get(1)?,
            username: row.get(2)?,
            password: row.get(3)?,
            form_submit_url: row.get(4)?,
            http_realm: row.get(5)?,
            times_used: row.get(6)?,
            time_created: row.get(7)?,
            time_last_used: row.get(8)?,
            time_password_changed: row.get(9)?,
        })
    }

    fn decrypt(self, dek: &DataEncryptionKey) -> Result<StoredCredential> {
        Ok(StoredCredential {
            id: self.id,
            hostname: self.hostname,
            username: decrypt_field(dek, &self.username)?,
            password: decrypt_field(dek, &self.password)?,
            form_submit_url: self.form_submit_url,
            http_realm: self.http_realm,
            times_used: self.times_used,
            time_created: self.time_created,
            time_last_used: self.time_last_used,
            time_password_changed: self.time_password_changed,
        })
    }
}

/// Credential store persisted in a SQLite database
pub struct SqliteLoginStore {
    db: Database,
    keys: KeyHierarchy,
}

impl SqliteLoginStore {
    /// Open (or create) a store at `path`; the store starts locked
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_database(Database::open(path)?)
    }

    /// Create a store backed by an in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::with_database(Database::in_memory()?)
    }

    fn with_database(db: Database) -> Result<Self> {
        db.initialize_schema()?;
        Ok(Self {
            db,
            keys: KeyHierarchy::new(),
        })
    }

    fn dek(&self) -> Result<&DataEncryptionKey> {
        self.keys.dek().ok_or(StorageError::Locked)
    }

    fn load_wrapped_key(&self) -> Result<Option<WrappedKey>> {
        let blob: Option<Vec<u8>> = self
            .db
            .conn()
            .query_row("SELECT wrapped_dek FROM store_metadata WHERE id = 1", [], |row| row.get(0))
            .optional()?;

        blob.map(|b| {
            bincode::deserialize(&b).map_err(|e| StorageError::Serialization(e.to_string()))
        })
        .transpose()
    }

    fn store_wrapped_key(&self, wrapped: &WrappedKey) -> Result<()> {
        let blob =
            bincode::serialize(wrapped).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.db.conn().execute(
            "INSERT INTO store_metadata (id, version, wrapped_dek, created_at)
             VALUES (1, ?1, ?2, ?3)",
            params![CURRENT_SCHEMA_VERSION, blob, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn exists(&self, id: &str) -> Result<bool> {
        let exists = self.db.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM logins WHERE id = ?1)",
            [id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

impl LoginStore for SqliteLoginStore {
    fn unlock(&mut self, key: &str) -> Result<()> {
        if self.keys.is_unlocked() {
            return Ok(());
        }

        let store_key = StoreKey::from_encoded(key).map_err(|_| StorageError::InvalidKey)?;

        match self.load_wrapped_key()? {
            Some(wrapped) => self.keys.unlock(&store_key, &wrapped).map_err(|e| match e {
                CryptoError::AuthenticationFailed => StorageError::InvalidKey,
                other => StorageError::Crypto(other),
            })?,
            None => {
                debug!("Initializing credential store key");
                let wrapped = self.keys.initialize(&store_key)?;
                if let Err(e) = self.store_wrapped_key(&wrapped) {
                    self.keys.lock();
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn lock(&mut self) -> Result<()> {
        self.keys.lock();
        Ok(())
    }

    fn is_locked(&self) -> bool {
        !self.keys.is_unlocked()
    }

    fn touch(&mut self, id: &str) -> Result<()> {
        self.dek()?;

        let rows = self.db.conn().execute(
            "UPDATE logins SET times_used = times_used + 1, time_last_used = ?1 WHERE id = ?2",
            params![Utc::now().timestamp_millis(), id],
        )?;

        if rows == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn get_by_hostname(&self, hostname: &str) -> Result<Vec<StoredCredential>> {
        let dek = self.dek()?;
        let mut stmt = self
            .db
            .conn()
            .prepare(&format!("{SELECT_COLUMNS} WHERE hostname = ?1 ORDER BY time_created, id"))?;

        let rows = stmt
            .query_map([hostname], RawRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(|row| row.decrypt(dek)).collect()
    }

    fn get(&self, id: &str) -> Result<Option<StoredCredential>> {
        let dek = self.dek()?;
        let row = self
            .db
            .conn()
            .query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), [id], RawRow::from_row)
            .optional()?;

        row.map(|r| r.decrypt(dek)).transpose()
    }

    fn add(&mut self, mut record: StoredCredential) -> Result<String> {
        let dek = self.dek()?;
        record.validate()?;

        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        } else if self.exists(&record.id)? {
            return Err(StorageError::IdCollision(record.id));
        }

        let now = Utc::now().timestamp_millis();
        for time in [
            &mut record.time_created,
            &mut record.time_last_used,
            &mut record.time_password_changed,
        ] {
            if *time == 0 {
                *time = now;
            }
        }

        let username = encrypt_field(dek, &record.username)?;
        let password = encrypt_field(dek, &record.password)?;

        self.db.conn().execute(
            "INSERT INTO logins (
                id, hostname, username, password, form_submit_url, http_realm,
                times_used, time_created, time_last_used, time_password_changed
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id,
                record.hostname,
                username,
                password,
                record.form_submit_url,
                record.http_realm,
                record.times_used,
                record.time_created,
                record.time_last_used,
                record.time_password_changed,
            ],
        )?;

        Ok(record.id)
    }

    fn update(&mut self, record: StoredCredential) -> Result<()> {
        record.validate()?;
        let existing = self
            .get(&record.id)?
            .ok_or_else(|| StorageError::NotFound(record.id.clone()))?;

        let time_password_changed = if existing.password != record.password {
            Utc::now().timestamp_millis()
        } else {
            existing.time_password_changed
        };

        let dek = self.dek()?;
        let username = encrypt_field(dek, &record.username)?;
        let password = encrypt_field(dek, &record.password)?;

        self.db.conn().execute(
            "UPDATE logins
             SET hostname = ?1, username = ?2, password = ?3, form_submit_url = ?4,
                 http_realm = ?5, times_used = ?6, time_last_used = ?7, time_password_changed = ?8
             WHERE id = ?9",
            params![
                record.hostname,
                username,
                password,
                record.form_submit_url,
                record.http_realm,
                record.times_used,
                record.time_last_used,
                time_password_changed,
                record.id,
            ],
        )?;

        Ok(())
    }
}

fn encrypt_field(dek: &DataEncryptionKey, value: &str) -> Result<Vec<u8>> {
    let field = encrypt_string(dek, value)?;
    bincode::serialize(&field).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decrypt_field(dek: &DataEncryptionKey, blob: &[u8]) -> Result<String> {
    let field: EncryptedField =
        bincode::deserialize(blob).map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(decrypt_to_string(dek, &field)?)
}
