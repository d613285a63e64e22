//! Bridge between engine login events and the credential store
//!
//! Every operation runs inside an unlock scope: the store key is read from
//! secured preferences, the store is unlocked, exactly one store operation
//! runs, and the store is locked again on every exit path. A missing key
//! means the feature is unavailable and the call does nothing.


use crate::{
    engine::LoginDelegate,
    login::{Hint, Login},
    preferences::SecurePreferences,
    prompt::LoginsDelegate,
    storage::{self, LoginStore, StoredCredential},
    Result,
};
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Preference key under which the store key is kept
pub const PASSWORDS_KEY: &str = "passwords";

/// Routes engine login events to a key-protected [`LoginStore`]
///
/// The store is owned behind a mutex held for the whole unlock scope, so
/// concurrent callers are serialized.
pub struct CredentialBridge<S, P> {
    store: Mutex<S>,
    preferences: P,
    key_name: String,
}

impl<S: LoginStore, P: SecurePreferences> CredentialBridge<S, P> {
    pub fn new(store: S, preferences: P) -> Self {
        Self {
            store: Mutex::new(store),
            preferences,
            key_name: PASSWORDS_KEY.to_string(),
        }
    }

    /// Read the store key from a different preference name
    pub fn with_key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = key_name.into();
        self
    }

    pub fn preferences(&self) -> &P {
        &self.preferences
    }

    /// Mark the login's record as used
    pub fn notify_used(&self, login: &Login) -> Result<()> {
        self.with_unlocked(|store| match &login.guid {
            Some(guid) => store.touch(guid),
            None => Ok(()),
        })?;
        Ok(())
    }

    /// All stored logins for a domain, empty when no key is configured
    pub fn fetch_for_domain(&self, domain: &str) -> Result<Vec<Login>> {
        let records = self.with_unlocked(|store| store.get_by_hostname(domain))?;
        Ok(records
            .unwrap_or_default()
            .into_iter()
            .map(Login::from)
            .collect())
    }

    /// Update the login's record if it exists, otherwise insert a new one
    ///
    /// The hint does not change what is written yet.
    pub fn save_or_update(&self, login: &Login, hint: Hint) -> Result<()> {
        self.with_unlocked(|store| {
            let existing = match login.guid.as_deref() {
                Some(guid) => store.get(guid)?,
                None => None,
            };

            match existing {
                Some(existing) => {
                    let merged = merge_into_existing(login, existing);
                    info!(id = %merged.id, hint = hint.bits(), "Updating stored login");
                    store.update(merged)
                }
                None => {
                    let id = store.add(new_record(login))?;
                    info!(id = %id, hint = hint.bits(), "Saved new login");
                    Ok(())
                }
            }
        })?;
        Ok(())
    }

    /// Whether a record with the same origin and username is stored
    pub fn login_exists(&self, login: &Login) -> Result<bool> {
        let Some(origin) = login.origin.as_deref() else {
            return Ok(false);
        };
        let username = login.username.as_deref().unwrap_or_default();

        let found = self.with_unlocked(|store| {
            Ok(store
                .get_by_hostname(origin)?
                .iter()
                .any(|record| record.username == username))
        })?;
        Ok(found.unwrap_or(false))
    }

    /// Run `op` against the unlocked store
    ///
    /// Returns `Ok(None)` without touching the store when no key is set.
    fn with_unlocked<T>(&self, op: impl FnOnce(&mut S) -> storage::Result<T>) -> Result<Option<T>> {
        let Some(key) = self.preferences.get_string(&self.key_name)? else {
            debug!("No {} key in secured preferences, skipping", self.key_name);
            return Ok(None);
        };

        let mut store = match self.store.lock() {
            Ok(store) => store,
            Err(poisoned) => {
                warn!("Credential store mutex poisoned by an earlier panic, recovering");
                self.store.clear_poison();
                let mut store = poisoned.into_inner();
                // A panic inside lock itself can leave the store open
                if !store.is_locked() {
                    store.lock()?;
                }
                store
            }
        };
        let mut unlocked = UnlockedStore::unlock(&mut *store, &key)?;
        Ok(Some(op(&mut *unlocked)?))
    }
}

/// Unlocked view of a store that locks it again when dropped
struct UnlockedStore<'a, S: LoginStore> {
    store: &'a mut S,
}

impl<'a, S: LoginStore> UnlockedStore<'a, S> {
    fn unlock(store: &'a mut S, key: &str) -> storage::Result<Self> {
        // Guard exists before unlock so a failed unlock is still followed by lock.
        let mut guard = Self { store };
        guard.store.unlock(key)?;
        Ok(guard)
    }
}

impl<S: LoginStore> Deref for UnlockedStore<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &*self.store
    }
}

impl<S: LoginStore> DerefMut for UnlockedStore<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut *self.store
    }
}

impl<S: LoginStore> Drop for UnlockedStore<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.store.lock() {
            warn!("Failed to relock credential store: {}", e);
        }
    }
}

/// Incoming value if non-empty, else the existing one
fn or_use_existing(incoming: Option<&str>, existing: String) -> String {
    match incoming {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => existing,
    }
}

fn or_use_existing_opt(incoming: Option<&str>, existing: Option<String>) -> Option<String> {
    match incoming {
        Some(value) if !value.is_empty() => Some(value.to_string()),
        _ => existing,
    }
}

/// Merge a login into its stored record, preferring non-empty login fields
pub(crate) fn merge_into_existing(login: &Login, existing: StoredCredential) -> StoredCredential {
    StoredCredential {
        hostname: or_use_existing(login.origin.as_deref(), existing.hostname),
        username: or_use_existing(login.username.as_deref(), existing.username),
        password: or_use_existing(login.password.as_deref(), existing.password),
        http_realm: or_use_existing_opt(login.http_realm.as_deref(), existing.http_realm),
        form_submit_url: or_use_existing_opt(
            login.form_action_origin.as_deref(),
            existing.form_submit_url,
        ),
        ..existing
    }
}

/// Record for a login that has no stored counterpart; the store assigns the id
pub(crate) fn new_record(login: &Login) -> StoredCredential {
    StoredCredential {
        id: String::new(),
        hostname: login.origin.clone().unwrap_or_default(),
        username: login.username.clone().unwrap_or_default(),
        password: login.password.clone().unwrap_or_default(),
        form_submit_url: login.form_action_origin.clone(),
        http_realm: login.http_realm.clone(),
        ..StoredCredential::default()
    }
}

impl<S, P> LoginDelegate for CredentialBridge<S, P>
where
    S: LoginStore + Send,
    P: SecurePreferences + Send + Sync,
{
    fn on_login_used(&self, login: &Login) -> Result<()> {
        self.notify_used(login)
    }

    fn on_fetch_logins(&self, domain: &str) -> Result<Vec<Login>> {
        self.fetch_for_domain(domain)
    }

    fn on_login_save(&self, login: &Login, hint: Hint) -> Result<()> {
        self.save_or_update(login, hint)
    }
}

impl<S, P> LoginsDelegate for CredentialBridge<S, P>
where
    S: LoginStore,
    P: SecurePreferences,
{
    fn login_exists(&self, login: &Login) -> bool {
        CredentialBridge::login_exists(self, login).unwrap_or_else(|e| {
            warn!("Could not check for an existing login: {}", e);
            false
        })
    }
}
