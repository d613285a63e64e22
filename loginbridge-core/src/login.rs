//! Engine-facing login value and save/update hints.

use crate::storage::StoredCredential;
use serde::{Deserialize, Serialize};

/// A login as seen by the browser engine
///
/// Built per autofill event and discarded once it has been translated into
/// a store operation. A login with a `guid` refers to an existing record;
/// one without is a new, unsaved credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Login {
    pub guid: Option<String>,
    /// Site origin, e.g. `https://example.com`. Called `hostname` by the store.
    pub origin: Option<String>,
    /// Origin the login form submits to. Called `form_submit_url` by the store.
    pub form_action_origin: Option<String>,
    /// Realm for HTTP basic/digest authentication.
    pub http_realm: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Login {
    /// Create a new unsaved login for an origin
    pub fn new(
        origin: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            origin: Some(origin.into()),
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    /// Set the guid of an existing record
    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }
}

impl From<StoredCredential> for Login {
    fn from(record: StoredCredential) -> Self {
        Self {
            guid: Some(record.id),
            origin: Some(record.hostname),
            form_action_origin: record.form_submit_url,
            http_realm: record.http_realm,
            username: Some(record.username),
            password: Some(record.password),
        }
    }
}

/// Flags that guide how a save or update should be prompted
///
/// The engine hands these over as a plain integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hint(u32);

impl Hint {
    pub const NONE: Hint = Hint(0);
    /// The password was generated by the browser.
    pub const GENERATED: Hint = Hint(1 << 0);
    /// The login was captured in a private browsing session.
    pub const PRIVATE_MODE: Hint = Hint(1 << 1);
    /// The captured value may not be a login at all (e.g. a card number).
    pub const LOW_CONFIDENCE: Hint = Hint(1 << 2);

    const ALL: u32 = Self::GENERATED.0 | Self::PRIVATE_MODE.0 | Self::LOW_CONFIDENCE.0;

    /// Build from the engine's integer form, dropping unknown bits
    pub fn from_bits(bits: u32) -> Self {
        Hint(bits & Self::ALL)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Hint) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Hint {
    type Output = Hint;

    fn bitor(self, rhs: Hint) -> Hint {
        Hint(self.0 | rhs.0)
    }
}
