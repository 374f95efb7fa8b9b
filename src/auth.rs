//! Login-name authentication.
//!
//! Maps the derived login identifier of every configured secret back to the
//! secret itself, plus an optional nickname table for the subscription
//! endpoint. Both tables are populated once at startup and read-only
//! afterwards, so lookups are safe from any number of connection tasks.

use std::collections::HashMap;

use crate::crypto::player_id;
use crate::error::{Error, Result};

/// The in-memory credential tables.
pub struct Authenticator {
    /// Derived login name -> secret
    users: HashMap<String, String>,
    /// Nickname -> secret
    nicknames: HashMap<String, String>,
}

impl Authenticator {
    /// Build the tables from `(secret, optional nickname)` pairs.
    ///
    /// Duplicate derived identifiers or duplicate nicknames are a fatal
    /// configuration error: silently shadowing one operator's secret with
    /// another's would lock the first client out.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Option<String>)>,
    {
        let mut users = HashMap::new();
        let mut nicknames = HashMap::new();

        for (secret, nickname) in entries {
            let id = player_id(&secret);
            if users.insert(id.clone(), secret.clone()).is_some() {
                return Err(Error::config(format!("duplicate derived identifier {id}")));
            }

            match &nickname {
                Some(nick) => {
                    if nicknames.insert(nick.clone(), secret).is_some() {
                        return Err(Error::config(format!("duplicate nickname {nick}")));
                    }
                    tracing::info!("registered agent access for {id} (nick: {nick})");
                }
                None => tracing::info!("registered agent access for {id}"),
            }
        }

        Ok(Self { users, nicknames })
    }

    /// Resolve an inbound login name to its secret.
    pub fn resolve(&self, login_name: &str) -> Option<&str> {
        self.users.get(login_name).map(String::as_str)
    }

    /// Resolve a subscription nickname to its secret.
    pub fn resolve_nickname(&self, nickname: &str) -> Option<&str> {
        self.nicknames.get(nickname).map(String::as_str)
    }

    /// Number of authorized identities.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
