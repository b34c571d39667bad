use std::collections::HashMap;

use super::{AuthError, PasswordHasher};

/// A configured login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub role: String,
}

/// Immutable table of users, keyed by username. Built once at startup.
#[derive(Debug, Default)]
pub struct CredentialStore {
    users: HashMap<String, UserRecord>,
}

impl CredentialStore {
    /// Build the store from a list of aliases.
    ///
    /// Each alias is upper-cased and resolved through `lookup` as
    /// `<ALIAS>_USERNAME`, `<ALIAS>_HASHED_PASSWORD` and `<ALIAS>_ROLE`.
    /// Aliases missing any of the three are skipped.
    pub fn load<F>(aliases: &[String], lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut users = HashMap::new();
        for alias in aliases {
            let alias = alias.trim().to_uppercase();
            if alias.is_empty() {
                continue;
            }
            let entry = |suffix: &str| {
                lookup(&format!("{alias}_{suffix}")).filter(|v| !v.is_empty())
            };
            if let (Some(username), Some(password_hash), Some(role)) =
                (entry("USERNAME"), entry("HASHED_PASSWORD"), entry("ROLE"))
            {
                users.insert(
                    username.clone(),
                    UserRecord {
                        username,
                        password_hash,
                        role,
                    },
                );
            }
        }
        Self { users }
    }

    /// Build the store from the process environment.
    pub fn from_env(aliases: &[String]) -> Self {
        Self::load(aliases, |key| std::env::var(key).ok())
    }

    /// Check a username/password pair.
    ///
    /// Unknown users and wrong passwords both yield `InvalidCredentials`.
    pub fn authenticate(
        &self,
        hasher: &PasswordHasher,
        username: &str,
        password: &str,
    ) -> Result<&UserRecord, AuthError> {
        match self.users.get(username) {
            Some(user) if hasher.verify(password, &user.password_hash) => Ok(user),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    #[cfg(test)]
    pub fn get(&self, username: &str) -> Option<&UserRecord> {
        self.users.get(username)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_resolves_companion_entries() {
        let store = CredentialStore::load(
            &["alice".into(), " Bob ".into()],
            env(&[
                ("ALICE_USERNAME", "alice"),
                ("ALICE_HASHED_PASSWORD", "h1"),
                ("ALICE_ROLE", "admin"),
                ("BOB_USERNAME", "bob@example.com"),
                ("BOB_HASHED_PASSWORD", "h2"),
                ("BOB_ROLE", "user"),
            ]),
        );

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("alice").unwrap().role, "admin");
        let bob = store.get("bob@example.com").unwrap();
        assert_eq!(bob.password_hash, "h2");
        assert_eq!(bob.role, "user");
    }

    #[test]
    fn test_load_skips_partial_alias() {
        let store = CredentialStore::load(
            &["alice".into(), "carol".into()],
            env(&[
                ("ALICE_USERNAME", "alice"),
                ("ALICE_HASHED_PASSWORD", "h1"),
                ("ALICE_ROLE", "admin"),
                ("CAROL_USERNAME", "carol"),
                ("CAROL_ROLE", "admin"),
            ]),
        );

        assert_eq!(store.len(), 1);
        assert!(store.get("carol").is_none());
    }

    #[test]
    fn test_load_empty() {
        let store = CredentialStore::load(&[], env(&[]));
        assert!(store.is_empty());

        let hasher = PasswordHasher::new("secret");
        assert!(matches!(
            store.authenticate(&hasher, "anyone", "pw"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_authenticate_does_not_distinguish_failures() {
        let hasher = PasswordHasher::new("secret");
        let hash = hasher.hash("pw");
        let store = CredentialStore::load(
            &["alice".into()],
            env(&[
                ("ALICE_USERNAME", "alice"),
                ("ALICE_HASHED_PASSWORD", hash.as_str()),
                ("ALICE_ROLE", "admin"),
            ]),
        );

        assert_eq!(
            store.authenticate(&hasher, "alice", "pw").unwrap().username,
            "alice"
        );

        let unknown = store.authenticate(&hasher, "mallory", "pw").unwrap_err();
        let wrong = store.authenticate(&hasher, "alice", "nope").unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }
}
