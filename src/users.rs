//! Read-only user directory.
//!
//! The token core only ever looks users up by login. Password comparison is a
//! plain equality check; hashing belongs to whatever backs the directory.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

/// The authenticated identity a token is minted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub login: String,
    pub display_name: String,
    pub roles: BTreeSet<Role>,
}

impl Principal {
    pub fn new(
        login: impl Into<String>,
        display_name: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        Self {
            login: login.into(),
            display_name: display_name.into(),
            roles: roles.into_iter().collect(),
        }
    }
}

/// A directory entry: the principal plus the password it authenticates with.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub principal: Principal,
    pub password: String,
}

impl UserRecord {
    pub fn password_matches(&self, candidate: &str) -> bool {
        self.password == candidate
    }
}

/// Lookup interface consumed by the auth service.
pub trait UserDirectory: Send + Sync {
    /// Find the single user with this login, if any.
    fn lookup(&self, login: &str) -> Option<UserRecord>;
}

/// On-disk shape of a user entry (`--users-file`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserEntry {
    login: String,
    password: String,
    first_name: String,
    #[serde(default)]
    roles: BTreeSet<Role>,
}

/// Fixed, in-memory user list.
#[derive(Debug, Clone, Default)]
pub struct StaticUserDirectory {
    users: Vec<UserRecord>,
}

impl StaticUserDirectory {
    pub fn new(users: Vec<UserRecord>) -> Self {
        Self { users }
    }

    /// Built-in demo users: `Anton`/`1234` (USER) and `Sergei`/`12345` (ADMIN).
    pub fn demo() -> Self {
        Self::new(vec![
            UserRecord {
                principal: Principal::new("Anton", "Anton", [Role::User]),
                password: "1234".to_string(),
            },
            UserRecord {
                principal: Principal::new("Sergei", "Sergei", [Role::Admin]),
                password: "12345".to_string(),
            },
        ])
    }

    /// Parse a JSON array of `{login, password, firstName, roles}` entries.
    /// Duplicate logins are rejected since lookup must return at most one match.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let entries: Vec<UserEntry> =
            serde_json::from_str(json).map_err(|e| format!("Invalid users file: {}", e))?;

        let mut seen = BTreeSet::new();
        let mut users = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.login.is_empty() {
                return Err("User login cannot be empty".to_string());
            }
            if !seen.insert(entry.login.clone()) {
                return Err(format!("Duplicate login in users file: {}", entry.login));
            }
            users.push(UserRecord {
                principal: Principal {
                    login: entry.login,
                    display_name: entry.first_name,
                    roles: entry.roles,
                },
                password: entry.password,
            });
        }

        Ok(Self::new(users))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserDirectory for StaticUserDirectory {
    fn lookup(&self, login: &str) -> Option<UserRecord> {
        self.users
            .iter()
            .find(|user| user.principal.login == login)
            .cloned()
    }
}
