use std::sync::RwLock;

use serde_json::{Map, Value};

/// The signed-in user's profile as returned by the login endpoint.
///
/// The record is opaque to the session: it is replaced wholesale on login
/// and cleared on logout, never patched.
#[derive(Debug)]
pub struct UserStore {
    user: RwLock<Value>,
}

impl Default for UserStore {
    fn default() -> Self {
        Self {
            user: RwLock::new(Value::Object(Map::new())),
        }
    }
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_user(&self, user: Value) {
        *self.user.write().unwrap_or_else(|e| e.into_inner()) = user;
    }

    /// A copy of the current profile; an empty object when nobody is signed in.
    pub fn user(&self) -> Value {
        self.user.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn reset(&self) {
        self.set_user(Value::Object(Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_replaces_whole_record() {
        let store = UserStore::new();
        assert_eq!(store.user(), json!({}));

        store.set_user(json!({"id": 1, "name": "Ada", "roles": ["admin"]}));
        store.set_user(json!({"id": 2}));
        assert_eq!(store.user(), json!({"id": 2}));
    }

    #[test]
    fn test_reset_clears() {
        let store = UserStore::new();
        store.set_user(json!({"id": 1}));
        store.reset();
        assert_eq!(store.user(), json!({}));
        assert!(!store.user().is_null());
    }
}
