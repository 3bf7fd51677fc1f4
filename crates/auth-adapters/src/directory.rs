//! In-process user directory.

use chrono::Utc;
use dashmap::DashMap;
use domains::User;
use uuid::Uuid;

pub struct UserDirectory {
    users: DashMap<String, User>,
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl UserDirectory {
    /// Starts with the two demo accounts.
    pub fn new() -> Self {
        let users = DashMap::new();
        for (id, email, name) in [
            ("demo-user-1", "demo@example.com", "Demo User"),
            ("demo-user-2", "admin@example.com", "Admin User"),
        ] {
            users.insert(id.to_string(), blank_user(id.to_string(), Some(email.to_string()), name.to_string()));
        }
        Self { users }
    }

    pub fn get(&self, id: &str) -> Option<User> {
        self.users.get(id).map(|u| u.clone())
    }

    pub fn find_by_email(&self, email: &str) -> Option<User> {
        self.users
            .iter()
            .find(|u| u.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)))
            .map(|u| u.clone())
    }

    pub fn create(&self, email: Option<String>, display_name: String) -> User {
        let user = blank_user(generate_user_id(), email, display_name);
        self.users.insert(user.id.clone(), user.clone());
        user
    }

    /// Applies `f` to a stored user and returns the updated copy.
    pub fn update(&self, id: &str, f: impl FnOnce(&mut User)) -> Option<User> {
        let mut entry = self.users.get_mut(id)?;
        f(&mut entry);
        Some(entry.clone())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn blank_user(id: String, email: Option<String>, display_name: String) -> User {
    User {
        id,
        email,
        display_name,
        created_at: Utc::now(),
        world_id_verified: false,
        world_id_verified_at: None,
        world_id_nullifier_hash: None,
    }
}

/// `user-<epoch millis>-<9 random chars>`
pub fn generate_user_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("user-{}-{}", Utc::now().timestamp_millis(), &random[..9])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_users_are_seeded() {
        let dir = UserDirectory::new();
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.find_by_email("ADMIN@example.com").unwrap().id, "demo-user-2");
        assert_eq!(dir.get("demo-user-1").unwrap().display_name, "Demo User");
    }

    #[test]
    fn generated_ids_have_the_expected_shape() {
        let id = generate_user_id();
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts[0], "user");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn update_returns_the_new_state() {
        let dir = UserDirectory::new();
        let user = dir
            .update("demo-user-1", |u| u.display_name = "Renamed".into())
            .unwrap();
        assert_eq!(user.display_name, "Renamed");
        assert!(dir.update("missing", |_| {}).is_none());
    }
}
