use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Ordinary,
    Privileged,
}

impl Role {
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }
}

/// A chat user as reported by the platform's user lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: String,
    pub handle: String,
    pub real_name: Option<String>,
    pub display_name: Option<String>,
}

impl ChatUser {
    pub fn preferred_name(&self) -> &str {
        [self.display_name.as_deref(), self.real_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
            .unwrap_or(self.handle.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizedUser {
    pub chat_user_id: String,
    pub display_name: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::{ChatUser, Role};

    fn user(display_name: Option<&str>, real_name: Option<&str>) -> ChatUser {
        ChatUser {
            id: "U1".to_owned(),
            handle: "jdoe".to_owned(),
            real_name: real_name.map(str::to_owned),
            display_name: display_name.map(str::to_owned),
        }
    }

    #[test]
    fn preferred_name_falls_back_from_display_to_real_to_handle() {
        assert_eq!(user(Some("Jay"), Some("Jay Doe")).preferred_name(), "Jay");
        assert_eq!(user(Some("  "), Some("Jay Doe")).preferred_name(), "Jay Doe");
        assert_eq!(user(None, None).preferred_name(), "jdoe");
    }

    #[test]
    fn privileged_satisfies_every_role() {
        assert!(Role::Privileged.satisfies(Role::Ordinary));
        assert!(Role::Privileged.satisfies(Role::Privileged));
        assert!(Role::Ordinary.satisfies(Role::Ordinary));
        assert!(!Role::Ordinary.satisfies(Role::Privileged));
    }
}
