use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::AccessConfig;
use crate::domain::{
    command::CommandKind,
    user::{AuthorizedUser, Role},
};
use crate::errors::{LookupError, ValidationError};
use crate::ports::UserDirectory;

/// Static allow-list with the subset of names that hold the privileged role.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    allowed: BTreeSet<String>,
    privileged: BTreeSet<String>,
}

impl AccessPolicy {
    pub fn new<A, P>(allowed: A, privileged: P) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        let normalize = |name: String| name.trim().to_owned();
        Self {
            allowed: allowed.into_iter().map(Into::into).map(normalize).collect(),
            privileged: privileged.into_iter().map(Into::into).map(normalize).collect(),
        }
    }

    pub fn from_config(config: &AccessConfig) -> Self {
        Self::new(config.allowed_users.iter().cloned(), config.privileged_users.iter().cloned())
    }

    pub fn role_for(&self, display_name: &str) -> Option<Role> {
        if !self.allowed.contains(display_name) {
            return None;
        }
        if self.privileged.contains(display_name) {
            Some(Role::Privileged)
        } else {
            Some(Role::Ordinary)
        }
    }

    pub fn required_role(kind: CommandKind) -> Role {
        match kind {
            CommandKind::Share => Role::Ordinary,
            CommandKind::Rate => Role::Privileged,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationDecision {
    Authorized(AuthorizedUser),
    Denied { display_name: String },
}

pub struct UserAuthorizer {
    directory: Arc<dyn UserDirectory>,
    policy: AccessPolicy,
}

impl UserAuthorizer {
    pub fn new(directory: Arc<dyn UserDirectory>, policy: AccessPolicy) -> Self {
        Self { directory, policy }
    }

    pub async fn authorize(
        &self,
        chat_user_id: &str,
    ) -> Result<AuthorizationDecision, LookupError> {
        let user = self.directory.lookup_user(chat_user_id).await?;
        let display_name = user.preferred_name().to_owned();

        Ok(match self.policy.role_for(&display_name) {
            Some(role) => AuthorizationDecision::Authorized(AuthorizedUser {
                chat_user_id: user.id,
                display_name,
                role,
            }),
            None => AuthorizationDecision::Denied { display_name },
        })
    }
}

pub fn check_permission(user: &AuthorizedUser, kind: CommandKind) -> Result<(), ValidationError> {
    let required = AccessPolicy::required_role(kind);
    if user.role.satisfies(required) {
        Ok(())
    } else {
        Err(ValidationError::RoleRequired { display_name: user.display_name.clone(), required })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{check_permission, AccessPolicy, AuthorizationDecision, UserAuthorizer};
    use crate::domain::{
        command::CommandKind,
        user::{AuthorizedUser, ChatUser, Role},
    };
    use crate::errors::ValidationError;
    use crate::memory::InMemoryChat;

    fn policy() -> AccessPolicy {
        AccessPolicy::new(["Alice", "Bob"], ["Alice"])
    }

    #[test]
    fn roles_follow_configured_names() {
        let policy = policy();
        assert_eq!(policy.role_for("Alice"), Some(Role::Privileged));
        assert_eq!(policy.role_for("Bob"), Some(Role::Ordinary));
        assert_eq!(policy.role_for("Mallory"), None);
        assert_eq!(policy.role_for("alice"), None);
    }

    #[test]
    fn rating_requires_privileged_role() {
        let bob = AuthorizedUser {
            chat_user_id: "U2".to_owned(),
            display_name: "Bob".to_owned(),
            role: Role::Ordinary,
        };

        assert_eq!(check_permission(&bob, CommandKind::Share), Ok(()));
        assert_eq!(
            check_permission(&bob, CommandKind::Rate),
            Err(ValidationError::RoleRequired {
                display_name: "Bob".to_owned(),
                required: Role::Privileged,
            })
        );
    }

    #[tokio::test]
    async fn authorizer_resolves_display_name_then_role() {
        let chat = Arc::new(InMemoryChat::default());
        chat.add_user(ChatUser {
            id: "U1".to_owned(),
            handle: "alice.w".to_owned(),
            real_name: Some("Alice Walker".to_owned()),
            display_name: Some("Alice".to_owned()),
        })
        .await;
        chat.add_user(ChatUser {
            id: "U9".to_owned(),
            handle: "mallory".to_owned(),
            real_name: None,
            display_name: None,
        })
        .await;
        let authorizer = UserAuthorizer::new(chat, policy());

        let alice = authorizer.authorize("U1").await.expect("lookup succeeds");
        assert_eq!(
            alice,
            AuthorizationDecision::Authorized(AuthorizedUser {
                chat_user_id: "U1".to_owned(),
                display_name: "Alice".to_owned(),
                role: Role::Privileged,
            })
        );

        let mallory = authorizer.authorize("U9").await.expect("lookup succeeds");
        assert_eq!(mallory, AuthorizationDecision::Denied { display_name: "mallory".to_owned() });
    }

    #[tokio::test]
    async fn unknown_user_surfaces_lookup_error() {
        let authorizer = UserAuthorizer::new(Arc::new(InMemoryChat::default()), policy());

        let error = authorizer.authorize("U404").await.expect_err("lookup should fail");
        assert_eq!(error.user_id, "U404");
    }
}
