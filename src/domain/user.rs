//! Request identities and role names.

use serde::{Deserialize, Serialize};

pub const ROLE_READ: &str = "Read";
pub const ROLE_WRITE: &str = "Write";
pub const ROLE_ADMIN: &str = "Admin";

/// The identity a request acts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub roles: Vec<String>,
}

impl User {
    pub fn new(name: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            name: name.into(),
            roles,
        }
    }

    /// The identity of a request without a valid session: no name, read-only.
    pub fn anonymous() -> Self {
        Self {
            name: String::new(),
            roles: vec![ROLE_READ.to_string()],
        }
    }

    pub fn is_logged_in(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|candidate| candidate == role)
    }

    /// True when every required role is held. An empty requirement always passes.
    pub fn has_roles<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.iter().all(|role| self.has_role(role.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_user_can_only_read() {
        let user = User::anonymous();
        assert!(!user.is_logged_in());
        assert!(user.has_role(ROLE_READ));
        assert!(!user.has_role(ROLE_WRITE));
    }

    #[test]
    fn empty_requirement_is_satisfied() {
        let user = User::anonymous();
        assert!(user.has_roles::<&str>(&[]));
    }

    #[test]
    fn all_required_roles_must_be_held() {
        let user = User::new("ada", vec![ROLE_ADMIN.to_string(), ROLE_WRITE.to_string()]);
        assert!(user.has_roles(&[ROLE_ADMIN, ROLE_WRITE]));
        assert!(!user.has_roles(&[ROLE_ADMIN, ROLE_READ]));
    }
}
