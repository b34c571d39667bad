use super::{AuthError, Principal};

/// Require an exact role match. There is no role hierarchy.
pub fn require_role(principal: &Principal, role: &str) -> Result<(), AuthError> {
    if principal.role == role {
        Ok(())
    } else {
        Err(AuthError::Forbidden {
            required: role.to_string(),
            actual: principal.role.clone(),
        })
    }
}
