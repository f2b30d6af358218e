//! Authorization decisions as plain functions over the resolved actor.
//!
//! Reads are open to everyone; writes are gated by role and, for reviews and
//! comments, by ownership. Moderator escalation applies only to reviews and
//! comments; catalog entities take an admin.

use crate::entities::users;

use super::ApiError;

/// Require any authenticated caller.
pub fn authenticated(actor: Option<&users::Model>) -> Result<&users::Model, ApiError> {
    actor.ok_or_else(ApiError::authentication_required)
}

/// Require an admin (role or staff flag).
pub fn admin_only(actor: Option<&users::Model>) -> Result<&users::Model, ApiError> {
    let user = authenticated(actor)?;
    if user.is_admin() {
        Ok(user)
    } else {
        Err(ApiError::Forbidden(
            "administrator rights required".to_string(),
        ))
    }
}

/// Collection-level policy for catalog entities: anyone reads, admins write.
/// Call this only on the write paths; read handlers skip the check entirely.
pub fn admin_for_write(actor: Option<&users::Model>) -> Result<&users::Model, ApiError> {
    admin_only(actor)
}

/// Object-level policy for reviews and comments: the author, a moderator, or
/// an admin may mutate.
pub fn author_moderator_or_admin(actor: &users::Model, author_id: i32) -> Result<(), ApiError> {
    if actor.id == author_id || actor.is_moderator() || actor.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "only the author, a moderator or an administrator may do this".to_string(),
        ))
    }
}
