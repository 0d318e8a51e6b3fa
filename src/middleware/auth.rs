use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use crate::{dto::auth::Claims, error::AppError, models::Role};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

pub fn ensure_role(user: &AuthUser, role: Role) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, Role::Admin)
}

pub fn ensure_teacher(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, Role::Teacher)
}

/// Single ownership predicate for course mutations: the owning teacher or an
/// admin, nobody else.
pub fn can_manage_course(user: &AuthUser, teacher_id: Uuid) -> Result<(), AppError> {
    match user.role {
        Role::Admin => Ok(()),
        Role::Teacher if user.user_id == teacher_id => Ok(()),
        Role::Teacher | Role::Student => Err(AppError::Forbidden),
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;
    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::BadRequest("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::BadRequest("Invalid Authorization header".into()))?;

        if !auth_str.starts_with("Bearer ") {
            return Err(AppError::BadRequest("Invalid Authorization scheme".into()));
        }
        let token = auth_str.trim_start_matches("Bearer ").trim();

        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::BadRequest("Invalid or expired token".into()))?;

        let user_id = Uuid::parse_str(&decoded.claims.sub)
            .map_err(|_| AppError::BadRequest("Invalid user id in token".into()))?;

        let role: Role = decoded
            .claims
            .role
            .parse()
            .map_err(|_| AppError::BadRequest("Invalid role in token".into()))?;

        Ok(AuthUser { user_id, role })
    }
}

// Public catalog routes render for anonymous callers too; a present but
// broken Authorization header is still rejected.
impl<S> axum::extract::OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;
    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        if parts.headers.get(header::AUTHORIZATION).is_none() {
            return Ok(None);
        }
        <AuthUser as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_management_is_owner_or_admin() {
        let owner = Uuid::new_v4();
        let admin = AuthUser {
            user_id: Uuid::new_v4(),
            role: Role::Admin,
        };
        let owning_teacher = AuthUser {
            user_id: owner,
            role: Role::Teacher,
        };
        let other_teacher = AuthUser {
            user_id: Uuid::new_v4(),
            role: Role::Teacher,
        };
        let student = AuthUser {
            user_id: owner,
            role: Role::Student,
        };

        assert!(can_manage_course(&admin, owner).is_ok());
        assert!(can_manage_course(&owning_teacher, owner).is_ok());
        assert!(can_manage_course(&other_teacher, owner).is_err());
        assert!(can_manage_course(&student, owner).is_err());
    }
}
