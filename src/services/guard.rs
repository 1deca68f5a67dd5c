//! Access guard: validates externally issued bearer credentials
//!
//! The guard never mints credentials; it only checks signature and expiry
//! and extracts the identity and role they carry.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{identity::Claims, Identity, Role},
};

#[derive(Clone)]
pub struct AccessGuard {
    key: DecodingKey,
    validation: Validation,
}

impl AccessGuard {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Resolve a bearer credential to the identity it carries
    pub fn resolve(&self, credential: &str) -> AppResult<Identity> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(AppError::Authentication("Missing credential".to_string()));
        }

        let claims = decode::<Claims>(credential, &self.key, &self.validation)
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))?
            .claims;

        if claims.user_id <= 0 {
            return Err(AppError::Authentication(
                "Token does not identify a user".to_string(),
            ));
        }

        Ok(Identity::from(claims))
    }

    /// Require `identity` to hold at least `role`
    pub fn require_role(identity: &Identity, role: Role) -> AppResult<()> {
        if identity.role.satisfies(role) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = identity.user_id,
                role = %identity.role,
                required = %role,
                "Insufficient role"
            );
            Err(AppError::Authorization(format!("{} privileges required", role)))
        }
    }
}
