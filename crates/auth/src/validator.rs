//! Token decoding + signature verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

/// Verifies a bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HS256 (shared-secret) JWT validator.
#[derive(Clone)]
pub struct Hs256JwtValidator {
    secret: Vec<u8>,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        // Claims use explicit RFC3339 windows, not the numeric `exp`/`nbf`
        // registered claims, so jsonwebtoken's built-in time checks are
        // disabled and `validate_claims` is authoritative.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let decoded = jsonwebtoken::decode::<JwtClaims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &validation,
        )
        .map_err(|_| TokenValidationError::Invalid)?;

        validate_claims(&decoded.claims, now)?;
        Ok(decoded.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};
    use wareflow_core::TenantId;

    use crate::{PrincipalId, Role};

    fn mint(secret: &[u8], claims: &JwtClaims) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret),
        )
        .expect("encode jwt")
    }

    fn fresh_claims() -> JwtClaims {
        let now = Utc::now();
        JwtClaims {
            sub: PrincipalId::new(),
            tenant_id: TenantId::new(),
            roles: vec![Role::new("warehouse_operator")],
            issued_at: now - Duration::minutes(1),
            expires_at: now + Duration::minutes(10),
        }
    }

    #[test]
    fn round_trips_valid_token() {
        let secret = b"test-secret";
        let claims = fresh_claims();
        let token = mint(secret, &claims);

        let validator = Hs256JwtValidator::new(secret.to_vec());
        let decoded = validator.validate(&token, Utc::now()).expect("valid token");
        assert_eq!(decoded, claims);
    }

    #[test]
    fn rejects_wrong_secret() {
        let claims = fresh_claims();
        let token = mint(b"secret-a", &claims);

        let validator = Hs256JwtValidator::new(b"secret-b".to_vec());
        assert_eq!(
            validator.validate(&token, Utc::now()),
            Err(TokenValidationError::Invalid)
        );
    }

    #[test]
    fn rejects_expired_claims() {
        let secret = b"test-secret";
        let mut claims = fresh_claims();
        claims.issued_at = Utc::now() - Duration::hours(2);
        claims.expires_at = Utc::now() - Duration::hours(1);
        let token = mint(secret, &claims);

        let validator = Hs256JwtValidator::new(secret.to_vec());
        assert_eq!(
            validator.validate(&token, Utc::now()),
            Err(TokenValidationError::Expired)
        );
    }
}
