//! `wareflow-auth` — authentication boundary (token → tenant/principal).
//!
//! This crate is intentionally decoupled from HTTP and storage. Role/permission
//! policy is a collaborator concern; only identity and tenant context live here.

pub mod claims;
pub mod principal;
pub mod roles;
pub mod validator;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use principal::PrincipalId;
pub use roles::Role;
pub use validator::{Hs256JwtValidator, JwtValidator};
