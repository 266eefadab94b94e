//! `tribal-auth` — authentication and authorization boundary.
//!
//! Decoupled from HTTP and storage: token codecs, password hashing, the
//! role→permission policy and the `User` account model live here.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod user;

pub use authorize::{authorize, AuthzError, Principal};
pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use jwt::{Hs256JwtIssuer, Hs256JwtValidator, JwtValidator};
pub use password::{hash_password, validate_password, verify_password, PasswordError};
pub use permissions::{permissions_for, Permission};
pub use roles::Role;
pub use user::{normalize_email, NewUser, ProfilePatch, User, UserView};
