//! User accounts.
//!
//! # Invariants
//! - Email is stored lowercase and trimmed; uniqueness is enforced by the store.
//! - Self-registration never yields an admin.
//! - Deactivation is a soft delete: the record stays, `is_active` flips.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tribal_core::{required_text, validate_phone, Address, DomainError, DomainResult, Entity, UserId};

use crate::Role;

const MAX_NAME_CHARS: usize = 100;
const MAX_EMAIL_CHARS: usize = 254;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

/// Registration input (password already hashed by the caller).
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Partial profile update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
}

/// Trim, lowercase and sanity-check an email address.
pub fn normalize_email(raw: &str) -> DomainResult<String> {
    let email = raw.trim().to_lowercase();
    let invalid = || DomainError::validation("email address is malformed");

    if email.is_empty() || email.chars().count() > MAX_EMAIL_CHARS {
        return Err(invalid());
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid());
    }
    Ok(email)
}

impl User {
    /// Self-registration of a buyer or seller.
    pub fn register(new: NewUser, password_hash: String, now: DateTime<Utc>) -> DomainResult<User> {
        if !new.role.is_self_assignable() {
            return Err(DomainError::forbidden("admin accounts cannot self-register"));
        }
        Self::build(new, password_hash, now)
    }

    /// Provision an admin (bootstrap only; never reachable from a request).
    pub fn provision_admin(
        name: &str,
        email: &str,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> DomainResult<User> {
        let new = NewUser {
            name: name.to_string(),
            email: email.to_string(),
            role: Role::Admin,
            phone: None,
        };
        Self::build(new, password_hash, now)
    }

    fn build(new: NewUser, password_hash: String, now: DateTime<Utc>) -> DomainResult<User> {
        let phone = new.phone.as_deref().map(validate_phone).transpose()?;
        Ok(User {
            id: UserId::new(),
            name: required_text("name", &new.name, MAX_NAME_CHARS)?,
            email: normalize_email(&new.email)?,
            password_hash,
            role: new.role,
            phone,
            address: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply_profile(&mut self, patch: ProfilePatch, now: DateTime<Utc>) -> DomainResult<()> {
        // Validate everything before touching state.
        let name = patch
            .name
            .as_deref()
            .map(|n| required_text("name", n, MAX_NAME_CHARS))
            .transpose()?;
        let phone = match patch.phone.as_deref().map(str::trim) {
            Some("") => Some(None),
            Some(p) => Some(Some(validate_phone(p)?)),
            None => None,
        };
        let address = patch.address.as_ref().map(Address::validated).transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(phone) = phone {
            self.phone = phone;
        }
        if let Some(address) = address {
            self.address = Some(address);
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn set_password_hash(&mut self, password_hash: String, now: DateTime<Utc>) {
        self.password_hash = password_hash;
        self.updated_at = now;
    }

    pub fn change_role(&mut self, role: Role, now: DateTime<Utc>) -> DomainResult<()> {
        if self.role == role {
            return Err(DomainError::conflict(format!("user is already a {role}")));
        }
        self.role = role;
        self.updated_at = now;
        Ok(())
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::conflict("user is already inactive"));
        }
        self.is_active = false;
        self.updated_at = now;
        Ok(())
    }

    pub fn activate(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.is_active {
            return Err(DomainError::conflict("user is already active"));
        }
        self.is_active = true;
        self.updated_at = now;
        Ok(())
    }
}

/// Public projection of a user (no password hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            role: u.role,
            phone: u.phone.clone(),
            address: u.address.clone(),
            is_active: u.is_active,
            created_at: u.created_at,
        }
    }
}
