//! Credential checks done before talking to the identity provider, and the
//! profile row every account needs.
//!
//! Residents sign in with a phone number; the provider only knows emails,
//! so the phone's digits become the local part of a synthetic address.

use tracing::info;

use crate::backend::ProfileBackend;
use crate::entity::{Actor, ActorId, Role};
use crate::error::{AuthError, PortalError};

pub const LOGIN_DOMAIN: &str = "mahalla.uz";
const MIN_PHONE_DIGITS: usize = 9;
const MIN_PASSWORD_LEN: usize = 6;
const MIN_NAME_LEN: usize = 2;

pub fn sanitize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// The email-style identity a phone number signs in with.
pub fn login_identity(phone: &str) -> Result<String, AuthError> {
    let digits = sanitize_phone(phone);
    if digits.len() < MIN_PHONE_DIGITS {
        return Err(AuthError::PhoneInvalid);
    }
    Ok(format!("{}@{}", digits, LOGIN_DOMAIN))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub phone: String,
    pub password: String,
    pub full_name: String,
}

/// A registration that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRegistration {
    pub email: String,
    pub phone: String,
    pub full_name: String,
}

impl Registration {
    pub fn validate(&self) -> Result<ValidRegistration, AuthError> {
        let email = login_identity(&self.phone)?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::PasswordShort);
        }
        let full_name = self.full_name.trim();
        if full_name.chars().count() < MIN_NAME_LEN {
            return Err(AuthError::NameRequired);
        }

        Ok(ValidRegistration {
            email,
            phone: sanitize_phone(&self.phone),
            full_name: full_name.to_string(),
        })
    }
}

/// Return the account's profile, creating a resident profile on first use.
pub async fn ensure_profile(
    backend: &dyn ProfileBackend,
    user_id: &ActorId,
    registration: &ValidRegistration,
) -> Result<Actor, PortalError> {
    if let Some(existing) = backend.get_profile(user_id).await? {
        return Ok(existing);
    }

    let actor = Actor {
        id: user_id.clone(),
        full_name: registration.full_name.clone(),
        phone: registration.phone.clone(),
        role: Role::User,
    };
    backend.save_profile(&actor).await?;
    info!(id = %actor.id, "profile created");
    Ok(actor)
}

/// Gate for the staff panel.
pub fn admit_staff(actor: &Actor) -> Result<(), AuthError> {
    if actor.role.is_official() {
        Ok(())
    } else {
        Err(AuthError::NotStaff)
    }
}
