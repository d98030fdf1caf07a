use thiserror::Error;

use crate::sync::outgoing::InvalidTransition;

/// Failures reported by a backend collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Insert failed: {0}")]
    Insert(String),

    #[error("Subscription failed: {0}")]
    Subscribe(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed row: {0}")]
    Decode(String),
}

/// Errors surfaced by a chat surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("conversation id is empty")]
    EmptyConversationId,

    #[error("message text is empty")]
    EmptyText,

    #[error("no conversation is open")]
    NoActiveConversation,

    #[error("a message is already being sent")]
    SendInFlight,

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Validation failures for a new request, in the order they are checked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("title is required")]
    MissingTitle,

    #[error("description is required")]
    MissingDescription,

    #[error("a target department is required")]
    MissingTargetRole,

    #[error("role '{0}' does not accept requests")]
    NotADepartment(String),

    #[error("location is required")]
    MissingLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("phone number must have at least 9 digits")]
    PhoneInvalid,

    #[error("password must be at least 6 characters")]
    PasswordShort,

    #[error("full name is required")]
    NameRequired,

    #[error("only officials may use the staff panel")]
    NotStaff,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortalError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("only officials may triage requests")]
    NotStaff,

    #[error("only the super admin may view statistics")]
    NotSuperAdmin,

    #[error("a rejection needs a reason")]
    RejectReasonRequired,

    #[error(transparent)]
    Backend(#[from] BackendError),
}
