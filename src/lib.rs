//! Client core of the mahalla request portal: residents file requests,
//! department staff answer them in a per-request chat, and a super admin
//! watches the numbers.

pub mod backend;
pub mod bus;
pub mod chat;
pub mod config;
pub mod entity;
pub mod error;
pub mod portal;
pub mod store;
pub mod sync;

pub use backend::{ConversationBackend, LocalBackend, MessageBackend, ProfileBackend};
pub use error::{BackendError, PortalError, SyncError};
pub use sync::ChatSurface;
