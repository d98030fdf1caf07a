//! Chat synchronization: optimistic local sends reconciled with pushed
//! inserts, one active conversation per surface.

pub mod history;
pub mod outgoing;
pub mod surface;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use history::{AuthorBadge, HistoryEntry, ReadOnlyHistory};
pub use outgoing::{Outgoing, OutgoingState};
pub use surface::{ChatSurface, PendingSend, SendOutcome};
pub use view::{ChatView, Delivery, Entry, EntryKey, Notice, Placeholder, TempId, ViewState};
