//! Request lifecycle around the chat: filing, listing, triage, statistics.

pub mod auth;
pub mod feed;
pub mod inbox;
pub mod requests;
pub mod stats;

pub use feed::{load_staff_feed, rejection_reason, update_status, FeedFilter};
pub use inbox::{load_my_requests, RequestSummary, RECENT_REQUESTS};
pub use requests::{submit_request, Location, RequestDraft};
pub use stats::{
    load_dashboard, load_department, DashboardStats, DepartmentDetail, StatusCounts,
    RECENT_ON_DASHBOARD,
};
