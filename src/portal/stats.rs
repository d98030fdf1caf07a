use std::collections::BTreeMap;

use serde::Serialize;

use crate::backend::ConversationBackend;
use crate::chat::{Conversation, ConversationQuery, ConversationStatus};
use crate::entity::{Actor, Role};
use crate::error::{PortalError, RequestError};

/// How many of the newest requests the dashboard lists.
pub const RECENT_ON_DASHBOARD: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: u64,
    pub pending: u64,
    pub progress: u64,
    pub done: u64,
    pub rejected: u64,
}

impl StatusCounts {
    fn add(&mut self, status: ConversationStatus) {
        self.total += 1;
        match status {
            ConversationStatus::Pending => self.pending += 1,
            ConversationStatus::Progress => self.progress += 1,
            ConversationStatus::Done => self.done += 1,
            ConversationStatus::Rejected => self.rejected += 1,
        }
    }

    fn tally<'a>(conversations: impl IntoIterator<Item = &'a Conversation>) -> Self {
        let mut counts = Self::default();
        for conversation in conversations {
            counts.add(conversation.status);
        }
        counts
    }

    /// Share of requests marked done, rounded to a whole percent. Zero when
    /// there are no requests.
    pub fn done_percent(&self) -> u64 {
        if self.total == 0 {
            return 0;
        }
        (self.done * 100 + self.total / 2) / self.total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub overall: StatusCounts,
    /// One row per department, including those with no requests.
    pub by_role: BTreeMap<Role, StatusCounts>,
    /// Newest requests first.
    pub recent: Vec<Conversation>,
}

impl DashboardStats {
    /// `conversations` must be ordered newest first, as
    /// [`ConversationBackend::list_conversations`] returns them.
    pub fn compute(conversations: &[Conversation]) -> Self {
        let mut overall = StatusCounts::default();
        let mut by_role: BTreeMap<Role, StatusCounts> = Role::DEPARTMENTS
            .iter()
            .map(|role| (*role, StatusCounts::default()))
            .collect();

        for conversation in conversations {
            overall.add(conversation.status);
            if let Some(counts) = by_role.get_mut(&conversation.target_role) {
                counts.add(conversation.status);
            }
        }

        Self {
            overall,
            by_role,
            recent: conversations
                .iter()
                .take(RECENT_ON_DASHBOARD)
                .cloned()
                .collect(),
        }
    }

    /// Departments that have requests, busiest first. Ties keep role order.
    pub fn ranked_departments(&self) -> Vec<(Role, StatusCounts)> {
        let mut rows: Vec<_> = self
            .by_role
            .iter()
            .filter(|(_, counts)| counts.total > 0)
            .map(|(role, counts)| (*role, *counts))
            .collect();
        rows.sort_by(|a, b| b.1.total.cmp(&a.1.total));
        rows
    }
}

/// One department's requests, for drilling into a dashboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentDetail {
    pub role: Role,
    pub counts: StatusCounts,
    /// Newest first.
    pub requests: Vec<Conversation>,
}

pub async fn load_dashboard(
    backend: &dyn ConversationBackend,
    actor: &Actor,
) -> Result<DashboardStats, PortalError> {
    if !actor.is_super_admin() {
        return Err(PortalError::NotSuperAdmin);
    }
    let conversations = backend
        .list_conversations(&ConversationQuery::default())
        .await?;
    Ok(DashboardStats::compute(&conversations))
}

pub async fn load_department(
    backend: &dyn ConversationBackend,
    actor: &Actor,
    role: Role,
) -> Result<DepartmentDetail, PortalError> {
    if !actor.is_super_admin() {
        return Err(PortalError::NotSuperAdmin);
    }
    if !role.is_department() {
        return Err(RequestError::NotADepartment(role.to_string()).into());
    }
    let requests = backend
        .list_conversations(&ConversationQuery {
            target_role: Some(role),
            ..Default::default()
        })
        .await?;

    Ok(DepartmentDetail {
        role,
        counts: StatusCounts::tally(&requests),
        requests,
    })
}
