//! Per-request access decision for a content body.
//!
//! [`can_view`] runs on every read, so it stays pure: no I/O, no clock, no
//! allocation. A missing record and an unpublished one produce the same
//! answer, so readers cannot discover drafts.

use serde::Serialize;

use crate::domain::content::{ContentRecord, ContentStatus, Visibility};

/// Membership state of whoever is reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipTier {
    #[default]
    Anonymous,
    FreeMember,
    PaidMember,
}

impl MembershipTier {
    /// Reads the tier forwarded by the upstream member session layer.
    /// Anything missing or unrecognised is treated as anonymous.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("free") | Some("free_member") => MembershipTier::FreeMember,
            Some("paid") | Some("paid_member") => MembershipTier::PaidMember,
            _ => MembershipTier::Anonymous,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Render as "not found"
    NotPublished,
    /// Render a teaser with a call to action
    UpgradeRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Allowed,
    Denied(DenyReason),
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allowed)
    }
}

pub fn can_view(record: Option<&ContentRecord>, viewer: MembershipTier) -> Access {
    let Some(record) = record.filter(|r| r.status == ContentStatus::Published) else {
        return Access::Denied(DenyReason::NotPublished);
    };

    let allowed = match record.visibility {
        Visibility::Public => true,
        Visibility::MembersOnly => matches!(
            viewer,
            MembershipTier::FreeMember | MembershipTier::PaidMember
        ),
        Visibility::PaidMembersOnly => viewer == MembershipTier::PaidMember,
    };

    if allowed {
        Access::Allowed
    } else {
        Access::Denied(DenyReason::UpgradeRequired)
    }
}
