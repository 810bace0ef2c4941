//! Trigger types: the repository events a rule can react to.

pub const PR_CREATED: &str = "pr_created";
pub const PR_UPDATED: &str = "pr_updated";
pub const PR_CLOSED: &str = "pr_closed";
pub const PR_REOPENED: &str = "pr_reopened";
pub const BASE_BRANCH_UPDATED: &str = "base_branch_updated";
pub const STATUS_UPDATED: &str = "status_updated";
pub const REVIEW_UPDATED: &str = "review_updated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerType {
    pub key: &'static str,
    pub label: &'static str,
}

pub fn builtin() -> Vec<TriggerType> {
    vec![
        TriggerType {
            key: PR_CREATED,
            label: "Pull request created",
        },
        TriggerType {
            key: PR_UPDATED,
            label: "Pull request updated",
        },
        TriggerType {
            key: PR_CLOSED,
            label: "Pull request closed",
        },
        TriggerType {
            key: PR_REOPENED,
            label: "Pull request reopened",
        },
        TriggerType {
            key: BASE_BRANCH_UPDATED,
            label: "Base branch updated",
        },
        TriggerType {
            key: STATUS_UPDATED,
            label: "Commit status updated",
        },
        TriggerType {
            key: REVIEW_UPDATED,
            label: "Review updated",
        },
    ]
}
