//! Board filter criteria.
//!
//! Filters are pure predicates over the joined task view; the engine
//! applies them at read time so the canonical task list stays unfiltered
//! and reconciliation never has to care about the active filter set.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::TaskWithAssignee;

/// Assignee criterion for the board filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssigneeFilter {
    /// No assignee restriction.
    #[default]
    Any,
    /// Only tasks with no assignee.
    Unassigned,
    /// Only tasks assigned to this user.
    User(Uuid),
}

impl AssigneeFilter {
    fn matches(self, assignee_id: Option<Uuid>) -> bool {
        match self {
            Self::Any => true,
            Self::Unassigned => assignee_id.is_none(),
            Self::User(id) => assignee_id == Some(id),
        }
    }
}

/// Active board filters. All set criteria must match (conjunction); the
/// default value matches every task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilters {
    /// Case-insensitive substring match against title and description.
    #[serde(default)]
    pub search: Option<String>,
    /// Assignee restriction.
    #[serde(default)]
    pub assignee: AssigneeFilter,
    /// Earliest creation date (inclusive, UTC calendar day).
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    /// Latest creation date (inclusive, UTC calendar day).
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
}

impl TaskFilters {
    /// True if no criterion is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.search.is_none()
            && matches!(self.assignee, AssigneeFilter::Any)
            && self.date_from.is_none()
            && self.date_to.is_none()
    }

    /// Whether a task passes every set criterion.
    ///
    /// Date bounds compare against the task's creation day in UTC, so
    /// `date_to` includes the whole of that day.
    #[must_use]
    pub fn matches(&self, task: &TaskWithAssignee) -> bool {
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !needle.is_empty()
                && !task.task.title.to_lowercase().contains(&needle)
                && !task.task.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if !self.assignee.matches(task.task.assignee_id) {
            return false;
        }
        let created = task.task.created_at.date_naive();
        if let Some(from) = self.date_from
            && created < from
        {
            return false;
        }
        if let Some(to) = self.date_to
            && created > to
        {
            return false;
        }
        true
    }
}
