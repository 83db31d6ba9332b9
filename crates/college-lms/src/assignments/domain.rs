use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AssignmentId, CourseId, SubmissionId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub course_id: CourseId,
    pub title: String,
    pub max_points: u32,
    pub due_at: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn is_late(&self, at: DateTime<Utc>) -> bool {
        self.due_at.is_some_and(|due| at > due)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAssignment {
    pub course_id: CourseId,
    pub title: String,
    pub max_points: u32,
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssignmentDraft {
    pub title: String,
    pub max_points: u32,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    Graded,
}

impl SubmissionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Graded => "graded",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        match raw {
            "submitted" => Some(SubmissionStatus::Submitted),
            "graded" => Some(SubmissionStatus::Graded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub assignment_id: AssignmentId,
    pub user_id: UserId,
    pub content: String,
    pub submitted_at: DateTime<Utc>,
    pub late: bool,
    pub status: SubmissionStatus,
    pub score: Option<u32>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission {
    pub assignment_id: AssignmentId,
    pub user_id: UserId,
    pub content: String,
    pub submitted_at: DateTime<Utc>,
    pub late: bool,
}
