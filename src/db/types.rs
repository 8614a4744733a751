use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    Admin,
    Teacher,
    Student,
}

impl UserRole {
    pub(crate) fn can_author(self) -> bool {
        matches!(self, Self::Admin | Self::Teacher)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "documentkind", rename_all = "snake_case")]
pub(crate) enum DocumentKind {
    AnswerSheet,
    AnswerKey,
}

impl DocumentKind {
    pub(crate) fn storage_prefix(self) -> &'static str {
        match self {
            Self::AnswerSheet => "answer-sheets",
            Self::AnswerKey => "answer-keys",
        }
    }
}

/// Lifecycle of one queued answer-sheet evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "jobstatus", rename_all = "lowercase")]
pub(crate) enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}
