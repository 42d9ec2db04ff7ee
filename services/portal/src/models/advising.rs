//! Advising record and course models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Review status of an advising record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvisingStatus {
    Pending,
    #[serde(alias = "Accepted")]
    Approved,
    Rejected,
}

impl AdvisingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdvisingStatus::Pending => "Pending",
            AdvisingStatus::Approved => "Approved",
            AdvisingStatus::Rejected => "Rejected",
        }
    }

    /// Only pending records may be edited by their owner
    pub fn is_editable(&self) -> bool {
        matches!(self, AdvisingStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_editable()
    }
}

impl fmt::Display for AdvisingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdvisingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Pending" => Ok(AdvisingStatus::Pending),
            "Approved" | "Accepted" => Ok(AdvisingStatus::Approved),
            "Rejected" => Ok(AdvisingStatus::Rejected),
            other => Err(format!("Unknown advising status: {}", other)),
        }
    }
}

/// Per-course status tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseStatus {
    Planned,
    Completed,
    Current,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Planned => "Planned",
            CourseStatus::Completed => "Completed",
            CourseStatus::Current => "Current",
        }
    }
}

impl FromStr for CourseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Planned" => Ok(CourseStatus::Planned),
            "Completed" => Ok(CourseStatus::Completed),
            "Current" => Ok(CourseStatus::Current),
            other => Err(format!("Unknown course status: {}", other)),
        }
    }
}

/// Advising record entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisingRecord {
    pub id: i64,
    pub account_id: Uuid,
    pub current_term: String,
    pub last_term: Option<String>,
    pub last_gpa: Option<String>,
    pub status: AdvisingStatus,
    pub advisor_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Course row attached to an advising record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedCourse {
    pub id: i64,
    pub record_id: i64,
    pub account_id: Uuid,
    pub course_name: String,
    pub course_level: Option<String>,
    pub status: CourseStatus,
    pub term: String,
}

/// Historical course ledger row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakenCourse {
    pub id: i64,
    pub account_id: Uuid,
    pub course_name: String,
    pub term: String,
    pub grade: Option<String>,
}

/// A record together with the names of all its courses
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub record: AdvisingRecord,
    pub courses: Vec<String>,
}

/// Write request for one advising save
///
/// `courses` must already be checked against the completed set and
/// de-duplicated; the store writes them verbatim as `Planned` rows.
#[derive(Debug, Clone)]
pub struct FormSave {
    pub record_id: Option<i64>,
    pub account_id: Uuid,
    pub current_term: String,
    pub last_term: Option<String>,
    pub last_gpa: Option<String>,
    pub courses: Vec<String>,
}

/// Result of a transactional save
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(i64),
    /// The record exists but is no longer pending; nothing was written
    Locked(AdvisingStatus),
    /// No record with that id belongs to the account; nothing was written
    Missing,
}

/// Recipient details for a decision notification
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTarget {
    pub email: String,
    pub first_name: String,
    pub current_term: String,
}

/// Canonical form of a course name for duplicate detection
///
/// En-dashes become ASCII hyphens before case folding, so "CS 101 – Intro"
/// and "cs 101 - intro" compare equal.
pub fn normalize_course_name(name: &str) -> String {
    name.trim().replace('\u{2013}', "-").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing_accepts_alias() {
        assert_eq!(
            "Accepted".parse::<AdvisingStatus>(),
            Ok(AdvisingStatus::Approved)
        );
        assert_eq!(
            "Rejected".parse::<AdvisingStatus>(),
            Ok(AdvisingStatus::Rejected)
        );
        assert!("Done".parse::<AdvisingStatus>().is_err());
    }

    #[test]
    fn test_status_serde_alias() {
        let status: AdvisingStatus = serde_json::from_str("\"Accepted\"").unwrap();
        assert_eq!(status, AdvisingStatus::Approved);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"Approved\"");
    }

    #[test]
    fn test_only_pending_is_editable() {
        assert!(AdvisingStatus::Pending.is_editable());
        assert!(AdvisingStatus::Approved.is_terminal());
        assert!(AdvisingStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_normalize_course_name() {
        assert_eq!(
            normalize_course_name("CS 450 \u{2013} Database Concepts"),
            "cs 450 - database concepts"
        );
        assert_eq!(
            normalize_course_name("  CS 450 - DATABASE Concepts "),
            "cs 450 - database concepts"
        );
        assert_ne!(normalize_course_name("CS101"), normalize_course_name("CS102"));
    }
}
