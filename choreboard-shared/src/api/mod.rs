use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{CompletionStatus, Frequency};

pub mod endpoints;

pub const API_V1_PREFIX: &str = "/api/v1";

// Version
#[derive(Debug, Serialize, Deserialize)]
pub struct VersionDto {
    pub version: String,
}

// People
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonDto {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewPersonReq {
    pub name: String,
}

// Chores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoreDto {
    pub id: i32,
    pub room: String,
    pub task: String,
    pub frequency: Frequency,
    pub estimated_time: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewChoreReq {
    pub room: String,
    pub task: String,
    pub frequency: Frequency,
    pub estimated_time: i32,
}

// Assignments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentDto {
    pub id: i32,
    pub chore_id: i32,
    pub person_id: i32,
    pub assigned_date: NaiveDate,
}

/// One row of a day's chore board: the assignment joined with its chore,
/// person and (if any) completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentViewDto {
    pub assignment_id: i32,
    pub chore_id: i32,
    pub room: String,
    pub task: String,
    pub estimated_time: i32,
    pub person_id: i32,
    pub assigned_to: String,
    pub is_completed: bool,
    pub completed_datetime: Option<String>, // RFC3339 UTC
    pub actual_minutes: Option<i32>,
    pub photo_filename: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DayProgressDto {
    pub total: usize,
    pub completed: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DayAssignmentsDto {
    pub date: NaiveDate,
    pub progress: DayProgressDto,
    pub assignments: Vec<AssignmentViewDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignReq {
    pub person_id: i32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CopyReq {
    /// Defaults to the day before the target date.
    pub from_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CopyResp {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub copied: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResp {
    pub deleted: usize,
}

// Completion
#[derive(Debug, Serialize, Deserialize)]
pub struct PhotoUpload {
    pub filename: String,
    pub data_base64: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteReq {
    pub actual_minutes: i32,
    pub photo: Option<PhotoUpload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionDto {
    pub id: i32,
    pub assignment_id: i32,
    pub completed_datetime: String, // RFC3339 UTC
    pub actual_minutes: i32,
    pub photo_filename: Option<String>,
}

// Report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRowDto {
    pub assigned_date: NaiveDate,
    pub room: String,
    pub task: String,
    pub assigned_to: String,
    pub estimated_time: i32,
    pub status: CompletionStatus,
    pub actual_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummaryDto {
    pub total: usize,
    pub completed: usize,
    pub completion_rate: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportDto {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub summary: ReportSummaryDto,
    pub rows: Vec<ReportRowDto>,
}
