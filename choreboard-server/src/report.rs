//! Completion history over a date range, and its CSV rendering.

use chrono::NaiveDate;
use choreboard_shared::api::{ReportRowDto, ReportSummaryDto};
use choreboard_shared::domain::{CompletionStatus, completion_rate};

use crate::storage::models::AssignmentView;
use crate::storage::{StorageError, Store};

pub const CSV_HEADER: [&str; 7] = [
    "assigned_date",
    "room",
    "task",
    "assigned_to",
    "estimated_time",
    "status",
    "actual_minutes",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub assigned_date: NaiveDate,
    pub room: String,
    pub task: String,
    pub assigned_to: String,
    pub estimated_time: i32,
    pub status: CompletionStatus,
    pub actual_minutes: Option<i32>,
}

impl From<AssignmentView> for ReportRow {
    fn from(v: AssignmentView) -> Self {
        ReportRow {
            status: CompletionStatus::from_completed(v.is_completed()),
            assigned_date: v.assigned_date,
            room: v.room,
            task: v.task,
            assigned_to: v.assigned_to,
            estimated_time: v.estimated_time,
            actual_minutes: v.actual_minutes,
        }
    }
}

impl From<ReportRow> for ReportRowDto {
    fn from(r: ReportRow) -> Self {
        ReportRowDto {
            assigned_date: r.assigned_date,
            room: r.room,
            task: r.task,
            assigned_to: r.assigned_to,
            estimated_time: r.estimated_time,
            status: r.status,
            actual_minutes: r.actual_minutes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportSummary {
    pub total: usize,
    pub completed: usize,
    pub completion_rate: f64,
}

impl ReportSummary {
    pub fn from_rows(rows: &[ReportRow]) -> Self {
        let total = rows.len();
        let completed = rows
            .iter()
            .filter(|r| r.status == CompletionStatus::Complete)
            .count();
        ReportSummary {
            total,
            completed,
            completion_rate: completion_rate(completed, total),
        }
    }
}

impl From<ReportSummary> for ReportSummaryDto {
    fn from(s: ReportSummary) -> Self {
        ReportSummaryDto {
            total: s.total,
            completed: s.completed,
            completion_rate: s.completion_rate,
        }
    }
}

/// Progress for a single day's board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayProgress {
    pub total: usize,
    pub completed: usize,
}

impl DayProgress {
    pub fn from_views(rows: &[AssignmentView]) -> Self {
        DayProgress {
            total: rows.len(),
            completed: rows.iter().filter(|r| r.is_completed()).count(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub rows: Vec<ReportRow>,
    pub summary: ReportSummary,
}

impl Report {
    pub async fn load(store: &Store, start: NaiveDate, end: NaiveDate) -> Result<Self, StorageError> {
        let rows: Vec<ReportRow> = store
            .assignments_in_range(start, end)
            .await?
            .into_iter()
            .map(ReportRow::from)
            .collect();
        let summary = ReportSummary::from_rows(&rows);
        Ok(Report {
            start,
            end,
            rows,
            summary,
        })
    }

    pub fn csv_filename(&self) -> String {
        format!("chore_assignments_{}_to_{}.csv", self.start, self.end)
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_record(&mut out, CSV_HEADER.iter().map(|s| s.to_string()));
        for r in &self.rows {
            push_record(
                &mut out,
                [
                    r.assigned_date.to_string(),
                    r.room.clone(),
                    r.task.clone(),
                    r.assigned_to.clone(),
                    r.estimated_time.to_string(),
                    r.status.to_string(),
                    r.actual_minutes.map(|m| m.to_string()).unwrap_or_default(),
                ],
            );
        }
        out
    }
}

fn push_record(out: &mut String, fields: impl IntoIterator<Item = String>) {
    for (i, f) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(&f));
    }
    out.push('\n');
}

fn escape_field(f: &str) -> String {
    if f.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", f.replace('"', "\"\""))
    } else {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(d: u32, task: &str, done: Option<i32>) -> ReportRow {
        ReportRow {
            assigned_date: NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
            room: "Kitchen".into(),
            task: task.into(),
            assigned_to: "Alice".into(),
            estimated_time: 10,
            status: CompletionStatus::from_completed(done.is_some()),
            actual_minutes: done,
        }
    }

    fn report(rows: Vec<ReportRow>) -> Report {
        let summary = ReportSummary::from_rows(&rows);
        Report {
            start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
            rows,
            summary,
        }
    }

    #[test]
    fn empty_range_has_zero_rate() {
        let s = ReportSummary::from_rows(&[]);
        assert_eq!(s.total, 0);
        assert_eq!(s.completed, 0);
        assert_eq!(s.completion_rate, 0.0);
    }

    #[test]
    fn summary_counts_completed_rows() {
        let s = ReportSummary::from_rows(&[
            row(2, "Sweep", Some(12)),
            row(1, "Sweep", None),
            row(1, "Dishes", None),
            row(1, "Mop", Some(30)),
        ]);
        assert_eq!(s.total, 4);
        assert_eq!(s.completed, 2);
        assert_eq!(s.completion_rate, 50.0);
    }

    #[test]
    fn csv_has_header_and_blank_minutes() {
        let r = report(vec![row(2, "Sweep", Some(12)), row(1, "Dishes", None)]);
        let csv = r.to_csv();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "assigned_date,room,task,assigned_to,estimated_time,status,actual_minutes"
        );
        assert_eq!(lines[1], "2024-03-02,Kitchen,Sweep,Alice,10,Complete,12");
        assert_eq!(lines[2], "2024-03-01,Kitchen,Dishes,Alice,10,Incomplete,");
        assert_eq!(r.csv_filename(), "chore_assignments_2024-03-01_to_2024-03-07.csv");
    }

    #[test]
    fn csv_quotes_awkward_fields() {
        let mut awkward = row(1, "Wipe \"big\" table, then chairs", None);
        awkward.room = "Dining\nroom".into();
        let csv = report(vec![awkward]).to_csv();
        assert!(csv.contains("\"Dining\nroom\",\"Wipe \"\"big\"\" table, then chairs\""));
    }
}
