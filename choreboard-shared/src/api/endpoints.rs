use chrono::NaiveDate;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use super::API_V1_PREFIX;

fn base_join(base: &str, path: &str) -> String {
    let b = base.trim_end_matches('/');
    let p = path.trim_start_matches('/');
    format!("{}/{}", b, p)
}

fn enc(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

pub fn version(base: &str) -> String {
    base_join(base, &format!("{}/version", API_V1_PREFIX))
}
pub fn people(base: &str) -> String {
    base_join(base, &format!("{}/people", API_V1_PREFIX))
}
pub fn chores(base: &str) -> String {
    base_join(base, &format!("{}/chores", API_V1_PREFIX))
}
pub fn day_assignments(base: &str, date: NaiveDate) -> String {
    base_join(base, &format!("{}/days/{}/assignments", API_V1_PREFIX, date))
}
pub fn day_chore(base: &str, date: NaiveDate, chore_id: i32) -> String {
    base_join(
        base,
        &format!("{}/days/{}/chores/{}", API_V1_PREFIX, date, chore_id),
    )
}
pub fn day_copy(base: &str, date: NaiveDate) -> String {
    base_join(base, &format!("{}/days/{}/copy", API_V1_PREFIX, date))
}
pub fn assignment(base: &str, id: i32) -> String {
    base_join(base, &format!("{}/assignments/{}", API_V1_PREFIX, id))
}
pub fn assignment_complete(base: &str, id: i32) -> String {
    base_join(
        base,
        &format!("{}/assignments/{}/complete", API_V1_PREFIX, id),
    )
}
pub fn report(base: &str, start: NaiveDate, end: NaiveDate) -> String {
    base_join(
        base,
        &format!("{}/report?start={}&end={}", API_V1_PREFIX, start, end),
    )
}
pub fn report_csv(base: &str, start: NaiveDate, end: NaiveDate) -> String {
    base_join(
        base,
        &format!("{}/report.csv?start={}&end={}", API_V1_PREFIX, start, end),
    )
}
pub fn photo(base: &str, id: &str) -> String {
    base_join(base, &format!("{}/photos/{}", API_V1_PREFIX, enc(id)))
}
