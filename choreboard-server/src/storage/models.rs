use crate::storage::schema::{assignments, chores, completions, people};
use chrono::{NaiveDate, NaiveDateTime};
use choreboard_shared::domain::{Frequency, UnknownFrequency};
use diesel::prelude::*;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = people)]
pub struct Person {
    pub id: i32,
    pub name: String,
}

#[derive(Insertable)]
#[diesel(table_name = people)]
pub struct NewPerson<'a> {
    pub name: &'a str,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = chores)]
pub struct Chore {
    pub id: i32,
    pub room: String,
    pub task: String,
    pub frequency: String,
    pub estimated_time: i32,
}

impl Chore {
    pub fn frequency(&self) -> Result<Frequency, UnknownFrequency> {
        self.frequency.parse()
    }
}

#[derive(Insertable)]
#[diesel(table_name = chores)]
pub struct NewChore<'a> {
    pub room: &'a str,
    pub task: &'a str,
    pub frequency: &'a str,
    pub estimated_time: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = assignments)]
#[diesel(belongs_to(Chore, foreign_key = chore_id))]
#[diesel(belongs_to(Person, foreign_key = person_id))]
pub struct Assignment {
    pub id: i32,
    pub chore_id: i32,
    pub person_id: i32,
    pub assigned_date: NaiveDate,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = assignments)]
pub struct NewAssignment {
    pub chore_id: i32,
    pub person_id: i32,
    pub assigned_date: NaiveDate,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = completions)]
pub struct Completion {
    pub id: i32,
    pub assignment_id: i32,
    pub completed_datetime: NaiveDateTime,
    pub actual_minutes: i32,
    pub photo_filename: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = completions)]
pub struct NewCompletion<'a> {
    pub assignment_id: i32,
    pub actual_minutes: i32,
    pub photo_filename: Option<&'a str>,
}

/// Assignment joined with its chore, person and optional completion.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = assignments)]
pub struct AssignmentView {
    #[diesel(select_expression = assignments::id)]
    pub assignment_id: i32,
    pub assigned_date: NaiveDate,
    pub chore_id: i32,
    #[diesel(select_expression = chores::room)]
    pub room: String,
    #[diesel(select_expression = chores::task)]
    pub task: String,
    #[diesel(select_expression = chores::estimated_time)]
    pub estimated_time: i32,
    pub person_id: i32,
    #[diesel(select_expression = people::name)]
    pub assigned_to: String,
    #[diesel(select_expression = completions::id.nullable())]
    #[diesel(select_expression_type = diesel::dsl::Nullable<completions::id>)]
    pub completion_id: Option<i32>,
    #[diesel(select_expression = completions::completed_datetime.nullable())]
    #[diesel(select_expression_type = diesel::dsl::Nullable<completions::completed_datetime>)]
    pub completed_datetime: Option<NaiveDateTime>,
    #[diesel(select_expression = completions::actual_minutes.nullable())]
    #[diesel(select_expression_type = diesel::dsl::Nullable<completions::actual_minutes>)]
    pub actual_minutes: Option<i32>,
    #[diesel(select_expression = completions::photo_filename.nullable())]
    #[diesel(select_expression_type = diesel::dsl::Nullable<completions::photo_filename>)]
    pub photo_filename: Option<String>,
}

impl AssignmentView {
    pub fn is_completed(&self) -> bool {
        self.completion_id.is_some()
    }
}
