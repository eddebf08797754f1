pub mod models;
pub mod schema;

use std::time::Duration;

use chrono::NaiveDate;
use choreboard_shared::domain::{ChoreTemplate, Frequency};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use models::{
    Assignment, AssignmentView, Chore, Completion, NewAssignment, NewChore, NewCompletion,
    NewPerson, Person,
};
use tracing::{debug, info, trace};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Structured error type for all storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A Diesel ORM error (query failure, constraint violation, etc.)
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Failed to acquire or build a connection from the pool.
    #[error("pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// A `spawn_blocking` task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A database migration failed to apply.
    #[error("migration error: {0}")]
    Migration(String),

    /// The caller supplied invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The write would break a uniqueness rule.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Narrows a day's assignment list. The default keeps every row.
#[derive(Debug, Clone, Default)]
pub struct AssignmentFilter {
    pub person_id: Option<i32>,
    pub pending_only: bool,
}

#[derive(Clone)]
pub struct Store {
    pool: Pool<ConnectionManager<SqliteConnection>>,
}

impl Store {
    pub async fn connect_sqlite(path: &str) -> Result<Self, StorageError> {
        let manager = ConnectionManager::<SqliteConnection>::new(path);
        let pool = Pool::builder()
            .max_size(8)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?;
        let store = Store { pool };

        // Run pending Diesel migrations on startup (auto-init empty DBs)
        store
            .run(|conn| {
                conn.run_pending_migrations(MIGRATIONS)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
                Ok(())
            })
            .await?;
        info!(path, "storage ready");
        Ok(store)
    }

    /// Runs `f` on a pooled connection off the async runtime. The connection
    /// goes back to the pool when `f` returns, on success and on error.
    async fn run<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, StorageError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<T, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            f(&mut conn)
        })
        .await?
    }

    /// Inserts missing people (by name) and chores (by room + task).
    /// Existing chores get their frequency and estimate refreshed.
    pub async fn seed(
        &self,
        cfg_people: &[String],
        cfg_chores: &[ChoreTemplate],
    ) -> Result<(), StorageError> {
        for n in cfg_people {
            validate_name(n)?;
        }
        for c in cfg_chores {
            validate_chore(&c.room, &c.task, c.estimated_time)?;
        }
        let people_owned = cfg_people.to_owned();
        let chores_owned = cfg_chores.to_owned();
        self.run(move |conn| {
            use schema::{chores, people};
            conn.immediate_transaction(|conn| -> Result<(), StorageError> {
                for n in &people_owned {
                    let n = n.trim();
                    let count: i64 = people::table
                        .filter(people::name.eq(n))
                        .count()
                        .get_result(conn)?;
                    if count == 0 {
                        diesel::insert_into(people::table)
                            .values(&NewPerson { name: n })
                            .execute(conn)?;
                    }
                }

                for c in &chores_owned {
                    let (room, task) = (c.room.trim(), c.task.trim());
                    let updated = diesel::update(
                        chores::table
                            .filter(chores::room.eq(room))
                            .filter(chores::task.eq(task)),
                    )
                    .set((
                        chores::frequency.eq(c.frequency.as_str()),
                        chores::estimated_time.eq(c.estimated_time),
                    ))
                    .execute(conn)?;
                    if updated == 0 {
                        diesel::insert_into(chores::table)
                            .values(&NewChore {
                                room,
                                task,
                                frequency: c.frequency.as_str(),
                                estimated_time: c.estimated_time,
                            })
                            .execute(conn)?;
                    }
                }
                Ok(())
            })
        })
        .await?;
        debug!(
            people = cfg_people.len(),
            chores = cfg_chores.len(),
            "seeded from config"
        );
        Ok(())
    }

    pub async fn list_people(&self) -> Result<Vec<Person>, StorageError> {
        use schema::people::dsl::*;
        self.run(|conn| {
            Ok(people
                .order((name.asc(), id.asc()))
                .load::<Person>(conn)?)
        })
        .await
    }

    pub async fn get_person(&self, person_id: i32) -> Result<Option<Person>, StorageError> {
        use schema::people::dsl::*;
        self.run(move |conn| {
            Ok(people
                .filter(id.eq(person_id))
                .first::<Person>(conn)
                .optional()?)
        })
        .await
    }

    pub async fn add_person(&self, person_name: &str) -> Result<Person, StorageError> {
        use schema::people;
        validate_name(person_name)?;
        let owned = person_name.trim().to_string();
        let person = self
            .run(move |conn| {
                Ok(diesel::insert_into(people::table)
                    .values(&NewPerson { name: &owned })
                    .get_result::<Person>(conn)?)
            })
            .await?;
        info!(person_id = person.id, name = %person.name, "person added");
        Ok(person)
    }

    pub async fn list_chores(&self) -> Result<Vec<Chore>, StorageError> {
        use schema::chores::dsl::*;
        self.run(|conn| {
            Ok(chores
                .order((room.asc(), task.asc(), id.asc()))
                .load::<Chore>(conn)?)
        })
        .await
    }

    pub async fn get_chore(&self, chore_id: i32) -> Result<Option<Chore>, StorageError> {
        use schema::chores::dsl::*;
        self.run(move |conn| {
            Ok(chores
                .filter(id.eq(chore_id))
                .first::<Chore>(conn)
                .optional()?)
        })
        .await
    }

    pub async fn add_chore(
        &self,
        room: &str,
        task: &str,
        frequency: Frequency,
        estimated_time: i32,
    ) -> Result<Chore, StorageError> {
        use schema::chores;
        validate_chore(room, task, estimated_time)?;
        let room_owned = room.trim().to_string();
        let task_owned = task.trim().to_string();
        let chore = self
            .run(move |conn| {
                Ok(diesel::insert_into(chores::table)
                    .values(&NewChore {
                        room: &room_owned,
                        task: &task_owned,
                        frequency: frequency.as_str(),
                        estimated_time,
                    })
                    .get_result::<Chore>(conn)?)
            })
            .await?;
        info!(chore_id = chore.id, room = %chore.room, task = %chore.task, "chore added");
        Ok(chore)
    }

    pub async fn get_assignment(&self, id_: i32) -> Result<Option<Assignment>, StorageError> {
        use schema::assignments::dsl::*;
        self.run(move |conn| {
            Ok(assignments
                .filter(id.eq(id_))
                .first::<Assignment>(conn)
                .optional()?)
        })
        .await
    }

    /// All assignments for `date` with chore, person and completion columns,
    /// ordered by room then task.
    pub async fn assignments_for_date(
        &self,
        date: NaiveDate,
        filter: AssignmentFilter,
    ) -> Result<Vec<AssignmentView>, StorageError> {
        self.run(move |conn| {
            use schema::{assignments as a, chores, completions, people};
            let mut query = a::table
                .inner_join(chores::table.on(chores::id.eq(a::chore_id)))
                .inner_join(people::table.on(people::id.eq(a::person_id)))
                .left_join(completions::table.on(completions::assignment_id.eq(a::id)))
                .filter(a::assigned_date.eq(date))
                .order((chores::room.asc(), chores::task.asc(), a::id.asc()))
                .select(AssignmentView::as_select())
                .into_boxed();
            if let Some(pid) = filter.person_id {
                query = query.filter(a::person_id.eq(pid));
            }
            if filter.pending_only {
                query = query.filter(completions::id.is_null());
            }
            Ok(query.load::<AssignmentView>(conn)?)
        })
        .await
    }

    /// Assigns `chore` on `date` to `person`, replacing whoever had it.
    pub async fn assign_chore(
        &self,
        chore: i32,
        person: i32,
        date: NaiveDate,
    ) -> Result<Assignment, StorageError> {
        use schema::assignments::dsl as a;
        trace!(chore_id = chore, person_id = person, %date, "assign_chore starting");
        let assignment = self
            .run(move |conn| {
                conn.immediate_transaction(|conn| -> Result<Assignment, StorageError> {
                    ensure_chore_exists(conn, chore)?;
                    ensure_person_exists(conn, person)?;
                    let same_slot = || a::chore_id.eq(chore).and(a::assigned_date.eq(date));
                    let existing: Option<i32> = a::assignments
                        .filter(same_slot())
                        .select(a::id)
                        .first::<i32>(conn)
                        .optional()?;
                    if existing.is_some() {
                        diesel::update(a::assignments.filter(same_slot()))
                            .set(a::person_id.eq(person))
                            .execute(conn)?;
                        Ok(a::assignments
                            .filter(same_slot())
                            .order(a::id.asc())
                            .first::<Assignment>(conn)?)
                    } else {
                        let row = NewAssignment {
                            chore_id: chore,
                            person_id: person,
                            assigned_date: date,
                        };
                        Ok(diesel::insert_into(a::assignments)
                            .values(&row)
                            .get_result::<Assignment>(conn)?)
                    }
                })
            })
            .await?;
        debug!(
            assignment_id = assignment.id,
            chore_id = chore,
            person_id = person,
            %date,
            "chore assigned"
        );
        Ok(assignment)
    }

    /// Replaces every assignment on `to` with a copy of those on `from`.
    /// Both steps share one transaction. Returns the number of rows copied;
    /// `to` is cleared even when `from` has nothing to copy.
    pub async fn copy_assignments(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<usize, StorageError> {
        use schema::assignments::dsl as a;
        if from == to {
            return Err(StorageError::InvalidInput(
                "source and target dates must differ".to_string(),
            ));
        }
        let (cleared, copied) = self
            .run(move |conn| {
                conn.immediate_transaction(|conn| -> Result<(usize, usize), StorageError> {
                    let source: Vec<(i32, i32)> = a::assignments
                        .filter(a::assigned_date.eq(from))
                        .order(a::id.asc())
                        .select((a::chore_id, a::person_id))
                        .load::<(i32, i32)>(conn)?;
                    let cleared =
                        diesel::delete(a::assignments.filter(a::assigned_date.eq(to)))
                            .execute(conn)?;
                    if source.is_empty() {
                        return Ok((cleared, 0));
                    }
                    let rows: Vec<NewAssignment> = source
                        .into_iter()
                        .map(|(chore_id, person_id)| NewAssignment {
                            chore_id,
                            person_id,
                            assigned_date: to,
                        })
                        .collect();
                    let copied = diesel::insert_into(a::assignments)
                        .values(&rows)
                        .execute(conn)?;
                    Ok((cleared, copied))
                })
            })
            .await?;
        info!(%from, %to, cleared, copied, "assignments copied");
        Ok(copied)
    }

    /// Deletes every assignment on `date`; returns how many went away.
    pub async fn clear_assignments(&self, date: NaiveDate) -> Result<usize, StorageError> {
        use schema::assignments::dsl::*;
        let deleted = self
            .run(move |conn| {
                Ok(diesel::delete(assignments.filter(assigned_date.eq(date))).execute(conn)?)
            })
            .await?;
        info!(%date, deleted, "assignments cleared");
        Ok(deleted)
    }

    /// Deletes one assignment. Its completion, if any, stays behind.
    pub async fn delete_assignment(&self, id_: i32) -> Result<bool, StorageError> {
        use schema::assignments::dsl::*;
        let deleted = self
            .run(move |conn| Ok(diesel::delete(assignments.filter(id.eq(id_))).execute(conn)?))
            .await?;
        debug!(assignment_id = id_, deleted, "delete_assignment");
        Ok(deleted > 0)
    }

    /// Records the completion of an assignment. An assignment can be
    /// completed once; a second attempt is a `Conflict`.
    pub async fn mark_complete(
        &self,
        assignment: i32,
        actual_minutes: i32,
        photo_filename: Option<String>,
    ) -> Result<Completion, StorageError> {
        use schema::{assignments, completions};
        validate_minutes(actual_minutes)?;
        let completion = self
            .run(move |conn| {
                conn.immediate_transaction(|conn| -> Result<Completion, StorageError> {
                    let exists: i64 = assignments::table
                        .filter(assignments::id.eq(assignment))
                        .count()
                        .get_result(conn)?;
                    if exists == 0 {
                        return Err(StorageError::NotFound(format!(
                            "assignment {}",
                            assignment
                        )));
                    }
                    let done: i64 = completions::table
                        .filter(completions::assignment_id.eq(assignment))
                        .count()
                        .get_result(conn)?;
                    if done > 0 {
                        return Err(already_completed(assignment));
                    }
                    let rec = NewCompletion {
                        assignment_id: assignment,
                        actual_minutes,
                        photo_filename: photo_filename.as_deref(),
                    };
                    diesel::insert_into(completions::table)
                        .values(&rec)
                        .get_result::<Completion>(conn)
                        .map_err(|e| match e {
                            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                                already_completed(assignment)
                            }
                            other => StorageError::Database(other),
                        })
                })
            })
            .await?;
        info!(
            assignment_id = assignment,
            completion_id = completion.id,
            actual_minutes,
            photo = completion.photo_filename.is_some(),
            "chore completed"
        );
        Ok(completion)
    }

    /// Assignments dated within `[start, end]`, newest day first, then by
    /// room and task. An inverted range yields nothing.
    pub async fn assignments_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AssignmentView>, StorageError> {
        if end < start {
            return Ok(Vec::new());
        }
        self.run(move |conn| {
            use schema::{assignments as a, chores, completions, people};
            Ok(a::table
                .inner_join(chores::table.on(chores::id.eq(a::chore_id)))
                .inner_join(people::table.on(people::id.eq(a::person_id)))
                .left_join(completions::table.on(completions::assignment_id.eq(a::id)))
                .filter(a::assigned_date.between(start, end))
                .order((
                    a::assigned_date.desc(),
                    chores::room.asc(),
                    chores::task.asc(),
                    a::id.asc(),
                ))
                .select(AssignmentView::as_select())
                .load::<AssignmentView>(conn)?)
        })
        .await
    }
}

fn ensure_chore_exists(conn: &mut SqliteConnection, chore: i32) -> Result<(), StorageError> {
    use schema::chores::dsl::*;
    let count: i64 = chores.filter(id.eq(chore)).count().get_result(conn)?;
    if count == 0 {
        return Err(StorageError::NotFound(format!("chore {}", chore)));
    }
    Ok(())
}

fn ensure_person_exists(conn: &mut SqliteConnection, person: i32) -> Result<(), StorageError> {
    use schema::people::dsl::*;
    let count: i64 = people.filter(id.eq(person)).count().get_result(conn)?;
    if count == 0 {
        return Err(StorageError::NotFound(format!("person {}", person)));
    }
    Ok(())
}

fn already_completed(assignment: i32) -> StorageError {
    StorageError::Conflict(format!("assignment {} is already completed", assignment))
}

fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.trim().is_empty() {
        return Err(StorageError::InvalidInput(
            "name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_chore(room: &str, task: &str, estimated_time: i32) -> Result<(), StorageError> {
    if room.trim().is_empty() {
        return Err(StorageError::InvalidInput(
            "room must not be empty".to_string(),
        ));
    }
    if task.trim().is_empty() {
        return Err(StorageError::InvalidInput(
            "task must not be empty".to_string(),
        ));
    }
    if estimated_time < 1 {
        return Err(StorageError::InvalidInput(
            "estimated_time must be at least 1 minute".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_minutes(actual_minutes: i32) -> Result<(), StorageError> {
    if actual_minutes < 1 {
        return Err(StorageError::InvalidInput(
            "actual_minutes must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn configure_sqlite_conn(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    // Enable WAL for better read/write concurrency and set a busy timeout
    diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
    diesel::sql_query("PRAGMA synchronous=NORMAL;").execute(conn)?;
    diesel::sql_query("PRAGMA busy_timeout=5000;").execute(conn)?;
    diesel::sql_query("PRAGMA foreign_keys=ON;").execute(conn)?;
    Ok(())
}
