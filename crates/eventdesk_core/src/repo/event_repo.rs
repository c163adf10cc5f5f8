//! Event store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD, conflict counting and filtered paging over `events`.
//! - Render search filter clauses as SQL.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - `update_if_version`/`delete_if_version` are single CAS statements on
//!   `version`; zero affected rows is resolved to `NotFound` or
//!   `VersionMismatch`.
//! - `in_write_transaction` runs under `BEGIN IMMEDIATE`, so the conflict
//!   count and the write it guards cannot interleave with another writer.
//! - Read paths reject invalid persisted state instead of masking it.
//! - `created_at`/`updated_at` are assigned by SQL, never by callers.

use crate::concurrency::next_version;
use crate::conflict::ConflictQuery;
use crate::db::migrations::latest_version;
use crate::db::{register_text_functions, DbError};
use crate::model::event::{
    Event, EventId, EventStatus, EventType, EventVisibility, Version,
};
use crate::search::filter::{EventFilter, FilterClause};
use crate::search::page::{Page, PageRequest, Sort, SortDirection, SortKey};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const EVENT_SELECT_SQL: &str = "SELECT
    id,
    version,
    title,
    description,
    location,
    type,
    status,
    visibility,
    time_zone,
    start_at,
    end_at,
    created_at,
    updated_at
FROM events";

/// Epoch milliseconds evaluated by SQLite at statement time.
const NOW_MS_SQL: &str = "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)";

const REQUIRED_EVENT_COLUMNS: &[&str] = &[
    "id",
    "version",
    "title",
    "description",
    "location",
    "type",
    "status",
    "visibility",
    "time_zone",
    "start_at",
    "end_at",
    "created_at",
    "updated_at",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Store error for event persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(EventId),
    /// CAS lost: the stored version differs from the expected one.
    VersionMismatch {
        id: EventId,
        expected: Version,
        current: Version,
    },
    VersionOverflow(EventId),
    /// A write reported success but the row could not be read back.
    MissingAfterWrite(EventId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Store cannot serve requests (e.g. poisoned lock).
    Unavailable(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "event not found: {id}"),
            Self::VersionMismatch {
                id,
                expected,
                current,
            } => write!(
                f,
                "version mismatch for event {id}: expected {expected}, current {current}"
            ),
            Self::VersionOverflow(id) => write!(f, "version counter exhausted for event {id}"),
            Self::MissingAfterWrite(id) => write!(f, "event {id} missing after write"),
            Self::InvalidData(message) => write!(f, "invalid persisted event data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} is older than required {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
            Self::Unavailable(message) => write!(f, "event store unavailable: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Store contract consumed by the event service.
pub trait EventStore {
    /// Persists a new event and returns it as stored (timestamps set).
    fn insert(&self, event: &Event) -> RepoResult<Event>;

    /// Replaces the event's fields if its stored version equals `expected`,
    /// advancing the version by one.
    fn update_if_version(&self, event: &Event, expected: Version) -> RepoResult<Event>;

    /// Deletes the event; with `Some(expected)` only at that version.
    fn delete_if_version(&self, id: EventId, expected: Option<Version>) -> RepoResult<()>;

    fn find_by_id(&self, id: EventId) -> RepoResult<Option<Event>>;

    fn exists_by_id(&self, id: EventId) -> RepoResult<bool>;

    /// Counts non-canceled events at the query location overlapping its slot.
    fn count_overlaps(&self, query: &ConflictQuery) -> RepoResult<u64>;

    /// Returns one page of events matching `filter`.
    ///
    /// `page.sort = None` sorts by `start_at` ascending.
    fn query(&self, filter: &EventFilter, page: &PageRequest) -> RepoResult<Page<Event>>;

    /// Runs `f` as one serialized write unit. An `Err` rolls back.
    fn in_write_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>;
}

/// SQLite-backed event store.
pub struct SqliteEventStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEventStore<'conn> {
    /// Constructs a store from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        register_text_functions(conn)?;
        Ok(Self { conn })
    }

    fn current_version(&self, id: EventId) -> RepoResult<Option<Version>> {
        let mut stmt = self
            .conn
            .prepare("SELECT version FROM events WHERE id = ?1;")?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(row.get(0)?));
        }
        Ok(None)
    }

    fn lost_cas(&self, id: EventId, expected: Version) -> RepoError {
        match self.current_version(id) {
            Ok(Some(current)) => RepoError::VersionMismatch {
                id,
                expected,
                current,
            },
            Ok(None) => RepoError::NotFound(id),
            Err(err) => err,
        }
    }

    fn read_back(&self, id: EventId) -> RepoResult<Event> {
        self.find_by_id(id)?.ok_or(RepoError::MissingAfterWrite(id))
    }
}

impl EventStore for SqliteEventStore<'_> {
    fn insert(&self, event: &Event) -> RepoResult<Event> {
        self.conn.execute(
            &format!(
                "INSERT INTO events (
                    id,
                    version,
                    title,
                    description,
                    location,
                    type,
                    status,
                    visibility,
                    time_zone,
                    start_at,
                    end_at,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, {NOW_MS_SQL}, {NOW_MS_SQL});"
            ),
            params![
                event.id.to_string(),
                event.version,
                event.title.as_str(),
                event.description.as_deref(),
                event.location.as_deref(),
                event.event_type.as_str(),
                event.status.as_str(),
                event.visibility.as_str(),
                event.time_zone.as_str(),
                event.start_at.timestamp_millis(),
                event.end_at.timestamp_millis(),
            ],
        )?;

        self.read_back(event.id)
    }

    fn update_if_version(&self, event: &Event, expected: Version) -> RepoResult<Event> {
        let next = next_version(expected).ok_or(RepoError::VersionOverflow(event.id))?;
        let changed = self.conn.execute(
            &format!(
                "UPDATE events
                 SET
                    title = ?1,
                    description = ?2,
                    location = ?3,
                    type = ?4,
                    status = ?5,
                    visibility = ?6,
                    time_zone = ?7,
                    start_at = ?8,
                    end_at = ?9,
                    version = ?10,
                    updated_at = {NOW_MS_SQL}
                 WHERE id = ?11
                   AND version = ?12;"
            ),
            params![
                event.title.as_str(),
                event.description.as_deref(),
                event.location.as_deref(),
                event.event_type.as_str(),
                event.status.as_str(),
                event.visibility.as_str(),
                event.time_zone.as_str(),
                event.start_at.timestamp_millis(),
                event.end_at.timestamp_millis(),
                next,
                event.id.to_string(),
                expected,
            ],
        )?;

        if changed == 0 {
            return Err(self.lost_cas(event.id, expected));
        }

        self.read_back(event.id)
    }

    fn delete_if_version(&self, id: EventId, expected: Option<Version>) -> RepoResult<()> {
        let changed = match expected {
            Some(version) => self.conn.execute(
                "DELETE FROM events WHERE id = ?1 AND version = ?2;",
                params![id.to_string(), version],
            )?,
            None => self
                .conn
                .execute("DELETE FROM events WHERE id = ?1;", [id.to_string()])?,
        };

        if changed == 0 {
            return Err(match expected {
                Some(version) => self.lost_cas(id, version),
                None => RepoError::NotFound(id),
            });
        }

        Ok(())
    }

    fn find_by_id(&self, id: EventId) -> RepoResult<Option<Event>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{EVENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_event_row(row)?));
        }
        Ok(None)
    }

    fn exists_by_id(&self, id: EventId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM events WHERE id = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn count_overlaps(&self, query: &ConflictQuery) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM events
             WHERE location = ?1
               AND status <> 'canceled'
               AND start_at < ?3
               AND end_at > ?2
               AND (?4 IS NULL OR id <> ?4);",
            params![
                query.location.as_str(),
                query.start_at.timestamp_millis(),
                query.end_at.timestamp_millis(),
                query.exclude_id.map(|id| id.to_string()),
            ],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative overlap count {count}")))
    }

    fn query(&self, filter: &EventFilter, page: &PageRequest) -> RepoResult<Page<Event>> {
        let mut where_sql = String::from(" WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();
        for clause in filter.clauses() {
            push_clause_sql(clause, &mut where_sql, &mut bind_values);
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM events{where_sql};"),
            params_from_iter(bind_values.iter()),
            |row| row.get(0),
        )?;
        let total = u64::try_from(total)
            .map_err(|_| RepoError::InvalidData(format!("negative row count {total}")))?;

        let sort = page.sort_or(Sort::asc(SortKey::StartAt));
        let mut sql = format!(
            "{EVENT_SELECT_SQL}{where_sql} ORDER BY {} {}, id ASC LIMIT ? OFFSET ?",
            sort_column(sort.key),
            sort_direction(sort.direction)
        );
        sql.push(';');
        bind_values.push(Value::Integer(i64::from(page.size)));
        bind_values.push(Value::Integer(
            i64::try_from(page.offset()).unwrap_or(i64::MAX),
        ));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }

        Ok(Page::new(events, page, total))
    }

    fn in_write_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>,
    {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;
        let value = f(self)?;
        tx.commit().map_err(RepoError::from)?;
        Ok(value)
    }
}

fn push_clause_sql(clause: &FilterClause, sql: &mut String, bind_values: &mut Vec<Value>) {
    match clause {
        FilterClause::Text(needle) => {
            sql.push_str(
                " AND (instr(fold_case(title), ?) > 0
                    OR instr(fold_case(description), ?) > 0
                    OR instr(fold_case(location), ?) > 0)",
            );
            for _ in 0..3 {
                bind_values.push(Value::Text(needle.clone()));
            }
        }
        FilterClause::TitleContains(needle) => {
            sql.push_str(" AND instr(fold_case(title), ?) > 0");
            bind_values.push(Value::Text(needle.clone()));
        }
        FilterClause::DescriptionContains(needle) => {
            sql.push_str(" AND instr(fold_case(description), ?) > 0");
            bind_values.push(Value::Text(needle.clone()));
        }
        FilterClause::LocationEquals(value) => {
            sql.push_str(" AND location = ?");
            bind_values.push(Value::Text(value.clone()));
        }
        FilterClause::LocationContains(needle) => {
            sql.push_str(" AND instr(fold_case(location), ?) > 0");
            bind_values.push(Value::Text(needle.clone()));
        }
        FilterClause::TimeZoneEquals(value) => {
            sql.push_str(" AND time_zone = ?");
            bind_values.push(Value::Text(value.clone()));
        }
        FilterClause::TypeEquals(kind) => {
            sql.push_str(" AND type = ?");
            bind_values.push(Value::Text(kind.as_str().to_string()));
        }
        FilterClause::StatusEquals(status) => {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        FilterClause::VisibilityEquals(visibility) => {
            sql.push_str(" AND visibility = ?");
            bind_values.push(Value::Text(visibility.as_str().to_string()));
        }
        FilterClause::Overlaps { from, to } => {
            if let Some(to) = to {
                sql.push_str(" AND start_at < ?");
                bind_values.push(Value::Integer(to.timestamp_millis()));
            }
            if let Some(from) = from {
                sql.push_str(" AND end_at > ?");
                bind_values.push(Value::Integer(from.timestamp_millis()));
            }
        }
        FilterClause::Within { from, to } => {
            sql.push_str(" AND start_at >= ? AND end_at <= ?");
            bind_values.push(Value::Integer(from.timestamp_millis()));
            bind_values.push(Value::Integer(to.timestamp_millis()));
        }
        FilterClause::StartsBetween { from, to } => {
            sql.push_str(" AND start_at >= ? AND start_at <= ?");
            bind_values.push(Value::Integer(from.timestamp_millis()));
            bind_values.push(Value::Integer(to.timestamp_millis()));
        }
        FilterClause::EndsBefore(before) => {
            sql.push_str(" AND end_at < ?");
            bind_values.push(Value::Integer(before.timestamp_millis()));
        }
    }
}

fn sort_column(key: SortKey) -> &'static str {
    match key {
        SortKey::StartAt => "start_at",
        SortKey::EndAt => "end_at",
        SortKey::Title => "title",
        SortKey::CreatedAt => "created_at",
        SortKey::UpdatedAt => "updated_at",
    }
}

fn sort_direction(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    }
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<Event> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{id_text}` in events.id")))?;

    let type_text: String = row.get("type")?;
    let event_type = EventType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid event type `{type_text}` in events.type"))
    })?;

    let status_text: String = row.get("status")?;
    let status = EventStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in events.status"))
    })?;

    let visibility_text: String = row.get("visibility")?;
    let visibility = EventVisibility::parse(&visibility_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid visibility `{visibility_text}` in events.visibility"
        ))
    })?;

    let start_at = millis_to_instant(row.get("start_at")?, "start_at")?;
    let end_at = millis_to_instant(row.get("end_at")?, "end_at")?;
    if end_at <= start_at {
        return Err(RepoError::InvalidData(format!(
            "event {id} ends at or before its start"
        )));
    }

    let created_at = row
        .get::<_, Option<i64>>("created_at")?
        .map(|value| millis_to_instant(value, "created_at"))
        .transpose()?;
    let updated_at = row
        .get::<_, Option<i64>>("updated_at")?
        .map(|value| millis_to_instant(value, "updated_at"))
        .transpose()?;

    Ok(Event {
        id,
        version: row.get("version")?,
        title: row.get("title")?,
        description: row.get("description")?,
        location: row.get("location")?,
        event_type,
        status,
        visibility,
        time_zone: row.get("time_zone")?,
        start_at,
        end_at,
        created_at,
        updated_at,
    })
}

fn millis_to_instant(value: i64, column: &str) -> RepoResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid timestamp `{value}` in events.{column}"))
    })
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 =
        conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version < expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "events")? {
        return Err(RepoError::MissingRequiredTable("events"));
    }

    for &column in REQUIRED_EVENT_COLUMNS {
        if !table_has_column(conn, "events", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "events",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
