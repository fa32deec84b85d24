//! SQLite-backed [`RecordStore`]

use crate::error::{Result, SrpaError};
use crate::records::{
    normalize_name, Category, CategoryKind, CategoryRef, NewQuestion, Question, DATETIME_FORMAT,
    DATE_FORMAT,
};
use crate::retrieval::{Condition, Operand, Predicate};
use crate::storage::database::Database;
use crate::storage::RecordStore;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

/// Bound on host parameters per `IN (...)` statement
const ID_CHUNK: usize = 500;

const SELECT_QUESTIONS: &str = "
    SELECT q.id, q.number, q.body, q.context, q.answer,
           q.question_date, q.answer_date,
           q.report_id, r.name,
           q.author_id, a.name,
           q.answer_author_id, aa.name,
           q.topic_id, t.name,
           q.subtopic_id, s.name,
           q.created_at, q.modified_at
    FROM questions q
    JOIN reports r ON r.id = q.report_id
    LEFT JOIN authors a ON a.id = q.author_id
    LEFT JOIN answer_authors aa ON aa.id = q.answer_author_id
    LEFT JOIN topics t ON t.id = q.topic_id
    LEFT JOIN subtopics s ON s.id = q.subtopic_id";

/// Record store over the srpa SQLite schema
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open (and migrate) the database file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::new(path)?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn query_questions(
        &self,
        where_clause: &str,
        values: Vec<Value>,
    ) -> Result<Vec<Question>> {
        let conn = self.db.get_conn()?;
        let sql = format!("{} WHERE {} ORDER BY q.id", SELECT_QUESTIONS, where_clause);
        let mut stmt = conn.prepare(&sql)?;
        let questions = stmt
            .query_map(params_from_iter(values), question_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(questions)
    }

    fn query_categories(&self, sql: &str, values: Vec<Value>) -> Result<Vec<Category>> {
        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let categories = stmt
            .query_map(params_from_iter(values), category_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    fn exists(conn: &Connection, id: i64) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row("SELECT id FROM questions WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }
}

impl RecordStore for SqliteStore {
    fn filter_by_predicate(&self, predicate: &Predicate) -> Result<Vec<Question>> {
        let (where_clause, values) = render_predicate(predicate);
        self.query_questions(&where_clause, values)
    }

    fn fetch_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>> {
        let mut questions = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(ID_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let values = chunk.iter().map(|id| Value::Integer(*id)).collect();
            questions.extend(
                self.query_questions(&format!("q.id IN ({})", placeholders), values)?,
            );
        }
        questions.sort_by_key(|q| q.id);
        Ok(questions)
    }

    fn resolve_category_id(&self, kind: CategoryKind, name: &str) -> Result<Option<i64>> {
        let conn = self.db.get_conn()?;
        let sql = format!("SELECT id FROM {} WHERE name = ?1", kind.table());
        let id = conn
            .query_row(&sql, [name], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    fn all_of(&self, kind: CategoryKind) -> Result<Vec<Category>> {
        let sql = format!(
            "SELECT id, name, created_at, modified_at FROM {} ORDER BY name, id",
            kind.table()
        );
        self.query_categories(&sql, Vec::new())
    }

    fn in_use(&self, kind: CategoryKind) -> Result<Vec<Category>> {
        let sql = format!(
            "SELECT id, name, created_at, modified_at FROM {table}
             WHERE id IN (SELECT {column} FROM questions WHERE {column} IS NOT NULL)
             ORDER BY name, id",
            table = kind.table(),
            column = kind.column()
        );
        self.query_categories(&sql, Vec::new())
    }

    fn subtopics_of(&self, topic_id: i64) -> Result<Vec<Category>> {
        self.query_categories(
            "SELECT s.id, s.name, s.created_at, s.modified_at
             FROM subtopics s
             JOIN topic_subtopics ts ON ts.subtopic_id = s.id
             WHERE ts.topic_id = ?1
             ORDER BY s.name, s.id",
            vec![Value::Integer(topic_id)],
        )
    }

    fn get(&self, id: i64) -> Result<Option<Question>> {
        Ok(self
            .query_questions("q.id = ?", vec![Value::Integer(id)])?
            .into_iter()
            .next())
    }

    fn insert(&self, question: &NewQuestion) -> Result<i64> {
        let mut conn = self.db.get_conn()?;
        let tx = conn.transaction()?;
        let now = timestamp();
        let ids = CategoryIds::resolve(&tx, question, &now)?;

        tx.execute(
            "INSERT INTO questions (
                number, report_id, body, context, answer, question_date, answer_date,
                author_id, answer_author_id, topic_id, subtopic_id, created_at, modified_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                question.number,
                ids.report,
                question.body,
                question.context,
                question.answer,
                question.question_date.map(format_date),
                question.answer_date.map(format_date),
                ids.author,
                ids.answer_author,
                ids.topic,
                ids.subtopic,
                now,
            ],
        )
        .map_err(|e| unique_violation(e, question))?;

        let id = tx.last_insert_rowid();
        tx.commit()?;
        tracing::debug!("Inserted question {} ({} #{})", id, question.report, question.number);
        Ok(id)
    }

    fn update(&self, id: i64, question: &NewQuestion) -> Result<()> {
        let mut conn = self.db.get_conn()?;
        let tx = conn.transaction()?;
        if !Self::exists(&tx, id)? {
            return Err(SrpaError::NotFound {
                entity: "question",
                id,
            });
        }

        let now = timestamp();
        let ids = CategoryIds::resolve(&tx, question, &now)?;

        tx.execute(
            "UPDATE questions SET
                number = ?1, report_id = ?2, body = ?3, context = ?4, answer = ?5,
                question_date = ?6, answer_date = ?7, author_id = ?8,
                answer_author_id = ?9, topic_id = ?10, subtopic_id = ?11, modified_at = ?12
             WHERE id = ?13",
            params![
                question.number,
                ids.report,
                question.body,
                question.context,
                question.answer,
                question.question_date.map(format_date),
                question.answer_date.map(format_date),
                ids.author,
                ids.answer_author,
                ids.topic,
                ids.subtopic,
                now,
                id,
            ],
        )
        .map_err(|e| unique_violation(e, question))?;

        tx.commit()?;
        Ok(())
    }

    fn retag(&self, id: i64, topic: Option<&str>, subtopic: Option<&str>) -> Result<()> {
        let mut conn = self.db.get_conn()?;
        let tx = conn.transaction()?;

        let current: Option<(Option<i64>, Option<i64>)> = tx
            .query_row(
                "SELECT topic_id, subtopic_id FROM questions WHERE id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((mut topic_id, mut subtopic_id)) = current else {
            return Err(SrpaError::NotFound {
                entity: "question",
                id,
            });
        };

        let now = timestamp();
        if let Some(name) = topic {
            topic_id = optional_category(&tx, CategoryKind::Topic, Some(name), &now)?;
        }
        if let Some(name) = subtopic {
            subtopic_id = optional_category(&tx, CategoryKind::Subtopic, Some(name), &now)?;
        }
        if let (Some(t), Some(s)) = (topic_id, subtopic_id) {
            associate(&tx, t, s)?;
        }

        tx.execute(
            "UPDATE questions SET topic_id = ?1, subtopic_id = ?2, modified_at = ?3 WHERE id = ?4",
            params![topic_id, subtopic_id, now, id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete_many(&self, ids: &[i64]) -> Result<usize> {
        let mut conn = self.db.get_conn()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for chunk in ids.chunks(ID_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            deleted += tx.execute(
                &format!("DELETE FROM questions WHERE id IN ({})", placeholders),
                params_from_iter(chunk.iter()),
            )?;
        }
        tx.commit()?;
        Ok(deleted)
    }
}

/// Category ids for one question write, created on demand
struct CategoryIds {
    report: i64,
    author: Option<i64>,
    answer_author: Option<i64>,
    topic: Option<i64>,
    subtopic: Option<i64>,
}

impl CategoryIds {
    fn resolve(conn: &Connection, question: &NewQuestion, now: &str) -> Result<Self> {
        let ids = Self {
            report: get_or_create(conn, CategoryKind::Report, &question.report, now)?,
            author: optional_category(conn, CategoryKind::Author, question.author.as_deref(), now)?,
            answer_author: optional_category(
                conn,
                CategoryKind::AnswerAuthor,
                question.answer_author.as_deref(),
                now,
            )?,
            topic: optional_category(conn, CategoryKind::Topic, question.topic.as_deref(), now)?,
            subtopic: optional_category(
                conn,
                CategoryKind::Subtopic,
                question.subtopic.as_deref(),
                now,
            )?,
        };

        if let (Some(topic), Some(subtopic)) = (ids.topic, ids.subtopic) {
            associate(conn, topic, subtopic)?;
        }
        Ok(ids)
    }
}

fn get_or_create(conn: &Connection, kind: CategoryKind, name: &str, now: &str) -> Result<i64> {
    let name = normalize_name(name);
    conn.execute(
        &format!(
            "INSERT INTO {} (name, created_at, modified_at) VALUES (?1, ?2, ?2)
             ON CONFLICT(name) DO NOTHING",
            kind.table()
        ),
        params![name, now],
    )?;
    let id = conn.query_row(
        &format!("SELECT id FROM {} WHERE name = ?1", kind.table()),
        [&name],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// `None` or a blank name means no category
fn optional_category(
    conn: &Connection,
    kind: CategoryKind,
    name: Option<&str>,
    now: &str,
) -> Result<Option<i64>> {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => get_or_create(conn, kind, name, now).map(Some),
        None => Ok(None),
    }
}

fn associate(conn: &Connection, topic_id: i64, subtopic_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO topic_subtopics (topic_id, subtopic_id) VALUES (?1, ?2)",
        params![topic_id, subtopic_id],
    )?;
    Ok(())
}

fn unique_violation(e: rusqlite::Error, question: &NewQuestion) -> SrpaError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            SrpaError::UniqueConstraintViolation {
                report: question.report.clone(),
                number: question.number,
            }
        }
        _ => SrpaError::Database(e),
    }
}

/// WHERE clause and bound values for a predicate; `1` when it is empty
fn render_predicate(predicate: &Predicate) -> (String, Vec<Value>) {
    if predicate.is_empty() {
        return ("1".to_string(), Vec::new());
    }

    let mut parts = Vec::with_capacity(predicate.conditions().len());
    let mut values = Vec::new();
    for condition in predicate.conditions() {
        match condition {
            Condition::Compare {
                field,
                comparator,
                operand,
            } => {
                parts.push(format!("{} {} ?", field.column(), comparator.sql()));
                values.push(operand_value(operand));
            }
            Condition::Never => parts.push("0".to_string()),
        }
    }
    (parts.join(" AND "), values)
}

fn operand_value(operand: &Operand) -> Value {
    match operand {
        Operand::Id(id) | Operand::Integer(id) => Value::Integer(*id),
        Operand::Date(d) => Value::Text(format_date(*d)),
        Operand::DateTime(dt) => Value::Text(dt.format(DATETIME_FORMAT).to_string()),
        Operand::Null => Value::Null,
    }
}

fn timestamp() -> String {
    chrono::Local::now()
        .naive_local()
        .format(DATETIME_FORMAT)
        .to_string()
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn question_from_row(row: &Row<'_>) -> rusqlite::Result<Question> {
    Ok(Question {
        id: row.get(0)?,
        number: row.get(1)?,
        body: row.get(2)?,
        context: row.get(3)?,
        answer: row.get(4)?,
        question_date: date_column(row, 5)?,
        answer_date: date_column(row, 6)?,
        report: CategoryRef {
            id: row.get(7)?,
            name: row.get(8)?,
        },
        author: category_ref(row, 9)?,
        answer_author: category_ref(row, 11)?,
        topic: category_ref(row, 13)?,
        subtopic: category_ref(row, 15)?,
        created_at: datetime_column(row, 17)?,
        modified_at: datetime_column(row, 18)?,
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: datetime_column(row, 2)?,
        modified_at: datetime_column(row, 3)?,
    })
}

/// `(id, name)` pair at `idx`, `idx + 1` from a LEFT JOIN
fn category_ref(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<CategoryRef>> {
    let id: Option<i64> = row.get(idx)?;
    let name: Option<String> = row.get(idx + 1)?;
    Ok(match (id, name) {
        (Some(id), Some(name)) => Some(CategoryRef { id, name }),
        _ => None,
    })
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
