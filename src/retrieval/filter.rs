//! Structured filter clauses and their compiled conjunctive predicate

use crate::records::{CategoryKind, Question};
use crate::storage::RecordStore;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Record field a filter clause applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Topic,
    Subtopic,
    Author,
    AnswerAuthor,
    Report,
    Number,
    QuestionDate,
    AnswerDate,
    CreatedAt,
}

impl FilterField {
    /// Category dimension for fields filtered by name
    pub fn category(&self) -> Option<CategoryKind> {
        match self {
            FilterField::Topic => Some(CategoryKind::Topic),
            FilterField::Subtopic => Some(CategoryKind::Subtopic),
            FilterField::Author => Some(CategoryKind::Author),
            FilterField::AnswerAuthor => Some(CategoryKind::AnswerAuthor),
            FilterField::Report => Some(CategoryKind::Report),
            _ => None,
        }
    }

    /// Column on the questions table
    pub fn column(&self) -> &'static str {
        match self {
            FilterField::Number => "q.number",
            FilterField::QuestionDate => "q.question_date",
            FilterField::AnswerDate => "q.answer_date",
            FilterField::CreatedAt => "q.created_at",
            FilterField::Topic => "q.topic_id",
            FilterField::Subtopic => "q.subtopic_id",
            FilterField::Author => "q.author_id",
            FilterField::AnswerAuthor => "q.answer_author_id",
            FilterField::Report => "q.report_id",
        }
    }

    /// Current value of this field on a resolved record
    pub fn operand_of(&self, question: &Question) -> Operand {
        if let Some(kind) = self.category() {
            return question
                .category(kind)
                .map(|c| Operand::Id(c.id))
                .unwrap_or(Operand::Null);
        }
        match self {
            FilterField::Number => Operand::Integer(question.number),
            FilterField::QuestionDate => question.question_date.map_or(Operand::Null, Operand::Date),
            FilterField::AnswerDate => question.answer_date.map_or(Operand::Null, Operand::Date),
            FilterField::CreatedAt => Operand::DateTime(question.created_at),
            _ => Operand::Null,
        }
    }
}

/// Relational comparator of a clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Equals,
    NotEquals,
    GreaterOrEqual,
    LessOrEqual,
}

impl Comparator {
    /// SQL operator; equality is null-safe
    pub fn sql(&self) -> &'static str {
        match self {
            Comparator::Equals => "IS",
            Comparator::NotEquals => "IS NOT",
            Comparator::GreaterOrEqual => ">=",
            Comparator::LessOrEqual => "<=",
        }
    }

    fn holds(&self, actual: &Operand, expected: &Operand) -> bool {
        match self {
            Comparator::Equals => actual == expected,
            Comparator::NotEquals => actual != expected,
            Comparator::GreaterOrEqual => matches!(
                actual.compare(expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Comparator::LessOrEqual => matches!(
                actual.compare(expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

/// Typed clause value as parsed from the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterValue {
    /// Normalised category name
    Name(String),
    Integer(i64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// The field must be unset (or set, with not-equals)
    Unset,
}

/// One `(field, comparator, value)` filter clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    pub field: FilterField,
    pub comparator: Comparator,
    pub value: FilterValue,
}

/// A value a field is compared against after category resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Id(i64),
    Integer(i64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

impl Operand {
    /// Ordering between operands of the same kind; `None` when either is
    /// null or the kinds differ
    fn compare(&self, other: &Operand) -> Option<Ordering> {
        match (self, other) {
            (Operand::Id(a), Operand::Id(b)) => Some(a.cmp(b)),
            (Operand::Integer(a), Operand::Integer(b)) => Some(a.cmp(b)),
            (Operand::Date(a), Operand::Date(b)) => Some(a.cmp(b)),
            (Operand::DateTime(a), Operand::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// A compiled clause
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        field: FilterField,
        comparator: Comparator,
        operand: Operand,
    },
    /// Matches no record (unresolved category name)
    Never,
}

impl Condition {
    pub fn matches(&self, question: &Question) -> bool {
        match self {
            Condition::Compare {
                field,
                comparator,
                operand,
            } => comparator.holds(&field.operand_of(question), operand),
            Condition::Never => false,
        }
    }
}

/// Conjunction of compiled conditions; empty means "no filter"
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    conditions: Vec<Condition>,
}

impl Predicate {
    /// The predicate that accepts every record
    pub fn always() -> Self {
        Self::default()
    }

    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// True if some clause can never be satisfied
    pub fn matches_nothing(&self) -> bool {
        self.conditions.iter().any(|c| matches!(c, Condition::Never))
    }

    pub fn matches(&self, question: &Question) -> bool {
        self.conditions.iter().all(|c| c.matches(question))
    }
}

/// Compile filter clauses into a predicate, resolving category names through
/// the store.
///
/// A name with no matching category, or whose lookup fails, turns its clause
/// into [`Condition::Never`].
pub fn compile(clauses: &[FilterClause], store: &dyn RecordStore) -> Predicate {
    let conditions = clauses
        .iter()
        .map(|clause| compile_clause(clause, store))
        .collect();
    Predicate::new(conditions)
}

fn compile_clause(clause: &FilterClause, store: &dyn RecordStore) -> Condition {
    let operand = match &clause.value {
        FilterValue::Name(name) => {
            let Some(kind) = clause.field.category() else {
                return Condition::Never;
            };
            match store.resolve_category_id(kind, name) {
                Ok(Some(id)) => Operand::Id(id),
                Ok(None) => {
                    tracing::debug!("No {} named '{}', filter matches nothing", kind.label(), name);
                    return Condition::Never;
                }
                Err(e) => {
                    tracing::warn!("Failed to resolve {} '{}': {}", kind.label(), name, e);
                    return Condition::Never;
                }
            }
        }
        FilterValue::Integer(n) => Operand::Integer(*n),
        FilterValue::Date(d) => Operand::Date(*d),
        FilterValue::DateTime(dt) => Operand::DateTime(*dt),
        FilterValue::Unset => Operand::Null,
    };

    Condition::Compare {
        field: clause.field,
        comparator: clause.comparator,
        operand,
    }
}
