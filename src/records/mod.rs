//! Question records and the category entities they are tagged with

use crate::error::{Result, SrpaError};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of body, context and answer text
pub const MAX_TEXT_LENGTH: usize = 20_000;

/// Maximum length of a category name
pub const MAX_NAME_LENGTH: usize = 512;

/// Calendar dates, as stored and as accepted in filters
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamps, second precision
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The five tag dimensions a question can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Report,
    Author,
    AnswerAuthor,
    Topic,
    Subtopic,
}

impl CategoryKind {
    /// Table holding entities of this kind
    pub fn table(&self) -> &'static str {
        match self {
            CategoryKind::Report => "reports",
            CategoryKind::Author => "authors",
            CategoryKind::AnswerAuthor => "answer_authors",
            CategoryKind::Topic => "topics",
            CategoryKind::Subtopic => "subtopics",
        }
    }

    /// Foreign key column on the questions table
    pub fn column(&self) -> &'static str {
        match self {
            CategoryKind::Report => "report_id",
            CategoryKind::Author => "author_id",
            CategoryKind::AnswerAuthor => "answer_author_id",
            CategoryKind::Topic => "topic_id",
            CategoryKind::Subtopic => "subtopic_id",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CategoryKind::Report => "report",
            CategoryKind::Author => "author",
            CategoryKind::AnswerAuthor => "answer author",
            CategoryKind::Topic => "topic",
            CategoryKind::Subtopic => "subtopic",
        }
    }
}

/// A category entity (report, author, answer author, topic, subtopic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
}

/// A category as referenced from a question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: i64,
    pub name: String,
}

/// A parliamentary question with its answer and tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub number: i64,
    pub body: String,
    pub context: String,
    pub answer: String,
    pub question_date: Option<NaiveDate>,
    pub answer_date: Option<NaiveDate>,
    pub report: CategoryRef,
    pub author: Option<CategoryRef>,
    pub answer_author: Option<CategoryRef>,
    pub topic: Option<CategoryRef>,
    pub subtopic: Option<CategoryRef>,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
}

impl Question {
    /// Text indexed for the question side: body followed by context
    pub fn question_text(&self) -> String {
        join_texts(&[&self.body, &self.context])
    }

    /// Text indexed for the answer side
    pub fn answer_text(&self) -> String {
        self.answer.trim().to_string()
    }

    /// Everything the record says, used as a free-text seed
    pub fn full_text(&self) -> String {
        join_texts(&[&self.context, &self.body, &self.answer])
    }

    pub fn category(&self, kind: CategoryKind) -> Option<&CategoryRef> {
        match kind {
            CategoryKind::Report => Some(&self.report),
            CategoryKind::Author => self.author.as_ref(),
            CategoryKind::AnswerAuthor => self.answer_author.as_ref(),
            CategoryKind::Topic => self.topic.as_ref(),
            CategoryKind::Subtopic => self.subtopic.as_ref(),
        }
    }
}

fn join_texts(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Which half of a record a piece of text comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Question,
    Answer,
}

/// Identity of one indexable side of a record (`q12`, `r12`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SideId {
    pub record: i64,
    pub side: Side,
}

impl SideId {
    pub fn question(record: i64) -> Self {
        Self {
            record,
            side: Side::Question,
        }
    }

    pub fn answer(record: i64) -> Self {
        Self {
            record,
            side: Side::Answer,
        }
    }
}

impl fmt::Display for SideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.side {
            Side::Question => 'q',
            Side::Answer => 'r',
        };
        write!(f, "{}{}", prefix, self.record)
    }
}

/// Tag dimension for suggestions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagDimension {
    Topic,
    Subtopic,
}

impl std::str::FromStr for TagDimension {
    type Err = SrpaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "topic" | "topics" | "ministerio" => Ok(TagDimension::Topic),
            "subtopic" | "subtopics" | "area" => Ok(TagDimension::Subtopic),
            other => Err(SrpaError::validation(
                "dimension",
                format!("unknown tag dimension '{}'", other),
            )),
        }
    }
}

/// Category names are stored trimmed and lowercased
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Input for creating or editing a question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub number: i64,
    pub body: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub question_date: Option<NaiveDate>,
    #[serde(default)]
    pub answer_date: Option<NaiveDate>,
    pub report: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub answer_author: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub subtopic: Option<String>,
}

impl NewQuestion {
    /// Trim texts and normalise category names; empty optional names become `None`
    pub fn normalized(&self) -> NewQuestion {
        let name = |n: &Option<String>| {
            n.as_deref()
                .map(normalize_name)
                .filter(|n| !n.is_empty())
        };

        NewQuestion {
            number: self.number,
            body: self.body.trim().to_string(),
            context: self.context.trim().to_string(),
            answer: self.answer.trim().to_string(),
            question_date: self.question_date,
            answer_date: self.answer_date,
            report: normalize_name(&self.report),
            author: name(&self.author),
            answer_author: name(&self.answer_author),
            topic: name(&self.topic),
            subtopic: name(&self.subtopic),
        }
    }

    /// Check field constraints on an already normalised value
    pub fn validate(&self) -> Result<()> {
        if self.number < 1 {
            return Err(SrpaError::validation(
                "number",
                "question number must be a positive integer",
            ));
        }

        let body_len = self.body.chars().count();
        if body_len == 0 || body_len > MAX_TEXT_LENGTH {
            return Err(SrpaError::validation(
                "body",
                format!("body must have between 1 and {} characters", MAX_TEXT_LENGTH),
            ));
        }

        for (key, text) in [("context", &self.context), ("answer", &self.answer)] {
            if text.chars().count() > MAX_TEXT_LENGTH {
                return Err(SrpaError::validation(
                    key,
                    format!("text longer than {} characters", MAX_TEXT_LENGTH),
                ));
            }
        }

        if self.report.is_empty() {
            return Err(SrpaError::validation("report", "a report is required"));
        }

        let names = [
            ("report", Some(&self.report)),
            ("author", self.author.as_ref()),
            ("answer_author", self.answer_author.as_ref()),
            ("topic", self.topic.as_ref()),
            ("subtopic", self.subtopic.as_ref()),
        ];
        for (key, name) in names {
            if name.is_some_and(|n| n.chars().count() > MAX_NAME_LENGTH) {
                return Err(SrpaError::validation(
                    key,
                    format!("name longer than {} characters", MAX_NAME_LENGTH),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> NewQuestion {
        NewQuestion {
            number: 3,
            body: "  ¿Cuál es el presupuesto de salud?  ".to_string(),
            report: "  Senado ".to_string(),
            topic: Some("Salud".to_string()),
            subtopic: Some("   ".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalized_names() {
        let q = draft().normalized();
        assert_eq!(q.report, "senado");
        assert_eq!(q.topic.as_deref(), Some("salud"));
        assert_eq!(q.subtopic, None);
        assert_eq!(q.body, "¿Cuál es el presupuesto de salud?");
    }

    #[test]
    fn test_validate_rejects_bad_number() {
        let mut q = draft().normalized();
        q.number = 0;
        assert!(matches!(q.validate(), Err(SrpaError::Validation { .. })));
    }

    #[test]
    fn test_validate_requires_body_and_report() {
        let mut q = draft().normalized();
        q.body.clear();
        assert!(q.validate().is_err());

        let mut q = draft().normalized();
        q.report.clear();
        assert!(q.validate().is_err());

        assert!(draft().normalized().validate().is_ok());
    }

    #[test]
    fn test_side_id_display() {
        assert_eq!(SideId::question(7).to_string(), "q7");
        assert_eq!(SideId::answer(7).to_string(), "r7");
        assert!(SideId::question(7) < SideId::answer(7));
        assert!(SideId::answer(7) < SideId::question(8));
    }

    #[test]
    fn test_tag_dimension_parse() {
        assert_eq!("ministerio".parse::<TagDimension>().unwrap(), TagDimension::Topic);
        assert_eq!("Subtopic".parse::<TagDimension>().unwrap(), TagDimension::Subtopic);
        assert!("autor".parse::<TagDimension>().is_err());
    }
}
