//! Flat query parameters to a validated [`SearchQuery`]

use crate::error::{Result, SrpaError};
use crate::records::{normalize_name, DATETIME_FORMAT, DATE_FORMAT};
use crate::retrieval::filter::{Comparator, FilterClause, FilterField, FilterValue};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw query parameters, as received from the boundary
pub type QueryParams = BTreeMap<String, String>;

const TEXT_KEYS: &[&str] = &["q", "text"];
const RECORD_KEYS: &[&str] = &["pregunta", "similar-to"];
const TARGET_KEYS: &[&str] = &["buscar-dentro-de", "target"];
const BASIS_KEYS: &[&str] = &["buscar-usando", "basis"];
const ORDER_KEYS: &[&str] = &["orden", "order"];
const PAGE_KEYS: &[&str] = &["pagina", "page"];
const PER_PAGE_KEYS: &[&str] = &["por-pagina", "per-page"];

/// Filter keys in the order their clauses are built
const FILTER_KEYS: &[(&str, FilterField)] = &[
    ("ministerio", FilterField::Topic),
    ("area", FilterField::Subtopic),
    ("autor", FilterField::Author),
    ("informe", FilterField::Report),
    ("organismo-requerido", FilterField::AnswerAuthor),
    ("numero", FilterField::Number),
    ("fecha", FilterField::QuestionDate),
    ("fecha-respuesta", FilterField::AnswerDate),
    ("creado-en", FilterField::CreatedAt),
];

/// Reference point of a similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedSource {
    /// Ad hoc typed-in text
    Text(String),
    /// An existing record, used according to the query basis
    Record(i64),
}

/// Which record sides are eligible as similarity candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Questions,
    Answers,
    #[default]
    Both,
}

impl Target {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "preguntas" | "questions" => Target::Questions,
            "respuestas" | "answers" => Target::Answers,
            _ => Target::Both,
        }
    }

    fn param(&self) -> &'static str {
        match self {
            Target::Questions => "preguntas",
            Target::Answers => "respuestas",
            Target::Both => "ambas",
        }
    }
}

/// Which text of a seed record is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    Question,
    Answer,
    #[default]
    Freeform,
}

impl Basis {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "pregunta" | "question" => Basis::Question,
            "respuesta" | "answer" => Basis::Answer,
            _ => Basis::Freeform,
        }
    }

    fn param(&self) -> &'static str {
        match self {
            Basis::Question => "pregunta",
            Basis::Answer => "respuesta",
            Basis::Freeform => "libre",
        }
    }
}

/// Full-scan ordering
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// By (report name, number)
    #[default]
    Asc,
    Desc,
    /// By question date, undated records last
    DateAsc,
    DateDesc,
    /// Store order; keeps the unrecognised value for link building
    Natural(String),
}

impl SortOrder {
    fn parse(value: &str) -> Self {
        match value.trim() {
            "asc" => SortOrder::Asc,
            "desc" => SortOrder::Desc,
            "date-asc" => SortOrder::DateAsc,
            "date-desc" => SortOrder::DateDesc,
            other => SortOrder::Natural(other.to_string()),
        }
    }

    fn param(&self) -> &str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
            SortOrder::DateAsc => "date-asc",
            SortOrder::DateDesc => "date-desc",
            SortOrder::Natural(raw) => raw,
        }
    }
}

/// Structured, validated search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// `None` means full-scan mode
    pub seed: Option<SeedSource>,
    pub target: Target,
    pub basis: Basis,
    pub filters: Vec<FilterClause>,
    pub order: SortOrder,
    /// 1-based page number
    pub page: usize,
    pub per_page: usize,
}

impl SearchQuery {
    /// Full-scan query with defaults
    pub fn new(per_page: usize) -> Self {
        Self {
            seed: None,
            target: Target::default(),
            basis: Basis::default(),
            filters: Vec::new(),
            order: SortOrder::default(),
            page: 1,
            per_page,
        }
    }

    /// Normalise a flat parameter map; unrecognised keys are ignored
    pub fn from_params(params: &QueryParams, default_per_page: usize) -> Result<Self> {
        let mut query = Self::new(default_per_page);

        if let Some((key, raw)) = lookup(params, RECORD_KEYS) {
            query.seed = Some(SeedSource::Record(parse_integer(key, raw)?));
        } else if let Some((_, raw)) = lookup(params, TEXT_KEYS) {
            let text = raw.trim();
            if !text.is_empty() {
                query.seed = Some(SeedSource::Text(text.to_string()));
            }
        }

        if let Some((_, raw)) = lookup(params, TARGET_KEYS) {
            query.target = Target::parse(raw);
        }
        if let Some((_, raw)) = lookup(params, BASIS_KEYS) {
            query.basis = Basis::parse(raw);
        }
        if let Some((_, raw)) = lookup(params, ORDER_KEYS) {
            query.order = SortOrder::parse(raw);
        }
        if let Some((key, raw)) = lookup(params, PAGE_KEYS) {
            query.page = parse_positive(key, raw)?;
        }
        if let Some((key, raw)) = lookup(params, PER_PAGE_KEYS) {
            query.per_page = parse_positive(key, raw)?;
        }

        for (key, field) in FILTER_KEYS {
            let Some(raw) = params.get(*key) else {
                continue;
            };
            let comparator = comparator_for(params, key)?;
            let value = parse_filter_value(key, *field, raw)?;
            query.filters.push(FilterClause {
                field: *field,
                comparator,
                value,
            });
        }

        Ok(query)
    }

    /// Canonical parameters reproducing this query, optionally for another page
    pub fn to_params(&self, page: Option<usize>) -> Vec<(String, String)> {
        let mut params = Vec::new();
        let mut push = |k: &str, v: String| params.push((k.to_string(), v));

        match &self.seed {
            Some(SeedSource::Text(text)) => push("q", text.clone()),
            Some(SeedSource::Record(id)) => push("pregunta", id.to_string()),
            None => {}
        }
        if self.seed.is_some() {
            push("buscar-dentro-de", self.target.param().to_string());
            push("buscar-usando", self.basis.param().to_string());
        }
        push("orden", self.order.param().to_string());

        for clause in &self.filters {
            let Some((key, _)) = FILTER_KEYS.iter().find(|(_, f)| *f == clause.field) else {
                continue;
            };
            push(key, format_filter_value(&clause.value));
            if clause.comparator != Comparator::Equals {
                push(
                    &format!("{}-comparacion", key),
                    comparator_param(clause.comparator).to_string(),
                );
            }
        }

        push("por-pagina", self.per_page.to_string());
        push("pagina", page.unwrap_or(self.page).to_string());
        params
    }
}

fn lookup<'a>(params: &'a QueryParams, keys: &[&'static str]) -> Option<(&'static str, &'a str)> {
    keys.iter()
        .find_map(|k| params.get(*k).map(|v| (*k, v.as_str())))
}

fn comparator_for(params: &QueryParams, key: &str) -> Result<Comparator> {
    let companions = [format!("{}-comparacion", key), format!("{}-comparator", key)];
    let Some((companion, raw)) = companions
        .iter()
        .find_map(|c| params.get(c).map(|v| (c, v)))
    else {
        return Ok(Comparator::Equals);
    };

    match raw.trim().to_lowercase().as_str() {
        "" | "igualdad" | "equals" | "eq" => Ok(Comparator::Equals),
        "desigualdad" | "not-equals" | "ne" => Ok(Comparator::NotEquals),
        "mayor-o-igual" | "greater-or-equal" | "gte" => Ok(Comparator::GreaterOrEqual),
        "menor-o-igual" | "less-or-equal" | "lte" => Ok(Comparator::LessOrEqual),
        other => Err(SrpaError::validation(
            companion.as_str(),
            format!("unknown comparator '{}'", other),
        )),
    }
}

fn comparator_param(comparator: Comparator) -> &'static str {
    match comparator {
        Comparator::Equals => "igualdad",
        Comparator::NotEquals => "desigualdad",
        Comparator::GreaterOrEqual => "mayor-o-igual",
        Comparator::LessOrEqual => "menor-o-igual",
    }
}

fn parse_filter_value(key: &str, field: FilterField, raw: &str) -> Result<FilterValue> {
    let trimmed = raw.trim();

    if field.category().is_some() {
        let name = normalize_name(trimmed);
        return Ok(if name.is_empty() {
            FilterValue::Unset
        } else {
            FilterValue::Name(name)
        });
    }

    match field {
        FilterField::Number => parse_integer(key, trimmed).map(FilterValue::Integer),
        FilterField::QuestionDate | FilterField::AnswerDate => {
            if trimmed.is_empty() {
                return Ok(FilterValue::Unset);
            }
            NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .map(FilterValue::Date)
                .map_err(|_| {
                    SrpaError::validation(key, format!("'{}' is not a YYYY-MM-DD date", trimmed))
                })
        }
        FilterField::CreatedAt => {
            if trimmed.is_empty() {
                return Ok(FilterValue::Unset);
            }
            NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT)
                .map(FilterValue::DateTime)
                .map_err(|_| {
                    SrpaError::validation(
                        key,
                        format!("'{}' is not a YYYY-MM-DD HH:MM:SS timestamp", trimmed),
                    )
                })
        }
        _ => Ok(FilterValue::Unset),
    }
}

fn format_filter_value(value: &FilterValue) -> String {
    match value {
        FilterValue::Name(name) => name.clone(),
        FilterValue::Integer(n) => n.to_string(),
        FilterValue::Date(d) => d.format(DATE_FORMAT).to_string(),
        FilterValue::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
        FilterValue::Unset => String::new(),
    }
}

fn parse_integer(key: &str, raw: &str) -> Result<i64> {
    raw.trim()
        .parse()
        .map_err(|_| SrpaError::validation(key, format!("'{}' is not a number", raw.trim())))
}

fn parse_positive(key: &str, raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(SrpaError::validation(
            key,
            format!("'{}' is not a positive integer", raw.trim()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let query = SearchQuery::from_params(&QueryParams::new(), 10).unwrap();
        assert_eq!(query.seed, None);
        assert_eq!(query.order, SortOrder::Asc);
        assert_eq!(query.page, 1);
        assert_eq!(query.per_page, 10);
        assert_eq!(query.target, Target::Both);
        assert!(query.filters.is_empty());
    }

    #[test]
    fn test_text_and_paging() {
        let query = SearchQuery::from_params(
            &params(&[
                ("q", " impuestos "),
                ("pagina", "3"),
                ("por-pagina", "25"),
                ("buscar-dentro-de", "respuestas"),
                ("orden", "date-desc"),
                ("utm_source", "ignored"),
            ]),
            10,
        )
        .unwrap();

        assert_eq!(query.seed, Some(SeedSource::Text("impuestos".to_string())));
        assert_eq!(query.page, 3);
        assert_eq!(query.per_page, 25);
        assert_eq!(query.target, Target::Answers);
        assert_eq!(query.order, SortOrder::DateDesc);
    }

    #[test]
    fn test_blank_text_is_full_scan() {
        let query = SearchQuery::from_params(&params(&[("text", "   ")]), 10).unwrap();
        assert_eq!(query.seed, None);
    }

    #[test]
    fn test_record_seed_wins_over_text() {
        let query =
            SearchQuery::from_params(&params(&[("q", "salud"), ("pregunta", "42")]), 10).unwrap();
        assert_eq!(query.seed, Some(SeedSource::Record(42)));
    }

    #[test]
    fn test_unknown_order_is_natural() {
        let query = SearchQuery::from_params(&params(&[("order", "random")]), 10).unwrap();
        assert_eq!(query.order, SortOrder::Natural("random".to_string()));
    }

    #[test]
    fn test_category_filters_are_case_folded() {
        let query = SearchQuery::from_params(
            &params(&[
                ("ministerio", "  SALUD "),
                ("autor-comparacion", "desigualdad"),
                ("autor", "Pérez"),
            ]),
            10,
        )
        .unwrap();

        assert_eq!(
            query.filters,
            vec![
                FilterClause {
                    field: FilterField::Topic,
                    comparator: Comparator::Equals,
                    value: FilterValue::Name("salud".to_string()),
                },
                FilterClause {
                    field: FilterField::Author,
                    comparator: Comparator::NotEquals,
                    value: FilterValue::Name("pérez".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_empty_category_value_means_unset() {
        let query = SearchQuery::from_params(&params(&[("area", "")]), 10).unwrap();
        assert_eq!(query.filters[0].value, FilterValue::Unset);
    }

    #[test]
    fn test_date_filters_with_comparators() {
        let query = SearchQuery::from_params(
            &params(&[
                ("fecha", "2024-02-01"),
                ("fecha-comparator", "gte"),
                ("creado-en", "2024-02-01 10:15:00"),
            ]),
            10,
        )
        .unwrap();

        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filters[0].comparator, Comparator::GreaterOrEqual);
        assert!(matches!(query.filters[0].value, FilterValue::Date(_)));
        assert!(matches!(query.filters[1].value, FilterValue::DateTime(_)));
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let cases = [
            ("fecha", "01/02/2024"),
            ("creado-en", "2024-02-01"),
            ("numero", "doce"),
            ("pagina", "0"),
            ("por-pagina", "-1"),
            ("pregunta", "abc"),
        ];
        for (key, value) in cases {
            let result = SearchQuery::from_params(&params(&[(key, value)]), 10);
            match result {
                Err(SrpaError::Validation { key: k, .. }) => assert_eq!(k, key),
                other => panic!("{}={} should fail, got {:?}", key, value, other),
            }
        }
    }

    #[test]
    fn test_unknown_comparator_is_rejected() {
        let result = SearchQuery::from_params(
            &params(&[("ministerio", "salud"), ("ministerio-comparacion", "like")]),
            10,
        );
        assert!(matches!(result, Err(SrpaError::Validation { .. })));
    }

    #[test]
    fn test_to_params_reparses_to_same_query() {
        let original = SearchQuery::from_params(
            &params(&[
                ("q", "impuestos"),
                ("buscar-dentro-de", "preguntas"),
                ("ministerio", "Salud"),
                ("numero", "10"),
                ("numero-comparacion", "menor-o-igual"),
                ("por-pagina", "5"),
            ]),
            10,
        )
        .unwrap();

        let link: QueryParams = original.to_params(Some(2)).into_iter().collect();
        let reparsed = SearchQuery::from_params(&link, 10).unwrap();

        assert_eq!(reparsed.page, 2);
        assert_eq!(reparsed.seed, original.seed);
        assert_eq!(reparsed.filters, original.filters);
        assert_eq!(reparsed.per_page, 5);
    }
}
