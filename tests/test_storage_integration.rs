//! Storage integration tests
//!
//! Checks the SQLite store against the in-memory evaluation of the same
//! predicates, and persistence across reopen.

use chrono::NaiveDate;
use srpa::records::{CategoryKind, NewQuestion};
use srpa::retrieval::{compile, Comparator, FilterClause, FilterField, FilterValue, Predicate};
use srpa::storage::{RecordStore, SqliteStore};
use tempfile::TempDir;

fn seed(store: &SqliteStore) -> Vec<i64> {
    let rows = [
        (1, "informe 1", Some("salud"), Some("pérez"), Some((2024, 1, 10)), None),
        (2, "informe 1", Some("trabajo"), None, Some((2024, 2, 20)), Some((2024, 3, 1))),
        (3, "informe 2", None, Some("pérez"), None, None),
        (4, "informe 2", Some("salud"), Some("gómez"), Some((2023, 12, 31)), None),
    ];

    rows.iter()
        .map(|(number, report, topic, author, date, answered)| {
            let question = NewQuestion {
                number: *number,
                body: format!("pregunta número {}", number),
                report: report.to_string(),
                topic: topic.map(str::to_string),
                author: author.map(str::to_string),
                question_date: date.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
                answer_date: answered.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
                ..Default::default()
            }
            .normalized();
            store.insert(&question).unwrap()
        })
        .collect()
}

fn clause(field: FilterField, comparator: Comparator, value: FilterValue) -> FilterClause {
    FilterClause {
        field,
        comparator,
        value,
    }
}

fn date(y: i32, m: u32, d: u32) -> FilterValue {
    FilterValue::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

#[test]
fn test_pushed_down_predicate_agrees_with_in_memory() {
    let temp = TempDir::new().unwrap();
    let store = SqliteStore::open(&temp.path().join("srpa.sqlite")).unwrap();
    seed(&store);
    let everything = store.all_questions().unwrap();

    let name = |n: &str| FilterValue::Name(n.to_string());
    let cases: Vec<Vec<FilterClause>> = vec![
        vec![],
        vec![clause(FilterField::Topic, Comparator::Equals, name("salud"))],
        vec![clause(FilterField::Topic, Comparator::NotEquals, name("salud"))],
        vec![clause(FilterField::Topic, Comparator::Equals, FilterValue::Unset)],
        vec![clause(FilterField::Topic, Comparator::NotEquals, FilterValue::Unset)],
        vec![clause(FilterField::Author, Comparator::Equals, name("nadie"))],
        vec![clause(FilterField::Number, Comparator::GreaterOrEqual, FilterValue::Integer(2))],
        vec![clause(FilterField::QuestionDate, Comparator::LessOrEqual, date(2024, 1, 31))],
        vec![clause(FilterField::AnswerDate, Comparator::GreaterOrEqual, date(2024, 1, 1))],
        vec![
            clause(FilterField::Report, Comparator::Equals, name("informe 2")),
            clause(FilterField::Author, Comparator::Equals, name("pérez")),
        ],
        vec![clause(
            FilterField::CreatedAt,
            Comparator::GreaterOrEqual,
            FilterValue::DateTime(
                NaiveDate::from_ymd_opt(2000, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            ),
        )],
    ];

    for clauses in cases {
        let predicate = compile(&clauses, &store);
        let pushed: Vec<i64> = store
            .filter_by_predicate(&predicate)
            .unwrap()
            .iter()
            .map(|q| q.id)
            .collect();
        let in_memory: Vec<i64> = everything
            .iter()
            .filter(|q| predicate.matches(q))
            .map(|q| q.id)
            .collect();
        assert_eq!(pushed, in_memory, "clauses {:?}", clauses);
    }
}

#[test]
fn test_known_filter_results() {
    let temp = TempDir::new().unwrap();
    let store = SqliteStore::open(&temp.path().join("srpa.sqlite")).unwrap();
    let ids = seed(&store);

    let run = |clauses: Vec<FilterClause>| -> Vec<i64> {
        store
            .filter_by_predicate(&compile(&clauses, &store))
            .unwrap()
            .iter()
            .map(|q| q.id)
            .collect()
    };

    assert_eq!(
        run(vec![clause(
            FilterField::Topic,
            Comparator::NotEquals,
            FilterValue::Name("salud".to_string())
        )]),
        vec![ids[1], ids[2]]
    );
    assert_eq!(
        run(vec![clause(
            FilterField::QuestionDate,
            Comparator::GreaterOrEqual,
            date(2024, 1, 1)
        )]),
        vec![ids[0], ids[1]]
    );
    assert!(store
        .filter_by_predicate(&Predicate::new(vec![srpa::retrieval::Condition::Never]))
        .unwrap()
        .is_empty());
}

#[test]
fn test_fetch_by_ids_skips_missing() {
    let temp = TempDir::new().unwrap();
    let store = SqliteStore::open(&temp.path().join("srpa.sqlite")).unwrap();
    let ids = seed(&store);

    let fetched: Vec<i64> = store
        .fetch_by_ids(&[ids[3], 999, ids[0]])
        .unwrap()
        .iter()
        .map(|q| q.id)
        .collect();
    assert_eq!(fetched, vec![ids[0], ids[3]]);
    assert!(store.fetch_by_ids(&[]).unwrap().is_empty());
}

#[test]
fn test_category_listing() {
    let temp = TempDir::new().unwrap();
    let store = SqliteStore::open(&temp.path().join("srpa.sqlite")).unwrap();
    let ids = seed(&store);

    let names = |kind| -> Vec<String> {
        store
            .all_of(kind)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect()
    };
    assert_eq!(names(CategoryKind::Topic), vec!["salud", "trabajo"]);
    assert_eq!(names(CategoryKind::Author), vec!["gómez", "pérez"]);
    assert!(names(CategoryKind::AnswerAuthor).is_empty());

    store.delete_many(&[ids[1]]).unwrap();
    let in_use: Vec<String> = store
        .in_use(CategoryKind::Topic)
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(in_use, vec!["salud"]);
    // categories outlive their last question
    assert_eq!(names(CategoryKind::Topic), vec!["salud", "trabajo"]);
}

#[test]
fn test_records_persist_across_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("srpa.sqlite");

    let ids = {
        let store = SqliteStore::open(&path).unwrap();
        seed(&store)
    };

    let store = SqliteStore::open(&path).unwrap();
    let q = store.get(ids[1]).unwrap().unwrap();
    assert_eq!(q.number, 2);
    assert_eq!(q.topic.unwrap().name, "trabajo");
    assert_eq!(q.answer_date, NaiveDate::from_ymd_opt(2024, 3, 1));
    assert_eq!(store.database().stats().unwrap().question_count, 4);
}
