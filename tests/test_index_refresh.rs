//! End-to-end tests with the bundled TF-IDF index
//!
//! Every record mutation goes through the searcher, so the index and the
//! classifiers are rebuilt after each one.

use srpa::config::Config;
use srpa::index::{subtopic_label, RefreshOutcome, TOPIC_LABEL};
use srpa::records::{CategoryKind, NewQuestion, TagDimension};
use srpa::retrieval::{QueryParams, Searcher};
use srpa::storage::{RecordStore, SqliteStore};
use srpa::SrpaError;
use std::sync::Arc;
use tempfile::TempDir;

fn searcher() -> (TempDir, Searcher) {
    let (temp, _store, searcher) = searcher_with_store();
    (temp, searcher)
}

fn searcher_with_store() -> (TempDir, Arc<SqliteStore>, Searcher) {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::open(&temp.path().join("srpa.sqlite")).unwrap());
    let searcher = Searcher::new(store.clone(), &Config::default());
    (temp, store, searcher)
}

fn question(number: i64, body: &str, topic: Option<&str>, subtopic: Option<&str>) -> NewQuestion {
    NewQuestion {
        number,
        body: body.to_string(),
        report: "Informe 120".to_string(),
        topic: topic.map(str::to_string),
        subtopic: subtopic.map(str::to_string),
        ..Default::default()
    }
}

fn params(pairs: &[(&str, &str)]) -> QueryParams {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_empty_store_keeps_no_index() {
    let (_temp, searcher) = searcher();
    assert_eq!(searcher.refresh_index(), RefreshOutcome::KeptPrevious);
    assert!(!searcher.index_handle().is_installed());
}

#[test]
fn test_create_rebuilds_and_text_search_finds_record() {
    let (_temp, searcher) = searcher();
    let hospital = searcher
        .create_question(&question(1, "hospital hospital presupuesto", None, None))
        .unwrap();
    searcher
        .create_question(&question(2, "empleo salarios sindicatos", None, None))
        .unwrap();

    assert!(searcher.index_handle().is_installed());

    let page = searcher.search_params(&params(&[("q", "Hospital")])).unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].question.id, hospital);
    assert!(page.items[0].distance.unwrap() < 1.1);
    assert_eq!(page.items[0].matched_terms, vec!["hospital"]);

    // no shared vocabulary at all
    let page = searcher.search_params(&params(&[("q", "astronomía")])).unwrap();
    assert!(page.items.is_empty());
}

#[test]
fn test_duplicate_number_is_rejected_and_index_unchanged() {
    let (_temp, searcher) = searcher();
    searcher
        .create_question(&question(7, "vacunas gripe", None, None))
        .unwrap();

    let result = searcher.create_question(&question(7, "otra pregunta", None, None));
    assert!(matches!(
        result,
        Err(SrpaError::UniqueConstraintViolation { number: 7, ref report }) if report == "informe 120"
    ));
    assert_eq!(searcher.index_handle().snapshot().unwrap().len(), 1);
}

#[test]
fn test_invalid_record_is_rejected() {
    let (_temp, searcher) = searcher();
    let result = searcher.create_question(&question(0, "cuerpo", None, None));
    assert!(matches!(result, Err(SrpaError::Validation { .. })));

    let result = searcher.create_question(&question(1, "   ", None, None));
    assert!(matches!(result, Err(SrpaError::Validation { .. })));
}

#[test]
fn test_topic_classifier_drives_suggestions() {
    let (_temp, searcher) = searcher();
    let first = searcher
        .create_question(&question(1, "hospital vacunas médicos", Some("Salud"), None))
        .unwrap();
    searcher
        .create_question(&question(2, "hospital enfermeras vacunas", Some("salud"), None))
        .unwrap();
    searcher
        .create_question(&question(3, "empleo salarios sindicatos", Some("trabajo"), None))
        .unwrap();
    searcher
        .create_question(&question(4, "empleo desempleo salarios", Some("trabajo"), None))
        .unwrap();

    let index = searcher.index_handle().snapshot().unwrap();
    assert!(index.has_classifier(TOPIC_LABEL));

    let names = searcher.suggest_tags(TagDimension::Topic, first).unwrap();
    assert_eq!(names, vec!["salud", "trabajo"]);
}

#[test]
fn test_single_topic_falls_back_to_alphabetical() {
    let (_temp, store, searcher) = searcher_with_store();
    let id = searcher
        .create_question(&question(1, "empleo salarios", Some("trabajo"), None))
        .unwrap();
    searcher
        .create_question(&question(2, "empleo sindicatos", Some("trabajo"), None))
        .unwrap();
    let untagged = searcher
        .create_question(&question(3, "hospital vacunas", None, None))
        .unwrap();
    store.retag(untagged, Some("agricultura"), None).unwrap();

    // only one labelled topic when the index was built
    let index = searcher.index_handle().snapshot().unwrap();
    assert!(!index.has_classifier(TOPIC_LABEL));

    let names = searcher.suggest_tags(TagDimension::Topic, id).unwrap();
    assert_eq!(names, vec!["agricultura", "trabajo"]);
}

#[test]
fn test_subtopic_suggestion_tiers() {
    let (_temp, store, searcher) = searcher_with_store();
    let vaccines = searcher
        .create_question(&question(
            1,
            "vacunas vacunas hospital médicos",
            Some("salud"),
            Some("vacunación"),
        ))
        .unwrap();
    searcher
        .create_question(&question(
            2,
            "hospital enfermeras urgencias",
            Some("salud"),
            Some("hospitales"),
        ))
        .unwrap();
    let untagged = searcher
        .create_question(&question(3, "puertos pesca", None, Some("pesca")))
        .unwrap();

    // two salud records: not enough for a subtopic classifier
    let salud = store
        .resolve_category_id(CategoryKind::Topic, "salud")
        .unwrap()
        .unwrap();
    let index = searcher.index_handle().snapshot().unwrap();
    assert!(!index.has_classifier(&subtopic_label(salud)));

    let names = searcher.suggest_tags(TagDimension::Subtopic, vaccines).unwrap();
    assert_eq!(names, vec!["hospitales", "vacunación"]);

    let names = searcher.suggest_tags(TagDimension::Subtopic, untagged).unwrap();
    assert_eq!(names, vec!["hospitales", "pesca", "vacunación"]);

    // a third salud record trains the per-topic classifier
    searcher
        .create_question(&question(
            4,
            "vacunas campaña gripe",
            Some("salud"),
            Some("vacunación"),
        ))
        .unwrap();
    let index = searcher.index_handle().snapshot().unwrap();
    assert!(index.has_classifier(&subtopic_label(salud)));

    let names = searcher.suggest_tags(TagDimension::Subtopic, vaccines).unwrap();
    assert_eq!(names[0], "vacunación");
    assert_eq!(names.len(), 2);
}

#[test]
fn test_retag_edit_and_delete_refresh_results() {
    let (_temp, searcher) = searcher();
    let id = searcher
        .create_question(&question(1, "hospital presupuesto", None, None))
        .unwrap();
    searcher
        .create_question(&question(2, "empleo salarios", None, None))
        .unwrap();

    searcher.retag_question(id, Some(" Salud "), Some("Hospitales")).unwrap();
    let q = searcher.get_question(id).unwrap();
    assert_eq!(q.topic.unwrap().name, "salud");
    assert_eq!(q.subtopic.unwrap().name, "hospitales");

    let mut edited = question(1, "puertos pesca", Some("salud"), None);
    edited.answer = "pesca artesanal".to_string();
    searcher.edit_question(id, &edited).unwrap();

    let page = searcher.search_params(&params(&[("q", "hospital")])).unwrap();
    assert!(page.items.is_empty());
    let page = searcher
        .search_params(&params(&[("q", "pesca"), ("buscar-dentro-de", "respuestas")]))
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].question.id, id);

    searcher.delete_question(id).unwrap();
    assert!(matches!(
        searcher.get_question(id),
        Err(SrpaError::NotFound { .. })
    ));
    assert!(matches!(
        searcher.delete_question(id),
        Err(SrpaError::NotFound { .. })
    ));
    let page = searcher.search_params(&params(&[("q", "pesca")])).unwrap();
    assert!(page.items.is_empty());
}

#[test]
fn test_similar_to_existing_record() {
    let (_temp, searcher) = searcher();
    let seed = searcher
        .create_question(&question(1, "hospital vacunas médicos", None, None))
        .unwrap();
    let near = searcher
        .create_question(&question(2, "hospital vacunas enfermeras", None, None))
        .unwrap();
    searcher
        .create_question(&question(3, "empleo salarios sindicatos", None, None))
        .unwrap();

    let page = searcher
        .similar_to(seed, &params(&[("buscar-usando", "pregunta")]))
        .unwrap();
    let ids: Vec<i64> = page.items.iter().map(|hit| hit.question.id).collect();
    assert_eq!(ids, vec![near]);
}

#[test]
fn test_filter_options_list_only_used_categories() {
    let (_temp, searcher) = searcher();
    let id = searcher
        .create_question(&question(1, "hospital", Some("salud"), Some("hospitales")))
        .unwrap();
    searcher
        .create_question(&question(2, "empleo", Some("trabajo"), None))
        .unwrap();
    searcher.retag_question(id, Some(""), None).unwrap();

    let options = searcher.list_filter_options().unwrap();
    assert_eq!(options["ministerio"], vec!["trabajo"]);
    assert_eq!(options["area"], vec!["hospitales"]);
    assert_eq!(options["informe"], vec!["informe 120"]);
    assert!(options["autor"].is_empty());
}
