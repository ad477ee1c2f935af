//! Integration tests for cross-dataset translation.
//!
//! These tests run the translator against a mock connection serving fixed
//! catalogs, concept listings and stored queries.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use cqapi_query::{Catalog, ConqueryId, QueryNode};
use cqapi_translate::{
    CacheConfig, ConceptListingEntry, Connection, ConnectionError, RemovedKind, TranslateError,
    Translator, TranslatorConfig,
};
use serde_json::{json, Value};

// =============================================================================
// Mock connection
// =============================================================================

#[derive(Default)]
struct MockConnection {
    catalogs: HashMap<String, Catalog>,
    listings: HashMap<String, Vec<ConceptListingEntry>>,
    stored: HashMap<String, Value>,
    executed: Mutex<Vec<(String, Value)>>,
    listing_calls: AtomicUsize,
}

impl MockConnection {
    fn new() -> Self {
        let mut conn = MockConnection::default();
        conn.catalogs.insert("dataset2".to_string(), alter_catalog());
        conn.catalogs.insert("dataset3".to_string(), icd_catalog("dataset3"));
        conn.listings.insert(
            "dataset3.icd".to_string(),
            vec![
                ConceptListingEntry::new("dataset3.icd.a00-b99"),
                ConceptListingEntry::new("dataset3.icd.a00-b99.a00-a09"),
                ConceptListingEntry::new("dataset3.icd.a00-b99.a00-a09.a00"),
            ],
        );
        conn
    }

    fn with_stored(mut self, query_id: &str, query: Value) -> Self {
        self.stored.insert(query_id.to_string(), query);
        self
    }

    fn executed(&self) -> Vec<(String, Value)> {
        self.executed.lock().unwrap().clone()
    }
}

impl Connection for MockConnection {
    fn get_concepts(&self, dataset: &str) -> Result<Catalog, ConnectionError> {
        self.catalogs
            .get(dataset)
            .cloned()
            .ok_or_else(|| format!("unknown dataset {dataset}").into())
    }

    fn get_concept(&self, root: &ConqueryId) -> Result<Vec<ConceptListingEntry>, ConnectionError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.listings.get(&root.to_string()).cloned().unwrap_or_default())
    }

    fn execute_query(
        &self,
        dataset: &str,
        query: &Value,
        _label: Option<&str>,
    ) -> Result<ConqueryId, ConnectionError> {
        let mut executed = self.executed.lock().unwrap();
        executed.push((dataset.to_string(), query.clone()));
        Ok(ConqueryId::parse(&format!("{dataset}.query{}", executed.len()))?)
    }

    fn get_query(&self, query_id: &ConqueryId) -> Result<Value, ConnectionError> {
        self.stored
            .get(&query_id.to_string())
            .cloned()
            .ok_or_else(|| format!("unknown query {query_id}").into())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn id(s: &str) -> ConqueryId {
    ConqueryId::parse(s).unwrap()
}

/// Replaces every occurrence of one dataset name in a JSON fixture.
fn in_dataset(value: &Value, from: &str, to: &str) -> Value {
    serde_json::from_str(&value.to_string().replace(from, to)).unwrap()
}

fn alter_catalog() -> Catalog {
    Catalog::from_json(json!({
        "dataset2.alter": {
            "children": [],
            "tables": [{
                "id": "dataset2.vers_stamm",
                "connectorId": "dataset2.alter.alter",
                "dateColumn": {
                    "defaultValue": "dataset2.alter.alter.versichertenzeit",
                    "options": [
                        {"label": "Versichertenzeit", "value": "dataset2.alter.alter.versichertenzeit"},
                        {"label": "Erster Tag", "value": "dataset2.alter.alter.erster_tag"},
                        {"label": "Letzter Tag", "value": "dataset2.alter.alter.letzter_tag"}
                    ]
                },
                "filters": [{
                    "id": "dataset2.alter.alter.alterseinschr$c3$a4nkung",
                    "label": "Alterseinschränkung",
                    "type": "INTEGER_RANGE",
                    "unit": null,
                    "description": "Alter zur gegebenen Datumseinschränkung"
                }]
            }]
        }
    }))
    .unwrap()
}

fn icd_catalog(dataset: &str) -> Catalog {
    let catalog = json!({
        "dataset3.icd": {
            "children": ["dataset3.icd.a00-b99", "dataset3.icd.c00-d48"],
            "label": "ICD",
            "selects": [{"id": "dataset3.icd.exists", "label": "ICD liegt vor", "description": null}],
            "tables": [
                {
                    "id": "dataset3.kh_diagnose",
                    "label": "KH Diagnose",
                    "connectorId": "dataset3.icd.kh_diagnose_icd_code",
                    "dateColumn": {"options": [
                        {"value": "dataset3.icd.kh_diagnose_icd_code.entlassungsdatum"},
                        {"value": "dataset3.icd.kh_diagnose_icd_code.aufnahmedatum"},
                        {"value": "dataset3.icd.kh_diagnose_icd_code.aufenthaltsdauer"}
                    ]},
                    "selects": [
                        {"id": "dataset3.icd.kh_diagnose_icd_code.liste_icd",
                         "label": "Ausgabe ICD-Code (TP4a)", "description": null},
                        {"id": "dataset3.icd.kh_diagnose_icd_code.anzahl_krankenhausfaelle",
                         "label": "Anzahl Krankenhausfälle"}
                    ],
                    "filters": [
                        {"id": "dataset3.icd.kh_diagnose_icd_code.diagnoseart",
                         "label": "Diagnoseart", "type": "MULTI_SELECT",
                         "description": "Art der Diagnose"},
                        {"id": "dataset3.icd.kh_diagnose_icd_code.diagnose-anhang",
                         "label": "Diagnose-Anhang", "type": "MULTI_SELECT"}
                    ]
                },
                {
                    "id": "dataset3.au_diagnose",
                    "label": "AU Diagnose",
                    "connectorId": "dataset3.icd.au_fall",
                    "dateColumn": {"options": [
                        {"value": "dataset3.icd.au_fall.au-beginn"},
                        {"value": "dataset3.icd.au_fall.au-ende"},
                        {"value": "dataset3.icd.au_fall.au-zeit"}
                    ]}
                },
                {
                    "id": "dataset3.arzt_diagnose",
                    "connectorId": "dataset3.icd.arzt_diagnose_icd_code",
                    "dateColumn": null
                }
            ]
        }
    });
    Catalog::from_json(in_dataset(&catalog, "dataset3", dataset)).unwrap()
}

fn alter_query() -> Value {
    json!({
        "type": "CONCEPT_QUERY",
        "root": {
            "type": "AND",
            "children": [{
                "type": "DATE_RESTRICTION",
                "dateRange": {"max": null, "min": null},
                "child": {
                    "type": "OR",
                    "children": [{
                        "type": "CONCEPT",
                        "ids": ["dataset1.alter"],
                        "tables": [{
                            "id": "dataset1.alter.alter",
                            "dateColumn": {"value": "dataset1.alter.alter.versichertenzeit"},
                            "filters": [{
                                "filter": "dataset1.alter.alter.alterseinschr$c3$a4nkung",
                                "type": "INTEGER_RANGE",
                                "value": {"min": 21, "max": null}
                            }]
                        }]
                    }]
                }
            }]
        }
    })
}

fn icd_query() -> Value {
    json!({
        "type": "CONCEPT",
        "ids": ["dataset1.icd.c00-d48"],
        "selects": ["dataset1.icd.exists", "dataset1.icd.test"],
        "tables": [
            {
                "id": "dataset1.icd.kh_diagnose_icd_code",
                "dateColumn": {"value": "dataset1.icd.kh_diagnose_icd_code.entlassungsdatum"},
                "selects": ["dataset1.icd.kh_diagnose_icd_code.anzahl_krankenhausfaelle",
                            "dataset1.icd.kh_diagnose_icd_code.test"],
                "filters": []
            },
            {
                "id": "dataset1.icd.au_fall",
                "dateColumn": {"value": "dataset1.icd.au_fall.au-beginn"},
                "selects": [],
                "filters": []
            },
            {
                "id": "dataset1.icd.arzt_diagnose_icd_code",
                "selects": [],
                "filters": []
            },
            {
                "id": "dataset1.icd.au_fall_21c",
                "dateColumn": {"value": "dataset1.icd.au_fall_21c.au-beginn_(21c)"},
                "selects": [],
                "filters": []
            }
        ]
    })
}

fn concept(raw_id: &str, connector: &str) -> Value {
    json!({"type": "CONCEPT", "ids": [raw_id], "tables": [{"id": connector}]})
}

fn decode(value: &Value) -> QueryNode {
    QueryNode::from_wire(value).unwrap()
}

// =============================================================================
// Tree translation
// =============================================================================

#[test]
fn test_translate_full_query() {
    let conn = MockConnection::new();
    let translator = Translator::new(&conn);
    let query = decode(&alter_query());

    let outcome = translator
        .translate(&query, &conn.get_concepts("dataset2").unwrap())
        .unwrap();

    // An empty date range is not written back.
    let mut expected = alter_query();
    expected["root"]["children"][0]
        .as_object_mut()
        .unwrap()
        .remove("dateRange");

    assert_eq!(outcome.residual.unwrap().to_wire(), expected);
    assert_eq!(
        outcome.translated.unwrap().to_wire(),
        in_dataset(&expected, "dataset1", "dataset2")
    );
    assert!(outcome.removed.is_empty());
    assert_eq!(conn.listing_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_translate_partial_concept() {
    let conn = MockConnection::new();
    let translator = Translator::new(&conn);
    let query = decode(&icd_query());

    let outcome = translator
        .translate(&query, &conn.get_concepts("dataset3").unwrap())
        .unwrap();

    let expected_residual = json!({
        "type": "CONCEPT",
        "ids": ["dataset1.icd.c00-d48"],
        "selects": ["dataset1.icd.exists"],
        "tables": [
            {
                "id": "dataset1.icd.kh_diagnose_icd_code",
                "dateColumn": {"value": "dataset1.icd.kh_diagnose_icd_code.entlassungsdatum"},
                "selects": ["dataset1.icd.kh_diagnose_icd_code.anzahl_krankenhausfaelle"]
            },
            {
                "id": "dataset1.icd.au_fall",
                "dateColumn": {"value": "dataset1.icd.au_fall.au-beginn"}
            },
            {"id": "dataset1.icd.arzt_diagnose_icd_code"}
        ]
    });
    assert_eq!(outcome.residual.unwrap().to_wire(), expected_residual);
    assert_eq!(
        outcome.translated.unwrap().to_wire(),
        in_dataset(&expected_residual, "dataset1", "dataset3")
    );

    let removed = &outcome.removed;
    assert_eq!(removed.len(), 3);
    assert!(removed.contains(&id("dataset1.icd.test"), RemovedKind::ConceptSelect));
    assert!(removed.contains(
        &id("dataset1.icd.kh_diagnose_icd_code.test"),
        RemovedKind::ConnectorSelect
    ));
    assert!(removed.contains(&id("dataset1.icd.au_fall_21c"), RemovedKind::Connector));
}

#[test]
fn test_connector_drop_only_affects_table() {
    let conn = MockConnection::new();
    let translator = Translator::new(&conn);
    let query = decode(&json!({
        "type": "CONCEPT",
        "ids": ["dataset1.icd.a00-b99"],
        "tables": [{"id": "dataset1.icd.au_fall"}, {"id": "dataset1.icd.kh_diagnose"}]
    }));

    let outcome = translator
        .translate(&query, &conn.get_concepts("dataset3").unwrap())
        .unwrap();

    assert_eq!(
        outcome.residual.unwrap(),
        decode(&concept("dataset1.icd.a00-b99", "dataset1.icd.au_fall"))
    );
    assert_eq!(
        outcome.translated.unwrap(),
        decode(&concept("dataset3.icd.a00-b99", "dataset3.icd.au_fall"))
    );
    assert_eq!(outcome.removed.of_kind(RemovedKind::Connector), vec![&id("dataset1.icd.kh_diagnose")]);
}

#[test]
fn test_junction_partial_and_total_loss() {
    let conn = MockConnection::new();
    let translator = Translator::new(&conn);
    let catalog = conn.get_concepts("dataset3").unwrap();

    let partial = decode(&json!({
        "type": "AND",
        "children": [
            concept("dataset1.atc", "dataset1.atc.verordnung"),
            concept("dataset1.icd", "dataset1.icd.au_fall")
        ]
    }));
    let outcome = translator.translate(&partial, &catalog).unwrap();
    assert_eq!(
        outcome.translated.unwrap().to_wire(),
        json!({"type": "AND", "children": [concept("dataset3.icd", "dataset3.icd.au_fall")]})
    );
    assert!(outcome.removed.contains(&id("dataset1.atc"), RemovedKind::Concept));

    let lost = decode(&json!({
        "type": "OR",
        "children": [
            concept("dataset1.atc", "dataset1.atc.verordnung"),
            concept("dataset1.icd.z00-z99", "dataset1.icd.au_fall")
        ]
    }));
    let outcome = translator.translate(&lost, &catalog).unwrap();
    assert!(outcome.translated.is_none());
    assert!(outcome.residual.is_none());
    assert_eq!(outcome.removed.of_kind(RemovedKind::Concept).len(), 2);
}

#[test]
fn test_saved_query_inside_tree() {
    let conn = MockConnection::new();
    let translator = Translator::new(&conn);
    let query = decode(&json!({
        "type": "CONCEPT_QUERY",
        "root": {
            "type": "OR",
            "children": [
                concept("dataset1.icd", "dataset1.icd.au_fall"),
                {"type": "NEGATION", "child": {"type": "SAVED_QUERY", "query": "dataset1.7a3e"}}
            ]
        }
    }));

    let err = translator
        .translate(&query, &conn.get_concepts("dataset3").unwrap())
        .unwrap_err();
    assert!(matches!(err, TranslateError::SavedQueryTranslation));
}

#[test]
fn test_external_is_hard_error() {
    let conn = MockConnection::new();
    let query = decode(&json!({
        "type": "EXTERNAL",
        "format": ["ID"],
        "values": [["pid"], ["1"]]
    }));
    let err = Translator::new(&conn)
        .translate(&query, &conn.get_concepts("dataset3").unwrap())
        .unwrap_err();
    assert!(matches!(err, TranslateError::ExternalQueryTranslation));
}

// =============================================================================
// Deep concept ids
// =============================================================================

#[test]
fn test_deep_ids_resolved_through_listing() {
    let conn = MockConnection::new();
    let translator = Translator::new(&conn);
    let query = decode(&json!({
        "type": "CONCEPT",
        "ids": ["dataset1.icd.a00-b99.a00-a09", "dataset1.icd.a00-b99.a15-a19"],
        "tables": [{"id": "dataset1.icd.au_fall"}]
    }));

    let outcome = translator
        .translate(&query, &conn.get_concepts("dataset3").unwrap())
        .unwrap();

    assert_eq!(
        outcome.translated.unwrap().to_wire()["ids"],
        json!(["dataset3.icd.a00-b99.a00-a09"])
    );
    assert!(outcome
        .removed
        .contains(&id("dataset1.icd.a00-b99.a15-a19"), RemovedKind::Concept));
    assert_eq!(outcome.stats.listings_fetched, 1);
    assert_eq!(conn.listing_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_listing_cache_reused() {
    let conn = MockConnection::new();
    let config = TranslatorConfig::builder()
        .with_cache(CacheConfig::default())
        .build();
    let translator = Translator::with_config(&conn, config);
    let catalog = conn.get_concepts("dataset3").unwrap();
    let query = decode(&concept("dataset1.icd.a00-b99.a00-a09.a00", "dataset1.icd.au_fall"));

    let first = translator.translate(&query, &catalog).unwrap();
    let second = translator.translate(&query, &catalog).unwrap();

    assert!(first.is_complete());
    assert!(second.is_complete());
    assert_eq!(second.stats.cache_hits, 1);
    assert_eq!(conn.listing_calls.load(Ordering::SeqCst), 1);
    assert_eq!(translator.cache().map(|c| c.len()), Some(1));
}

#[test]
fn test_known_set_overrides_children_list() {
    let conn = MockConnection::new();
    let translator = Translator::new(&conn);
    let catalog = conn.get_concepts("dataset3").unwrap();
    // Not listed under the root's children, but known from a listing.
    let query = decode(&concept("dataset1.icd.q00-q99.q00", "dataset1.icd.au_fall"));

    let known: HashSet<ConqueryId> = [id("dataset3.icd.q00-q99.q00")].into_iter().collect();
    let outcome = translator.translate_with(&query, &catalog, Some(&known)).unwrap();
    assert!(outcome.is_translated());

    let err = translator.translate_with(&query, &catalog, None).unwrap_err();
    assert!(matches!(err, TranslateError::MissingDescendantIds(_)));
}

#[test]
fn test_deep_id_under_missing_root_dropped() {
    let conn = MockConnection::new();
    let translator = Translator::new(&conn);
    let query = decode(&concept("dataset1.atc.a.b", "dataset1.atc.rezepte"));

    let outcome = translator
        .translate(&query, &conn.get_concepts("dataset3").unwrap())
        .unwrap();

    assert!(outcome.translated.is_none());
    assert!(outcome.residual.is_none());
    assert_eq!(outcome.removed.len(), 1);
    assert!(outcome
        .removed
        .contains(&id("dataset1.atc.a.b"), RemovedKind::Concept));
    assert_eq!(conn.listing_calls.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Batches, stored queries and labels
// =============================================================================

#[test]
fn test_translate_all() {
    let conn = MockConnection::new();
    let translator = Translator::new(&conn);
    let queries = vec![
        decode(&icd_query()),
        decode(&concept("dataset1.alter", "dataset1.alter.alter")),
        decode(&concept("dataset1.icd", "dataset1.icd.au_fall")),
    ];

    let batch = translator
        .translate_all(&queries, &conn.get_concepts("dataset3").unwrap())
        .unwrap();

    assert_eq!(batch.len(), 2);
    assert_eq!(batch.residual.len(), 2);
    assert_eq!(batch.removed.len(), 4);
    assert!(batch.removed.contains(&id("dataset1.alter"), RemovedKind::Concept));
}

#[cfg(feature = "parallel")]
#[test]
fn test_translate_all_parallel() {
    let conn = MockConnection::new();
    let config = TranslatorConfig::builder().with_parallel(true).build();
    let translator = Translator::with_config(&conn, config);
    let queries: Vec<QueryNode> = (0..32).map(|_| decode(&icd_query())).collect();

    let batch = translator
        .translate_all(&queries, &conn.get_concepts("dataset3").unwrap())
        .unwrap();

    assert_eq!(batch.len(), 32);
    assert_eq!(batch.removed.len(), 96);
}

#[test]
fn test_stored_query_translated_and_executed() {
    let conn = MockConnection::new().with_stored("dataset1.q1", icd_query());
    let translator = Translator::new(&conn);

    let result = translator
        .translate_and_execute_stored_query(&id("dataset1.q1"), "dataset3")
        .unwrap();

    assert_eq!(result.query_id, id("dataset3.query1"));
    assert_eq!(result.removed.len(), 3);
    let executed = conn.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].0, "dataset3");
    assert_eq!(executed[0].1["ids"], json!(["dataset3.icd.c00-d48"]));
}

#[test]
fn test_stored_query_with_nothing_left() {
    let conn = MockConnection::new()
        .with_stored("dataset1.q2", concept("dataset1.alter", "dataset1.alter.alter"));
    let translator = Translator::new(&conn);

    let err = translator
        .translate_and_execute_stored_query(&id("dataset1.q2"), "dataset3")
        .unwrap_err();

    assert!(matches!(err, TranslateError::NothingTranslated(ref q) if q == "dataset1.q2"));
    assert!(conn.executed().is_empty());
}

#[test]
fn test_unknown_stored_query() {
    let conn = MockConnection::new();
    let err = Translator::new(&conn)
        .translate_and_execute_stored_query(&id("dataset1.missing"), "dataset3")
        .unwrap_err();
    assert!(matches!(err, TranslateError::Connection(_)));
}

#[test]
fn test_removed_labels_from_source_catalog() {
    let conn = MockConnection::new();
    let translator = Translator::new(&conn);
    let query = decode(&json!({
        "type": "CONCEPT",
        "ids": ["dataset1.icd.c00-d48"],
        "tables": [{
            "id": "dataset1.icd.kh_diagnose_icd_code",
            "selects": ["dataset1.icd.kh_diagnose_icd_code.liste_icd"],
            "filters": [{
                "filter": "dataset1.icd.kh_diagnose_icd_code.diagnoseart",
                "type": "MULTI_SELECT",
                "value": ["1"]
            }]
        }]
    }));

    let mut target = icd_catalog("dataset3");
    let mut icd = target.get(&id("dataset3.icd")).unwrap().clone();
    icd.tables[0].selects.clear();
    icd.tables[0].filters.clear();
    target.insert("dataset3.icd", icd);

    let outcome = translator.translate(&query, &target).unwrap();
    let labels = outcome.removed.resolve_labels(&icd_catalog("dataset1")).unwrap();

    assert_eq!(labels.len(), 2);
    assert!(labels.iter().all(|l| l.concept == "ICD"));
    assert!(labels.iter().all(|l| l.connector.as_deref() == Some("KH Diagnose")));
    assert_eq!(labels[0].label.as_deref(), Some("Ausgabe ICD-Code (TP4a)"));
    assert_eq!(labels[1].label.as_deref(), Some("Diagnoseart"));
}
