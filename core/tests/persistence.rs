//! Persist a run to SQLite and read it back through the store.

use chrono::NaiveDate;
use revlife_core::{
    assumptions::AssumptionSet,
    context::Dataset,
    engine::{GenerationEngine, RunInfo},
    store::RevenueStore,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn persisted(seed: u64) -> (RevenueStore, RunInfo, Dataset) {
    let set = AssumptionSet::compact(date(2023, 1, 1), date(2024, 3, 31), 60)
        .expect("compact assumptions");
    let mut engine = GenerationEngine::build(set.clone(), seed).expect("engine build");
    let info = engine.run_info();
    let data = engine.run().expect("generation run");

    let store = RevenueStore::in_memory().expect("in-memory store");
    store.persist(&info, &set, &data).expect("persist");
    (store, info, data)
}

#[test]
fn empty_database_has_no_run() {
    let store = RevenueStore::in_memory().expect("in-memory store");
    assert!(store.run_info().expect("query").is_none());
    store.reset_schema().expect("schema");
    assert!(store.run_info().expect("query").is_none());
}

#[test]
fn row_counts_match_the_dataset() {
    let (store, _, data) = persisted(21);
    let stored = store.table_counts().expect("table counts");
    let generated = data.table_counts();

    assert_eq!(stored.len(), generated.len());
    for ((table, stored), (gen_table, generated)) in stored.iter().zip(generated.iter()) {
        assert_eq!(table, gen_table, "table order differs");
        assert_eq!(*stored, *generated as i64, "{table}: stored {stored}, generated {generated}");
    }
}

#[test]
fn persisted_run_passes_contract_checks() {
    let (store, _, _) = persisted(22);
    let report = store.contract_report().expect("contract report");
    assert!(report.is_clean(), "contract violations: {report:?}");
}

#[test]
fn run_metadata_round_trips() {
    let (store, info, _) = persisted(23);
    let stored = store.run_info().expect("query").expect("run stored");
    assert_eq!(stored, info);
    assert_eq!(stored.seed, 23);
}

#[test]
fn customers_read_back_unchanged() {
    let (store, _, data) = persisted(24);
    let stored = store.customers().expect("customers");
    assert_eq!(stored.len(), data.customers.len());

    for c in &stored {
        let generated = data.customer(&c.customer_id).expect("stored customer was generated");
        assert_eq!(c.status, generated.status);
        assert_eq!(c.churn_date, generated.churn_date);
        assert_eq!(c.health_score, generated.health_score);
        assert_eq!(c.latest_nps_score, generated.latest_nps_score);
        assert!((c.current_mrr - generated.current_mrr).abs() < 1e-6);
    }
}

fn half_year_run(seed: u64) -> (AssumptionSet, RunInfo, Dataset) {
    let set = AssumptionSet::compact(date(2023, 1, 1), date(2023, 6, 30), 60)
        .expect("compact assumptions");
    let mut engine = GenerationEngine::build(set.clone(), seed).expect("engine build");
    let info = engine.run_info();
    let data = engine.run().expect("generation run");
    assert!(!data.leads.is_empty(), "seed {seed} generated no leads");
    assert!(!data.marketing_spend.is_empty(), "seed {seed} generated no spend");
    (set, info, data)
}

#[test]
fn second_persist_replaces_the_first() {
    let (store, first, first_data) = persisted(25);
    let (set, info, data) = half_year_run(26);
    assert_ne!(data.leads.len(), first_data.leads.len(), "runs are indistinguishable by size");

    store.persist(&info, &set, &data).expect("second persist");

    assert_eq!(store.run_info().expect("query").map(|r| r.seed), Some(26));
    assert_ne!(store.run_info().expect("query"), Some(first));
    assert_eq!(store.table_count("leads").expect("count"), data.leads.len() as i64);
    assert_eq!(
        store.table_count("marketing_spend").expect("count"),
        data.marketing_spend.len() as i64
    );
    assert!(store.table_count("no_such_table").is_err());
}

#[test]
fn failed_persist_leaves_the_previous_run_intact() {
    let (store, first, _) = persisted(27);
    let counts_before = store.table_counts().expect("table counts");

    let (set, info, mut data) = half_year_run(28);
    let duplicate = data.marketing_spend[0].clone();
    data.marketing_spend.push(duplicate);

    let err = store.persist(&info, &set, &data);
    assert!(err.is_err(), "duplicate spend_id was accepted");

    assert_eq!(store.run_info().expect("query"), Some(first));
    assert_eq!(store.table_counts().expect("table counts"), counts_before);
    assert!(store.contract_report().expect("contract report").is_clean());
}
