//! THE MOST IMPORTANT TEST IN THE PROJECT.
//!
//! Two engines, same seed, same assumption set.
//! They must produce byte-identical datasets.
//! Any divergence is a blocker: do not merge until fixed.

use chrono::NaiveDate;
use revlife_core::{
    assumptions::AssumptionSet,
    context::Dataset,
    engine::GenerationEngine,
    scenario_simulator::ScenarioSimulator,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn assumptions() -> AssumptionSet {
    AssumptionSet::compact(date(2023, 1, 1), date(2024, 3, 31), 50).expect("compact assumptions")
}

fn generate(seed: u64) -> Dataset {
    let _ = env_logger::builder().is_test(true).try_init();
    GenerationEngine::build(assumptions(), seed)
        .expect("engine build")
        .run()
        .expect("generation run")
}

fn serialized_tables(data: &Dataset) -> Vec<(&'static str, String)> {
    vec![
        ("sales_reps", serde_json::to_string(&data.sales_reps).expect("serialize")),
        ("leads", serde_json::to_string(&data.leads).expect("serialize")),
        ("opportunities", serde_json::to_string(&data.opportunities).expect("serialize")),
        ("stage_transitions", serde_json::to_string(&data.stage_transitions).expect("serialize")),
        ("customers", serde_json::to_string(&data.customers).expect("serialize")),
        ("usage_events", serde_json::to_string(&data.usage_events).expect("serialize")),
        ("marketing_spend", serde_json::to_string(&data.marketing_spend).expect("serialize")),
        ("mrr_movements", serde_json::to_string(&data.mrr_movements).expect("serialize")),
        ("nps_surveys", serde_json::to_string(&data.nps_surveys).expect("serialize")),
        (
            "expansion_opportunities",
            serde_json::to_string(&data.expansion_opportunities).expect("serialize"),
        ),
    ]
}

#[test]
fn same_seed_produces_identical_datasets() {
    const SEED: u64 = 0xDEAD_BEEF_CAFE_1234;

    let data_a = generate(SEED);
    let data_b = generate(SEED);

    for ((table, a), (_, b)) in serialized_tables(&data_a).iter().zip(serialized_tables(&data_b).iter()) {
        assert_eq!(
            a.len(), b.len(),
            "Table {table} serialized lengths differ: {} vs {}",
            a.len(), b.len()
        );
        assert_eq!(a, b, "Table {table} diverged between identical runs");
    }
    assert_eq!(data_a, data_b);
}

#[test]
fn different_seeds_produce_different_datasets() {
    let data_a = generate(1);
    let data_b = generate(2);
    assert_ne!(
        serde_json::to_string(&data_a.leads).expect("serialize"),
        serde_json::to_string(&data_b.leads).expect("serialize"),
        "Seeds 1 and 2 generated the same leads"
    );
}

#[test]
fn scenario_runs_are_reproducible_from_the_master_seed() {
    const SEED: u64 = 7;

    let run = || {
        let mut engine = GenerationEngine::build(assumptions(), SEED).expect("engine build");
        let data = engine.run().expect("generation run");
        let mut simulator = ScenarioSimulator::new(&data, &engine.rng_bank);
        simulator.run_preset("combined_moderate").expect("preset run")
    };

    let a = run();
    let b = run();
    assert_eq!(a, b, "Scenario outcomes diverged for the same seed");
}
