//! What-if scenarios: validation, presets, sweeps and reproducibility.

use revlife_core::{
    error::GenError,
    rng::RngBank,
    scenario_simulator::{
        preset, presets, Baseline, Lever, Scenario, ScenarioSimulator, DEFAULT_ITERATIONS,
    },
};

fn baseline() -> Baseline {
    Baseline {
        current_arr:   1_200_000.0,
        churn_arr:     240_000.0,
        new_arr:       480_000.0,
        expansion_arr: 120_000.0,
    }
}

fn simulator(seed: u64) -> ScenarioSimulator {
    ScenarioSimulator::with_baseline(baseline(), &RngBank::new(seed))
}

#[test]
fn scenario_without_levers_is_rejected() {
    let mut sim = simulator(1);
    let err = sim.run(&Scenario::named("Nothing"), 100).expect_err("no levers set");
    assert!(matches!(err, GenError::InvalidScenario(_)), "got {err}");
}

#[test]
fn lever_outside_unit_interval_is_rejected() {
    let too_big = Scenario::named("Too big").with(Lever::ChurnReduction, 1.5);
    assert!(matches!(too_big.validate(), Err(GenError::InvalidScenario(_))));

    let negative = Scenario::named("Negative").with(Lever::ExpansionIncrease, -0.1);
    assert!(matches!(negative.validate(), Err(GenError::InvalidScenario(_))));
}

#[test]
fn zero_iterations_is_rejected() {
    let mut sim = simulator(1);
    let scenario = Scenario::named("Churn").with(Lever::ChurnReduction, 0.1);
    assert!(sim.run(&scenario, 0).is_err());
}

#[test]
fn same_seed_same_outcome() {
    let scenario = Scenario::named("Churn").with(Lever::ChurnReduction, 0.1);
    let a = simulator(77).run(&scenario, 500).expect("run a");
    let b = simulator(77).run(&scenario, 500).expect("run b");
    assert_eq!(a, b);

    let c = simulator(78).run(&scenario, 500).expect("run c");
    assert_ne!(a.distribution, c.distribution, "different seeds drew the same factors");
}

#[test]
fn single_lever_impact_stays_inside_its_uncertainty_band() {
    let mut sim = simulator(3);
    let scenario = Scenario::named("Churn 10%").with(Lever::ChurnReduction, 0.10);
    let outcome = sim.run(&scenario, 2_000).expect("run");

    // 10% of 240k, scaled by a triangular factor in [0.7, 1.3].
    let lowest = 1_200_000.0 + 240_000.0 * 0.10 * 0.7;
    let highest = 1_200_000.0 + 240_000.0 * 0.10 * 1.3;
    assert!(outcome.arr_impact_mean >= 0.0);
    assert!((outcome.arr_impact_mean - 24_000.0).abs() < 1_000.0, "got {}", outcome.arr_impact_mean);
    assert!(outcome.confidence_interval_10 >= lowest && outcome.confidence_interval_90 <= highest);
    assert!(outcome.confidence_interval_10 <= outcome.confidence_interval_25);
    assert!(outcome.confidence_interval_25 <= outcome.projected_arr_median);
    assert!(outcome.projected_arr_median <= outcome.confidence_interval_75);
    assert!(outcome.confidence_interval_75 <= outcome.confidence_interval_90);
    assert_eq!(outcome.distribution.len(), 100);
    assert_eq!(outcome.iterations, 2_000);
}

#[test]
fn presets_are_valid_and_addressable() {
    let all = presets();
    assert_eq!(all.len(), 6);
    for p in &all {
        p.scenario.validate().expect("preset validates");
        assert_eq!(preset(p.id).expect("lookup by id"), p.scenario);
    }
    assert!(matches!(preset("moonshot"), Err(GenError::InvalidScenario(_))));
}

#[test]
fn preset_runs_use_default_iterations() {
    let mut sim = simulator(9);
    let outcome = sim.run_preset("combined_moderate").expect("preset run");
    assert_eq!(outcome.iterations, DEFAULT_ITERATIONS);
    assert_eq!(outcome.parameters.levers().len(), 3);
    assert!(outcome.arr_impact_mean > 0.0);
}

#[test]
fn sensitivity_sweep_grows_with_the_lever() {
    let mut sim = simulator(5);
    let sweep = sim.sensitivity(Lever::ExpansionIncrease, 0.0, 0.5, 6).expect("sweep");
    assert_eq!(sweep.points.len(), 6);
    assert_eq!(sweep.points[0].value, 0.0);
    assert!((sweep.points[5].value - 0.5).abs() < 1e-12);
    assert_eq!(sweep.points[0].arr_impact, 0.0);
    for pair in sweep.points.windows(2) {
        assert!(pair[1].arr_impact > pair[0].arr_impact, "impact did not grow with the lever");
    }
}

#[test]
fn sensitivity_step_count_is_bounded() {
    let mut sim = simulator(5);
    assert!(sim.sensitivity(Lever::ChurnReduction, 0.0, 0.3, 1).is_err());
    assert!(sim.sensitivity(Lever::ChurnReduction, 0.0, 0.3, 21).is_err());
    assert!(sim.sensitivity(Lever::ChurnReduction, 0.0, 0.3, 2).is_ok());
}

#[test]
fn comparison_skips_unknown_and_sorts_by_impact() {
    let mut sim = simulator(11);
    let rows = sim
        .compare(&["reduce_churn_10", "no_such_preset", "combined_aggressive"])
        .expect("compare");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, "combined_aggressive");
    assert!(rows[0].arr_impact >= rows[1].arr_impact);

    let too_many = ["a", "b", "c", "d", "e", "f"];
    assert!(sim.compare(&too_many).is_err());
}

#[test]
fn lever_labels_round_trip() {
    for lever in Lever::ALL {
        assert_eq!(Lever::parse(lever.as_str()), Some(lever));
    }
    assert_eq!(Lever::parse("price_increase"), None);
}
