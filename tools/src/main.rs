//! revlife-runner: headless generator for the revenue lifecycle dataset.
//!
//! Usage:
//!   revlife-runner --seed 42 --db revenue.db
//!   revlife-runner --seed 42 --assumptions data/assumptions/default_assumptions.json --report
//!   revlife-runner --seed 42 --scenario combined_moderate
//!   revlife-runner --sensitivity churn_reduction
//!   revlife-runner --dump-assumptions

use anyhow::{bail, Context, Result};
use revlife_core::{
    assumptions::AssumptionSet,
    churn_analytics,
    engine::GenerationEngine,
    funnel_analytics, health_analytics,
    model::SegmentField,
    revenue_analytics,
    scenario_simulator::{Lever, ScenarioSimulator},
    store::RevenueStore,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let assumptions_path = string_arg(&args, "--assumptions");
    let scenario = string_arg(&args, "--scenario");
    let sensitivity = string_arg(&args, "--sensitivity");
    let report = args.iter().any(|a| a == "--report");

    let assumptions = match assumptions_path {
        Some(path) => AssumptionSet::load(path)
            .with_context(|| format!("loading assumptions from {path}"))?,
        None => AssumptionSet::standard()?,
    };

    if args.iter().any(|a| a == "--dump-assumptions") {
        println!("{}", assumptions.to_json_pretty()?);
        return Ok(());
    }

    println!("Revenue lifecycle generator: revlife-runner");
    println!("  seed:        {seed}");
    println!("  db:          {db}");
    println!("  assumptions: {}", assumptions_path.unwrap_or("(built-in)"));
    println!("  horizon:     {} .. {}", assumptions.horizon.start, assumptions.horizon.end);
    println!();

    let mut engine = GenerationEngine::build(assumptions.clone(), seed)?;
    let info = engine.run_info();
    let dataset = engine.run()?;

    let store = RevenueStore::open(db)?;
    store.persist(&info, &assumptions, &dataset)?;

    println!("=== RUN SUMMARY ===");
    println!("  run_id:  {}", info.run_id);
    for (table, count) in store.table_counts()? {
        println!("  {table:<24} {count:>9}");
    }

    let contract = store.contract_report()?;
    println!();
    println!("=== CONTRACT CHECKS ===");
    println!("{}", serde_json::to_string_pretty(&contract)?);
    if !contract.is_clean() {
        log::warn!("contract report is not clean for {}", info.run_id);
    }

    let revenue = revenue_analytics::revenue_summary(&dataset);
    println!();
    println!("=== REVENUE ===");
    println!("  MRR:              ${:.0}", revenue.current_mrr);
    println!("  ARR:              ${:.0}", revenue.current_arr);
    println!("  active customers: {}", revenue.active_customers);
    println!("  NRR:              {:.1}%", revenue.nrr * 100.0);
    println!("  LTV:CAC:          {:.2}", revenue.ltv_cac_ratio);

    if report {
        let analytics = serde_json::json!({
            "funnel": {
                "summary": funnel_analytics::funnel_summary(&dataset),
                "conversion": funnel_analytics::stage_conversion_rates(&dataset),
                "by_segment": funnel_analytics::funnel_by_segment(&dataset, SegmentField::CompanySize),
                "velocity": funnel_analytics::velocity_metrics(&dataset),
                "loss_reasons": funnel_analytics::loss_reasons(&dataset),
                "reps": funnel_analytics::rep_performance(&dataset),
                "cac_by_channel": funnel_analytics::cac_by_channel(&dataset),
                "cohorts": funnel_analytics::cohort_analysis(&dataset),
            },
            "revenue": {
                "summary": revenue,
                "ltv_cac": revenue_analytics::ltv_cac_summary(&dataset),
                "waterfall": revenue_analytics::mrr_waterfall(&dataset, None),
                "at_risk": revenue_analytics::revenue_at_risk(&dataset),
                "leakage": revenue_analytics::revenue_leakage(&dataset),
            },
            "churn": {
                "summary": churn_analytics::churn_summary(&dataset),
                "by_segment": churn_analytics::churn_by_segment(&dataset, SegmentField::CompanySize),
                "cohorts": churn_analytics::churn_cohorts(&dataset),
                "interventions": churn_analytics::intervention_plan(&dataset, 50_000.0),
            },
            "health": {
                "distribution": health_analytics::health_distribution(&dataset),
                "by_segment": health_analytics::health_by_segment(&dataset, SegmentField::CompanySize),
            },
        });
        println!();
        println!("=== ANALYTICS ===");
        println!("{}", serde_json::to_string_pretty(&analytics)?);
    }

    let mut simulator = ScenarioSimulator::new(&dataset, &engine.rng_bank);
    if let Some(id) = scenario {
        let outcome = simulator.run_preset(id)?;
        println!();
        println!("=== SCENARIO: {} ===", outcome.scenario_name);
        println!("  current ARR:   ${:.0}", outcome.current_arr);
        println!("  projected ARR: ${:.0}", outcome.projected_arr_mean);
        println!("  impact:        ${:.0}", outcome.arr_impact_mean);
        println!(
            "  p10..p90:      ${:.0} .. ${:.0}",
            outcome.confidence_interval_10, outcome.confidence_interval_90
        );
    }
    if let Some(label) = sensitivity {
        let Some(lever) = Lever::parse(label) else {
            let known: Vec<&str> = Lever::ALL.iter().map(|l| l.as_str()).collect();
            bail!("unknown lever '{label}', expected one of: {}", known.join(", "));
        };
        let sweep = simulator.sensitivity(lever, 0.0, 0.3, 10)?;
        println!();
        println!("=== SENSITIVITY: {} ===", lever.as_str());
        for point in &sweep.points {
            println!("  {:>5.1}%  impact ${:.0}", point.value * 100.0, point.arr_impact);
        }
    }

    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
