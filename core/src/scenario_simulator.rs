//! What-if scenario simulation.
//!
//! A scenario pulls one or more levers (churn reduction, conversion
//! improvement, expansion increase), each a fraction in [0, 1]. Every Monte
//! Carlo iteration scales each lever by a triangular uncertainty factor and
//! adds that share of the matching trailing annualized MRR bucket to the
//! current ARR.
//!
//! RULE: The simulator draws only from its own scenario RNG slot, so runs
//! are reproducible from the master seed and never disturb generation.

use crate::{
    context::Dataset,
    error::{GenError, GenResult},
    metrics::{mean, median, percentile},
    revenue_analytics::revenue_summary,
    rng::{RngBank, StageRng, StageSlot},
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ITERATIONS: usize = 1_000;
pub const SENSITIVITY_ITERATIONS: usize = 500;

/// Iterations echoed back in the outcome for plotting.
const DISTRIBUTION_SAMPLE: usize = 100;

const MAX_COMPARED: usize = 5;

// ── Levers ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lever {
    ChurnReduction,
    ConversionImprovement,
    ExpansionIncrease,
}

impl Lever {
    pub const ALL: [Lever; 3] = [
        Lever::ChurnReduction,
        Lever::ConversionImprovement,
        Lever::ExpansionIncrease,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lever::ChurnReduction => "churn_reduction",
            Lever::ConversionImprovement => "conversion_improvement",
            Lever::ExpansionIncrease => "expansion_increase",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Lever::ALL.into_iter().find(|l| l.as_str() == label)
    }

    /// (min, mode, max) multiplier applied to the requested lever value.
    pub fn uncertainty(&self) -> (f64, f64, f64) {
        match self {
            Lever::ChurnReduction => (0.7, 1.0, 1.3),
            Lever::ConversionImprovement => (0.6, 1.0, 1.4),
            Lever::ExpansionIncrease => (0.7, 1.0, 1.3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub churn_reduction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_improvement: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expansion_increase: Option<f64>,
}

impl Scenario {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            churn_reduction: None,
            conversion_improvement: None,
            expansion_increase: None,
        }
    }

    pub fn with(mut self, lever: Lever, value: f64) -> Self {
        *self.slot(lever) = Some(value);
        self
    }

    pub fn lever(&self, lever: Lever) -> Option<f64> {
        match lever {
            Lever::ChurnReduction => self.churn_reduction,
            Lever::ConversionImprovement => self.conversion_improvement,
            Lever::ExpansionIncrease => self.expansion_increase,
        }
    }

    fn slot(&mut self, lever: Lever) -> &mut Option<f64> {
        match lever {
            Lever::ChurnReduction => &mut self.churn_reduction,
            Lever::ConversionImprovement => &mut self.conversion_improvement,
            Lever::ExpansionIncrease => &mut self.expansion_increase,
        }
    }

    /// Levers that are set, in lever order.
    pub fn levers(&self) -> Vec<(Lever, f64)> {
        Lever::ALL
            .into_iter()
            .filter_map(|l| self.lever(l).map(|v| (l, v)))
            .collect()
    }

    pub fn validate(&self) -> GenResult<()> {
        let levers = self.levers();
        if levers.is_empty() {
            return Err(GenError::InvalidScenario(format!(
                "scenario '{}' sets no levers",
                self.name
            )));
        }
        for (lever, value) in levers {
            if !(0.0..=1.0).contains(&value) {
                return Err(GenError::InvalidScenario(format!(
                    "{} = {value} is outside [0, 1]",
                    lever.as_str()
                )));
            }
        }
        Ok(())
    }
}

// ── Presets ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preset {
    pub id:          &'static str,
    pub description: &'static str,
    pub scenario:    Scenario,
}

pub fn presets() -> Vec<Preset> {
    use Lever::*;
    vec![
        Preset {
            id: "reduce_churn_10",
            description: "What if we reduced monthly churn rate by 10%?",
            scenario: Scenario::named("Reduce Churn 10%").with(ChurnReduction, 0.10),
        },
        Preset {
            id: "reduce_churn_25",
            description: "What if we reduced monthly churn rate by 25%?",
            scenario: Scenario::named("Reduce Churn 25%").with(ChurnReduction, 0.25),
        },
        Preset {
            id: "improve_conversion_10",
            description: "What if we improved sales conversion by 10%?",
            scenario: Scenario::named("Improve Win Rate 10%").with(ConversionImprovement, 0.10),
        },
        Preset {
            id: "boost_expansion_20",
            description: "What if we increased expansion revenue by 20%?",
            scenario: Scenario::named("Boost Expansion 20%").with(ExpansionIncrease, 0.20),
        },
        Preset {
            id: "combined_moderate",
            description: "5% churn reduction, 5% conversion improvement and 10% expansion increase",
            scenario: Scenario::named("Combined Moderate")
                .with(ChurnReduction, 0.05)
                .with(ConversionImprovement, 0.05)
                .with(ExpansionIncrease, 0.10),
        },
        Preset {
            id: "combined_aggressive",
            description: "15% churn reduction, 10% conversion improvement and 25% expansion increase",
            scenario: Scenario::named("Combined Aggressive")
                .with(ChurnReduction, 0.15)
                .with(ConversionImprovement, 0.10)
                .with(ExpansionIncrease, 0.25),
        },
    ]
}

pub fn preset(id: &str) -> GenResult<Scenario> {
    presets()
        .into_iter()
        .find(|p| p.id == id)
        .map(|p| p.scenario)
        .ok_or_else(|| {
            let known: Vec<&str> = presets().iter().map(|p| p.id).collect();
            GenError::InvalidScenario(format!("unknown preset '{id}', available: {}", known.join(", ")))
        })
}

// ── Outcomes ─────────────────────────────────────────────────────────────

/// Annualized trailing-year buckets the levers act on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub current_arr:   f64,
    pub churn_arr:     f64,
    pub new_arr:       f64,
    pub expansion_arr: f64,
}

impl Baseline {
    pub fn from_dataset(data: &Dataset) -> Self {
        let summary = revenue_summary(data);
        Self {
            current_arr: summary.current_arr,
            churn_arr: summary.trailing_12m.churn * 12.0,
            new_arr: summary.trailing_12m.new * 12.0,
            expansion_arr: summary.trailing_12m.expansion * 12.0,
        }
    }

    fn bucket(&self, lever: Lever) -> f64 {
        match lever {
            Lever::ChurnReduction => self.churn_arr,
            Lever::ConversionImprovement => self.new_arr,
            Lever::ExpansionIncrease => self.expansion_arr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario_name:         String,
    pub current_arr:           f64,
    pub projected_arr_mean:    f64,
    pub projected_arr_median:  f64,
    pub arr_impact_mean:       f64,
    pub confidence_interval_10: f64,
    pub confidence_interval_25: f64,
    pub confidence_interval_75: f64,
    pub confidence_interval_90: f64,
    pub distribution:          Vec<f64>,
    pub iterations:            usize,
    pub parameters:            Scenario,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub value:           f64,
    pub arr_impact:      f64,
    pub confidence_low:  f64,
    pub confidence_high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivitySweep {
    pub lever:       Lever,
    pub min_value:   f64,
    pub max_value:   f64,
    pub current_arr: f64,
    pub points:      Vec<SensitivityPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub id:              String,
    pub name:            String,
    pub arr_impact:      f64,
    pub projected_arr:   f64,
    pub confidence_low:  f64,
    pub confidence_high: f64,
}

// ── Simulator ────────────────────────────────────────────────────────────

pub struct ScenarioSimulator {
    baseline: Baseline,
    rng:      StageRng,
}

impl ScenarioSimulator {
    pub fn new(data: &Dataset, bank: &RngBank) -> Self {
        Self::with_baseline(Baseline::from_dataset(data), bank)
    }

    pub fn with_baseline(baseline: Baseline, bank: &RngBank) -> Self {
        Self { baseline, rng: bank.for_stage(StageSlot::Scenario) }
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    pub fn run(&mut self, scenario: &Scenario, iterations: usize) -> GenResult<ScenarioOutcome> {
        scenario.validate()?;
        if iterations == 0 {
            return Err(GenError::InvalidScenario("iterations must be positive".to_string()));
        }
        let levers = scenario.levers();
        let current = self.baseline.current_arr;

        let results: Vec<f64> = (0..iterations)
            .map(|_| {
                levers.iter().fold(current, |arr, &(lever, target)| {
                    let (lo, mode, hi) = lever.uncertainty();
                    let actual = target * self.rng.triangular(lo, mode, hi);
                    arr + self.baseline.bucket(lever) * actual
                })
            })
            .collect();

        let projected_mean = mean(&results);
        log::debug!(
            "scenario '{}': {} iterations, mean impact {:.2}",
            scenario.name,
            iterations,
            projected_mean - current
        );
        Ok(ScenarioOutcome {
            scenario_name: scenario.name.clone(),
            current_arr: current,
            projected_arr_mean: projected_mean,
            projected_arr_median: median(&results),
            arr_impact_mean: projected_mean - current,
            confidence_interval_10: percentile(&results, 10.0),
            confidence_interval_25: percentile(&results, 25.0),
            confidence_interval_75: percentile(&results, 75.0),
            confidence_interval_90: percentile(&results, 90.0),
            distribution: results.iter().take(DISTRIBUTION_SAMPLE).copied().collect(),
            iterations,
            parameters: scenario.clone(),
        })
    }

    pub fn run_preset(&mut self, id: &str) -> GenResult<ScenarioOutcome> {
        let scenario = preset(id)?;
        self.run(&scenario, DEFAULT_ITERATIONS)
    }

    /// ARR impact of one lever across `steps` evenly spaced values.
    pub fn sensitivity(
        &mut self,
        lever: Lever,
        min_value: f64,
        max_value: f64,
        steps: usize,
    ) -> GenResult<SensitivitySweep> {
        if !(2..=20).contains(&steps) {
            return Err(GenError::InvalidScenario(format!(
                "sensitivity needs 2..=20 steps, got {steps}"
            )));
        }
        let step = (max_value - min_value) / (steps - 1) as f64;
        let mut points = Vec::with_capacity(steps);
        for i in 0..steps {
            let value = min_value + i as f64 * step;
            let scenario =
                Scenario::named(format!("{}={:.2}%", lever.as_str(), value * 100.0)).with(lever, value);
            let outcome = self.run(&scenario, SENSITIVITY_ITERATIONS)?;
            points.push(SensitivityPoint {
                value,
                arr_impact: outcome.arr_impact_mean,
                confidence_low: outcome.confidence_interval_10,
                confidence_high: outcome.confidence_interval_90,
            });
        }
        Ok(SensitivitySweep {
            lever,
            min_value,
            max_value,
            current_arr: self.baseline.current_arr,
            points,
        })
    }

    /// Side-by-side preset outcomes, largest impact first. Unknown ids are
    /// skipped.
    pub fn compare(&mut self, ids: &[&str]) -> GenResult<Vec<ScenarioComparison>> {
        if ids.len() > MAX_COMPARED {
            return Err(GenError::InvalidScenario(format!(
                "at most {MAX_COMPARED} scenarios can be compared"
            )));
        }
        let mut rows = Vec::new();
        for id in ids {
            let Ok(scenario) = preset(id) else {
                log::debug!("compare: skipping unknown preset '{id}'");
                continue;
            };
            let outcome = self.run(&scenario, DEFAULT_ITERATIONS)?;
            rows.push(ScenarioComparison {
                id: id.to_string(),
                name: scenario.name,
                arr_impact: outcome.arr_impact_mean,
                projected_arr: outcome.projected_arr_mean,
                confidence_low: outcome.confidence_interval_10,
                confidence_high: outcome.confidence_interval_90,
            });
        }
        rows.sort_by(|a, b| b.arr_impact.total_cmp(&a.arr_impact));
        Ok(rows)
    }
}
