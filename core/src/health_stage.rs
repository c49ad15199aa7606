//! Final health score pass.
//!
//! For active customers: a weighted composite of recent usage against the
//! segment baseline, the latest NPS response, and tenure, thresholded to
//! Green / Yellow / Red. The stored churn probability is then drawn
//! uniformly inside the category's band rather than computed, so the
//! label and any model trained later on the same rows diverge the way
//! real data does. Churned customers carry neither field.
//!
//! Execution: last. Depends on: customers, usage, nps.

use crate::{
    assumptions::{AssumptionSet, HealthAssumptions},
    calendar::days_between,
    context::GenerationContext,
    error::GenResult,
    model::{round_3dp, CompanySize, HealthScore, NpsCategory, UsageEvent, UsageMetric},
    rng::StageRng,
    stage::GenerationStage,
    types::SimDate,
};

pub struct HealthStage;

impl GenerationStage for HealthStage {
    fn name(&self) -> &'static str {
        "health"
    }

    fn run(
        &mut self,
        ctx: &mut GenerationContext,
        assumptions: &AssumptionSet,
        rng: &mut StageRng,
    ) -> GenResult<usize> {
        let cfg = &assumptions.health;
        let horizon_end = ctx.horizon.end;
        let mut scored = Vec::with_capacity(ctx.customers.len());

        for customer in &ctx.customers {
            if !customer.is_active() {
                scored.push((None, None));
                continue;
            }
            let usage = ctx.usage_for(&customer.customer_id);
            if usage.is_empty() {
                scored.push((Some(HealthScore::Yellow), Some(cfg.no_usage_churn_probability)));
                continue;
            }

            let recent = &usage[usage.len().saturating_sub(cfg.lookback_rows)..];
            let composite = HealthInputs {
                usage_score: usage_score(recent, customer.company_size, assumptions),
                nps_score: nps_score(customer.latest_nps_score, cfg),
                tenure_score: tenure_score(customer.start_date, horizon_end, cfg),
            }
            .composite(cfg);
            let category = classify(composite, cfg);
            let probability = cfg
                .churn_probability_by_score
                .get(&category)
                .map(|band| round_3dp(band.sample(rng)));
            scored.push((Some(category), probability));
        }

        let mut touched = 0;
        for (customer, (health, probability)) in ctx.customers.iter_mut().zip(scored) {
            if health.is_some() {
                touched += 1;
            }
            customer.health_score = health;
            customer.churn_probability = probability;
        }
        log::debug!("[health] {touched} active customers scored");
        Ok(touched)
    }
}

/// The three 0-100 components of the composite health score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthInputs {
    pub usage_score:  f64,
    pub nps_score:    f64,
    pub tenure_score: f64,
}

impl HealthInputs {
    pub fn composite(&self, cfg: &HealthAssumptions) -> f64 {
        self.usage_score * cfg.usage_weight
            + self.nps_score * cfg.nps_weight
            + self.tenure_score * cfg.tenure_weight
    }
}

pub fn classify(composite: f64, cfg: &HealthAssumptions) -> HealthScore {
    if composite >= cfg.green_threshold {
        HealthScore::Green
    } else if composite >= cfg.yellow_threshold {
        HealthScore::Yellow
    } else {
        HealthScore::Red
    }
}

/// Mean of the login and API ratios against baseline, where hitting the
/// baseline scores 50 and each ratio caps at 100.
pub fn usage_score(recent: &[UsageEvent], size: CompanySize, assumptions: &AssumptionSet) -> f64 {
    if recent.is_empty() {
        return 0.0;
    }
    let n = recent.len() as f64;
    let avg_logins = recent.iter().map(|u| u.logins as f64).sum::<f64>() / n;
    let avg_api = recent.iter().map(|u| u.api_calls as f64).sum::<f64>() / n;
    let ratio_score = |avg: f64, metric: UsageMetric| {
        let baseline = assumptions.base_usage(size, metric);
        if baseline <= 0.0 {
            0.0
        } else {
            (avg / baseline * 50.0).min(100.0)
        }
    };
    (ratio_score(avg_logins, UsageMetric::Logins) + ratio_score(avg_api, UsageMetric::ApiCalls)) / 2.0
}

pub fn nps_score(latest: Option<u8>, cfg: &HealthAssumptions) -> f64 {
    latest
        .and_then(|score| cfg.nps_points.get(&NpsCategory::of_score(score)).copied())
        .unwrap_or(0.0)
}

pub fn tenure_score(start: SimDate, as_of: SimDate, cfg: &HealthAssumptions) -> f64 {
    let days = days_between(start, as_of).max(0) as f64;
    (days / cfg.tenure_days_per_point).min(100.0)
}
