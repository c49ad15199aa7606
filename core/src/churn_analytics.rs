//! Churn analytics over a generated dataset.
//!
//! Provides:
//!   1. Churn summary and churn by segment
//!   2. At-risk customers with a recommended action
//!   3. Per-customer churn drivers against the segment benchmark
//!   4. Budgeted intervention plan
//!   5. Monthly start cohorts with churn rates
//!   6. Churn feature extraction from the usage rows
//!
//! Features are taken as of each customer's last live day, so churned
//! customers are described by the usage that preceded their churn.

use crate::{
    calendar::{add_days, days_between, first_of_month},
    context::Dataset,
    error::{GenError, GenResult},
    metrics::{mean, ratio, std_dev},
    model::{CompanySize, Customer, HealthScore, Industry, NpsCategory, SegmentField, UsageEvent},
    types::{EntityId, SimDate},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Trailing window for usage averages, in days.
pub const FEATURE_WINDOW_DAYS: i64 = 30;

/// Each half of the usage trend comparison, in days.
pub const TREND_WINDOW_DAYS: i64 = 14;

/// Reported when a customer never logged in.
pub const NO_LOGIN_DAYS: i64 = 999;

const INTERVENTION_COST: f64 = 500.0;
const INTERVENTION_SAVE_RATE: f64 = 0.30;
const STRATEGIC_ACCOUNT_MRR: f64 = 5_000.0;

// ── Public types ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnSummary {
    pub total_customers:       usize,
    pub active_customers:      usize,
    pub churned_customers:     usize,
    pub churn_rate:            f64,
    pub active_mrr:            f64,
    pub churned_mrr:           f64,
    pub avg_churn_probability: f64,
    pub arr_at_risk:           f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentChurn {
    pub segment:               String,
    pub total_customers:       usize,
    pub active_customers:      usize,
    pub churned_customers:     usize,
    pub churn_rate:            f64,
    pub active_mrr:            f64,
    pub churned_mrr:           f64,
    pub arr_at_risk:           f64,
    pub avg_churn_probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtRiskCustomer {
    pub customer_id:        EntityId,
    pub company_name:       String,
    pub company_size:       CompanySize,
    pub industry:           Industry,
    pub current_mrr:        f64,
    pub arr:                f64,
    pub churn_probability:  f64,
    pub arr_at_risk:        f64,
    pub health_score:       Option<HealthScore>,
    pub nps_score:          Option<u8>,
    pub tenure_days:        i64,
    pub recommended_action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Impact {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnDriver {
    pub factor:         String,
    pub impact:         Impact,
    pub value:          String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub priority:           usize,
    pub customer_id:        EntityId,
    pub company_name:       String,
    pub arr:                f64,
    pub churn_probability:  f64,
    pub expected_arr_saved: f64,
    pub intervention_cost:  f64,
    pub roi:                f64,
    pub recommended_action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionPlan {
    pub recommendations:          Vec<Intervention>,
    pub total_cost:               f64,
    pub total_expected_arr_saved: f64,
    pub expected_roi:             f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnCohort {
    pub cohort:            SimDate,
    pub total_customers:   usize,
    pub churned_customers: usize,
    pub churn_rate:        f64,
    pub initial_mrr:       f64,
    pub churned_mrr:       f64,
    pub avg_days_to_churn: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnFeatures {
    pub customer_id:         EntityId,
    pub churned:             bool,
    pub tenure_days:         i64,
    pub company_size:        CompanySize,
    pub industry:            Industry,
    pub current_mrr:         f64,
    pub nps_score:           Option<u8>,
    pub nps_category:        Option<NpsCategory>,
    pub avg_logins_30d:      f64,
    pub avg_api_calls_30d:   f64,
    pub avg_team_active_30d: f64,
    pub login_volatility:    f64,
    /// Relative change of average logins, last 14 days against the 14 before.
    pub usage_trend:         f64,
    pub days_since_login:    i64,
}

// ── Summary ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct ChurnTally {
    total:         usize,
    active:        usize,
    churned:       usize,
    active_mrr:    f64,
    churned_mrr:   f64,
    probabilities: Vec<f64>,
    arr_at_risk:   f64,
}

impl ChurnTally {
    fn add(&mut self, c: &Customer) {
        self.total += 1;
        if c.is_active() {
            self.active += 1;
            self.active_mrr += c.current_mrr;
            if let Some(p) = c.churn_probability {
                self.probabilities.push(p);
            }
            self.arr_at_risk += c.current_mrr * 12.0 * c.churn_probability.unwrap_or(0.0);
        } else {
            self.churned += 1;
            self.churned_mrr += c.initial_mrr;
        }
    }
}

pub fn churn_summary(data: &Dataset) -> ChurnSummary {
    let mut tally = ChurnTally::default();
    data.customers.iter().for_each(|c| tally.add(c));
    ChurnSummary {
        total_customers: tally.total,
        active_customers: tally.active,
        churned_customers: tally.churned,
        churn_rate: ratio(tally.churned as f64, tally.total as f64),
        active_mrr: tally.active_mrr,
        churned_mrr: tally.churned_mrr,
        avg_churn_probability: mean(&tally.probabilities),
        arr_at_risk: tally.arr_at_risk,
    }
}

pub fn churn_by_segment(data: &Dataset, field: SegmentField) -> Vec<SegmentChurn> {
    let mut groups: BTreeMap<&'static str, ChurnTally> = BTreeMap::new();
    for customer in &data.customers {
        groups.entry(field.of_customer(customer)).or_default().add(customer);
    }
    let mut rows: Vec<SegmentChurn> = groups
        .into_iter()
        .map(|(segment, t)| {
            let avg_probability = mean(&t.probabilities);
            SegmentChurn {
                segment: segment.to_string(),
                total_customers: t.total,
                active_customers: t.active,
                churned_customers: t.churned,
                churn_rate: ratio(t.churned as f64, t.total as f64),
                active_mrr: t.active_mrr,
                churned_mrr: t.churned_mrr,
                arr_at_risk: t.active_mrr * 12.0 * avg_probability,
                avg_churn_probability: avg_probability,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.churned_mrr.total_cmp(&a.churned_mrr));
    rows
}

// ── At-risk customers ────────────────────────────────────────────────────

pub fn recommended_action(customer: &Customer) -> &'static str {
    if customer.latest_nps_score.map_or(false, |s| s <= 6) {
        "Executive escalation - detractor feedback"
    } else if customer.health_score == Some(HealthScore::Red) {
        "Urgent CS intervention - health critical"
    } else if customer.current_mrr > STRATEGIC_ACCOUNT_MRR {
        "Strategic account review"
    } else {
        "Standard re-engagement campaign"
    }
}

/// Active customers at or above the risk threshold, ordered by expected
/// MRR loss.
pub fn at_risk_customers(data: &Dataset, risk_threshold: f64, min_mrr: f64) -> Vec<AtRiskCustomer> {
    let as_of = data.horizon.end;
    let mut rows: Vec<AtRiskCustomer> = data
        .customers
        .iter()
        .filter(|c| c.is_active() && c.current_mrr >= min_mrr)
        .filter_map(|c| {
            let probability = c.churn_probability.filter(|p| *p >= risk_threshold)?;
            let arr = c.current_mrr * 12.0;
            Some(AtRiskCustomer {
                customer_id: c.customer_id.clone(),
                company_name: c.company_name.clone(),
                company_size: c.company_size,
                industry: c.industry,
                current_mrr: c.current_mrr,
                arr,
                churn_probability: probability,
                arr_at_risk: arr * probability,
                health_score: c.health_score,
                nps_score: c.latest_nps_score,
                tenure_days: days_between(c.start_date, as_of),
                recommended_action: recommended_action(c).to_string(),
            })
        })
        .collect();
    rows.sort_by(|a, b| b.arr_at_risk.total_cmp(&a.arr_at_risk));
    rows
}

/// Contact the highest-priority at-risk accounts until the budget runs out.
/// Red accounts outrank others with the same expected saving.
pub fn intervention_plan(data: &Dataset, budget: f64) -> InterventionPlan {
    let mut candidates: Vec<(f64, AtRiskCustomer)> = at_risk_customers(data, 0.3, 500.0)
        .into_iter()
        .map(|c| {
            let weight = if c.health_score == Some(HealthScore::Red) { 1.0 } else { 0.7 };
            (c.arr_at_risk * INTERVENTION_SAVE_RATE * weight, c)
        })
        .collect();
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    let affordable = (budget / INTERVENTION_COST).floor().max(0.0) as usize;
    let recommendations: Vec<Intervention> = candidates
        .into_iter()
        .take(affordable)
        .enumerate()
        .map(|(i, (_, c))| {
            let saved = c.arr_at_risk * INTERVENTION_SAVE_RATE;
            Intervention {
                priority: i + 1,
                customer_id: c.customer_id,
                company_name: c.company_name,
                arr: c.arr,
                churn_probability: c.churn_probability,
                expected_arr_saved: saved,
                intervention_cost: INTERVENTION_COST,
                roi: (saved - INTERVENTION_COST) / INTERVENTION_COST,
                recommended_action: c.recommended_action,
            }
        })
        .collect();

    let total_cost = recommendations.len() as f64 * INTERVENTION_COST;
    let total_saved: f64 = recommendations.iter().map(|r| r.expected_arr_saved).sum();
    InterventionPlan {
        recommendations,
        total_cost,
        total_expected_arr_saved: total_saved,
        expected_roi: ratio(total_saved - total_cost, total_cost),
    }
}

// ── Drivers ──────────────────────────────────────────────────────────────

fn window<'a>(events: &'a [&'a UsageEvent], from: SimDate, to: SimDate) -> Vec<&'a UsageEvent> {
    events
        .iter()
        .copied()
        .filter(|e| e.event_date >= from && e.event_date <= to)
        .collect()
}

/// Reasons a specific customer may churn, judged against active peers of
/// the same segment over the trailing feature window.
pub fn churn_drivers(data: &Dataset, customer_id: &str) -> GenResult<Vec<ChurnDriver>> {
    let customer = data.customer(customer_id).ok_or_else(|| GenError::MissingEntity {
        kind: "customer",
        id: customer_id.to_string(),
    })?;
    let as_of = data.horizon.end;
    let since = add_days(as_of, -FEATURE_WINDOW_DAYS);
    let usage = data.usage_by_customer();
    let empty = Vec::new();

    let own = window(usage.get(customer_id).unwrap_or(&empty), since, as_of);
    let peers: Vec<&UsageEvent> = data
        .customers
        .iter()
        .filter(|c| c.is_active() && c.company_size == customer.company_size)
        .flat_map(|c| window(usage.get(c.customer_id.as_str()).unwrap_or(&empty), since, as_of))
        .collect();

    let avg = |rows: &[&UsageEvent], f: fn(&UsageEvent) -> u32| -> f64 {
        mean(&rows.iter().map(|e| f(e) as f64).collect::<Vec<_>>())
    };

    let mut drivers = Vec::new();
    if !own.is_empty() && !peers.is_empty() {
        let login_ratio = ratio(avg(&own, |e| e.logins), avg(&peers, |e| e.logins));
        if avg(&peers, |e| e.logins) > 0.0 && login_ratio < 0.5 {
            drivers.push(ChurnDriver {
                factor: "Low Login Activity".to_string(),
                impact: Impact::High,
                value: format!("{:.0}% of segment average", login_ratio * 100.0),
                recommendation: "Schedule product training session".to_string(),
            });
        }
        let api_ratio = ratio(avg(&own, |e| e.api_calls), avg(&peers, |e| e.api_calls));
        if avg(&peers, |e| e.api_calls) > 0.0 && api_ratio < 0.3 {
            drivers.push(ChurnDriver {
                factor: "Low API Usage".to_string(),
                impact: Impact::High,
                value: format!("{:.0}% of segment average", api_ratio * 100.0),
                recommendation: "Review integration status".to_string(),
            });
        }
    }

    match customer.latest_nps_score.map(NpsCategory::of_score) {
        Some(NpsCategory::Detractor) => drivers.push(ChurnDriver {
            factor: "Detractor NPS Score".to_string(),
            impact: Impact::High,
            value: format!("Score: {}", customer.latest_nps_score.unwrap_or_default()),
            recommendation: "Conduct customer success call".to_string(),
        }),
        Some(NpsCategory::Passive) => drivers.push(ChurnDriver {
            factor: "Passive NPS Score".to_string(),
            impact: Impact::Medium,
            value: format!("Score: {}", customer.latest_nps_score.unwrap_or_default()),
            recommendation: "Identify improvement opportunities".to_string(),
        }),
        _ => {}
    }

    let tenure = days_between(customer.start_date, as_of);
    if tenure < 90 {
        drivers.push(ChurnDriver {
            factor: "New Customer (< 90 days)".to_string(),
            impact: Impact::Medium,
            value: format!("{tenure} days"),
            recommendation: "Ensure smooth onboarding completion".to_string(),
        });
    }
    Ok(drivers)
}

// ── Cohorts ──────────────────────────────────────────────────────────────

pub fn churn_cohorts(data: &Dataset) -> Vec<ChurnCohort> {
    let mut groups: BTreeMap<SimDate, Vec<&Customer>> = BTreeMap::new();
    for customer in &data.customers {
        groups.entry(first_of_month(customer.start_date)).or_default().push(customer);
    }
    groups
        .into_iter()
        .map(|(cohort, members)| {
            let churned: Vec<&&Customer> = members.iter().filter(|c| !c.is_active()).collect();
            let days_to_churn: Vec<f64> = churned
                .iter()
                .filter_map(|c| c.churn_date.map(|d| days_between(c.start_date, d) as f64))
                .collect();
            ChurnCohort {
                cohort,
                total_customers: members.len(),
                churned_customers: churned.len(),
                churn_rate: ratio(churned.len() as f64, members.len() as f64),
                initial_mrr: members.iter().map(|c| c.initial_mrr).sum(),
                churned_mrr: churned.iter().map(|c| c.initial_mrr).sum(),
                avg_days_to_churn: (!days_to_churn.is_empty()).then(|| mean(&days_to_churn)),
            }
        })
        .collect()
}

// ── Features ─────────────────────────────────────────────────────────────

/// Model-ready features for one customer from its usage rows.
pub fn churn_features(customer: &Customer, usage: &[&UsageEvent], horizon_end: SimDate) -> ChurnFeatures {
    let as_of = customer.active_until(horizon_end);
    let recent = window(usage, add_days(as_of, -FEATURE_WINDOW_DAYS), as_of);
    let logins: Vec<f64> = recent.iter().map(|e| e.logins as f64).collect();
    let api_calls: Vec<f64> = recent.iter().map(|e| e.api_calls as f64).collect();
    let team: Vec<f64> = recent.iter().map(|e| e.team_members_active as f64).collect();

    let trend_split = add_days(as_of, -TREND_WINDOW_DAYS);
    let trend_start = add_days(as_of, -2 * TREND_WINDOW_DAYS);
    let last_half: Vec<f64> = usage
        .iter()
        .filter(|e| e.event_date >= trend_split && e.event_date <= as_of)
        .map(|e| e.logins as f64)
        .collect();
    let first_half: Vec<f64> = usage
        .iter()
        .filter(|e| e.event_date >= trend_start && e.event_date < trend_split)
        .map(|e| e.logins as f64)
        .collect();
    let prior = mean(&first_half);
    let prior = if prior > 0.0 { prior } else { 1.0 };

    let days_since_login = usage
        .iter()
        .filter(|e| e.logins > 0 && e.event_date <= as_of)
        .map(|e| e.event_date)
        .max()
        .map_or(NO_LOGIN_DAYS, |last| days_between(last, as_of));

    ChurnFeatures {
        customer_id: customer.customer_id.clone(),
        churned: !customer.is_active(),
        tenure_days: days_between(customer.start_date, as_of),
        company_size: customer.company_size,
        industry: customer.industry,
        current_mrr: customer.current_mrr,
        nps_score: customer.latest_nps_score,
        nps_category: customer.latest_nps_score.map(NpsCategory::of_score),
        avg_logins_30d: mean(&logins),
        avg_api_calls_30d: mean(&api_calls),
        avg_team_active_30d: mean(&team),
        login_volatility: std_dev(&logins),
        usage_trend: (mean(&last_half) - prior) / prior,
        days_since_login,
    }
}

/// Features for every customer, in customer order.
pub fn feature_table(data: &Dataset) -> Vec<ChurnFeatures> {
    let usage: HashMap<&str, Vec<&UsageEvent>> = data.usage_by_customer();
    data.customers
        .iter()
        .map(|c| {
            let rows = usage.get(c.customer_id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            churn_features(c, rows, data.horizon.end)
        })
        .collect()
}
