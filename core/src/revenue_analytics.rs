//! Revenue analytics over a generated dataset.
//!
//! Provides:
//!   1. Revenue summary (MRR, ARR, trailing movement totals, NRR, LTV:CAC)
//!   2. Net revenue retention over N months
//!   3. LTV:CAC and payback by segment
//!   4. MRR waterfall for a date range
//!   5. ARR at risk by segment
//!   6. Revenue leakage sources
//!
//! The reference date is the latest MRR movement, falling back to the
//! horizon end for a dataset without movements.

use crate::{
    calendar::months_before,
    context::Dataset,
    metrics::{mean, ratio},
    model::{CompanySize, Customer, ExpansionStatus, MovementType, MrrMovement},
    types::SimDate,
};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Gross margin applied to MRR when estimating lifetime value.
pub const GROSS_MARGIN: f64 = 0.75;

/// Cap on projected customer lifetime, in months.
pub const MAX_LIFETIME_MONTHS: f64 = 60.0;

const TRAILING_MONTHS: u32 = 12;

// ── Public types ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementTotals {
    pub new:         f64,
    pub expansion:   f64,
    /// Absolute value of the signed contraction total.
    pub contraction: f64,
    /// Absolute value of the signed churn total.
    pub churn:       f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueSummary {
    pub current_mrr:          f64,
    pub current_arr:          f64,
    pub active_customers:     usize,
    pub avg_mrr_per_customer: f64,
    pub nrr:                  f64,
    pub trailing_12m:         MovementTotals,
    pub ltv_cac_ratio:        f64,
    pub avg_payback_months:   f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentLtvCac {
    pub segment:             CompanySize,
    pub ltv:                 f64,
    pub cac:                 f64,
    pub ltv_cac_ratio:       f64,
    pub payback_months:      f64,
    pub avg_mrr:             f64,
    pub avg_lifetime_months: f64,
    pub customer_count:      usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LtvCacSummary {
    pub overall_ltv:        f64,
    pub overall_cac:        f64,
    pub overall_ltv_cac:    f64,
    pub avg_payback_months: f64,
    pub by_segment:         Vec<SegmentLtvCac>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallStep {
    pub category:      String,
    pub amount:        f64,
    pub is_total:      bool,
    pub running_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRisk {
    pub segment:                  CompanySize,
    pub arr:                      f64,
    pub arr_at_risk:              f64,
    pub customer_count:           usize,
    pub avg_churn_probability:    f64,
    pub percentage_of_total_risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueAtRisk {
    pub total_arr:         f64,
    pub total_arr_at_risk: f64,
    pub risk_percentage:   f64,
    pub by_segment:        Vec<SegmentRisk>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakageSource {
    pub source:         String,
    pub amount:         f64,
    pub recommendation: String,
}

// ── Reference dates ──────────────────────────────────────────────────────

pub fn reference_date(data: &Dataset) -> SimDate {
    data.mrr_movements
        .iter()
        .map(|m| m.movement_date)
        .max()
        .unwrap_or(data.horizon.end)
}

/// Calendar-month boundaries crossed between two dates.
pub fn months_between(from: SimDate, to: SimDate) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + to.month() as i64 - from.month() as i64
}

/// MRR on a date from the ledger, or `fallback` when no movement precedes it.
fn mrr_as_of(movements: &[&MrrMovement], date: SimDate, inclusive: bool, fallback: f64) -> f64 {
    movements
        .iter()
        .filter(|m| if inclusive { m.movement_date <= date } else { m.movement_date < date })
        .last()
        .map(|m| m.new_mrr)
        .unwrap_or(fallback)
}

/// Signed movement totals with dates in `[from, to]`.
pub fn movement_totals(data: &Dataset, from: SimDate, to: SimDate) -> MovementTotals {
    let mut totals = MovementTotals::default();
    for m in data
        .mrr_movements
        .iter()
        .filter(|m| m.movement_date >= from && m.movement_date <= to)
    {
        match m.movement_type {
            MovementType::New => totals.new += m.amount,
            MovementType::Expansion => totals.expansion += m.amount,
            MovementType::Contraction => totals.contraction += m.amount,
            MovementType::Churn => totals.churn += m.amount,
        }
    }
    totals.contraction = totals.contraction.abs();
    totals.churn = totals.churn.abs();
    totals
}

// ── Summary ──────────────────────────────────────────────────────────────

pub fn revenue_summary(data: &Dataset) -> RevenueSummary {
    let active: Vec<f64> = data
        .customers
        .iter()
        .filter(|c| c.is_active())
        .map(|c| c.current_mrr)
        .collect();
    let current_mrr: f64 = active.iter().sum();
    let latest = reference_date(data);
    let ltv_cac = ltv_cac_summary(data);

    RevenueSummary {
        current_mrr,
        current_arr: current_mrr * 12.0,
        active_customers: active.len(),
        avg_mrr_per_customer: mean(&active),
        nrr: net_revenue_retention(data, TRAILING_MONTHS),
        trailing_12m: movement_totals(data, months_before(latest, TRAILING_MONTHS), latest),
        ltv_cac_ratio: ltv_cac.overall_ltv_cac,
        avg_payback_months: ltv_cac.avg_payback_months,
    }
}

/// Ending over starting MRR for customers who started at least `months`
/// before the reference date. 1.0 when no such cohort exists.
pub fn net_revenue_retention(data: &Dataset, months: u32) -> f64 {
    let cutoff = months_before(reference_date(data), months);
    let ledger = data.movements_by_customer();

    let (starting, ending) = data
        .customers
        .iter()
        .filter(|c| c.start_date <= cutoff)
        .fold((0.0, 0.0), |(start, end), c| {
            let history = ledger.get(c.customer_id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            let opening = mrr_as_of(history, cutoff, true, c.initial_mrr);
            let closing = if c.is_active() { c.current_mrr } else { 0.0 };
            (start + opening, end + closing)
        });

    if starting > 0.0 {
        ending / starting
    } else {
        1.0
    }
}

// ── Unit economics ───────────────────────────────────────────────────────

/// Marketing spend is allocated to segments by their share of customers.
pub fn ltv_cac_by_segment(data: &Dataset) -> Vec<SegmentLtvCac> {
    let total_spend: f64 = data.marketing_spend.iter().map(|s| s.amount).sum();
    let total_customers = data.customers.len();
    let as_of = data.horizon.end;

    CompanySize::ALL
        .iter()
        .filter_map(|&segment| {
            let members: Vec<&Customer> =
                data.customers.iter().filter(|c| c.company_size == segment).collect();
            if members.is_empty() {
                return None;
            }
            let count = members.len();
            let avg_mrr = mean(&members.iter().map(|c| c.initial_mrr).collect::<Vec<_>>());
            let avg_lifetime = mean(
                &members
                    .iter()
                    .map(|c| months_between(c.start_date, c.active_until(as_of)) as f64)
                    .collect::<Vec<_>>(),
            );
            let ltv = avg_mrr * GROSS_MARGIN * avg_lifetime.min(MAX_LIFETIME_MONTHS);
            let share = ratio(count as f64, total_customers as f64);
            let cac = total_spend * share / count as f64;
            Some(SegmentLtvCac {
                segment,
                ltv,
                cac,
                ltv_cac_ratio: ratio(ltv, cac),
                payback_months: ratio(cac, avg_mrr),
                avg_mrr,
                avg_lifetime_months: avg_lifetime,
                customer_count: count,
            })
        })
        .collect()
}

/// Customer-weighted roll-up of the segment economics.
pub fn ltv_cac_summary(data: &Dataset) -> LtvCacSummary {
    let by_segment = ltv_cac_by_segment(data);
    let customers: usize = by_segment.iter().map(|s| s.customer_count).sum();
    let weighted = |f: fn(&SegmentLtvCac) -> f64| -> f64 {
        let total: f64 = by_segment.iter().map(|s| f(s) * s.customer_count as f64).sum();
        ratio(total, customers as f64)
    };
    let overall_ltv = weighted(|s| s.ltv);
    let overall_cac = weighted(|s| s.cac);
    let avg_payback_months = weighted(|s| s.payback_months);

    LtvCacSummary {
        overall_ltv,
        overall_cac,
        overall_ltv_cac: ratio(overall_ltv, overall_cac),
        avg_payback_months,
        by_segment,
    }
}

// ── Waterfall ────────────────────────────────────────────────────────────

/// Starting MRR, each non-zero movement bucket, and ending MRR over
/// `[from, to]`. Defaults to the trailing twelve months.
pub fn mrr_waterfall(data: &Dataset, range: Option<(SimDate, SimDate)>) -> Vec<WaterfallStep> {
    let (from, to) = range.unwrap_or_else(|| {
        let latest = reference_date(data);
        (months_before(latest, TRAILING_MONTHS), latest)
    });
    let ledger = data.movements_by_customer();

    let starting: f64 = data
        .customers
        .iter()
        .filter(|c| c.start_date < from && c.churn_date.map_or(true, |d| d >= from))
        .map(|c| {
            let history = ledger.get(c.customer_id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            mrr_as_of(history, from, false, c.initial_mrr)
        })
        .sum();

    let mut signed: BTreeMap<MovementType, f64> = BTreeMap::new();
    for m in data
        .mrr_movements
        .iter()
        .filter(|m| m.movement_date >= from && m.movement_date <= to)
    {
        *signed.entry(m.movement_type).or_default() += m.amount;
    }

    let mut steps = vec![WaterfallStep {
        category: "Starting MRR".to_string(),
        amount: starting,
        is_total: true,
        running_total: starting,
    }];
    let mut running = starting;
    for (kind, label) in [
        (MovementType::New, "New Business"),
        (MovementType::Expansion, "Expansion"),
        (MovementType::Contraction, "Contraction"),
        (MovementType::Churn, "Churn"),
    ] {
        let amount = signed.get(&kind).copied().unwrap_or(0.0);
        if amount != 0.0 {
            running += amount;
            steps.push(WaterfallStep {
                category: label.to_string(),
                amount,
                is_total: false,
                running_total: running,
            });
        }
    }
    steps.push(WaterfallStep {
        category: "Ending MRR".to_string(),
        amount: running,
        is_total: true,
        running_total: running,
    });
    steps
}

// ── Risk ─────────────────────────────────────────────────────────────────

pub fn revenue_at_risk(data: &Dataset) -> RevenueAtRisk {
    let mut groups: HashMap<CompanySize, Vec<&Customer>> = HashMap::new();
    for customer in data.customers.iter().filter(|c| c.is_active()) {
        groups.entry(customer.company_size).or_default().push(customer);
    }

    let mut by_segment: Vec<SegmentRisk> = CompanySize::ALL
        .iter()
        .filter_map(|segment| {
            let members = groups.get(segment)?;
            let probabilities: Vec<f64> =
                members.iter().map(|c| c.churn_probability.unwrap_or(0.0)).collect();
            Some(SegmentRisk {
                segment: *segment,
                arr: members.iter().map(|c| c.current_mrr * 12.0).sum(),
                arr_at_risk: members
                    .iter()
                    .map(|c| c.current_mrr * 12.0 * c.churn_probability.unwrap_or(0.0))
                    .sum(),
                customer_count: members.len(),
                avg_churn_probability: mean(&probabilities),
                percentage_of_total_risk: 0.0,
            })
        })
        .collect();

    let total_arr: f64 = by_segment.iter().map(|s| s.arr).sum();
    let total_at_risk: f64 = by_segment.iter().map(|s| s.arr_at_risk).sum();
    for segment in &mut by_segment {
        segment.percentage_of_total_risk = ratio(segment.arr_at_risk, total_at_risk);
    }
    by_segment.sort_by(|a, b| b.arr_at_risk.total_cmp(&a.arr_at_risk));

    RevenueAtRisk {
        total_arr,
        total_arr_at_risk: total_at_risk,
        risk_percentage: ratio(total_at_risk, total_arr),
        by_segment,
    }
}

/// Annualized revenue lost over the trailing year, largest source first.
pub fn revenue_leakage(data: &Dataset) -> Vec<LeakageSource> {
    let latest = reference_date(data);
    let since = months_before(latest, TRAILING_MONTHS);
    let totals = movement_totals(data, since, latest);

    let close_latest = data.opportunities.iter().filter_map(|o| o.close_date).max();
    let lost_deals: f64 = close_latest
        .map(|last| {
            let window = months_before(last, TRAILING_MONTHS);
            data.opportunities
                .iter()
                .filter(|o| o.is_won == Some(false) && o.close_date.map_or(false, |d| d >= window))
                .map(|o| o.amount)
                .sum()
        })
        .unwrap_or(0.0);

    let expansion_latest = data.expansion_opportunities.iter().filter_map(|e| e.closed_date).max();
    let missed_expansion: f64 = expansion_latest
        .map(|last| {
            let window = months_before(last, TRAILING_MONTHS);
            data.expansion_opportunities
                .iter()
                .filter(|e| e.status == ExpansionStatus::Lost && e.closed_date.map_or(false, |d| d >= window))
                .map(|e| e.estimated_value)
                .sum()
        })
        .unwrap_or(0.0);

    let mut sources = vec![
        LeakageSource {
            source: "Lost Deals".to_string(),
            amount: lost_deals,
            recommendation: "Analyze loss reasons and improve win rate".to_string(),
        },
        LeakageSource {
            source: "Customer Churn".to_string(),
            amount: totals.churn * 12.0,
            recommendation: "Implement proactive retention program".to_string(),
        },
        LeakageSource {
            source: "Downgrades".to_string(),
            amount: totals.contraction * 12.0,
            recommendation: "Review downgrade reasons and improve value delivery".to_string(),
        },
        LeakageSource {
            source: "Missed Expansion".to_string(),
            amount: missed_expansion,
            recommendation: "Improve expansion playbook and timing".to_string(),
        },
    ];
    sources.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    sources
}
