//! Funnel analytics over a generated dataset.
//!
//! Provides:
//!   1. Pipeline summary by current stage
//!   2. Gate conversion rates (count and dollar) from ledger-based reach
//!   3. Win rate by segment
//!   4. Stage velocity with a slow-deal flag
//!   5. Loss reasons by the stage a deal was lost from
//!   6. Rep performance against the team
//!   7. CAC by channel
//!   8. Monthly lead cohorts
//!
//! Every function is pure over `&Dataset`. A stage counts as reached only
//! when the stage ledger says so.

use crate::{
    calendar::first_of_month,
    context::Dataset,
    metrics::{mean, median, percentile, ratio, round_1dp},
    model::{Opportunity, SegmentField, Stage},
    types::{EntityId, SimDate},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// p75 above this multiple of the median marks a transition as slow.
const SLOW_DEAL_FACTOR: f64 = 1.8;

/// Years of contract value assumed by the channel LTV estimate.
const CHANNEL_LTV_YEARS: f64 = 3.0;

// ── Public types ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageBucket {
    pub stage:       Stage,
    pub count:       usize,
    pub total_value: f64,
    pub avg_value:   f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelSummary {
    pub total_opportunities:     usize,
    pub total_pipeline_value:    f64,
    pub closed_won_count:        usize,
    pub closed_won_value:        f64,
    pub overall_conversion_rate: f64,
    pub dollar_conversion_rate:  f64,
    pub stages:                  Vec<StageBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConversion {
    pub from_stage:             Stage,
    pub to_stage:               Stage,
    pub from_count:             usize,
    pub to_count:               usize,
    pub conversion_rate:        f64,
    pub from_value:             f64,
    pub to_value:               f64,
    pub dollar_conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentFunnel {
    pub segment:             String,
    pub total_opportunities: usize,
    pub won_count:           usize,
    pub lost_count:          usize,
    pub win_rate:            f64,
    pub total_value:         f64,
    pub won_value:           f64,
    pub avg_deal_size:       f64,
    pub avg_won_deal_size:   f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageVelocity {
    pub from_stage:     Stage,
    pub to_stage:       Stage,
    pub median_days:    f64,
    pub p75_days:       f64,
    pub avg_days:       f64,
    pub count:          usize,
    pub has_slow_deals: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossReasonRow {
    pub stage:            Stage,
    pub reason:           String,
    pub count:            usize,
    pub percentage:       f64,
    pub lost_value:       f64,
    pub value_percentage: f64,
    pub avg_deal_size:    f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepPerformance {
    pub rep_id:               EntityId,
    pub name:                 String,
    pub segment:              String,
    pub opportunities_worked: usize,
    pub deals_won:            usize,
    pub deals_lost:           usize,
    pub win_rate:             f64,
    pub total_revenue:        f64,
    pub avg_deal_size:        f64,
    pub avg_cycle_days:       f64,
    pub performance_vs_team:  f64,
    pub revenue_vs_team:      f64,
    pub baseline_score:       f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelCac {
    pub channel:                String,
    pub total_spend:            f64,
    pub customers_acquired:     usize,
    pub cac:                    f64,
    pub total_acv:              f64,
    pub avg_acv:                f64,
    pub ltv_cac_ratio_estimate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadCohort {
    pub cohort:          SimDate,
    pub leads:           usize,
    pub conversions:     usize,
    pub conversion_rate: f64,
    pub revenue:         f64,
    pub avg_deal_size:   f64,
}

// ── Summary ──────────────────────────────────────────────────────────────

pub fn funnel_summary(data: &Dataset) -> FunnelSummary {
    let mut buckets: BTreeMap<Stage, Vec<f64>> = BTreeMap::new();
    for opp in &data.opportunities {
        buckets.entry(opp.current_stage).or_default().push(opp.amount);
    }
    let stages: Vec<StageBucket> = buckets
        .into_iter()
        .map(|(stage, amounts)| StageBucket {
            stage,
            count: amounts.len(),
            total_value: amounts.iter().sum(),
            avg_value: mean(&amounts),
        })
        .collect();

    let total = data.opportunities.len();
    let total_value: f64 = stages.iter().map(|s| s.total_value).sum();
    let (won_count, won_value) = stages
        .iter()
        .find(|s| s.stage == Stage::ClosedWon)
        .map(|s| (s.count, s.total_value))
        .unwrap_or((0, 0.0));

    FunnelSummary {
        total_opportunities: total,
        total_pipeline_value: total_value,
        closed_won_count: won_count,
        closed_won_value: won_value,
        overall_conversion_rate: ratio(won_count as f64, total as f64),
        dollar_conversion_rate: ratio(won_value, total_value),
        stages,
    }
}

// ── Conversion ───────────────────────────────────────────────────────────

/// Furthest non-lost stage each opportunity reached according to the ledger.
pub fn reached_stages(data: &Dataset) -> HashMap<&str, Stage> {
    let mut reached: HashMap<&str, Stage> = data
        .opportunities
        .iter()
        .map(|o| (o.opportunity_id.as_str(), Stage::Lead))
        .collect();
    for t in &data.stage_transitions {
        if t.to_stage == Stage::ClosedLost {
            continue;
        }
        let entry = reached.entry(t.opportunity_id.as_str()).or_insert(Stage::Lead);
        if t.to_stage > *entry {
            *entry = t.to_stage;
        }
    }
    reached
}

/// Step-by-step conversion from Lead through Closed Won.
pub fn stage_conversion_rates(data: &Dataset) -> Vec<GateConversion> {
    let reached = reached_stages(data);
    const ORDER: [Stage; 6] = [
        Stage::Lead,
        Stage::Mql,
        Stage::Sql,
        Stage::Opportunity,
        Stage::Negotiation,
        Stage::ClosedWon,
    ];

    let reach = |stage: Stage| -> (usize, f64) {
        data.opportunities
            .iter()
            .filter(|o| reached.get(o.opportunity_id.as_str()).map_or(false, |r| *r >= stage))
            .fold((0, 0.0), |(n, v), o| (n + 1, v + o.amount))
    };

    ORDER
        .windows(2)
        .map(|pair| {
            let (from_count, from_value) = reach(pair[0]);
            let (to_count, to_value) = reach(pair[1]);
            GateConversion {
                from_stage: pair[0],
                to_stage: pair[1],
                from_count,
                to_count,
                conversion_rate: ratio(to_count as f64, from_count as f64),
                from_value,
                to_value,
                dollar_conversion_rate: ratio(to_value, from_value),
            }
        })
        .collect()
}

pub fn funnel_by_segment(data: &Dataset, field: SegmentField) -> Vec<SegmentFunnel> {
    let mut groups: BTreeMap<&'static str, Vec<&Opportunity>> = BTreeMap::new();
    for opp in &data.opportunities {
        groups.entry(field.of_opportunity(opp)).or_default().push(opp);
    }

    let mut rows: Vec<SegmentFunnel> = groups
        .into_iter()
        .map(|(segment, opps)| {
            let won: Vec<f64> = opps
                .iter()
                .filter(|o| o.is_won == Some(true))
                .map(|o| o.amount)
                .collect();
            let lost_count = opps.iter().filter(|o| o.is_won == Some(false)).count();
            let amounts: Vec<f64> = opps.iter().map(|o| o.amount).collect();
            SegmentFunnel {
                segment: segment.to_string(),
                total_opportunities: opps.len(),
                won_count: won.len(),
                lost_count,
                win_rate: ratio(won.len() as f64, (won.len() + lost_count) as f64),
                total_value: amounts.iter().sum(),
                won_value: won.iter().sum(),
                avg_deal_size: mean(&amounts),
                avg_won_deal_size: mean(&won),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.won_value.total_cmp(&a.won_value));
    rows
}

// ── Velocity ─────────────────────────────────────────────────────────────

/// Days spent before each forward transition. Losses are excluded.
pub fn velocity_metrics(data: &Dataset) -> Vec<StageVelocity> {
    let mut groups: BTreeMap<(Stage, Stage), Vec<f64>> = BTreeMap::new();
    for t in &data.stage_transitions {
        if t.to_stage == Stage::ClosedLost {
            continue;
        }
        groups
            .entry((t.from_stage, t.to_stage))
            .or_default()
            .push(t.days_in_previous_stage as f64);
    }

    groups
        .into_iter()
        .map(|((from_stage, to_stage), days)| {
            let med = median(&days);
            let p75 = percentile(&days, 75.0);
            StageVelocity {
                from_stage,
                to_stage,
                median_days: round_1dp(med),
                p75_days: round_1dp(p75),
                avg_days: round_1dp(mean(&days)),
                count: days.len(),
                has_slow_deals: p75 > med * SLOW_DEAL_FACTOR,
            }
        })
        .collect()
}

// ── Losses ───────────────────────────────────────────────────────────────

pub fn loss_reasons(data: &Dataset) -> Vec<LossReasonRow> {
    let lost_from: HashMap<&str, Stage> = data
        .stage_transitions
        .iter()
        .filter(|t| t.to_stage == Stage::ClosedLost)
        .map(|t| (t.opportunity_id.as_str(), t.from_stage))
        .collect();

    let mut groups: BTreeMap<(Stage, &str), Vec<f64>> = BTreeMap::new();
    for opp in &data.opportunities {
        let (Some(false), Some(reason)) = (opp.is_won, opp.loss_reason.as_deref()) else {
            continue;
        };
        let stage = lost_from
            .get(opp.opportunity_id.as_str())
            .copied()
            .unwrap_or(opp.current_stage);
        groups.entry((stage, reason)).or_default().push(opp.amount);
    }

    let total_lost: usize = groups.values().map(Vec::len).sum();
    let total_value: f64 = groups.values().flatten().sum();

    let mut rows: Vec<LossReasonRow> = groups
        .into_iter()
        .map(|((stage, reason), amounts)| {
            let lost_value: f64 = amounts.iter().sum();
            LossReasonRow {
                stage,
                reason: reason.to_string(),
                count: amounts.len(),
                percentage: ratio(amounts.len() as f64, total_lost as f64),
                lost_value,
                value_percentage: ratio(lost_value, total_value),
                avg_deal_size: mean(&amounts),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.lost_value.total_cmp(&a.lost_value));
    rows
}

// ── Reps ─────────────────────────────────────────────────────────────────

pub fn rep_performance(data: &Dataset) -> Vec<RepPerformance> {
    let mut cycle_days: HashMap<&str, i64> = HashMap::new();
    for t in &data.stage_transitions {
        *cycle_days.entry(t.opportunity_id.as_str()).or_default() += t.days_in_previous_stage;
    }

    let mut by_rep: HashMap<&str, Vec<&Opportunity>> = HashMap::new();
    for opp in &data.opportunities {
        by_rep.entry(opp.assigned_rep_id.as_str()).or_default().push(opp);
    }

    struct Tally<'a> {
        rep:    &'a crate::model::SalesRep,
        worked: usize,
        won:    Vec<f64>,
        lost:   usize,
        cycles: Vec<f64>,
    }

    let tallies: Vec<Tally> = data
        .sales_reps
        .iter()
        .filter_map(|rep| {
            let opps = by_rep.get(rep.rep_id.as_str())?;
            let won: Vec<&&Opportunity> = opps.iter().filter(|o| o.is_won == Some(true)).collect();
            Some(Tally {
                rep,
                worked: opps.len(),
                won: won.iter().map(|o| o.amount).collect(),
                lost: opps.iter().filter(|o| o.is_won == Some(false)).count(),
                cycles: won
                    .iter()
                    .filter_map(|o| cycle_days.get(o.opportunity_id.as_str()))
                    .map(|d| *d as f64)
                    .collect(),
            })
        })
        .collect();

    if tallies.is_empty() {
        return Vec::new();
    }
    let team_won: usize = tallies.iter().map(|t| t.won.len()).sum();
    let team_lost: usize = tallies.iter().map(|t| t.lost).sum();
    let team_win_rate = ratio(team_won as f64, (team_won + team_lost) as f64);
    let team_avg_revenue =
        tallies.iter().map(|t| t.won.iter().sum::<f64>()).sum::<f64>() / tallies.len() as f64;

    let mut rows: Vec<RepPerformance> = tallies
        .into_iter()
        .map(|t| {
            let win_rate = ratio(t.won.len() as f64, (t.won.len() + t.lost) as f64);
            let total_revenue: f64 = t.won.iter().sum();
            RepPerformance {
                rep_id: t.rep.rep_id.clone(),
                name: t.rep.name.clone(),
                segment: t.rep.segment_focus.to_string(),
                opportunities_worked: t.worked,
                deals_won: t.won.len(),
                deals_lost: t.lost,
                win_rate,
                total_revenue,
                avg_deal_size: mean(&t.won),
                avg_cycle_days: mean(&t.cycles),
                performance_vs_team: if team_win_rate > 0.0 { win_rate / team_win_rate } else { 1.0 },
                revenue_vs_team: if team_avg_revenue > 0.0 {
                    total_revenue / team_avg_revenue
                } else {
                    1.0
                },
                baseline_score: t.rep.performance_score,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.total_revenue.total_cmp(&a.total_revenue));
    rows
}

// ── Acquisition cost ─────────────────────────────────────────────────────

pub fn cac_by_channel(data: &Dataset) -> Vec<ChannelCac> {
    let mut spend: BTreeMap<&'static str, f64> = BTreeMap::new();
    for row in &data.marketing_spend {
        *spend.entry(row.channel.as_str()).or_default() += row.amount;
    }
    let mut acquired: BTreeMap<&'static str, (usize, f64)> = BTreeMap::new();
    for customer in &data.customers {
        let entry = acquired.entry(customer.channel.as_str()).or_default();
        entry.0 += 1;
        entry.1 += customer.initial_mrr * 12.0;
    }
    if spend.is_empty() || acquired.is_empty() {
        return Vec::new();
    }

    let mut channels: Vec<&'static str> = spend.keys().chain(acquired.keys()).copied().collect();
    channels.sort_unstable();
    channels.dedup();

    let mut rows: Vec<ChannelCac> = channels
        .into_iter()
        .map(|channel| {
            let total_spend = spend.get(channel).copied().unwrap_or(0.0);
            let (customers, total_acv) = acquired.get(channel).copied().unwrap_or((0, 0.0));
            let cac = ratio(total_spend, customers as f64);
            let avg_acv = ratio(total_acv, customers as f64);
            ChannelCac {
                channel: channel.to_string(),
                total_spend,
                customers_acquired: customers,
                cac,
                total_acv,
                avg_acv,
                ltv_cac_ratio_estimate: ratio(avg_acv * CHANNEL_LTV_YEARS, cac),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.customers_acquired.cmp(&a.customers_acquired));
    rows
}

// ── Cohorts ──────────────────────────────────────────────────────────────

/// Opportunities grouped by creation month.
pub fn cohort_analysis(data: &Dataset) -> Vec<LeadCohort> {
    let mut groups: BTreeMap<SimDate, (usize, Vec<f64>)> = BTreeMap::new();
    for opp in &data.opportunities {
        let entry = groups.entry(first_of_month(opp.created_date)).or_default();
        entry.0 += 1;
        if opp.is_won == Some(true) {
            entry.1.push(opp.amount);
        }
    }
    groups
        .into_iter()
        .map(|(cohort, (leads, won))| LeadCohort {
            cohort,
            leads,
            conversions: won.len(),
            conversion_rate: ratio(won.len() as f64, leads as f64),
            revenue: won.iter().sum(),
            avg_deal_size: mean(&won),
        })
        .collect()
}
