//! The assumption set: every stochastic parameter of a generation run.
//!
//! An `AssumptionSet` is built once (from the built-in defaults or a JSON
//! file), validated, and then only ever read. Distributions are checked at
//! construction and never renormalized; a set that would need fixing up is
//! rejected with a `ConfigError` instead.

use crate::calendar::Horizon;
use crate::error::{ConfigError, GenResult};
use crate::model::{
    Channel, CompanySize, HealthBucket, HealthScore, Industry, NpsCategory, Stage, StageGate,
    UsageMetric,
};
use crate::rng::StageRng;
use chrono::NaiveDate;
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

pub const ASSUMPTIONS_VERSION: &str = "2024.1";

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Longest span any day-valued parameter may take. Keeps every derived
/// date far inside chrono's representable range.
pub const MAX_SPAN_DAYS: i64 = 3_650;

/// Ceiling for segment, channel and velocity multipliers.
pub const MAX_MULTIPLIER: f64 = 10.0;

// ── Value types ──────────────────────────────────────────────────────────

/// A discrete distribution over `K`. Weights are non-negative and sum
/// to 1.0; entries are kept in key order so sampling is reproducible
/// regardless of how the set was built.
#[derive(Debug, Clone, PartialEq)]
pub struct Categorical<K> {
    entries: Vec<(K, f64)>,
}

impl<K: Ord + fmt::Debug> Categorical<K> {
    pub fn new(
        name: &str,
        weights: impl IntoIterator<Item = (K, f64)>,
    ) -> Result<Self, ConfigError> {
        let ordered: BTreeMap<K, f64> = weights.into_iter().collect();
        if ordered.is_empty() {
            return Err(ConfigError::EmptyDistribution { name: name.to_string() });
        }
        for (key, &weight) in &ordered {
            if weight < 0.0 || !weight.is_finite() {
                return Err(ConfigError::NegativeWeight {
                    name: name.to_string(),
                    key: format!("{key:?}"),
                    weight,
                });
            }
        }
        let sum: f64 = ordered.values().sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::NotNormalized { name: name.to_string(), sum });
        }
        Ok(Self { entries: ordered.into_iter().collect() })
    }

    /// Draw one key. Accumulated rounding can leave the cumulative sum a
    /// hair under 1.0; a roll in that gap lands on the last entry.
    pub fn sample(&self, rng: &mut StageRng) -> &K {
        let roll = rng.next_f64();
        let mut cumulative = 0.0;
        for (key, weight) in &self.entries {
            cumulative += weight;
            if roll < cumulative {
                return key;
            }
        }
        &self.entries[self.entries.len() - 1].0
    }

    pub fn weight(&self, key: &K) -> f64 {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }
}

impl<K: Serialize> Serialize for Categorical<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, weight) in &self.entries {
            map.serialize_entry(key, weight)?;
        }
        map.end()
    }
}

impl<'de, K> Deserialize<'de> for Categorical<K>
where
    K: Deserialize<'de> + Ord + fmt::Debug,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<K, f64>::deserialize(deserializer)?;
        Categorical::new("categorical", raw).map_err(serde::de::Error::custom)
    }
}

/// Min / most-likely / max triple for triangular draws.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangular {
    pub min:    f64,
    pub median: f64,
    pub max:    f64,
}

impl Triangular {
    pub fn new(min: f64, median: f64, max: f64) -> Self {
        Self { min, median, max }
    }

    pub fn sample(&self, rng: &mut StageRng) -> f64 {
        rng.triangular(self.min, self.median, self.max)
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.min * factor, self.median * factor, self.max * factor)
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let finite = self.min.is_finite() && self.median.is_finite() && self.max.is_finite();
        if !finite || !(self.min <= self.median && self.median <= self.max) {
            return Err(ConfigError::InvalidRange {
                name: name.to_string(),
                min: self.min,
                median: self.median,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Continuous uniform range `[low, high)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniformRange {
    pub low:  f64,
    pub high: f64,
}

impl UniformRange {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn sample(&self, rng: &mut StageRng) -> f64 {
        rng.uniform(self.low, self.high)
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if !self.low.is_finite() || !self.high.is_finite() || self.high < self.low {
            return Err(ConfigError::InvalidRange {
                name: name.to_string(),
                min: self.low,
                median: self.low,
                max: self.high,
            });
        }
        Ok(())
    }
}

/// Inclusive integer day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRange {
    pub min: i64,
    pub max: i64,
}

impl DayRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn sample(&self, rng: &mut StageRng) -> i64 {
        rng.int_inclusive(self.min, self.max)
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.max < self.min || self.min < 0 {
            return Err(ConfigError::InvalidRange {
                name: name.to_string(),
                min: self.min as f64,
                median: self.min as f64,
                max: self.max as f64,
            });
        }
        day_span(&format!("{name}.max"), self.max)
    }
}

// ── Sections ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadGenAssumptions {
    pub base_leads_per_month: u32,
    /// Multiplier per calendar month, January first.
    pub seasonality: [f64; 12],
    /// Monthly volume jitter: U(1 - v, 1 + v).
    pub monthly_variation: f64,
    /// Daily volume jitter: U(1 - v, 1 + v).
    pub daily_variation: f64,
    pub channel_distribution: Categorical<Channel>,
    pub company_size_distribution: Categorical<CompanySize>,
    pub industry_distribution: Categorical<Industry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionAssumptions {
    pub base_stage_conversion: BTreeMap<StageGate, f64>,
    pub segment_multipliers: BTreeMap<CompanySize, BTreeMap<StageGate, f64>>,
    pub channel_quality: BTreeMap<Channel, f64>,
    /// Upper clip applied to every gate probability.
    pub max_conversion_probability: f64,
    /// Reason distributions keyed by the stage a deal was lost from.
    pub loss_reasons: BTreeMap<Stage, Categorical<String>>,
    pub loss_delay_days: DayRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityAssumptions {
    pub median_stage_days: BTreeMap<StageGate, f64>,
    /// Higher is slower.
    pub segment_velocity_multipliers: BTreeMap<CompanySize, f64>,
    pub cv: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealValueAssumptions {
    pub acv_by_segment: BTreeMap<CompanySize, Triangular>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRepAssumptions {
    pub num_reps: usize,
    pub performance_std_dev: f64,
    pub min_performance: f64,
    pub max_performance: f64,
    /// Territory of rep i; reps beyond the list get a random segment.
    pub rep_segment_focus: Vec<CompanySize>,
    /// Hire date offset before the horizon start.
    pub hired_days_before_start: DayRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionAssumptions {
    pub base_monthly_churn: f64,
    pub segment_churn_multipliers: BTreeMap<CompanySize, f64>,
    /// Offset of the churn date after the tick on which churn fired.
    pub churn_day_offset: DayRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageAssumptions {
    pub base_usage_by_segment: BTreeMap<CompanySize, BTreeMap<UsageMetric, f64>>,
    pub noise_by_metric: BTreeMap<UsageMetric, UniformRange>,
    pub weekend_factor: f64,
    /// Days before churn when the decline ramp begins.
    pub decline_start_days: i64,
    /// Usage on the churn date as a fraction of baseline.
    pub decline_final_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionAssumptions {
    pub monthly_expansion_probability: f64,
    /// Fraction of current MRR added by one expansion.
    pub expansion_percentage_range: Triangular,
    pub expansion_conversion_rate: f64,
    pub monthly_contraction_probability: f64,
    pub contraction_percentage_range: Triangular,
    /// Tenure before a customer is considered for expansion.
    pub first_check_after_days: i64,
    /// Days from identification to close for resolved expansions.
    pub close_window_days: DayRange,
    /// Won value jitter around the estimate: U(1 - v, 1 + v).
    pub won_value_variation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketingAssumptions {
    pub monthly_spend_by_channel: BTreeMap<Channel, f64>,
    pub spend_cv: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpsAssumptions {
    pub survey_frequency_days: i64,
    pub response_rate: f64,
    pub score_distribution_by_health: BTreeMap<HealthBucket, Categorical<NpsCategory>>,
    /// A survey closer than this to churn is "churning".
    pub churning_within_days: i64,
    /// A survey closer than this to churn is "at risk".
    pub at_risk_within_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAssumptions {
    pub lookback_rows: usize,
    pub usage_weight: f64,
    pub nps_weight: f64,
    pub tenure_weight: f64,
    pub nps_points: BTreeMap<NpsCategory, f64>,
    /// Tenure score gains one point per this many days, capped at 100.
    pub tenure_days_per_point: f64,
    pub green_threshold: f64,
    pub yellow_threshold: f64,
    pub churn_probability_by_score: BTreeMap<HealthScore, UniformRange>,
    /// Assigned when a customer has no usage rows at all.
    pub no_usage_churn_probability: f64,
}

/// Complete configuration for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumptionSet {
    pub version: String,
    pub horizon: Horizon,
    pub lead_gen: LeadGenAssumptions,
    pub conversion: ConversionAssumptions,
    pub velocity: VelocityAssumptions,
    pub deal_value: DealValueAssumptions,
    pub sales_rep: SalesRepAssumptions,
    pub retention: RetentionAssumptions,
    pub usage: UsageAssumptions,
    pub expansion: ExpansionAssumptions,
    pub marketing: MarketingAssumptions,
    pub nps: NpsAssumptions,
    pub health: HealthAssumptions,
}

impl AssumptionSet {
    /// Read and validate an assumption set from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> GenResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> GenResult<Self> {
        let set: AssumptionSet = serde_json::from_str(json)?;
        set.validate()?;
        Ok(set)
    }

    pub fn to_json_pretty(&self) -> GenResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Every keyed table must cover its full key space, and every
    /// probability must be a probability.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.horizon.validate()?;

        let lg = &self.lead_gen;
        for (i, &factor) in lg.seasonality.iter().enumerate() {
            non_negative(&format!("lead_gen.seasonality[{i}]"), factor)?;
        }
        unit_interval("lead_gen.monthly_variation", lg.monthly_variation)?;
        unit_interval("lead_gen.daily_variation", lg.daily_variation)?;

        let conv = &self.conversion;
        require_keys("conversion.base_stage_conversion", &conv.base_stage_conversion, StageGate::ALL)?;
        for (gate, &p) in &conv.base_stage_conversion {
            unit_interval(&format!("conversion.base_stage_conversion.{gate}"), p)?;
        }
        require_keys("conversion.segment_multipliers", &conv.segment_multipliers, CompanySize::ALL)?;
        for (size, table) in &conv.segment_multipliers {
            require_keys(&format!("conversion.segment_multipliers.{size}"), table, StageGate::ALL)?;
            for (gate, &m) in table {
                multiplier(&format!("conversion.segment_multipliers.{size}.{gate}"), m)?;
            }
        }
        require_keys("conversion.channel_quality", &conv.channel_quality, Channel::ALL)?;
        for (channel, &q) in &conv.channel_quality {
            multiplier(&format!("conversion.channel_quality.{channel}"), q)?;
        }
        unit_interval("conversion.max_conversion_probability", conv.max_conversion_probability)?;
        let lossable = [Stage::Mql, Stage::Sql, Stage::Opportunity, Stage::Negotiation];
        require_keys("conversion.loss_reasons", &conv.loss_reasons, &lossable)?;
        conv.loss_delay_days.validate("conversion.loss_delay_days")?;

        let vel = &self.velocity;
        require_keys("velocity.median_stage_days", &vel.median_stage_days, StageGate::ALL)?;
        for (gate, &days) in &vel.median_stage_days {
            bounded(&format!("velocity.median_stage_days.{gate}"), days, 0.0, MAX_SPAN_DAYS as f64)?;
        }
        require_keys(
            "velocity.segment_velocity_multipliers",
            &vel.segment_velocity_multipliers,
            CompanySize::ALL,
        )?;
        for (size, &m) in &vel.segment_velocity_multipliers {
            multiplier(&format!("velocity.segment_velocity_multipliers.{size}"), m)?;
        }
        bounded("velocity.cv", vel.cv, 0.0, MAX_MULTIPLIER)?;

        require_keys("deal_value.acv_by_segment", &self.deal_value.acv_by_segment, CompanySize::ALL)?;
        for (size, acv) in &self.deal_value.acv_by_segment {
            let name = format!("deal_value.acv_by_segment.{size}");
            acv.validate(&name)?;
            if acv.min <= 0.0 {
                return Err(ConfigError::OutOfBounds {
                    name: format!("{name}.min"),
                    value: acv.min,
                    lo: f64::MIN_POSITIVE,
                    hi: f64::INFINITY,
                });
            }
        }

        let reps = &self.sales_rep;
        if reps.num_reps == 0 {
            return Err(ConfigError::OutOfBounds {
                name: "sales_rep.num_reps".into(),
                value: 0.0,
                lo: 1.0,
                hi: f64::INFINITY,
            });
        }
        non_negative("sales_rep.performance_std_dev", reps.performance_std_dev)?;
        non_negative("sales_rep.min_performance", reps.min_performance)?;
        bounded("sales_rep.max_performance", reps.max_performance, 0.0, MAX_MULTIPLIER)?;
        if reps.max_performance < reps.min_performance {
            return Err(ConfigError::InvalidRange {
                name: "sales_rep.performance".into(),
                min: reps.min_performance,
                median: 1.0,
                max: reps.max_performance,
            });
        }
        reps.hired_days_before_start.validate("sales_rep.hired_days_before_start")?;

        let ret = &self.retention;
        unit_interval("retention.base_monthly_churn", ret.base_monthly_churn)?;
        require_keys(
            "retention.segment_churn_multipliers",
            &ret.segment_churn_multipliers,
            CompanySize::ALL,
        )?;
        for (size, &m) in &ret.segment_churn_multipliers {
            multiplier(&format!("retention.segment_churn_multipliers.{size}"), m)?;
        }
        ret.churn_day_offset.validate("retention.churn_day_offset")?;

        let usage = &self.usage;
        require_keys("usage.base_usage_by_segment", &usage.base_usage_by_segment, CompanySize::ALL)?;
        for (size, table) in &usage.base_usage_by_segment {
            require_keys(&format!("usage.base_usage_by_segment.{size}"), table, UsageMetric::ALL)?;
            for (metric, &base) in table {
                non_negative(&format!("usage.base_usage_by_segment.{size}.{metric}"), base)?;
            }
        }
        require_keys("usage.noise_by_metric", &usage.noise_by_metric, UsageMetric::ALL)?;
        for (metric, range) in &usage.noise_by_metric {
            let name = format!("usage.noise_by_metric.{metric}");
            range.validate(&name)?;
            non_negative(&format!("{name}.low"), range.low)?;
        }
        unit_interval("usage.weekend_factor", usage.weekend_factor)?;
        unit_interval("usage.decline_final_percentage", usage.decline_final_percentage)?;
        if !(1..=MAX_SPAN_DAYS).contains(&usage.decline_start_days) {
            return Err(ConfigError::OutOfBounds {
                name: "usage.decline_start_days".into(),
                value: usage.decline_start_days as f64,
                lo: 1.0,
                hi: MAX_SPAN_DAYS as f64,
            });
        }

        let exp = &self.expansion;
        unit_interval("expansion.monthly_expansion_probability", exp.monthly_expansion_probability)?;
        unit_interval("expansion.expansion_conversion_rate", exp.expansion_conversion_rate)?;
        unit_interval(
            "expansion.monthly_contraction_probability",
            exp.monthly_contraction_probability,
        )?;
        exp.expansion_percentage_range.validate("expansion.expansion_percentage_range")?;
        non_negative("expansion.expansion_percentage_range.min", exp.expansion_percentage_range.min)?;
        exp.contraction_percentage_range.validate("expansion.contraction_percentage_range")?;
        non_negative(
            "expansion.contraction_percentage_range.min",
            exp.contraction_percentage_range.min,
        )?;
        if exp.contraction_percentage_range.max > 1.0 {
            return Err(ConfigError::OutOfBounds {
                name: "expansion.contraction_percentage_range.max".into(),
                value: exp.contraction_percentage_range.max,
                lo: 0.0,
                hi: 1.0,
            });
        }
        day_span("expansion.first_check_after_days", exp.first_check_after_days)?;
        exp.close_window_days.validate("expansion.close_window_days")?;
        unit_interval("expansion.won_value_variation", exp.won_value_variation)?;

        let mkt = &self.marketing;
        require_keys("marketing.monthly_spend_by_channel", &mkt.monthly_spend_by_channel, Channel::ALL)?;
        for (channel, &spend) in &mkt.monthly_spend_by_channel {
            non_negative(&format!("marketing.monthly_spend_by_channel.{channel}"), spend)?;
        }
        unit_interval("marketing.spend_cv", mkt.spend_cv)?;

        let nps = &self.nps;
        unit_interval("nps.response_rate", nps.response_rate)?;
        require_keys(
            "nps.score_distribution_by_health",
            &nps.score_distribution_by_health,
            HealthBucket::ALL,
        )?;
        if !(1..=MAX_SPAN_DAYS).contains(&nps.survey_frequency_days) {
            return Err(ConfigError::OutOfBounds {
                name: "nps.survey_frequency_days".into(),
                value: nps.survey_frequency_days as f64,
                lo: 1.0,
                hi: MAX_SPAN_DAYS as f64,
            });
        }
        day_span("nps.at_risk_within_days", nps.at_risk_within_days)?;
        bounded(
            "nps.churning_within_days",
            nps.churning_within_days as f64,
            0.0,
            nps.at_risk_within_days as f64,
        )?;

        let health = &self.health;
        if health.lookback_rows == 0 {
            return Err(ConfigError::OutOfBounds {
                name: "health.lookback_rows".into(),
                value: 0.0,
                lo: 1.0,
                hi: f64::INFINITY,
            });
        }
        non_negative("health.usage_weight", health.usage_weight)?;
        non_negative("health.nps_weight", health.nps_weight)?;
        non_negative("health.tenure_weight", health.tenure_weight)?;
        require_keys("health.nps_points", &health.nps_points, NpsCategory::ALL)?;
        for (category, &points) in &health.nps_points {
            bounded(&format!("health.nps_points.{category}"), points, 0.0, 100.0)?;
        }
        if !(health.tenure_days_per_point > 0.0 && health.tenure_days_per_point.is_finite()) {
            return Err(ConfigError::OutOfBounds {
                name: "health.tenure_days_per_point".into(),
                value: health.tenure_days_per_point,
                lo: f64::MIN_POSITIVE,
                hi: f64::INFINITY,
            });
        }
        bounded("health.green_threshold", health.green_threshold, 0.0, 100.0)?;
        bounded("health.yellow_threshold", health.yellow_threshold, 0.0, health.green_threshold)?;
        require_keys(
            "health.churn_probability_by_score",
            &health.churn_probability_by_score,
            HealthScore::ALL,
        )?;
        for (score, range) in &health.churn_probability_by_score {
            let name = format!("health.churn_probability_by_score.{score}");
            range.validate(&name)?;
            unit_interval(&format!("{name}.low"), range.low)?;
            unit_interval(&format!("{name}.high"), range.high)?;
        }
        unit_interval("health.no_usage_churn_probability", health.no_usage_churn_probability)?;

        Ok(())
    }

    /// The built-in default assumption set: a 24-month horizon of a
    /// mid-sized B2B SaaS business.
    pub fn standard() -> Result<Self, ConfigError> {
        use Channel::*;
        use CompanySize::*;
        use StageGate::*;
        use UsageMetric::*;

        let gates = |values: [f64; 5]| -> BTreeMap<StageGate, f64> {
            StageGate::ALL.iter().copied().zip(values).collect()
        };
        let usage = |values: [f64; 5]| -> BTreeMap<UsageMetric, f64> {
            UsageMetric::ALL.iter().copied().zip(values).collect()
        };
        let reasons = |name: &str, pairs: &[(&str, f64)]| {
            Categorical::new(name, pairs.iter().map(|(r, w)| (r.to_string(), *w)))
        };

        let set = AssumptionSet {
            version: ASSUMPTIONS_VERSION.to_string(),
            horizon: Horizon::new(date(2023, 1, 1)?, date(2024, 12, 31)?)?,
            lead_gen: LeadGenAssumptions {
                base_leads_per_month: 750,
                seasonality: [0.85, 0.95, 1.10, 1.05, 1.00, 0.95, 0.80, 0.80, 1.15, 1.15, 1.10, 0.85],
                monthly_variation: 0.10,
                daily_variation: 0.30,
                channel_distribution: Categorical::new(
                    "lead_gen.channel_distribution",
                    [
                        (OrganicSearch, 0.25),
                        (PaidSearch, 0.20),
                        (ContentMarketing, 0.15),
                        (Referral, 0.12),
                        (Events, 0.10),
                        (Outbound, 0.10),
                        (Partner, 0.08),
                    ],
                )?,
                company_size_distribution: Categorical::new(
                    "lead_gen.company_size_distribution",
                    [(Smb, 0.50), (MidMarket, 0.35), (Enterprise, 0.15)],
                )?,
                industry_distribution: Categorical::new(
                    "lead_gen.industry_distribution",
                    [
                        (Industry::Technology, 0.30),
                        (Industry::FinancialServices, 0.18),
                        (Industry::Healthcare, 0.15),
                        (Industry::Retail, 0.12),
                        (Industry::Manufacturing, 0.10),
                        (Industry::ProfessionalServices, 0.10),
                        (Industry::Other, 0.05),
                    ],
                )?,
            },
            conversion: ConversionAssumptions {
                base_stage_conversion: gates([0.40, 0.50, 0.60, 0.50, 0.65]),
                segment_multipliers: BTreeMap::from([
                    (Smb, gates([1.15, 1.10, 1.05, 0.90, 0.85])),
                    (MidMarket, gates([1.00, 1.00, 1.00, 1.00, 1.00])),
                    (Enterprise, gates([0.80, 0.85, 0.90, 1.15, 1.20])),
                ]),
                channel_quality: BTreeMap::from([
                    (OrganicSearch, 1.10),
                    (PaidSearch, 0.95),
                    (ContentMarketing, 1.05),
                    (Referral, 1.25),
                    (Events, 1.00),
                    (Outbound, 0.80),
                    (Partner, 1.15),
                ]),
                max_conversion_probability: 0.95,
                loss_reasons: BTreeMap::from([
                    (
                        Stage::Mql,
                        reasons(
                            "conversion.loss_reasons.MQL",
                            &[
                                ("No Response", 0.35),
                                ("Not Qualified", 0.30),
                                ("Bad Timing", 0.20),
                                ("Competitor", 0.10),
                                ("Other", 0.05),
                            ],
                        )?,
                    ),
                    (
                        Stage::Sql,
                        reasons(
                            "conversion.loss_reasons.SQL",
                            &[
                                ("Budget", 0.30),
                                ("No Authority", 0.25),
                                ("Bad Timing", 0.20),
                                ("Competitor", 0.15),
                                ("Other", 0.10),
                            ],
                        )?,
                    ),
                    (
                        Stage::Opportunity,
                        reasons(
                            "conversion.loss_reasons.Opportunity",
                            &[
                                ("Budget", 0.35),
                                ("Competitor", 0.25),
                                ("No Decision", 0.20),
                                ("Requirements Not Met", 0.15),
                                ("Other", 0.05),
                            ],
                        )?,
                    ),
                    (
                        Stage::Negotiation,
                        reasons(
                            "conversion.loss_reasons.Negotiation",
                            &[
                                ("Price", 0.35),
                                ("Competitor", 0.30),
                                ("Contract Terms", 0.15),
                                ("Internal Politics", 0.12),
                                ("Other", 0.08),
                            ],
                        )?,
                    ),
                ]),
                loss_delay_days: DayRange::new(1, 14),
            },
            velocity: VelocityAssumptions {
                median_stage_days: BTreeMap::from([
                    (LeadToMql, 7.0),
                    (MqlToSql, 14.0),
                    (SqlToOpportunity, 21.0),
                    (OpportunityToNegotiation, 30.0),
                    (NegotiationToClosed, 21.0),
                ]),
                segment_velocity_multipliers: BTreeMap::from([
                    (Smb, 0.70),
                    (MidMarket, 1.00),
                    (Enterprise, 1.80),
                ]),
                cv: 0.50,
            },
            deal_value: DealValueAssumptions {
                acv_by_segment: BTreeMap::from([
                    (Smb, Triangular::new(6_000.0, 12_000.0, 24_000.0)),
                    (MidMarket, Triangular::new(24_000.0, 48_000.0, 120_000.0)),
                    (Enterprise, Triangular::new(100_000.0, 180_000.0, 500_000.0)),
                ]),
            },
            sales_rep: SalesRepAssumptions {
                num_reps: 12,
                performance_std_dev: 0.20,
                min_performance: 0.60,
                max_performance: 1.40,
                rep_segment_focus: [[Smb; 4], [MidMarket; 4], [Enterprise; 4]].concat(),
                hired_days_before_start: DayRange::new(30, 365),
            },
            retention: RetentionAssumptions {
                base_monthly_churn: 0.025,
                segment_churn_multipliers: BTreeMap::from([
                    (Smb, 1.40),
                    (MidMarket, 1.00),
                    (Enterprise, 0.50),
                ]),
                churn_day_offset: DayRange::new(1, 28),
            },
            usage: UsageAssumptions {
                base_usage_by_segment: BTreeMap::from([
                    (Smb, usage([5.0, 100.0, 3.0, 3.0, 1.0])),
                    (MidMarket, usage([15.0, 500.0, 10.0, 10.0, 3.0])),
                    (Enterprise, usage([50.0, 2000.0, 30.0, 30.0, 5.0])),
                ]),
                noise_by_metric: BTreeMap::from([
                    (Logins, UniformRange::new(0.5, 1.5)),
                    (ApiCalls, UniformRange::new(0.5, 1.5)),
                    (ReportsGenerated, UniformRange::new(0.3, 1.7)),
                    (TeamMembersActive, UniformRange::new(0.7, 1.3)),
                    (IntegrationsUsed, UniformRange::new(0.8, 1.2)),
                ]),
                weekend_factor: 0.3,
                decline_start_days: 60,
                decline_final_percentage: 0.20,
            },
            expansion: ExpansionAssumptions {
                monthly_expansion_probability: 0.08,
                expansion_percentage_range: Triangular::new(0.10, 0.25, 0.50),
                expansion_conversion_rate: 0.40,
                monthly_contraction_probability: 0.02,
                contraction_percentage_range: Triangular::new(0.10, 0.20, 0.40),
                first_check_after_days: 90,
                close_window_days: DayRange::new(60, 90),
                won_value_variation: 0.20,
            },
            marketing: MarketingAssumptions {
                monthly_spend_by_channel: BTreeMap::from([
                    (OrganicSearch, 15_000.0),
                    (PaidSearch, 40_000.0),
                    (ContentMarketing, 20_000.0),
                    (Referral, 10_000.0),
                    (Events, 25_000.0),
                    (Outbound, 35_000.0),
                    (Partner, 15_000.0),
                ]),
                spend_cv: 0.15,
            },
            nps: NpsAssumptions {
                survey_frequency_days: 90,
                response_rate: 0.35,
                score_distribution_by_health: BTreeMap::from([
                    (HealthBucket::Healthy, nps_mix("nps.healthy", 0.60, 0.30, 0.10)?),
                    (HealthBucket::AtRisk, nps_mix("nps.at_risk", 0.20, 0.40, 0.40)?),
                    (HealthBucket::Churning, nps_mix("nps.churning", 0.05, 0.25, 0.70)?),
                ]),
                churning_within_days: 30,
                at_risk_within_days: 90,
            },
            health: HealthAssumptions {
                lookback_rows: 30,
                usage_weight: 0.4,
                nps_weight: 0.3,
                tenure_weight: 0.3,
                nps_points: BTreeMap::from([
                    (NpsCategory::Promoter, 100.0),
                    (NpsCategory::Passive, 60.0),
                    (NpsCategory::Detractor, 20.0),
                ]),
                tenure_days_per_point: 3.0,
                green_threshold: 70.0,
                yellow_threshold: 40.0,
                churn_probability_by_score: BTreeMap::from([
                    (HealthScore::Green, UniformRange::new(0.05, 0.15)),
                    (HealthScore::Yellow, UniformRange::new(0.25, 0.45)),
                    (HealthScore::Red, UniformRange::new(0.55, 0.85)),
                ]),
                no_usage_churn_probability: 0.5,
            },
        };
        set.validate()?;
        Ok(set)
    }

    /// A small, fast set for tests: defaults with the given horizon and
    /// monthly lead volume.
    pub fn compact(
        start: NaiveDate,
        end: NaiveDate,
        base_leads_per_month: u32,
    ) -> Result<Self, ConfigError> {
        let mut set = Self::standard()?;
        set.horizon = Horizon::new(start, end)?;
        set.lead_gen.base_leads_per_month = base_leads_per_month;
        set.validate()?;
        Ok(set)
    }

    /// Gate probability before the rep and channel adjustments.
    pub fn gate_base(&self, gate: StageGate, size: CompanySize) -> f64 {
        let base = self.conversion.base_stage_conversion.get(&gate).copied().unwrap_or(0.0);
        let segment = self
            .conversion
            .segment_multipliers
            .get(&size)
            .and_then(|t| t.get(&gate))
            .copied()
            .unwrap_or(1.0);
        base * segment
    }

    pub fn base_usage(&self, size: CompanySize, metric: UsageMetric) -> f64 {
        self.usage
            .base_usage_by_segment
            .get(&size)
            .and_then(|t| t.get(&metric))
            .copied()
            .unwrap_or(0.0)
    }
}

fn nps_mix(
    name: &str,
    promoter: f64,
    passive: f64,
    detractor: f64,
) -> Result<Categorical<NpsCategory>, ConfigError> {
    Categorical::new(
        name,
        [
            (NpsCategory::Promoter, promoter),
            (NpsCategory::Passive, passive),
            (NpsCategory::Detractor, detractor),
        ],
    )
}

fn date(y: i32, m: u32, d: u32) -> Result<NaiveDate, ConfigError> {
    NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| ConfigError::OutOfBounds {
        name: "horizon".into(),
        value: d as f64,
        lo: 1.0,
        hi: 31.0,
    })
}

fn require_keys<K: Ord + fmt::Display, V>(
    table: &str,
    map: &BTreeMap<K, V>,
    required: &[K],
) -> Result<(), ConfigError> {
    match required.iter().find(|k| !map.contains_key(k)) {
        Some(missing) => Err(ConfigError::MissingKey {
            table: table.to_string(),
            key: missing.to_string(),
        }),
        None => Ok(()),
    }
}

fn bounded(name: &str, value: f64, lo: f64, hi: f64) -> Result<(), ConfigError> {
    if !(lo..=hi).contains(&value) {
        return Err(ConfigError::OutOfBounds { name: name.to_string(), value, lo, hi });
    }
    Ok(())
}

fn unit_interval(name: &str, value: f64) -> Result<(), ConfigError> {
    bounded(name, value, 0.0, 1.0)
}

fn multiplier(name: &str, value: f64) -> Result<(), ConfigError> {
    bounded(name, value, 0.0, MAX_MULTIPLIER)
}

fn day_span(name: &str, days: i64) -> Result<(), ConfigError> {
    bounded(name, days as f64, 0.0, MAX_SPAN_DAYS as f64)
}

fn non_negative(name: &str, value: f64) -> Result<(), ConfigError> {
    if value < 0.0 || !value.is_finite() {
        return Err(ConfigError::OutOfBounds {
            name: name.to_string(),
            value,
            lo: 0.0,
            hi: f64::INFINITY,
        });
    }
    Ok(())
}
