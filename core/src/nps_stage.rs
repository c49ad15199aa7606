//! Periodic NPS surveys.
//!
//! Surveys go out every `survey_frequency_days` from the start date while
//! the customer is live. The score distribution depends on how close the
//! survey falls to the (already decided) churn date, which is what makes
//! detractors over-represented among customers about to leave.
//!
//! Execution: after mrr. Depends on: customers.

use crate::{
    assumptions::AssumptionSet,
    calendar::{add_days, days_between},
    context::GenerationContext,
    error::GenResult,
    model::{HealthBucket, NpsCategory, NpsSurvey},
    rng::StageRng,
    stage::GenerationStage,
    types::{EntityId, SimDate},
};

pub struct NpsStage;

impl GenerationStage for NpsStage {
    fn name(&self) -> &'static str {
        "nps"
    }

    fn run(
        &mut self,
        ctx: &mut GenerationContext,
        assumptions: &AssumptionSet,
        rng: &mut StageRng,
    ) -> GenResult<usize> {
        let cfg = &assumptions.nps;
        let horizon_end = ctx.horizon.end;
        let windows: Vec<(EntityId, SimDate, Option<SimDate>)> = ctx
            .customers
            .iter()
            .map(|c| (c.customer_id.clone(), c.start_date, c.churn_date))
            .collect();
        let before = ctx.nps_surveys.len();

        for (customer_id, start, churn_date) in windows {
            let end = churn_date.unwrap_or(horizon_end);
            let mut latest = None;
            let mut survey_date = add_days(start, cfg.survey_frequency_days);

            while survey_date <= end {
                let bucket = survey_bucket(survey_date, churn_date, assumptions);
                let responded = rng.chance(cfg.response_rate);
                let (score, response_text) = if responded {
                    let category = cfg
                        .score_distribution_by_health
                        .get(&bucket)
                        .map(|dist| *dist.sample(rng))
                        .unwrap_or(NpsCategory::Passive);
                    let score = draw_score(category, rng);
                    latest = Some(score);
                    (Some(score), draw_comment(category, rng))
                } else {
                    (None, None)
                };

                ctx.nps_surveys.push(NpsSurvey {
                    survey_id: format!("NPS_{:07}", ctx.nps_surveys.len() + 1),
                    customer_id: customer_id.clone(),
                    survey_date,
                    score,
                    response_text,
                    responded,
                });
                survey_date = add_days(survey_date, cfg.survey_frequency_days);
            }

            if latest.is_some() {
                ctx.customer_mut(&customer_id)?.latest_nps_score = latest;
            }
        }

        Ok(ctx.nps_surveys.len() - before)
    }
}

/// Customer condition at survey time, judged by distance to churn.
pub fn survey_bucket(
    survey_date: SimDate,
    churn_date: Option<SimDate>,
    assumptions: &AssumptionSet,
) -> HealthBucket {
    let Some(churn) = churn_date else {
        return HealthBucket::Healthy;
    };
    let days_to_churn = days_between(survey_date, churn);
    if days_to_churn < assumptions.nps.churning_within_days {
        HealthBucket::Churning
    } else if days_to_churn < assumptions.nps.at_risk_within_days {
        HealthBucket::AtRisk
    } else {
        HealthBucket::Healthy
    }
}

fn draw_score(category: NpsCategory, rng: &mut StageRng) -> u8 {
    let (lo, hi) = match category {
        NpsCategory::Promoter => (9, 10),
        NpsCategory::Passive => (7, 8),
        NpsCategory::Detractor => (0, 6),
    };
    rng.int_inclusive(lo, hi) as u8
}

/// Optional free-text comment. One slot in each list means "left blank".
fn draw_comment(category: NpsCategory, rng: &mut StageRng) -> Option<String> {
    let comments: &[&str] = match category {
        NpsCategory::Promoter => &[
            "Our team relies on it every day.",
            "Onboarding was smooth and support is quick.",
            "Reporting alone paid for the subscription.",
        ],
        NpsCategory::Passive => &[
            "Does the job, a few rough edges.",
            "Solid core product, integrations could be better.",
        ],
        NpsCategory::Detractor => &[
            "Pricing is hard to justify at our size.",
            "Key workflows are still missing.",
            "Support takes days to respond.",
            "The interface slows our team down.",
        ],
    };
    let pick = rng.next_u64_below(comments.len() as u64 + 1) as usize;
    comments.get(pick).map(|c| c.to_string())
}
