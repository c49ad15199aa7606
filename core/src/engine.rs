//! The generation engine.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Sales reps
//!   2. Leads
//!   3. Pipeline (opportunities + stage transition ledger)
//!   4. Customers (churn decision)
//!   5. Usage events
//!   6. Marketing spend
//!   7. MRR movements
//!   8. NPS surveys
//!   9. Expansion opportunities
//!  10. Health scores
//!
//! RULES:
//!   - Stages run once each, in registration order.
//!   - A stage reads only what earlier stages left in the context.
//!   - No stage calls another stage's functions directly.
//!   - All randomness flows through the RngBank.
//!   - Any stage error aborts the whole run; nothing partial escapes.

use crate::{
    assumptions::AssumptionSet,
    calendar::Horizon,
    context::{Dataset, GenerationContext},
    customer_stage::CustomerStage,
    error::GenResult,
    expansion_stage::ExpansionStage,
    health_stage::HealthStage,
    lead_stage::LeadStage,
    marketing_stage::MarketingStage,
    mrr_stage::MrrStage,
    nps_stage::NpsStage,
    pipeline_stage::PipelineStage,
    rng::{RngBank, StageSlot},
    sales_rep_stage::SalesRepStage,
    stage::GenerationStage,
    types::RunId,
    usage_stage::UsageStage,
};
use serde::{Deserialize, Serialize};

/// Metadata persisted alongside a generated dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id:              RunId,
    pub seed:                u64,
    pub generator_version:   String,
    pub assumptions_version: String,
    pub horizon:             Horizon,
}

pub struct GenerationEngine {
    pub run_id:   RunId,
    pub rng_bank: RngBank,
    assumptions:  AssumptionSet,
    stages:       Vec<(StageSlot, Box<dyn GenerationStage>)>,
}

impl GenerationEngine {
    /// An engine with no stages registered. The assumption set is
    /// validated here, before any stage can see it.
    pub fn new(assumptions: AssumptionSet, seed: u64) -> GenResult<Self> {
        assumptions.validate()?;
        Ok(Self {
            run_id: format!("run-{seed}-{}", assumptions.version),
            rng_bank: RngBank::new(seed),
            assumptions,
            stages: Vec::new(),
        })
    }

    /// Build a fully wired engine with all stages registered.
    /// Call this instead of new() + manual register() calls.
    pub fn build(assumptions: AssumptionSet, seed: u64) -> GenResult<Self> {
        let mut engine = GenerationEngine::new(assumptions, seed)?;

        // EXECUTION ORDER: fixed and documented. Do not reorder.
        engine.register(StageSlot::SalesRep, Box::new(SalesRepStage));
        engine.register(StageSlot::Lead, Box::new(LeadStage));
        engine.register(StageSlot::Pipeline, Box::new(PipelineStage));
        engine.register(StageSlot::Customer, Box::new(CustomerStage));
        engine.register(StageSlot::Usage, Box::new(UsageStage));
        engine.register(StageSlot::Marketing, Box::new(MarketingStage));
        engine.register(StageSlot::Mrr, Box::new(MrrStage));
        engine.register(StageSlot::Nps, Box::new(NpsStage));
        engine.register(StageSlot::Expansion, Box::new(ExpansionStage));
        engine.register(StageSlot::Health, Box::new(HealthStage));
        Ok(engine)
    }

    /// Register a stage. Call in the documented execution order.
    pub fn register(&mut self, slot: StageSlot, stage: Box<dyn GenerationStage>) {
        self.stages.push((slot, stage));
    }

    pub fn assumptions(&self) -> &AssumptionSet {
        &self.assumptions
    }

    pub fn run_info(&self) -> RunInfo {
        RunInfo {
            run_id: self.run_id.clone(),
            seed: self.rng_bank.master_seed(),
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            assumptions_version: self.assumptions.version.clone(),
            horizon: self.assumptions.horizon,
        }
    }

    /// Run every registered stage once, in order, and freeze the result.
    pub fn run(&mut self) -> GenResult<Dataset> {
        let mut ctx = GenerationContext::new(self.assumptions.horizon);
        log::info!(
            "Generating {} (seed {}, horizon {}..{})",
            self.run_id,
            self.rng_bank.master_seed(),
            self.assumptions.horizon.start,
            self.assumptions.horizon.end
        );

        for (slot, stage) in &mut self.stages {
            let mut rng = self.rng_bank.for_stage(*slot);
            let rows = stage.run(&mut ctx, &self.assumptions, &mut rng)?;
            log::info!("[{}] {rows} rows", stage.name());
        }

        Ok(ctx.into_dataset())
    }
}

/// One-shot convenience: build, run, return the dataset.
pub fn generate(assumptions: AssumptionSet, seed: u64) -> GenResult<Dataset> {
    GenerationEngine::build(assumptions, seed)?.run()
}
