//! Generation stage trait.
//!
//! RULE: Every generator implements GenerationStage.
//! The engine calls run() once on each registered stage, in
//! registration order. Execution order is fixed and documented
//! in engine.rs.

use crate::{assumptions::AssumptionSet, context::GenerationContext, error::GenResult, rng::StageRng};

/// The contract every generation stage must fulfill.
pub trait GenerationStage: Send {
    /// Unique stable name for this stage.
    fn name(&self) -> &'static str;

    /// Called exactly once per run by the engine.
    ///
    /// - `ctx`:         all collections produced by earlier stages
    /// - `assumptions`: the frozen assumption set for the run
    /// - `rng`:         this stage's deterministic RNG stream
    ///
    /// Returns the number of rows the stage added or updated.
    fn run(
        &mut self,
        ctx: &mut GenerationContext,
        assumptions: &AssumptionSet,
        rng: &mut StageRng,
    ) -> GenResult<usize>;
}
