//! Cross-entity state for a single generation run.
//!
//! RULE: Stages never keep entity state of their own. Everything a later
//! stage may need lives here, together with the lookup indices that tie
//! the collections together.

use crate::calendar::Horizon;
use crate::error::{GenError, GenResult};
use crate::model::{
    Customer, ExpansionOpportunity, Lead, MarketingSpend, MrrMovement, NpsSurvey, Opportunity,
    SalesRep, StageTransition, UsageEvent,
};
use crate::types::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;

/// Mutable arena threaded through every generation stage.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub horizon: Horizon,

    pub sales_reps:              Vec<SalesRep>,
    pub leads:                   Vec<Lead>,
    pub opportunities:           Vec<Opportunity>,
    pub stage_transitions:       Vec<StageTransition>,
    pub customers:               Vec<Customer>,
    pub usage_events:            Vec<UsageEvent>,
    pub marketing_spend:         Vec<MarketingSpend>,
    pub mrr_movements:           Vec<MrrMovement>,
    pub nps_surveys:             Vec<NpsSurvey>,
    pub expansion_opportunities: Vec<ExpansionOpportunity>,

    rep_index:      HashMap<EntityId, usize>,
    lead_index:     HashMap<EntityId, usize>,
    customer_index: HashMap<EntityId, usize>,
    usage_spans:    HashMap<EntityId, Range<usize>>,
}

impl GenerationContext {
    pub fn new(horizon: Horizon) -> Self {
        Self {
            horizon,
            sales_reps: Vec::new(),
            leads: Vec::new(),
            opportunities: Vec::new(),
            stage_transitions: Vec::new(),
            customers: Vec::new(),
            usage_events: Vec::new(),
            marketing_spend: Vec::new(),
            mrr_movements: Vec::new(),
            nps_surveys: Vec::new(),
            expansion_opportunities: Vec::new(),
            rep_index: HashMap::new(),
            lead_index: HashMap::new(),
            customer_index: HashMap::new(),
            usage_spans: HashMap::new(),
        }
    }

    // ── Registration ─────────────────────────────────────────────────────

    pub fn add_sales_rep(&mut self, rep: SalesRep) {
        self.rep_index.insert(rep.rep_id.clone(), self.sales_reps.len());
        self.sales_reps.push(rep);
    }

    pub fn add_lead(&mut self, lead: Lead) {
        self.lead_index.insert(lead.lead_id.clone(), self.leads.len());
        self.leads.push(lead);
    }

    /// Record an opportunity together with its slice of the stage ledger.
    pub fn add_opportunity(&mut self, opportunity: Opportunity, transitions: Vec<StageTransition>) {
        self.opportunities.push(opportunity);
        self.stage_transitions.extend(transitions);
    }

    pub fn add_customer(&mut self, customer: Customer) {
        self.customer_index.insert(customer.customer_id.clone(), self.customers.len());
        self.customers.push(customer);
    }

    /// Append one customer's usage rows contiguously and index the span.
    pub fn add_usage_events(&mut self, customer_id: &str, events: Vec<UsageEvent>) {
        let start = self.usage_events.len();
        self.usage_events.extend(events);
        self.usage_spans
            .insert(customer_id.to_string(), start..self.usage_events.len());
    }

    // ── Lookups ──────────────────────────────────────────────────────────

    pub fn sales_rep(&self, rep_id: &str) -> GenResult<&SalesRep> {
        self.rep_index
            .get(rep_id)
            .and_then(|&i| self.sales_reps.get(i))
            .ok_or_else(|| missing("sales rep", rep_id))
    }

    pub fn lead(&self, lead_id: &str) -> GenResult<&Lead> {
        self.lead_index
            .get(lead_id)
            .and_then(|&i| self.leads.get(i))
            .ok_or_else(|| missing("lead", lead_id))
    }

    pub fn customer_mut(&mut self, customer_id: &str) -> GenResult<&mut Customer> {
        match self.customer_index.get(customer_id) {
            Some(&i) => self.customers.get_mut(i).ok_or_else(|| missing("customer", customer_id)),
            None => Err(missing("customer", customer_id)),
        }
    }

    /// Usage rows for one customer, in date order.
    pub fn usage_for(&self, customer_id: &str) -> &[UsageEvent] {
        self.usage_spans
            .get(customer_id)
            .and_then(|span| self.usage_events.get(span.clone()))
            .unwrap_or(&[])
    }

    /// Freeze the run into its immutable output.
    pub fn into_dataset(self) -> Dataset {
        Dataset {
            horizon: self.horizon,
            sales_reps: self.sales_reps,
            leads: self.leads,
            opportunities: self.opportunities,
            stage_transitions: self.stage_transitions,
            customers: self.customers,
            usage_events: self.usage_events,
            marketing_spend: self.marketing_spend,
            mrr_movements: self.mrr_movements,
            nps_surveys: self.nps_surveys,
            expansion_opportunities: self.expansion_opportunities,
        }
    }
}

fn missing(kind: &'static str, id: &str) -> GenError {
    GenError::MissingEntity { kind, id: id.to_string() }
}

/// The ten generated collections of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub horizon:                 Horizon,
    pub sales_reps:              Vec<SalesRep>,
    pub leads:                   Vec<Lead>,
    pub opportunities:           Vec<Opportunity>,
    pub stage_transitions:       Vec<StageTransition>,
    pub customers:               Vec<Customer>,
    pub usage_events:            Vec<UsageEvent>,
    pub marketing_spend:         Vec<MarketingSpend>,
    pub mrr_movements:           Vec<MrrMovement>,
    pub nps_surveys:             Vec<NpsSurvey>,
    pub expansion_opportunities: Vec<ExpansionOpportunity>,
}

impl Dataset {
    /// Row counts in persistence order.
    pub fn table_counts(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("sales_reps", self.sales_reps.len()),
            ("leads", self.leads.len()),
            ("opportunities", self.opportunities.len()),
            ("stage_transitions", self.stage_transitions.len()),
            ("customers", self.customers.len()),
            ("usage_events", self.usage_events.len()),
            ("marketing_spend", self.marketing_spend.len()),
            ("mrr_movements", self.mrr_movements.len()),
            ("nps_surveys", self.nps_surveys.len()),
            ("expansion_opportunities", self.expansion_opportunities.len()),
        ]
    }

    pub fn customer(&self, customer_id: &str) -> Option<&Customer> {
        self.customers.iter().find(|c| c.customer_id == customer_id)
    }

    /// Movements grouped by customer, each group in ledger order.
    pub fn movements_by_customer(&self) -> HashMap<&str, Vec<&MrrMovement>> {
        let mut grouped: HashMap<&str, Vec<&MrrMovement>> = HashMap::new();
        for movement in &self.mrr_movements {
            grouped.entry(movement.customer_id.as_str()).or_default().push(movement);
        }
        grouped
    }

    /// Usage rows grouped by customer, each group in date order.
    pub fn usage_by_customer(&self) -> HashMap<&str, Vec<&UsageEvent>> {
        let mut grouped: HashMap<&str, Vec<&UsageEvent>> = HashMap::new();
        for event in &self.usage_events {
            grouped.entry(event.customer_id.as_str()).or_default().push(event);
        }
        grouped
    }

    pub fn transitions_by_opportunity(&self) -> HashMap<&str, Vec<&StageTransition>> {
        let mut grouped: HashMap<&str, Vec<&StageTransition>> = HashMap::new();
        for transition in &self.stage_transitions {
            grouped.entry(transition.opportunity_id.as_str()).or_default().push(transition);
        }
        grouped
    }
}
