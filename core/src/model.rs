//! Entity types for the ten generated collections.
//!
//! Every categorical field is a closed enum whose serde form is the
//! human-readable label stored in the database and assumption files.

use crate::types::{EntityId, SimDate};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! labeled_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( #[serde(rename = $label)] $variant, )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            pub fn parse(label: &str) -> Option<Self> {
                match label {
                    $($label => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labeled_enum! {
    /// Customer segment by headcount.
    CompanySize {
        Smb => "SMB",
        MidMarket => "Mid-Market",
        Enterprise => "Enterprise",
    }
}

labeled_enum! {
    /// Lead acquisition channel.
    Channel {
        OrganicSearch => "Organic Search",
        PaidSearch => "Paid Search",
        ContentMarketing => "Content Marketing",
        Referral => "Referral",
        Events => "Events",
        Outbound => "Outbound",
        Partner => "Partner",
    }
}

labeled_enum! {
    Industry {
        Technology => "Technology",
        FinancialServices => "Financial Services",
        Healthcare => "Healthcare",
        Retail => "Retail",
        Manufacturing => "Manufacturing",
        ProfessionalServices => "Professional Services",
        Other => "Other",
    }
}

labeled_enum! {
    /// Pipeline stages. Declaration order is pipeline order.
    Stage {
        Lead => "Lead",
        Mql => "MQL",
        Sql => "SQL",
        Opportunity => "Opportunity",
        Negotiation => "Negotiation",
        ClosedWon => "Closed Won",
        ClosedLost => "Closed Lost",
    }
}

impl Stage {
    pub fn is_closed(&self) -> bool {
        matches!(self, Stage::ClosedWon | Stage::ClosedLost)
    }
}

labeled_enum! {
    /// A single forward step through the pipeline.
    StageGate {
        LeadToMql => "lead_to_mql",
        MqlToSql => "mql_to_sql",
        SqlToOpportunity => "sql_to_opportunity",
        OpportunityToNegotiation => "opportunity_to_negotiation",
        NegotiationToClosed => "negotiation_to_closed",
    }
}

impl StageGate {
    pub fn from_stage(&self) -> Stage {
        match self {
            StageGate::LeadToMql => Stage::Lead,
            StageGate::MqlToSql => Stage::Mql,
            StageGate::SqlToOpportunity => Stage::Sql,
            StageGate::OpportunityToNegotiation => Stage::Opportunity,
            StageGate::NegotiationToClosed => Stage::Negotiation,
        }
    }

    pub fn to_stage(&self) -> Stage {
        match self {
            StageGate::LeadToMql => Stage::Mql,
            StageGate::MqlToSql => Stage::Sql,
            StageGate::SqlToOpportunity => Stage::Opportunity,
            StageGate::OpportunityToNegotiation => Stage::Negotiation,
            StageGate::NegotiationToClosed => Stage::ClosedWon,
        }
    }
}

labeled_enum! {
    CustomerStatus {
        Active => "Active",
        Churned => "Churned",
    }
}

labeled_enum! {
    MovementType {
        New => "New",
        Expansion => "Expansion",
        Contraction => "Contraction",
        Churn => "Churn",
    }
}

labeled_enum! {
    /// Traffic-light health category.
    HealthScore {
        Green => "Green",
        Yellow => "Yellow",
        Red => "Red",
    }
}

labeled_enum! {
    ExpansionStatus {
        Identified => "Identified",
        InProgress => "In Progress",
        Won => "Won",
        Lost => "Lost",
    }
}

labeled_enum! {
    ExpansionKind {
        Upsell => "Upsell",
        CrossSell => "Cross-sell",
    }
}

labeled_enum! {
    NpsCategory {
        Promoter => "promoter",
        Passive => "passive",
        Detractor => "detractor",
    }
}

impl NpsCategory {
    /// Standard NPS banding of a 0-10 score.
    pub fn of_score(score: u8) -> Self {
        match score {
            9..=10 => NpsCategory::Promoter,
            7..=8 => NpsCategory::Passive,
            _ => NpsCategory::Detractor,
        }
    }
}

labeled_enum! {
    /// Survey-time condition of a customer, by distance to churn.
    HealthBucket {
        Healthy => "healthy",
        AtRisk => "at_risk",
        Churning => "churning",
    }
}

labeled_enum! {
    UsageMetric {
        Logins => "logins",
        ApiCalls => "api_calls",
        ReportsGenerated => "reports_generated",
        TeamMembersActive => "team_members_active",
        IntegrationsUsed => "integrations_used",
    }
}

/// Categorical dimension shared by opportunities and customers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentField {
    CompanySize,
    Channel,
    Industry,
}

impl SegmentField {
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "company_size" => Some(SegmentField::CompanySize),
            "channel" => Some(SegmentField::Channel),
            "industry" => Some(SegmentField::Industry),
            _ => None,
        }
    }

    pub fn of_opportunity(&self, opp: &Opportunity) -> &'static str {
        match self {
            SegmentField::CompanySize => opp.company_size.as_str(),
            SegmentField::Channel => opp.channel.as_str(),
            SegmentField::Industry => opp.industry.as_str(),
        }
    }

    pub fn of_customer(&self, customer: &Customer) -> &'static str {
        match self {
            SegmentField::CompanySize => customer.company_size.as_str(),
            SegmentField::Channel => customer.channel.as_str(),
            SegmentField::Industry => customer.industry.as_str(),
        }
    }
}

// ── Entities ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRep {
    pub rep_id: EntityId,
    pub name: String,
    /// Hire date. Precedes the horizon, so it is the one date field
    /// not bound to the generation window.
    pub start_date: SimDate,
    pub segment_focus: CompanySize,
    pub performance_score: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub lead_id: EntityId,
    pub created_date: SimDate,
    pub channel: Channel,
    pub company_name: String,
    pub company_size: CompanySize,
    pub industry: Industry,
    pub estimated_acv: f64,
    pub assigned_rep_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub opportunity_id: EntityId,
    pub lead_id: EntityId,
    pub created_date: SimDate,
    pub current_stage: Stage,
    pub amount: f64,
    pub close_date: Option<SimDate>,
    /// None while the opportunity is still open.
    pub is_won: Option<bool>,
    pub loss_reason: Option<String>,
    pub assigned_rep_id: EntityId,
    pub company_size: CompanySize,
    pub channel: Channel,
    pub industry: Industry,
}

impl Opportunity {
    pub fn is_open(&self) -> bool {
        self.is_won.is_none()
    }
}

/// One row of the append-only stage ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTransition {
    pub transition_id: EntityId,
    pub opportunity_id: EntityId,
    pub from_stage: Stage,
    pub to_stage: Stage,
    pub transition_date: SimDate,
    pub days_in_previous_stage: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: EntityId,
    pub opportunity_id: EntityId,
    pub company_name: String,
    pub company_size: CompanySize,
    pub industry: Industry,
    pub channel: Channel,
    pub start_date: SimDate,
    pub status: CustomerStatus,
    pub churn_date: Option<SimDate>,
    pub current_mrr: f64,
    pub initial_mrr: f64,
    pub assigned_rep_id: EntityId,
    pub latest_nps_score: Option<u8>,
    pub health_score: Option<HealthScore>,
    pub churn_probability: Option<f64>,
}

impl Customer {
    pub fn is_active(&self) -> bool {
        self.status == CustomerStatus::Active
    }

    /// Last day the customer is live: churn date, or the given horizon end.
    pub fn active_until(&self, horizon_end: SimDate) -> SimDate {
        self.churn_date.unwrap_or(horizon_end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub event_id: EntityId,
    pub customer_id: EntityId,
    pub event_date: SimDate,
    pub logins: u32,
    pub api_calls: u32,
    pub reports_generated: u32,
    pub team_members_active: u32,
    pub integrations_used: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketingSpend {
    pub spend_id: EntityId,
    pub channel: Channel,
    pub period_start: SimDate,
    pub period_end: SimDate,
    pub amount: f64,
    pub campaign_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MrrMovement {
    pub movement_id: EntityId,
    pub customer_id: EntityId,
    pub movement_date: SimDate,
    pub movement_type: MovementType,
    /// Signed change: positive for New/Expansion, negative otherwise.
    pub amount: f64,
    pub previous_mrr: f64,
    pub new_mrr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpsSurvey {
    pub survey_id: EntityId,
    pub customer_id: EntityId,
    pub survey_date: SimDate,
    pub score: Option<u8>,
    pub response_text: Option<String>,
    pub responded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionOpportunity {
    pub expansion_id: EntityId,
    pub customer_id: EntityId,
    pub identified_date: SimDate,
    pub opportunity_type: ExpansionKind,
    pub estimated_value: f64,
    pub status: ExpansionStatus,
    pub closed_date: Option<SimDate>,
    pub actual_value: Option<f64>,
}

/// Round to cents.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to three decimal places.
pub fn round_3dp(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
