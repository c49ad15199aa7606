use crate::{
    error::GenResult,
    model::{Lead, MarketingSpend, Opportunity, SalesRep, StageTransition},
};
use rusqlite::{params, Connection};

// ── Sales reps ───────────────────────────────────────────────────────────

pub(super) fn insert_sales_reps(conn: &Connection, reps: &[SalesRep]) -> GenResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO sales_reps (
            rep_id, name, start_date, segment_focus, performance_score, is_active
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for r in reps {
        stmt.execute(params![
            r.rep_id,
            r.name,
            r.start_date,
            r.segment_focus.as_str(),
            r.performance_score,
            r.is_active,
        ])?;
    }
    Ok(())
}

// ── Leads ────────────────────────────────────────────────────────────────

pub(super) fn insert_leads(conn: &Connection, leads: &[Lead]) -> GenResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO leads (
            lead_id, created_date, channel, company_name, company_size,
            industry, estimated_acv, assigned_rep_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for l in leads {
        stmt.execute(params![
            l.lead_id,
            l.created_date,
            l.channel.as_str(),
            l.company_name,
            l.company_size.as_str(),
            l.industry.as_str(),
            l.estimated_acv,
            l.assigned_rep_id,
        ])?;
    }
    Ok(())
}

// ── Opportunities ────────────────────────────────────────────────────────

pub(super) fn insert_opportunities(conn: &Connection, opportunities: &[Opportunity]) -> GenResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO opportunities (
            opportunity_id, lead_id, created_date, current_stage, amount,
            close_date, is_won, loss_reason, assigned_rep_id, company_size,
            channel, industry
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )?;
    for o in opportunities {
        stmt.execute(params![
            o.opportunity_id,
            o.lead_id,
            o.created_date,
            o.current_stage.as_str(),
            o.amount,
            o.close_date,
            o.is_won,
            o.loss_reason,
            o.assigned_rep_id,
            o.company_size.as_str(),
            o.channel.as_str(),
            o.industry.as_str(),
        ])?;
    }
    Ok(())
}

pub(super) fn insert_stage_transitions(
    conn: &Connection,
    transitions: &[StageTransition],
) -> GenResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO stage_transitions (
            transition_id, opportunity_id, from_stage, to_stage,
            transition_date, days_in_previous_stage
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for t in transitions {
        stmt.execute(params![
            t.transition_id,
            t.opportunity_id,
            t.from_stage.as_str(),
            t.to_stage.as_str(),
            t.transition_date,
            t.days_in_previous_stage,
        ])?;
    }
    Ok(())
}

// ── Marketing ────────────────────────────────────────────────────────────

pub(super) fn insert_marketing_spend(conn: &Connection, spend: &[MarketingSpend]) -> GenResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO marketing_spend (
            spend_id, channel, period_start, period_end, amount, campaign_name
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for s in spend {
        stmt.execute(params![
            s.spend_id,
            s.channel.as_str(),
            s.period_start,
            s.period_end,
            s.amount,
            s.campaign_name,
        ])?;
    }
    Ok(())
}
