//! Health score distribution over active customers.

use crate::{
    context::Dataset,
    metrics::{mean, ratio},
    model::{Customer, HealthScore, SegmentField},
    types::EntityId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthBand {
    pub count:          usize,
    pub mrr:            f64,
    pub percentage:     f64,
    pub mrr_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthDistribution {
    pub green:           HealthBand,
    pub yellow:          HealthBand,
    pub red:             HealthBand,
    pub total_customers: usize,
    pub total_mrr:       f64,
}

impl HealthDistribution {
    pub fn band(&self, score: HealthScore) -> &HealthBand {
        match score {
            HealthScore::Green => &self.green,
            HealthScore::Yellow => &self.yellow,
            HealthScore::Red => &self.red,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentHealth {
    pub segment:               String,
    pub distribution:          HealthDistribution,
    pub avg_churn_probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRow {
    pub customer_id:       EntityId,
    pub company_name:      String,
    pub current_mrr:       f64,
    pub churn_probability: f64,
    pub nps_score:         Option<u8>,
}

fn distribution_of<'a>(customers: impl Iterator<Item = &'a Customer>) -> HealthDistribution {
    let mut bands: [HealthBand; 3] = Default::default();
    for customer in customers {
        let idx = match customer.health_score {
            Some(HealthScore::Green) => 0,
            Some(HealthScore::Yellow) => 1,
            Some(HealthScore::Red) => 2,
            None => continue,
        };
        bands[idx].count += 1;
        bands[idx].mrr += customer.current_mrr;
    }
    let total_customers: usize = bands.iter().map(|b| b.count).sum();
    let total_mrr: f64 = bands.iter().map(|b| b.mrr).sum();
    for band in &mut bands {
        band.percentage = ratio(band.count as f64, total_customers as f64);
        band.mrr_percentage = ratio(band.mrr, total_mrr);
    }
    let [green, yellow, red] = bands;
    HealthDistribution { green, yellow, red, total_customers, total_mrr }
}

pub fn health_distribution(data: &Dataset) -> HealthDistribution {
    distribution_of(data.customers.iter().filter(|c| c.is_active()))
}

pub fn health_by_segment(data: &Dataset, field: SegmentField) -> Vec<SegmentHealth> {
    let mut groups: BTreeMap<&'static str, Vec<&Customer>> = BTreeMap::new();
    for customer in data.customers.iter().filter(|c| c.is_active()) {
        groups.entry(field.of_customer(customer)).or_default().push(customer);
    }
    groups
        .into_iter()
        .map(|(segment, members)| {
            let probabilities: Vec<f64> =
                members.iter().filter_map(|c| c.churn_probability).collect();
            SegmentHealth {
                segment: segment.to_string(),
                distribution: distribution_of(members.iter().copied()),
                avg_churn_probability: mean(&probabilities),
            }
        })
        .collect()
}

/// Active customers in one health category, largest MRR first.
pub fn customers_by_health(data: &Dataset, score: HealthScore, limit: usize) -> Vec<HealthRow> {
    let mut rows: Vec<HealthRow> = data
        .customers
        .iter()
        .filter(|c| c.is_active() && c.health_score == Some(score))
        .map(|c| HealthRow {
            customer_id: c.customer_id.clone(),
            company_name: c.company_name.clone(),
            current_mrr: c.current_mrr,
            churn_probability: c.churn_probability.unwrap_or(0.0),
            nps_score: c.latest_nps_score,
        })
        .collect();
    rows.sort_by(|a, b| b.current_mrr.total_cmp(&a.current_mrr));
    rows.truncate(limit);
    rows
}
