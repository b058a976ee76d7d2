//! Structural diagnostics derived from clause statistics.

use std::collections::HashMap;

use crate::evaluator::ClauseType;

use super::types::{ClauseStatistic, OverconstrainedConjunction};

/// Flag every `and` node with at least `min_children` children whose pass
/// rate is below `max_child_pass_rate`.
pub fn detect_overconstrained_conjunctions(
    stats: &[ClauseStatistic],
    min_children: usize,
    max_child_pass_rate: f64,
) -> Vec<OverconstrainedConjunction> {
    let by_id: HashMap<&str, &ClauseStatistic> =
        stats.iter().map(|s| (s.clause_id.as_str(), s)).collect();

    stats
        .iter()
        .filter(|s| s.kind == ClauseType::And)
        .filter_map(|node| {
            let rare: Vec<&ClauseStatistic> = node
                .child_ids
                .iter()
                .filter_map(|id| by_id.get(id.as_str()).copied())
                .filter(|child| child.evaluated_count > 0 && child.pass_rate < max_child_pass_rate)
                .collect();
            if rare.len() < min_children {
                return None;
            }
            let child_pass_rates: Vec<f64> = rare.iter().map(|c| c.pass_rate).collect();
            Some(OverconstrainedConjunction {
                clause_id: node.clause_id.clone(),
                description: node.description.clone(),
                rare_child_ids: rare.iter().map(|c| c.clause_id.clone()).collect(),
                naive_joint_probability: child_pass_rates.iter().product(),
                child_pass_rates,
                observed_pass_rate: node.pass_rate,
            })
        })
        .collect()
}

/// Leaves ranked by how often they were the last blocker, most frequent first.
pub fn rank_last_mile_blockers(stats: &[ClauseStatistic], limit: usize) -> Vec<&ClauseStatistic> {
    let mut leaves: Vec<&ClauseStatistic> = stats
        .iter()
        .filter(|s| s.kind == ClauseType::Leaf && s.last_mile_fail_count > 0)
        .collect();
    leaves.sort_by(|a, b| {
        b.last_mile_fail_count
            .cmp(&a.last_mile_fail_count)
            .then_with(|| a.clause_id.cmp(&b.clause_id))
    });
    leaves.truncate(limit);
    leaves
}
