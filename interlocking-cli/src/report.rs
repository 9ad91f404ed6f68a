//! Report generation
//!
//! Collects the relay changes of every cycle and the final signal aspects, and renders
//! them as plain text or JSON.

use anyhow::Result;
use interlocking_core::{Aspect, PlantDatabase, RelayKind, SweepReport};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// One relay change with the route's name instead of its id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedChange {
    pub route: String,
    pub relay: RelayKind,
    pub raised: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleSummary {
    pub cycle: usize,
    pub changes: Vec<NamedChange>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub cycles: Vec<CycleSummary>,
    pub aspects: BTreeMap<String, Aspect>,
}

impl RunReport {
    pub fn add_cycle(&mut self, cycle: usize, sweep: &SweepReport, plant: &PlantDatabase) {
        let changes = sweep
            .changes
            .iter()
            .map(|change| NamedChange {
                route: plant
                    .get(change.route)
                    .map(|object| object.name.clone())
                    .unwrap_or_else(|| change.route.to_string()),
                relay: change.relay,
                raised: change.raised,
            })
            .collect();
        self.cycles.push(CycleSummary { cycle, changes });
    }

    pub fn total_changes(&self) -> usize {
        self.cycles.iter().map(|c| c.changes.len()).sum()
    }
}

/// Render the report as aligned plain text
pub fn render_txt(report: &RunReport) -> String {
    let mut out = String::new();

    for cycle in &report.cycles {
        if cycle.changes.is_empty() {
            let _ = writeln!(out, "Cycle {}: no relay changes", cycle.cycle);
            continue;
        }
        let _ = writeln!(out, "Cycle {}: {} relay changes", cycle.cycle, cycle.changes.len());
        let width = cycle.changes.iter().map(|c| c.route.chars().count()).max().unwrap_or(0);
        for change in &cycle.changes {
            let padding = width - change.route.chars().count();
            let _ = writeln!(
                out,
                "  {}{}  {:<2}  {}",
                change.route,
                " ".repeat(padding),
                change.relay.to_string(),
                if change.raised { "raised" } else { "dropped" }
            );
        }
    }

    let _ = writeln!(out, "\nSignal aspects:");
    if report.aspects.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    let width = report.aspects.keys().map(|name| name.chars().count()).max().unwrap_or(0);
    for (signal, aspect) in &report.aspects {
        let padding = width - signal.chars().count();
        let _ = writeln!(out, "  {}{}  {}", signal, " ".repeat(padding), aspect);
    }

    out
}

/// Render the report as pretty-printed JSON
pub fn render_json(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
