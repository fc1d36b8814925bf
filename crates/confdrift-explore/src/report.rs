//! Format campaign reports for human consumption.

use crate::campaign::CampaignReport;
use crate::strategy::Individual;

/// Format a campaign report for human consumption.
pub fn format_campaign_report(report: &CampaignReport) -> String {
    let mut output = String::new();

    output.push_str("═══════════════════════════════════════════════════════════════════════\n");
    output.push_str("  ConfDrift Campaign Report\n");
    output.push_str("═══════════════════════════════════════════════════════════════════════\n\n");

    // Summary
    output.push_str(&format!("Generations completed:  {}\n", report.generations));
    output.push_str(&format!("Total replays:          {}\n", report.total_replays));
    output.push_str(&format!(
        "Confirmed novel:        {}\n",
        report.confirmed_novel
    ));
    output.push_str(&format!("Quarantined candidates: {}\n", report.quarantined));
    output.push_str(&format!(
        "Crashed replays:        {}\n",
        report.crashed_replays
    ));
    output.push_str(&format!("Strategy:               {}\n", report.strategy));
    output.push_str(&format!("Elapsed:                {:?}\n", report.elapsed));
    output.push_str("\n");

    // Surviving candidates
    if !report.population.is_empty() {
        output
            .push_str("─── Final Frontier ─────────────────────────────────────────────────────\n");
        for (i, individual) in report.population.iter().enumerate() {
            output.push_str(&format!("\n{}. Candidate\n", i + 1));
            output.push_str(&format_individual(individual));
        }
        output.push('\n');
    } else {
        output
            .push_str("─── Empty Frontier ─────────────────────────────────────────────────────\n");
        output.push_str("No candidate configuration survived selection.\n\n");
    }

    output.push_str("═══════════════════════════════════════════════════════════════════════\n");

    output
}

/// Format one surviving candidate with its fitness and mutation lineage.
pub fn format_individual(individual: &Individual) -> String {
    let mut output = String::new();

    match individual.fitness {
        Some(fitness) => {
            output.push_str(&format!(
                "   Confirmed novel: {}\n",
                fitness.confirmed_novel
            ));
            output.push_str(&format!(
                "   Violation kinds: {}\n",
                fitness.distinct_kinds
            ));
            output.push_str(&format!("   Branch count:    {}\n", fitness.branch_count));
            output.push_str(&format!("   Sinuosity:       {:.3}\n", fitness.sinuosity));
        }
        None => output.push_str("   Fitness:         not evaluated\n"),
    }

    let lineage = individual.config.lineage();
    output.push_str(&format!("   Mutations:       {}\n", lineage.len()));
    for (i, mutation) in lineage.iter().take(10).enumerate() {
        output.push_str(&format!(
            "     [{}] option {}: {} -> {} ({})\n",
            i + 1,
            mutation.option_id,
            mutation.previous,
            mutation.next,
            mutation.operator
        ));
    }
    if lineage.len() > 10 {
        output.push_str(&format!(
            "     ... and {} more mutations\n",
            lineage.len() - 10
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::Fitness;
    use confdrift_config::{ConfigModel, Configuration};
    use serde_json::json;
    use std::time::Duration;

    fn model() -> ConfigModel {
        ConfigModel::from_tree(json!({
            "control": { "lookahead": 2.5 },
            "planning": { "replan": true }
        }))
        .unwrap()
    }

    fn survivor(confirmed: f64) -> Individual {
        let config =
            Configuration::defaults(&model()).with_value(0, "9.5".to_string(), "numeric-draw");
        let mut individual = Individual::new(config);
        individual.fitness = Some(Fitness {
            confirmed_novel: confirmed,
            distinct_kinds: 2.0,
            branch_count: 14.0,
            sinuosity: 1.042,
        });
        individual
    }

    fn report(population: Vec<Individual>) -> CampaignReport {
        CampaignReport {
            generations: 12,
            total_replays: 420,
            confirmed_novel: 3,
            quarantined: 1,
            crashed_replays: 2,
            population,
            strategy: "evolutionary",
            elapsed: Duration::from_secs(90),
        }
    }

    #[test]
    fn test_format_report_empty_frontier() {
        let formatted = format_campaign_report(&report(vec![]));
        assert!(formatted.contains("Generations completed:  12"));
        assert!(formatted.contains("Confirmed novel:        3"));
        assert!(formatted.contains("Strategy:               evolutionary"));
        assert!(formatted.contains("Empty Frontier"));
        assert!(formatted.contains("No candidate configuration survived selection."));
    }

    #[test]
    fn test_format_report_lists_survivors() {
        let formatted = format_campaign_report(&report(vec![survivor(1.0), survivor(2.0)]));
        assert!(formatted.contains("Final Frontier"));
        assert!(formatted.contains("1. Candidate"));
        assert!(formatted.contains("2. Candidate"));
        assert!(formatted.contains("Confirmed novel: 2"));
    }

    #[test]
    fn test_format_individual_shows_lineage() {
        let formatted = format_individual(&survivor(1.0));
        assert!(formatted.contains("Mutations:       1"));
        assert!(formatted.contains("[1] option 0: 2.5 -> 9.5 (numeric-draw)"));
        assert!(formatted.contains("Sinuosity:       1.042"));
    }

    #[test]
    fn test_format_individual_without_fitness() {
        let individual = Individual::new(Configuration::defaults(&model()));
        let formatted = format_individual(&individual);
        assert!(formatted.contains("Fitness:         not evaluated"));
        assert!(formatted.contains("Mutations:       0"));
    }

    #[test]
    fn test_format_individual_truncates_long_lineage() {
        let mut config = Configuration::defaults(&model());
        for i in 0..15 {
            config = config.with_value(0, format!("{i}.0"), "numeric-draw");
        }
        let formatted = format_individual(&Individual::new(config));
        assert!(formatted.contains("Mutations:       15"));
        assert!(formatted.contains("... and 5 more mutations"));
    }
}
