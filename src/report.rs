use std::fmt::Write;

use crate::analysis::{self, CoverageMatch};
use crate::models::{AnalysisResult, CoveredDisease, NotificationRecord, NotificationStats};

pub struct ReportInput<'a> {
    pub source: &'a str,
    pub analysis: &'a AnalysisResult,
    pub skipped_rows: usize,
    pub coverage: &'a [CoveredDisease],
    pub stats: &'a NotificationStats,
    pub recent: &'a [NotificationRecord],
    pub alert_threshold: f64,
}

pub fn build_report(input: &ReportInput<'_>) -> String {
    let analysis = input.analysis;
    let matches = analysis::coverage_matches(analysis, input.coverage);

    let mut output = String::new();

    let _ = writeln!(output, "# Member Health Report");
    let _ = writeln!(
        output,
        "Generated from {} ({} members, {} distinct diseases)",
        input.source, analysis.total_members, analysis.unique_diseases
    );
    if input.skipped_rows > 0 {
        let _ = writeln!(output, "{} short rows were skipped while reading the file.", input.skipped_rows);
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Disease Mix");

    if matches.is_empty() {
        let _ = writeln!(output, "No diseases reported in this file.");
    } else {
        for entry in matches.iter() {
            let _ = writeln!(
                output,
                "- {}: {} members ({:.1}%){}",
                entry.disease,
                entry.count,
                entry.percentage,
                if entry.covered { "" } else { " (not covered)" }
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Alert Status");
    match &analysis.most_common_disease {
        Some(top) if analysis::should_alert(analysis, input.alert_threshold) => {
            let _ = writeln!(
                output,
                "{} affects {:.1}% of members, at or above the {:.1}% alert threshold.",
                top.disease, top.percentage, input.alert_threshold
            );
        }
        Some(top) => {
            let _ = writeln!(
                output,
                "Most common disease is {} at {:.1}%, below the {:.1}% alert threshold.",
                top.disease, top.percentage, input.alert_threshold
            );
        }
        None => {
            let _ = writeln!(output, "No disease data to evaluate.");
        }
    }

    let uncovered: Vec<&CoverageMatch> = matches.iter().filter(|m| !m.covered).collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Coverage Gaps");
    if uncovered.is_empty() {
        let _ = writeln!(output, "Every reported disease is on the coverage list.");
    } else {
        for entry in uncovered {
            let _ = writeln!(output, "- {} ({} members)", entry.disease, entry.count);
        }
    }

    let stats = input.stats;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Notifications");
    let _ = writeln!(
        output,
        "{} total ({} today): {} sent, {} failed; {} email, {} SMS",
        stats.total, stats.today, stats.successful, stats.failed, stats.emails, stats.sms
    );

    if !input.recent.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Recent Notifications");
        for record in input.recent.iter() {
            let _ = writeln!(
                output,
                "- {} {} to {} on {}",
                record.channel,
                record.status.as_str(),
                record.to,
                record.timestamp.format("%Y-%m-%d %H:%M")
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::models::{DiseaseField, NormalizedRecord};
    use chrono::Utc;

    fn record(id: usize, disease: &str) -> NormalizedRecord {
        NormalizedRecord {
            id: id.to_string(),
            name: format!("Member {id}"),
            email: format!("member{id}@email.com"),
            disease: DiseaseField::Text(disease.to_string()),
        }
    }

    #[test]
    fn report_flags_gaps_and_alert() {
        let analysis = analyze(vec![record(1, "Asthma"), record(2, "Asthma, Gout")]);
        let coverage = vec![CoveredDisease {
            id: 1,
            name: "Asthma".to_string(),
            added_date: Utc::now(),
        }];
        let stats = NotificationStats {
            total: 2,
            today: 2,
            successful: 1,
            failed: 1,
            emails: 0,
            sms: 2,
        };

        let report = build_report(&ReportInput {
            source: "upload.csv",
            analysis: &analysis,
            skipped_rows: 1,
            coverage: &coverage,
            stats: &stats,
            recent: &[],
            alert_threshold: 20.0,
        });

        assert!(report.contains("Generated from upload.csv (2 members, 2 distinct diseases)"));
        assert!(report.contains("1 short rows were skipped"));
        assert!(report.contains("- Asthma: 2 members (100.0%)\n"));
        assert!(report.contains("- Gout: 1 members (50.0%) (not covered)"));
        assert!(report.contains("Asthma affects 100.0% of members"));
        assert!(report.contains("2 total (2 today): 1 sent, 1 failed; 0 email, 2 SMS"));
        assert!(!report.contains("## Recent Notifications"));
    }

    #[test]
    fn empty_analysis_reports_no_data() {
        let analysis = analyze(Vec::new());
        let report = build_report(&ReportInput {
            source: "empty.json",
            analysis: &analysis,
            skipped_rows: 0,
            coverage: &[],
            stats: &NotificationStats::default(),
            recent: &[],
            alert_threshold: 20.0,
        });

        assert!(report.contains("No diseases reported in this file."));
        assert!(report.contains("No disease data to evaluate."));
        assert!(report.contains("Every reported disease is on the coverage list."));
    }
}
