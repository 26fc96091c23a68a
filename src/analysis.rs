use std::collections::HashMap;

use serde::Serialize;

use crate::models::{AnalysisResult, CoveredDisease, DiseaseCount, DiseaseField, NormalizedRecord};

pub const DEFAULT_ALERT_THRESHOLD: f64 = 20.0;

const IGNORED_TOKENS: [&str; 2] = ["none", "unknown"];

pub fn analyze(records: Vec<NormalizedRecord>) -> AnalysisResult {
    let total_members = records.len();
    // Insertion order is kept so equal counts rank by first appearance.
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for record in &records {
        for token in disease_tokens(&record.disease) {
            if is_ignored(&token) {
                continue;
            }

            match positions.get(&token) {
                Some(&index) => counts[index].1 += 1,
                None => {
                    positions.insert(token.clone(), counts.len());
                    counts.push((token, 1));
                }
            }
        }
    }

    let mut distribution: Vec<DiseaseCount> = if total_members == 0 {
        Vec::new()
    } else {
        counts
            .into_iter()
            .map(|(disease, count)| DiseaseCount {
                disease,
                count,
                percentage: percentage_of(count, total_members),
            })
            .collect()
    };
    distribution.sort_by(|a, b| b.count.cmp(&a.count));

    AnalysisResult {
        total_members,
        unique_diseases: distribution.len(),
        most_common_disease: distribution.first().cloned(),
        disease_distribution: distribution,
        member_data: records,
    }
}

/// Splits a raw disease field into tokens. Commas take precedence over
/// semicolons; list values are used as they are.
pub fn disease_tokens(field: &DiseaseField) -> Vec<String> {
    match field {
        DiseaseField::List(values) => values.clone(),
        DiseaseField::Text(text) => {
            let separator = if text.contains(',') {
                Some(',')
            } else if text.contains(';') {
                Some(';')
            } else {
                None
            };

            match separator {
                Some(separator) => text.split(separator).map(|t| t.trim().to_string()).collect(),
                None => vec![text.trim().to_string()],
            }
        }
    }
}

fn is_ignored(token: &str) -> bool {
    token.is_empty()
        || IGNORED_TOKENS
            .iter()
            .any(|ignored| token.eq_ignore_ascii_case(ignored))
}

fn percentage_of(count: usize, total: usize) -> f64 {
    let raw = count as f64 * 100.0 / total as f64;
    (raw * 10.0).round() / 10.0
}

pub fn should_alert(result: &AnalysisResult, threshold: f64) -> bool {
    result
        .most_common_disease
        .as_ref()
        .is_some_and(|top| top.percentage >= threshold)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageMatch {
    pub disease: String,
    pub count: usize,
    pub percentage: f64,
    pub covered: bool,
}

/// Pairs each ranked disease with whether the coverage list names it.
pub fn coverage_matches(result: &AnalysisResult, coverage: &[CoveredDisease]) -> Vec<CoverageMatch> {
    result
        .disease_distribution
        .iter()
        .map(|entry| CoverageMatch {
            disease: entry.disease.clone(),
            count: entry.count,
            percentage: entry.percentage,
            covered: coverage
                .iter()
                .any(|covered| covered.name.eq_ignore_ascii_case(&entry.disease)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: usize, disease: &str) -> NormalizedRecord {
        NormalizedRecord {
            id: id.to_string(),
            name: format!("Member {id}"),
            email: format!("member{id}@email.com"),
            disease: DiseaseField::Text(disease.to_string()),
        }
    }

    fn count_of(result: &AnalysisResult, disease: &str) -> Option<usize> {
        result
            .disease_distribution
            .iter()
            .find(|entry| entry.disease == disease)
            .map(|entry| entry.count)
    }

    #[test]
    fn two_members_two_diseases_split_evenly() {
        let result = analyze(vec![record(1, "Hypertension"), record(2, "Diabetes")]);

        assert_eq!(result.total_members, 2);
        assert_eq!(result.unique_diseases, 2);
        for entry in &result.disease_distribution {
            assert_eq!(entry.count, 1);
            assert_eq!(entry.percentage, 50.0);
        }
    }

    #[test]
    fn multi_disease_field_counts_each_token_against_member_total() {
        let result = analyze(vec![
            record(1, "Hypertension, Diabetes"),
            record(2, "Asthma;Diabetes"),
        ]);

        assert_eq!(count_of(&result, "Hypertension"), Some(1));
        assert_eq!(count_of(&result, "Diabetes"), Some(2));
        assert_eq!(count_of(&result, "Asthma;Diabetes"), None);
        assert_eq!(count_of(&result, "Asthma"), Some(1));

        let total: usize = result.disease_distribution.iter().map(|e| e.count).sum();
        assert!(total >= result.total_members);

        let top = result.most_common_disease.unwrap();
        assert_eq!(top.disease, "Diabetes");
        assert_eq!(top.percentage, 100.0);
    }

    #[test]
    fn none_and_unknown_are_excluded_but_still_counted_as_members() {
        let result = analyze(vec![
            record(1, "none"),
            record(2, "UNKNOWN"),
            record(3, "Asthma, None"),
            record(4, ""),
        ]);

        assert_eq!(result.total_members, 4);
        assert_eq!(result.unique_diseases, 1);
        assert_eq!(result.disease_distribution[0].percentage, 25.0);
    }

    #[test]
    fn list_fields_are_used_as_is() {
        let mut listed = record(1, "");
        listed.disease = DiseaseField::List(vec!["Cancer".to_string(), "Stroke".to_string()]);
        let result = analyze(vec![listed]);
        assert_eq!(result.unique_diseases, 2);
    }

    #[test]
    fn matching_is_case_sensitive() {
        let result = analyze(vec![record(1, "Diabetes"), record(2, "diabetes")]);
        assert_eq!(result.unique_diseases, 2);
    }

    #[test]
    fn ties_keep_first_encounter_order_and_percentages_round() {
        let result = analyze(vec![
            record(1, "Stroke"),
            record(2, "Asthma"),
            record(3, "Asthma"),
            record(4, "Cancer"),
            record(5, "Stroke"),
            record(6, "Arthritis"),
        ]);

        let order: Vec<&str> = result
            .disease_distribution
            .iter()
            .map(|e| e.disease.as_str())
            .collect();
        assert_eq!(order, vec!["Stroke", "Asthma", "Cancer", "Arthritis"]);
        assert_eq!(result.disease_distribution[0].percentage, 33.3);
        assert_eq!(result.disease_distribution[2].percentage, 16.7);
    }

    #[test]
    fn empty_input_yields_empty_distribution() {
        let result = analyze(Vec::new());
        assert_eq!(result.total_members, 0);
        assert!(result.disease_distribution.is_empty());
        assert!(result.most_common_disease.is_none());
        assert!(!should_alert(&result, DEFAULT_ALERT_THRESHOLD));
    }

    #[test]
    fn alert_threshold_is_inclusive() {
        let single = analyze(vec![
            record(1, "Asthma"),
            record(2, "A"),
            record(3, "B"),
            record(4, "C"),
            record(5, "D"),
        ]);
        assert_eq!(single.most_common_disease.as_ref().unwrap().percentage, 20.0);
        assert!(should_alert(&single, DEFAULT_ALERT_THRESHOLD));

        let below = analyze((1..=6).map(|i| record(i, &format!("D{i}"))).collect());
        assert_eq!(below.most_common_disease.as_ref().unwrap().percentage, 16.7);
        assert!(!should_alert(&below, DEFAULT_ALERT_THRESHOLD));
    }

    #[test]
    fn coverage_matches_ignore_case() {
        let result = analyze(vec![record(1, "asthma"), record(2, "Gout")]);
        let coverage = vec![CoveredDisease {
            id: 1,
            name: "Asthma".to_string(),
            added_date: Utc::now(),
        }];

        let matches = coverage_matches(&result, &coverage);
        assert!(matches[0].covered);
        assert!(!matches[1].covered);
    }
}
