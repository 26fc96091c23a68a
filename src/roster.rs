use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::Member;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSummary {
    pub total: usize,
    pub active: usize,
    pub pending: usize,
    pub total_premium: f64,
    pub avg_premium: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RosterFile {
    Wrapped { members: Vec<Member> },
    Bare(Vec<Member>),
}

pub fn load_roster(path: &Path) -> anyhow::Result<Vec<Member>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read roster {}", path.display()))?;
    let roster: RosterFile = serde_json::from_str(&text)
        .with_context(|| format!("roster {} is not a member list", path.display()))?;

    Ok(match roster {
        RosterFile::Wrapped { members } => members,
        RosterFile::Bare(members) => members,
    })
}

/// Accepts numeric or string ids.
pub(crate) fn id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(id) => id,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Treats an explicit `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Case-insensitive match on name, email, phone or policy number.
pub fn search<'a>(members: &'a [Member], term: &str) -> Vec<&'a Member> {
    let needle = term.trim().to_lowercase();
    members
        .iter()
        .filter(|m| {
            [&m.name, &m.email, &m.phone, &m.policy_number]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Members whose id is listed, in roster order, plus the ids that matched
/// nobody.
pub fn select(members: &[Member], ids: &[String]) -> (Vec<Member>, Vec<String>) {
    let selected = members
        .iter()
        .filter(|m| ids.contains(&m.id))
        .cloned()
        .collect();
    let missing = ids
        .iter()
        .filter(|id| !members.iter().any(|m| &m.id == *id))
        .cloned()
        .collect();
    (selected, missing)
}

pub fn summary(members: &[Member]) -> RosterSummary {
    let total = members.len();
    let with_status = |status: &str| {
        members
            .iter()
            .filter(|m| m.status.eq_ignore_ascii_case(status))
            .count()
    };
    let total_premium: f64 = members.iter().map(|m| m.premium_amount).sum();

    RosterSummary {
        total,
        active: with_status("active"),
        pending: with_status("pending"),
        total_premium,
        avg_premium: if total == 0 {
            0.0
        } else {
            (total_premium / total as f64).round()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ROSTER: &str = r#"{"members": [
        {"id": 1, "name": "Avery Lee", "email": "avery@example.com", "phone": "+15550101",
         "policyNumber": "POL-1001", "status": "Active", "premiumAmount": 250, "age": 41},
        {"id": "M-2", "name": "Jules Moreno", "email": "jules@example.com", "phone": "+15550102",
         "policyNumber": "POL-1002", "status": "Pending", "premiumAmount": 175.5},
        {"id": 3, "name": "Kiara Patel", "email": "kiara@example.com",
         "policyNumber": "POL-1003", "status": "Active"}
    ]}"#;

    fn roster_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_wrapped_roster_with_mixed_ids() {
        let file = roster_file(ROSTER);
        let members = load_roster(file.path()).unwrap();

        assert_eq!(members.len(), 3);
        assert_eq!(members[0].id, "1");
        assert_eq!(members[1].id, "M-2");
        assert_eq!(members[1].policy_number, "POL-1002");
        assert_eq!(members[2].phone, "");
    }

    #[test]
    fn loads_bare_array_roster() {
        let file = roster_file(r#"[{"id": 9, "name": "Solo"}]"#);
        let members = load_roster(file.path()).unwrap();
        assert_eq!(members[0].name, "Solo");
    }

    #[test]
    fn null_fields_fall_back_to_defaults() {
        let file = roster_file(
            r#"[{"id": 4, "name": "Noor", "email": null, "phone": null, "policyNumber": null,
                 "status": null, "premiumAmount": null}]"#,
        );
        let members = load_roster(file.path()).unwrap();

        assert_eq!(members[0].id, "4");
        assert_eq!(members[0].name, "Noor");
        assert_eq!(members[0].phone, "");
        assert_eq!(members[0].policy_number, "");
        assert_eq!(members[0].premium_amount, 0.0);
    }

    #[test]
    fn rejects_non_member_json() {
        let file = roster_file(r#"{"rows": 3}"#);
        assert!(load_roster(file.path()).is_err());
    }

    #[test]
    fn search_summary_and_select() {
        let file = roster_file(ROSTER);
        let members = load_roster(file.path()).unwrap();

        let found = search(&members, "pol-1003");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Kiara Patel");
        assert_eq!(search(&members, "EXAMPLE.COM").len(), 3);

        let stats = summary(&members);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.total_premium, 425.5);
        assert_eq!(stats.avg_premium, 142.0);

        let (selected, missing) = select(&members, &["3".to_string(), "99".to_string()]);
        assert_eq!(selected.len(), 1);
        assert_eq!(missing, vec!["99".to_string()]);
    }
}
