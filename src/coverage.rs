use chrono::{DateTime, Utc};

use crate::error::{CoverageError, StoreError};
use crate::models::CoveredDisease;
use crate::store::{KeyValueStore, COVERAGE_KEY};

pub const DEFAULT_COVERED: [&str; 10] = [
    "Hypertension",
    "Diabetes",
    "Heart Disease",
    "Asthma",
    "Cancer",
    "Stroke",
    "Kidney Disease",
    "Arthritis",
    "Mental Health Disorders",
    "Cholesterol",
];

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added(CoveredDisease),
    AlreadyCovered(CoveredDisease),
}

/// Operator-maintained list of diseases the policy covers.
pub struct CoverageList<'a, S> {
    store: &'a S,
}

impl<'a, S: KeyValueStore> CoverageList<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Current list; an empty or missing list is replaced by the defaults.
    pub async fn load(&self) -> Result<Vec<CoveredDisease>, CoverageError> {
        let stored: Vec<CoveredDisease> = match self.store.get(COVERAGE_KEY).await? {
            Some(value) => serde_json::from_value(value).map_err(StoreError::from)?,
            None => Vec::new(),
        };
        if !stored.is_empty() {
            return Ok(stored);
        }

        let now = Utc::now();
        let defaults: Vec<CoveredDisease> = DEFAULT_COVERED
            .iter()
            .zip(1..)
            .map(|(name, id)| CoveredDisease {
                id,
                name: name.to_string(),
                added_date: now,
            })
            .collect();
        self.save(&defaults).await?;
        tracing::info!(count = defaults.len(), "seeded default coverage list");
        Ok(defaults)
    }

    pub async fn add(&self, name: &str) -> Result<AddOutcome, CoverageError> {
        let name = validated(name)?;
        let mut diseases = self.load().await?;

        if let Some(existing) = diseases.iter().find(|d| d.name.eq_ignore_ascii_case(name)) {
            return Ok(AddOutcome::AlreadyCovered(existing.clone()));
        }

        let added_date = Utc::now();
        let disease = CoveredDisease {
            id: next_id(&diseases, added_date),
            name: name.to_string(),
            added_date,
        };
        diseases.push(disease.clone());
        self.save(&diseases).await?;
        Ok(AddOutcome::Added(disease))
    }

    pub async fn remove(&self, id: i64) -> Result<CoveredDisease, CoverageError> {
        let mut diseases = self.load().await?;
        let position = diseases
            .iter()
            .position(|d| d.id == id)
            .ok_or(CoverageError::NotFound(id))?;

        let removed = diseases.remove(position);
        self.save(&diseases).await?;
        Ok(removed)
    }

    pub async fn rename(&self, id: i64, name: &str) -> Result<CoveredDisease, CoverageError> {
        let name = validated(name)?;
        let mut diseases = self.load().await?;
        let disease = diseases
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(CoverageError::NotFound(id))?;

        disease.name = name.to_string();
        let renamed = disease.clone();
        self.save(&diseases).await?;
        Ok(renamed)
    }

    pub async fn is_covered(&self, name: &str) -> Result<bool, CoverageError> {
        let name = name.trim();
        Ok(self
            .load()
            .await?
            .iter()
            .any(|d| d.name.eq_ignore_ascii_case(name)))
    }

    async fn save(&self, diseases: &[CoveredDisease]) -> Result<(), StoreError> {
        let value = serde_json::to_value(diseases)?;
        self.store.set(COVERAGE_KEY, value).await
    }
}

fn validated(name: &str) -> Result<&str, CoverageError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoverageError::EmptyName);
    }
    Ok(trimmed)
}

/// Time-derived id, kept above every existing id.
fn next_id(diseases: &[CoveredDisease], now: DateTime<Utc>) -> i64 {
    let newest = diseases.iter().map(|d| d.id).max().unwrap_or(0);
    now.timestamp_millis().max(newest + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn first_load_seeds_defaults() {
        let store = MemoryStore::new();
        let coverage = CoverageList::new(&store);

        let diseases = coverage.load().await.unwrap();
        assert_eq!(diseases.len(), DEFAULT_COVERED.len());
        assert_eq!(diseases[0].id, 1);
        assert_eq!(diseases[9].name, "Cholesterol");
        assert!(store.get(COVERAGE_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn add_trims_and_rejects_duplicates_case_insensitively() {
        let store = MemoryStore::new();
        let coverage = CoverageList::new(&store);

        let added = coverage.add("  Gout ").await.unwrap();
        let AddOutcome::Added(gout) = added else {
            panic!("expected Gout to be added");
        };
        assert_eq!(gout.name, "Gout");

        assert!(matches!(
            coverage.add("asthma").await.unwrap(),
            AddOutcome::AlreadyCovered(existing) if existing.name == "Asthma"
        ));
        assert!(matches!(coverage.add("   ").await, Err(CoverageError::EmptyName)));
        assert_eq!(coverage.load().await.unwrap().len(), DEFAULT_COVERED.len() + 1);
        assert!(coverage.is_covered("GOUT").await.unwrap());
    }

    #[tokio::test]
    async fn remove_and_rename_by_id() {
        let store = MemoryStore::new();
        let coverage = CoverageList::new(&store);
        coverage.load().await.unwrap();

        let renamed = coverage.rename(2, "Type 2 Diabetes").await.unwrap();
        assert_eq!(renamed.name, "Type 2 Diabetes");
        assert!(!coverage.is_covered("Diabetes").await.unwrap());

        let removed = coverage.remove(1).await.unwrap();
        assert_eq!(removed.name, "Hypertension");
        assert!(matches!(coverage.remove(1).await, Err(CoverageError::NotFound(1))));
        assert!(matches!(coverage.rename(3, " ").await, Err(CoverageError::EmptyName)));
    }
}
