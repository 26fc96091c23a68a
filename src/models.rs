use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Disease value as found in the source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiseaseField {
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub disease: DiseaseField,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseCount {
    pub disease: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub total_members: usize,
    pub unique_diseases: usize,
    pub most_common_disease: Option<DiseaseCount>,
    pub disease_distribution: Vec<DiseaseCount>,
    pub member_data: Vec<NormalizedRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
        }
    }

    /// Destination on `member` for this channel.
    pub fn address_of<'a>(&self, member: &'a Member) -> &'a str {
        match self {
            Self::Email => member.email.trim(),
            Self::Sms => member.phone.trim(),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: i64,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(alias = "message")]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryStatus,
    #[serde(alias = "type")]
    pub channel: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationStats {
    pub total: usize,
    pub today: usize,
    pub successful: usize,
    pub failed: usize,
    pub emails: usize,
    pub sms: usize,
}

/// Roster entry. Only the fields used for addressing and templating are
/// modeled; anything else in the roster file is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Member {
    #[serde(deserialize_with = "crate::roster::id_from_any")]
    pub id: String,
    #[serde(deserialize_with = "crate::roster::null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "crate::roster::null_as_default")]
    pub email: String,
    #[serde(deserialize_with = "crate::roster::null_as_default")]
    pub phone: String,
    #[serde(deserialize_with = "crate::roster::null_as_default")]
    pub policy_number: String,
    #[serde(deserialize_with = "crate::roster::null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "crate::roster::null_as_default")]
    pub premium_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoveredDisease {
    pub id: i64,
    pub name: String,
    pub added_date: DateTime<Utc>,
}
