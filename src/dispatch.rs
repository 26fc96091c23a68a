use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::should_alert;
use crate::channel::SendChannel;
use crate::error::{ConfigurationError, DispatchError, StoreError};
use crate::ledger::HistoryLedger;
use crate::models::{
    AnalysisResult, Channel, DeliveryStatus, DiseaseCount, Member, NotificationRecord,
};
use crate::store::KeyValueStore;
use crate::template::{self, Template, TemplateVars, DISEASE_ALERT};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub recipient: Member,
    pub success: bool,
    pub error: Option<String>,
    pub notification_id: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub channel: Channel,
    /// One entry per recipient, in input order.
    pub outcomes: Vec<DispatchOutcome>,
}

impl BatchReport {
    pub fn total_sent(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn total_failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertReport {
    pub disease: DiseaseCount,
    pub batch: BatchReport,
}

/// Sends `template` to each recipient in turn, awaiting every send and
/// recording it in `ledger` before moving on. A failed send is recorded
/// and the batch continues; only a ledger failure stops it.
pub async fn dispatch_bulk<C, S>(
    recipients: &[Member],
    template: &Template,
    channel: Channel,
    sender: &C,
    ledger: &HistoryLedger<S>,
) -> Result<BatchReport, DispatchError>
where
    C: SendChannel,
    S: KeyValueStore,
{
    let batch_id = Uuid::new_v4();
    tracing::info!(batch_id = %batch_id, channel = %channel, recipients = recipients.len(), "dispatch started");

    let mut outcomes = Vec::with_capacity(recipients.len());
    for member in recipients {
        outcomes.push(deliver(batch_id, member, template, None, channel, sender, ledger).await?);
    }

    Ok(finish(batch_id, channel, outcomes))
}

/// Like [`dispatch_bulk`] but keeps up to `concurrency` sends in flight.
/// Outcomes stay in input order; ledger entries land in completion order.
pub async fn dispatch_bulk_buffered<C, S>(
    recipients: &[Member],
    template: &Template,
    channel: Channel,
    sender: &C,
    ledger: &HistoryLedger<S>,
    concurrency: usize,
) -> Result<BatchReport, DispatchError>
where
    C: SendChannel,
    S: KeyValueStore,
{
    run_buffered(recipients, template, None, channel, sender, ledger, concurrency).await
}

/// Tells the whole roster about the most common disease of `analysis`
/// using the built-in alert template for `channel`.
pub async fn dispatch_disease_alert<C, S>(
    roster: &[Member],
    analysis: &AnalysisResult,
    channel: Channel,
    sender: &C,
    ledger: &HistoryLedger<S>,
    concurrency: usize,
) -> Result<AlertReport, DispatchError>
where
    C: SendChannel,
    S: KeyValueStore,
{
    let top = analysis
        .most_common_disease
        .as_ref()
        .ok_or(ConfigurationError::NoDiseaseData)?;
    let template = template::builtin(channel, DISEASE_ALERT)?;

    tracing::info!(
        disease = %top.disease,
        percentage = top.percentage,
        "sending disease alert"
    );
    let batch = run_buffered(roster, &template, Some(top), channel, sender, ledger, concurrency).await?;

    Ok(AlertReport {
        disease: top.clone(),
        batch,
    })
}

/// Runs [`dispatch_disease_alert`] when the most common disease reaches
/// `threshold` percent of members. Below it nothing is sent.
pub async fn alert_if_prevalent<C, S>(
    roster: &[Member],
    analysis: &AnalysisResult,
    threshold: f64,
    channel: Channel,
    sender: &C,
    ledger: &HistoryLedger<S>,
    concurrency: usize,
) -> Result<Option<AlertReport>, DispatchError>
where
    C: SendChannel,
    S: KeyValueStore,
{
    if !should_alert(analysis, threshold) {
        tracing::debug!(threshold, "no disease at alert threshold");
        return Ok(None);
    }

    dispatch_disease_alert(roster, analysis, channel, sender, ledger, concurrency)
        .await
        .map(Some)
}

async fn run_buffered<C, S>(
    recipients: &[Member],
    template: &Template,
    alert: Option<&DiseaseCount>,
    channel: Channel,
    sender: &C,
    ledger: &HistoryLedger<S>,
    concurrency: usize,
) -> Result<BatchReport, DispatchError>
where
    C: SendChannel,
    S: KeyValueStore,
{
    let batch_id = Uuid::new_v4();
    tracing::info!(
        batch_id = %batch_id,
        channel = %channel,
        recipients = recipients.len(),
        concurrency,
        "dispatch started"
    );

    let outcomes: Vec<DispatchOutcome> = futures::stream::iter(recipients)
        .map(|member| deliver(batch_id, member, template, alert, channel, sender, ledger))
        .buffered(concurrency.max(1))
        .try_collect::<Vec<_>>()
        .await?;

    Ok(finish(batch_id, channel, outcomes))
}

async fn deliver<C, S>(
    batch_id: Uuid,
    member: &Member,
    template: &Template,
    alert: Option<&DiseaseCount>,
    channel: Channel,
    sender: &C,
    ledger: &HistoryLedger<S>,
) -> Result<DispatchOutcome, StoreError>
where
    C: SendChannel,
    S: KeyValueStore,
{
    let mut vars = TemplateVars::for_member(member);
    if let Some(top) = alert {
        vars = vars.with_alert(top);
    }
    let rendered = template::render(template, &vars);
    let address = channel.address_of(member);

    let result = sender.send(channel, address, &rendered).await;
    let error = result.err().map(|err| err.to_string());
    if let Some(reason) = &error {
        tracing::warn!(batch_id = %batch_id, member = %member.id, to = address, %reason, "send failed");
    }

    let sent_at = Utc::now();
    let record = ledger
        .append(NotificationRecord {
            id: sent_at.timestamp_millis(),
            to: address.to_string(),
            subject: rendered.subject,
            content: rendered.body,
            timestamp: sent_at,
            status: if error.is_none() {
                DeliveryStatus::Sent
            } else {
                DeliveryStatus::Failed
            },
            channel,
            error: error.clone(),
            batch_id: Some(batch_id),
        })
        .await?;

    Ok(DispatchOutcome {
        recipient: member.clone(),
        success: error.is_none(),
        error,
        notification_id: record.id,
    })
}

fn finish(batch_id: Uuid, channel: Channel, outcomes: Vec<DispatchOutcome>) -> BatchReport {
    let report = BatchReport {
        batch_id,
        channel,
        outcomes,
    };
    tracing::info!(
        batch_id = %batch_id,
        sent = report.total_sent(),
        failed = report.total_failed(),
        "dispatch finished"
    );
    report
}
