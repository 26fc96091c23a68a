use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::models::{Channel, DiseaseCount, Member};

/// Placeholder names recognized inside `{{...}}`.
pub const PLACEHOLDERS: [&str; 5] = ["name", "policyNumber", "email", "disease", "percentage"];

pub const DISEASE_ALERT: &str = "disease_alert";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub subject: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub subject: Option<String>,
    pub body: String,
}

/// Values available to a template. A `None` leaves its placeholder as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateVars {
    pub name: Option<String>,
    pub policy_number: Option<String>,
    pub email: Option<String>,
    pub disease: Option<String>,
    pub percentage: Option<String>,
}

impl TemplateVars {
    pub fn for_member(member: &Member) -> Self {
        Self {
            name: non_empty(&member.name),
            policy_number: non_empty(&member.policy_number),
            email: non_empty(&member.email),
            ..Self::default()
        }
    }

    pub fn with_alert(mut self, top: &DiseaseCount) -> Self {
        self.disease = Some(top.disease.clone());
        self.percentage = Some(format!("{:.1}", top.percentage));
        self
    }

    fn value(&self, placeholder: &str) -> Option<&str> {
        match placeholder {
            "name" => self.name.as_deref(),
            "policyNumber" => self.policy_number.as_deref(),
            "email" => self.email.as_deref(),
            "disease" => self.disease.as_deref(),
            "percentage" => self.percentage.as_deref(),
            _ => None,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn render(template: &Template, vars: &TemplateVars) -> RenderedMessage {
    RenderedMessage {
        subject: template.subject.as_deref().map(|s| substitute(s, vars)),
        body: substitute(&template.body, vars),
    }
}

fn substitute(text: &str, vars: &TemplateVars) -> String {
    let mut rendered = text.to_string();
    for placeholder in PLACEHOLDERS {
        if let Some(value) = vars.value(placeholder) {
            rendered = rendered.replace(&format!("{{{{{placeholder}}}}}"), value);
        }
    }
    rendered
}

pub fn builtin_keys(channel: Channel) -> &'static [&'static str] {
    match channel {
        Channel::Email => &["welcome", "coverage_notification", "health_reminder", DISEASE_ALERT],
        Channel::Sms => &["coverage_notification", "health_reminder", DISEASE_ALERT, "welcome"],
    }
}

/// Looks up a built-in template. Unknown keys fail rather than sending an
/// empty message.
pub fn builtin(channel: Channel, key: &str) -> Result<Template, ConfigurationError> {
    let (subject, body) = match (channel, key) {
        (Channel::Email, "welcome") => (Some("Welcome to Our Insurance Program"), EMAIL_WELCOME),
        (Channel::Email, "coverage_notification") => {
            (Some("Insurance Coverage Confirmation"), EMAIL_COVERAGE)
        }
        (Channel::Email, "health_reminder") => (Some("Health Checkup Reminder"), EMAIL_REMINDER),
        (Channel::Email, DISEASE_ALERT) => {
            (Some("Your coverage for {{disease}}"), EMAIL_DISEASE_ALERT)
        }
        (Channel::Sms, "coverage_notification") => (None, SMS_COVERAGE),
        (Channel::Sms, "health_reminder") => (None, SMS_REMINDER),
        (Channel::Sms, DISEASE_ALERT) => (None, SMS_DISEASE_ALERT),
        (Channel::Sms, "welcome") => (None, SMS_WELCOME),
        _ => {
            return Err(ConfigurationError::UnknownTemplate {
                channel,
                key: key.to_string(),
            })
        }
    };

    Ok(Template {
        subject: subject.map(str::to_string),
        body: body.to_string(),
    })
}

/// Replaces the subject and/or body of `template` with operator text. Blank
/// overrides keep the catalog text; SMS templates never carry a subject.
pub fn with_overrides(
    mut template: Template,
    channel: Channel,
    subject: Option<&str>,
    body: Option<&str>,
) -> Result<Template, ConfigurationError> {
    if let Some(subject) = subject.filter(|s| !s.trim().is_empty()) {
        template.subject = Some(subject.to_string());
    }
    if let Some(body) = body.filter(|b| !b.trim().is_empty()) {
        template.body = body.to_string();
    }
    if channel == Channel::Sms {
        template.subject = None;
    }
    if template.body.trim().is_empty() {
        return Err(ConfigurationError::EmptyTemplate);
    }
    Ok(template)
}

const EMAIL_WELCOME: &str = "Dear {{name}},

Welcome to our comprehensive insurance program! We're excited to have you as a member.

Your Policy Details:
- Policy Number: {{policyNumber}}
- Email: {{email}}

You are now covered under our insurance plan. Our team is here to support you with any questions or concerns.

Best regards,
Insurance Admin Team";

const EMAIL_COVERAGE: &str = "Dear {{name}},

This is to confirm that you are covered under our insurance program.

Policy Information:
- Policy Number: {{policyNumber}}
- Coverage Status: Active
- Contact Email: {{email}}

If you have any questions about your coverage, please don't hesitate to contact our support team.

Best regards,
Insurance Admin Team";

const EMAIL_REMINDER: &str = "Dear {{name}},

As part of our commitment to your wellbeing, we would like to remind you about the importance of regular health checkups.

Your insurance policy ({{policyNumber}}) covers annual health screenings and preventive care.

Please schedule your checkup at your earliest convenience.

Best regards,
Insurance Admin Team";

const EMAIL_DISEASE_ALERT: &str = "Dear {{name}},

Recent analysis of member health data shows {{percentage}}% prevalence of {{disease}}.

There is no need to worry: your policy {{policyNumber}} provides full coverage for {{disease}} treatment. We encourage you to schedule a preventive checkup.

Best regards,
Insurance Admin Team";

const SMS_COVERAGE: &str = "Hi {{name}}, your insurance policy {{policyNumber}} is active and you are fully covered. Contact us for any questions. - Insurance Admin";

const SMS_REMINDER: &str = "Hello {{name}}, time for your annual health checkup! Your insurance policy {{policyNumber}} covers preventive care. Schedule today. - Insurance Admin";

const SMS_DISEASE_ALERT: &str = "Good News! We cover {{disease}} treatment. Recent data shows {{percentage}}% prevalence. Don't panic - your policy {{policyNumber}} provides full coverage for {{disease}}. Schedule checkup today. - Insurance Admin";

const SMS_WELCOME: &str = "Welcome {{name}}! Your insurance policy {{policyNumber}} is now active. You are covered for comprehensive healthcare. - Insurance Admin";

#[cfg(test)]
mod tests {
    use super::*;

    fn priya() -> Member {
        Member {
            id: "1".to_string(),
            name: "Priya".to_string(),
            email: "priya@example.com".to_string(),
            phone: "+15550100".to_string(),
            policy_number: "POL-001".to_string(),
            ..Member::default()
        }
    }

    #[test]
    fn replaces_every_occurrence() {
        let template = Template {
            subject: Some("For {{name}}".to_string()),
            body: "{{name}}, hello {{name}} ({{policyNumber}})".to_string(),
        };
        let rendered = render(&template, &TemplateVars::for_member(&priya()));

        assert_eq!(rendered.subject.as_deref(), Some("For Priya"));
        assert_eq!(rendered.body, "Priya, hello Priya (POL-001)");
    }

    #[test]
    fn missing_values_leave_placeholders_literal() {
        let template = Template {
            subject: None,
            body: "{{name}} / {{disease}} / {{percentage}}% / {{unknown}}".to_string(),
        };
        let member = Member {
            name: "Priya".to_string(),
            ..Member::default()
        };
        let rendered = render(&template, &TemplateVars::for_member(&member));

        assert_eq!(rendered.body, "Priya / {{disease}} / {{percentage}}% / {{unknown}}");
        assert_eq!(rendered.subject, None);
    }

    #[test]
    fn alert_vars_format_percentage_with_one_decimal() {
        let top = DiseaseCount {
            disease: "Asthma".to_string(),
            count: 2,
            percentage: 40.0,
        };
        let template = builtin(Channel::Sms, DISEASE_ALERT).unwrap();
        let rendered = render(&template, &TemplateVars::for_member(&priya()).with_alert(&top));

        assert!(rendered.body.starts_with("Good News! We cover Asthma treatment. Recent data shows 40.0% prevalence."));
        assert!(rendered.body.contains("policy POL-001"));
        assert!(!rendered.body.contains("{{"));
    }

    #[test]
    fn every_listed_builtin_resolves() {
        for channel in [Channel::Email, Channel::Sms] {
            for key in builtin_keys(channel) {
                let template = builtin(channel, key).unwrap();
                assert_eq!(template.subject.is_some(), channel == Channel::Email);
            }
        }
    }

    #[test]
    fn unknown_template_fails_fast() {
        let err = builtin(Channel::Email, "promo").unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownTemplate {
                channel: Channel::Email,
                key: "promo".to_string()
            }
        );
    }

    #[test]
    fn overrides_replace_fields_and_reject_empty_body() {
        let base = builtin(Channel::Email, "welcome").unwrap();
        let custom = with_overrides(base.clone(), Channel::Email, Some("Hi"), Some("  ")).unwrap();
        assert_eq!(custom.subject.as_deref(), Some("Hi"));
        assert_eq!(custom.body, base.body);

        let sms = with_overrides(base, Channel::Sms, Some("ignored"), Some("Hey {{name}}")).unwrap();
        assert_eq!(sms.subject, None);
        assert_eq!(sms.body, "Hey {{name}}");

        let empty = Template {
            subject: None,
            body: String::new(),
        };
        assert_eq!(
            with_overrides(empty, Channel::Sms, None, None).unwrap_err(),
            ConfigurationError::EmptyTemplate
        );
    }
}
