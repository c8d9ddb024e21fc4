//! Output formatting for CLI commands: JSON, YAML or a plain key/value table.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

use crate::cert::CertificateInfo;
use crate::config::{format_duration, CertificatePolicy};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
}

/// Something that can be shown as `key: value` rows
pub trait TableRows {
    fn rows(&self) -> Vec<(&'static str, String)>;
}

/// Print data in the selected format
pub fn print_output<T: Serialize + TableRows>(data: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(data),
        OutputFormat::Yaml => print_yaml(data),
        OutputFormat::Table => {
            print_table(data);
            Ok(())
        }
    }
}

/// Print data as JSON
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

/// Print data as YAML
pub fn print_yaml<T: Serialize>(data: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(data).context("Failed to serialize to YAML")?;
    print!("{}", yaml);
    Ok(())
}

fn print_table<T: TableRows>(data: &T) {
    let rows = data.rows();
    let width = rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    for (key, value) in rows {
        println!("{:<width$}  {}", key, value, width = width);
    }
}

/// Certificate details plus the renewal decision under a policy
#[derive(Debug, Serialize)]
pub struct CertificateSummary {
    pub name: String,
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: String,
    pub not_after: String,
    pub remaining: String,
    pub renew_before: String,
    pub renewal_due: bool,
}

impl CertificateSummary {
    pub fn new(name: &str, info: &CertificateInfo, policy: &CertificatePolicy) -> Self {
        let remaining = info.remaining_validity();
        let remaining_std = std::time::Duration::try_from(remaining).unwrap_or_default();
        Self {
            name: name.to_string(),
            subject: info.subject.clone(),
            issuer: info.issuer.clone(),
            serial: info.serial.clone(),
            not_before: format_time(info.not_before),
            not_after: format_time(info.not_after),
            remaining: if remaining.is_negative() { "expired".to_string() } else { format_duration(remaining_std) },
            renew_before: format_duration(policy.renew_before),
            renewal_due: remaining_std <= policy.renew_before,
        }
    }
}

fn format_time(value: time::OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

impl TableRows for CertificateSummary {
    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("subject", self.subject.clone()),
            ("issuer", self.issuer.clone()),
            ("serial", self.serial.clone()),
            ("not before", self.not_before.clone()),
            ("not after", self.not_after.clone()),
            ("remaining", self.remaining.clone()),
            ("renew before", self.renew_before.clone()),
            ("renewal due", self.renewal_due.to_string()),
        ]
    }
}

/// Public view of the stored identity. Key material is never printed.
#[derive(Debug, Serialize)]
pub struct IdentitySummary {
    pub backend: String,
    pub email: String,
    pub key_type: String,
    pub private_key_present: bool,
}

impl TableRows for IdentitySummary {
    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("backend", self.backend.clone()),
            ("email", self.email.clone()),
            ("key type", self.key_type.clone()),
            ("private key", if self.private_key_present { "present" } else { "absent" }.to_string()),
        ]
    }
}

/// Summary of a validated configuration file
#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    pub acme_server: String,
    pub email: String,
    pub state_backend: String,
    pub validators: Vec<String>,
    pub certs: Vec<String>,
}

impl TableRows for ConfigSummary {
    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("acme server", self.acme_server.clone()),
            ("email", self.email.clone()),
            ("state backend", self.state_backend.clone()),
            ("validators", self.validators.join(", ")),
            ("certs", self.certs.join(", ")),
        ]
    }
}
