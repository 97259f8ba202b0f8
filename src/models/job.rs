//! Canonical job posting and the normalizer that builds it from raw
//! extraction output.

use serde::Serialize;
use serde_json::{Map, Value};

use super::team::Team;

/// Raw key/value record as returned by the extraction adapter.
pub type RawJob = Map<String, Value>;

/// Placeholder title for records that omit one.
pub const UNKNOWN_TITLE: &str = "Unknown Role";
/// Placeholder company for records that omit one.
pub const UNKNOWN_COMPANY: &str = "Unknown Studio";

/// A normalized job posting ready for routing.
///
/// Built once per raw record by [`Job::from_raw`] and never mutated. Only
/// its [`fingerprint`](Job::fingerprint) is ever persisted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Job {
    /// Role title.
    pub title: String,
    /// Hiring studio or company.
    pub company: String,
    /// Canonical posting URL; empty when unknown.
    pub url: String,
    /// Routing team; always canonical.
    pub team: Team,
    /// Free-form location.
    pub location: Option<String>,
    /// Remote / Hybrid / Onsite.
    pub work_model: Option<String>,
    /// Junior, Mid, Senior, ...
    pub seniority: Option<String>,
    /// Full-time, contract, ...
    pub contract_type: Option<String>,
    /// Whether remote work is possible, when stated.
    pub remote_friendly: Option<bool>,
    /// Salary or compensation text.
    pub compensation: Option<String>,
    /// Short description of the role.
    pub summary: Option<String>,
    /// Required skills, in extraction order.
    pub skills: Vec<String>,
    /// Titles the studio is known for, in extraction order.
    pub known_titles: Vec<String>,
}

impl Job {
    /// Normalize a raw extraction record. Never fails: every field has a
    /// safe default.
    ///
    /// A missing or blank `team` defaults to `others` before alias
    /// resolution, so the result always carries a canonical team.
    #[must_use]
    pub fn from_raw(raw: &RawJob) -> Self {
        let team_text = text_field(raw, "team").unwrap_or_else(|| Team::Others.as_str().to_owned());

        let mut known_titles = list_field(raw, "known_titles");
        if known_titles.is_empty() {
            known_titles = list_field(raw, "portfolio_titles");
        }

        Self {
            title: text_field(raw, "job_title").unwrap_or_else(|| UNKNOWN_TITLE.to_owned()),
            company: text_field(raw, "company_name").unwrap_or_else(|| UNKNOWN_COMPANY.to_owned()),
            url: first_text(raw, &["job_url", "source_url"]).unwrap_or_default(),
            team: Team::sanitize(&team_text),
            location: text_field(raw, "location"),
            work_model: text_field(raw, "work_model"),
            seniority: text_field(raw, "seniority"),
            contract_type: text_field(raw, "contract_type"),
            remote_friendly: bool_field(raw, "remote_friendly"),
            compensation: first_text(raw, &["compensation", "salary"]),
            summary: first_text(raw, &["description_summary", "highlights"]),
            skills: list_field(raw, "skills"),
            known_titles,
        }
    }

    /// Deduplication key for this job.
    ///
    /// With a URL: lowercased, fragment stripped, trailing slashes removed.
    /// Without one: `company|title|team` lowercased with empty parts
    /// omitted. `None` when neither a URL nor a company/title is present,
    /// meaning the job is never considered a duplicate.
    #[must_use]
    pub fn fingerprint(&self) -> Option<String> {
        let url = self.url.trim().to_lowercase();
        if !url.is_empty() {
            let without_fragment = url.split('#').next().unwrap_or_default();
            let key = without_fragment.trim_end_matches('/');
            return (!key.is_empty()).then(|| key.to_owned());
        }

        let company = self.company.trim().to_lowercase();
        let title = self.title.trim().to_lowercase();
        if company.is_empty() && title.is_empty() {
            return None;
        }
        let parts: Vec<&str> = [company.as_str(), title.as_str(), self.team.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect();
        Some(parts.join("|"))
    }

    /// The URL to cite when reporting on this job, if any.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        let url = self.url.trim();
        (!url.is_empty()).then_some(url)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_owned(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn text_field(raw: &RawJob, key: &str) -> Option<String> {
    raw.get(key).and_then(scalar_text)
}

fn first_text(raw: &RawJob, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text_field(raw, key))
}

fn bool_field(raw: &RawJob, key: &str) -> Option<bool> {
    match raw.get(key)? {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Coerce a comma-separated string or an array into a trimmed list.
fn list_field(raw: &RawJob, key: &str) -> Vec<String> {
    match raw.get(key) {
        Some(Value::String(text)) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_owned)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => {
                    let text = text.trim();
                    (!text.is_empty()).then(|| text.to_owned())
                }
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}
