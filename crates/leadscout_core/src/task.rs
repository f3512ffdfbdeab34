use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Backend-issued job identifier. The backend may send a number or a string;
/// it is echoed back in the same form on completion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobId {
    Numeric(u64),
    Text(String),
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobId::Numeric(id) => write!(f, "{id}"),
            JobId::Text(id) => f.write_str(id),
        }
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        JobId::Numeric(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        JobId::Text(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Domain,
    Name,
}

/// Department of the role a task is hiring for. Unknown labels map to `General`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Department {
    Engineering,
    Marketing,
    Sales,
    Design,
    Hr,
    #[default]
    General,
}

impl Department {
    pub const ALL: [Department; 6] = [
        Department::Engineering,
        Department::Marketing,
        Department::Sales,
        Department::Design,
        Department::Hr,
        Department::General,
    ];

    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|department| department.label().eq_ignore_ascii_case(label))
            .unwrap_or(Department::General)
    }

    pub fn label(self) -> &'static str {
        match self {
            Department::Engineering => "Engineering",
            Department::Marketing => "Marketing",
            Department::Sales => "Sales",
            Department::Design => "Design",
            Department::Hr => "HR",
            Department::General => "General",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Department {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Department {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(label
            .as_deref()
            .map(Department::from_label)
            .unwrap_or_default())
    }
}

/// A "find HR contacts at company X" work item handed out by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub job_id: JobId,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_domain: Option<String>,
    #[serde(default)]
    pub department: Department,
    #[serde(default)]
    pub search_mode: SearchMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
}

impl Task {
    pub fn new(job_id: impl Into<JobId>, company: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            company: company.into(),
            company_domain: None,
            department: Department::General,
            search_mode: SearchMode::Domain,
            job_title: None,
            job_description: None,
        }
    }

    /// Domain to filter on, if this task searches by domain and has a usable one.
    pub fn domain_filter(&self) -> Option<&str> {
        if self.search_mode != SearchMode::Domain {
            return None;
        }
        self.company_domain
            .as_deref()
            .map(str::trim)
            .filter(|domain| !domain.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub name: String,
    pub title: String,
    pub company: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub email: String,
}

impl Contact {
    pub fn has_valid_email(&self) -> bool {
        is_plausible_email(&self.email)
    }
}

/// Accepts a string, `null`, or an explicit option; missing values become "".
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    struct EmailVisitor;

    impl<'de> Visitor<'de> for EmailVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an email string or null")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_string<E: de::Error>(self, value: String) -> Result<String, E> {
            Ok(value)
        }

        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }

        fn visit_some<D: Deserializer<'de>>(self, inner: D) -> Result<String, D::Error> {
            inner.deserialize_any(self)
        }
    }

    deserializer.deserialize_any(EmailVisitor)
}

/// Minimal syntactic check: a non-empty local part, then a domain with a `.`
/// that is not its last character.
pub fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Found,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub job_id: JobId,
    pub contacts: Vec<Contact>,
    pub status: ResultStatus,
}

impl TaskResult {
    /// Builds the result for `job_id`, dropping contacts without a usable email.
    pub fn new(job_id: JobId, contacts: Vec<Contact>) -> Self {
        let contacts: Vec<Contact> = contacts
            .into_iter()
            .filter(Contact::has_valid_email)
            .collect();
        let status = if contacts.is_empty() {
            ResultStatus::NotFound
        } else {
            ResultStatus::Found
        };
        Self {
            job_id,
            contacts,
            status,
        }
    }
}
