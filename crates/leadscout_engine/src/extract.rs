//! Contact extraction from a rendered people-search page.
//!
//! Two selector profiles exist for the same page: one keyed on `data-cy`
//! attributes, one on ARIA rows plus `mailto:` links and title keywords.
//! Both report the same [`Contact`] records.

use std::collections::BTreeSet;
use std::sync::LazyLock;
use std::time::Duration;

use leadscout_core::{Contact, OrganizationFilter, Task};
use regex::Regex;
use scout_logging::{scout_debug, scout_info, scout_warn};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::page::{RevealControl, RevealTarget, SearchPage};
use crate::wait::{wait_for, WaitSettings};

const MAX_TITLE_LEN: usize = 60;
const MIN_TEXT_BLOCK_LEN: usize = 3;
const TITLE_KEYWORDS: &[&str] = &[
    "recruiter",
    "talent",
    "acquisition",
    "hr ",
    "human resources",
    "people",
    "staffing",
    "sourcing",
];
const COMPANY_STOPWORDS: &[&str] = &[
    "inc", "inc.", "llc", "ltd", "corp", "corporation", "company", "co", "the",
];

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("email pattern")
});

static TITLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)((?:senior\s+)?(?:technical\s+)?recruiter)",
        r"(?i)(talent\s+acquisition(?:\s+\w+)?)",
        r"(?i)(hr\s+manager)",
        r"(?i)(human\s+resources\s+\w+)",
        r"(?i)(recruiting\s+\w+)",
        r"(?i)(people\s+operations\s+\w+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("title pattern"))
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectorProfile {
    /// `[data-cy=...]` cells with an explicit access button.
    #[default]
    DataAttributes,
    /// `[role="row"]` rows, profile links, `mailto:` anchors.
    RoleRows,
}

/// CSS selectors used by a profile. Unstable by nature: they track the
/// scraped site's markup as observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorSet {
    pub row: &'static str,
    /// Leading rows that are table headers, not contacts.
    pub header_rows: usize,
    pub name: &'static str,
    pub title: Option<&'static str>,
    pub company: &'static str,
    pub email: Option<&'static str>,
    pub mailto: &'static str,
    pub reveal: &'static str,
    pub no_results: Option<&'static str>,
    pub loading: Option<&'static str>,
}

const REVEAL_LABELS: &[&str] = &["access email", "access"];

impl SelectorProfile {
    pub fn selectors(self) -> SelectorSet {
        match self {
            SelectorProfile::DataAttributes => SelectorSet {
                row: r#"[data-cy="people-row"]"#,
                header_rows: 0,
                name: r#"[data-cy="name-cell"]"#,
                title: Some(r#"[data-cy="title-cell"]"#),
                company: r#"[data-cy="account-name"]"#,
                email: Some(r#"[data-cy="email-value"]"#),
                mailto: r#"a[href^="mailto:"]"#,
                reveal: r#"[data-cy="access-button"]"#,
                no_results: Some(".zp-people-none"),
                loading: Some(".zp-spinner"),
            },
            SelectorProfile::RoleRows => SelectorSet {
                row: r#"[role="row"]"#,
                header_rows: 1,
                name: r##"a[href*="#/people/"]"##,
                title: None,
                company: r##"a[href*="#/organizations/"]"##,
                email: None,
                mailto: r#"a[href^="mailto:"]"#,
                reveal: "a, button, span",
                no_results: None,
                loading: Some(".zp-spinner"),
            },
        }
    }

    pub fn reveal_control(self) -> RevealControl {
        let selectors = self.selectors();
        match self {
            SelectorProfile::DataAttributes => RevealControl::Selector(selectors.reveal.to_string()),
            SelectorProfile::RoleRows => RevealControl::Labelled {
                candidates: selectors.reveal.to_string(),
                labels: REVEAL_LABELS.iter().map(|label| label.to_string()).collect(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub profile: SelectorProfile,
    /// Trigger reveal actions for rows without a visible email.
    pub reveal_emails: bool,
    /// Row cap when revealing; each reveal spends credits on the scraped site.
    pub reveal_cap: usize,
    /// Row cap when only reading already-revealed data.
    pub passive_cap: usize,
    pub initial_delay_ms: u64,
    pub settle_poll_ms: u64,
    pub settle_timeout_ms: u64,
    pub settle_buffer_ms: u64,
    pub reveal_settle_ms: u64,
    pub between_rows_ms: u64,
    /// How long to keep watching for user-driven reveals. 0 disables.
    pub watch_secs: u64,
    pub watch_debounce_ms: u64,
    /// Fragment marker of the results view.
    pub results_fragment: String,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            profile: SelectorProfile::DataAttributes,
            reveal_emails: true,
            reveal_cap: 3,
            passive_cap: 10,
            initial_delay_ms: 3_000,
            settle_poll_ms: 500,
            settle_timeout_ms: 15_000,
            settle_buffer_ms: 1_000,
            reveal_settle_ms: 2_000,
            between_rows_ms: 1_500,
            watch_secs: 0,
            watch_debounce_ms: 1_000,
            results_fragment: "#/people".to_string(),
        }
    }
}

impl ExtractionSettings {
    pub fn settle_wait(&self) -> WaitSettings {
        WaitSettings::new(
            Duration::from_millis(self.settle_poll_ms),
            Duration::from_millis(self.settle_timeout_ms),
        )
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn watch_window(&self) -> Option<Duration> {
        (self.watch_secs > 0).then(|| Duration::from_secs(self.watch_secs))
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }

    pub fn watch_poll(&self) -> Duration {
        Duration::from_millis(self.settle_poll_ms)
    }
}

/// Data read from one contact row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowData {
    pub name: String,
    pub title: String,
    pub company: String,
    /// Email from the email cell or a `mailto:` link.
    pub email: Option<String>,
    /// Email-shaped token found anywhere in the row text.
    pub text_email: Option<String>,
    pub has_reveal_control: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageScan {
    pub loading: bool,
    pub no_results: bool,
    /// All matched rows, header rows included.
    pub rows: Vec<RowData>,
}

impl PageScan {
    fn is_settled(&self, profile: SelectorProfile) -> bool {
        !self.loading && (self.no_results || self.rows.len() > profile.selectors().header_rows)
    }
}

pub fn scan_page(html: &str, profile: SelectorProfile) -> PageScan {
    let selectors = profile.selectors();
    let doc = Html::parse_document(html);

    let present = |css: Option<&str>| {
        css.and_then(|css| Selector::parse(css).ok())
            .is_some_and(|sel| doc.select(&sel).next().is_some())
    };
    let loading = present(selectors.loading);
    let no_results = present(selectors.no_results);

    let rows = match Selector::parse(selectors.row) {
        Ok(row_sel) => doc
            .select(&row_sel)
            .map(|row| read_row(row, profile, &selectors))
            .collect(),
        Err(_) => Vec::new(),
    };

    PageScan {
        loading,
        no_results,
        rows,
    }
}

/// Every email currently revealed on the page, for change detection.
pub fn revealed_emails(html: &str, profile: SelectorProfile) -> BTreeSet<String> {
    scan_page(html, profile)
        .rows
        .into_iter()
        .filter_map(|row| row.email)
        .collect()
}

fn read_row(row: ElementRef<'_>, profile: SelectorProfile, selectors: &SelectorSet) -> RowData {
    let name = first_text(row, selectors.name);
    let company = first_text(row, selectors.company);
    let blocks = text_blocks(row);
    let row_text = blocks.join(" ");

    let title = match selectors.title {
        Some(css) => first_text(row, css),
        None => pick_title(&blocks, &name, &company)
            .or_else(|| title_from_text(&row_text))
            .unwrap_or_default(),
    };

    let email = selectors
        .email
        .map(|css| first_text(row, css))
        .filter(|email| !email.is_empty())
        .or_else(|| mailto_address(row, selectors.mailto));
    let text_email = EMAIL_PATTERN
        .find(&row_text)
        .map(|found| found.as_str().to_string());

    let has_reveal_control = match profile.reveal_control() {
        RevealControl::Selector(css) => Selector::parse(&css)
            .ok()
            .is_some_and(|sel| row.select(&sel).next().is_some()),
        RevealControl::Labelled { candidates, labels } => Selector::parse(&candidates)
            .ok()
            .is_some_and(|sel| row.select(&sel).any(|el| label_matches(&element_text(el), &labels))),
    };

    RowData {
        name,
        title,
        company,
        email,
        text_email,
        has_reveal_control,
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(row: ElementRef<'_>, css: &str) -> String {
    Selector::parse(css)
        .ok()
        .and_then(|sel| row.select(&sel).next())
        .map(element_text)
        .unwrap_or_default()
}

fn text_blocks(row: ElementRef<'_>) -> Vec<String> {
    row.text()
        .map(str::trim)
        .filter(|text| text.chars().count() >= MIN_TEXT_BLOCK_LEN)
        .map(ToOwned::to_owned)
        .collect()
}

fn mailto_address(row: ElementRef<'_>, css: &str) -> Option<String> {
    let sel = Selector::parse(css).ok()?;
    row.select(&sel).find_map(|anchor| {
        let href = anchor.value().attr("href")?;
        let address = href.get("mailto:".len()..)?;
        let address = address.split('?').next().unwrap_or(address).trim();
        (!address.is_empty()).then(|| address.to_string())
    })
}

pub(crate) fn label_matches(text: &str, labels: &[String]) -> bool {
    let text = text.trim().to_lowercase();
    labels.iter().any(|label| {
        if label.contains(' ') {
            text.contains(label.as_str())
        } else {
            text == *label
        }
    })
}

/// Longest keyword-bearing text block that is not the name or company.
fn pick_title(blocks: &[String], name: &str, company: &str) -> Option<String> {
    let mut candidates: Vec<&String> = blocks
        .iter()
        .filter(|text| name.is_empty() || !name.contains(text.as_str()))
        .filter(|text| company.is_empty() || !company.contains(text.as_str()))
        .filter(|text| {
            let lower = text.to_lowercase();
            TITLE_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
        })
        .collect();
    candidates.sort_by_key(|text| std::cmp::Reverse(text.chars().count()));
    candidates
        .first()
        .filter(|text| text.chars().count() <= MAX_TITLE_LEN)
        .map(|text| text.to_string())
}

fn title_from_text(text: &str) -> Option<String> {
    TITLE_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|found| found.as_str().trim().to_string())
    })
}

/// Loose company-name comparison used when searching by name.
pub fn company_matches(expected: &str, found: &str) -> bool {
    let expected = expected.trim().to_lowercase();
    let found = found.trim().to_lowercase();
    if expected.is_empty() || found.is_empty() {
        return false;
    }
    if expected == found || expected.contains(&found) || found.contains(&expected) {
        return true;
    }
    let expected_words: BTreeSet<&str> = expected.split_whitespace().collect();
    found
        .split_whitespace()
        .any(|word| expected_words.contains(word) && !COMPANY_STOPWORDS.contains(&word))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The tab is not showing the results view; nothing to report.
    NotResultsPage { url: String },
    Contacts(Vec<Contact>),
}

#[derive(Debug, Clone, Default)]
pub struct ContactExtractor {
    settings: ExtractionSettings,
}

impl ContactExtractor {
    pub fn new(settings: ExtractionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    /// Extraction with reveal actions if enabled in settings.
    pub async fn extract(&self, page: &dyn SearchPage, task: &Task) -> Extraction {
        self.run(page, task, self.settings.reveal_emails).await
    }

    /// Reads only already-revealed emails; never spends reveal actions.
    pub async fn extract_passive(&self, page: &dyn SearchPage, task: &Task) -> Extraction {
        self.run(page, task, false).await
    }

    async fn run(&self, page: &dyn SearchPage, task: &Task, reveal: bool) -> Extraction {
        let profile = self.settings.profile;
        let selectors = profile.selectors();

        let settled = wait_for(self.settings.settle_wait(), move || async move {
            let html = page.snapshot_html().await.ok()?;
            let scan = scan_page(&html, profile);
            scan.is_settled(profile).then_some(())
        })
        .await;
        if settled.is_none() {
            scout_warn!("Results did not settle for job_id={}; reading anyway", task.job_id);
        }
        tokio::time::sleep(Duration::from_millis(self.settings.settle_buffer_ms)).await;

        let url = page.current_url().await.unwrap_or_default();
        if !url.contains(&self.settings.results_fragment) {
            scout_info!("Not on the results view ({}); skipping extraction", url);
            return Extraction::NotResultsPage { url };
        }

        let scan = match page.snapshot_html().await {
            Ok(html) => scan_page(&html, profile),
            Err(err) => {
                scout_warn!("Could not read page for job_id={}: {}", task.job_id, err);
                return Extraction::Contacts(Vec::new());
            }
        };
        if scan.no_results {
            scout_info!("No results for job_id={}", task.job_id);
            return Extraction::Contacts(Vec::new());
        }

        let cap = if reveal {
            self.settings.reveal_cap
        } else {
            self.settings.passive_cap
        };
        let check_company = profile == SelectorProfile::RoleRows
            && matches!(OrganizationFilter::for_task(task), OrganizationFilter::Name(_));
        scout_debug!(
            "Found {} contact row(s) for job_id={}, reading up to {}",
            scan.rows.len().saturating_sub(selectors.header_rows),
            task.job_id,
            cap
        );

        let mut contacts = Vec::new();
        for (offset, row) in scan
            .rows
            .iter()
            .skip(selectors.header_rows)
            .take(cap)
            .enumerate()
        {
            let row_index = selectors.header_rows + offset;
            if check_company && !company_matches(&task.company, &row.company) {
                scout_warn!("Company mismatch: {} vs {}", task.company, row.company);
                continue;
            }

            let mut contact = Contact {
                name: row.name.clone(),
                title: row.title.clone(),
                company: if row.company.is_empty() {
                    task.company.clone()
                } else {
                    row.company.clone()
                },
                email: row.email.clone().unwrap_or_default(),
            };

            let mut revealed = false;
            if contact.email.is_empty() && reveal && row.has_reveal_control {
                revealed = true;
                if let Some(email) = self.reveal_row(page, profile, row_index).await {
                    contact.email = email;
                }
            }

            if contact.has_valid_email() {
                scout_info!("Extracted {} <{}> - {}", contact.name, contact.email, contact.title);
                contacts.push(contact);
            } else {
                scout_debug!("Dropping row {} without a usable email", row_index);
            }

            if revealed {
                tokio::time::sleep(Duration::from_millis(self.settings.between_rows_ms)).await;
            }
        }

        Extraction::Contacts(contacts)
    }

    async fn reveal_row(
        &self,
        page: &dyn SearchPage,
        profile: SelectorProfile,
        row_index: usize,
    ) -> Option<String> {
        let target = RevealTarget {
            row_selector: profile.selectors().row.to_string(),
            row_index,
            control: profile.reveal_control(),
        };
        match page.reveal(&target).await {
            Ok(true) => {}
            Ok(false) => {
                scout_debug!("No reveal control in row {}", row_index);
                return None;
            }
            Err(err) => {
                scout_warn!("Reveal failed for row {}: {}", row_index, err);
                return None;
            }
        }

        tokio::time::sleep(Duration::from_millis(self.settings.reveal_settle_ms)).await;
        let html = page.snapshot_html().await.ok()?;
        let row = scan_page(&html, profile).rows.into_iter().nth(row_index)?;
        row.email.or(row.text_email)
    }
}
