//! Search URL construction for the people-search page.
//!
//! The search page is a single-page app: filters live in the query part of the
//! URL fragment (`#/people?organizationName=...&personTitles[]=...`).

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::{Department, Task};

pub const PEOPLE_ROUTE: &str = "/people";
pub const ORGANIZATION_DOMAIN_PARAM: &str = "organizationDomains[]";
pub const ORGANIZATION_NAME_PARAM: &str = "organizationName";
pub const PERSON_TITLE_PARAM: &str = "personTitles[]";

const FILTER_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'`');

/// Recruiter job titles searched for a department.
pub fn recruiter_titles_for(department: Department) -> &'static [&'static str] {
    match department {
        Department::Engineering => &["Technical Recruiter", "Engineering Recruiter"],
        Department::Marketing => &["Marketing Recruiter"],
        Department::Sales => &["Sales Recruiter"],
        Department::Design => &["Design Recruiter", "Creative Recruiter"],
        Department::Hr => &["HR Recruiter", "Talent Acquisition"],
        Department::General => &["Recruiter", "Talent Acquisition", "HR Manager"],
    }
}

/// Which organization dimension a search is filtered on. Exactly one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizationFilter<'a> {
    Domain(&'a str),
    Name(&'a str),
}

impl<'a> OrganizationFilter<'a> {
    pub fn for_task(task: &'a Task) -> Self {
        match task.domain_filter() {
            Some(domain) => OrganizationFilter::Domain(domain),
            None => OrganizationFilter::Name(task.company.trim()),
        }
    }

    fn param(self) -> (&'static str, &'a str) {
        match self {
            OrganizationFilter::Domain(domain) => (ORGANIZATION_DOMAIN_PARAM, domain),
            OrganizationFilter::Name(name) => (ORGANIZATION_NAME_PARAM, name),
        }
    }
}

/// Builds the people-search URL for `task` on top of `base` (scheme + host).
pub fn build_search_url(base: &Url, task: &Task) -> Url {
    let mut filters = vec![OrganizationFilter::for_task(task).param()];
    filters.extend(
        recruiter_titles_for(task.department)
            .iter()
            .map(|title| (PERSON_TITLE_PARAM, *title)),
    );

    let query = filters
        .into_iter()
        .map(|(key, value)| format!("{key}={}", utf8_percent_encode(value, FILTER_VALUE)))
        .collect::<Vec<_>>()
        .join("&");

    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(Some(&format!("{PEOPLE_ROUTE}?{query}")));
    url
}

/// Decodes the filters carried in a search URL's fragment, in order.
pub fn search_filters(url: &Url) -> Vec<(String, String)> {
    let Some(query) = url.fragment().and_then(|fragment| fragment.split_once('?')) else {
        return Vec::new();
    };
    url::form_urlencoded::parse(query.1.as_bytes())
        .into_owned()
        .collect()
}
