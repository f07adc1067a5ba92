//! Grant opportunity records and their canonical description.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One grant program as held by the corpus store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Opportunity {
    /// Primary key.
    pub id: Uuid,
    /// Opportunity number, unique across the corpus.
    pub identifier: String,
    /// Opportunity code.
    pub code: String,
    /// Opportunity title.
    pub title: String,
    /// Public URL of the opportunity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Agency name.
    pub agency: String,
    /// Top-level agency name.
    pub head: String,
    /// Category tags as imported.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Expected number of awards.
    pub awards: Option<u32>,
    /// Estimated program funding, used as the award ceiling.
    pub funding: Option<u64>,
    /// Total applications submitted.
    pub applications: Option<u32>,
    /// Applications that won an award.
    pub awarded: Option<u32>,
    pub opened: Option<NaiveDate>,
    pub closed: Option<NaiveDate>,
    pub archived: Option<NaiveDate>,
    pub summary: Option<String>,
    pub eligibility: Option<String>,
    pub instruction: Option<String>,
    /// Provenance of the record.
    pub source: Option<String>,
    /// Set once the record's description has been added to the index.
    #[serde(default)]
    pub vectorized: bool,
}

impl Opportunity {
    /// Create a record with a fresh id and every optional field empty.
    pub fn new(identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            identifier: identifier.into(),
            code: String::new(),
            title: title.into(),
            link: None,
            agency: String::new(),
            head: String::new(),
            categories: Vec::new(),
            awards: None,
            funding: None,
            applications: None,
            awarded: None,
            opened: None,
            closed: None,
            archived: None,
            summary: None,
            eligibility: None,
            instruction: None,
            source: None,
            vectorized: false,
        }
    }

    /// Whether the program advertises a positive funding ceiling.
    ///
    /// This is the `funding` flag stored alongside every indexed chunk.
    pub fn is_funded(&self) -> bool {
        self.funding.is_some_and(|funding| funding > 0)
    }

    /// Share of submitted applications that won, in `[0, 1]`.
    pub fn success_rate(&self) -> Option<f64> {
        match (self.applications, self.awarded) {
            (Some(total), Some(won)) if total > 0 => Some(f64::from(won) / f64::from(total)),
            _ => None,
        }
    }

    /// Build the canonical text that is chunked and embedded for this record.
    ///
    /// Every value is whitespace-collapsed and a line is only emitted when its
    /// value is non-empty, so the same record always yields the same text.
    pub fn describe(&self) -> String {
        let mut lines: Vec<String> = Vec::new();

        if let Some(title) = clean_text(&self.title) {
            lines.push(title);
        }

        let agency = clean_text(&self.agency);
        let head = clean_text(&self.head);
        let agency_line = match (agency, head) {
            (Some(agency), Some(head)) => Some(format!("{agency} | Top-level: {head}")),
            (Some(agency), None) => Some(agency),
            (None, Some(head)) => Some(format!("Top-level: {head}")),
            (None, None) => None,
        };
        push_line(&mut lines, "Agency", agency_line);

        let categories: Vec<String> = self.categories.iter().filter_map(|c| clean_text(c)).collect();
        push_line(&mut lines, "Categories", Some(categories.join(", ")));

        push_line(&mut lines, "Expected Awards", self.awards.map(|n| group_thousands(n.into())));
        push_line(&mut lines, "Estimated Funding", self.funding.map(group_thousands));

        push_line(&mut lines, "Eligibility", self.eligibility.as_deref().and_then(clean_text));
        push_line(
            &mut lines,
            "Submission Instruction",
            self.instruction.as_deref().and_then(clean_text),
        );
        push_line(&mut lines, "Summary", self.summary.as_deref().and_then(clean_text));
        push_line(&mut lines, "Source", self.source.as_deref().and_then(clean_text));

        lines.join("\n")
    }
}

/// Collapse every whitespace run to a single space; `None` when nothing is left.
fn clean_text(text: &str) -> Option<String> {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!cleaned.is_empty()).then_some(cleaned)
}

fn push_line(lines: &mut Vec<String>, label: &str, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        lines.push(format!("{label}: {value}"));
    }
}

/// Format an integer with comma thousands separators (`1234567` → `1,234,567`).
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
