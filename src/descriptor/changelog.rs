//! `%changelog` entries.

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};

/// One `* Www Mmm DD YYYY Author <email> - version` block and its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub date: NaiveDate,
    pub author: String,
    pub version: Option<String>,
    pub items: Vec<String>,
}

impl ChangelogEntry {
    /// Parse the header line (without its leading `*`).
    fn parse_header(header: &str) -> Result<Self> {
        let mut parts = header.split_whitespace();
        let _weekday = parts
            .next()
            .ok_or_else(|| anyhow!("Changelog header is empty"))?;
        let date_parts: Vec<&str> = parts.by_ref().take(3).collect();
        if date_parts.len() != 3 {
            bail!("Changelog header '{}' has no complete date", header.trim());
        }
        let date = NaiveDate::parse_from_str(&date_parts.join(" "), "%b %d %Y")
            .with_context(|| format!("Invalid changelog date in '{}'", header.trim()))?;

        let who: Vec<&str> = parts.collect();
        let who = who.join(" ");
        let (author, version) = match who.rsplit_once(" - ") {
            Some((author, version)) => (author.trim().to_string(), Some(version.trim().to_string())),
            None => match who.rsplit_once(' ') {
                Some((author, last)) if last.starts_with(|c: char| c.is_ascii_digit()) => {
                    (author.trim().to_string(), Some(last.to_string()))
                }
                _ => (who.trim().to_string(), None),
            },
        };

        if author.is_empty() {
            bail!("Changelog header '{}' has no author", header.trim());
        }

        Ok(Self {
            date,
            author,
            version: version.filter(|v| !v.is_empty()),
            items: Vec::new(),
        })
    }
}

/// Append-only, ordered list of changelog entries. Newest first, as written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Changelog {
    entries: Vec<ChangelogEntry>,
}

impl Changelog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ChangelogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ChangelogEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&ChangelogEntry> {
        self.entries.first()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse the body of a `%changelog` section.
    ///
    /// `- item` lines start a new item; other non-empty lines continue the
    /// previous one. Entries out of descending date order only warn.
    pub fn parse(body: &str) -> Result<Self> {
        let mut changelog = Changelog::new();
        let mut current: Option<ChangelogEntry> = None;

        for (index, line) in body.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(header) = trimmed.strip_prefix('*') {
                if let Some(entry) = current.take() {
                    changelog.push(entry);
                }
                current = Some(
                    ChangelogEntry::parse_header(header)
                        .with_context(|| format!("Changelog line {}", index + 1))?,
                );
                continue;
            }

            let entry = current.as_mut().ok_or_else(|| {
                anyhow!(
                    "Changelog line {}: text before the first '*' header",
                    index + 1
                )
            })?;
            match trimmed.strip_prefix('-') {
                Some(item) => entry.items.push(item.trim().to_string()),
                None => match entry.items.last_mut() {
                    Some(last) => {
                        last.push(' ');
                        last.push_str(trimmed);
                    }
                    None => entry.items.push(trimmed.to_string()),
                },
            }
        }
        if let Some(entry) = current {
            changelog.push(entry);
        }

        for pair in changelog.entries.windows(2) {
            if pair[1].date > pair[0].date {
                warn!(
                    "%changelog not in descending chronological order: {} listed before {}",
                    pair[0].date, pair[1].date
                );
            }
        }

        Ok(changelog)
    }
}
