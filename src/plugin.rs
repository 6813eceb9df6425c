//! The host-facing run: scan the book, let the user review, write back.
//!
//! The host supplies a [`BookContainer`] for resource access and a
//! [`Reviewer`] for the blocking confirmation steps. Either confirmation can
//! cancel the run, in which case nothing is written.

use std::collections::BTreeMap;
use std::fmt;

use log::{error, info, warn};
use serde_json::{Map, Value};

use crate::dom::{MarkupDocument, classify_media_type};
use crate::error::Result;
use crate::orphans::{OrphanRecord, apply_deletions, collect_orphans};
use crate::prefs::Preferences;
use crate::stylesheet::{Stylesheet, StylesheetError, UnknownRuleWarning};
use crate::util::{decode_resource, href_to_basename};

/// Resource access provided by the host application.
pub trait BookContainer {
    /// `(id, href)` of every stylesheet in manifest order.
    fn css_iter(&self) -> Vec<(String, String)>;

    /// `(id, href, media_type)` of every candidate markup resource.
    fn markup_iter(&self) -> Vec<(String, String, String)>;

    fn read_file(&self, id: &str) -> Result<Vec<u8>>;

    fn write_file(&mut self, id: &str, text: &str) -> Result<()>;

    /// Stored preferences, if any were ever saved.
    fn load_preferences(&self) -> Option<Map<String, Value>>;

    fn save_preferences(&mut self, prefs: Map<String, Value>) -> Result<()>;
}

/// Outcome of a blocking user interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision<T> {
    Proceed(T),
    Cancelled,
}

/// The user-facing side of a run.
pub trait Reviewer {
    /// Offer the current preferences for editing. `Cancelled` keeps them
    /// unchanged and unsaved.
    fn edit_preferences(&mut self, current: &Preferences) -> Decision<Preferences>;

    /// Shown only when some stylesheet failed to parse or has unknown rules.
    fn confirm_parse_report(&mut self, report: &ParseReport) -> Decision<()>;

    /// Choose which orphans to delete; called even when there are none.
    fn review(&mut self, orphans: &[OrphanRecord]) -> Decision<Vec<OrphanRecord>>;
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Ids of the stylesheets that were rewritten.
    Completed { changed: Vec<String> },
    Cancelled,
}

impl Outcome {
    /// Status reported to the host: `0` on completion, `-1` when cancelled.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Completed { .. } => 0,
            Outcome::Cancelled => -1,
        }
    }
}

/// Stylesheet pre-parse findings shown before the scan.
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    /// `(href, error)` of stylesheets that will be left untouched.
    pub failures: Vec<(String, StylesheetError)>,
    /// `(href, first unknown rule)` per stylesheet.
    pub warnings: Vec<(String, UnknownRuleWarning)>,
    /// Ids of the stylesheets that will be scanned.
    pub parsable: Vec<String>,
}

impl ParseReport {
    /// Whether there is anything to confirm.
    pub fn needs_confirmation(&self) -> bool {
        !self.failures.is_empty() || !self.warnings.is_empty()
    }
}

impl fmt::Display for ParseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (href, err) in &self.failures {
            writeln!(
                f,
                "I couldn't parse {} due to\n{err}",
                href_to_basename(href)
            )?;
        }
        for (href, warning) in &self.warnings {
            writeln!(
                f,
                "Warning: Found unknown @rule in {} at line {}: {}. \
                 Text of unknown rules might be not preserved.",
                href_to_basename(href),
                warning.line,
                warning.keyword
            )?;
        }
        if !self.parsable.is_empty() {
            write!(f, "\nParse will be done on {}", self.parsable.join(", "))?;
        }
        Ok(())
    }
}

/// A stylesheet that parsed, with what the run needs to write it back.
struct ParsedEntry {
    id: String,
    href: String,
    sheet: Stylesheet,
}

/// Run the whole scan-review-rewrite cycle.
pub fn run(book: &mut impl BookContainer, reviewer: &mut impl Reviewer) -> Result<Outcome> {
    let prefs = settle_preferences(book, reviewer)?;

    let (entries, report) = pre_parse(&*book)?;
    if report.needs_confirmation() && reviewer.confirm_parse_report(&report) == Decision::Cancelled
    {
        info!("run cancelled at the parse report");
        return Ok(Outcome::Cancelled);
    }

    let documents = load_documents(&*book, prefs.scan_all_xml)?;
    info!(
        "scanning {} stylesheet(s) against {} document(s)",
        entries.len(),
        documents.len()
    );

    let orphans: Vec<OrphanRecord> = entries
        .iter()
        .flat_map(|entry| collect_orphans(&entry.id, &entry.href, &entry.sheet, &documents))
        .collect();
    info!("found {} orphaned selector(s)", orphans.len());

    let approved = match reviewer.review(&orphans) {
        Decision::Proceed(approved) => approved,
        Decision::Cancelled => {
            info!("run cancelled at review");
            return Ok(Outcome::Cancelled);
        }
    };

    let changed = write_back(book, entries, &approved, &prefs)?;
    info!("rewrote {} stylesheet(s)", changed.len());
    Ok(Outcome::Completed { changed })
}

/// [`run`], reduced to the status code the host expects.
pub fn run_with_status(book: &mut impl BookContainer, reviewer: &mut impl Reviewer) -> i32 {
    match run(book, reviewer) {
        Ok(outcome) => outcome.exit_code(),
        Err(err) => {
            error!("css cleanup failed: {err}");
            -1
        }
    }
}

fn settle_preferences(
    book: &mut impl BookContainer,
    reviewer: &mut impl Reviewer,
) -> Result<Preferences> {
    let current = book
        .load_preferences()
        .map(|stored| Preferences::from_map(&stored))
        .unwrap_or_default();

    match reviewer.edit_preferences(&current) {
        Decision::Proceed(edited) => {
            if edited != current {
                book.save_preferences(edited.to_map())?;
            }
            Ok(edited)
        }
        Decision::Cancelled => Ok(current),
    }
}

fn pre_parse(book: &impl BookContainer) -> Result<(Vec<ParsedEntry>, ParseReport)> {
    let mut entries = Vec::new();
    let mut report = ParseReport::default();

    for (id, href) in book.css_iter() {
        let bytes = book.read_file(&id)?;
        let css = decode_resource(&bytes);
        match Stylesheet::parse(&css) {
            Ok(parsed) => {
                if let Some(first) = parsed.warnings.into_iter().next() {
                    report.warnings.push((href.clone(), first));
                }
                report.parsable.push(id.clone());
                entries.push(ParsedEntry {
                    id,
                    href,
                    sheet: parsed.sheet,
                });
            }
            Err(err) => {
                warn!("{href}: not parsable, leaving it untouched ({err})");
                report.failures.push((href, err));
            }
        }
    }
    Ok((entries, report))
}

fn load_documents(book: &impl BookContainer, scan_all_xml: bool) -> Result<Vec<MarkupDocument>> {
    let mut documents = Vec::new();
    for (id, _href, media_type) in book.markup_iter() {
        let Some(kind) = classify_media_type(&media_type, scan_all_xml) else {
            continue;
        };
        let bytes = book.read_file(&id)?;
        documents.push(MarkupDocument::parse(id, &bytes, kind)?);
    }
    Ok(documents)
}

/// Apply the approved deletions and write the changed stylesheets.
///
/// Every stylesheet is rewritten in memory first; a stale record anywhere
/// fails the call before the book is touched.
fn write_back(
    book: &mut impl BookContainer,
    entries: Vec<ParsedEntry>,
    approved: &[OrphanRecord],
    prefs: &Preferences,
) -> Result<Vec<String>> {
    let mut by_sheet: BTreeMap<&str, Vec<OrphanRecord>> = BTreeMap::new();
    for record in approved {
        by_sheet
            .entry(record.stylesheet_id.as_str())
            .or_default()
            .push(record.clone());
    }
    for (id, records) in &by_sheet {
        if !entries.iter().any(|entry| entry.id == *id) {
            warn!(
                "ignoring {} deletion(s) for unknown stylesheet '{id}'",
                records.len()
            );
        }
    }

    let mut rewritten = Vec::new();
    for mut entry in entries {
        let Some(records) = by_sheet.get(entry.id.as_str()) else {
            continue;
        };
        if apply_deletions(&mut entry.sheet, records)? == 0 {
            continue;
        }
        let text = entry.sheet.to_css(prefs);
        rewritten.push((entry.id, text));
    }

    let mut changed = Vec::with_capacity(rewritten.len());
    for (id, text) in rewritten {
        book.write_file(&id, &text)?;
        changed.push(id);
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stylesheet::Stylesheet;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Outcome::Completed { changed: vec![] }.exit_code(), 0);
        assert_eq!(Outcome::Cancelled.exit_code(), -1);
    }

    #[test]
    fn test_parse_report_messages() {
        let failure = Stylesheet::parse("p, { }").unwrap_err();
        let report = ParseReport {
            failures: vec![("Styles/broken.css".to_string(), failure.clone())],
            warnings: vec![(
                "Styles/anim.css".to_string(),
                UnknownRuleWarning {
                    keyword: "@keyframes".to_string(),
                    line: 12,
                },
            )],
            parsable: vec!["anim.css".to_string(), "main.css".to_string()],
        };
        let text = report.to_string();

        assert!(text.starts_with(&format!("I couldn't parse broken.css due to\n{failure}\n")));
        assert!(text.contains(
            "Warning: Found unknown @rule in anim.css at line 12: @keyframes. \
             Text of unknown rules might be not preserved."
        ));
        assert!(text.ends_with("\nParse will be done on anim.css, main.css"));
        assert!(report.needs_confirmation());
    }

    #[test]
    fn test_clean_report_needs_no_confirmation() {
        let report = ParseReport {
            parsable: vec!["a.css".to_string()],
            ..Default::default()
        };
        assert!(!report.needs_confirmation());
    }
}
