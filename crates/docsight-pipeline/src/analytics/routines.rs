//! Per-type analysis routines run by the processing stage.

use regex::Regex;
use std::sync::OnceLock;

use docsight_llm::{GenerationRequest, TextGenerator};
use docsight_types::{AnalysisType, ContentType, DocsightError, Record};

use crate::collaborators::{search_bounded, Retriever};
use crate::stats::{describe, DatasetStatistics};
use crate::tables::extract_table_records;
use crate::timeseries::analyze_trends;

use super::state::{AnalysisSummary, ComparisonSide, ProcessedData};

pub const NO_DATA_NARRATIVE: &str = "No relevant data found for analysis.";
pub const GENERATION_FAILED_NARRATIVE: &str =
    "Analysis could not be generated from the retrieved data.";

/// Records quoted verbatim in routine prompts.
const SAMPLE_RECORDS: usize = 5;
/// Records quoted per side of a comparison.
const SIDE_SAMPLE_RECORDS: usize = 3;

const ANALYST_SYSTEM_MESSAGE: &str =
    "You are a data analyst. Base every statement on the records provided and quote figures exactly.";

pub(crate) struct RoutineDeps<'a> {
    pub generator: &'a dyn TextGenerator,
    pub retriever: &'a dyn Retriever,
    pub side_k: usize,
}

/// Outcome of a routine: the processed data plus the generation error that
/// forced the fallback narrative, if any.
pub(crate) struct RoutineOutput {
    pub processed: ProcessedData,
    pub failure: Option<DocsightError>,
}

pub(crate) fn no_data() -> ProcessedData {
    ProcessedData {
        narrative: NO_DATA_NARRATIVE.to_string(),
        generated: false,
        summary: AnalysisSummary::NoData,
    }
}

/// Dispatch on the analysis type. Prediction has no dedicated routine and is
/// handled as a general analysis.
pub(crate) async fn run_routine(
    deps: &RoutineDeps<'_>,
    analysis_type: AnalysisType,
    query: &str,
    records: &[Record],
) -> RoutineOutput {
    let statistics = describe(records);
    let (prompt, summary) = match analysis_type {
        AnalysisType::TrendAnalysis => {
            let trends = analyze_trends(records);
            let prompt = format!(
                "Analyze how the data changes over time to answer: {query}\n\n{}\n\nDetected trends:\n{}\n\n\
                 Describe the direction and size of each change, any turning points, and what the data \
                 suggests is driving them.",
                sample_block(records),
                trends.describe()
            );
            (prompt, AnalysisSummary::Trend { trends, statistics })
        }
        AnalysisType::Comparison => {
            let sides = compare_subjects(deps, query).await;
            let mut prompt = format!(
                "Perform a comparative analysis based on this query: {query}\n\n{}",
                sample_block(records)
            );
            if let Some((left, right)) = &sides {
                prompt.push_str(&format!(
                    "\n\n{}\n\n{}",
                    side_block(&left.0, &left.1),
                    side_block(&right.0, &right.1)
                ));
            }
            prompt.push_str(
                "\n\nIdentify:\n1. Key metrics being compared\n2. Significant differences\n\
                 3. Performance rankings\n4. Whether the differences are large enough to matter",
            );
            let sides = sides.map(|(l, r)| (l.0, r.0));
            (prompt, AnalysisSummary::Comparison { statistics, sides })
        }
        AnalysisType::Summary => {
            let prompt = format!(
                "Create a comprehensive summary for: {query}\n\n{}\n\nData overview:\n- Records: {}\n- Statistics:\n{}\n\n\
                 Provide:\n1. Key highlights\n2. Important patterns\n3. Notable findings\n4. Overall assessment",
                sample_block(records),
                records.len(),
                statistics_block(&statistics)
            );
            (prompt, AnalysisSummary::Summary { statistics })
        }
        AnalysisType::Prediction | AnalysisType::General => {
            let prompt = format!(
                "Analyze the data to answer: {query}\n\n{}\n\nColumn statistics:\n{}\n\n\
                 Provide a thorough analysis addressing the query.",
                sample_block(records),
                statistics_block(&statistics)
            );
            (prompt, AnalysisSummary::General { statistics })
        }
    };

    let request = GenerationRequest::new(prompt).with_system_message(ANALYST_SYSTEM_MESSAGE);
    match deps.generator.generate(&request).await {
        Ok(narrative) => RoutineOutput {
            processed: ProcessedData {
                narrative,
                generated: true,
                summary,
            },
            failure: None,
        },
        Err(e) => RoutineOutput {
            processed: ProcessedData {
                narrative: GENERATION_FAILED_NARRATIVE.to_string(),
                generated: false,
                summary,
            },
            failure: Some(e),
        },
    }
}

// ---------------------------------------------------------------------------
// Prompt blocks
// ---------------------------------------------------------------------------

fn render_records(records: &[Record], limit: usize) -> String {
    records
        .iter()
        .take(limit)
        .map(|r| serde_json::Value::Object(r.clone()).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn sample_block(records: &[Record]) -> String {
    format!(
        "Data available: {} records\nSample data:\n{}",
        records.len(),
        render_records(records, SAMPLE_RECORDS)
    )
}

fn statistics_block(statistics: &DatasetStatistics) -> String {
    serde_json::to_string_pretty(&statistics.columns).unwrap_or_default()
}

fn side_block(side: &ComparisonSide, records: &[Record]) -> String {
    if records.is_empty() {
        return format!("{}: no matching records", side.subject);
    }
    format!(
        "{}: {} records\n{}",
        side.subject,
        side.record_count,
        render_records(records, SIDE_SAMPLE_RECORDS)
    )
}

// ---------------------------------------------------------------------------
// Comparison fan-out
// ---------------------------------------------------------------------------

fn versus_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(.+?)\s+(?:vs\.?|versus)\s+(.+)$").ok())
        .as_ref()
}

/// A leading comparison verb, matched as a whole word.
fn leading_verb_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:comparison\s+of|comparing|compare|contrast)\b").ok())
        .as_ref()
}

fn clean_subject(raw: &str) -> String {
    let s = raw
        .trim()
        .trim_end_matches(|c: char| c == '?' || c == '.' || c == '!')
        .trim();
    let stripped = leading_verb_re()
        .and_then(|re| re.find(s))
        .map(|m| s[m.end()..].trim())
        .filter(|rest| !rest.is_empty());
    stripped.unwrap_or(s).to_string()
}

/// The two subjects of an `X vs Y` / `X versus Y` query.
pub fn comparison_subjects(query: &str) -> Option<(String, String)> {
    let caps = versus_re()?.captures(query.trim())?;
    let left = clean_subject(caps.get(1)?.as_str());
    let right = clean_subject(caps.get(2)?.as_str());
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some((left, right))
}

async fn side_records(deps: &RoutineDeps<'_>, subject: &str) -> Vec<Record> {
    match search_bounded(deps.retriever, subject, &[ContentType::Table], deps.side_k).await {
        Ok(found) => found
            .get(&ContentType::Table)
            .map(|docs| extract_table_records(docs))
            .unwrap_or_default(),
        Err(e) => {
            tracing::warn!(subject = %subject, error = %e, "Comparison side retrieval failed");
            Vec::new()
        }
    }
}

type Side = (ComparisonSide, Vec<Record>);

/// Retrieve both subjects of a comparison concurrently.
async fn compare_subjects(deps: &RoutineDeps<'_>, query: &str) -> Option<(Side, Side)> {
    let (left, right) = comparison_subjects(query)?;
    let (left_records, right_records) =
        tokio::join!(side_records(deps, &left), side_records(deps, &right));
    tracing::debug!(
        left = %left,
        right = %right,
        left_records = left_records.len(),
        right_records = right_records.len(),
        "Retrieved comparison sides"
    );
    Some((
        (
            ComparisonSide {
                subject: left,
                record_count: left_records.len(),
            },
            left_records,
        ),
        (
            ComparisonSide {
                subject: right,
                record_count: right_records.len(),
            },
            right_records,
        ),
    ))
}
