//! # AI Module
//!
//! Deterministic stand-ins for the document, transcription and research
//! services. Every function is pure: the same input always yields the same
//! output, so handlers and tests can rely on exact results.
//!
//! Latency is not simulated here. The HTTP layer sleeps before calling in.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::model::essence_of;
use crate::{
    CalendarEvent, CallInsights, CallLogId, Case, CaseId, CasePriority, CaseStatus, Document,
    DocumentStatus, EventStatus, EventType, Sentiment,
};

/// Largest audio file accepted for transcription (100 MiB).
pub const MAX_AUDIO_BYTES: u64 = 100 * 1024 * 1024;

/// Content types accepted for transcription.
pub const AUDIO_MIME_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/x-wav",
    "audio/wave",
    "audio/mp4",
    "audio/x-m4a",
    "audio/ogg",
    "audio/webm",
    "audio/flac",
];

/// Assumed bitrate of uploaded audio, used to estimate duration.
const AUDIO_BYTES_PER_SECOND: u64 = 16_000;

const MAX_SUMMARY_SENTENCES: usize = 3;
const MAX_SUMMARY_CHARS: usize = 600;
const MAX_KEY_POINTS: usize = 5;
const MAX_ACTION_ITEMS: usize = 5;
const MAX_TOPICS: usize = 5;
const MAX_AUTHORITIES: usize = 5;
const MAX_QUERY_LEN: usize = 1_000;

const NO_TEXT_SUMMARY: &str = "No extractable text was found in this document.";
const DEFAULT_JURISDICTION: &str = "United States (federal)";

/// Words that mark a sentence as legally significant.
const LEGAL_KEYWORDS: &[&str] = &[
    "agreement",
    "appeal",
    "breach",
    "contract",
    "court",
    "damages",
    "deadline",
    "defendant",
    "deposition",
    "discovery",
    "evidence",
    "hearing",
    "judgment",
    "jurisdiction",
    "liability",
    "motion",
    "plaintiff",
    "settlement",
    "statute",
    "testimony",
];

const POSITIVE_WORDS: &[&str] = &[
    "agree",
    "appreciate",
    "glad",
    "good",
    "great",
    "happy",
    "resolved",
    "settle",
    "thank",
];

const NEGATIVE_WORDS: &[&str] = &[
    "angry",
    "breach",
    "concern",
    "delay",
    "dispute",
    "lawsuit",
    "problem",
    "upset",
    "worried",
];

const ACTION_MARKERS: &[&str] = &["will ", "need to", "needs to", "follow up", "must "];

pub fn is_allowed_audio_type(mime: &str) -> bool {
    AUDIO_MIME_TYPES.contains(&essence_of(mime).as_str())
}

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Result of analysing a block of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    /// Leading sentences of the text.
    pub summary: String,
    /// Sentences that mention legal terms.
    pub key_points: Vec<String>,
    /// The text the analysis ran on.
    pub extracted_text: String,
    pub word_count: usize,
}

/// Summarizes free text.
#[must_use]
pub fn summarize_text(text: &str) -> DocumentAnalysis {
    let text = text.trim();
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return DocumentAnalysis {
            summary: NO_TEXT_SUMMARY.to_string(),
            key_points: Vec::new(),
            extracted_text: String::new(),
            word_count: 0,
        };
    }

    let summary = truncate_chars(
        &sentences
            .iter()
            .take(MAX_SUMMARY_SENTENCES)
            .map(|s| format!("{}.", s))
            .collect::<Vec<_>>()
            .join(" "),
        MAX_SUMMARY_CHARS,
    );

    let mut key_points: Vec<String> = sentences
        .iter()
        .filter(|s| !keywords_in(s, LEGAL_KEYWORDS).is_empty())
        .take(MAX_KEY_POINTS)
        .map(|s| format!("{}.", s))
        .collect();
    if key_points.is_empty() {
        key_points.push(format!("{}.", sentences[0]));
    }

    DocumentAnalysis {
        summary,
        key_points,
        extracted_text: text.to_string(),
        word_count: text.split_whitespace().count(),
    }
}

/// Analyses an uploaded document. Text files are read directly; other
/// formats get a canned extraction describing the file.
#[must_use]
pub fn analyze_document(document: &Document, content: &[u8]) -> DocumentAnalysis {
    if document.is_text() {
        return summarize_text(&String::from_utf8_lossy(content));
    }
    let extracted = format!(
        "{} is a {} document stored as {} ({} bytes). \
         It sets out the positions of the parties and the relief requested. \
         Counsel should confirm every deadline and obligation it contains before the next hearing.",
        document.title,
        document.document_type.as_str().replace('_', " "),
        document.file_name,
        document.file_size,
    );
    summarize_text(&extracted)
}

// =============================================================================
// CALLS
// =============================================================================

/// One speaker turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub speaker: String,
    pub start_seconds: u64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub file_name: String,
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
    pub duration_seconds: u64,
    pub language: String,
}

const CANNED_CONVERSATION: &[(&str, &str)] = &[
    (
        "Attorney",
        "Thank you for calling. Let's go over where the case stands.",
    ),
    (
        "Client",
        "I received a letter from the other side about a settlement offer.",
    ),
    (
        "Attorney",
        "We will review the agreement, and I need to check the filing deadline with the court.",
    ),
    (
        "Client",
        "Please follow up with me once you have spoken to opposing counsel.",
    ),
];

/// Produces a transcript for an audio upload of `size` bytes.
#[must_use]
pub fn transcribe_audio(file_name: &str, size: u64) -> Transcript {
    let duration_seconds = (size / AUDIO_BYTES_PER_SECOND).max(1);
    let turns = CANNED_CONVERSATION.len() as u64;
    let segments: Vec<TranscriptSegment> = CANNED_CONVERSATION
        .iter()
        .enumerate()
        .map(|(i, (speaker, text))| TranscriptSegment {
            speaker: (*speaker).to_string(),
            start_seconds: duration_seconds * i as u64 / turns,
            text: (*text).to_string(),
        })
        .collect();
    let text = segments
        .iter()
        .map(|s| format!("{}: {}", s.speaker, s.text))
        .collect::<Vec<_>>()
        .join("\n");
    Transcript {
        file_name: file_name.to_string(),
        text,
        segments,
        duration_seconds,
        language: "en-US".to_string(),
    }
}

/// Transcribes the recording of a logged call.
#[must_use]
pub fn transcribe_call(call_id: CallLogId, duration_seconds: u64) -> Transcript {
    transcribe_audio(
        &format!("call-{}.wav", call_id),
        duration_seconds.max(1).saturating_mul(AUDIO_BYTES_PER_SECOND),
    )
}

/// Extracts sentiment, action items and topics from a transcript.
#[must_use]
pub fn call_insights(transcript: &str) -> CallInsights {
    let sentences = split_sentences(transcript);
    if sentences.is_empty() {
        return CallInsights {
            summary: "No conversation was recorded.".to_string(),
            action_items: Vec::new(),
            key_topics: Vec::new(),
            sentiment: Sentiment::Neutral,
        };
    }

    let positive = keywords_in(transcript, POSITIVE_WORDS).len();
    let negative = keywords_in(transcript, NEGATIVE_WORDS).len();
    let sentiment = match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Negative,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    };

    let action_items: Vec<String> = sentences
        .iter()
        .filter(|s| !keywords_in(s, ACTION_MARKERS).is_empty())
        .take(MAX_ACTION_ITEMS)
        .map(|s| format!("{}.", strip_speaker(s)))
        .collect();

    let key_topics: Vec<String> = keywords_in(transcript, LEGAL_KEYWORDS)
        .into_iter()
        .take(MAX_TOPICS)
        .map(str::to_string)
        .collect();

    let topics = if key_topics.is_empty() {
        "general matters".to_string()
    } else {
        key_topics.join(", ")
    };
    let summary = format!(
        "Call covering {}. {} action item(s) identified; overall tone {}.",
        topics,
        action_items.len(),
        sentiment
    );

    CallInsights {
        summary,
        action_items,
        key_topics,
        sentiment,
    }
}

// =============================================================================
// RESEARCH
// =============================================================================

/// A cited authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub citation: String,
    pub title: String,
    pub holding: String,
    /// Number of query terms the authority matched.
    pub relevance: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub query: String,
    pub jurisdiction: String,
    pub summary: String,
    pub authorities: Vec<Authority>,
}

struct Precedent {
    citation: &'static str,
    title: &'static str,
    holding: &'static str,
    keywords: &'static [&'static str],
}

const PRECEDENTS: &[Precedent] = &[
    Precedent {
        citation: "9 Exch. 341 (1854)",
        title: "Hadley v. Baxendale",
        holding: "Contract damages are limited to losses the parties could reasonably foresee when contracting.",
        keywords: &["contract", "damages", "breach", "foreseeable", "loss"],
    },
    Precedent {
        citation: "477 U.S. 317 (1986)",
        title: "Celotex Corp. v. Catrett",
        holding: "A movant for summary judgment may point to the absence of evidence supporting the other side's case.",
        keywords: &["summary", "judgment", "motion", "evidence", "burden"],
    },
    Precedent {
        citation: "556 U.S. 662 (2009)",
        title: "Ashcroft v. Iqbal",
        holding: "A complaint must plead facts that make the claim plausible, not merely conceivable.",
        keywords: &["pleading", "complaint", "dismiss", "motion", "plausible"],
    },
    Precedent {
        citation: "329 U.S. 495 (1947)",
        title: "Hickman v. Taylor",
        holding: "Materials prepared by counsel in anticipation of litigation are protected work product.",
        keywords: &["discovery", "privilege", "work", "product", "attorney"],
    },
    Precedent {
        citation: "509 U.S. 579 (1993)",
        title: "Daubert v. Merrell Dow Pharmaceuticals, Inc.",
        holding: "Trial judges act as gatekeepers for the reliability and relevance of expert testimony.",
        keywords: &["expert", "testimony", "evidence", "scientific", "admissibility"],
    },
    Precedent {
        citation: "326 U.S. 310 (1945)",
        title: "International Shoe Co. v. Washington",
        holding: "Personal jurisdiction requires minimum contacts with the forum state.",
        keywords: &["jurisdiction", "personal", "contacts", "forum", "venue"],
    },
    Precedent {
        citation: "384 U.S. 436 (1966)",
        title: "Miranda v. Arizona",
        holding: "Statements from custodial interrogation are inadmissible unless the suspect was warned of their rights.",
        keywords: &["criminal", "custody", "interrogation", "rights", "confession"],
    },
];

/// Ranks the built-in authorities against a research question.
pub fn legal_research(query: &str, jurisdiction: Option<&str>) -> CoreResult<ResearchResult> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CoreError::validation("query", "is required"));
    }
    if query.chars().count() > MAX_QUERY_LEN {
        return Err(CoreError::validation(
            "query",
            format!("must be at most {} characters", MAX_QUERY_LEN),
        ));
    }
    let jurisdiction = jurisdiction
        .map(str::trim)
        .filter(|j| !j.is_empty())
        .unwrap_or(DEFAULT_JURISDICTION)
        .to_string();

    let terms = words(query);
    let mut ranked: Vec<(u32, usize)> = PRECEDENTS
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let hits = p.keywords.iter().filter(|k| terms.contains(**k)).count();
            (u32::try_from(hits).unwrap_or(u32::MAX), i)
        })
        .filter(|(hits, _)| *hits > 0)
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let authorities: Vec<Authority> = ranked
        .into_iter()
        .take(MAX_AUTHORITIES)
        .map(|(relevance, i)| {
            let p = &PRECEDENTS[i];
            Authority {
                citation: p.citation.to_string(),
                title: p.title.to_string(),
                holding: p.holding.to_string(),
                relevance,
            }
        })
        .collect();

    let summary = match authorities.first() {
        Some(lead) => format!(
            "Found {} authorities relevant to \"{}\" in {}. The leading authority is {}.",
            authorities.len(),
            query,
            jurisdiction,
            lead.title
        ),
        None => format!(
            "No authorities matched \"{}\" in {}. Try broader legal terms.",
            query, jurisdiction
        ),
    };

    Ok(ResearchResult {
        query: query.to_string(),
        jurisdiction,
        summary,
        authorities,
    })
}

// =============================================================================
// CASES
// =============================================================================

/// Assessment of a case from its records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseAnalysis {
    pub case_id: CaseId,
    pub strengths: Vec<String>,
    pub risks: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub next_deadline: Option<DateTime<Utc>>,
    pub document_count: usize,
    pub upcoming_event_count: usize,
}

/// Builds an assessment from a case and the records linked to it.
#[must_use]
pub fn analyze_case(
    case: &Case,
    documents: &[Document],
    events: &[CalendarEvent],
    now: DateTime<Utc>,
) -> CaseAnalysis {
    let upcoming: Vec<&CalendarEvent> = events
        .iter()
        .filter(|e| e.status == EventStatus::Scheduled && e.start_time >= now)
        .collect();
    let next_deadline = upcoming
        .iter()
        .filter(|e| matches!(e.event_type, EventType::Deadline | EventType::Hearing))
        .map(|e| e.start_time)
        .chain(case.next_hearing.filter(|h| *h >= now))
        .min();
    let processed = documents
        .iter()
        .filter(|d| d.status == DocumentStatus::Processed)
        .count();

    let mut strengths = Vec::new();
    if !documents.is_empty() {
        strengths.push(format!(
            "{} document(s) on file, {} analysed",
            documents.len(),
            processed
        ));
    }
    if let Some(court) = &case.court {
        strengths.push(format!("Venue established in {}", court));
    }
    if let Some(attorney) = &case.assigned_attorney {
        strengths.push(format!("Counsel assigned: {}", attorney));
    }

    let mut risks = Vec::new();
    if matches!(case.priority, CasePriority::High | CasePriority::Urgent) {
        risks.push(format!("Case is marked {} priority", case.priority));
    }
    if documents.is_empty() {
        risks.push("No supporting documents have been uploaded".to_string());
    }
    if let Some(deadline) = next_deadline
        && deadline - now <= Duration::days(7)
    {
        risks.push(format!(
            "Next deadline on {} is less than a week away",
            deadline.format("%Y-%m-%d")
        ));
    }
    if case.assigned_attorney.is_none() {
        risks.push("No attorney is assigned".to_string());
    }

    let mut recommended_actions = Vec::new();
    match case.status {
        CaseStatus::Active => {
            recommended_actions.push("Review the evidence and update the case strategy".to_string())
        }
        CaseStatus::Pending => recommended_actions
            .push("Confirm filing status with the court clerk".to_string()),
        CaseStatus::Appealed => recommended_actions
            .push("Prepare the appellate brief and record on appeal".to_string()),
        CaseStatus::Closed | CaseStatus::Settled => recommended_actions
            .push("Archive the file and send a closing letter to the client".to_string()),
    }
    if processed < documents.len() {
        recommended_actions.push("Run analysis on the remaining documents".to_string());
    }
    if next_deadline.is_none() && matches!(case.status, CaseStatus::Active | CaseStatus::Pending) {
        recommended_actions.push("Schedule the next hearing or filing deadline".to_string());
    }

    CaseAnalysis {
        case_id: case.id,
        strengths,
        risks,
        recommended_actions,
        next_deadline,
        document_count: documents.len(),
        upcoming_event_count: upcoming.len(),
    }
}

// =============================================================================
// TEXT HELPERS
// =============================================================================

/// Splits on sentence punctuation and line breaks, dropping the punctuation.
fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Lowercased alphanumeric words.
fn words(text: &str) -> std::collections::BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Entries of `list` that occur in `text`, in list order.
fn keywords_in<'a>(text: &str, list: &[&'a str]) -> Vec<&'a str> {
    let lower = text.to_lowercase();
    list.iter()
        .copied()
        .filter(|k| lower.contains(k))
        .collect()
}

fn strip_speaker(sentence: &str) -> &str {
    match sentence.split_once(": ") {
        Some((speaker, rest)) if !speaker.contains(' ') => rest,
        _ => sentence,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewCase, NewDocument, NewEvent};
    use crate::DocumentType;

    const BRIEF: &str = "The plaintiff filed suit in March. The defendant denies liability. \
        Both sides met for coffee! The court will hear the motion next week. \
        Nothing else happened.";

    #[test]
    fn call_transcript_follows_call_length() {
        let transcript = transcribe_call(CallLogId(4), 18 * 60);
        assert_eq!(transcript.file_name, "call-4.wav");
        assert_eq!(transcript.duration_seconds, 18 * 60);
        assert_eq!(transcribe_call(CallLogId(4), 0).duration_seconds, 1);
    }

    #[test]
    fn summary_takes_leading_sentences() {
        let analysis = summarize_text(BRIEF);
        assert_eq!(
            analysis.summary,
            "The plaintiff filed suit in March. The defendant denies liability. Both sides met for coffee."
        );
        assert_eq!(analysis.key_points.len(), 3);
        assert!(analysis.key_points.iter().all(|p| !p.contains("coffee")));
        assert_eq!(analysis.word_count, 26);
    }

    #[test]
    fn empty_text_has_fixed_summary() {
        let analysis = summarize_text("   ");
        assert_eq!(analysis.summary, NO_TEXT_SUMMARY);
        assert!(analysis.key_points.is_empty());
    }

    #[test]
    fn long_summary_is_truncated_on_char_boundary() {
        let text = "é".repeat(2_000);
        let analysis = summarize_text(&text);
        assert!(analysis.summary.chars().count() <= MAX_SUMMARY_CHARS + 3);
        assert!(analysis.summary.ends_with("..."));
    }

    #[test]
    fn binary_document_gets_canned_extraction() {
        let form = NewDocument {
            file_name: "contract.pdf".to_string(),
            title: "Lease".to_string(),
            mime_type: "application/pdf".to_string(),
            document_type: DocumentType::Contract,
            ..NewDocument::default()
        };
        let doc = Document::from_form(form, b"%PDF-1.7", None, Utc::now());
        let analysis = analyze_document(&doc, b"%PDF-1.7");
        assert!(analysis.extracted_text.contains("contract.pdf"));
        assert_eq!(analysis, analyze_document(&doc, b"%PDF-1.7"));
    }

    #[test]
    fn transcript_duration_follows_size() {
        let transcript = transcribe_audio("call.mp3", 320_000);
        assert_eq!(transcript.duration_seconds, 20);
        assert_eq!(transcript.segments.len(), CANNED_CONVERSATION.len());
        assert_eq!(transcript.segments[0].start_seconds, 0);
        assert_eq!(transcribe_audio("tiny.mp3", 10).duration_seconds, 1);
    }

    #[test]
    fn insights_from_canned_transcript() {
        let transcript = transcribe_audio("call.mp3", 64_000);
        let insights = call_insights(&transcript.text);
        assert_eq!(insights.sentiment, Sentiment::Positive);
        assert_eq!(insights.action_items.len(), 2);
        assert!(insights.action_items[0].starts_with("We will review"));
        assert!(insights.key_topics.contains(&"settlement".to_string()));
    }

    #[test]
    fn negative_call() {
        let insights = call_insights("Client is upset about the delay. There is a dispute.");
        assert_eq!(insights.sentiment, Sentiment::Negative);
    }

    #[test]
    fn research_ranks_by_overlap() {
        let result = legal_research("breach of contract damages", None).unwrap();
        assert_eq!(result.jurisdiction, DEFAULT_JURISDICTION);
        assert_eq!(result.authorities[0].title, "Hadley v. Baxendale");
        assert_eq!(result.authorities[0].relevance, 3);

        let none = legal_research("zoning variance", Some("California")).unwrap();
        assert!(none.authorities.is_empty());
        assert_eq!(none.jurisdiction, "California");

        assert!(legal_research("  ", None).is_err());
    }

    #[test]
    fn case_analysis_flags_missing_documents_and_close_deadlines() {
        let now = Utc::now();
        let form = NewCase {
            case_number: "CV-9".to_string(),
            title: "Doe v. Roe".to_string(),
            client_name: "Doe".to_string(),
            priority: CasePriority::Urgent,
            ..NewCase::default()
        };
        let case = Case::from_form(form, None, now);
        let mut deadline = NewEvent::new("Answer due", now + Duration::days(2));
        deadline.event_type = EventType::Deadline;
        let event = CalendarEvent::from_form(deadline, None, now);

        let analysis = analyze_case(&case, &[], &[event], now);
        assert_eq!(analysis.next_deadline, Some(now + Duration::days(2)));
        assert_eq!(analysis.upcoming_event_count, 1);
        assert!(analysis.risks.iter().any(|r| r.contains("urgent")));
        assert!(analysis.risks.iter().any(|r| r.contains("No supporting documents")));
    }

    #[test]
    fn audio_whitelist() {
        assert!(is_allowed_audio_type("audio/mpeg"));
        assert!(is_allowed_audio_type("Audio/WAV; rate=8000"));
        assert!(!is_allowed_audio_type("video/mp4"));
    }
}
