//! Slack Block Kit message builders.
//!
//! Renders job postings for team channels and the ephemeral replies to
//! `post`, `preview` and `status`.

use slack_morphism::prelude::{SlackBlock, SlackBlockText, SlackSectionBlock};

use crate::dispatch::Channel;
use crate::models::Job;
use crate::orchestrator::PreviewEntry;

/// Cap applied to the joined issue list in replies.
pub const MAX_NOTES_CHARS: usize = 1000;
/// Cap applied to the preview job listing.
pub const MAX_PREVIEW_CHARS: usize = 3800;
/// Slack rejects section text longer than 3000 characters.
const MAX_SECTION_CHARS: usize = 2900;

const LABEL_WORK_MODEL: &str = "\u{1f3e1} Work Model";
const LABEL_LOCATION: &str = "\u{1f4cd} Location";
const LABEL_SENIORITY: &str = "\u{1f4c8} Seniority";
const LABEL_CONTRACT: &str = "\u{1f4dc} Contract";
const LABEL_COMPENSATION: &str = "\u{1f4b0} Compensation";
const LABEL_SKILLS: &str = "\u{1f6e0}\u{fe0f} Skills";
const LABEL_KNOWN_TITLES: &str = "\u{1f3ae} Known Titles";

/// Build a plain markdown section block.
#[must_use]
pub fn text_section(text: &str) -> SlackBlock {
    SlackBlock::Section(SlackSectionBlock::new().with_text(SlackBlockText::MarkDown(text.into())))
}

/// Build a severity-formatted section block.
#[must_use]
pub fn severity_section(level: &str, message: &str) -> SlackBlock {
    let prefix = match level {
        "success" => "\u{2705}",
        "warning" => "\u{26a0}\u{fe0f}",
        "error" => "\u{274c}",
        _ => "\u{2139}\u{fe0f}",
    };
    text_section(&format!("{prefix} {message}"))
}

/// Title line of a job posting, with the team emoji.
#[must_use]
pub fn job_heading(job: &Job) -> String {
    format!("{} {}", job.team.emoji(), job.title)
}

/// Plain-text fallback for notifications.
#[must_use]
pub fn job_fallback_text(job: &Job) -> String {
    format!("{} @ {}", job_heading(job), job.company)
}

/// Short labelled facts about a job, in display order. Absent facts are
/// omitted.
///
/// The work model falls back to `Remote`/`Onsite` when only the remote
/// flag is known.
#[must_use]
pub fn job_fields(job: &Job) -> Vec<(&'static str, String)> {
    let work_model = job.work_model.clone().or_else(|| {
        job.remote_friendly
            .map(|remote| if remote { "Remote" } else { "Onsite" }.to_owned())
    });

    [
        (LABEL_WORK_MODEL, work_model),
        (LABEL_LOCATION, job.location.clone()),
        (LABEL_SENIORITY, job.seniority.clone()),
        (LABEL_CONTRACT, job.contract_type.clone()),
        (LABEL_COMPENSATION, job.compensation.clone()),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.map(|value| (label, value)))
    .collect()
}

/// Full posting as shown in a team channel.
#[must_use]
pub fn job_blocks(job: &Job) -> Vec<SlackBlock> {
    let heading = match job.origin() {
        Some(url) => format!("*<{url}|{}>*", job_heading(job)),
        None => format!("*{}*", job_heading(job)),
    };
    let mut header = format!("{heading}\n_{}_", job.company);
    if let Some(summary) = &job.summary {
        header.push_str("\n\n");
        header.push_str(summary);
    }
    let mut blocks = vec![text_section(&header)];

    let fields: Vec<SlackBlockText> = job_fields(job)
        .into_iter()
        .map(|(label, value)| SlackBlockText::MarkDown(format!("*{label}*\n{value}").into()))
        .collect();
    if !fields.is_empty() {
        blocks.push(SlackBlock::Section(SlackSectionBlock::new().with_fields(fields)));
    }

    if !job.skills.is_empty() {
        blocks.push(text_section(&format!("*{LABEL_SKILLS}*\n{}", job.skills.join(", "))));
    }
    if !job.known_titles.is_empty() {
        blocks.push(text_section(&format!(
            "*{LABEL_KNOWN_TITLES}*\n{}",
            job.known_titles.join(", ")
        )));
    }

    blocks.push(text_section(&format!("_Team: {}_", job.team)));
    blocks
}

/// Failure reply with optional details.
#[must_use]
pub fn error_blocks(title: &str, description: &str, details: Option<&str>) -> Vec<SlackBlock> {
    let mut blocks = vec![text_section(&format!("\u{26a0}\u{fe0f} *{title}*\n{description}"))];
    if let Some(details) = details.filter(|d| !d.is_empty()) {
        blocks.extend(chunked_sections(&format!("*Details*\n{details}")));
    }
    blocks
}

/// Reply for a collection that produced no jobs.
#[must_use]
pub fn nothing_found_blocks(action: &str, issues: &[String]) -> Vec<SlackBlock> {
    let details = if issues.is_empty() {
        "Inspect the provided reference and try again.".to_owned()
    } else {
        notes_text(issues)
    };
    error_blocks(
        &format!("{action} failed"),
        "No job listings were detected.",
        Some(&details),
    )
}

/// Summary reply for a completed `post`.
#[must_use]
pub fn post_summary_blocks(posted: &[(Job, Channel)], issues: &[String]) -> Vec<SlackBlock> {
    let description = if posted.is_empty() {
        "No jobs were posted because of routing errors.".to_owned()
    } else {
        posted
            .iter()
            .map(|(job, channel)| format!("\u{2022} {} @ {} \u{2192} <#{}>", job.title, job.company, channel.id))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut blocks = vec![text_section("\u{1f4ec} *Job posting summary*")];
    blocks.extend(chunked_sections(&description));
    blocks.push(text_section(&format!("*Jobs posted:* {}", posted.len())));
    if !issues.is_empty() {
        blocks.push(text_section(&format!("*Notes*\n{}", notes_text(issues))));
    }
    blocks
}

/// Reply for a `preview`.
#[must_use]
pub fn preview_blocks(entries: &[PreviewEntry], issues: &[String]) -> Vec<SlackBlock> {
    let listing = entries
        .iter()
        .map(|entry| {
            format!(
                "\u{2022} {} @ {} \u{2192} {}\n  Source: {}",
                entry.job.title, entry.job.company, entry.target, entry.source
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut blocks = vec![text_section("\u{1f9ea} *Job preview*")];
    blocks.extend(chunked_sections(&ellipsize(&listing, MAX_PREVIEW_CHARS)));
    blocks.push(text_section(&format!("*Jobs found:* {}", entries.len())));
    if !issues.is_empty() {
        blocks.push(text_section(&format!("*Notes*\n{}", notes_text(issues))));
    }
    blocks
}

/// Reply for `status`: one line per team route plus the cached count.
#[must_use]
pub fn status_blocks(route_lines: &[String], cached_routes: usize) -> Vec<SlackBlock> {
    let body = if route_lines.is_empty() {
        "No team channels configured.".to_owned()
    } else {
        route_lines.join("\n")
    };
    vec![
        text_section("\u{1f4ca} *job-caster status*"),
        text_section(&body),
        text_section(&format!("_Cached routes: {cached_routes}_")),
    ]
}

/// Issues joined one per line, capped at [`MAX_NOTES_CHARS`].
#[must_use]
pub fn notes_text(issues: &[String]) -> String {
    issues.join("\n").chars().take(MAX_NOTES_CHARS).collect()
}

/// Cap `text` at `max` characters, ending with an ellipsis when cut.
#[must_use]
pub fn ellipsize(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('\u{2026}');
    cut
}

/// Split long text across sections, preferring line boundaries.
fn chunked_sections(text: &str) -> Vec<SlackBlock> {
    let mut sections = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        let line = ellipsize(line, MAX_SECTION_CHARS);
        if !current.is_empty() && current.chars().count() + line.chars().count() + 1 > MAX_SECTION_CHARS {
            sections.push(text_section(&current));
            current.clear();
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&line);
    }
    if !current.is_empty() {
        sections.push(text_section(&current));
    }
    sections
}
