//! Terminal rendering of jobs

use colored::*;
use deckwatch_core::domain::assessment::{Assessment, ScoreBand};
use deckwatch_core::domain::job::{Job, JobStatus};
use deckwatch_core::dto::job::JobStatusSummary;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Print a one-job summary, as used by `list`
pub fn print_job_summary(job: &Job) {
    println!("  {} {}", "▸".cyan(), job.display_name().bold());
    println!("    ID:       {}", job.id.to_string().dimmed());
    println!("    Status:   {}", colorize_status(job.status));
    if let Some(assessment) = &job.assessment {
        println!(
            "    Score:    {}",
            colorize_score(assessment.overall_score, assessment.band())
        );
    }
    println!(
        "    Created:  {}",
        job.created_at.format(TIME_FORMAT).to_string().dimmed()
    );
    println!();
}

/// Print detailed job information
pub fn print_job_details(job: &Job) {
    println!("{}", "Deal Details:".bold());
    println!("  ID:          {}", job.id.to_string().cyan());
    println!("  Status:      {}", colorize_status(job.status));
    println!("  Created:     {}", job.created_at.format(TIME_FORMAT));

    if let Some(processed) = job.processed_at {
        println!("  Processed:   {}", processed.format(TIME_FORMAT));

        let duration = processed.signed_duration_since(job.created_at);
        println!("  Duration:    {}s", duration.num_seconds());
    }

    if let Some(fields) = job.extracted_fields() {
        println!("\n{}", "Company:".bold());
        let rows = [
            ("Name", fields.company_name),
            ("Website", fields.website),
            ("Location", fields.location),
            ("Funding ask", fields.funding_ask),
        ];
        for (label, value) in rows {
            if let Some(value) = value {
                println!("  {:<12} {}", format!("{}:", label), value);
            }
        }
        if let Some(description) = fields.description {
            println!("\n  {}", description);
        }
    }

    let people = job.people_in_order();
    if !people.is_empty() {
        println!("\n{}", "Team:".bold());
        for person in people {
            if person.title.is_empty() {
                println!("  {} {}", "•".cyan(), person.name);
            } else {
                println!("  {} {} ({})", "•".cyan(), person.name, person.title.dimmed());
            }
            if !person.background.is_empty() {
                println!("    {}", person.background.dimmed());
            }
            if let Some(url) = &person.linkedin_url {
                println!("    {}", url.dimmed());
            }
        }
    }

    if let Some(assessment) = &job.assessment {
        print_assessment(assessment);
    }

    if let Some(error) = &job.error_message {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

fn print_assessment(assessment: &Assessment) {
    println!("\n{}", "Assessment:".bold());
    println!(
        "  Overall:     {} ({})",
        colorize_score(assessment.overall_score, assessment.band()),
        assessment.band()
    );
    for (label, score) in assessment.score_breakdown() {
        println!("  {:<12} {:>2}/10", format!("{}:", label), score);
    }

    print_bullets("Strengths", &assessment.strengths, "+".green());
    print_bullets("Concerns", &assessment.concerns, "-".yellow());

    if !assessment.investment_thesis.is_empty() {
        println!("\n{}", "Investment Thesis:".bold());
        println!("{}", assessment.investment_thesis);
    }
}

fn print_bullets(title: &str, entries: &[String], marker: ColoredString) {
    let items = bullet_items(entries);
    if items.is_empty() {
        return;
    }

    println!("\n{}", format!("{}:", title).bold());
    for item in items {
        println!("  {} {}", marker, item);
    }
}

/// Print the lightweight status payload
pub fn print_status_summary(summary: &JobStatusSummary) {
    let name = summary.company_name.as_deref().unwrap_or("Processing...");
    println!("{} {}", name.bold(), summary.id.to_string().dimmed());
    println!("  Status:    {}", colorize_status(summary.status));
    if let Some(processed) = summary.processed_at {
        println!("  Processed: {}", processed.format(TIME_FORMAT));
    }
    if let Some(error) = &summary.error_message {
        println!("  Error:     {}", error.red());
    }
}

/// Splits list entries into display bullets
///
/// Older snapshots carry a single newline-delimited text block with its own
/// bullet markers; those are split and stripped here.
pub fn bullet_items(entries: &[String]) -> Vec<&str> {
    entries
        .iter()
        .flat_map(|entry| entry.lines())
        .map(|line| line.trim().trim_start_matches(['-', '*', '•']).trim())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Colorize job status for display
pub fn colorize_status(status: JobStatus) -> ColoredString {
    let status_str = status.to_string();
    match status {
        JobStatus::Pending => status_str.dimmed(),
        JobStatus::Submitted => status_str.yellow(),
        JobStatus::Processing => status_str.cyan(),
        JobStatus::Completed => status_str.green(),
        JobStatus::Failed => status_str.red(),
    }
}

fn colorize_score(score: f64, band: ScoreBand) -> ColoredString {
    let score_str = format!("{:.1}", score);
    match band {
        ScoreBand::Strong => score_str.green().bold(),
        ScoreBand::Promising => score_str.yellow(),
        ScoreBand::Weak => score_str.red(),
    }
}
