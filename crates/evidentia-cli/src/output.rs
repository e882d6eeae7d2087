//! Terminal rendering for reports and audit trails

use colored::{ColoredString, Colorize};
use std::collections::BTreeMap;

use evidentia_core::audit::{AuditRecord, ChainVerification};
use evidentia_core::corpus::StandardsCorpus;
use evidentia_core::error::{AuditError, CorpusError};
use evidentia_core::{PipelineStage, RunReport, StandardStatus};

fn status_label(status: StandardStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        StandardStatus::Done => label.green().bold(),
        StandardStatus::Gap => label.yellow().bold(),
        StandardStatus::Failed => label.red().bold(),
        StandardStatus::NotAttempted => label.dimmed(),
    }
}

pub fn print_report(report: &RunReport) {
    let stage = match report.stage {
        PipelineStage::Done => report.stage.to_string().green().bold(),
        _ => report.stage.to_string().red().bold(),
    };
    println!("{} {} ({})", "RUN".bold(), report.run_id, stage);
    println!("   scorer: {}", report.scorer_used);

    for id in &report.standards_scope {
        let Some(status) = report.status(id) else {
            continue;
        };
        println!();
        println!("{} {}", status_label(status), id.bold());

        if let Some(narrative) = report.narratives.get(id) {
            println!("   {}", narrative.text);
            for citation in &narrative.citations {
                println!("   {} {}", citation.marker_label().cyan(), citation.text);
            }
        }
        for reason in report.reasons.get(id).into_iter().flatten() {
            println!("   {} {}", "!".red(), reason);
        }
    }

    let counts = report.counts();
    println!();
    println!(
        "{} done, {} gap, {} failed, {} not attempted",
        counts.done.to_string().green(),
        counts.gap.to_string().yellow(),
        counts.failed.to_string().red(),
        counts.not_attempted
    );
    if let Some(error) = &report.error {
        println!("{} {}", "WARNING".yellow().bold(), error);
    }
    println!("audit chain: {} (head {})", report.audit_chain_id, report.audit_head);
}

pub fn print_records(run_id: &str, records: &[AuditRecord]) {
    println!("{} {} ({} records)", "AUDIT".bold(), run_id, records.len());
    for record in records {
        let hash = record.record_hash.to_hex();
        println!(
            "{:>4}  {}  {:<10}  {}  {}",
            record.sequence_number,
            record.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            record.actor.to_string().cyan(),
            record.action,
            hash[..12].dimmed()
        );
    }
}

pub fn print_verification(run_id: &str, verification: &ChainVerification) {
    if verification.valid {
        println!(
            "{} {}: {} records verified",
            "VALID".green().bold(),
            run_id,
            verification.checked
        );
    } else {
        println!("{} {}", "BROKEN".red().bold(), run_id);
        for issue in &verification.issues {
            println!("   {} {}", "-".red(), issue);
        }
    }
}

pub fn print_chain_error(run_id: &str, error: &AuditError) {
    println!("{} {}", "BROKEN".red().bold(), run_id);
    println!("   {} {}", "-".red(), error);
}

pub fn print_standards_summary(corpus: &StandardsCorpus) {
    let mut per_accreditor: BTreeMap<&str, usize> = BTreeMap::new();
    for standard in corpus.iter() {
        *per_accreditor.entry(standard.accreditor.as_str()).or_default() += 1;
    }

    println!(
        "{} {} standards, {} roots",
        "OK".green().bold(),
        corpus.len(),
        corpus.roots().len()
    );
    for (accreditor, count) in per_accreditor {
        println!("   {accreditor}: {count}");
    }
}

pub fn print_validation_error(error: &CorpusError) {
    println!("{} {}", "INVALID".red().bold(), error);
}
