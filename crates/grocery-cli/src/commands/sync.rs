use grocery_core::sync::MergeCounts;
use grocery_core::{RemoteApi, Repository, SyncOutcome, SyncReport};
use serde::Serialize;

use crate::commands::common::{format_relative_time, format_sync_timestamp, now_ms};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub api_base_url: String,
    pub user_id: String,
    pub lists: usize,
    pub pending_mirrors: usize,
    pub last_sync_time: Option<i64>,
    pub last_sync_time_iso: Option<String>,
    pub last_sync_duration_ms: Option<u128>,
}

pub async fn run_sync<R: RemoteApi>(repo: &Repository<R>, force: bool) -> Result<(), CliError> {
    if force {
        let report = repo.force_full_sync().await?;
        println!("{}", format_sync_report(&report));
        return Ok(());
    }

    match repo.smart_sync().await? {
        SyncOutcome::Skipped { since_last_ms } => {
            println!(
                "Sync skipped; last sync was {}s ago (use --force to sync now)",
                since_last_ms / 1000
            );
        }
        SyncOutcome::Completed(report) => println!("{}", format_sync_report(&report)),
    }
    Ok(())
}

pub async fn run_status<R: RemoteApi>(repo: &Repository<R>, as_json: bool) -> Result<(), CliError> {
    let status = status_report(repo).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Backend:          {}", status.api_base_url);
    println!("User:             {}", status.user_id);
    println!("Lists:            {}", status.lists);
    println!("Pending writes:   {}", status.pending_mirrors);
    match status.last_sync_time {
        Some(time) => println!(
            "Last sync:        {} ({}, took {}ms)",
            format_sync_timestamp(time),
            format_relative_time(time, now_ms()),
            status.last_sync_duration_ms.unwrap_or_default()
        ),
        None => println!("Last sync:        never"),
    }
    Ok(())
}

pub async fn status_report<R: RemoteApi>(repo: &Repository<R>) -> Result<StatusReport, CliError> {
    let last_sync_time = repo.last_sync_time().await?;
    Ok(StatusReport {
        api_base_url: repo.config().api_base_url.clone(),
        user_id: repo.config().user_id.clone(),
        lists: repo.lists().await?.len(),
        pending_mirrors: repo.pending_mirrors().await?,
        last_sync_time,
        last_sync_time_iso: last_sync_time.map(format_sync_timestamp),
        last_sync_duration_ms: repo
            .last_sync_duration()
            .await?
            .map(|duration| duration.as_millis()),
    })
}

pub async fn run_clear_all<R: RemoteApi>(repo: &Repository<R>, yes: bool) -> Result<(), CliError> {
    if !yes {
        return Err(CliError::ConfirmationRequired);
    }

    let report = repo.clear_all_data().await?;
    println!(
        "Deleted {} list(s) and {} item(s) locally",
        report.lists_removed, report.items_removed
    );
    let message = report.remote_message.unwrap_or_default();
    if report.remote_cleared {
        println!("Backend: {message}");
    } else {
        println!("Backend wipe failed: {message}");
    }
    Ok(())
}

pub fn format_sync_report(report: &SyncReport) -> String {
    let mut line = format!(
        "Sync completed in {}ms: lists {}, items {}",
        report.duration_ms,
        format_counts(report.lists),
        format_counts(report.items)
    );
    if report.mirrors_delivered > 0 || report.mirrors_pending > 0 {
        line.push_str(&format!(
            "; {} pending write(s) delivered, {} still queued",
            report.mirrors_delivered, report.mirrors_pending
        ));
    }
    line
}

fn format_counts(counts: MergeCounts) -> String {
    format!(
        "+{} ~{} ={}",
        counts.inserted, counts.updated, counts.skipped
    )
}
