// crates/server/src/demo.rs
//! Simulated generation pipeline for demo mode.
//!
//! Walks through every pipeline phase with intra-phase checkpoints so a
//! client can be exercised end to end. Nothing is fetched.

use std::time::{Duration, Instant};

use sponge_core::ProgressReporter;
use sponge_types::{JobResult, JobStatus, ProgressEvent};

/// Number of pages the simulated crawl "discovers".
pub const DEMO_PAGES: u64 = 6;

/// Run the simulated pipeline for `url`, sleeping `step` between checkpoints.
pub async fn run_demo_pipeline(
    reporter: ProgressReporter,
    url: String,
    step: Duration,
) -> Result<JobResult, String> {
    let started = Instant::now();
    let base = url.trim_end_matches('/').to_string();

    enter(&reporter, JobStatus::Discovering, "Analyzing website structure...").await?;
    tokio::time::sleep(step).await;
    reporter
        .checkpoint(
            ProgressEvent::new(reporter.job_id(), JobStatus::Discovering, format!("Found {DEMO_PAGES} pages"))
                .with_urls_found(DEMO_PAGES),
        )
        .await;

    enter(&reporter, JobStatus::Extracting, "Fetching pages...").await?;
    for n in 1..=DEMO_PAGES {
        tokio::time::sleep(step).await;
        reporter
            .checkpoint(
                ProgressEvent::new(reporter.job_id(), JobStatus::Extracting, format!("Fetched page {n} of {DEMO_PAGES}"))
                    .with_urls_found(DEMO_PAGES)
                    .with_counts(n, DEMO_PAGES)
                    .with_current_url(format!("{base}/page-{n}")),
            )
            .await;
    }

    enter(&reporter, JobStatus::Enhancing, "Summarizing pages...").await?;
    for n in 1..=DEMO_PAGES {
        tokio::time::sleep(step).await;
        reporter
            .checkpoint(
                ProgressEvent::new(reporter.job_id(), JobStatus::Enhancing, format!("Summarized page {n} of {DEMO_PAGES}"))
                    .with_counts(n, DEMO_PAGES),
            )
            .await;
    }

    enter(&reporter, JobStatus::Generating, "Assembling llms.txt...").await?;
    tokio::time::sleep(step).await;

    let mut llms_txt = format!("# {base}\n\n## Pages\n\n");
    for n in 1..=DEMO_PAGES {
        llms_txt.push_str(&format!("- [Page {n}]({base}/page-{n})\n"));
    }

    Ok(JobResult {
        llms_txt,
        llms_full_txt_url: None,
        total_pages: DEMO_PAGES,
        pages_processed: DEMO_PAGES,
        pages_failed: 0,
        generation_time_seconds: started.elapsed().as_secs_f64(),
        llm_calls_made: DEMO_PAGES,
        llm_cost_usd: 0.0,
    })
}

async fn enter(reporter: &ProgressReporter, phase: JobStatus, message: &str) -> Result<(), String> {
    match reporter.phase(phase, message).await {
        Ok(true) => Ok(()),
        Ok(false) => Err("Job was finished before the pipeline".to_string()),
        Err(e) => Err(e.to_string()),
    }
}
