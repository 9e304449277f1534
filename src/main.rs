//! Loan Risk Pipeline - Batch Scoring Entry Point
//!
//! Reads newline-delimited application JSON from a file or stdin, scores
//! each application concurrently, and writes one prediction per line to
//! stdout.
//!
//! Usage: loan-risk-pipeline [CONFIG] [INPUT]
//! INPUT defaults to stdin; "-" also means stdin.

use anyhow::{Context, Result};
use loan_risk_pipeline::{
    config::{AppConfig, LoggingConfig},
    metrics::PipelineMetrics,
    ApplicationRecord, PredictionResult, ScoringContext,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// One output line: the input line number plus the prediction
#[derive(Serialize)]
struct ScoredLine<'a> {
    line: u64,
    #[serde(flatten)]
    prediction: &'a PredictionResult,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config_path = args.get(1).map(|s| s.as_str());
    let input_path = args.get(2).map(|s| s.as_str()).filter(|p| *p != "-");

    // Load configuration
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None if Path::new("config/config.toml").exists() => AppConfig::load()?,
        None => AppConfig::default(),
    };

    init_tracing(&config.logging)?;

    info!("Starting Loan Risk Pipeline");
    info!(
        workers = config.pipeline.workers,
        top_factors = config.explain.top_factors,
        "Configuration loaded successfully"
    );

    // Reference data failures are fatal: nothing can be scored without it
    let context = Arc::new(
        ScoringContext::from_config(&config).context("Failed to initialize scoring context")?,
    );
    info!(
        "Scoring context ready ({} features)",
        context.assembler().feature_count()
    );

    let metrics = Arc::new(PipelineMetrics::new());

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match input_path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input {}", path))?;
            info!(input = %path, "Reading applications from file");
            Box::new(BufReader::new(file))
        }
        None => {
            info!("Reading applications from stdin");
            Box::new(BufReader::new(tokio::io::stdin()))
        }
    };

    run_batch(
        context,
        metrics.clone(),
        reader,
        tokio::io::stdout(),
        config.pipeline.workers,
    )
    .await?;

    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}

/// Score every line of `input`, writing predictions to `output`.
///
/// At most `workers` lines are in flight. Lines that are not UTF-8, not
/// valid application JSON, or fail to score are counted as failures and
/// skipped; only I/O errors end the run. Returns `output` once flushed.
async fn run_batch<R, W>(
    context: Arc<ScoringContext>,
    metrics: Arc<PipelineMetrics>,
    input: R,
    output: W,
    workers: usize,
) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let workers = workers.max(1);
    let semaphore = Arc::new(Semaphore::new(workers));

    // Single writer keeps output lines whole
    let (tx, mut rx) = mpsc::channel::<String>(workers * 4);
    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(line) = rx.recv().await {
            output.write_all(line.as_bytes()).await?;
        }
        output.flush().await?;
        Ok::<W, std::io::Error>(output)
    });

    let mut segments = input.split(b'\n');
    let mut line_no: u64 = 0;
    let mut tasks = JoinSet::new();

    while let Some(mut bytes) = segments.next_segment().await? {
        line_no += 1;
        reap_finished(&mut tasks);

        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        let line = match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(e) => {
                metrics.record_failure();
                warn!(line = line_no, error = %e, "Skipping line that is not valid UTF-8");
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        // Acquire permit (limits concurrent tasks)
        let permit = semaphore.clone().acquire_owned().await?;

        let context = context.clone();
        let metrics = metrics.clone();
        let tx = tx.clone();
        let current_line = line_no;

        tasks.spawn_blocking(move || {
            score_line(&context, &metrics, &tx, current_line, &line);
            // Release permit when done
            drop(permit);
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Scoring task panicked");
        }
    }

    drop(tx);
    let output = writer
        .await
        .context("Output writer task failed")?
        .context("Failed to write predictions")?;

    Ok(output)
}

/// Drop handles of tasks that already finished
fn reap_finished(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.try_join_next() {
        if let Err(e) = joined {
            error!(error = %e, "Scoring task panicked");
        }
    }
}

/// Parse, score and queue one input line. Runs on the blocking pool.
fn score_line(
    context: &ScoringContext,
    metrics: &PipelineMetrics,
    tx: &mpsc::Sender<String>,
    line_no: u64,
    line: &str,
) {
    let start_time = Instant::now();

    let application = match serde_json::from_str::<ApplicationRecord>(line) {
        Ok(application) => application,
        Err(e) => {
            metrics.record_failure();
            warn!(line = line_no, error = %e, "Failed to deserialize application");
            return;
        }
    };

    let prediction = match context.predict(&application) {
        Ok(prediction) => prediction,
        Err(e) => {
            metrics.record_failure();
            error!(line = line_no, error = %e, "Scoring failed");
            return;
        }
    };

    let processing_time = start_time.elapsed();
    metrics.record_prediction(processing_time, &prediction);

    let scored = ScoredLine {
        line: line_no,
        prediction: &prediction,
    };
    match serde_json::to_string(&scored) {
        Ok(json) => {
            if tx.blocking_send(json + "\n").is_err() {
                error!(line = line_no, "Output writer closed");
            }
        }
        Err(e) => {
            error!(line = line_no, error = %e, "Failed to serialize prediction");
        }
    }

    debug!(
        line = line_no,
        pd_score = prediction.pd_score,
        decision = %prediction.decision,
        processing_time_us = processing_time.as_micros(),
        "Application scored"
    );
}

/// Initialize logging to stderr; stdout carries predictions
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("loan_risk_pipeline={}", logging.level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}
