use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use massreply::channels::{ImapMailbox, SmtpSender};
use massreply::config::RunConfig;
use massreply::pipeline::{Pipeline, ReportLine, RunError};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = match RunConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let pipeline = match Pipeline::new(config.reply.clone(), &config.smtp.user, Arc::clone(&cancel))
    {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, finishing current message");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    if config.reply.dry_run {
        info!("dry run: replies will be composed but not sent");
    }

    let outcome = tokio::task::spawn_blocking(move || {
        let source = ImapMailbox::open(&config.imap).map_err(|source| RunError {
            source,
            report: Vec::new(),
        })?;
        let mut transport = SmtpSender::connect(&config.smtp).map_err(|source| RunError {
            source,
            report: Vec::new(),
        })?;
        pipeline.run(source, &mut transport)
    })
    .await?;

    match outcome {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(run_error) => {
            print_report(&run_error.report);
            error!(
                error = %run_error,
                replies_before_failure = run_error.report.len(),
                "run aborted"
            );
            std::process::exit(1);
        }
    }
}

/// One JSON line per reply on stdout.
fn print_report(report: &[ReportLine]) {
    for line in report {
        match serde_json::to_string(line) {
            Ok(json) => println!("{json}"),
            Err(e) => error!(error = %e, "failed to serialize report line"),
        }
    }
}
