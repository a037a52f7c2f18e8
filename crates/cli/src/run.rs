//! The `run` subcommand: prepare, integrate, report, clean up.

use anyhow::{Context, Result};
use tracing::{info, warn};

use patchtester_core::config::AppConfig;
use patchtester_core::errors::{RequestError, RunError};
use patchtester_core::model::{Branch, RequestTree};
use patchtester_core::notify::{Delivery, ReportMailer};
use patchtester_core::report::{self, ReportSection, REPORT_TITLE};
use patchtester_core::requests::{build_tree, FileRequestSource, PatchRequest, RequestSource};
use patchtester_core::{AutoConfirm, Confirmer, P4Backend, P4Client, PatchTester, RunSettings};

use crate::prompt::TerminalConfirm;
use crate::style;
use crate::summary;
use crate::RunArgs;

pub async fn cmd_run(config: &AppConfig, args: RunArgs) -> Result<()> {
    let started = chrono::Local::now();
    println!(
        "{}",
        style::dim(&format!("Run started at {}", started.format("%Y-%m-%d %H:%M:%S")))
    );

    let client = args
        .client
        .clone()
        .or_else(|| config.p4.client.clone())
        .context("no client given: use --client or set p4.client")?;
    let from_prefix = source_prefix(config, &args.from)?;
    let targets = target_branches(config, &args.to)?;

    let p4 = P4Client::new(&config.p4.port, &config.p4.user, &client)
        .with_password(config.p4.password.clone());
    if !p4.client_exists(&client).await? {
        return Err(RunError::ClientNotFound(client).into());
    }

    let mut tree = request_tree(config, &args, &targets[0])?;
    info!(
        requests = tree.requests.len(),
        changes = tree.leaf_count(),
        "request tree built"
    );

    let confirmer: Box<dyn Confirmer> = if args.yes {
        Box::new(AutoConfirm(true))
    } else {
        Box::new(TerminalConfirm)
    };
    let settings = RunSettings {
        client: client.clone(),
        from_prefix: from_prefix.clone(),
        excluded_components: config.integration.excluded_components.clone(),
        description_lines: config.integration.description_lines,
    };
    let mut tester = PatchTester::new(&p4, confirmer.as_ref(), settings, tree.requested_changes());

    let mut sections = Vec::with_capacity(targets.len());
    for target in &targets {
        if let Err(e) = tester.prepare_for_integration(target).await {
            if !tester.created_changelists().is_empty() {
                warn!(
                    changes = ?tester.created_changelists(),
                    "run aborted, changelists left on client"
                );
            }
            return Err(e.into());
        }
        tester.run_integrations(&mut tree, target).await;
        let section = ReportSection::new(&from_prefix, &target.prefix, &tree);
        summary::print_section(&section);
        sections.push(section);
    }

    tester.cleanup(args.dirty).await?;
    if args.dirty {
        println!(
            "{}",
            style::warn(&format!(
                "Client {} left dirty; changelists: {}",
                client,
                tester.created_changelists().join(", ")
            ))
        );
    }

    let html = report::render_document(&sections);
    if let Some(ref path) = args.output {
        std::fs::write(path, &html)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        println!("{}", style::success(&format!("Report written to {}", path.display())));
    }
    if args.json {
        println!("{}", report::to_json(&sections)?);
    }

    if args.no_email {
        info!("report email disabled");
    } else {
        let mailer = ReportMailer::new(&config.notifications, &login_user(config));
        let subject = email_subject(&from_prefix, &targets);
        match mailer.deliver(&subject, &html).await {
            Delivery::Emailed(to) => {
                println!("{}", style::success(&format!("Report emailed to {}", to.join(", "))))
            }
            Delivery::Logged => println!("{}", style::dim("Report written to the log")),
        }
    }

    let elapsed = chrono::Local::now() - started;
    println!(
        "{}",
        style::dim(&format!("Finished in {}s", elapsed.num_seconds()))
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The integration source: a configured release name or a literal depot path.
fn source_prefix(config: &AppConfig, from: &str) -> Result<String, RunError> {
    if from.starts_with("//") {
        return Ok(from.trim_end_matches('/').to_string());
    }
    config
        .branch(from)
        .map(|b| b.prefix)
        .ok_or_else(|| RunError::UnknownBranch(from.to_string()))
}

fn target_branches(config: &AppConfig, names: &[String]) -> Result<Vec<Branch>, RunError> {
    names
        .iter()
        .map(|name| {
            let name = name.trim();
            config
                .branch(name)
                .ok_or_else(|| RunError::UnknownBranch(name.to_string()))
        })
        .collect()
}

/// Build the request tree from explicit changes, explicit request ids, or the
/// pending / accepted requests of the first target's release.
fn request_tree(config: &AppConfig, args: &RunArgs, first: &Branch) -> Result<RequestTree> {
    if !args.changes.is_empty() {
        let changes = args.changes.iter().map(|c| c.trim()).filter(|c| !c.is_empty());
        return Ok(RequestTree::local(changes));
    }

    let path = config
        .requests
        .file
        .as_ref()
        .context("no request source configured: set requests.file or use --changes")?;
    let source = FileRequestSource::load(path)?;

    info!(path = %source.path().display(), "reading patch requests");

    let requests: Vec<PatchRequest> = if !args.requests.is_empty() {
        let mut found = Vec::with_capacity(args.requests.len());
        for id in &args.requests {
            match source.request(id.trim()) {
                Ok(request) => found.push(request),
                Err(RequestError::NotFound(id)) => {
                    warn!(request = %id, "error with request, skipping it")
                }
                Err(e) => return Err(e.into()),
            }
        }
        found
    } else if args.pending {
        source.pending(&first.release_name)?
    } else {
        source.accepted(&first.release_name)?
    };

    if requests.is_empty() {
        warn!(release = %first.release_name, "no patch requests found");
        return Err(RunError::NoRequestData(first.release_name.clone()).into());
    }
    Ok(build_tree(&requests))
}

fn login_user(config: &AppConfig) -> String {
    if !config.p4.user.is_empty() {
        return config.p4.user.clone();
    }
    std::env::var("P4USER")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_default()
}

fn email_subject(from_prefix: &str, targets: &[Branch]) -> String {
    let to: Vec<&str> = targets.iter().map(|t| t.prefix.as_str()).collect();
    format!("{}: from {} to {}", REPORT_TITLE, from_prefix, to.join(", "))
}
