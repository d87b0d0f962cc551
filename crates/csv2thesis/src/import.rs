use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use csv2thesis_client::BlockingApi;
use csv2thesis_core::ReferenceCache;
use csv2thesis_extract::Extractor;

use crate::batch::{run_batch, BatchOptions};
use crate::config::ImportConfig;
use crate::logging;
use crate::policy::{AutoPolicy, DecisionPolicy, InteractivePolicy};
use crate::reader;
use crate::resolve::ResolveOptions;
use crate::sink::{ApiSink, CommitSink, ShadowSink};

pub struct ImportArgs {
    pub csv_file: String,
    pub url: Option<String>,
    pub token: Option<String>,
    pub non_interactive: bool,
    pub dry_run: bool,
    pub start_from: usize,
    pub threshold: Option<f64>,
    pub summary_json: Option<String>,
}

pub fn run(args: ImportArgs) -> Result<()> {
    let config = ImportConfig::from_env()?.with_threshold(args.threshold)?;
    let path = Path::new(&args.csv_file);
    if !path.exists() {
        return Err(anyhow!("file not found: {}", path.display()));
    }
    let mode = if args.dry_run {
        "dry-run"
    } else if args.non_interactive {
        "automatic"
    } else {
        "interactive"
    };
    logging::info(format!(
        "importing {} ({mode} mode, provider {})",
        path.display(),
        config.provider.as_str()
    ));

    let api = BlockingApi::new(args.url, args.token)
        .context("failed to initialize the Thesis Manager client")?;
    let extractor = Extractor::new(config.provider, config.model.clone())
        .context("failed to initialize the extractor")?;

    // Reference data must load in full before any row is touched.
    let people = api
        .list_people()
        .context("failed to load people from the Thesis Manager")?;
    let theses = api
        .list_theses()
        .context("failed to load theses from the Thesis Manager")?;
    logging::info(format!(
        "loaded {} people and {} theses from {}",
        people.len(),
        theses.len(),
        api.base_url()
    ));
    let mut cache = ReferenceCache::new(people, theses);

    let rows = reader::read_rows(path)?;
    if rows.is_empty() {
        return Err(anyhow!("no data rows found in {}", path.display()));
    }
    logging::info(format!("read {} data row(s)", rows.len()));

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        api.runtime().spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let mut policy: Box<dyn DecisionPolicy> = if args.non_interactive {
        Box::new(AutoPolicy)
    } else {
        Box::new(InteractivePolicy::stdio())
    };
    let mut sink: Box<dyn CommitSink + '_> = if args.dry_run {
        Box::new(ShadowSink::seeded(&cache))
    } else {
        Box::new(ApiSink::new(&api))
    };

    let options = BatchOptions {
        start_from: args.start_from,
        resolve: ResolveOptions {
            match_threshold: config.match_threshold,
            title_threshold: config.title_threshold,
        },
        throttle_ms: config.throttle_ms,
    };
    let extract_fn = |row: &reader::RawRow| extractor.extract(&row.fields, row.index);
    let summary = run_batch(
        &rows,
        &extract_fn,
        &mut cache,
        policy.as_mut(),
        sink.as_mut(),
        &options,
        &cancel,
    );

    summary.print();
    if let Some(path) = &args.summary_json {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json).with_context(|| format!("failed to write {path}"))?;
        logging::info(format!("summary written to {path}"));
    }
    Ok(())
}
