use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tweetguard_lib::models::{AnalysisResponse, Settings};
use tweetguard_lib::services::{
    AnalysisOrchestrator, ConfigStore, FilterAction, JsonFileStore, RequestQueue,
};

const USAGE: &str = "Usage:
  tweetguard [--data-dir <path>] [--provider <gptzero|huggingface>] [--model <owner/name[@rev]>]
             [--api] [--save] [--stats] [--clear-cache] [--reset-stats] < input.txt

Input: one text per line, either `identifier<TAB>text` or bare text (identifier = line number).
Output: one JSON object per line with the analysis result and the filter action.

Notes:
  - Without --api everything is scored locally by the heuristic.
  - GPTZERO_API_KEY / HF_API_KEY override stored keys for this run (never saved).
  - --save persists --provider/--model/--api into the settings store.";

#[derive(Serialize)]
struct CliOutput {
    #[serde(flatten)]
    response: AnalysisResponse,
    action: FilterAction,
}

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// `identifier<TAB>text`, or the whole line keyed by its line number
fn split_line(line: &str, line_no: usize) -> (String, &str) {
    match line.split_once('\t') {
        Some((id, text)) if !id.trim().is_empty() => (id.trim().to_string(), text),
        _ => (line_no.to_string(), line),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        eprintln!("{}", USAGE);
        return Ok(());
    }

    tweetguard_lib::init_logging();

    let data_dir = match parse_arg_value(&args, "--data-dir") {
        Some(dir) => PathBuf::from(dir),
        None => JsonFileStore::default_data_dir()
            .ok_or_else(|| anyhow!("no local data directory; pass --data-dir"))?,
    };
    let store = Arc::new(JsonFileStore::new(data_dir));
    info!(path = %store.path().display(), "[CONFIG] using store");

    let config = ConfigStore::new(store.clone());
    let (settings_tx, settings_rx) = config.channel().await.context("loading settings")?;

    let provider = parse_arg_value(&args, "--provider");
    let model = parse_arg_value(&args, "--model");
    let use_api = has_flag(&args, "--api");
    settings_tx.send_modify(|s: &mut Settings| {
        if let Some(provider) = &provider {
            s.provider = provider.clone();
        }
        if let Some(model) = &model {
            s.hf_model = model.clone();
        }
        if use_api {
            s.local_only = false;
        }
    });
    if has_flag(&args, "--save") {
        let current = settings_tx.borrow().clone();
        config
            .save_and_notify(current, &settings_tx)
            .await
            .context("saving settings")?;
        info!("[CONFIG] settings saved");
    }

    let gptzero_key = env_key("GPTZERO_API_KEY");
    let hf_key = env_key("HF_API_KEY");
    settings_tx.send_modify(|s| {
        if let Some(key) = gptzero_key {
            s.api_key = key;
        }
        if let Some(key) = hf_key {
            s.hf_api_key = key;
        }
    });
    {
        let settings = settings_tx.borrow();
        info!(
            provider = %settings.provider_name(),
            local_only = settings.local_only,
            api_key_len = settings.api_key.len(),
            hf_api_key_len = settings.hf_api_key.len(),
            "[CONFIG] settings ready"
        );
    }

    let queue = RequestQueue::spawn(AnalysisOrchestrator::new(store.clone(), settings_rx));

    if has_flag(&args, "--clear-cache") {
        queue.clear_cache().await.context("clearing cache")?;
        eprintln!("Cache cleared");
    }
    if has_flag(&args, "--reset-stats") {
        queue.reset_stats().await.context("resetting stats")?;
        eprintln!("Stats reset");
    }
    if has_flag(&args, "--stats") {
        let stats = queue.stats().await.context("loading stats")?;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let (identifier, text) = split_line(&line, line_no);
        let response = queue.analyze(text, &identifier).await;

        let filter_settings = settings_tx.borrow().clone().normalized();
        let action = response
            .score
            .map(|score| FilterAction::decide(&filter_settings, score))
            .unwrap_or(FilterAction::None);
        println!("{}", serde_json::to_string(&CliOutput { response, action })?);
    }

    let stats = queue.stats().await.context("loading stats")?;
    info!(
        total = stats.total_analyzed,
        avg = stats.avg_score,
        errors = stats.api_errors,
        fallback = stats.fallback_mode,
        "[STATS] session summary"
    );
    Ok(())
}
