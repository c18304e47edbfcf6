use crate::{
    cli::{actions::Action, mycnf},
    collectors::{SCRAPER_NAMES, Scraper, all_factories},
    exporter::ExporterOptions,
};
use anyhow::{Context, Result, anyhow, bail};
use clap::ArgMatches;
use secrecy::SecretString;
use std::path::PathBuf;
use tracing::info;

pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let listen_address = matches
        .get_one::<String>("web.listen-address")
        .cloned()
        .ok_or_else(|| anyhow!("Listen address is required, use --web.listen-address"))?;

    let metrics_path = matches
        .get_one::<String>("web.telemetry-path")
        .cloned()
        .ok_or_else(|| anyhow!("Telemetry path is required, use --web.telemetry-path"))?;

    if !metrics_path.starts_with('/') || metrics_path == "/" {
        bail!("Telemetry path must start with '/' and cannot be the root path: {metrics_path}");
    }

    let timeout_offset = matches
        .get_one::<f64>("timeout-offset")
        .copied()
        .ok_or_else(|| anyhow!("Timeout offset is required, use --timeout-offset"))?;

    if !timeout_offset.is_finite() || timeout_offset < 0.0 {
        bail!("Timeout offset must be a non-negative number of seconds: {timeout_offset}");
    }

    let dsn = resolve_dsn(matches)?;

    Ok(Action::Run {
        options: ExporterOptions {
            listen_address,
            metrics_path,
            timeout_offset,
            dsn,
            collectors: get_enabled_collectors(matches),
        },
    })
}

/// An explicit `--dsn` wins, otherwise credentials come from the option file.
fn resolve_dsn(matches: &ArgMatches) -> Result<SecretString> {
    if let Some(dsn) = matches.get_one::<String>("dsn") {
        return Ok(SecretString::from(dsn.clone()));
    }

    let path = my_cnf_path(matches)?;
    info!(path = %path.display(), "reading credentials");

    mycnf::load(&path).with_context(|| format!("Error parsing my.cnf {}", path.display()))
}

fn my_cnf_path(matches: &ArgMatches) -> Result<PathBuf> {
    if let Some(path) = matches.get_one::<String>("config.my-cnf") {
        return Ok(PathBuf::from(path));
    }

    let home = std::env::var_os("HOME")
        .ok_or_else(|| anyhow!("HOME is not set, use --config.my-cnf or --dsn"))?;

    Ok(PathBuf::from(home).join(".my.cnf"))
}

pub fn get_enabled_collectors(matches: &ArgMatches) -> Vec<String> {
    let factories = all_factories();

    SCRAPER_NAMES
        .iter()
        .filter(|&name| {
            if matches.get_flag(&format!("no-collect.{name}")) {
                return false;
            }

            if matches.get_flag(&format!("collect.{name}")) {
                return true;
            }

            factories
                .get(name)
                .and_then(|factory| factory().ok())
                .is_some_and(|scraper| scraper.enabled_by_default())
        })
        .map(|&name| name.to_string())
        .collect()
}
