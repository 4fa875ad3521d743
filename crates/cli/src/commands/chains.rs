use std::path::Path;
use std::process;
use std::sync::Arc;

use yinyang_lineage::{CacheStatus, Chain, ChainCache, LineageConfig};

use crate::{load_store, print_json, report_error, runtime, OutputFormat};

pub(crate) fn cmd_chains(
    records: &Path,
    config: LineageConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let store = Arc::new(load_store(records, output, quiet));
    let rt = runtime(output, quiet);
    let cache = ChainCache::new(store, config);
    let view = rt.block_on(cache.get());

    if view.status == CacheStatus::Unavailable {
        report_error("record store unavailable", output, quiet);
        process::exit(1);
    }

    match output {
        OutputFormat::Json => print_json(&view),
        OutputFormat::Text => {
            for chain in view.chains.iter() {
                println!("{}", format_chain(chain));
            }
            if !quiet {
                eprintln!(
                    "{} chain{}, {} issue{}",
                    view.chains.len(),
                    if view.chains.len() == 1 { "" } else { "s" },
                    view.issues.len(),
                    if view.issues.len() == 1 { "" } else { "s" },
                );
                for issue in view.issues.iter() {
                    eprintln!("  {}", issue);
                }
            }
        }
    }
}

/// `A -> B (good) -> C (bad)`
fn format_chain(chain: &Chain) -> String {
    chain
        .links()
        .iter()
        .map(|link| match link.from_variant {
            Some(variant) => format!("{} ({})", link.request_id, variant),
            None => link.request_id.clone(),
        })
        .collect::<Vec<_>>()
        .join(" -> ")
}
