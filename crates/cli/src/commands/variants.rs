use std::path::Path;
use std::process;

use yinyang_lineage::{input_variants, LineageConfig};

use crate::{load_store, print_json, report_error, runtime, OutputFormat};

pub(crate) fn cmd_variants(
    records: &Path,
    input_url: &str,
    config: &LineageConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let store = load_store(records, output, quiet);
    let rt = runtime(output, quiet);

    let result = match rt.block_on(input_variants(&store, input_url, config)) {
        Ok(result) => result,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Text => {
            for pair in &result.variants {
                println!("{}\tgood={}\tbad={}", pair.request_id, pair.good_url, pair.bad_url);
            }
            if !quiet {
                for issue in &result.issues {
                    eprintln!("  {}", issue);
                }
            }
        }
    }
}
