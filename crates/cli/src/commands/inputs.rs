use std::path::Path;
use std::process;

use yinyang_lineage::distinct_input_urls;

use crate::{load_store, print_json, report_error, runtime, OutputFormat};

pub(crate) fn cmd_inputs(records: &Path, output: OutputFormat, quiet: bool) {
    let store = load_store(records, output, quiet);
    let rt = runtime(output, quiet);

    let urls = match rt.block_on(distinct_input_urls(&store)) {
        Ok(urls) => urls,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "count": urls.len(),
            "input_urls": urls,
        })),
        OutputFormat::Text => {
            if !quiet {
                eprintln!("{} distinct input images", urls.len());
            }
            for url in &urls {
                println!("{}", url);
            }
        }
    }
}
