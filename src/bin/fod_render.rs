//! fod-render — 根据流水线配置处理一次请求并输出 JSON 或 JavaScript
//!
//! Usage:
//!   fod-render <pipeline.yaml|pipeline.json> [key=value ...] [--javascript]
//!
//! Each `key=value` pair is added as evidence, e.g. `header.host=localhost`
//! or `query.sequence=3`. Logging is controlled with `RUST_LOG`.

use anyhow::{bail, Context};
use fiftyone_pipeline::constants::{JAVASCRIPT_BUILDER_ELEMENT_KEY, JSON_BUILDER_ELEMENT_KEY};
use fiftyone_pipeline::{JavaScriptBuilderData, JsonBuilderData, PipelineOptions};
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!(
        r#"fod-render — render pipeline output for one request

USAGE:
    fod-render <OPTIONS_FILE> [KEY=VALUE ...] [--javascript]

ARGS:
    OPTIONS_FILE    Pipeline options (.yaml, .yml or .json)
    KEY=VALUE       Evidence, e.g. header.host=localhost

FLAGS:
    --javascript    Print the client script instead of the JSON document
    -h, --help      Show this help message"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }

    let javascript = args.iter().any(|a| a == "--javascript");
    let mut positional = args.iter().filter(|a| !a.starts_with("--"));
    let options_path = match positional.next() {
        Some(path) => path,
        None => bail!("missing pipeline options file"),
    };

    let mut evidence = Vec::new();
    for pair in positional {
        match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => evidence.push((key.to_string(), value.to_string())),
            _ => bail!("evidence must be given as key=value, got '{}'", pair),
        }
    }

    let options = PipelineOptions::from_file(options_path)
        .await
        .with_context(|| format!("loading {}", options_path))?;
    let pipeline = options.build().context("building pipeline")?;

    let data = pipeline.create_flow_data();
    data.add_evidence_from(evidence);
    if let Err(e) = data.process().await {
        eprintln!("warning: {}", e);
    }

    if javascript {
        let script = data
            .get_as::<JavaScriptBuilderData>(JAVASCRIPT_BUILDER_ELEMENT_KEY)
            .context("the pipeline has no JavaScriptBuilderElement")?;
        println!("{}", script.javascript());
    } else {
        let json = data
            .get_as::<JsonBuilderData>(JSON_BUILDER_ELEMENT_KEY)
            .context("the pipeline has no JsonBuilderElement")?;
        println!("{}", json.json());
    }
    Ok(())
}
