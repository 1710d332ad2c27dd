use anyhow::{bail, Context, Result};
use clap::Parser;
use cli_support::{init_tracing, CorpusArgs};
use refer_dataset::{summarize_with_thresholds, CorpusThresholds, Refer, ValidationOutcome};
use refer_tools::ToolConfig;

#[derive(Parser, Debug)]
#[command(
    name = "refer_stats",
    about = "Load a referring-expression corpus and report its size and health"
)]
struct Args {
    #[command(flatten)]
    corpus: CorpusArgs,
    /// Also count refs matching this split filter (e.g. train, testA, testAB, test).
    #[arg(long)]
    split: Option<String>,
    /// Print the report as JSON instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,
    /// Exit non-zero when the report fails its thresholds.
    #[arg(long, default_value_t = false)]
    strict: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = ToolConfig::load();
    let opts = args.corpus.resolve(cfg.corpus_opts());

    let refer = Refer::new(
        &opts.corpus_root,
        &opts.image_root,
        &opts.dataset,
        &opts.split_by,
    )
    .with_context(|| format!("load {} ({})", opts.dataset, opts.split_by))?;

    let split_count = match &args.split {
        Some(split) => Some(
            refer
                .get_ref_ids(&[], &[], &[], Some(split.as_str()))
                .with_context(|| format!("filter split {split}"))?
                .len(),
        ),
        None => None,
    };

    let report = summarize_with_thresholds(&refer, &CorpusThresholds::from_env());

    if args.json {
        let mut value = serde_json::to_value(&report).context("serialize report")?;
        if let (Some(split), Some(count)) = (&args.split, split_count) {
            value["split_filter"] = serde_json::json!({ "split": split, "refs": count });
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        let s = &report.summary;
        println!("dataset: {} ({})", s.dataset, opts.split_by);
        println!("refs: {}", s.refs);
        println!("annotations: {}", s.annotations);
        println!("images: {}", s.images);
        println!("categories: {}", s.categories);
        println!("sentences: {}", s.sentences);
        for (split, count) in &s.refs_by_split {
            println!("  split {split}: {count} refs");
        }
        if let (Some(split), Some(count)) = (&args.split, split_count) {
            println!("refs matching split filter {split}: {count}");
        }
        println!("refs without sentences: {}", s.refs_without_sentences);
        println!("refs with empty boxes: {}", s.refs_with_empty_boxes);
        println!("outcome: {}", report.outcome.as_str());
        for reason in &report.reasons {
            println!("  - {reason}");
        }
    }

    if args.strict && report.outcome == ValidationOutcome::Fail {
        bail!("corpus failed validation: {}", report.reasons.join("; "));
    }
    Ok(())
}
