use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use cli_support::{init_tracing, CorpusArgs, ExportOutputArgs};
use instruct_samples::{
    Direction, FormatError, Identity, ImageNaming, JsonlSampleWriter, ReferSampleSet, ShapeOnly,
    TrainingSample,
};
use rayon::prelude::*;
use refer_dataset::Refer;
use refer_tools::ToolConfig;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionArg {
    /// Sentence in the instruction, box in the answer.
    Refer,
    /// Box in the instruction, sentence in the answer.
    Identify,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Refer => Direction::Refer,
            DirectionArg::Identify => Direction::Identify,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NamingArg {
    CocoTrain2014,
    Record,
}

impl From<NamingArg> for ImageNaming {
    fn from(arg: NamingArg) -> Self {
        match arg {
            NamingArg::CocoTrain2014 => ImageNaming::CocoTrain2014,
            NamingArg::Record => ImageNaming::Record,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "refer_export",
    about = "Export refer/identify instruction samples for one split as JSONL"
)]
struct Args {
    #[command(flatten)]
    corpus: CorpusArgs,
    #[command(flatten)]
    output: ExportOutputArgs,
    /// Split filter (train, val, testA, testAB, test, ...); defaults to the config.
    #[arg(long)]
    split: Option<String>,
    #[arg(long, value_enum, default_value = "refer")]
    direction: DirectionArg,
    /// How image files are named under the image root; defaults to the config.
    #[arg(long, value_enum)]
    image_naming: Option<NamingArg>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = ToolConfig::load();
    let corpus = args.corpus.resolve(cfg.corpus_opts());
    let split = args.split.clone().unwrap_or_else(|| cfg.split.clone());
    let direction = Direction::from(args.direction);
    let default_name = format!(
        "{}_{}_{}_{}",
        corpus.dataset,
        corpus.split_by,
        split,
        match direction {
            Direction::Refer => "refer",
            Direction::Identify => "identify",
        }
    );
    let output = args
        .output
        .resolve(&cfg.output_root, &default_name, cfg.seed);

    let refer = Arc::new(
        Refer::new(
            &corpus.corpus_root,
            &corpus.image_root,
            &corpus.dataset,
            &corpus.split_by,
        )
        .with_context(|| format!("load {} ({})", corpus.dataset, corpus.split_by))?,
    );
    let naming = args
        .image_naming
        .map(ImageNaming::from)
        .unwrap_or(cfg.image_naming);
    let set = ReferSampleSet::with_split(refer.clone(), &split, direction, ShapeOnly, Identity)
        .with_context(|| format!("select split {split}"))?
        .with_naming(naming)
        .with_seed(output.seed);

    let total = output.limit.map_or(set.len(), |n| n.min(set.len()));
    info!(
        split = %split,
        refs = set.len(),
        exporting = total,
        "formatting samples"
    );

    // Format in parallel, write in index order.
    let results: Vec<(usize, Result<TrainingSample<String>, FormatError>)> = (0..total)
        .into_par_iter()
        .map(|index| {
            let sample = set.get(index).and_then(|sample| {
                let r = refer.load_ref(set.ref_ids()[index])?;
                let path = set.image_path(r)?;
                Ok(sample.map_image(|_| path.display().to_string()))
            });
            (index, sample)
        })
        .collect();

    let mut writer = if output.append {
        JsonlSampleWriter::append(&output.output)
    } else {
        JsonlSampleWriter::create(&output.output)
    }
    .with_context(|| format!("open {}", output.output.display()))?;

    let mut skipped = 0usize;
    for (index, result) in results {
        match result {
            Ok(sample) => writer.write(&sample)?,
            Err(err) => {
                skipped += 1;
                warn!(ref_id = set.ref_ids()[index], "skipping sample: {err}");
            }
        }
    }
    writer.flush()?;
    info!(
        written = writer.written(),
        skipped,
        "wrote {}",
        output.output.display()
    );
    Ok(())
}
