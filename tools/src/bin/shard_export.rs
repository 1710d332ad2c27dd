use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use cli_support::{init_tracing, ExportOutputArgs};
use instruct_samples::{
    index_shard_pairs, load_shard_pair, FormatResult, Identity, JsonlSampleWriter, ShapeOnly,
    ShardPair, ShardSampleBuilder, ShardTask, TrainingSample,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use refer_tools::ToolConfig;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TaskArg {
    /// Answer lists every object with its box.
    IdentifyAll,
    /// Instruction carries one box; answer names its object.
    BboxToObject,
}

impl From<TaskArg> for ShardTask {
    fn from(arg: TaskArg) -> Self {
        match arg {
            TaskArg::IdentifyAll => ShardTask::IdentifyAll,
            TaskArg::BboxToObject => ShardTask::BboxToObject,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "shard_export",
    about = "Export COCO box-shard instruction samples from <key>.jpg/<key>.json pairs as JSONL"
)]
struct Args {
    /// Directory holding the extracted shard members.
    #[arg(long)]
    shard_dir: PathBuf,
    #[arg(long, value_enum, default_value = "identify-all")]
    task: TaskArg,
    #[command(flatten)]
    output: ExportOutputArgs,
}

fn build_one(
    builder: &ShardSampleBuilder<ShapeOnly, Identity>,
    task: ShardTask,
    pair: &ShardPair,
    seed: Option<u64>,
    index: usize,
) -> FormatResult<TrainingSample<String>> {
    let (image, ann) = load_shard_pair(pair)?;
    let sample = match seed {
        Some(seed) => {
            let mut rng = StdRng::seed_from_u64(seed ^ index as u64);
            builder.build(task, image, &ann, &mut rng)?
        }
        None => builder.build(task, image, &ann, &mut rand::rng())?,
    };
    Ok(sample.map_image(|_| pair.image_path.display().to_string()))
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = ToolConfig::load();
    let task = ShardTask::from(args.task);
    let default_name = match task {
        ShardTask::IdentifyAll => "shard_identify_all",
        ShardTask::BboxToObject => "shard_bbox_to_object",
    };
    let output = args
        .output
        .resolve(&cfg.output_root, default_name, cfg.seed);

    let mut pairs = index_shard_pairs(&args.shard_dir)
        .with_context(|| format!("index {}", args.shard_dir.display()))?;
    if pairs.is_empty() {
        bail!(
            "no <key>.jpg/<key>.json pairs found in {}",
            args.shard_dir.display()
        );
    }
    if let Some(limit) = output.limit {
        pairs.truncate(limit);
    }
    info!(pairs = pairs.len(), task = ?task, "formatting samples");

    let builder = ShardSampleBuilder::new(ShapeOnly, Identity);
    let results: Vec<_> = pairs
        .par_iter()
        .enumerate()
        .map(|(index, pair)| build_one(&builder, task, pair, output.seed, index))
        .collect();

    let mut writer = if output.append {
        JsonlSampleWriter::append(&output.output)
    } else {
        JsonlSampleWriter::create(&output.output)
    }
    .with_context(|| format!("open {}", output.output.display()))?;

    let mut skipped = 0usize;
    for (pair, result) in pairs.iter().zip(results) {
        match result {
            Ok(sample) => writer.write(&sample)?,
            Err(err) => {
                skipped += 1;
                warn!(key = %pair.key, "skipping sample: {err}");
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
