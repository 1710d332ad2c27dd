use clap::Args;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG`, defaulting to `info`.
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Corpus location options shared across the refer binaries. Unset flags fall
/// back to the tool config.
#[derive(Debug, Clone, Default, Args)]
pub struct CorpusArgs {
    /// Directory holding `<dataset>/refs(<split_by>).p` and `instances.json`.
    #[arg(long)]
    pub corpus_root: Option<PathBuf>,
    /// Directory holding the COCO images.
    #[arg(long)]
    pub image_root: Option<PathBuf>,
    /// refcoco, refcoco+ or refcocog (an `inv` prefix is accepted).
    #[arg(long)]
    pub dataset: Option<String>,
    /// Split scheme used in the refs file name, e.g. unc, google, umd.
    #[arg(long)]
    pub split_by: Option<String>,
}

/// Fully resolved corpus location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusOpts {
    pub corpus_root: PathBuf,
    pub image_root: PathBuf,
    pub dataset: String,
    pub split_by: String,
}

impl CorpusArgs {
    /// Fill unset flags from `fallback`.
    pub fn resolve(&self, fallback: CorpusOpts) -> CorpusOpts {
        CorpusOpts {
            corpus_root: self.corpus_root.clone().unwrap_or(fallback.corpus_root),
            image_root: self.image_root.clone().unwrap_or(fallback.image_root),
            dataset: self.dataset.clone().unwrap_or(fallback.dataset),
            split_by: self.split_by.clone().unwrap_or(fallback.split_by),
        }
    }
}

/// Output options for the sample exporters.
#[derive(Debug, Clone, Default, Args)]
pub struct ExportOutputArgs {
    /// JSONL file to write; defaults to `<output_root>/<name>.jsonl`.
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Append to an existing file instead of truncating it.
    #[arg(long, default_value_t = false)]
    pub append: bool,
    /// Seed for template and sentence sampling.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Stop after this many samples.
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutputOpts {
    pub output: PathBuf,
    pub append: bool,
    pub seed: Option<u64>,
    pub limit: Option<usize>,
}

impl ExportOutputArgs {
    /// Resolve the destination, defaulting to `<output_root>/<default_name>.jsonl`.
    pub fn resolve(
        &self,
        output_root: &std::path::Path,
        default_name: &str,
        seed: Option<u64>,
    ) -> ExportOutputOpts {
        ExportOutputOpts {
            output: self
                .output
                .clone()
                .unwrap_or_else(|| output_root.join(format!("{default_name}.jsonl"))),
            append: self.append,
            seed: self.seed.or(seed),
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback() -> CorpusOpts {
        CorpusOpts {
            corpus_root: PathBuf::from("data"),
            image_root: PathBuf::from("data/images/mscoco/train2014"),
            dataset: "refcoco".into(),
            split_by: "unc".into(),
        }
    }

    #[test]
    fn flags_override_fallback() {
        let args = CorpusArgs {
            dataset: Some("refcocog".into()),
            split_by: Some("umd".into()),
            ..Default::default()
        };
        let opts = args.resolve(fallback());
        assert_eq!(opts.dataset, "refcocog");
        assert_eq!(opts.split_by, "umd");
        assert_eq!(opts.corpus_root, PathBuf::from("data"));
    }

    #[test]
    fn output_defaults_under_root() {
        let args = ExportOutputArgs::default();
        let opts = args.resolve(std::path::Path::new("out"), "refcoco_train", Some(3));
        assert_eq!(opts.output, PathBuf::from("out/refcoco_train.jsonl"));
        assert_eq!(opts.seed, Some(3));
        let args = ExportOutputArgs {
            seed: Some(9),
            ..Default::default()
        };
        assert_eq!(args.resolve(std::path::Path::new("out"), "x", Some(3)).seed, Some(9));
    }
}
