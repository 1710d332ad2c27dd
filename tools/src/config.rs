use std::path::{Path, PathBuf};

use cli_support::CorpusOpts;
use instruct_samples::ImageNaming;
use serde::Deserialize;
use tracing::warn;

const DEFAULT_CONFIG_NAME: &str = "refer-tools.toml";
const CONFIG_ENV: &str = "REFER_TOOLS_CONFIG";

#[derive(Debug, Clone, PartialEq)]
pub struct ToolConfig {
    pub corpus_root: PathBuf,
    pub image_root: PathBuf,
    pub dataset: String,
    pub split_by: String,
    pub split: String,
    pub output_root: PathBuf,
    pub seed: Option<u64>,
    pub image_naming: ImageNaming,
}

impl Default for ToolConfig {
    fn default() -> Self {
        let corpus_root = PathBuf::from("data");
        Self {
            image_root: corpus_root.join("images/mscoco/images/train2014"),
            corpus_root,
            dataset: "refcoco".to_string(),
            split_by: "unc".to_string(),
            split: "train".to_string(),
            output_root: PathBuf::from("artifacts/samples"),
            seed: None,
            image_naming: ImageNaming::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ToolConfigFile {
    corpus_root: Option<String>,
    image_root: Option<String>,
    dataset: Option<String>,
    split_by: Option<String>,
    split: Option<String>,
    output_root: Option<String>,
    seed: Option<u64>,
    image_naming: Option<ImageNaming>,
}

impl ToolConfig {
    /// Read `$REFER_TOOLS_CONFIG`, else `refer-tools.toml` in the working
    /// directory, else defaults.
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_NAME));
        let cfg = Self::from_path(&path).unwrap_or_default();
        cfg.warn_if_invalid();
        cfg
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("tools config: failed to read {}: {err}", path.display());
                return None;
            }
        };
        match toml::from_str::<ToolConfigFile>(&raw) {
            Ok(file) => Some(Self::from_file(file)),
            Err(err) => {
                warn!("tools config: failed to parse {}: {err}", path.display());
                None
            }
        }
    }

    fn from_file(file: ToolConfigFile) -> Self {
        let defaults = Self::default();
        let corpus_root = file
            .corpus_root
            .map(|v| expand_path(&v))
            .unwrap_or(defaults.corpus_root);
        let image_root = file
            .image_root
            .map(|v| expand_path(&v))
            .unwrap_or_else(|| corpus_root.join("images/mscoco/images/train2014"));

        ToolConfig {
            corpus_root,
            image_root,
            dataset: file
                .dataset
                .filter(|d| !d.trim().is_empty())
                .unwrap_or(defaults.dataset),
            split_by: file
                .split_by
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.split_by),
            split: file.split.unwrap_or(defaults.split),
            output_root: file
                .output_root
                .map(|v| expand_path(&v))
                .unwrap_or(defaults.output_root),
            seed: file.seed,
            image_naming: file.image_naming.unwrap_or_default(),
        }
    }

    pub fn corpus_opts(&self) -> CorpusOpts {
        CorpusOpts {
            corpus_root: self.corpus_root.clone(),
            image_root: self.image_root.clone(),
            dataset: self.dataset.clone(),
            split_by: self.split_by.clone(),
        }
    }

    fn warn_if_invalid(&self) {
        if !self.corpus_root.exists() {
            warn!(
                "tools config: corpus_root {} does not exist; loading will fail",
                self.corpus_root.display()
            );
        }
        if !self.image_root.exists() {
            warn!(
                "tools config: image_root {} does not exist; sample export will skip every ref",
                self.image_root.display()
            );
        }
        if self.dataset.starts_with("refclef") {
            warn!("tools config: refclef images are not available; choose a refcoco dataset");
        }
    }
}

fn expand_path(raw: &str) -> PathBuf {
    let mut out = raw.to_string();
    if let Some(stripped) = out.strip_prefix('~') {
        if let Ok(home) = std::env::var("HOME") {
            out = format!("{home}{stripped}");
        }
    }
    PathBuf::from(expand_env(&out))
}

/// Substitute `${VAR}` with its value; unknown variables are left as written.
fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = &after[..end];
        match std::env::var(key) {
            Ok(val) => out.push_str(&val),
            Err(_) => {
                out.push_str("${");
                out.push_str(key);
                out.push('}');
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::expand_env;

    #[test]
    fn unknown_variables_are_kept() {
        assert_eq!(
            expand_env("a/${REFER_TOOLS_SURELY_UNSET_VAR}/b"),
            "a/${REFER_TOOLS_SURELY_UNSET_VAR}/b"
        );
        assert_eq!(expand_env("plain/${unterminated"), "plain/${unterminated");
    }

    #[test]
    fn known_variables_are_substituted() {
        let path = std::env::var("PATH").unwrap_or_default();
        assert_eq!(expand_env("${PATH}/x"), format!("{path}/x"));
    }
}
