use std::path::{Path, PathBuf};

use anyhow::Context;
use beatblend_engine::{export, RenderResult};
use beatblend_shared::EngineConfig;
use tracing::{debug, info};

/// Reads the config file when one is given, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, anyhow::Error> {
    match path {
        Some(path) => {
            let config = EngineConfig::load(path).with_context(|| format!("loading config {}", path.display()))?;
            debug!(path = %path.display(), "config loaded");
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

pub fn save_config(config: &EngineConfig, path: &Path) -> Result<(), anyhow::Error> {
    config.save(path).with_context(|| format!("writing config {}", path.display()))?;
    info!(path = %path.display(), "config written");
    Ok(())
}

/// Writes the WAV next to `out`: into it when it is a directory, to it otherwise.
pub fn write_render(result: &RenderResult, out: &Path, filename: &str) -> Result<PathBuf, anyhow::Error> {
    let target = if out.is_dir() { out.join(filename) } else { out.to_path_buf() };
    export::write_wav_file(&target, &result.wav)?;
    info!(path = %target.display(), provenance = result.provenance.as_str(), "wav saved");
    Ok(target)
}
