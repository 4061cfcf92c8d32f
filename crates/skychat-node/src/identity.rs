//! The node's identity file.

use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::info;

use skychat_shared::identity::{Identity, IdentityExport};

/// Load the identity stored at `path`, or generate one and write it there.
pub fn load_or_generate(path: &Path) -> anyhow::Result<Identity> {
    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading identity file {}", path.display()))?;
        let export: IdentityExport =
            serde_json::from_str(&raw).context("identity file is not valid JSON")?;
        let identity = Identity::from_export(&export)?;
        info!(peer = %identity.peer_id(), "Loaded identity");
        return Ok(identity);
    }

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating data directory {}", dir.display()))?;
    }
    let identity = Identity::generate();
    let raw = serde_json::to_string_pretty(&identity.to_export())?;
    fs::write(path, raw).with_context(|| format!("writing identity file {}", path.display()))?;
    info!(peer = %identity.peer_id(), path = %path.display(), "Generated new identity");
    Ok(identity)
}
