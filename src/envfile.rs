//! Environment-override files.
//!
//! A site (or the tool's config directory, for all sites) may carry a
//! `.sitegate-env.toml` with a two-level map: a `"*"` wildcard table applied
//! first, then a per-site-name table merged on top. The merged entries land
//! in the front controller's environment overlay; a malformed file means
//! zero injected variables, never a crash and never partial injection.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, warn};

/// Fixed filename for environment overrides
pub const ENV_FILE: &str = ".sitegate-env.toml";

type EnvTables = HashMap<String, HashMap<String, String>>;

/// Load overrides for one site. The global file (in the config directory)
/// is applied before the site-local file, so site-local entries win.
pub fn load_overrides(
    site_path: &Path,
    site_name: &str,
    config_dir: Option<&Path>,
) -> Vec<(String, String)> {
    let mut merged = BTreeMap::new();

    if let Some(dir) = config_dir {
        apply_file(&dir.join(ENV_FILE), site_name, &mut merged);
    }
    apply_file(&site_path.join(ENV_FILE), site_name, &mut merged);

    merged.into_iter().collect()
}

fn apply_file(path: &Path, site_name: &str, merged: &mut BTreeMap<String, String>) {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return,
    };

    let tables: EnvTables = match toml::from_str(&content) {
        Ok(tables) => tables,
        Err(e) => {
            // A stray bad file must not take down requests for the site
            warn!(path = %path.display(), error = %e, "Ignoring malformed environment-override file");
            return;
        }
    };

    // Wildcard entries first, then site-specific entries on top
    for group in ["*", site_name] {
        if let Some(table) = tables.get(group) {
            for (key, value) in table {
                merged.insert(key.clone(), value.clone());
            }
        }
    }

    debug!(path = %path.display(), site = site_name, "Applied environment overrides");
}
