//! Single-page-application driver: every route serves the built `index.html`
//! shell, with assets resolved from the build output directory first.

use super::{asset_under, existing_file, Driver};
use crate::context::{FrontController, Handoff, RequestContext};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Per-project declaration file checked for an explicit `kind = "spa"`
pub const PROJECT_FILE: &str = "Sitegate.toml";

const BUILD_DIRS: [&str; 2] = ["dist", "build"];

#[derive(Debug, Deserialize)]
struct ProjectFile {
    kind: Option<String>,
}

/// Read the project declaration; a malformed file is treated as absent.
fn declared_kind(site_path: &Path) -> Option<String> {
    let path = site_path.join(PROJECT_FILE);
    let content = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<ProjectFile>(&content) {
        Ok(project) => project.kind,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Ignoring malformed project file");
            None
        }
    }
}

pub struct SpaDriver;

impl SpaDriver {
    fn shell(site_path: &Path) -> Option<PathBuf> {
        for dir in BUILD_DIRS {
            let shell = site_path.join(dir).join("index.html");
            if existing_file(&shell) {
                return Some(shell);
            }
        }
        let root_shell = site_path.join("index.html");
        existing_file(&root_shell).then_some(root_shell)
    }
}

impl Driver for SpaDriver {
    fn name(&self) -> &str {
        "spa"
    }

    fn serves(&self, ctx: &RequestContext) -> bool {
        if BUILD_DIRS
            .iter()
            .any(|dir| existing_file(&ctx.site_path.join(dir).join("index.html")))
        {
            return true;
        }
        declared_kind(&ctx.site_path).as_deref() == Some("spa")
    }

    fn static_file(&self, ctx: &RequestContext) -> Option<PathBuf> {
        for dir in BUILD_DIRS {
            if let Some(file) = asset_under(&ctx.site_path.join(dir), &ctx.uri) {
                return Some(file);
            }
        }
        asset_under(&ctx.site_path, &ctx.uri)
    }

    fn front_controller(&self, ctx: &RequestContext) -> Option<Handoff> {
        let shell = Self::shell(&ctx.site_path)?;
        let document_root = shell
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| ctx.site_path.clone());
        let fc = FrontController::new(shell, document_root, "/index.html");
        Some(Handoff::Execute(fc))
    }
}
