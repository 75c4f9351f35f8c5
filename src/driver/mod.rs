//! The driver capability contract and one strategy per supported framework.
//!
//! A driver encodes one framework's file-layout conventions: whether a site
//! looks like that framework, which requests are static assets, and where
//! the front controller lives. Drivers are stateless and constructed fresh
//! for every dispatch. New frameworks are added by writing a new driver and
//! registering it; the dispatcher never changes.

mod basic;
mod basic_public;
mod bedrock;
mod craft;
mod laravel;
mod magento;
mod spa;
mod symfony;
mod wordpress;

pub use basic::BasicDriver;
pub use basic_public::BasicPublicDriver;
pub use bedrock::BedrockDriver;
pub use craft::CraftDriver;
pub use laravel::LaravelDriver;
pub use magento::MagentoDriver;
pub use spa::SpaDriver;
pub use symfony::SymfonyDriver;
pub use wordpress::WordPressDriver;

use crate::context::{Handoff, RequestContext};
use std::path::{Path, PathBuf};

/// One framework's routing strategy.
///
/// `serves` must be side-effect-free and cheap (existence checks only); it
/// runs against many candidates per request. A driver that returns true from
/// `serves` must answer the other two operations without error for any URI
/// within the site.
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    /// Does this driver recognize the site's layout?
    fn serves(&self, ctx: &RequestContext) -> bool;

    /// Optional URI rewrite, applied exactly once before `serves` is
    /// evaluated. `None` means identity.
    fn mutate_uri(&self, _uri: &str) -> Option<String> {
        None
    }

    /// Absolute path of a file to stream verbatim, or `None` when the
    /// request is not a static asset.
    fn static_file(&self, ctx: &RequestContext) -> Option<PathBuf>;

    /// How to handle a non-static request, or `None` when the driver cannot
    /// resolve one (triggers not-found handling upstream).
    fn front_controller(&self, ctx: &RequestContext) -> Option<Handoff>;
}

/// A path that is a regular file. Directories must never be treated as
/// servable static files.
pub(crate) fn existing_file(path: &Path) -> bool {
    path.is_file()
}

/// Join a URI under a document root and return it only when it names an
/// existing regular file. Rejects parent-directory traversal.
pub(crate) fn asset_under(root: &Path, uri: &str) -> Option<PathBuf> {
    let candidate = join_uri(root, uri)?;
    existing_file(&candidate).then_some(candidate)
}

/// Join a URI under a root without checking existence. Rejects traversal.
pub(crate) fn join_uri(root: &Path, uri: &str) -> Option<PathBuf> {
    let rel = uri.trim_start_matches('/');
    if rel.split('/').any(|segment| segment == "..") {
        return None;
    }
    Some(root.join(rel))
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::context::RequestContext;
    use std::path::Path;

    /// Build a site tree from `(relative path, contents)` pairs
    pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
        for (rel, contents) in files {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, contents).unwrap();
        }
    }

    pub fn ctx(root: &Path, uri: &str) -> RequestContext {
        RequestContext::new(root.to_path_buf(), "site", uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_asset_under_rejects_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css/app.css"), "body{}").unwrap();

        assert_eq!(
            asset_under(dir.path(), "/css/app.css"),
            Some(dir.path().join("css/app.css"))
        );
        assert_eq!(asset_under(dir.path(), "/css"), None);
        assert_eq!(asset_under(dir.path(), "/missing.css"), None);
    }

    #[test]
    fn test_asset_under_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("secret.txt"), "x").unwrap();
        let public = dir.path().join("public");
        std::fs::create_dir(&public).unwrap();

        assert_eq!(asset_under(&public, "/../secret.txt"), None);
        assert_eq!(join_uri(&public, "/a/../../secret.txt"), None);
    }
}
