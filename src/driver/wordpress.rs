//! WordPress driver: site root is the web root; clean routes funnel through
//! the root `index.php` instead of 404ing.

use super::{asset_under, existing_file, join_uri, Driver};
use crate::context::{FrontController, Handoff, RequestContext};
use std::path::{Path, PathBuf};

pub struct WordPressDriver;

/// WordPress routing against an arbitrary web root. Shared with the Bedrock
/// driver, which rebases the root to a subdirectory.
pub(crate) fn resolve_wordpress(web_root: &Path, uri: &str) -> Option<Handoff> {
    // wp-admin requires a trailing slash for its relative asset URLs
    if uri.ends_with("/wp-admin") {
        return Some(Handoff::Redirect {
            location: format!("{}/", uri),
        });
    }

    let target = join_uri(web_root, uri)?;

    // A literal PHP script executes directly (wp-login.php, xmlrpc.php, ...).
    // Case-insensitive to match the dispatcher's static-classification skip.
    let names_php_script = Path::new(uri)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("php"))
        .unwrap_or(false);
    if names_php_script && existing_file(&target) {
        let fc = FrontController::new(target, web_root.to_path_buf(), uri);
        return Some(Handoff::Execute(fc));
    }

    // Directories with their own index.php (wp-admin/) dispatch there
    if target.is_dir() {
        let index = target.join("index.php");
        if existing_file(&index) {
            let script_name = format!("{}/index.php", uri.trim_end_matches('/'));
            let fc = FrontController::new(index, web_root.to_path_buf(), script_name);
            return Some(Handoff::Execute(fc));
        }
    }

    // Everything else funnels through the front controller
    let index = web_root.join("index.php");
    if existing_file(&index) {
        let fc = FrontController::new(index, web_root.to_path_buf(), "/index.php");
        return Some(Handoff::Execute(fc));
    }

    None
}

impl Driver for WordPressDriver {
    fn name(&self) -> &str {
        "wordpress"
    }

    fn serves(&self, ctx: &RequestContext) -> bool {
        existing_file(&ctx.site_path.join("wp-config.php"))
            || existing_file(&ctx.site_path.join("wp-config-sample.php"))
    }

    fn static_file(&self, ctx: &RequestContext) -> Option<PathBuf> {
        asset_under(&ctx.site_path, &ctx.uri)
    }

    fn front_controller(&self, ctx: &RequestContext) -> Option<Handoff> {
        resolve_wordpress(&ctx.site_path, &ctx.uri)
    }
}
