//! Craft CMS driver: `web/` web root, with clean routes funnelled through
//! `web/index.php` carrying the original path in the `p` query parameter.

use super::{asset_under, existing_file, join_uri, Driver};
use crate::context::{FrontController, Handoff, RequestContext};
use std::path::PathBuf;

pub struct CraftDriver;

impl Driver for CraftDriver {
    fn name(&self) -> &str {
        "craft"
    }

    fn serves(&self, ctx: &RequestContext) -> bool {
        existing_file(&ctx.site_path.join("craft"))
            && existing_file(&ctx.site_path.join("web/index.php"))
    }

    fn static_file(&self, ctx: &RequestContext) -> Option<PathBuf> {
        asset_under(&ctx.site_path.join("web"), &ctx.uri)
    }

    fn front_controller(&self, ctx: &RequestContext) -> Option<Handoff> {
        let web = ctx.site_path.join("web");

        // Directories with their own index.php dispatch there (admin bundles)
        if let Some(target) = join_uri(&web, &ctx.uri) {
            let index = target.join("index.php");
            if target.is_dir() && existing_file(&index) {
                let script_name = format!("{}/index.php", ctx.uri.trim_end_matches('/'));
                let fc = FrontController::new(index, web, script_name);
                return Some(Handoff::Execute(fc));
            }
        }

        // Clean routes carry the original path in the `p` parameter
        let mut fc = FrontController::new(web.join("index.php"), web, "/index.php");
        if !ctx.is_root() {
            fc = fc.with_env(
                "QUERY_STRING",
                format!("p={}", urlencoding::encode(&ctx.uri)),
            );
        }
        Some(Handoff::Execute(fc))
    }
}
