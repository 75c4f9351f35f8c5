//! Bedrock driver: WordPress embedded under `web/` with the core in
//! `web/wp/`. Delegates routing to the WordPress logic with the web root
//! rebased to the subdirectory.

use super::wordpress::resolve_wordpress;
use super::{asset_under, existing_file, Driver};
use crate::context::{Handoff, RequestContext};
use std::path::PathBuf;

pub struct BedrockDriver;

impl BedrockDriver {
    fn web_root(ctx: &RequestContext) -> PathBuf {
        ctx.site_path.join("web")
    }
}

impl Driver for BedrockDriver {
    fn name(&self) -> &str {
        "bedrock"
    }

    fn serves(&self, ctx: &RequestContext) -> bool {
        let site = &ctx.site_path;
        existing_file(&site.join("web/app/mu-plugins/bedrock-autoloader.php"))
            || (site.join("web/app").is_dir() && existing_file(&site.join("web/wp-config.php")))
            || existing_file(&site.join("config/application.php"))
    }

    fn static_file(&self, ctx: &RequestContext) -> Option<PathBuf> {
        asset_under(&Self::web_root(ctx), &ctx.uri)
    }

    fn front_controller(&self, ctx: &RequestContext) -> Option<Handoff> {
        resolve_wordpress(&Self::web_root(ctx), &ctx.uri)
    }
}
