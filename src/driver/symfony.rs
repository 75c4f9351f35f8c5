//! Symfony driver: `public/` web root with `bin/console` as the marker.

use super::{asset_under, existing_file, Driver};
use crate::context::{FrontController, Handoff, RequestContext};
use std::path::PathBuf;

pub struct SymfonyDriver;

impl Driver for SymfonyDriver {
    fn name(&self) -> &str {
        "symfony"
    }

    fn serves(&self, ctx: &RequestContext) -> bool {
        existing_file(&ctx.site_path.join("public/index.php"))
            && existing_file(&ctx.site_path.join("bin/console"))
    }

    fn static_file(&self, ctx: &RequestContext) -> Option<PathBuf> {
        asset_under(&ctx.site_path.join("public"), &ctx.uri)
    }

    fn front_controller(&self, ctx: &RequestContext) -> Option<Handoff> {
        let public = ctx.site_path.join("public");
        let fc = FrontController::new(public.join("index.php"), public, "/index.php");
        Some(Handoff::Execute(fc))
    }
}
