//! Laravel driver: `public/` web root with the `artisan` CLI script as the
//! framework marker.

use super::{asset_under, existing_file, Driver};
use crate::context::{FrontController, Handoff, RequestContext};
use std::path::PathBuf;

pub struct LaravelDriver;

impl Driver for LaravelDriver {
    fn name(&self) -> &str {
        "laravel"
    }

    fn serves(&self, ctx: &RequestContext) -> bool {
        existing_file(&ctx.site_path.join("public/index.php"))
            && existing_file(&ctx.site_path.join("artisan"))
    }

    fn static_file(&self, ctx: &RequestContext) -> Option<PathBuf> {
        // `php artisan storage:link` publishes storage/app/public at /storage
        if let Some(rest) = ctx.uri.strip_prefix("/storage/") {
            return asset_under(&ctx.site_path.join("storage/app/public"), rest);
        }
        asset_under(&ctx.site_path.join("public"), &ctx.uri)
    }

    fn front_controller(&self, ctx: &RequestContext) -> Option<Handoff> {
        let public = ctx.site_path.join("public");
        let fc = FrontController::new(public.join("index.php"), public, "/index.php");
        Some(Handoff::Execute(fc))
    }
}
