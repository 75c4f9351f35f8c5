//! Magento 2 driver: `pub/` web root with internal dispatch tables for the
//! static and media asset namespaces. Missing assets in those namespaces are
//! routed through Magento's own materialization scripts instead of 404ing.

use super::{asset_under, existing_file, Driver};
use crate::context::{FrontController, Handoff, RequestContext};
use std::path::PathBuf;

pub struct MagentoDriver;

impl Driver for MagentoDriver {
    fn name(&self) -> &str {
        "magento"
    }

    fn serves(&self, ctx: &RequestContext) -> bool {
        existing_file(&ctx.site_path.join("bin/magento"))
            && existing_file(&ctx.site_path.join("pub/index.php"))
    }

    /// Deployed static assets carry a version segment
    /// (`/static/version1712345678/...`) that maps onto the unversioned
    /// directory on disk.
    fn mutate_uri(&self, uri: &str) -> Option<String> {
        let rest = uri.strip_prefix("/static/version")?;
        let (version, asset) = rest.split_once('/')?;
        if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(format!("/static/{}", asset))
    }

    fn static_file(&self, ctx: &RequestContext) -> Option<PathBuf> {
        asset_under(&ctx.site_path.join("pub"), &ctx.uri)
    }

    fn front_controller(&self, ctx: &RequestContext) -> Option<Handoff> {
        let public = ctx.site_path.join("pub");

        // Asset namespaces route through Magento's materialization scripts
        if let Some(resource) = ctx.uri.strip_prefix("/static/") {
            let fc = FrontController::new(public.join("static.php"), public, "/static.php")
                .with_env("QUERY_STRING", format!("resource={}", resource));
            return Some(Handoff::Execute(fc));
        }
        if ctx.uri.starts_with("/media/") {
            let fc = FrontController::new(public.join("get.php"), public, "/get.php");
            return Some(Handoff::Execute(fc));
        }

        let fc = FrontController::new(public.join("index.php"), public, "/index.php");
        Some(Handoff::Execute(fc))
    }
}
