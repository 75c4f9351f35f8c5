//! Catch-all driver for plain PHP sites and bare HTML directories.
//!
//! Always placed last in the built-in ordering; its `serves` is permissive
//! so any minimally-PHP site gets handled by something.

use super::{asset_under, existing_file, join_uri, Driver};
use crate::context::{FrontController, Handoff, RequestContext};
use std::path::PathBuf;

pub struct BasicDriver;

impl Driver for BasicDriver {
    fn name(&self) -> &str {
        "basic"
    }

    fn serves(&self, _ctx: &RequestContext) -> bool {
        true
    }

    fn static_file(&self, ctx: &RequestContext) -> Option<PathBuf> {
        for root in [ctx.site_path.join("public"), ctx.site_path.clone()] {
            if let Some(file) = asset_under(&root, &ctx.uri) {
                return Some(file);
            }
            // A directory request falls back to the index.html inside it
            if let Some(dir) = join_uri(&root, &ctx.uri) {
                let index = dir.join("index.html");
                if dir.is_dir() && existing_file(&index) {
                    return Some(index);
                }
            }
        }
        None
    }

    fn front_controller(&self, ctx: &RequestContext) -> Option<Handoff> {
        let site = &ctx.site_path;

        // A URI naming a real PHP script executes that script directly
        if ctx.is_php() {
            if let Some(script) = join_uri(site, &ctx.uri) {
                if existing_file(&script) {
                    let fc = FrontController::new(script, site.clone(), ctx.uri.clone());
                    return Some(Handoff::Execute(fc));
                }
            }
        }

        // A directory with its own index.php handles requests beneath it
        if !ctx.is_root() {
            if let Some(dir) = join_uri(site, &ctx.uri) {
                let index = dir.join("index.php");
                if dir.is_dir() && existing_file(&index) {
                    let script_name = format!("{}/index.php", ctx.uri.trim_end_matches('/'));
                    let fc = FrontController::new(index, site.clone(), script_name);
                    return Some(Handoff::Execute(fc));
                }
            }
        }

        let public_index = site.join("public/index.php");
        if existing_file(&public_index) {
            let fc = FrontController::new(public_index, site.join("public"), "/index.php");
            return Some(Handoff::Execute(fc));
        }

        let root_index = site.join("index.php");
        if existing_file(&root_index) {
            let fc = FrontController::new(root_index, site.clone(), "/index.php");
            return Some(Handoff::Execute(fc));
        }

        // Plain HTML sites: the index.html shell is the controller output
        let html_index = site.join("index.html");
        if existing_file(&html_index) {
            let fc = FrontController::new(html_index, site.clone(), "/index.html");
            return Some(Handoff::Execute(fc));
        }

        // No recognizable entry point: Not-Found upstream
        None
    }
}
