//! Driver for plain PHP apps that keep their web root under `public/`
//! without any framework marker files.

use super::{asset_under, existing_file, join_uri, Driver};
use crate::context::{FrontController, Handoff, RequestContext};
use std::path::PathBuf;

pub struct BasicPublicDriver;

impl Driver for BasicPublicDriver {
    fn name(&self) -> &str {
        "basic-public"
    }

    fn serves(&self, ctx: &RequestContext) -> bool {
        existing_file(&ctx.site_path.join("public/index.php"))
    }

    fn static_file(&self, ctx: &RequestContext) -> Option<PathBuf> {
        let public = ctx.site_path.join("public");
        if let Some(file) = asset_under(&public, &ctx.uri) {
            return Some(file);
        }
        if let Some(dir) = join_uri(&public, &ctx.uri) {
            let index = dir.join("index.html");
            if dir.is_dir() && existing_file(&index) {
                return Some(index);
            }
        }
        None
    }

    fn front_controller(&self, ctx: &RequestContext) -> Option<Handoff> {
        let public = ctx.site_path.join("public");
        let fc = FrontController::new(public.join("index.php"), public, "/index.php");
        Some(Handoff::Execute(fc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testutil::{ctx, write_tree};
    use tempfile::TempDir;

    #[test]
    fn test_serves_requires_public_index() {
        let dir = TempDir::new().unwrap();
        assert!(!BasicPublicDriver.serves(&ctx(dir.path(), "/")));

        write_tree(dir.path(), &[("public/index.php", "<?php")]);
        assert!(BasicPublicDriver.serves(&ctx(dir.path(), "/")));
    }

    #[test]
    fn test_docroot_is_public() {
        let dir = TempDir::new().unwrap();
        write_tree(
            dir.path(),
            &[("public/index.php", "<?php"), ("public/logo.svg", "<svg>")],
        );

        assert_eq!(
            BasicPublicDriver.static_file(&ctx(dir.path(), "/logo.svg")),
            Some(dir.path().join("public/logo.svg"))
        );

        match BasicPublicDriver
            .front_controller(&ctx(dir.path(), "/any/route"))
            .unwrap()
        {
            Handoff::Execute(fc) => {
                assert_eq!(fc.document_root, dir.path().join("public"));
                assert_eq!(fc.script_name, "/index.php");
            }
            other => panic!("unexpected handoff: {:?}", other),
        }
    }
}
