//! End-to-end dispatch tests: hostname in, outcome out, over real site
//! trees on disk.

use sitegate::config::Config;
use sitegate::context::{DispatchOutcome, Handoff};
use sitegate::dispatch::Dispatcher;
use sitegate::error::DispatchErrorCode;
use sitegate::registry::DriverRegistry;
use std::path::Path;
use tempfile::TempDir;

fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }
}

fn dispatcher(parked: &TempDir) -> Dispatcher {
    dispatcher_with(parked, "")
}

fn dispatcher_with(parked: &TempDir, extra_sites_toml: &str) -> Dispatcher {
    let toml = format!(
        r#"
[sites]
tld = "test"
paths = ["{}"]
{}
"#,
        parked.path().display(),
        extra_sites_toml
    );
    let config: Config = toml::from_str(&toml).unwrap();
    Dispatcher::new(&config, DriverRegistry::with_builtins())
}

fn expect_execute(outcome: DispatchOutcome) -> sitegate::context::FrontController {
    match outcome {
        DispatchOutcome::Handoff(Handoff::Execute(fc)) => fc,
        other => panic!("expected front controller execution, got {:?}", other),
    }
}

#[test]
fn laravel_root_request_resolves_public_index() {
    let parked = TempDir::new().unwrap();
    let site = parked.path().join("shop");
    write_tree(
        &site,
        &[("artisan", "#!/usr/bin/env php"), ("public/index.php", "<?php")],
    );

    let fc = expect_execute(dispatcher(&parked).dispatch("shop.test", "/"));
    assert_eq!(fc.entry_path, site.join("public/index.php"));
    assert_eq!(fc.document_root, site.join("public"));
    assert_eq!(fc.script_name, "/index.php");
    assert!(fc.is_php());
}

#[test]
fn laravel_existing_asset_streams_from_public() {
    let parked = TempDir::new().unwrap();
    let site = parked.path().join("shop");
    write_tree(
        &site,
        &[
            ("artisan", "#!"),
            ("public/index.php", "<?php"),
            ("public/css/app.css", "body{}"),
        ],
    );

    assert_eq!(
        dispatcher(&parked).dispatch("shop.test", "/css/app.css"),
        DispatchOutcome::StaticFile(site.join("public/css/app.css"))
    );
}

#[test]
fn html_only_site_falls_back_to_shell_for_missing_assets() {
    let parked = TempDir::new().unwrap();
    let site = parked.path().join("brochure");
    write_tree(&site, &[("index.html", "<html>hello</html>")]);

    let fc = expect_execute(dispatcher(&parked).dispatch("brochure.test", "/missing.png"));
    assert_eq!(fc.entry_path, site.join("index.html"));
    // The shell streams as bytes, it is never executed
    assert!(!fc.is_php());
}

#[test]
fn unknown_hostname_fails_before_driver_resolution() {
    let parked = TempDir::new().unwrap();
    assert_eq!(
        dispatcher(&parked).dispatch("ghost.test", "/"),
        DispatchOutcome::NotFound(DispatchErrorCode::UnknownSite)
    );
}

#[test]
fn default_site_catches_unmatched_hostnames() {
    let parked = TempDir::new().unwrap();
    let fallback = TempDir::new().unwrap();
    write_tree(fallback.path(), &[("index.php", "<?php")]);

    let extra = format!("default_site = \"{}\"", fallback.path().display());
    let fc = expect_execute(dispatcher_with(&parked, &extra).dispatch("anything.test", "/"));
    assert_eq!(fc.entry_path, fallback.path().join("index.php"));
}

#[test]
fn linked_site_beats_parked_directory() {
    let parked = TempDir::new().unwrap();
    write_tree(&parked.path().join("blog"), &[("index.php", "<?php parked")]);
    let linked = TempDir::new().unwrap();
    write_tree(linked.path(), &[("index.php", "<?php linked")]);

    let extra = format!("[sites.links]\nblog = \"{}\"", linked.path().display());
    let fc = expect_execute(dispatcher_with(&parked, &extra).dispatch("blog.test", "/"));
    assert_eq!(fc.entry_path, linked.path().join("index.php"));
}

#[test]
fn php_source_is_executed_never_streamed() {
    let parked = TempDir::new().unwrap();
    let site = parked.path().join("legacy");
    write_tree(
        &site,
        &[("index.php", "<?php"), ("admin/tools.php", "<?php $secret;")],
    );

    let fc = expect_execute(dispatcher(&parked).dispatch("legacy.test", "/admin/tools.php"));
    assert_eq!(fc.entry_path, site.join("admin/tools.php"));
    assert!(fc.is_php());
}

#[test]
fn magento_versioned_asset_rewrite_is_observed_by_every_phase() {
    let parked = TempDir::new().unwrap();
    let site = parked.path().join("store");
    write_tree(
        &site,
        &[
            ("bin/magento", "#!"),
            ("pub/index.php", "<?php"),
            ("pub/static.php", "<?php"),
            ("pub/static/frontend/theme.css", "body{}"),
        ],
    );

    // The deployed asset exists: the version segment is stripped and the
    // request classifies as static
    assert_eq!(
        dispatcher(&parked).dispatch("store.test", "/static/version1712345678/frontend/theme.css"),
        DispatchOutcome::StaticFile(site.join("pub/static/frontend/theme.css"))
    );

    // The asset is missing: the same rewritten URI reaches the
    // materialization script
    let fc = expect_execute(
        dispatcher(&parked).dispatch("store.test", "/static/version1712345678/frontend/missing.js"),
    );
    assert_eq!(fc.entry_path, site.join("pub/static.php"));
    assert!(fc
        .env
        .contains(&("QUERY_STRING".to_string(), "resource=frontend/missing.js".to_string())));
}

#[test]
fn wordpress_admin_redirect_round_trip() {
    let parked = TempDir::new().unwrap();
    let site = parked.path().join("press");
    write_tree(
        &site,
        &[
            ("wp-config.php", "<?php"),
            ("index.php", "<?php"),
            ("wp-admin/index.php", "<?php"),
        ],
    );

    let d = dispatcher(&parked);
    assert_eq!(
        d.dispatch("press.test", "/wp-admin"),
        DispatchOutcome::Handoff(Handoff::Redirect {
            location: "/wp-admin/".to_string()
        })
    );

    let fc = expect_execute(d.dispatch("press.test", "/wp-admin/"));
    assert_eq!(fc.entry_path, site.join("wp-admin/index.php"));
}

#[test]
fn craft_clean_route_stashes_path_in_query() {
    let parked = TempDir::new().unwrap();
    let site = parked.path().join("studio");
    write_tree(&site, &[("craft", "#!"), ("web/index.php", "<?php")]);

    let fc = expect_execute(dispatcher(&parked).dispatch("studio.test", "/blog/entry-one"));
    assert_eq!(fc.entry_path, site.join("web/index.php"));
    assert!(fc
        .env
        .contains(&("QUERY_STRING".to_string(), "p=%2Fblog%2Fentry-one".to_string())));
}

#[test]
fn per_site_spec_overrides_builtin_detection() {
    let parked = TempDir::new().unwrap();
    let site = parked.path().join("bespoke");
    write_tree(
        &site,
        &[
            // The layout would match laravel on its own
            ("artisan", "#!"),
            ("public/index.php", "<?php"),
            ("SiteDriver.toml", "front_controller = \"engine/boot.php\"\n"),
            ("engine/boot.php", "<?php"),
        ],
    );

    let fc = expect_execute(dispatcher(&parked).dispatch("bespoke.test", "/any/route"));
    assert_eq!(fc.entry_path, site.join("engine/boot.php"));
    assert_eq!(fc.document_root, site.join("engine"));
}

#[test]
fn malformed_env_file_injects_nothing() {
    let parked = TempDir::new().unwrap();
    let site = parked.path().join("app");
    write_tree(
        &site,
        &[
            ("index.php", "<?php"),
            (".sitegate-env.toml", "[\"*\"]\nAPP_DEBUG = [broken"),
        ],
    );

    let fc = expect_execute(dispatcher(&parked).dispatch("app.test", "/"));
    assert!(!fc.env.iter().any(|(key, _)| key == "APP_DEBUG"));
}

#[test]
fn env_overrides_reach_the_descriptor_for_the_named_site_only() {
    let parked = TempDir::new().unwrap();
    let site = parked.path().join("app");
    write_tree(
        &site,
        &[
            ("index.php", "<?php"),
            (
                ".sitegate-env.toml",
                "[\"*\"]\nAPP_ENV = \"local\"\n\n[app]\nAPP_KEY = \"k\"\n\n[other]\nLEAK = \"no\"\n",
            ),
        ],
    );

    let fc = expect_execute(dispatcher(&parked).dispatch("app.test", "/"));
    assert!(fc.env.contains(&("APP_ENV".to_string(), "local".to_string())));
    assert!(fc.env.contains(&("APP_KEY".to_string(), "k".to_string())));
    assert!(!fc.env.iter().any(|(key, _)| key == "LEAK"));
}

#[test]
fn traversal_attempts_never_escape_the_site() {
    let parked = TempDir::new().unwrap();
    let site = parked.path().join("app");
    write_tree(&site, &[("index.php", "<?php")]);
    std::fs::write(parked.path().join("outside.txt"), "secret").unwrap();

    // The traversal URI cannot classify as static; it funnels to the front
    // controller like any other clean route
    let outcome = dispatcher(&parked).dispatch("app.test", "/../outside.txt");
    assert!(!matches!(outcome, DispatchOutcome::StaticFile(_)));
}
