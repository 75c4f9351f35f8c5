//! Driver registry and resolver.
//!
//! Built-in drivers are registered as named constructors in a fixed priority
//! order, most specific first, with the permissive catch-all last. A site may
//! carry its own declarative driver spec (`SiteDriver.toml`), always tried
//! first; user-extension specs (`*.driver.toml` under the extension
//! directory) come next, in discovery order.

use crate::context::{FrontController, Handoff, RequestContext};
use crate::driver::{
    BasicDriver, BasicPublicDriver, BedrockDriver, CraftDriver, Driver, LaravelDriver,
    MagentoDriver, SpaDriver, SymfonyDriver, WordPressDriver,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Per-site custom driver spec, loaded by fixed filename from the site root
pub const SITE_DRIVER_FILE: &str = "SiteDriver.toml";

/// Filename suffix matched when scanning the extension directory
const EXTENSION_SUFFIX: &str = ".driver.toml";

/// Namespaced form tried when a bare driver name is not registered
const NAME_PREFIX: &str = "sitegate/";

pub type DriverFactory = fn() -> Box<dyn Driver>;

#[derive(Debug, Error)]
pub enum DriverSpecError {
    #[error("failed to read driver spec {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid driver spec {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("unknown driver '{name}' referenced by {path}")]
    UnknownDelegate { name: String, path: String },
    #[error("driver spec {path} must delegate to a driver or define front_controller")]
    MissingCapability { path: String },
}

/// Declarative driver spec: either a delegation to a registered driver or a
/// direct description of the site's layout.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverSpec {
    /// Delegate all decisions to this registered driver
    pub driver: Option<String>,

    /// Marker paths (relative to the site root) that must all exist for this
    /// driver to claim a site. Empty means always claim.
    #[serde(default)]
    pub serve_markers: Vec<String>,

    /// Front controller path relative to the site root
    pub front_controller: Option<String>,

    /// Document root relative to the site root (default: front controller's
    /// directory)
    pub document_root: Option<String>,

    /// Roots searched for static assets, relative to the site root
    /// (default: the document root)
    #[serde(default)]
    pub static_roots: Vec<String>,

    /// URI prefix stripped before matching (the one-shot URI rewrite)
    pub strip_uri_prefix: Option<String>,

    /// Extra environment entries for the front controller
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// A driver built from a declarative spec file
pub struct CustomDriver {
    name: String,
    spec: DriverSpec,
    delegate: Option<Box<dyn Driver>>,
}

impl std::fmt::Debug for CustomDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomDriver")
            .field("name", &self.name)
            .field("spec", &self.spec)
            .field("delegate", &self.delegate.as_ref().map(|d| d.name()))
            .finish()
    }
}

impl CustomDriver {
    fn static_roots(&self, site_path: &Path) -> Vec<PathBuf> {
        if !self.spec.static_roots.is_empty() {
            return self
                .spec
                .static_roots
                .iter()
                .map(|r| site_path.join(r))
                .collect();
        }
        vec![self.document_root(site_path)]
    }

    fn document_root(&self, site_path: &Path) -> PathBuf {
        if let Some(ref docroot) = self.spec.document_root {
            return site_path.join(docroot);
        }
        self.spec
            .front_controller
            .as_ref()
            .and_then(|fc| site_path.join(fc).parent().map(Path::to_path_buf))
            .unwrap_or_else(|| site_path.to_path_buf())
    }
}

impl Driver for CustomDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn serves(&self, ctx: &RequestContext) -> bool {
        if !self
            .spec
            .serve_markers
            .iter()
            .all(|marker| ctx.site_path.join(marker).exists())
        {
            return false;
        }
        match &self.delegate {
            Some(delegate) => delegate.serves(ctx),
            None => true,
        }
    }

    fn mutate_uri(&self, uri: &str) -> Option<String> {
        if let Some(ref prefix) = self.spec.strip_uri_prefix {
            if let Some(rest) = uri.strip_prefix(prefix.as_str()) {
                let rest = if rest.starts_with('/') {
                    rest.to_string()
                } else {
                    format!("/{}", rest)
                };
                return Some(rest);
            }
        }
        self.delegate.as_ref().and_then(|d| d.mutate_uri(uri))
    }

    fn static_file(&self, ctx: &RequestContext) -> Option<PathBuf> {
        if let Some(ref delegate) = self.delegate {
            return delegate.static_file(ctx);
        }
        for root in self.static_roots(&ctx.site_path) {
            if let Some(file) = crate::driver::asset_under(&root, &ctx.uri) {
                return Some(file);
            }
        }
        None
    }

    fn front_controller(&self, ctx: &RequestContext) -> Option<Handoff> {
        if let Some(ref delegate) = self.delegate {
            return match delegate.front_controller(ctx)? {
                Handoff::Execute(fc) => {
                    let mut fc = fc;
                    for (key, value) in &self.spec.env {
                        fc = fc.with_env(key, value);
                    }
                    Some(Handoff::Execute(fc))
                }
                redirect => Some(redirect),
            };
        }

        let entry = ctx.site_path.join(self.spec.front_controller.as_ref()?);
        if !entry.is_file() {
            return None;
        }

        let document_root = self.document_root(&ctx.site_path);
        let script_name = entry
            .strip_prefix(&document_root)
            .map(|rel| format!("/{}", rel.to_string_lossy()))
            .unwrap_or_else(|_| format!("/{}", entry.file_name().unwrap_or_default().to_string_lossy()));

        let mut fc = FrontController::new(entry, document_root, script_name);
        for (key, value) in &self.spec.env {
            fc = fc.with_env(key, value);
        }
        Some(Handoff::Execute(fc))
    }
}

pub struct DriverRegistry {
    builtins: Vec<(&'static str, DriverFactory)>,
    extension_dir: Option<PathBuf>,
}

impl DriverRegistry {
    /// Registry with the fixed built-in ordering: marker-file drivers first,
    /// the permissive catch-all last. This ordering is a semantic contract.
    pub fn with_builtins() -> Self {
        Self {
            builtins: vec![
                ("bedrock", || Box::new(BedrockDriver)),
                ("craft", || Box::new(CraftDriver)),
                ("magento", || Box::new(MagentoDriver)),
                ("symfony", || Box::new(SymfonyDriver)),
                ("laravel", || Box::new(LaravelDriver)),
                ("wordpress", || Box::new(WordPressDriver)),
                ("spa", || Box::new(SpaDriver)),
                ("basic-public", || Box::new(BasicPublicDriver)),
                ("basic", || Box::new(BasicDriver)),
            ],
            extension_dir: None,
        }
    }

    pub fn with_extension_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extension_dir = Some(dir.into());
        self
    }

    pub fn builtin_names(&self) -> Vec<&'static str> {
        self.builtins.iter().map(|(name, _)| *name).collect()
    }

    /// Construct a registered driver by name. Two-phase lookup: exact key
    /// first, then the namespaced variant (`sitegate/` prefix added or
    /// stripped). A miss on both is an ordinary miss, not an error.
    pub fn instantiate(&self, name: &str) -> Option<Box<dyn Driver>> {
        if let Some(factory) = self.find(name) {
            return Some(factory());
        }
        let alternate = match name.strip_prefix(NAME_PREFIX) {
            Some(bare) => bare.to_string(),
            None => format!("{}{}", NAME_PREFIX, name),
        };
        self.find(&alternate).map(|factory| factory())
    }

    fn find(&self, name: &str) -> Option<DriverFactory> {
        self.builtins
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, factory)| *factory)
    }

    fn load_spec(&self, path: &Path, name: String) -> Result<CustomDriver, DriverSpecError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| DriverSpecError::Io {
            path: display.clone(),
            source,
        })?;
        let spec: DriverSpec =
            toml::from_str(&content).map_err(|source| DriverSpecError::Parse {
                path: display.clone(),
                source,
            })?;

        let delegate = match spec.driver {
            Some(ref delegate_name) => {
                Some(self.instantiate(delegate_name).ok_or_else(|| {
                    DriverSpecError::UnknownDelegate {
                        name: delegate_name.clone(),
                        path: display.clone(),
                    }
                })?)
            }
            None => None,
        };

        // Registration is by validated capability: a spec must be able to
        // answer front_controller one way or the other
        if delegate.is_none() && spec.front_controller.is_none() {
            return Err(DriverSpecError::MissingCapability { path: display });
        }

        Ok(CustomDriver {
            name,
            spec,
            delegate,
        })
    }

    /// Zero or one per-site custom driver, loaded by fixed filename from the
    /// site root. A malformed spec is skipped with a warning.
    fn custom_driver(&self, site_path: &Path) -> Option<Box<dyn Driver>> {
        let path = site_path.join(SITE_DRIVER_FILE);
        if !path.is_file() {
            return None;
        }
        match self.load_spec(&path, "custom".to_string()) {
            Ok(driver) => Some(Box::new(driver)),
            Err(e) => {
                warn!(error = %e, "Skipping per-site driver spec");
                None
            }
        }
    }

    /// User-extension drivers from the extension directory, in discovery
    /// order. Scan order follows the filesystem and is not guaranteed stable
    /// across platforms.
    fn extension_drivers(&self) -> Vec<Box<dyn Driver>> {
        let Some(ref dir) = self.extension_dir else {
            return Vec::new();
        };
        let mut paths = Vec::new();
        collect_extension_specs(dir, &mut paths);

        let mut drivers: Vec<Box<dyn Driver>> = Vec::new();
        for path in paths {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(EXTENSION_SUFFIX))
                .unwrap_or("extension")
                .to_string();
            match self.load_spec(&path, name) {
                Ok(driver) => drivers.push(Box::new(driver)),
                Err(e) => warn!(error = %e, "Skipping extension driver spec"),
            }
        }
        drivers
    }

    /// Candidate list for one dispatch: custom, then extensions, then
    /// built-ins. Every instance is constructed fresh.
    fn candidates(&self, site_path: &Path) -> Vec<Box<dyn Driver>> {
        let mut candidates = Vec::new();
        if let Some(custom) = self.custom_driver(site_path) {
            candidates.push(custom);
        }
        candidates.extend(self.extension_drivers());
        candidates.extend(self.builtins.iter().map(|(_, factory)| factory()));
        candidates
    }

    /// Select the driver for a request: strictly sequential, first `serves`
    /// match wins. The driver's one-shot URI rewrite is applied before the
    /// match and the rewritten context is returned alongside the driver, so
    /// every later call observes the same mutated URI.
    pub fn resolve(&self, ctx: &RequestContext) -> Option<(Box<dyn Driver>, RequestContext)> {
        for driver in self.candidates(&ctx.site_path) {
            let candidate = match driver.mutate_uri(&ctx.uri) {
                Some(uri) => ctx.with_uri(uri),
                None => ctx.clone(),
            };
            if driver.serves(&candidate) {
                debug!(
                    driver = driver.name(),
                    site = %candidate.site_name,
                    uri = %candidate.uri,
                    "Driver selected"
                );
                return Some((driver, candidate));
            }
        }
        None
    }
}

fn collect_extension_specs(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(EXTENSION_SUFFIX))
            .unwrap_or(false)
        {
            out.push(path);
        }
    }
    for subdir in subdirs {
        collect_extension_specs(&subdir, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testutil::{ctx, write_tree};
    use tempfile::TempDir;

    #[test]
    fn test_builtin_ordering_keeps_catch_all_last() {
        let registry = DriverRegistry::with_builtins();
        let names = registry.builtin_names();
        assert_eq!(names.last(), Some(&"basic"));
        // Marker-file drivers precede the generic fallbacks
        let basic_public = names.iter().position(|n| *n == "basic-public").unwrap();
        for specific in ["bedrock", "craft", "magento", "symfony", "laravel", "wordpress"] {
            let pos = names.iter().position(|n| *n == specific).unwrap();
            assert!(pos < basic_public, "{} must precede basic-public", specific);
        }
    }

    #[test]
    fn test_two_phase_lookup() {
        let registry = DriverRegistry::with_builtins();
        assert!(registry.instantiate("laravel").is_some());
        assert!(registry.instantiate("sitegate/laravel").is_some());
        assert!(registry.instantiate("no-such-driver").is_none());
    }

    #[test]
    fn test_laravel_site_resolves_laravel_before_fallbacks() {
        let dir = TempDir::new().unwrap();
        write_tree(
            dir.path(),
            &[("artisan", "#!"), ("public/index.php", "<?php")],
        );

        let registry = DriverRegistry::with_builtins();
        let (driver, _) = registry.resolve(&ctx(dir.path(), "/")).unwrap();
        assert_eq!(driver.name(), "laravel");
    }

    #[test]
    fn test_plain_site_falls_through_to_basic() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path(), &[("index.php", "<?php")]);

        let registry = DriverRegistry::with_builtins();
        let (driver, _) = registry.resolve(&ctx(dir.path(), "/")).unwrap();
        assert_eq!(driver.name(), "basic");
    }

    #[test]
    fn test_custom_driver_beats_builtins() {
        let dir = TempDir::new().unwrap();
        write_tree(
            dir.path(),
            &[
                // Would match the laravel builtin...
                ("artisan", "#!"),
                ("public/index.php", "<?php"),
                // ...but the per-site spec wins unconditionally
                ("SiteDriver.toml", "front_controller = \"entry/run.php\"\n"),
                ("entry/run.php", "<?php"),
            ],
        );

        let registry = DriverRegistry::with_builtins();
        let (driver, context) = registry.resolve(&ctx(dir.path(), "/anything")).unwrap();
        assert_eq!(driver.name(), "custom");

        match driver.front_controller(&context).unwrap() {
            Handoff::Execute(fc) => {
                assert_eq!(fc.entry_path, dir.path().join("entry/run.php"));
                assert_eq!(fc.script_name, "/run.php");
                assert_eq!(fc.document_root, dir.path().join("entry"));
            }
            other => panic!("unexpected handoff: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_custom_spec_is_skipped() {
        let dir = TempDir::new().unwrap();
        write_tree(
            dir.path(),
            &[("SiteDriver.toml", "front_controller = [oops"), ("index.php", "<?php")],
        );

        let registry = DriverRegistry::with_builtins();
        let (driver, _) = registry.resolve(&ctx(dir.path(), "/")).unwrap();
        assert_eq!(driver.name(), "basic");
    }

    #[test]
    fn test_spec_without_capability_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_tree(
            dir.path(),
            &[("SiteDriver.toml", "serve_markers = [\"composer.json\"]\n"), ("index.php", "<?php")],
        );

        let registry = DriverRegistry::with_builtins();
        let err = registry
            .load_spec(&dir.path().join(SITE_DRIVER_FILE), "custom".to_string())
            .unwrap_err();
        assert!(matches!(err, DriverSpecError::MissingCapability { .. }));

        // Resolution still succeeds via the builtins
        let (driver, _) = registry.resolve(&ctx(dir.path(), "/")).unwrap();
        assert_eq!(driver.name(), "basic");
    }

    #[test]
    fn test_unknown_delegate_is_recoverable() {
        let dir = TempDir::new().unwrap();
        write_tree(
            dir.path(),
            &[("SiteDriver.toml", "driver = \"no-such\"\n"), ("index.php", "<?php")],
        );

        let registry = DriverRegistry::with_builtins();
        let (driver, _) = registry.resolve(&ctx(dir.path(), "/")).unwrap();
        assert_eq!(driver.name(), "basic");
    }

    #[test]
    fn test_delegating_spec_with_namespaced_name() {
        let dir = TempDir::new().unwrap();
        write_tree(
            dir.path(),
            &[
                ("SiteDriver.toml", "driver = \"sitegate/laravel\"\n[env]\nAPP_ENV = \"local\"\n"),
                ("artisan", "#!"),
                ("public/index.php", "<?php"),
            ],
        );

        let registry = DriverRegistry::with_builtins();
        let (driver, context) = registry.resolve(&ctx(dir.path(), "/")).unwrap();
        assert_eq!(driver.name(), "custom");

        match driver.front_controller(&context).unwrap() {
            Handoff::Execute(fc) => {
                assert_eq!(fc.entry_path, dir.path().join("public/index.php"));
                assert!(fc
                    .env
                    .contains(&("APP_ENV".to_string(), "local".to_string())));
            }
            other => panic!("unexpected handoff: {:?}", other),
        }
    }

    #[test]
    fn test_extension_drivers_tried_before_builtins() {
        let site = TempDir::new().unwrap();
        write_tree(
            site.path(),
            &[("composer.json", "{}"), ("app/boot.php", "<?php"), ("index.php", "<?php")],
        );

        let extensions = TempDir::new().unwrap();
        write_tree(
            extensions.path(),
            &[(
                "bespoke.driver.toml",
                "serve_markers = [\"app/boot.php\"]\nfront_controller = \"app/boot.php\"\n",
            )],
        );

        let registry =
            DriverRegistry::with_builtins().with_extension_dir(extensions.path());
        let (driver, _) = registry.resolve(&ctx(site.path(), "/")).unwrap();
        assert_eq!(driver.name(), "bespoke");

        // Sites without the marker fall through to the builtins
        let other = TempDir::new().unwrap();
        write_tree(other.path(), &[("index.php", "<?php")]);
        let (driver, _) = registry.resolve(&ctx(other.path(), "/")).unwrap();
        assert_eq!(driver.name(), "basic");
    }

    #[test]
    fn test_strip_uri_prefix_rewrite_applied_once() {
        let dir = TempDir::new().unwrap();
        write_tree(
            dir.path(),
            &[
                (
                    "SiteDriver.toml",
                    "front_controller = \"app/index.php\"\nstrip_uri_prefix = \"/app\"\n",
                ),
                ("app/index.php", "<?php"),
            ],
        );

        let registry = DriverRegistry::with_builtins();
        let (_, context) = registry.resolve(&ctx(dir.path(), "/app/users/1")).unwrap();
        assert_eq!(context.uri, "/users/1");
    }
}
