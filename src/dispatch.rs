//! The request dispatcher: ResolveSite, ResolveDriver, ClassifyRequest,
//! Respond.
//!
//! All per-request failures are absorbed here and become a NotFound outcome;
//! nothing in this path panics or propagates errors to the server loop.

use crate::config::Config;
use crate::context::{DispatchOutcome, Handoff, RequestContext};
use crate::envfile;
use crate::error::DispatchErrorCode;
use crate::registry::DriverRegistry;
use crate::sites::SiteResolver;
use std::path::PathBuf;
use tracing::debug;

pub struct Dispatcher {
    sites: SiteResolver,
    registry: DriverRegistry,
    directory_listing: bool,
    config_dir: Option<PathBuf>,
}

impl Dispatcher {
    pub fn new(config: &Config, registry: DriverRegistry) -> Self {
        Self {
            sites: SiteResolver::new(&config.sites),
            registry,
            directory_listing: config.sites.directory_listing,
            config_dir: config.sites.config_dir(),
        }
    }

    #[cfg(test)]
    pub fn without_global_env(mut self) -> Self {
        self.config_dir = None;
        self
    }

    /// Dispatch one request. `host` is the sanitized hostname, `path` the
    /// percent-decoded path component (query already stripped).
    pub fn dispatch(&self, host: &str, path: &str) -> DispatchOutcome {
        // ResolveSite
        let site_name = self.sites.site_name(host);
        let Some(site_path) = self.sites.site_path(&site_name) else {
            debug!(host, site = site_name, "No site for hostname");
            return DispatchOutcome::NotFound(DispatchErrorCode::UnknownSite);
        };
        let ctx = RequestContext::new(site_path, site_name, path);

        // ResolveDriver (the one-shot URI rewrite happens inside resolve)
        let Some((driver, ctx)) = self.registry.resolve(&ctx) else {
            debug!(site = %ctx.site_name, "No driver recognized the site");
            return DispatchOutcome::NotFound(DispatchErrorCode::NoDriver);
        };

        // Environment overrides are loaded up front so a malformed file is
        // reported once per request, before any routing decision
        let overrides =
            envfile::load_overrides(&ctx.site_path, &ctx.site_name, self.config_dir.as_deref());

        // ClassifyRequest: the root URI and literal PHP scripts are never
        // static, everything else may short-circuit to a file on disk
        if !ctx.is_root() && !ctx.is_php() {
            if let Some(file) = driver.static_file(&ctx) {
                debug!(driver = driver.name(), file = %file.display(), "Static file");
                return DispatchOutcome::StaticFile(file);
            }
        }

        // Respond (dynamic branch)
        match driver.front_controller(&ctx) {
            Some(Handoff::Execute(fc)) => {
                debug!(
                    driver = driver.name(),
                    entry = %fc.entry_path.display(),
                    "Front controller resolved"
                );
                DispatchOutcome::Handoff(Handoff::Execute(fc.with_overrides(overrides)))
            }
            Some(redirect @ Handoff::Redirect { .. }) => DispatchOutcome::Handoff(redirect),
            None if self.directory_listing => DispatchOutcome::DirectoryListing(ctx.site_path),
            None => {
                debug!(driver = driver.name(), uri = %ctx.uri, "No front controller");
                DispatchOutcome::NotFound(DispatchErrorCode::NotFound)
            }
        }
    }
}
