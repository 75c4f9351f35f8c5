//! Host header to site name, and site name to directory resolution

use crate::config::SitesConfig;
use std::collections::HashMap;
use std::path::PathBuf;

/// Maximum hostname length per DNS specification
const MAX_HOSTNAME_LEN: usize = 253;

/// Resolves hostnames to site directories using the configured tld,
/// explicit links, parked paths and optional default site.
#[derive(Debug, Clone)]
pub struct SiteResolver {
    tld: String,
    links: HashMap<String, PathBuf>,
    paths: Vec<PathBuf>,
    default_site: Option<PathBuf>,
}

impl SiteResolver {
    pub fn new(config: &SitesConfig) -> Self {
        Self {
            tld: config.tld.clone(),
            links: config
                .links
                .iter()
                .map(|(name, path)| (name.to_lowercase(), PathBuf::from(path)))
                .collect(),
            paths: config.paths.iter().map(PathBuf::from).collect(),
            default_site: config.default_site.as_ref().map(PathBuf::from),
        }
    }

    /// Derive the site name from a hostname: lowercase, strip one trailing
    /// `.<tld>` suffix and one leading `www.`
    pub fn site_name(&self, host: &str) -> String {
        let host = host.to_lowercase();
        let name = host
            .strip_suffix(&format!(".{}", self.tld))
            .unwrap_or(&host);
        let name = name.strip_prefix("www.").unwrap_or(name);
        name.to_string()
    }

    /// Find the directory for a site name.
    ///
    /// Links are tried first, then each parked path in configured order,
    /// then the default site. `None` means Not-Found before any driver work.
    pub fn site_path(&self, name: &str) -> Option<PathBuf> {
        if let Some(linked) = self.links.get(name) {
            if linked.is_dir() {
                return Some(linked.clone());
            }
        }

        for parked in &self.paths {
            let candidate = parked.join(name);
            if candidate.is_dir() {
                return Some(candidate);
            }
        }

        self.default_site.as_ref().filter(|p| p.is_dir()).cloned()
    }
}

/// Extract and validate a hostname from a Host header value.
///
/// Strips the port, enforces DNS length and charset limits. Rejecting odd
/// characters keeps hostnames safe to log and to use in filesystem lookups.
pub fn sanitize_host(raw: &str) -> Option<String> {
    // Bracketed IPv6 literals ([::1]:8080) carry colons inside the brackets
    let (hostname, allow_colon) = match raw.strip_prefix('[') {
        Some(rest) => (rest.split(']').next()?, true),
        None => (raw.split(':').next()?, false),
    };

    if hostname.is_empty() || hostname.len() > MAX_HOSTNAME_LEN {
        return None;
    }

    if !hostname.chars().all(|c| {
        c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' || (allow_colon && c == ':')
    }) {
        return None;
    }

    Some(hostname.to_lowercase())
}
