//! Request-scoped context and the execution descriptor produced by dispatch

use crate::error::DispatchErrorCode;
use std::path::{Path, PathBuf};

/// Everything a driver needs to know about one request.
///
/// Created at the start of a dispatch and discarded at its end. The only
/// mutation allowed is a single URI rewrite by the selected driver, applied
/// before `serves` is evaluated; all later calls on that driver observe the
/// rewritten URI.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Absolute path to the site directory
    pub site_path: PathBuf,
    /// Site name derived from the hostname (tld and leading www stripped)
    pub site_name: String,
    /// Percent-decoded path component of the request, query stripped
    pub uri: String,
}

impl RequestContext {
    pub fn new(site_path: PathBuf, site_name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            site_path,
            site_name: site_name.into(),
            uri: uri.into(),
        }
    }

    /// Copy of this context with the URI replaced (the one-shot driver rewrite)
    pub fn with_uri(&self, uri: String) -> Self {
        Self {
            site_path: self.site_path.clone(),
            site_name: self.site_name.clone(),
            uri,
        }
    }

    /// Whether the URI addresses the site root
    pub fn is_root(&self) -> bool {
        self.uri == "/" || self.uri.is_empty()
    }

    /// Whether the URI names a PHP script.
    ///
    /// Such requests are never classified as static assets, even when the
    /// file physically exists, so source code is never served raw.
    pub fn is_php(&self) -> bool {
        Path::new(&self.uri)
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("php"))
            .unwrap_or(false)
    }
}

/// Execution descriptor for a resolved front controller.
///
/// Drivers describe where execution should happen instead of mutating the
/// process environment or working directory themselves. The descriptor is
/// applied in one place, to a single child process, immediately before
/// handoff, so concurrent requests never observe each other's mutations.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontController {
    /// Absolute path of the entry script (or SPA shell file)
    pub entry_path: PathBuf,
    /// Document root the script should believe it is served from
    pub document_root: PathBuf,
    /// Script name relative to the document root, with leading slash
    pub script_name: String,
    /// Working directory for the handoff
    pub working_dir: PathBuf,
    /// Environment overlay, applied in order (later entries win)
    pub env: Vec<(String, String)>,
}

impl FrontController {
    pub fn new(
        entry_path: PathBuf,
        document_root: PathBuf,
        script_name: impl Into<String>,
    ) -> Self {
        let working_dir = entry_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| document_root.clone());
        Self {
            entry_path,
            document_root,
            script_name: script_name.into(),
            working_dir,
            env: Vec::new(),
        }
    }

    /// Append a driver-provided environment entry (builder pattern)
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Prepend override entries so driver-provided entries keep priority
    pub fn with_overrides(mut self, overrides: Vec<(String, String)>) -> Self {
        let mut env = overrides;
        env.append(&mut self.env);
        self.env = env;
        self
    }

    /// Whether the entry script must be executed through PHP.
    ///
    /// Non-PHP entries (an SPA's index.html) are streamed as bytes instead.
    pub fn is_php(&self) -> bool {
        self.entry_path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("php"))
            .unwrap_or(false)
    }
}

/// How a dynamic request leaves the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum Handoff {
    /// Execute the described front controller
    Execute(FrontController),
    /// Redirect before handling (e.g. enforcing a trailing slash)
    Redirect { location: String },
}

/// The result of one dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Stream this file verbatim
    StaticFile(PathBuf),
    /// Hand off to a front controller or redirect
    Handoff(Handoff),
    /// Render a directory listing of the site root
    DirectoryListing(PathBuf),
    /// Nothing matched; the code says which stage gave up
    NotFound(DispatchErrorCode),
}
