use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Global configuration for the dispatcher
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Site resolution configuration
    #[serde(default)]
    pub sites: SitesConfig,

    /// PHP runtime configuration
    #[serde(default)]
    pub php: PhpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// HTTP port (default: 80)
    #[serde(default = "default_listen_port")]
    pub port: u16,

    /// Bind address (default: 127.0.0.1, this is a local development tool)
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Path to PID file (optional)
    pub pid_file: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_listen_port(),
            bind: default_bind_address(),
            pid_file: None,
        }
    }
}

/// How hostnames are mapped to site directories
#[derive(Debug, Deserialize, Clone)]
pub struct SitesConfig {
    /// Top-level domain suffix stripped from hostnames (default: "test")
    #[serde(default = "default_tld")]
    pub tld: String,

    /// Parked directories: every immediate subdirectory is a routable site
    #[serde(default)]
    pub paths: Vec<String>,

    /// Explicit site-name-to-directory links, tried before parked paths
    #[serde(default)]
    pub links: HashMap<String, String>,

    /// Fallback site directory when no name matches
    pub default_site: Option<String>,

    /// Render a directory listing when a driver resolves nothing (default: off)
    #[serde(default)]
    pub directory_listing: bool,

    /// Directory scanned for user-extension driver specs
    /// (default: ~/.config/sitegate/drivers)
    pub drivers_dir: Option<String>,
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            tld: default_tld(),
            paths: Vec::new(),
            links: HashMap::new(),
            default_site: None,
            directory_listing: false,
            drivers_dir: None,
        }
    }
}

impl SitesConfig {
    /// Resolved extension-driver directory
    pub fn drivers_dir(&self) -> Option<PathBuf> {
        if let Some(ref dir) = self.drivers_dir {
            return Some(PathBuf::from(dir));
        }
        dirs_next::config_dir().map(|d| d.join("sitegate").join("drivers"))
    }

    /// Directory holding the global environment-override file
    pub fn config_dir(&self) -> Option<PathBuf> {
        dirs_next::config_dir().map(|d| d.join("sitegate"))
    }
}

/// PHP runtime used for front controller handoff
#[derive(Debug, Deserialize, Clone)]
pub struct PhpConfig {
    /// CGI binary to execute front controllers with (default: "php-cgi")
    #[serde(default = "default_php_binary")]
    pub binary: String,

    /// Extra arguments passed before the CGI invocation
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for PhpConfig {
    fn default() -> Self {
        Self {
            binary: default_php_binary(),
            args: Vec::new(),
        }
    }
}

// Default value functions
fn default_listen_port() -> u16 {
    80
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_tld() -> String {
    "test".to_string()
}

fn default_php_binary() -> String {
    "php-cgi".to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        if self.sites.tld.is_empty() {
            errors.push("sites.tld must not be empty".to_string());
        }
        if self.sites.tld.contains('.') {
            errors.push(format!(
                "sites.tld '{}' must be a bare suffix without dots",
                self.sites.tld
            ));
        }
        for (name, path) in &self.sites.links {
            if name.is_empty() {
                errors.push(format!("link to '{}' has an empty site name", path));
            }
        }
        if self.php.binary.is_empty() {
            errors.push("php.binary must not be empty".to_string());
        }

        if !errors.is_empty() {
            anyhow::bail!("Configuration errors:\n  - {}", errors.join("\n  - "));
        }

        Ok(())
    }
}
