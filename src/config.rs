use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Storehouse - command line client for the storage inventory API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// API base URL
    #[arg(
        short = 'u',
        long,
        env = "STOREHOUSE_API_URL",
        default_value = "http://localhost:8080/api"
    )]
    pub api_url: String,

    /// Path to the session database
    #[arg(short = 'd', long, env = "STOREHOUSE_SESSION_DB")]
    pub session_db: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "10")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Sign in with login and password
    Signin {
        login: String,
        /// Read from the terminal when omitted
        #[arg(long, env = "STOREHOUSE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Register a new account
    Signup {
        login: String,
        email: String,
        #[arg(long, env = "STOREHOUSE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign out and forget the session
    Signout,
    /// Show whether a session is active
    Status,
    /// Show the signed-in user's profile
    Whoami,
    /// Manage storages
    #[command(subcommand)]
    Storages(StorageCommand),
    /// Manage object templates
    #[command(subcommand)]
    Templates(TemplateCommand),
    /// Manage stored objects
    #[command(subcommand)]
    Objects(ObjectCommand),
    /// List measurement units
    Units,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum StorageCommand {
    /// List storages, optionally only the children of one
    List {
        #[arg(long)]
        parent: Option<Uuid>,
    },
    /// Print the storage hierarchy
    Tree,
    /// Show one storage and its location
    Show { id: Uuid },
    Create(StorageCreateArgs),
    Delete { id: Uuid },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct StorageCreateArgs {
    pub name: String,
    #[arg(long)]
    pub capacity: f64,
    #[arg(long)]
    pub unit: Option<Uuid>,
    #[arg(long)]
    pub parent: Option<Uuid>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum TemplateCommand {
    List {
        /// Include deleted templates
        #[arg(long)]
        all: bool,
    },
    Show { id: Uuid },
    Delete { id: Uuid },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ObjectCommand {
    List {
        #[arg(long)]
        storage: Option<Uuid>,
        #[arg(long)]
        template: Option<Uuid>,
        /// Include decommissioned objects
        #[arg(long)]
        all: bool,
    },
    Show { id: Uuid },
    Delete { id: Uuid },
    /// Save the object's QR code as an image file
    Qr {
        id: Uuid,
        #[arg(short, long, default_value = "qrcode.png")]
        output: PathBuf,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,

    /// SQLite file holding the persisted session
    pub session_db: PathBuf,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    pub log_level: String,
}

impl Config {
    /// Build the configuration with priority: CLI > ENV > defaults
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let session_db = match &args.session_db {
            Some(path) => expand_tilde(path),
            None => default_session_db()?,
        };

        Ok(Config {
            api_url: args.api_url.trim_end_matches('/').to_string(),
            session_db,
            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            http_request_timeout: args.http_timeout,
            log_level: args.log_level.clone(),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.api_url)
            .with_context(|| format!("STOREHOUSE_API_URL is not a valid URL: {}", self.api_url))?;

        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("STOREHOUSE_API_URL must use http or https: {}", self.api_url);
        }

        if self.http_request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be greater than zero");
        }

        Ok(())
    }

    /// Origin the session cookies are scoped to
    pub fn cookie_origin(&self) -> Result<reqwest::Url> {
        reqwest::Url::parse(&format!("{}/", self.api_url))
            .with_context(|| format!("Invalid API URL: {}", self.api_url))
    }
}

fn default_session_db() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .context("Cannot locate a data directory (set STOREHOUSE_SESSION_DB)")?;
    Ok(base.join("storehouse").join("session.sqlite3"))
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_url: &str) -> Config {
        Config {
            api_url: api_url.to_string(),
            session_db: PathBuf::from("/tmp/session.sqlite3"),
            http_connect_timeout: 5,
            http_request_timeout: 10,
            log_level: "warn".to_string(),
        }
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/test/file.txt");
        assert!(path.to_string_lossy().contains("test/file.txt"));
        assert!(!path.to_string_lossy().starts_with("~"));

        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_tilde_just_tilde() {
        // Just "~" without slash should not expand
        let path = expand_tilde("~");
        assert_eq!(path, PathBuf::from("~"));
    }

    #[test]
    fn test_validate() {
        assert!(config("http://localhost:8080/api").validate().is_ok());
        assert!(config("ftp://localhost/api").validate().is_err());
        assert!(config("not a url").validate().is_err());

        let mut zero = config("https://example.com/api");
        zero.http_request_timeout = 0;
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_cookie_origin_has_trailing_slash() {
        let origin = config("http://localhost:8080/api").cookie_origin().unwrap();
        assert_eq!(origin.as_str(), "http://localhost:8080/api/");
    }

    #[test]
    fn test_parse_subcommands() {
        let args = CliArgs::try_parse_from([
            "storehouse",
            "--api-url",
            "http://example.com/api/",
            "--session-db",
            "/tmp/s.db",
            "storages",
            "create",
            "Garage",
            "--capacity",
            "20",
        ])
        .unwrap();

        match &args.command {
            Command::Storages(StorageCommand::Create(create)) => {
                assert_eq!(create.name, "Garage");
                assert_eq!(create.capacity, 20.0);
                assert_eq!(create.parent, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.api_url, "http://example.com/api");
        assert_eq!(config.session_db, PathBuf::from("/tmp/s.db"));
    }

    #[test]
    fn test_parse_signin_without_password() {
        let args = CliArgs::try_parse_from(["storehouse", "signin", "alice"]).unwrap();
        // STOREHOUSE_PASSWORD may be set in the environment running the tests
        assert!(matches!(args.command, Command::Signin { ref login, .. } if login == "alice"));
    }
}
