use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Book tracking and social reading backend.
#[derive(Parser, Debug, Clone)]
#[command(name = "readit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "READIT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database (overrides the config file).
    #[arg(long, env = "READIT_DATABASE", global = true)]
    pub database: Option<PathBuf>,

    /// Secret used to sign session tokens (overrides the config file).
    #[arg(long, env = "JWT_TOKEN_SECRET", global = true, hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the server (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// User management commands.
    User {
        /// User subcommand action.
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Initialize database and create default config.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// User management subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    /// Add a new user.
    Add {
        /// Login name.
        name: String,
        /// Email address.
        #[arg(short, long)]
        email: String,
        /// Password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
        /// Grant the librarian role.
        #[arg(long)]
        librarian: bool,
        /// Grant the admin role.
        #[arg(long)]
        admin: bool,
    },

    /// Delete a user.
    Del {
        /// Login name to delete.
        name: String,
    },

    /// List all users.
    List,

    /// Make a user a librarian.
    Promote {
        /// Login name.
        name: String,
        /// Also grant the admin role.
        #[arg(long)]
        admin: bool,
    },

    /// Change user password.
    Passwd {
        /// Login name.
        name: String,
        /// New password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Photo storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Origin allowed to make credentialed cross-site requests.
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origin: default_allowed_origin(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        3000,
    )
}

fn default_allowed_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/readit.db")
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Token signing secret.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Session lifetime in hours.
    #[serde(default = "default_token_hours")]
    pub token_hours: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_hours: default_token_hours(),
        }
    }
}

fn default_token_hours() -> u32 {
    24
}

/// Photo storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for book photos.
    #[serde(default = "default_books_dir")]
    pub books_dir: PathBuf,

    /// Directory for profile photos.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,

    /// Uploads above this size are resized (profile) or refused (book).
    #[serde(default = "default_max_photo_bytes")]
    pub max_photo_bytes: usize,

    /// Width oversized profile photos are scaled to.
    #[serde(default = "default_resize_width")]
    pub resize_width: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            books_dir: default_books_dir(),
            assets_dir: default_assets_dir(),
            max_photo_bytes: default_max_photo_bytes(),
            resize_width: default_resize_width(),
        }
    }
}

fn default_books_dir() -> PathBuf {
    PathBuf::from("data/books")
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("data/assets")
}

fn default_max_photo_bytes() -> usize {
    1024 * 1024
}

fn default_resize_width() -> u32 {
    600
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("readit.toml"),
            dirs::config_dir()
                .map(|p| p.join("readit").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/readit/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Resolve the effective configuration for a CLI invocation.
    pub fn resolve(cli: &Cli) -> crate::error::Result<Self> {
        let mut config = match cli.config.clone().or_else(Self::find_config_file) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading config");
                Self::load(&path)?
            }
            None => Self::default(),
        };

        if let Some(path) = &cli.database {
            config.database.path = path.clone();
        }
        if let Some(secret) = &cli.jwt_secret {
            config.auth.jwt_secret = Some(secret.clone());
        }

        Ok(config)
    }

    /// The signing secret, required to serve.
    pub fn jwt_secret(&self) -> crate::error::Result<&str> {
        self.auth
            .jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                crate::error::AppError::Config(
                    "No JWT secret configured; set JWT_TOKEN_SECRET or [auth] jwt_secret"
                        .to_string(),
                )
            })
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# readit configuration

[server]
bind = "0.0.0.0:3000"
# Frontend origin allowed to send the session cookie
allowed_origin = "http://localhost:3000"

[database]
# path = "/var/lib/readit/readit.db"

[auth]
# Prefer the JWT_TOKEN_SECRET environment variable
# jwt_secret = "change-me"
# Session lifetime in hours
token_hours = 24

[storage]
# books_dir = "/var/lib/readit/books"
# assets_dir = "/var/lib/readit/assets"
# Profile photos above this size are resized, book photos are refused
max_photo_bytes = 1048576
resize_width = 600
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_default_parses() {
        let config: Config = toml::from_str(&Config::generate_default()).unwrap();

        assert_eq!(config.server.bind.port(), 3000);
        assert_eq!(config.auth.token_hours, 24);
        assert!(config.auth.jwt_secret.is_none());
        assert_eq!(config.storage.max_photo_bytes, 1024 * 1024);
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("readit.toml");
        std::fs::write(
            &path,
            "[database]\npath = \"file.db\"\n[auth]\njwt_secret = \"from-file\"\n",
        )
        .unwrap();

        let cli = Cli::parse_from([
            "readit",
            "--config",
            path.to_str().unwrap(),
            "--database",
            "flag.db",
        ]);
        let config = Config::resolve(&cli).unwrap();

        assert_eq!(config.database.path, PathBuf::from("flag.db"));
        assert_eq!(config.jwt_secret().unwrap(), "from-file");
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let config = Config::default();
        assert!(config.jwt_secret().is_err());
    }
}
