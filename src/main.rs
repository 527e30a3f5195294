//! readit server entry point.

use clap::Parser;
use readit::{
    accounts::{AccountService, Registration},
    config::{Cli, Command, Config, UserCommand},
    db::Database,
    server,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "readit=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = Config::resolve(&cli)?;

    // Handle command
    match cli.command {
        Some(Command::Init { force }) => cmd_init(force, &config).await,
        Some(Command::User { action }) => cmd_user(action, &config).await,
        Some(Command::Serve { bind }) => cmd_serve(config, bind).await,
        None => cmd_serve(config, None).await,
    }
}

/// Initialize config and database.
async fn cmd_init(force: bool, config: &Config) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    let _db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    for dir in [&config.storage.books_dir, &config.storage.assets_dir] {
        std::fs::create_dir_all(dir)?;
        println!("Created photo directory: {}", dir.display());
    }

    println!("\nSet JWT_TOKEN_SECRET (or [auth] jwt_secret) before serving.");
    println!("Create an admin with: readit user add <name> --email <email> --admin");

    Ok(())
}

/// User management commands.
async fn cmd_user(action: UserCommand, config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;
    let accounts = AccountService::new(db);

    match action {
        UserCommand::Add {
            name,
            email,
            password,
            librarian,
            admin,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("Password: ")?,
            };

            let registration = Registration {
                name,
                real_name: None,
                email,
                password,
            };
            let user = accounts.create_user(&registration, librarian || admin, admin)?;
            println!(
                "Created user: {} (id: {}, librarian: {}, admin: {})",
                user.name, user.id, user.librarian, user.admin
            );
        }

        UserCommand::Del { name } => {
            let user = accounts.get_by_name(&name)?;
            let user = accounts.delete(user.id)?;
            if let Some(photo) = user.profile_pic
                && let Err(e) = std::fs::remove_file(&photo)
            {
                eprintln!("Could not remove profile photo {}: {}", photo, e);
            }
            println!("Deleted user: {}", name);
        }

        UserCommand::List => {
            let users = accounts.list()?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!(
                    "{:<6} {:<20} {:<32} {:<8} {:<6} CREATED",
                    "ID", "NAME", "EMAIL", "RANK", "ROLES"
                );
                println!("{}", "-".repeat(90));
                for user in users {
                    let roles = match (user.admin, user.librarian) {
                        (true, _) => "admin",
                        (false, true) => "lib",
                        (false, false) => "-",
                    };
                    let created = chrono::DateTime::from_timestamp(user.created_at, 0)
                        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    println!(
                        "{:<6} {:<20} {:<32} {:<8} {:<6} {}",
                        user.id, user.name, user.email, user.rank, roles, created
                    );
                }
            }
        }

        UserCommand::Promote { name, admin } => {
            let user = accounts.get_by_name(&name)?;
            let user = accounts.promote(user.id, admin)?;
            println!(
                "Promoted {} (librarian: {}, admin: {})",
                user.name, user.librarian, user.admin
            );
        }

        UserCommand::Passwd { name, password } => {
            let user = accounts.get_by_name(&name)?;
            let password = match password {
                Some(p) => p,
                None => prompt_password("New password: ")?,
            };

            accounts.change_password(user.id, &password)?;
            println!("Password changed for: {}", name);
        }
    }

    Ok(())
}

/// Start the server.
async fn cmd_serve(mut config: Config, bind: Option<std::net::SocketAddr>) -> anyhow::Result<()> {
    if let Some(addr) = bind {
        config.server.bind = addr;
    }

    let db = Database::open(&config.database.path)?;

    tracing::info!(
        bind = %config.server.bind,
        database = %config.database.path.display(),
        "Starting readit server"
    );

    let bind = config.server.bind;
    let state = server::AppState::new(config, db)?;
    state.photos.init().await?;

    let app = server::create_router(state);

    let listener = TcpListener::bind(bind).await?;
    tracing::info!(address = %bind, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Prompt for password input.
fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;

    Ok(password.trim().to_string())
}
