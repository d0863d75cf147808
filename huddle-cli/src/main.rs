use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use huddle::UserId;
use huddle::model::UserIdentity;
use huddle::server::{AppState, Config, Coordinator, JwtVerifier, router};

const DEFAULT_LOG_FILTER: &str = "huddle=info,huddle_server=info,huddle_cli=info";

#[derive(Parser)]
#[command(name = "huddle", version, about = "Real-time meeting room coordinator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coordinator.
    Serve {
        #[arg(short, long, env = "HUDDLE_CONFIG")]
        config: Option<PathBuf>,

        /// Overrides `server.bind`.
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Print the effective configuration and check it.
    CheckConfig {
        #[arg(short, long, env = "HUDDLE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Sign a session token with the configured secret, for local testing.
    Token {
        #[arg(short, long, env = "HUDDLE_CONFIG")]
        config: Option<PathBuf>,

        #[arg(long)]
        user: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, default_value_t = String::new())]
        email: String,

        /// Lifetime in seconds.
        #[arg(long, default_value_t = 3600)]
        ttl: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, bind } => {
            init_tracing();
            let mut config =
                Config::load(config.as_deref()).context("Failed to load configuration")?;
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            serve(config).await
        }
        Commands::CheckConfig { config } => check_config(config),
        Commands::Token {
            config,
            user,
            name,
            email,
            ttl,
        } => {
            let config = Config::load(config.as_deref()).context("Failed to load configuration")?;
            let identity = UserIdentity {
                name: name.unwrap_or_else(|| user.clone()),
                id: UserId::from(user),
                email,
                avatar: None,
            };
            let token = JwtVerifier::new(&config.auth.jwt_secret)
                .issue(&identity, ttl)
                .context("Failed to sign token")?;
            println!("{token}");
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn serve(config: Config) -> Result<()> {
    let coordinator =
        Coordinator::from_config(&config).context("Failed to set up meeting store")?;
    let reminders = if config.reminders.enabled {
        Some(
            coordinator
                .reminder_service()
                .with_interval(config.reminders.interval())
                .spawn(),
        )
    } else {
        info!("Meeting reminders disabled");
        None
    };
    let state = AppState::new(coordinator, config.internal_api_key.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!("Huddle coordinator listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    if let Some(reminders) = reminders {
        reminders.abort();
    }
    Ok(())
}

fn check_config(path: Option<PathBuf>) -> Result<()> {
    let config = match Config::load(path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            println!("{} {}", "✗".red().bold(), e.to_string().red());
            return Err(e.into());
        }
    };

    println!("{}", "Huddle configuration".green().bold());
    println!("  {} {}", "bind:".cyan(), config.server.bind);
    println!(
        "  {} {}",
        "room queue capacity:".cyan(),
        config.server.room_queue_capacity
    );
    println!(
        "  {} {} bytes",
        "jwt secret:".cyan(),
        config.auth.jwt_secret.len()
    );
    match &config.store.base_url {
        Some(url) => println!(
            "  {} {} (timeout {}s)",
            "meeting store:".cyan(),
            url,
            config.store.timeout_secs
        ),
        None => println!(
            "  {} {} ({} seeded meetings, {} teams, {} scheduled)",
            "meeting store:".cyan(),
            "in-memory".yellow(),
            config.store.seed.len(),
            config.store.teams.len(),
            config.store.schedule.len()
        ),
    }
    if config.reminders.enabled {
        println!(
            "  {} every {}s",
            "reminders:".cyan(),
            config.reminders.interval_secs
        );
    } else {
        println!("  {} {}", "reminders:".cyan(), "disabled".yellow());
    }
    for server in &config.ice_servers {
        let auth = if server.username.is_some() { " (with credentials)" } else { "" };
        println!("  {} {}{}", "ice:".cyan(), server.urls.join(", "), auth);
    }
    let notify = if config.internal_api_key.is_some() {
        "enabled".green()
    } else {
        "disabled".yellow()
    };
    println!("  {} {}", "notify endpoint:".cyan(), notify);

    println!("{}", "✓ Configuration is valid".green().bold());
    Ok(())
}
