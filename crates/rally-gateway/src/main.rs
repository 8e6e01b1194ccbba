//! rally server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store, and serves the HTTP API plus the realtime WebSocket.
//!
//! # Secrets and tokens
//!
//! ```text
//! rally-server --generate-secret                 # value for token_secret
//! rally-server --create-user ann@example.com ann # prints the new user id
//! rally-server --issue-token 1                   # session token for user 1
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use rally_core::{
  store::UserStore as _,
  user::NewUser,
};
use rally_gateway::{AppState, ServerConfig, token::SessionKeys};
use rally_store_sqlite::SqliteStore;
use rand_core::{OsRng, RngCore as _};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "rally realtime server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print a fresh random token secret (hex) and exit.
  #[arg(long)]
  generate_secret: bool,

  /// Create a user and print its id.
  #[arg(long, num_args = 2, value_names = ["EMAIL", "USERNAME"])]
  create_user: Option<Vec<String>>,

  /// Print a session token for an existing user and exit.
  #[arg(long, value_name = "USER_ID")]
  issue_token: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.generate_secret {
    let mut secret = [0u8; 32];
    OsRng.fill_bytes(&mut secret);
    println!("{}", hex::encode(secret));
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("RALLY"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let keys = SessionKeys::from_hex(&server_cfg.token_secret, server_cfg.token_ttl_secs)
    .context("invalid token_secret")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if let Some(args) = cli.create_user {
    let [email, username] = <[String; 2]>::try_from(args)
      .map_err(|_| anyhow::anyhow!("--create-user takes EMAIL and USERNAME"))?;
    let user = store
      .create_user(NewUser::new(email, username))
      .await
      .context("failed to create user")?;
    println!("{}", user.id);
    return Ok(());
  }

  if let Some(user_id) = cli.issue_token {
    let user = store
      .get_user(user_id)
      .await
      .context("failed to look up user")?
      .with_context(|| format!("no user with id {user_id}"))?;
    println!("{}", keys.issue(&user.identity())?);
    return Ok(());
  }

  let state = AppState::new(Arc::new(store), keys);
  let app = rally_gateway::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
