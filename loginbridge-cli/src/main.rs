use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loginbridge_core::platform::ensure_parent_dir;
use loginbridge_core::{
    BridgeConfig, CredentialBridge, EngineLoginBinding, FilePreferences, Hint, Login, LoginStore,
    SecurePreferences, SqliteLoginStore, StoreKey,
};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

type Bridge = CredentialBridge<SqliteLoginStore, FilePreferences>;

/// Login Bridge CLI - drive the credential bridge against the local store
#[derive(Parser)]
#[command(name = "loginbridge")]
#[command(about = "Save and look up logins through the credential bridge", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a store key and keep it in secured preferences
    Init,

    /// Save a new login or update an existing one
    Save {
        /// Guid of an existing login to update
        #[arg(long)]
        guid: Option<String>,

        #[arg(long)]
        origin: Option<String>,

        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        password: Option<String>,

        #[arg(long)]
        form_action_origin: Option<String>,

        #[arg(long)]
        http_realm: Option<String>,

        /// Hint bits: 1 generated, 2 private mode, 4 low confidence
        #[arg(long, default_value_t = 0)]
        hint: u32,
    },

    /// List logins stored for a domain
    Fetch {
        domain: String,

        /// Show passwords in plain text
        #[arg(long)]
        show_passwords: bool,
    },

    /// Mark a login as used
    Used {
        guid: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = BridgeConfig::load_or_default(cli.config.as_deref())?;

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::from_str(&config.log_level).unwrap_or(Level::INFO)
    };

    // Logs go to stderr so stdout stays machine readable
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let preferences = FilePreferences::new(&config.preferences_path, &config.device_key_path);

    match cli.command {
        Commands::Init => init(&config, &preferences)?,
        Commands::Save {
            guid,
            origin,
            username,
            password,
            form_action_origin,
            http_realm,
            hint,
        } => {
            let login = Login {
                guid,
                origin,
                form_action_origin,
                http_realm,
                username,
                password,
            };
            let binding = open_binding(&config, preferences)?;
            binding.login_save(login, Hint::from_bits(hint)).await?;
            println!("Login saved");
        }
        Commands::Fetch { domain, show_passwords } => {
            let binding = open_binding(&config, preferences)?;
            let mut logins = binding.fetch_logins(domain).await?;
            if !show_passwords {
                for login in &mut logins {
                    login.password = login.password.as_ref().map(|_| "********".to_string());
                }
            }
            println!("{}", serde_json::to_string_pretty(&logins)?);
        }
        Commands::Used { guid } => {
            let binding = open_binding(&config, preferences)?;
            binding.login_used(Login::default().with_guid(guid)).await?;
            println!("Login marked as used");
        }
    }

    Ok(())
}

fn open_store(config: &BridgeConfig) -> Result<SqliteLoginStore> {
    ensure_parent_dir(&config.store_path)?;
    SqliteLoginStore::open(&config.store_path)
        .with_context(|| format!("Failed to open store at {:?}", config.store_path))
}

fn open_binding(config: &BridgeConfig, preferences: FilePreferences) -> Result<EngineLoginBinding> {
    let store = open_store(config)?;
    let bridge: Bridge =
        CredentialBridge::new(store, preferences).with_key_name(&config.passwords_key);
    Ok(EngineLoginBinding::new(Arc::new(bridge)))
}

fn init(config: &BridgeConfig, preferences: &FilePreferences) -> Result<()> {
    if preferences.get_string(&config.passwords_key)?.is_some() {
        println!("A store key already exists in {:?}", preferences.path());
        return Ok(());
    }

    info!("Generating store key...");
    let key = StoreKey::generate();
    preferences.put_string(&config.passwords_key, &key.encode())?;

    // First unlock wraps a fresh data key for the store
    let mut store = open_store(config)?;
    store.unlock(&key.encode())?;
    store.lock()?;

    println!("Store initialized at {:?}", config.store_path);
    Ok(())
}
