//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod character_list;
pub mod chat;
pub mod say;


use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::auth::AuthManager;
use crate::cli::character_list::list_characters;
use crate::cli::chat::run_chat;
use crate::cli::say::run_say;
use crate::core::config::defaults::SETTABLE_KEYS;
use crate::core::config::Config;

/// Environment variable holding the `tracing` filter directive.
pub const LOG_FILTER_ENV: &str = "DAWBREI_LOG";

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ")"
);

#[derive(Parser)]
#[command(name = "dawbrei")]
#[command(about = "Chat with character personas you define, with spoken replies")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    long_about = "Dawbrei keeps a folder of character personas (one JSON file each) and lets you \
chat with them through an OpenAI-compatible completion API. Replies are printed and spoken \
aloud through a local speech program such as espeak-ng.\n\n\
Authentication:\n\
  Use 'dawbrei auth' to store an API key securely in your system keyring.\n\n\
Environment Variables:\n\
  DAWBREI_API_KEY         API key (checked before OPENAI_API_KEY and the keyring)\n\
  OPENAI_API_KEY          API key fallback\n\
  DAWBREI_CHARACTERS_DIR  Folder holding character files (default: ./characters)\n\
  DAWBREI_CONFIG          Path to the configuration file\n\
  DAWBREI_LOG             Diagnostic log filter, e.g. 'debug' (default: warn)\n\n\
Commands:\n\
  /new              Create a character from a blank form\n\
  /edit             Show the loaded character's fields\n\
  /save             Save the form: updates the loaded character, or creates one\n\
  /list             List characters\n\
  /load <n>         Load the character at position n\n\
  /log <filename>   Enable logging to specified file\n\
  /log              Toggle logging pause/resume\n\
  /help             Show this list\n\
  /quit             Save all characters and exit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use for chat
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Folder holding character files
    #[arg(short = 'd', long, global = true, value_name = "DIR")]
    pub characters_dir: Option<PathBuf>,

    /// Enable logging to specified file
    #[arg(short = 'l', long, global = true)]
    pub log: Option<String>,

    /// Print replies without speaking them
    #[arg(long, global = true)]
    pub mute: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up authentication
    Auth,
    /// Remove the stored API key
    Deauth,
    /// Start the chat interface (default)
    Chat,
    /// List saved characters
    List,
    /// Send a single message to a character and print the reply
    Say {
        /// Character to talk to, by name
        #[arg(short = 'c', long)]
        character: String,
        /// Message text
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        prompt: Vec<String>,
    },
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set for the key (can be multiple words)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Option<Vec<String>>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

/// Settings shared by every command that opens a session.
pub struct SessionOptions {
    pub model: Option<String>,
    pub characters_dir: Option<PathBuf>,
    pub log: Option<String>,
    pub mute: bool,
}

impl SessionOptions {
    pub fn model(&self, config: &Config) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| config.model().to_string())
    }

    pub fn characters_dir(&self, config: &Config) -> PathBuf {
        self.characters_dir
            .clone()
            .unwrap_or_else(|| config.characters_dir())
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // A second init (tests) leaves the first subscriber in place
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let options = SessionOptions {
        model: args.model,
        characters_dir: args.characters_dir,
        log: args.log,
        mute: args.mute,
    };

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Auth => {
            let auth_manager = AuthManager::new();
            if let Err(e) = auth_manager.interactive_auth() {
                eprintln!("❌ Authentication failed: {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Deauth => {
            let auth_manager = AuthManager::new();
            if let Err(e) = auth_manager.interactive_deauth() {
                eprintln!("❌ Deauthentication failed: {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::List => {
            let config = Config::load()?;
            list_characters(&options.characters_dir(&config), config.load_policy())
        }
        Commands::Say { character, prompt } => run_say(options, &character, prompt).await,
        Commands::Set { key, value } => {
            let mut config = Config::load()?;
            let value = value.map(|parts| parts.join(" ")).unwrap_or_default();
            if value.is_empty() {
                config.print_all();
                return Ok(());
            }
            match config.set_value(&key, &value) {
                Ok(message) => {
                    config.save()?;
                    println!("✅ {message}");
                    Ok(())
                }
                Err(message) => {
                    eprintln!("❌ {message}");
                    eprintln!("Available keys: {}", SETTABLE_KEYS.join(", "));
                    std::process::exit(1);
                }
            }
        }
        Commands::Unset { key } => {
            let mut config = Config::load()?;
            match config.unset_value(&key) {
                Ok(message) => {
                    config.save()?;
                    println!("✅ {message}");
                    Ok(())
                }
                Err(message) => {
                    eprintln!("❌ {message}");
                    eprintln!("Available keys: {}", SETTABLE_KEYS.join(", "));
                    std::process::exit(1);
                }
            }
        }
        Commands::Chat => run_chat(options).await,
    }
}
