use crate::cli::args::{ConfigArgs, ConfigCommand};
use crate::config::{Config, KEYS};
use crate::error::Result;

/// Execute config command
pub async fn execute(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            println!("✅ Configuration updated: {} = {}", key, display_value(&key, &value));
            Ok(())
        }
        ConfigCommand::Get { key } => {
            let config = Config::load()?;
            match config.get(&key) {
                Some(value) => {
                    println!("{}: {}", key, display_value(&key, &value));
                }
                None if KEYS.contains(&key.as_str()) => {
                    println!("{}: (not set)", key);
                }
                None => {
                    println!("Configuration key '{}' not found", key);
                    println!("Known keys: {}", KEYS.join(", "));
                }
            }
            Ok(())
        }
        ConfigCommand::Path => {
            let path = Config::config_file_path()?;
            println!("Configuration file: {}", path.display());
            Ok(())
        }
        ConfigCommand::Init => {
            Config::initialize()?;
            println!("✅ Configuration initialized");
            println!();
            println!("To point the client at your portal, run:");
            println!("  gateway config set server.base_url https://your-portal.example.org/");
            println!();
            println!("Then copy the sessionid cookie from a logged-in browser session:");
            println!("  gateway config set server.session_id YOUR_SESSION");
            Ok(())
        }
    }
}

/// Session cookies are masked; everything else is shown as-is.
fn display_value(key: &str, value: &str) -> String {
    if key == "server.session_id" {
        mask_value(value)
    } else {
        value.to_string()
    }
}

/// Mask sensitive values for display
fn mask_value(value: &str) -> String {
    let count = value.chars().count();
    if count > 6 {
        let prefix: String = value.chars().take(6).collect();
        format!("{}...({} characters)", prefix, count)
    } else {
        "*".repeat(count)
    }
}
