//! `lucli secrets put|get|list|delete` (spec §4.2, C3): a local,
//! passphrase-encrypted key/value store consulted when a manifest
//! references `${secrets.NAME}`.

use crate::commands::{EXIT_FAILURE, EXIT_SUCCESS};
use clap::Subcommand;
use dialoguer::Password;
use lucli_core::Engine;

#[derive(Subcommand, Debug)]
pub enum SecretsCommands {
    /// Store a secret value under `name`, prompting for the value if omitted.
    Put {
        name: String,
        value: Option<String>,
    },
    /// Print a secret's value.
    Get { name: String },
    /// List the secret names in the store (not their values).
    List,
    /// Remove a secret.
    Delete { name: String },
}

fn passphrase() -> Result<Vec<u8>, String> {
    if let Ok(p) = std::env::var("LUCLI_SECRETS_PASSPHRASE") {
        return Ok(p.into_bytes());
    }
    Password::new()
        .with_prompt("secrets passphrase")
        .interact()
        .map(String::into_bytes)
        .map_err(|e| format!("could not read passphrase: {e}"))
}

pub fn run(engine: &Engine, action: &SecretsCommands, json: bool) -> u8 {
    let passphrase = match passphrase() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_FAILURE;
        }
    };

    let mut store = match engine.secrets_store(&passphrase) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_FAILURE;
        }
    };

    match action {
        SecretsCommands::Put { name, value } => {
            let value = match value {
                Some(v) => v.clone(),
                None => match Password::new().with_prompt(format!("value for '{name}'")).interact() {
                    Ok(v) => v,
                    Err(e) => {
                        eprintln!("error: could not read value: {e}");
                        return EXIT_FAILURE;
                    }
                },
            };
            match store.put(name, value.as_bytes()) {
                Ok(()) => {
                    println!("stored '{name}'");
                    EXIT_SUCCESS
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    EXIT_FAILURE
                }
            }
        }
        SecretsCommands::Get { name } => match store.require_utf8(name) {
            Ok(value) => {
                println!("{value}");
                EXIT_SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                EXIT_FAILURE
            }
        },
        SecretsCommands::List => {
            let names = store.list();
            if json {
                match serde_json::to_string_pretty(&names) {
                    Ok(s) => println!("{s}"),
                    Err(e) => eprintln!("error: {e}"),
                }
            } else if names.is_empty() {
                println!("no secrets stored");
            } else {
                for name in names {
                    println!("{name}");
                }
            }
            EXIT_SUCCESS
        }
        SecretsCommands::Delete { name } => match store.delete(name) {
            Ok(true) => {
                println!("deleted '{name}'");
                EXIT_SUCCESS
            }
            Ok(false) => {
                eprintln!("error: no secret named '{name}'");
                EXIT_FAILURE
            }
            Err(e) => {
                eprintln!("error: {e}");
                EXIT_FAILURE
            }
        },
    }
}
