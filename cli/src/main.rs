//! ula-admin - terminal dashboard for the language-learning content platform

mod commands;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ula_core::{ApiClient, Dashboard, LevelLabel, Session, UreqTransport};

use commands::{policy, AudioArg};

/// Parse `LABEL=PATH` for `--audio`.
fn parse_audio(s: &str) -> Result<AudioArg, String> {
    let (label, path) = s
        .split_once('=')
        .ok_or_else(|| format!("'{s}' is not LABEL=PATH"))?;
    if label.trim().is_empty() || path.trim().is_empty() {
        return Err(format!("'{s}' is not LABEL=PATH"));
    }
    Ok(AudioArg {
        label: label.trim().to_string(),
        path: PathBuf::from(path.trim()),
    })
}

#[derive(Parser, Debug)]
#[command(name = "ula-admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Base URL of the content API
    #[arg(long, global = true, env = "ULA_API_URL", default_value = "http://localhost:8000/api/")]
    api_url: String,

    /// File holding the bearer token [default: <config dir>/ula-admin/token]
    #[arg(long, global = true, env = "ULA_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Store a bearer token and verify it
    Login {
        #[arg(long)]
        token: String,
    },

    /// Forget the stored token
    Logout,

    /// Show the signed-in user
    Whoami,

    /// List students
    Students {
        /// Filter by first name
        #[arg(short, long)]
        search: Option<String>,
    },

    /// List admins
    Admins {
        /// Filter by name
        #[arg(short, long)]
        search: Option<String>,
    },

    /// List collections
    Collections {
        /// Filter by collection name
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show a collection and its books
    Collection { name: String },

    /// Show a book with its levels and units
    Book { collection: String, book: String },

    /// Show a unit and its audio tracks
    Unit {
        collection: String,
        book: String,
        level: LevelLabel,
        unit_id: String,
    },

    /// Open a dashboard route, e.g. /collections/Grammar101
    Open { route: String },

    /// Create a collection with a cover photo
    CreateCollection {
        #[arg(short, long)]
        name: String,

        /// Image file to upload
        #[arg(short, long)]
        photo: PathBuf,
    },

    /// Delete a collection by id
    DeleteCollection {
        id: String,

        /// Remove it from the listing before the server confirms
        #[arg(long)]
        optimistic: bool,
    },

    /// Add a book to a collection
    CreateBook {
        collection: String,

        #[arg(short, long)]
        name: String,
    },

    /// Rename a book
    RenameBook {
        collection: String,
        book: String,

        /// New book name
        #[arg(long)]
        to: String,
    },

    /// Delete a book from a collection
    DeleteBook { collection: String, book: String },

    /// Add a CEFR level (A1..C2) to a book
    AddLevel {
        collection: String,
        book: String,
        level: LevelLabel,
    },

    /// Add a unit to a book level
    AddUnit {
        collection: String,
        book: String,
        level: LevelLabel,

        #[arg(short, long)]
        title: String,

        /// Audio track as LABEL=PATH (repeatable)
        #[arg(long = "audio", value_parser = parse_audio)]
        audios: Vec<AudioArg>,
    },

    /// Add an audio track to a unit
    AddAudio {
        collection: String,
        book: String,
        level: LevelLabel,
        unit_id: String,

        #[arg(short, long)]
        label: String,

        /// Audio file to upload
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Delete a student by id
    DeleteStudent {
        id: String,

        #[arg(long)]
        optimistic: bool,
    },

    /// Delete an admin by id
    DeleteAdmin {
        id: String,

        #[arg(long)]
        optimistic: bool,
    },
}

impl Commands {
    /// Account commands do their own sign-in handling.
    fn needs_sign_in(&self) -> bool {
        !matches!(
            self,
            Commands::Login { .. } | Commands::Logout | Commands::Whoami
        )
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "ula_admin=debug,ula_core=debug"
    } else {
        "ula_admin=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let token_file = match cli.token_file {
        Some(path) => path,
        None => Session::default_token_path()?,
    };
    let session = Session::persisted(&token_file)
        .with_context(|| format!("reading token file {}", token_file.display()))?;
    debug!(api = %cli.api_url, token_file = %token_file.display(), "configured");

    let dash = Dashboard::new(ApiClient::new(&cli.api_url, session), UreqTransport::new());
    if cli.command.needs_sign_in() {
        commands::gate(&dash).await?;
    }

    match cli.command {
        Commands::Login { token } => commands::login(&dash, &token).await,
        Commands::Logout => commands::logout(&dash),
        Commands::Whoami => commands::whoami(&dash).await,

        Commands::Students { search } => commands::students(&dash, search.as_deref()).await,
        Commands::Admins { search } => commands::admins(&dash, search.as_deref()).await,
        Commands::Collections { search } => commands::collections(&dash, search.as_deref()).await,
        Commands::Collection { name } => commands::collection(&dash, &name).await,
        Commands::Book { collection, book } => commands::book(&dash, &collection, &book).await,
        Commands::Unit {
            collection,
            book,
            level,
            unit_id,
        } => commands::unit(&dash, &collection, &book, level, &unit_id).await,
        Commands::Open { route } => commands::open(&dash, &route).await,

        Commands::CreateCollection { name, photo } => {
            commands::create_collection(&dash, &name, &photo).await
        }
        Commands::DeleteCollection { id, optimistic } => {
            commands::delete_collection(&dash, &id, policy(optimistic)).await
        }
        Commands::CreateBook { collection, name } => {
            commands::create_book(&dash, &collection, &name).await
        }
        Commands::RenameBook {
            collection,
            book,
            to,
        } => commands::rename_book(&dash, &collection, &book, &to).await,
        Commands::DeleteBook { collection, book } => {
            commands::delete_book(&dash, &collection, &book).await
        }
        Commands::AddLevel {
            collection,
            book,
            level,
        } => commands::add_level(&dash, &collection, &book, level).await,
        Commands::AddUnit {
            collection,
            book,
            level,
            title,
            audios,
        } => commands::add_unit(&dash, &collection, &book, level, &title, &audios).await,
        Commands::AddAudio {
            collection,
            book,
            level,
            unit_id,
            label,
            file,
        } => {
            commands::add_audio(&dash, &collection, &book, level, &unit_id, &label, &file).await
        }
        Commands::DeleteStudent { id, optimistic } => {
            commands::delete_student(&dash, &id, policy(optimistic)).await
        }
        Commands::DeleteAdmin { id, optimistic } => {
            commands::delete_admin(&dash, &id, policy(optimistic)).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Commands {
        let mut argv = vec!["ula-admin"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn unit_parses_level_label() {
        assert_eq!(
            parse(&["unit", "Grammar101", "Essentials", "b2", "u1"]),
            Commands::Unit {
                collection: "Grammar101".to_string(),
                book: "Essentials".to_string(),
                level: LevelLabel::B2,
                unit_id: "u1".to_string(),
            }
        );
    }

    #[test]
    fn unknown_level_is_rejected() {
        let result = Cli::try_parse_from(["ula-admin", "add-level", "Grammar101", "Essentials", "D1"]);
        assert!(result.is_err());
    }

    #[test]
    fn add_unit_collects_audio_pairs() {
        let command = parse(&[
            "add-unit",
            "Grammar101",
            "Essentials",
            "A1",
            "--title",
            "Unit 1",
            "--audio",
            "Intro=intro.mp3",
            "--audio",
            "Dialogue=dialogue.mp3",
        ]);
        let Commands::AddUnit { title, audios, .. } = command else {
            panic!("expected add-unit");
        };
        assert_eq!(title, "Unit 1");
        assert_eq!(audios.len(), 2);
        assert_eq!(audios[1].label, "Dialogue");
        assert_eq!(audios[1].path, PathBuf::from("dialogue.mp3"));
    }

    #[test]
    fn audio_without_separator_is_rejected() {
        assert!(parse_audio("intro.mp3").is_err());
        assert!(parse_audio("=intro.mp3").is_err());
    }

    #[test]
    fn delete_flags_select_policy() {
        let Commands::DeleteAdmin { optimistic, .. } = parse(&["delete-admin", "X", "--optimistic"]) else {
            panic!("expected delete-admin");
        };
        assert_eq!(policy(optimistic), ula_core::MutationPolicy::Optimistic);
        assert_eq!(policy(false), ula_core::MutationPolicy::Pessimistic);
    }

    #[test]
    fn account_commands_skip_the_gate() {
        assert!(!parse(&["login", "--token", "t"]).needs_sign_in());
        assert!(!parse(&["logout"]).needs_sign_in());
        assert!(parse(&["students"]).needs_sign_in());
    }

    #[test]
    fn api_url_flag_overrides_default() {
        let cli = Cli::try_parse_from(["ula-admin", "--api-url", "http://x/api", "admins"]).unwrap();
        assert_eq!(cli.api_url, "http://x/api");
    }
}
