//! Command-line argument dispatch and server initialization.
//!
//! Parses validated CLI arguments and maps them to the appropriate action,
//! such as starting the API server with its full configuration state.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::auth;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        pepper: auth_opts.pepper,
        base_url: auth_opts.base_url,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        reset_token_ttl_seconds: auth_opts.reset_token_ttl_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::actions::Action;

    #[test]
    fn handler_builds_server_action() {
        temp_env::with_vars(
            [
                ("AULA_DSN", None::<&str>),
                ("AULA_PEPPER", None::<&str>),
                ("AULA_BASE_URL", None::<&str>),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec![
                    "aula",
                    "--dsn",
                    "postgres://user@localhost:5432/aula",
                    "--pepper",
                    "super-secret-pepper",
                    "--base-url",
                    "https://aula.dev",
                    "--session-ttl-seconds",
                    "3600",
                ]);
                let action = handler(&matches);
                assert!(action.is_ok());
                if let Ok(Action::Server(args)) = action {
                    assert_eq!(args.port, 8080);
                    assert_eq!(args.dsn, "postgres://user@localhost:5432/aula");
                    assert_eq!(args.base_url, "https://aula.dev");
                    assert_eq!(args.session_ttl_seconds, 3600);
                    assert_eq!(args.reset_token_ttl_seconds, 1800);
                }
            },
        );
    }
}
