//! Sign-in state

use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use tracing::info;
use ula_core::AuthState;

use super::{gate, Dash};

/// Store `token` and check it against the server.
pub async fn login(dash: &Dash, token: &str) -> Result<ExitCode> {
    let session = dash.client().session();
    session.login(token).context("storing the token")?;
    dash.reset();

    match dash
        .authenticate()
        .await
        .context("fetching the signed-in user")?
    {
        AuthState::Authenticated(user) => {
            info!(user = %user.full_name(), "signed in");
            println!("Signed in as {} ({})", user.full_name(), user.role);
            Ok(ExitCode::SUCCESS)
        }
        AuthState::Unauthenticated(reason) => {
            session.logout().context("discarding the rejected token")?;
            bail!("token rejected: {reason}")
        }
    }
}

pub fn logout(dash: &Dash) -> Result<ExitCode> {
    dash.client()
        .session()
        .logout()
        .context("removing the stored token")?;
    dash.reset();
    println!("Signed out.");
    Ok(ExitCode::SUCCESS)
}

pub async fn whoami(dash: &Dash) -> Result<ExitCode> {
    let user = gate(dash).await?;
    println!("{} ({})", user.full_name(), user.role);
    println!("id: {}", user.id);
    Ok(ExitCode::SUCCESS)
}
