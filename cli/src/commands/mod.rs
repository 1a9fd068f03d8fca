//! CLI command implementations
//!
//! Every screen command mounts a `View`, resolves it with one load and
//! prints it. Mutation commands mount the view that hosts their form, run
//! the mutation, then reload and print that view.

mod account;
mod browse;
mod content;
mod roster;

pub use account::{login, logout, whoami};
pub use browse::{admins, book, collection, collections, open, students, unit};
pub use content::{
    add_audio, add_level, add_unit, create_book, create_collection, delete_book,
    delete_collection, rename_book, AudioArg,
};
pub use roster::{delete_admin, delete_student};

use std::future::Future;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use ula_core::{
    ApiError, AuthState, CurrentUser, Dashboard, MutationPolicy, Presentable, UreqTransport, View,
    ViewState,
};

use crate::render::{self, Listing};

pub type Dash = Dashboard<UreqTransport>;

/// Fetch the signed-in user, or fail with a sign-in hint.
pub async fn gate(dash: &Dash) -> Result<CurrentUser> {
    match dash
        .authenticate()
        .await
        .context("fetching the signed-in user")?
    {
        AuthState::Authenticated(user) => Ok(user),
        AuthState::Unauthenticated(reason) => {
            bail!("{reason}; sign in with `ula-admin login --token <TOKEN>`")
        }
    }
}

pub fn policy(optimistic: bool) -> MutationPolicy {
    if optimistic {
        MutationPolicy::Optimistic
    } else {
        MutationPolicy::Pessimistic
    }
}

async fn mount<V: Presentable>(load: impl Future<Output = Result<V, ApiError>>) -> View<V> {
    let (mut view, ticket) = View::mount();
    view.resolve(ticket, load.await);
    view
}

async fn reload<V: Presentable>(view: &mut View<V>, load: impl Future<Output = Result<V, ApiError>>) {
    if let Some(ticket) = view.invalidate() {
        view.resolve(ticket, load.await);
    }
}

/// Print a view. A view that failed to load exits non-zero.
fn show<V: Presentable + Listing>(view: &View<V>) -> ExitCode {
    print!("{}", render::view(view.state()));
    match view.state() {
        ViewState::Error(_) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}

/// The entity a form is scoped to.
fn loaded<V: Presentable>(view: &View<V>) -> Result<&V> {
    match view.state() {
        ViewState::Error(err) => Err(anyhow::Error::new(err.clone())),
        state => state.value().ok_or_else(|| anyhow!("view has not loaded")),
    }
}

/// Run `mutation`, then reload and print the view hosting it.
async fn submit<V>(
    label: &str,
    view: &mut View<V>,
    mutation: impl Future<Output = Result<(), ApiError>>,
    load: impl Future<Output = Result<V, ApiError>>,
) -> Result<ExitCode>
where
    V: Presentable + Listing,
{
    mutation.await.with_context(|| format!("{label} failed"))?;
    println!("{label}: done");
    reload(view, load).await;
    Ok(show(view))
}
