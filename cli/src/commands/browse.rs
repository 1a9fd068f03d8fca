//! Read-only screens

use std::process::ExitCode;

use anyhow::{anyhow, Result};
use tracing::debug;
use ula_core::{filter, BookKey, CollectionKey, LevelLabel, Route, Searchable, StudentQuery};

use super::{mount, show, Dash};

fn matching<T: Searchable + Clone>(items: Vec<T>, query: &str) -> Vec<T> {
    filter(&items, query).into_iter().cloned().collect()
}

/// Students are searched server-side by first name.
pub async fn students(dash: &Dash, search: Option<&str>) -> Result<ExitCode> {
    let query = StudentQuery::new(search.unwrap_or_default());
    let view = mount(dash.students(&query)).await;
    Ok(show(&view))
}

pub async fn admins(dash: &Dash, search: Option<&str>) -> Result<ExitCode> {
    let search = search.unwrap_or_default();
    let view = mount(async { dash.admins().await.map(|admins| matching(admins, search)) }).await;
    Ok(show(&view))
}

pub async fn collections(dash: &Dash, search: Option<&str>) -> Result<ExitCode> {
    let search = search.unwrap_or_default();
    let view = mount(async {
        dash.collections()
            .await
            .map(|collections| matching(collections, search))
    })
    .await;
    Ok(show(&view))
}

pub async fn collection(dash: &Dash, name: &str) -> Result<ExitCode> {
    let view = mount(dash.collection(&CollectionKey::new(name))).await;
    Ok(show(&view))
}

pub async fn book(dash: &Dash, collection: &str, book: &str) -> Result<ExitCode> {
    let view = mount(dash.book(&BookKey::new(collection, book))).await;
    Ok(show(&view))
}

pub async fn unit(
    dash: &Dash,
    collection: &str,
    book: &str,
    level: LevelLabel,
    unit_id: &str,
) -> Result<ExitCode> {
    let key = BookKey::new(collection, book).unit(level, unit_id);
    let view = mount(dash.unit(&key)).await;
    Ok(show(&view))
}

/// Open a dashboard route such as `/collections/Grammar101/Essentials`.
pub async fn open(dash: &Dash, route: &str) -> Result<ExitCode> {
    let parsed = Route::parse(route).ok_or_else(|| anyhow!("unknown route '{route}'"))?;
    debug!(route = %parsed.path(), "opening");
    let view = mount(dash.open(&parsed)).await;
    Ok(show(&view))
}
