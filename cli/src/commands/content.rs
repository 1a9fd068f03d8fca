//! Collection, book, level, unit and audio forms

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use ula_core::{
    BookKey, Collection, CollectionKey, LevelLabel, MutationPolicy, NewAudio, NewCollection, NewUnit,
    Upload,
};

use super::{loaded, mount, submit, Dash};

/// `LABEL=PATH` pair given to `add-unit --audio`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArg {
    pub label: String,
    pub path: PathBuf,
}

fn upload(path: &Path) -> Result<Upload> {
    Upload::from_path(path).with_context(|| format!("reading {}", path.display()))
}

pub async fn create_collection(dash: &Dash, name: &str, photo: &Path) -> Result<ExitCode> {
    let input = NewCollection {
        name: name.to_string(),
        photo: Some(upload(photo)?),
    };
    let mut view = mount(dash.collections()).await;
    submit(
        "create collection",
        &mut view,
        dash.create_collection(&input),
        dash.collections(),
    )
    .await
}

pub async fn delete_collection(dash: &Dash, id: &str, policy: MutationPolicy) -> Result<ExitCode> {
    let mut view = mount(dash.collections()).await;
    loaded(&view)?;
    submit(
        "delete collection",
        &mut view,
        dash.delete_collection(id, policy),
        dash.collections(),
    )
    .await
}

pub async fn create_book(dash: &Dash, collection: &str, name: &str) -> Result<ExitCode> {
    let key = CollectionKey::new(collection);
    let mut view = mount(dash.collection(&key)).await;
    let host = loaded(&view)?.clone();
    submit(
        "create book",
        &mut view,
        dash.create_book(&host, name),
        dash.collection(&key),
    )
    .await
}

pub async fn rename_book(dash: &Dash, collection: &str, book: &str, new_name: &str) -> Result<ExitCode> {
    let key = CollectionKey::new(collection);
    let mut view = mount(dash.collection(&key)).await;
    let host = loaded(&view)?.clone();
    let book_id = book_id(&host, book)?;
    submit(
        "rename book",
        &mut view,
        dash.rename_book(&host, &book_id, new_name),
        dash.collection(&key),
    )
    .await
}

pub async fn delete_book(dash: &Dash, collection: &str, book: &str) -> Result<ExitCode> {
    let key = CollectionKey::new(collection);
    let mut view = mount(dash.collection(&key)).await;
    let book_id = book_id(loaded(&view)?, book)?;
    submit(
        "delete book",
        &mut view,
        dash.delete_book(&key, &book_id),
        dash.collection(&key),
    )
    .await
}

fn book_id(collection: &Collection, name: &str) -> Result<String> {
    collection
        .book_named(name)
        .map(|book| book.id.clone())
        .ok_or_else(|| anyhow!("no book named '{name}' in {}", collection.name))
}

pub async fn add_level(dash: &Dash, collection: &str, book: &str, level: LevelLabel) -> Result<ExitCode> {
    let key = BookKey::new(collection, book);
    let mut view = mount(dash.book(&key)).await;
    let book_id = loaded(&view)?.id.clone();
    submit(
        "add level",
        &mut view,
        dash.create_level(&key, &book_id, level),
        dash.book(&key),
    )
    .await
}

pub async fn add_unit(
    dash: &Dash,
    collection: &str,
    book: &str,
    level: LevelLabel,
    title: &str,
    audios: &[AudioArg],
) -> Result<ExitCode> {
    let mut input = NewUnit::titled(title);
    for audio in audios {
        input.audios.push(NewAudio {
            label: audio.label.clone(),
            file: Some(upload(&audio.path)?),
        });
    }

    let key = BookKey::new(collection, book);
    let mut view = mount(dash.book(&key)).await;
    let target = loaded(&view)?
        .level(level)
        .cloned()
        .ok_or_else(|| anyhow!("{book} has no {level} level; add it with `add-level`"))?;
    submit(
        "add unit",
        &mut view,
        dash.create_unit(&key, &target, &input),
        dash.book(&key),
    )
    .await
}

pub async fn add_audio(
    dash: &Dash,
    collection: &str,
    book: &str,
    level: LevelLabel,
    unit_id: &str,
    label: &str,
    file: &Path,
) -> Result<ExitCode> {
    let input = NewAudio {
        label: label.to_string(),
        file: Some(upload(file)?),
    };
    let key = BookKey::new(collection, book).unit(level, unit_id);
    let mut view = mount(dash.unit(&key)).await;
    loaded(&view)?;
    submit(
        "add audio",
        &mut view,
        dash.add_audio(&key, &input),
        dash.unit(&key),
    )
    .await
}
