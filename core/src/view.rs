//! View lifecycle: `Loading -> {Error, Empty, Populated}`.
//!
//! # Design
//! A view never talks to the network itself. It hands out a `Ticket` when it
//! starts loading, and a result is only applied when it comes back with the
//! ticket the view is still waiting for. That covers both late results for
//! an unmounted view and results overtaken by a newer invalidate.

use tracing::debug;

use crate::dashboard::Screen;
use crate::error::ApiError;
use crate::types::{Book, Collection, Unit};

/// Whether a loaded value has children to list.
pub trait Presentable {
    fn is_empty(&self) -> bool;
}

impl<T> Presentable for Vec<T> {
    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }
}

impl Presentable for Collection {
    fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

impl Presentable for Book {
    fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl Presentable for Unit {
    fn is_empty(&self) -> bool {
        self.audios.is_empty()
    }
}

impl Presentable for Screen {
    fn is_empty(&self) -> bool {
        match self {
            Screen::Students(students) => students.is_empty(),
            Screen::Admins(admins) => admins.is_empty(),
            Screen::Collections(collections) => collections.is_empty(),
            Screen::Collection(collection) => Presentable::is_empty(collection),
            Screen::Book(book) => Presentable::is_empty(book),
            Screen::Unit(unit) => Presentable::is_empty(unit),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<V> {
    Loading,
    Error(ApiError),
    /// Loaded, but nothing to list. The value is kept so the view can still
    /// show its header and host forms for adding children.
    Empty(V),
    Populated(V),
}

impl<V> ViewState<V> {
    pub fn value(&self) -> Option<&V> {
        match self {
            ViewState::Empty(value) | ViewState::Populated(value) => Some(value),
            ViewState::Loading | ViewState::Error(_) => None,
        }
    }
}

/// Proof that a result belongs to a specific load of a specific view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug)]
pub struct View<V> {
    state: ViewState<V>,
    mounted: bool,
    awaiting: Option<u64>,
    issued: u64,
}

impl<V: Presentable> View<V> {
    /// Mount a view; it starts in `Loading` waiting on the returned ticket.
    pub fn mount() -> (Self, Ticket) {
        let view = Self {
            state: ViewState::Loading,
            mounted: true,
            awaiting: Some(0),
            issued: 0,
        };
        (view, Ticket(0))
    }

    pub fn state(&self) -> &ViewState<V> {
        &self.state
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Re-enter `Loading` after an explicit invalidate. Unmounted views
    /// cannot be reloaded.
    pub fn invalidate(&mut self) -> Option<Ticket> {
        if !self.mounted {
            return None;
        }
        self.issued += 1;
        self.awaiting = Some(self.issued);
        self.state = ViewState::Loading;
        Some(Ticket(self.issued))
    }

    /// Apply a load result. Returns `false` when the result was discarded.
    pub fn resolve(&mut self, ticket: Ticket, result: Result<V, ApiError>) -> bool {
        if !self.mounted {
            debug!("discarding result for unmounted view");
            return false;
        }
        if self.awaiting != Some(ticket.0) {
            debug!(ticket = ticket.0, "discarding superseded result");
            return false;
        }
        self.awaiting = None;
        self.state = match result {
            Ok(value) if value.is_empty() => ViewState::Empty(value),
            Ok(value) => ViewState::Populated(value),
            Err(err) => ViewState::Error(err),
        };
        true
    }

    pub fn unmount(&mut self) {
        self.mounted = false;
        self.awaiting = None;
    }
}
