//! API client core for the language-learning content platform's admin
//! dashboard.
//!
//! # Overview
//! Staff manage collections of books, book levels, units and audio tracks,
//! plus admin and student rosters. Every screen is a view over the REST
//! backend; this crate provides what those views share:
//!
//! - `ApiClient` builds `HttpRequest` values and parses `HttpResponse`
//!   values without touching the network (host-does-IO pattern).
//! - `Transport` executes requests; `UreqTransport` is the real one.
//! - `QueryCache` de-duplicates and caches loads per composite key.
//! - `Mutation` runs a write and invalidates the entries it made stale.
//! - `View` tracks one screen's `Loading -> {Error, Empty, Populated}` life.
//! - `Dashboard` binds all of the above per entity type.
//!
//! # Design
//! - The bearer token comes from a `Session` read per request, so login and
//!   logout take effect immediately.
//! - Reads are keyed by names (that is how the backend routes them);
//!   mutations target ids.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod cache;
pub mod client;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod http;
pub mod key;
pub mod multipart;
pub mod mutation;
pub mod session;
pub mod transport;
pub mod types;
pub mod view;

pub use cache::{FetchState, QueryCache};
pub use client::ApiClient;
pub use dashboard::{AuthState, Dashboard, Screen};
pub use error::{ApiError, ErrorKind};
pub use filter::{filter, Searchable};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use key::{BookKey, CollectionKey, Route, StudentQuery, UnitKey};
pub use multipart::MultipartForm;
pub use mutation::{Mutation, MutationPolicy};
pub use session::{Session, SessionError};
pub use transport::{Transport, UreqTransport};
pub use types::{
    Admin, Audio, Book, Collection, CurrentUser, Level, LevelLabel, NewAudio, NewBook,
    NewCollection, NewLevel, NewUnit, Payment, RenameBook, Student, Unit, Upload,
};
pub use view::{Presentable, Ticket, View, ViewState};
