//! Entity loaders and mutation forms for every dashboard screen.
//!
//! # Design
//! `Dashboard` wires one `QueryCache` per entity type to the `ApiClient`
//! and a `Transport`. Loaders are thin: build, execute, parse, all inside
//! `QueryCache::load` so repeated and concurrent loads share one request.
//! Mutations go through `Mutation`, which names the cache entry owning the
//! mutated entity plus any other entry embedding it. A collection listing
//! embeds its books and a collection embeds levels and units, so writes
//! deep in the hierarchy also invalidate their ancestors.

use tracing::{debug, info};

use crate::cache::QueryCache;
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::key::{BookKey, CollectionKey, Route, StudentQuery, UnitKey};
use crate::mutation::{Mutation, MutationPolicy};
use crate::transport::Transport;
use crate::types::{
    Admin, Book, Collection, CurrentUser, Level, LevelLabel, NewAudio, NewBook, NewCollection,
    NewLevel, NewUnit, RenameBook, Student, Unit,
};

/// Outcome of the startup user fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Authenticated(CurrentUser),
    /// The application must show its sign-in screen.
    Unauthenticated(String),
}

/// Data for one dashboard screen, loaded from a `Route`.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Students(Vec<Student>),
    Admins(Vec<Admin>),
    Collections(Vec<Collection>),
    Collection(Collection),
    Book(Book),
    Unit(Unit),
}

pub struct Dashboard<T> {
    client: ApiClient,
    transport: T,
    students: QueryCache<StudentQuery, Vec<Student>>,
    admins: QueryCache<(), Vec<Admin>>,
    collections: QueryCache<(), Vec<Collection>>,
    collection: QueryCache<CollectionKey, Collection>,
    books: QueryCache<BookKey, Book>,
    units: QueryCache<UnitKey, Unit>,
}

impl<T: Transport> Dashboard<T> {
    pub fn new(client: ApiClient, transport: T) -> Self {
        Self {
            client,
            transport,
            students: QueryCache::new(),
            admins: QueryCache::new(),
            collections: QueryCache::new(),
            collection: QueryCache::new(),
            books: QueryCache::new(),
            units: QueryCache::new(),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Drop every cached entity, e.g. after the session changed hands.
    pub fn reset(&self) {
        self.students.clear();
        self.admins.clear();
        self.collections.clear();
        self.collection.clear();
        self.books.clear();
        self.units.clear();
        debug!("caches cleared");
    }

    // --- auth ---

    /// Fetch the signed-in user. Auth failures sign the application out;
    /// any other failure is returned to the caller.
    pub async fn authenticate(&self) -> Result<AuthState, ApiError> {
        if !self.client.session().is_signed_in() {
            return Ok(AuthState::Unauthenticated("not signed in".to_string()));
        }
        match self.current_user().await {
            Ok(user) => {
                info!(user = %user.full_name(), "authenticated");
                Ok(AuthState::Authenticated(user))
            }
            Err(ApiError::Unauthorized { message, .. }) => Ok(AuthState::Unauthenticated(message)),
            Err(err) => Err(err),
        }
    }

    pub async fn current_user(&self) -> Result<CurrentUser, ApiError> {
        let response = self.send(self.client.build_me()).await?;
        self.client.parse_me(response)
    }

    // --- loaders ---

    pub async fn students(&self, query: &StudentQuery) -> Result<Vec<Student>, ApiError> {
        self.students
            .load(query, || async {
                let response = self.send(self.client.build_list_students(query)).await?;
                self.client.parse_list_students(response)
            })
            .await
    }

    pub async fn admins(&self) -> Result<Vec<Admin>, ApiError> {
        self.admins
            .load(&(), || async {
                let response = self.send(self.client.build_list_admins()).await?;
                self.client.parse_list_admins(response)
            })
            .await
    }

    pub async fn collections(&self) -> Result<Vec<Collection>, ApiError> {
        self.collections
            .load(&(), || async {
                let response = self.send(self.client.build_list_collections()).await?;
                self.client.parse_list_collections(response)
            })
            .await
    }

    pub async fn collection(&self, key: &CollectionKey) -> Result<Collection, ApiError> {
        self.collection
            .load(key, || async {
                let response = self.send(self.client.build_get_collection(key)).await?;
                self.client.parse_get_collection(response)
            })
            .await
    }

    pub async fn book(&self, key: &BookKey) -> Result<Book, ApiError> {
        self.books
            .load(key, || async {
                let response = self.send(self.client.build_get_book(key)).await?;
                self.client.parse_get_book(response)
            })
            .await
    }

    pub async fn unit(&self, key: &UnitKey) -> Result<Unit, ApiError> {
        self.units
            .load(key, || async {
                let response = self.send(self.client.build_get_unit(key)).await?;
                self.client.parse_get_unit(response)
            })
            .await
    }

    /// Load whatever `route` displays.
    pub async fn open(&self, route: &Route) -> Result<Screen, ApiError> {
        match route {
            Route::Students => self.students(&StudentQuery::default()).await.map(Screen::Students),
            Route::Admins => self.admins().await.map(Screen::Admins),
            Route::Collections => self.collections().await.map(Screen::Collections),
            Route::Collection(key) => self.collection(key).await.map(Screen::Collection),
            Route::Book(key) => self.book(key).await.map(Screen::Book),
            Route::Unit(key) => self.unit(key).await.map(Screen::Unit),
        }
    }

    // --- roster mutations ---

    pub async fn delete_student(&self, id: &str, policy: MutationPolicy) -> Result<(), ApiError> {
        Mutation::new("delete student", &self.students, StudentQuery::default())
            .also(|| {
                self.students.invalidate_all();
            })
            .run_with(policy, without_id::<Student>(id), async {
                self.ack(self.client.build_delete_student(id)).await
            })
            .await
    }

    pub async fn delete_admin(&self, id: &str, policy: MutationPolicy) -> Result<(), ApiError> {
        Mutation::new("delete admin", &self.admins, ())
            .run_with(policy, without_id::<Admin>(id), async {
                self.ack(self.client.build_delete_admin(id)).await
            })
            .await
    }

    // --- collection mutations ---

    pub async fn create_collection(&self, input: &NewCollection) -> Result<(), ApiError> {
        Mutation::new("create collection", &self.collections, ())
            .also(|| {
                self.collection.invalidate(&CollectionKey::new(input.name.trim()));
            })
            .run(async {
                let request = self.client.build_create_collection(input)?;
                self.ack(request).await
            })
            .await
    }

    pub async fn delete_collection(&self, id: &str, policy: MutationPolicy) -> Result<(), ApiError> {
        let name = self.cached_collection_name(id);
        Mutation::new("delete collection", &self.collections, ())
            .also(|| self.invalidate_collection_family(name.as_deref()))
            .run_with(policy, without_id::<Collection>(id), async {
                self.ack(self.client.build_delete_collection(id)).await
            })
            .await
    }

    // --- book mutations ---

    pub async fn create_book(&self, collection: &Collection, name: &str) -> Result<(), ApiError> {
        let input = NewBook {
            name: name.trim().to_string(),
            collection_id: collection.id.clone(),
        };
        let owner = CollectionKey::of(collection);
        let created = owner.book(&input.name);
        Mutation::new("create book", &self.collection, owner)
            .also(|| {
                self.collections.invalidate(&());
                self.books.invalidate(&created);
            })
            .run(async {
                let request = self.client.build_create_book(&input)?;
                self.ack(request).await
            })
            .await
    }

    pub async fn rename_book(&self, collection: &Collection, book_id: &str, new_name: &str) -> Result<(), ApiError> {
        let input = RenameBook {
            collection_id: collection.id.clone(),
            book_id: book_id.to_string(),
            edited_book_name: new_name.trim().to_string(),
        };
        let owner = CollectionKey::of(collection);
        Mutation::new("rename book", &self.collection, owner.clone())
            .also(|| {
                self.collections.invalidate(&());
                self.books.invalidate_where(|key| key.owner() == owner);
                self.units.invalidate_where(|key| key.owner().owner() == owner);
            })
            .run(async {
                let request = self.client.build_rename_book(&input)?;
                self.ack(request).await
            })
            .await
    }

    pub async fn delete_book(&self, collection: &CollectionKey, book_id: &str) -> Result<(), ApiError> {
        Mutation::new("delete book", &self.collection, collection.clone())
            .also(|| {
                self.collections.invalidate(&());
                self.books.invalidate_where(|key| key.owner() == *collection);
                self.units
                    .invalidate_where(|key| key.collection == collection.collection);
            })
            .run(async {
                self.ack(self.client.build_delete_book(collection, book_id))
                    .await
            })
            .await
    }

    pub async fn create_level(&self, book: &BookKey, book_id: &str, level: LevelLabel) -> Result<(), ApiError> {
        let input = NewLevel {
            level,
            collection_name: book.collection.clone(),
            book_id: book_id.to_string(),
        };
        Mutation::new("create level", &self.books, book.clone())
            .also(|| self.invalidate_ancestors(&book.owner()))
            .run(async {
                let request = self.client.build_create_level(&input)?;
                self.ack(request).await
            })
            .await
    }

    // --- unit and audio mutations ---

    pub async fn create_unit(&self, book: &BookKey, level: &Level, input: &NewUnit) -> Result<(), ApiError> {
        Mutation::new("create unit", &self.books, book.clone())
            .also(|| self.invalidate_ancestors(&book.owner()))
            .run(async {
                let request = self.client.build_create_unit(book, &level.id, input)?;
                self.ack(request).await
            })
            .await
    }

    pub async fn add_audio(&self, unit: &UnitKey, input: &NewAudio) -> Result<(), ApiError> {
        let book = unit.owner();
        Mutation::new("add audio", &self.units, unit.clone())
            .also(|| {
                self.books.invalidate(&book);
                self.invalidate_ancestors(&book.owner());
            })
            .run(async {
                let request = self.client.build_add_audio(unit, input)?;
                self.ack(request).await
            })
            .await
    }

    // --- helpers ---

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.transport.execute(request).await
    }

    async fn ack(&self, request: HttpRequest) -> Result<(), ApiError> {
        let response = self.send(request).await?;
        self.client.parse_ack(response)
    }

    fn invalidate_ancestors(&self, collection: &CollectionKey) {
        self.collection.invalidate(collection);
        self.collections.invalidate(&());
    }

    fn cached_collection_name(&self, id: &str) -> Option<String> {
        let state = self.collections.peek(&())?;
        state
            .value()?
            .iter()
            .find(|collection| collection.id == id)
            .map(|collection| collection.name.clone())
    }

    // Without a known name every collection-scoped entry is suspect.
    fn invalidate_collection_family(&self, name: Option<&str>) {
        match name {
            Some(name) => {
                self.collection
                    .invalidate_where(|key| key.collection == name);
                self.books.invalidate_where(|key| key.collection == name);
                self.units.invalidate_where(|key| key.collection == name);
            }
            None => {
                self.collection.invalidate_all();
                self.books.invalidate_all();
                self.units.invalidate_all();
            }
        }
    }
}

trait Identified {
    fn id(&self) -> &str;
}

impl Identified for Student {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Admin {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Collection {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Optimistic patch removing the entity with `id` from a cached list.
fn without_id<E: Identified + Clone>(id: &str) -> impl FnOnce(&Vec<E>) -> Vec<E> + '_ {
    move |items| items.iter().filter(|item| item.id() != id).cloned().collect()
}
