use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, Path, Query, Request, State},
    http::{header::AUTHORIZATION, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const LEVELS: [&str; 6] = ["A1", "A2", "B1", "B2", "C1", "C2"];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Collection {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "collectionName")]
    pub name: String,
    #[serde(rename = "collectionImage")]
    pub image: String,
    pub books: Vec<Book>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Book {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub levels: Vec<Level>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Level {
    #[serde(rename = "_id")]
    pub id: String,
    pub level: String,
    pub units: Vec<Unit>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Unit {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub audios: Vec<Audio>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Audio {
    #[serde(rename = "_id")]
    pub id: String,
    pub label: String,
    pub file: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(rename = "_id")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub role: String,
}

impl Person {
    pub fn new(id: &str, first_name: &str, last_name: &str, role: &str) -> Self {
        Self {
            id: id.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            phone_number: String::new(),
            role: role.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub status: bool,
    pub last_paid_date: Option<String>,
    pub payment_history: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Student {
    #[serde(flatten)]
    pub person: Person,
    pub payment: Payment,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    pub name: String,
    pub collection_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLevel {
    pub level: String,
    pub collection_name: String,
    pub book_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditBook {
    pub collection_id: String,
    pub book_id: String,
    pub edited_book_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSearch {
    #[serde(default)]
    pub first_name: String,
}

/// In-memory backend contents.
#[derive(Debug)]
pub struct Backend {
    pub me: Person,
    pub admins: Vec<Person>,
    pub students: Vec<Student>,
    pub collections: Vec<Collection>,
    pub uploads: HashMap<String, Bytes>,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            me: Person::new("root", "Super", "Admin", "super-admin"),
            admins: Vec::new(),
            students: Vec::new(),
            collections: Vec::new(),
            uploads: HashMap::new(),
        }
    }
}

impl Backend {
    fn collection_by_name(&mut self, name: &str) -> Result<&mut Collection, Failure> {
        self.collections
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| Failure::not_found("collection not found"))
    }

    fn book_by_name(&mut self, collection: &str, book: &str) -> Result<&mut Book, Failure> {
        self.collection_by_name(collection)?
            .books
            .iter_mut()
            .find(|b| b.name == book)
            .ok_or_else(|| Failure::not_found("book not found"))
    }

    fn store_upload(&mut self, field: &FormField) -> String {
        let file_name = field.file_name.as_deref().unwrap_or("upload");
        let reference = format!("/uploads/{}-{file_name}", new_id());
        self.uploads.insert(reference.clone(), field.bytes.clone());
        reference
    }
}

pub type Db = Arc<RwLock<Backend>>;

#[derive(Clone)]
pub struct AppState {
    db: Db,
    token: Option<Arc<str>>,
    reads: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(backend: Backend) -> Self {
        Self {
            db: Arc::new(RwLock::new(backend)),
            token: None,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Require `Authorization: Bearer <token>` on every request.
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(Arc::from(token));
        self
    }

    pub fn db(&self) -> Db {
        self.db.clone()
    }

    /// Number of GET requests served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

/// Error response carrying `{"message": ...}`.
#[derive(Debug)]
pub struct Failure(StatusCode, String);

impl Failure {
    fn new(status: StatusCode, message: &str) -> Self {
        Self(status, message.to_string())
    }

    fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn conflict(message: &str) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "message": self.1 }))).into_response()
    }
}

impl From<MultipartError> for Failure {
    fn from(err: MultipartError) -> Self {
        Failure::bad_request(&err.body_text())
    }
}

pub fn app() -> Router {
    app_with(AppState::new(Backend::default()))
}

pub fn app_with(state: AppState) -> Router {
    let api = Router::new()
        .route("/super-admin/me", get(me))
        .route("/student", get(list_students))
        .route("/student/{id}", delete(delete_student))
        .route("/admin", get(list_admins))
        .route("/admin/{id}", delete(delete_admin))
        .route("/collection", get(list_collections))
        .route("/collection/createNewCollection", post(create_collection))
        .route("/collection/createNewBook", post(create_book))
        .route("/collection/newLevel", post(create_level))
        .route("/collection/deleteCollection/{id}", delete(delete_collection))
        .route("/collection/deleteBook/{collection}/{book_id}", delete(delete_book))
        .route("/collection/addUnit/{collection}/{book}/{level_id}", post(add_unit))
        .route(
            "/collection/addAudio/{collection}/{book}/{level}/{unit_id}",
            post(add_audio),
        )
        .route("/collection/{collection}", get(get_collection))
        .route("/collection/{collection}/{book}", get(get_book))
        .route("/collection/{collection}/{book}/{level}/{unit_id}", get(get_unit))
        .route("/data/editBook", put(edit_book))
        .layer(middleware::from_fn_with_state(state.clone(), gatekeeper))
        .with_state(state);
    Router::new().nest("/api", api)
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(state)).await
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Count reads and enforce the bearer token when one is configured.
async fn gatekeeper(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if request.method() == Method::GET {
        state.reads.fetch_add(1, Ordering::SeqCst);
    }
    if let Some(expected) = &state.token {
        let presented = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        if presented != Some(&**expected) {
            return Failure::new(StatusCode::UNAUTHORIZED, "Unknown Token").into_response();
        }
    }
    next.run(request).await
}

// --- multipart ---

#[derive(Debug)]
struct FormField {
    name: String,
    file_name: Option<String>,
    bytes: Bytes,
}

impl FormField {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

async fn read_form(mut multipart: Multipart) -> Result<Vec<FormField>, Failure> {
    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        fields.push(FormField {
            name,
            file_name,
            bytes,
        });
    }
    Ok(fields)
}

fn form_text(fields: &[FormField], name: &str) -> Option<String> {
    fields
        .iter()
        .find(|f| f.name == name)
        .map(FormField::text)
        .filter(|text| !text.trim().is_empty())
}

fn form_file<'a>(fields: &'a [FormField], name: &str) -> Option<&'a FormField> {
    fields
        .iter()
        .find(|f| f.name == name && f.file_name.is_some())
}

/// Split `audios[3][label]` into `(3, "label")`.
fn audio_slot(name: &str) -> Option<(usize, &str)> {
    let rest = name.strip_prefix("audios[")?;
    let (index, rest) = rest.split_once("][")?;
    let kind = rest.strip_suffix(']')?;
    Some((index.parse().ok()?, kind))
}

// --- roster ---

async fn me(State(state): State<AppState>) -> Json<Person> {
    Json(state.db.read().await.me.clone())
}

async fn list_students(
    State(state): State<AppState>,
    Query(search): Query<StudentSearch>,
) -> Json<Vec<Student>> {
    let needle = search.first_name.trim().to_lowercase();
    let db = state.db.read().await;
    Json(
        db.students
            .iter()
            .filter(|s| s.person.first_name.to_lowercase().contains(&needle))
            .cloned()
            .collect(),
    )
}

async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut db = state.db.write().await;
    let before = db.students.len();
    db.students.retain(|s| s.person.id != id);
    if db.students.len() == before {
        return Err(Failure::not_found("student not found"));
    }
    Ok(Json(json!({ "message": "student deleted" })))
}

async fn list_admins(State(state): State<AppState>) -> Json<Vec<Person>> {
    Json(state.db.read().await.admins.clone())
}

async fn delete_admin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut db = state.db.write().await;
    let before = db.admins.len();
    db.admins.retain(|a| a.id != id);
    if db.admins.len() == before {
        return Err(Failure::not_found("admin not found"));
    }
    Ok(Json(json!({ "message": "admin deleted" })))
}

// --- collections ---

async fn list_collections(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db = state.db.read().await;
    Json(json!({ "data": db.collections }))
}

async fn get_collection(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut db = state.db.write().await;
    let found = db.collection_by_name(&collection)?;
    Ok(Json(json!({ "data": found })))
}

async fn create_collection(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), Failure> {
    let fields = read_form(multipart).await?;
    let name = form_text(&fields, "collectionName")
        .ok_or_else(|| Failure::bad_request("collectionName is required"))?;
    let photo = form_file(&fields, "photo").ok_or_else(|| Failure::bad_request("photo is required"))?;

    let mut db = state.db.write().await;
    if db.collections.iter().any(|c| c.name == name.trim()) {
        return Err(Failure::conflict("collection already exists"));
    }
    let image = db.store_upload(photo);
    let collection = Collection {
        id: new_id(),
        name: name.trim().to_string(),
        image,
        books: Vec::new(),
    };
    db.collections.push(collection.clone());
    Ok((StatusCode::CREATED, Json(json!({ "data": collection }))))
}

async fn delete_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut db = state.db.write().await;
    let before = db.collections.len();
    db.collections.retain(|c| c.id != id);
    if db.collections.len() == before {
        return Err(Failure::not_found("collection not found"));
    }
    Ok(Json(json!({ "message": "collection deleted" })))
}

// --- books and levels ---

async fn get_book(
    State(state): State<AppState>,
    Path((collection, book)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut db = state.db.write().await;
    let found = db.book_by_name(&collection, &book)?;
    Ok(Json(json!({ "data": found })))
}

async fn create_book(
    State(state): State<AppState>,
    Json(input): Json<CreateBook>,
) -> Result<(StatusCode, Json<serde_json::Value>), Failure> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(Failure::bad_request("name is required"));
    }
    let mut db = state.db.write().await;
    let collection = db
        .collections
        .iter_mut()
        .find(|c| c.id == input.collection_id)
        .ok_or_else(|| Failure::not_found("collection not found"))?;
    if collection.books.iter().any(|b| b.name == name) {
        return Err(Failure::conflict("book already exists in this collection"));
    }
    let book = Book {
        id: new_id(),
        name: name.to_string(),
        levels: Vec::new(),
    };
    collection.books.push(book.clone());
    Ok((StatusCode::CREATED, Json(json!({ "data": book }))))
}

async fn edit_book(
    State(state): State<AppState>,
    Json(input): Json<EditBook>,
) -> Result<Json<serde_json::Value>, Failure> {
    let name = input.edited_book_name.trim();
    if name.is_empty() {
        return Err(Failure::bad_request("editedBookName is required"));
    }
    let mut db = state.db.write().await;
    let collection = db
        .collections
        .iter_mut()
        .find(|c| c.id == input.collection_id)
        .ok_or_else(|| Failure::not_found("collection not found"))?;
    if collection
        .books
        .iter()
        .any(|b| b.name == name && b.id != input.book_id)
    {
        return Err(Failure::conflict("book already exists in this collection"));
    }
    let book = collection
        .books
        .iter_mut()
        .find(|b| b.id == input.book_id)
        .ok_or_else(|| Failure::not_found("book not found"))?;
    book.name = name.to_string();
    Ok(Json(json!({ "data": book })))
}

async fn delete_book(
    State(state): State<AppState>,
    Path((collection, book_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut db = state.db.write().await;
    let collection = db.collection_by_name(&collection)?;
    let before = collection.books.len();
    collection.books.retain(|b| b.id != book_id);
    if collection.books.len() == before {
        return Err(Failure::not_found("book not found"));
    }
    Ok(Json(json!({ "message": "book deleted" })))
}

async fn create_level(
    State(state): State<AppState>,
    Json(input): Json<CreateLevel>,
) -> Result<(StatusCode, Json<serde_json::Value>), Failure> {
    if !LEVELS.contains(&input.level.as_str()) {
        return Err(Failure::bad_request("level must be one of A1..C2"));
    }
    let mut db = state.db.write().await;
    let book = db
        .collection_by_name(&input.collection_name)?
        .books
        .iter_mut()
        .find(|b| b.id == input.book_id)
        .ok_or_else(|| Failure::not_found("book not found"))?;
    if book.levels.iter().any(|l| l.level == input.level) {
        return Err(Failure::conflict("level already exists in this book"));
    }
    let level = Level {
        id: new_id(),
        level: input.level,
        units: Vec::new(),
    };
    book.levels.push(level.clone());
    Ok((StatusCode::CREATED, Json(json!({ "data": level }))))
}

// --- units and audio ---

async fn get_unit(
    State(state): State<AppState>,
    Path((collection, book, level, unit_id)): Path<(String, String, String, String)>,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut db = state.db.write().await;
    let unit = db
        .book_by_name(&collection, &book)?
        .levels
        .iter()
        .find(|l| l.level == level)
        .and_then(|l| l.units.iter().find(|u| u.id == unit_id))
        .ok_or_else(|| Failure::not_found("unit not found"))?;
    Ok(Json(json!({ "data": unit })))
}

async fn add_unit(
    State(state): State<AppState>,
    Path((collection, book, level_id)): Path<(String, String, String)>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), Failure> {
    let fields = read_form(multipart).await?;
    let title = form_text(&fields, "title").ok_or_else(|| Failure::bad_request("title is required"))?;

    let mut slots: Vec<(usize, Option<&FormField>, Option<String>)> = Vec::new();
    for field in &fields {
        let Some((index, kind)) = audio_slot(&field.name) else {
            continue;
        };
        let position = match slots.iter().position(|(i, _, _)| *i == index) {
            Some(position) => position,
            None => {
                slots.push((index, None, None));
                slots.len() - 1
            }
        };
        match kind {
            "file" => slots[position].1 = Some(field),
            "label" => slots[position].2 = Some(field.text()),
            _ => {}
        }
    }
    slots.sort_by_key(|(index, _, _)| *index);

    let mut db = state.db.write().await;
    let level_index = db
        .book_by_name(&collection, &book)?
        .levels
        .iter()
        .position(|l| l.id == level_id)
        .ok_or_else(|| Failure::not_found("level not found"))?;

    let mut audios = Vec::new();
    for (_, file, label) in slots {
        if let (Some(file), Some(label)) = (file, label) {
            audios.push(Audio {
                id: new_id(),
                label,
                file: db.store_upload(file),
            });
        }
    }

    let unit = Unit {
        id: new_id(),
        title: title.trim().to_string(),
        audios,
    };
    db.book_by_name(&collection, &book)?.levels[level_index]
        .units
        .push(unit.clone());
    Ok((StatusCode::CREATED, Json(json!({ "data": unit }))))
}

async fn add_audio(
    State(state): State<AppState>,
    Path((collection, book, level, unit_id)): Path<(String, String, String, String)>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), Failure> {
    let fields = read_form(multipart).await?;
    let file = form_file(&fields, "audio").ok_or_else(|| Failure::bad_request("audio file is required"))?;
    let label = form_text(&fields, "label").ok_or_else(|| Failure::bad_request("label is required"))?;

    let mut db = state.db.write().await;
    let (level_index, unit_index) = db
        .book_by_name(&collection, &book)?
        .levels
        .iter()
        .enumerate()
        .find(|(_, l)| l.level == level)
        .and_then(|(i, l)| Some((i, l.units.iter().position(|u| u.id == unit_id)?)))
        .ok_or_else(|| Failure::not_found("unit not found"))?;

    let audio = Audio {
        id: new_id(),
        label,
        file: db.store_upload(file),
    };
    db.book_by_name(&collection, &book)?.levels[level_index].units[unit_index]
        .audios
        .push(audio.clone());
    Ok((StatusCode::CREATED, Json(json!({ "data": audio }))))
}
