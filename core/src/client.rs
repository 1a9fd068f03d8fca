//! Request builder and response parser for the content-platform API.
//!
//! # Design
//! `ApiClient` holds the base URL and a `Session`, and carries no other
//! state between calls. Each endpoint is split into a `build_*` method that
//! produces an `HttpRequest` and a `parse_*` method that consumes an
//! `HttpResponse`; a `Transport` executes the round-trip in between. The
//! bearer token is read from the session while building, so every request
//! carries whatever token is current at that moment.
//!
//! Write payloads are validated in their `build_*` method: a payload that
//! fails a presence check never becomes a request.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::key::{BookKey, CollectionKey, StudentQuery, UnitKey};
use crate::multipart::MultipartForm;
use crate::session::Session;
use crate::types::{
    Admin, Book, Collection, CurrentUser, Envelope, MessageBody, NewAudio, NewBook,
    NewCollection, NewLevel, NewUnit, RenameBook, Student, Unit,
};

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Session) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    // --- roster ---

    pub fn build_me(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "super-admin/me")
    }

    pub fn build_list_students(&self, query: &StudentQuery) -> HttpRequest {
        self.request(HttpMethod::Get, &query.path())
    }

    pub fn build_list_admins(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "admin")
    }

    pub fn build_delete_student(&self, id: &str) -> HttpRequest {
        self.request(HttpMethod::Delete, &format!("student/{}", segment(id)))
    }

    pub fn build_delete_admin(&self, id: &str) -> HttpRequest {
        self.request(HttpMethod::Delete, &format!("admin/{}", segment(id)))
    }

    // --- collections ---

    pub fn build_list_collections(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "collection")
    }

    pub fn build_get_collection(&self, key: &CollectionKey) -> HttpRequest {
        self.request(HttpMethod::Get, &key.path())
    }

    pub fn build_create_collection(&self, input: &NewCollection) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        let mut form = MultipartForm::new().text("collectionName", input.name.trim());
        if let Some(photo) = &input.photo {
            form = form.file("photo", photo);
        }
        Ok(self.multipart(HttpMethod::Post, "collection/createNewCollection", &form))
    }

    pub fn build_delete_collection(&self, id: &str) -> HttpRequest {
        self.request(
            HttpMethod::Delete,
            &format!("collection/deleteCollection/{}", segment(id)),
        )
    }

    // --- books and levels ---

    pub fn build_get_book(&self, key: &BookKey) -> HttpRequest {
        self.request(HttpMethod::Get, &key.path())
    }

    pub fn build_create_book(&self, input: &NewBook) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        self.json(HttpMethod::Post, "collection/createNewBook", input)
    }

    pub fn build_rename_book(&self, input: &RenameBook) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        self.json(HttpMethod::Put, "data/editBook", input)
    }

    pub fn build_delete_book(&self, collection: &CollectionKey, book_id: &str) -> HttpRequest {
        self.request(
            HttpMethod::Delete,
            &format!(
                "collection/deleteBook/{}/{}",
                segment(&collection.collection),
                segment(book_id)
            ),
        )
    }

    pub fn build_create_level(&self, input: &NewLevel) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        self.json(HttpMethod::Post, "collection/newLevel", input)
    }

    // --- units and audio ---

    pub fn build_get_unit(&self, key: &UnitKey) -> HttpRequest {
        self.request(HttpMethod::Get, &key.path())
    }

    pub fn build_create_unit(
        &self,
        book: &BookKey,
        level_id: &str,
        input: &NewUnit,
    ) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        let mut form = MultipartForm::new().text("title", input.title.trim());
        for (index, audio) in input.audios.iter().enumerate() {
            if let Some(file) = &audio.file {
                form = form
                    .file(&format!("audios[{index}][file]"), file)
                    .text(&format!("audios[{index}][label]"), &audio.label);
            }
        }
        let path = format!(
            "collection/addUnit/{}/{}/{}",
            segment(&book.collection),
            segment(&book.book),
            segment(level_id)
        );
        Ok(self.multipart(HttpMethod::Post, &path, &form))
    }

    pub fn build_add_audio(&self, unit: &UnitKey, input: &NewAudio) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        let mut form = MultipartForm::new();
        if let Some(file) = &input.file {
            form = form.file("audio", file);
        }
        form = form.text("label", &input.label);
        let path = format!(
            "collection/addAudio/{}/{}/{}/{}",
            segment(&unit.collection),
            segment(&unit.book),
            unit.level,
            segment(&unit.unit_id)
        );
        Ok(self.multipart(HttpMethod::Post, &path, &form))
    }

    // --- parsers ---

    pub fn parse_me(&self, response: HttpResponse) -> Result<CurrentUser, ApiError> {
        check_status(&response)?;
        decode(&response.body)
    }

    pub fn parse_list_students(&self, response: HttpResponse) -> Result<Vec<Student>, ApiError> {
        check_status(&response)?;
        decode(&response.body)
    }

    pub fn parse_list_admins(&self, response: HttpResponse) -> Result<Vec<Admin>, ApiError> {
        check_status(&response)?;
        decode(&response.body)
    }

    pub fn parse_list_collections(&self, response: HttpResponse) -> Result<Vec<Collection>, ApiError> {
        check_status(&response)?;
        Ok(decode_envelope::<Vec<Collection>>(&response.body)?.unwrap_or_default())
    }

    pub fn parse_get_collection(&self, response: HttpResponse) -> Result<Collection, ApiError> {
        check_status(&response)?;
        decode_envelope(&response.body)?.ok_or(ApiError::NotFound)
    }

    pub fn parse_get_book(&self, response: HttpResponse) -> Result<Book, ApiError> {
        check_status(&response)?;
        decode_envelope(&response.body)?.ok_or(ApiError::NotFound)
    }

    pub fn parse_get_unit(&self, response: HttpResponse) -> Result<Unit, ApiError> {
        check_status(&response)?;
        decode_envelope(&response.body)?.ok_or(ApiError::NotFound)
    }

    /// Parse the acknowledgement of any create/update/delete call.
    pub fn parse_ack(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    // --- helpers ---

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        let mut headers = Vec::new();
        if let Some(authorization) = self.session.authorization() {
            headers.push(("authorization".to_string(), authorization));
        }
        HttpRequest {
            method,
            path: format!("{}/{}", self.base_url, path.trim_start_matches('/')),
            headers,
            body: None,
        }
    }

    fn json<T: Serialize>(&self, method: HttpMethod, path: &str, input: &T) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_vec(input).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        let mut request = self.request(method, path);
        request
            .headers
            .push(("content-type".to_string(), "application/json".to_string()));
        request.body = Some(body);
        Ok(request)
    }

    fn multipart(&self, method: HttpMethod, path: &str, form: &MultipartForm) -> HttpRequest {
        let mut request = self.request(method, path);
        request
            .headers
            .push(("content-type".to_string(), form.content_type()));
        request.body = Some(form.encode());
        request
    }
}

fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<Option<T>, ApiError> {
    decode::<Envelope<Option<T>>>(body).map(|envelope| envelope.data)
}

/// Map non-2xx status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    let message = server_message(&response.body);
    match response.status {
        404 => Err(ApiError::NotFound),
        401 | 403 => Err(ApiError::Unauthorized {
            status: response.status,
            message,
        }),
        status => Err(ApiError::Request { status, message }),
    }
}

/// The `message` field of a JSON error body, or the raw body otherwise.
fn server_message(body: &str) -> String {
    serde_json::from_str::<MessageBody>(body)
        .ok()
        .and_then(|parsed| parsed.message)
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LevelLabel, Upload};

    fn client() -> ApiClient {
        ApiClient::new("http://localhost:8000/api/", Session::with_token("t0k"))
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn every_request_carries_the_current_token() {
        let session = Session::with_token("first");
        let client = ApiClient::new("http://localhost:8000/api", session.clone());
        assert_eq!(client.build_me().header("Authorization"), Some("Bearer first"));

        session.login("second").unwrap();
        assert_eq!(client.build_list_admins().header("authorization"), Some("Bearer second"));

        session.logout().unwrap();
        assert_eq!(client.build_list_collections().header("authorization"), None);
    }

    #[test]
    fn build_get_book_uses_names() {
        let req = client().build_get_book(&BookKey::new("Grammar101", "Essentials"));
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:8000/api/collection/Grammar101/Essentials");
        assert!(req.body.is_none());
    }

    #[test]
    fn build_list_students_passes_search_term() {
        let req = client().build_list_students(&StudentQuery::new("Ada"));
        assert_eq!(req.path, "http://localhost:8000/api/student?firstName=Ada");
    }

    #[test]
    fn build_delete_paths() {
        let c = client();
        assert_eq!(c.build_delete_admin("X").path, "http://localhost:8000/api/admin/X");
        assert_eq!(c.build_delete_student("s1").method, HttpMethod::Delete);
        assert_eq!(
            c.build_delete_collection("c1").path,
            "http://localhost:8000/api/collection/deleteCollection/c1"
        );
        assert_eq!(
            c.build_delete_book(&CollectionKey::new("Grammar 101"), "b1").path,
            "http://localhost:8000/api/collection/deleteBook/Grammar%20101/b1"
        );
    }

    #[test]
    fn build_create_book_produces_json() {
        let input = NewBook {
            name: "Essentials".to_string(),
            collection_id: "c1".to_string(),
        };
        let req = client().build_create_book(&input).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:8000/api/collection/createNewBook");
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["name"], "Essentials");
        assert_eq!(body["collectionId"], "c1");
    }

    #[test]
    fn build_create_level_serializes_label() {
        let input = NewLevel {
            level: LevelLabel::B1,
            collection_name: "Grammar101".to_string(),
            book_id: "b1".to_string(),
        };
        let req = client().build_create_level(&input).unwrap();
        let body: serde_json::Value = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["level"], "B1");
        assert_eq!(body["collectionName"], "Grammar101");
        assert_eq!(body["bookId"], "b1");
    }

    #[test]
    fn build_rename_book_uses_put() {
        let input = RenameBook {
            collection_id: "c1".to_string(),
            book_id: "b1".to_string(),
            edited_book_name: "Essentials II".to_string(),
        };
        let req = client().build_rename_book(&input).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert!(req.path.ends_with("/data/editBook"));
    }

    #[test]
    fn build_create_collection_is_multipart() {
        let input = NewCollection {
            name: "Grammar101".to_string(),
            photo: Some(Upload::new("cover.png", "image/png", b"png".to_vec())),
        };
        let req = client().build_create_collection(&input).unwrap();
        let content_type = req.header("content-type").unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let body = String::from_utf8(req.body.unwrap()).unwrap();
        assert!(body.contains("name=\"collectionName\"\r\n\r\nGrammar101\r\n"));
        assert!(body.contains("name=\"photo\"; filename=\"cover.png\""));
    }

    #[test]
    fn build_create_unit_includes_indexed_audios() {
        let input = NewUnit {
            title: "Unit 1".to_string(),
            audios: vec![NewAudio {
                label: "Intro".to_string(),
                file: Some(Upload::new("intro.mp3", "audio/mpeg", vec![0])),
            }],
        };
        let req = client()
            .build_create_unit(&BookKey::new("Grammar101", "Essentials"), "l1", &input)
            .unwrap();
        assert_eq!(
            req.path,
            "http://localhost:8000/api/collection/addUnit/Grammar101/Essentials/l1"
        );
        let body = String::from_utf8_lossy(req.body.as_deref().unwrap()).into_owned();
        assert!(body.contains("name=\"audios[0][file]\"; filename=\"intro.mp3\""));
        assert!(body.contains("name=\"audios[0][label]\"\r\n\r\nIntro\r\n"));
    }

    #[test]
    fn build_add_audio_targets_unit_path() {
        let unit = BookKey::new("Grammar101", "Essentials").unit(LevelLabel::A1, "u1");
        let input = NewAudio {
            label: "Dialogue".to_string(),
            file: Some(Upload::new("d.mp3", "audio/mpeg", vec![1])),
        };
        let req = client().build_add_audio(&unit, &input).unwrap();
        assert_eq!(
            req.path,
            "http://localhost:8000/api/collection/addAudio/Grammar101/Essentials/A1/u1"
        );
    }

    #[test]
    fn invalid_payloads_never_become_requests() {
        let input = NewBook {
            name: " ".to_string(),
            collection_id: "c1".to_string(),
        };
        let err = client().build_create_book(&input).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn parse_get_collection_unwraps_envelope() {
        let body = r#"{"data":{"_id":"c1","collectionName":"Grammar101","collectionImage":"x","books":[]}}"#;
        let collection = client().parse_get_collection(response(200, body)).unwrap();
        assert_eq!(collection.name, "Grammar101");
        assert!(collection.books.is_empty());
    }

    #[test]
    fn parse_get_collection_null_data_is_not_found() {
        let err = client().parse_get_collection(response(200, r#"{"data":null}"#)).unwrap_err();
        assert_eq!(err, ApiError::NotFound);
    }

    #[test]
    fn parse_list_admins_reads_bare_array() {
        let body = r#"[{"_id":"a1","firstName":"Grace","lastName":"Hopper","phoneNumber":"1","role":"admin"}]"#;
        let admins = client().parse_list_admins(response(200, body)).unwrap();
        assert_eq!(admins[0].full_name(), "Grace Hopper");
    }

    #[test]
    fn parse_rejection_carries_server_message() {
        let err = client()
            .parse_ack(response(409, r#"{"message":"book already exists"}"#))
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Request {
                status: 409,
                message: "book already exists".to_string()
            }
        );
    }

    #[test]
    fn parse_unauthorized() {
        let err = client().parse_me(response(401, r#"{"message":"Unknown Token"}"#)).unwrap_err();
        assert!(err.is_auth());
    }

    #[test]
    fn parse_plain_text_error_keeps_body() {
        let err = client().parse_ack(response(500, "internal error")).unwrap_err();
        assert!(matches!(err, ApiError::Request { status: 500, ref message } if message == "internal error"));
    }

    #[test]
    fn parse_bad_json() {
        let err = client().parse_list_students(response(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = ApiClient::new("http://localhost:8000/api/", Session::anonymous());
        assert_eq!(client.build_list_collections().path, "http://localhost:8000/api/collection");
    }
}
