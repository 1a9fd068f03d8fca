//! `multipart/form-data` encoding for uploads.
//!
//! The core encodes the body itself so `HttpRequest` stays plain data and
//! any `Transport` can send it as opaque bytes.

use uuid::Uuid;

use crate::types::Upload;

#[derive(Debug, Clone)]
enum Part {
    Text { name: String, value: String },
    File { name: String, upload: Upload },
}

/// Builder for a multipart form body.
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::with_boundary(&format!("ula-{}", Uuid::new_v4().simple()))
    }

    pub fn with_boundary(boundary: &str) -> Self {
        Self {
            boundary: boundary.to_string(),
            parts: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.push(Part::Text {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn file(mut self, name: &str, upload: &Upload) -> Self {
        self.parts.push(Part::File {
            name: name.to_string(),
            upload: upload.clone(),
        });
        self
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the `content-type` request header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for part in &self.parts {
            out.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            match part {
                Part::Text { name, value } => {
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                            escape(name)
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(value.as_bytes());
                }
                Part::File { name, upload } => {
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                            escape(name),
                            escape(&upload.file_name)
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(
                        format!("Content-Type: {}\r\n\r\n", upload.content_type).as_bytes(),
                    );
                    out.extend_from_slice(&upload.bytes);
                }
            }
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out
    }
}

// Quotes and line breaks would terminate the header value early.
fn escape(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_text_and_file_parts() {
        let upload = Upload::new("cover.png", "image/png", vec![1, 2, 3]);
        let form = MultipartForm::with_boundary("XYZ")
            .text("collectionName", "Grammar101")
            .file("photo", &upload);

        let mut expected = Vec::new();
        expected.extend_from_slice(
            b"--XYZ\r\nContent-Disposition: form-data; name=\"collectionName\"\r\n\r\nGrammar101\r\n",
        );
        expected.extend_from_slice(
            b"--XYZ\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"cover.png\"\r\nContent-Type: image/png\r\n\r\n",
        );
        expected.extend_from_slice(&[1, 2, 3]);
        expected.extend_from_slice(b"\r\n--XYZ--\r\n");

        assert_eq!(form.encode(), expected);
        assert_eq!(form.content_type(), "multipart/form-data; boundary=XYZ");
    }

    #[test]
    fn escapes_quotes_in_file_names() {
        let upload = Upload::new("a\"b.mp3", "audio/mpeg", Vec::new());
        let body = MultipartForm::with_boundary("B").file("audio", &upload).encode();
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("filename=\"a%22b.mp3\""));
    }

    #[test]
    fn random_boundaries_differ() {
        assert_ne!(MultipartForm::new().boundary(), MultipartForm::new().boundary());
    }
}
