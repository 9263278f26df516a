//! Request body encoding: JSON, form-urlencoded, multipart, XML, and raw
//! bytes, plus multipart [`FormData`] assembly.

use std::path::PathBuf;

use quick_xml::se::to_string as xml_to_string;
use serde::Serialize;

use crate::error::HttpcError;

/// A single multipart field: either a plain text value or a file part
/// with its own content type.
#[derive(Debug, Clone)]
pub enum FormField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

/// A multipart/form-data payload, built up one field at a time.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    fields: Vec<FormField>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(FormField::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.fields.push(FormField::File {
            name: name.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        });
        self
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build the `reqwest::multipart::Form` for this payload.
    pub fn into_reqwest_form(self) -> Result<reqwest::multipart::Form, HttpcError> {
        let mut form = reqwest::multipart::Form::new();
        for field in self.fields {
            form = match field {
                FormField::Text { name, value } => form.text(name, value),
                FormField::File {
                    name,
                    file_name,
                    content_type,
                    bytes,
                } => {
                    let part = reqwest::multipart::Part::bytes(bytes)
                        .file_name(file_name)
                        .mime_str(&content_type)
                        .map_err(|e| {
                            HttpcError::validation(format!("invalid multipart content type: {e}"))
                        })?;
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

/// A request body before it's attached to a [`reqwest::RequestBuilder`].
///
/// `Text`/`Bytes` get an automatic default `Content-Type`; `ByteStream`
/// deliberately gets none (the caller sets one via a header if it wants
/// one), matching the three distinct in-memory body kinds the wire format
/// supports on top of the structured encodings.
#[derive(Debug, Clone)]
pub enum Body {
    Text(String),
    Bytes(Vec<u8>),
    ByteStream(Vec<u8>),
    Json(serde_json::Value),
    Xml(String),
    Form(Vec<(String, String)>),
    Multipart(FormData),
    FilePath(PathBuf),
    Empty,
}

impl Body {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, HttpcError> {
        let json = serde_json::to_value(value)
            .map_err(|e| HttpcError::validation(format!("failed to serialize JSON body: {e}")))?;
        Ok(Body::Json(json))
    }

    pub fn xml<T: Serialize>(value: &T) -> Result<Self, HttpcError> {
        let xml = xml_to_string(value)
            .map_err(|e| HttpcError::validation(format!("failed to serialize XML body: {e}")))?;
        Ok(Body::Xml(xml))
    }

    pub fn form(pairs: Vec<(String, String)>) -> Self {
        Body::Form(pairs)
    }

    pub fn multipart(data: FormData) -> Self {
        Body::Multipart(data)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Body::Text(value.into())
    }

    pub fn bytes(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }

    pub fn byte_stream(bytes: Vec<u8>) -> Self {
        Body::ByteStream(bytes)
    }

    /// The length of the body when it's a `text` or `bytes` variant, the
    /// two kinds the size-cap rule applies to; `None` for every other
    /// variant (structured bodies, streams, and file paths are exempt).
    pub fn capped_len(&self) -> Option<usize> {
        match self {
            Body::Text(s) => Some(s.len()),
            Body::Bytes(b) => Some(b.len()),
            _ => None,
        }
    }

    /// The `Content-Type` value this body would imply, if any. Multipart's
    /// boundary is assigned by `reqwest` itself when the form is attached,
    /// so it has no fixed content type here; `ByteStream` is sent as-is
    /// with no implicit type.
    pub fn content_type(&self) -> Option<&str> {
        match self {
            Body::Text(_) => Some("text/plain"),
            Body::Bytes(_) => Some("application/octet-stream"),
            Body::Json(_) => Some("application/json"),
            Body::Xml(_) => Some("application/xml"),
            Body::Form(_) => Some("application/x-www-form-urlencoded"),
            Body::ByteStream(_) | Body::Multipart(_) | Body::FilePath(_) | Body::Empty => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn json_body_serializes_struct() {
        let body = Body::json(&Sample {
            name: "widget".into(),
            count: 3,
        })
        .unwrap();
        match body {
            Body::Json(v) => {
                assert_eq!(v["name"], "widget");
                assert_eq!(v["count"], 3);
            }
            _ => panic!("expected Json body"),
        }
        assert_eq!(
            Body::json(&Sample { name: "x".into(), count: 1 })
                .unwrap()
                .content_type(),
            Some("application/json")
        );
    }

    #[test]
    fn xml_body_serializes_struct() {
        let body = Body::xml(&Sample {
            name: "widget".into(),
            count: 3,
        })
        .unwrap();
        match body {
            Body::Xml(s) => {
                assert!(s.contains("widget"));
                assert!(s.contains("3"));
            }
            _ => panic!("expected Xml body"),
        }
    }

    #[test]
    fn form_data_builder_accumulates_fields() {
        let form = FormData::new()
            .text("field1", "value1")
            .file("upload", "a.txt", "text/plain", b"hello".to_vec());
        assert_eq!(form.fields().len(), 2);
        assert!(!form.is_empty());
    }

    #[test]
    fn multipart_has_no_fixed_content_type() {
        let body = Body::multipart(FormData::new().text("a", "b"));
        assert_eq!(body.content_type(), None);
    }

    #[test]
    fn bytes_body_defaults_to_octet_stream() {
        let body = Body::bytes(b"binary".to_vec());
        assert_eq!(body.content_type(), Some("application/octet-stream"));
        assert_eq!(body.capped_len(), Some(6));
    }

    #[test]
    fn text_body_defaults_to_text_plain() {
        let body = Body::text("hello");
        assert_eq!(body.content_type(), Some("text/plain"));
        assert_eq!(body.capped_len(), Some(5));
    }

    #[test]
    fn byte_stream_has_no_implicit_content_type_or_cap() {
        let body = Body::byte_stream(b"stream".to_vec());
        assert_eq!(body.content_type(), None);
        assert_eq!(body.capped_len(), None);
    }
}
