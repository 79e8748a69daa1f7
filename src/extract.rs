//! Request body extractors that report failures as `AppError`.

use std::collections::HashMap;

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// JSON body whose decode errors name the offending field. An empty body is
/// read as `{}` so all-optional payloads may be omitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|err| AppError::validation(err.body_text()))?;

        parse_json(&bytes).map(ApiJson)
    }
}

pub fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> AppResult<T> {
    let bytes = if bytes.iter().all(u8::is_ascii_whitespace) { b"{}".as_slice() } else { bytes };
    let de = &mut serde_json::Deserializer::from_slice(bytes);

    serde_path_to_error::deserialize(de).map_err(|err| {
        let path = err.path().to_string();
        if path == "." {
            AppError::validation(err.into_inner().to_string())
        } else {
            AppError::validation(format!("{path}: {}", err.into_inner()))
        }
    })
}

/// A multipart form read into memory: text fields plus at most one file.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    pub file: Option<FormFile>,
}

#[derive(Debug)]
pub struct FormFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl FormData {
    /// Reads every part; the part named `file_field` becomes the file.
    pub async fn read(mut multipart: Multipart, file_field: &str) -> AppResult<Self> {
        let mut form = FormData::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| AppError::validation(format!("invalid multipart body: {err}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == file_field {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::validation(format!("failed to read `{name}`: {err}")))?;
                if !bytes.is_empty() {
                    form.file = Some(FormFile {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|err| AppError::validation(format!("failed to read `{name}`: {err}")))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|value| value.trim()).filter(|value| !value.is_empty())
    }

    pub fn uuid(&self, name: &str) -> AppResult<Uuid> {
        let raw = self
            .text(name)
            .ok_or_else(|| AppError::validation(format!("{name} is required")))?;
        Uuid::parse_str(raw).map_err(|_| AppError::validation(format!("{name} must be a UUID")))
    }

    pub fn coordinate(&self, name: &str) -> AppResult<Option<f64>> {
        match self.text(name) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<f64>()
                .map(Some)
                .map_err(|_| AppError::validation(format!("{name} must be a number"))),
        }
    }

    pub fn take_file(&mut self, name: &str) -> AppResult<FormFile> {
        self.file
            .take()
            .ok_or_else(|| AppError::validation(format!("{name} file is required")))
    }
}
