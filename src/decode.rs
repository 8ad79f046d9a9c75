//! Response classification shared by every calling convention.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::envelope::{HydraCollection, HydraError};
use crate::{Error, Result};

/// Decode a raw response into `T`.
///
/// The checks run in a fixed order:
/// 1. a missing body is a network error;
/// 2. a body that parses as a [`HydraError`] is returned as [`Error::Remote`]
///    whatever the status code;
/// 3. a status outside `200..300` is a network error carrying the raw body;
/// 4. an empty body is decoded as `{}`;
/// 5. anything that does not parse as `T` is a decoding error.
pub fn decode_response<T: DeserializeOwned>(status: StatusCode, body: Option<&[u8]>) -> Result<T> {
    let Some(body) = body else {
        return Err(Error::Network("empty body".to_string()));
    };

    if let Ok(hydra) = serde_json::from_slice::<HydraError>(body) {
        return Err(hydra.into());
    }

    if !status.is_success() {
        return Err(Error::Network(format!(
            "status {}: {}",
            status.as_u16(),
            String::from_utf8_lossy(body)
        )));
    }

    let body: &[u8] = if body.is_empty() { b"{}" } else { body };
    serde_json::from_slice(body).map_err(|e| Error::Decoding(e.to_string()))
}

/// Project a decoded collection onto its items.
///
/// A missing `hydra:member` list becomes an empty vector; only errors already
/// present in `result` are returned.
pub fn unwrap_collection<T>(result: Result<HydraCollection<T>>) -> Result<Vec<T>> {
    result.map(HydraCollection::into_members)
}
