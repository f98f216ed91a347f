use reqwest::{Client, Method, header};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Failures talking JSON over HTTP to the SQL gateway or the job hub.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("cannot run the request at endpoint {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("status code: {status}, response: '{body}' (endpoint {endpoint})")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response data at endpoint {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("cant find {field} field in response of endpoint {endpoint}")]
    MissingField {
        endpoint: String,
        field: &'static str,
    },
}

/// Sends one JSON request and returns the raw body of a `200 OK` response.
/// Any other status is an error carrying the code and the body text.
pub async fn send_json(
    client: &Client,
    method: Method,
    endpoint: &str,
    body: Option<&Value>,
) -> Result<String, RemoteError> {
    let mut request = client
        .request(method, endpoint)
        .header(header::ACCEPT, "application/json");
    if let Some(body) = body {
        request = request.json(body);
    } else {
        request = request.header(header::CONTENT_TYPE, "application/json");
    }

    let res = request.send().await.map_err(|source| RemoteError::Transport {
        endpoint: endpoint.to_string(),
        source,
    })?;
    let status = res.status();
    let text = res.text().await.map_err(|source| RemoteError::Transport {
        endpoint: endpoint.to_string(),
        source,
    })?;
    if status != reqwest::StatusCode::OK {
        return Err(RemoteError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: text,
        });
    }
    Ok(text)
}

pub fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, RemoteError> {
    serde_json::from_str(body).map_err(|e| RemoteError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

/// Reads a handle-like field, accepting both JSON strings and scalars.
pub fn handle_field(
    value: &Value,
    field: &'static str,
    endpoint: &str,
) -> Result<String, RemoteError> {
    match value.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(RemoteError::MissingField {
            endpoint: endpoint.to_string(),
            field,
        }),
        Some(other) => Ok(other.to_string()),
    }
}
