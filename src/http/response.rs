//! Response handling and transformation.
//!
//! # Responsibilities
//! - Represent the outcome of one proxied request ([`ProxyResponse`])
//! - Expose binary bodies as base64 text for transports that need it
//! - Convert into an axum response for the HTTP server
//!
//! # Design Decisions
//! - `content-length` is recomputed from the body, never copied
//! - Binary bodies stay raw bytes until a transport asks for base64

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

/// Body of a [`ProxyResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Empty,
    Text(String),
    Binary(Bytes),
}

/// Final, externally visible result of a request.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub body: ResponseBody,
    pub headers: HeaderMap,
}

impl ProxyResponse {
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            body: ResponseBody::Empty,
            headers: HeaderMap::new(),
        }
    }

    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self {
            status,
            body: ResponseBody::Text(body.into()),
            headers,
        }
    }

    pub fn binary(status: StatusCode, body: Bytes, headers: HeaderMap) -> Self {
        Self {
            status,
            body: ResponseBody::Binary(body),
            headers,
        }
    }

    /// True when [`ProxyResponse::body_text`] is base64 of binary content.
    pub fn is_base64_encoded(&self) -> bool {
        matches!(self.body, ResponseBody::Binary(_))
    }

    /// Body as text: base64 for binary bodies, verbatim otherwise.
    pub fn body_text(&self) -> String {
        match &self.body {
            ResponseBody::Empty => String::new(),
            ResponseBody::Text(text) => text.clone(),
            ResponseBody::Binary(bytes) => STANDARD.encode(bytes),
        }
    }

    /// Raw body bytes.
    pub fn body_bytes(&self) -> Bytes {
        match &self.body {
            ResponseBody::Empty => Bytes::new(),
            ResponseBody::Text(text) => Bytes::from(text.clone()),
            ResponseBody::Binary(bytes) => bytes.clone(),
        }
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let body = self.body_bytes();
        let mut headers = self.headers;
        headers.remove(header::CONTENT_LENGTH);

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = self.status;
        *response.headers_mut() = headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_body_is_base64() {
        let response = ProxyResponse::binary(
            StatusCode::OK,
            Bytes::from_static(&[0xff, 0xd8, 0xff]),
            HeaderMap::new(),
        );
        assert!(response.is_base64_encoded());
        assert_eq!(response.body_text(), "/9j/");
    }

    #[test]
    fn test_text_and_empty_bodies() {
        let text = ProxyResponse::text(StatusCode::BAD_REQUEST, "nothing here");
        assert!(!text.is_base64_encoded());
        assert_eq!(text.body_text(), "nothing here");

        let empty = ProxyResponse::empty(StatusCode::NOT_FOUND);
        assert_eq!(empty.body_text(), "");
        assert!(empty.body_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_into_response_drops_stale_content_length() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("999"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));

        let response =
            ProxyResponse::binary(StatusCode::OK, Bytes::from_static(b"abc"), headers).into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"abc");
    }
}
