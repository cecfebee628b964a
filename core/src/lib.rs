//! Blocking client for the Todoable list-management API.
//!
//! # Overview
//! Authenticates with a username/password (or an existing token), keeps the
//! token fresh, and exposes list and list-item CRUD as typed operations.
//!
//! # Design
//! - `TodoableClient` owns the token state and is generic over `Transport`;
//!   `UreqTransport` is the production implementation.
//! - Requests and responses are plain data (`HttpRequest`, `HttpResponse`),
//!   so tests can script a transport without a network.
//! - Every non-2xx status becomes an `ApiError` variant; callers never see
//!   a failed response object.
//! - `List` and `ListItem` are built from loosely-typed JSON through
//!   `FromPayload`, failing with `ApiError::MalformedResponse`.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;

pub use auth::{basic_auth_header, get_token, Credentials};
pub use client::TodoableClient;
pub use config::{ClientConfig, DEFAULT_BASE_URL, REQUEST_TIMEOUT, TOKEN_TTL};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
pub use transport::UreqTransport;
pub use types::{FromPayload, List, ListItem};
