//! A resilient, security-aware HTTP(S) client over a connection-pooled
//! transport.
//!
//! ```no_run
//! # async fn run() -> Result<(), httpc::HttpcError> {
//! let client = httpc::Client::new(httpc::Config::default())?;
//! let response = client.send(client.get("https://example.com")).await?;
//! assert!(response.is_success());
//! # Ok(())
//! # }
//! ```

pub mod body;
pub mod cancel;
pub mod client;
pub mod config;
pub mod cookie;
pub mod dns;
pub mod domain;
pub mod download;
pub mod error;
pub mod observability;
pub mod pool;
pub mod proxy;
pub mod redirect;
pub mod request;
pub mod request_builder;
pub mod response;
pub mod retry;
pub mod stats;
pub mod validator;

pub use body::{Body, FormData};
pub use cancel::CancelToken;
pub use client::Client;
pub use config::{Config, ProxyConfig, RedirectConfig, RetryConfig, SecurityConfig, TlsConfig, TlsVersion};
pub use cookie::{Cookie, CookieJar, InMemoryCookieJar};
pub use domain::DomainClient;
pub use download::{DownloadOptions, DownloadResult, Downloader};
pub use error::{ErrorKind, HttpcError};
pub use request::{Headers, Request};
pub use response::{Response, ResponseHeaders};
pub use stats::Stats;

pub use reqwest::Method;
