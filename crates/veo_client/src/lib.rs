//! # veo_client
//!
//! Clients of the OpenVeo publishing service.
//!
//! # Features
//!
//! - **HTTP Client**: OpenVeo web service API with client credentials authentication
//! - **Mock Client**: Scriptable in-memory service for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use veo_client::{ClientConfig, HttpPublisher};
//! use veo_core::PublishingClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("https://openveo.example.org:3003", "client-id", "secret");
//!     let publisher = HttpPublisher::new(config)?;
//!
//!     let state = publisher.status("8yrKyVAcz").await?;
//!     println!("Remote state: {}", state);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod http;
pub mod mock;

pub use config::ClientConfig;
pub use http::HttpPublisher;
pub use mock::{CapturedCall, MockPublisher};
