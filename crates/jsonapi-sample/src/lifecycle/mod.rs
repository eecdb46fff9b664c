//! # System Lifecycle & Wiring
//!
//! Everything a JSON:API application needs before it can serve a request is built
//! once, at startup, and then shared read-only by every request:
//!
//! 1. **Resource graph** - [`build_graph`] declares every model, its attributes and
//!    relationships. Inverses (`people.articles` / `articles.author`) are resolved by
//!    the builder; self references (`people.friends`) stay one-sided.
//! 2. **Store** - an [`InMemoryRepository`](jsonapi_core::mock::InMemoryRepository)
//!    stands in for a database.
//! 3. **Definitions and hooks** - registered per model type; see
//!    [`crate::definitions`] and [`crate::hooks`].
//! 4. **Context** - a [`JsonApiContext`](jsonapi_core::JsonApiContext) that hands out
//!    one [`ResourceService`](jsonapi_core::ResourceService) per resource type.
//!
//! ```rust,ignore
//! let system = BlogSystem::new()?;
//! system.seed_demo_data().await?;
//!
//! let mut request = RequestContext::new().with_query(&[("include", "author")]);
//! let articles = system.articles()?.get_all(&mut request).await?;
//! ```
//!
//! ## Configuration
//!
//! [`BlogSystem::from_config`] accepts the same JSON document as
//! [`JsonApiOptions::from_json`](jsonapi_core::JsonApiOptions::from_json); absent
//! fields keep their defaults.
//!
//! ## Observability
//!
//! Service entry points open `tracing` spans carrying the resource, id and
//! relationship. Call [`setup_tracing`](jsonapi_core::tracing::setup_tracing) once
//! per process and select verbosity with `RUST_LOG`:
//!
//! ```bash
//! RUST_LOG=info cargo run      # Operations
//! RUST_LOG=debug cargo run     # Query layers, hook layers, store rows
//! ```

pub mod blog_system;

pub use blog_system::*;
