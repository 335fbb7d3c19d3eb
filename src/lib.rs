//! ine_rs
//!
//! A Rust library for retrieving, caching, analyzing, exporting and plotting
//! indicator data from Statistics Portugal (INE). Pairs with the `ine` CLI.
//!
//! ### Features
//! - Browse and search the indicator catalogue
//! - Fetch indicator metadata and dimensions; filters are validated before a request is sent
//! - Fetch data with blocking ([`Client`]) or async ([`AsyncClient`]) clients, whole or in chunks
//! - Normalize the API's varying response shapes into flat [`Record`]s
//! - On-disk response cache with separate metadata and data lifetimes
//! - Growth rates and moving averages, grouped summary statistics
//! - Save as CSV (with a metadata header) or JSON; plot to SVG/PNG
//!
//! ### Example
//! ```no_run
//! use ine_rs::{Client, ClientConfig, DimensionFilter};
//!
//! let client = Client::new(ClientConfig::default())?;
//! let filter = DimensionFilter::new().with("Dim1", "S7A2023");
//! let data = client.get_data("0004167", Some(&filter))?;
//! let growth = data.calculate_yoy_growth()?;
//! ine_rs::storage::save_csv(&growth, "population.csv", true)?;
//! ine_rs::viz::plot(&data.data, &ine_rs::viz::PlotOptions::default(), "population.svg")?;
//! for s in data.summary(None) {
//!     println!("{:?}", s);
//! }
//! # Ok::<(), ine_rs::Error>(())
//! ```

pub mod analytics;
pub mod async_client;
pub mod cache;
pub mod catalogue;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod processors;
pub mod request;
pub mod stats;
pub mod storage;
pub mod transport;
pub mod validate;
pub mod viz;

pub use async_client::AsyncClient;
pub use cache::{CacheConfig, CacheStats, DiskCache, Namespace};
pub use client::{Client, DataPages};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use models::{
    CatalogueResponse, DataResponse, Dimension, DimensionFilter, DimensionValue, Indicator,
    IndicatorMetadata, Language, Record,
};
pub use transport::{HttpResponse, ReqwestTransport, Transport};
