//! gestionale-core - Core library for the Camporosso gestionale
//!
//! This crate contains the reservation model, the ordering/filtering engine,
//! the synchronization layer with its local fallback, the table renderer, and
//! the WhatsApp notification dispatcher shared by every admin surface.

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod notify;
pub mod query;
pub mod render;
pub mod store;
pub mod sync;
pub mod util;

pub use cache::Cache;
pub use error::{Error, Result};
pub use models::{Identity, Reservation, ReservationStatus};
