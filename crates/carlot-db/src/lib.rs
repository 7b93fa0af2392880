//! # carlot-db: Database Layer for the Carlot PoS core
//!
//! Every database operation of the parts shop: the inventory ledger, shifts,
//! the sale engine and analytics. SQLite through sqlx, one transaction per
//! sale.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Carlot Data Flow                                 │
//! │                                                                         │
//! │  Collaborator (PoS screen, warehouse screen, dashboard)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     carlot-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Inventory     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ Shift         │    │ 001_initial  │  │   │
//! │  │   │ SalePolicy    │    │ Sale          │    │ _schema.sql  │  │   │
//! │  │   │               │    │ Analytics     │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           ▲                                                     │   │
//! │  │   ┌───────┴───────┐                                            │   │
//! │  │   │  config.rs    │  carlot.toml + CARLOT_* env overrides      │   │
//! │  │   └───────────────┘                                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - File and environment configuration
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types and the public error shape
//! - [`repository`] - Catalog, inventory, shift, sale and analytics
//!
//! ## Usage
//!
//! ```rust,ignore
//! use carlot_core::sale::{CartLine, SaleRequest};
//! use carlot_db::{CarlotConfig, Database};
//!
//! let config = CarlotConfig::load(None)?;
//! let db = Database::from_config(&config).await?;
//!
//! let request = SaleRequest::new("op-7", "EUR", vec![CartLine::new(&product_id, 2, 4500)]);
//! let receipt = db.sales().complete_sale(&request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{CarlotConfig, SalePolicy};
pub use error::{DbError, DbResult, ErrorKind, PublicError};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::analytics::AnalyticsRepository;
pub use repository::catalog::CatalogRepository;
pub use repository::inventory::InventoryRepository;
pub use repository::sale::SaleRepository;
pub use repository::shift::ShiftRepository;
