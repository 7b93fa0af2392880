//! # Repository Module
//!
//! Database repositories for the Carlot PoS core.
//!
//! ## Who Writes What
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CatalogRepository     read-only lookups (inserts for seed/tests)      │
//! │  InventoryRepository   receive lots, stock levels, standalone deduct   │
//! │  ShiftRepository       open / close / get_or_create, summaries         │
//! │  SaleRepository        complete_sale, cancel_receipt  ◄── the only     │
//! │                        code that moves stock during trading            │
//! │  AnalyticsRepository   read-only rollups                               │
//! │                                                                         │
//! │  Transactional pieces (FIFO deduct, lot restore, shift resolve) are    │
//! │  free functions over `&mut SqliteConnection`, so the sale engine can   │
//! │  run them inside its own transaction.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`] - Categories, subcategories, products
//! - [`InventoryRepository`] - Inventory ledger
//! - [`ShiftRepository`] - Shift manager
//! - [`SaleRepository`] - Sale engine
//! - [`AnalyticsRepository`] - Analytics aggregator

pub mod analytics;
pub mod catalog;
pub mod inventory;
pub mod sale;
pub mod shift;

pub use analytics::AnalyticsRepository;
pub use catalog::CatalogRepository;
pub use inventory::InventoryRepository;
pub use sale::SaleRepository;
pub use shift::ShiftRepository;
