//! `insight-ledger`: upstream transactional rows and their aggregation.
//!
//! The engine never talks to the source ledgers directly. Callers hand over
//! row snapshots (sales lines, purchases, expenses, payments, stock movements)
//! and this crate turns them into ordered per-key time buckets.

pub mod aggregate;
pub mod rows;
pub mod snapshot;
pub mod stock;

pub use aggregate::{Aggregator, OrderTotal, order_totals};
pub use rows::{ExpenseLine, MovementKind, PurchaseLine, SaleLine, SalePayment, SaleStatus, StockMovement};
pub use snapshot::{LedgerError, LedgerSnapshot};
pub use stock::stock_balances;
