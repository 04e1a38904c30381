//! Row types mirrored from the source ledgers.
//!
//! These are read-only inputs: one struct per transaction line, already
//! joined with the header fields the engine needs (company, warehouse, date,
//! status).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use insight_core::{
    CompanyId, CustomerId, ProductId, PurchaseId, SaleId, SalespersonId, SupplierId, WarehouseId,
};

/// Lifecycle status of a sale header.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    Draft,
    Confirmed,
    Paid,
    Delivered,
    Cancelled,
}

impl SaleStatus {
    /// Paid or delivered: revenue is realized.
    pub fn is_settled(&self) -> bool {
        matches!(self, SaleStatus::Paid | SaleStatus::Delivered)
    }

    /// Settled or confirmed: the goods are committed, so the line counts as demand.
    pub fn is_committed(&self) -> bool {
        self.is_settled() || matches!(self, SaleStatus::Confirmed)
    }
}

/// One line of a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    pub sale_id: SaleId,
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub salesperson_id: Option<SalespersonId>,
    pub product_id: ProductId,
    pub date: NaiveDate,
    pub status: SaleStatus,
    pub quantity: f64,
    pub unit_price: f64,
}

impl SaleLine {
    pub fn line_total(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

/// One line of a purchase order, joined with its header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub purchase_id: PurchaseId,
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    pub supplier_id: SupplierId,
    pub product_id: ProductId,
    /// Order date.
    pub date: NaiveDate,
    #[serde(default)]
    pub date_received: Option<NaiveDate>,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub rejected: bool,
    pub quantity_ordered: f64,
    pub quantity_received: f64,
    pub unit_cost: f64,
}

impl PurchaseLine {
    /// Cost of what actually arrived.
    pub fn received_cost(&self) -> f64 {
        self.quantity_received * self.unit_cost
    }

    pub fn days_to_deliver(&self) -> Option<i64> {
        self.date_received.map(|r| (r - self.date).num_days())
    }
}

/// One expense line (rent, payroll, utilities, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseLine {
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    pub date: NaiveDate,
    #[serde(default)]
    pub approved: bool,
    pub amount: f64,
}

/// A payment received against a sale (one per payment method).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalePayment {
    pub sale_id: SaleId,
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    /// Date of the sale the payment belongs to.
    pub date: NaiveDate,
    pub status: SaleStatus,
    pub amount: f64,
}

/// Stock movement type codes.
///
/// Serialized as the upstream code string; unrecognized codes map to `Other`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MovementKind {
    ReceiptIn,
    ReturnIn,
    AdjustmentIn,
    TransferIn,
    SaleOut,
    AdjustmentOut,
    TransferOut,
    Other,
}

impl From<String> for MovementKind {
    fn from(code: String) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "RECEIPT_IN" => MovementKind::ReceiptIn,
            "RETURN_IN" => MovementKind::ReturnIn,
            "ADJUSTMENT_IN" => MovementKind::AdjustmentIn,
            "TRANSFER_IN" => MovementKind::TransferIn,
            "SALE_OUT" => MovementKind::SaleOut,
            "ADJUSTMENT_OUT" => MovementKind::AdjustmentOut,
            "TRANSFER_OUT" => MovementKind::TransferOut,
            _ => MovementKind::Other,
        }
    }
}

impl From<MovementKind> for String {
    fn from(kind: MovementKind) -> Self {
        kind.code().to_string()
    }
}

impl MovementKind {
    pub fn code(&self) -> &'static str {
        match self {
            MovementKind::ReceiptIn => "RECEIPT_IN",
            MovementKind::ReturnIn => "RETURN_IN",
            MovementKind::AdjustmentIn => "ADJUSTMENT_IN",
            MovementKind::TransferIn => "TRANSFER_IN",
            MovementKind::SaleOut => "SALE_OUT",
            MovementKind::AdjustmentOut => "ADJUSTMENT_OUT",
            MovementKind::TransferOut => "TRANSFER_OUT",
            MovementKind::Other => "OTHER",
        }
    }

    /// +1 for inbound codes, -1 for outbound codes, 0 for anything else.
    pub fn sign(&self) -> f64 {
        match self {
            MovementKind::ReceiptIn
            | MovementKind::ReturnIn
            | MovementKind::AdjustmentIn
            | MovementKind::TransferIn => 1.0,
            MovementKind::SaleOut | MovementKind::AdjustmentOut | MovementKind::TransferOut => -1.0,
            MovementKind::Other => 0.0,
        }
    }
}

/// A single stock movement. Quantities are unsigned; direction comes from `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub date: NaiveDate,
    pub kind: MovementKind,
    #[serde(default)]
    pub approved: bool,
    pub quantity: f64,
}

impl StockMovement {
    pub fn signed_quantity(&self) -> f64 {
        self.kind.sign() * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committed_statuses_include_confirmed_but_settled_do_not() {
        assert!(SaleStatus::Confirmed.is_committed());
        assert!(!SaleStatus::Confirmed.is_settled());
        assert!(SaleStatus::Delivered.is_settled());
        assert!(!SaleStatus::Cancelled.is_committed());
        assert!(!SaleStatus::Draft.is_committed());
    }

    #[test]
    fn unknown_movement_codes_deserialize_as_neutral() {
        let kind: MovementKind = serde_json::from_str("\"DAMAGE_WRITE_OFF\"").unwrap();
        assert_eq!(kind, MovementKind::Other);
        assert_eq!(kind.sign(), 0.0);

        let kind: MovementKind = serde_json::from_str("\"TRANSFER_OUT\"").unwrap();
        assert_eq!(kind.sign(), -1.0);
    }
}
