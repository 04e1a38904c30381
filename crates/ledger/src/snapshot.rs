//! In-memory snapshot of the source ledgers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use insight_core::Scope;

use crate::rows::{ExpenseLine, PurchaseLine, SaleLine, SalePayment, StockMovement};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to parse ledger snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid ledger row: {0}")]
    InvalidRow(String),
}

/// Every row the engine reads, for any number of companies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub sales: Vec<SaleLine>,
    #[serde(default)]
    pub purchases: Vec<PurchaseLine>,
    #[serde(default)]
    pub expenses: Vec<ExpenseLine>,
    #[serde(default)]
    pub payments: Vec<SalePayment>,
    #[serde(default)]
    pub movements: Vec<StockMovement>,
}

impl LedgerSnapshot {
    /// Parse and validate a JSON snapshot.
    pub fn from_json(raw: &str) -> Result<Self, LedgerError> {
        let snapshot: LedgerSnapshot = serde_json::from_str(raw)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Rejects non-finite or negative quantities and amounts.
    pub fn validate(&self) -> Result<(), LedgerError> {
        for s in &self.sales {
            check("sale quantity", s.quantity)?;
            check("sale unit_price", s.unit_price)?;
        }
        for p in &self.purchases {
            check("purchase quantity_ordered", p.quantity_ordered)?;
            check("purchase quantity_received", p.quantity_received)?;
            check("purchase unit_cost", p.unit_cost)?;
        }
        for e in &self.expenses {
            check("expense amount", e.amount)?;
        }
        for p in &self.payments {
            check("payment amount", p.amount)?;
        }
        for m in &self.movements {
            check("movement quantity", m.quantity)?;
        }
        Ok(())
    }

    pub fn sales_in<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a SaleLine> + 'a {
        self.sales
            .iter()
            .filter(move |s| scope.contains(s.company_id, Some(s.warehouse_id)))
    }

    pub fn purchases_in<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a PurchaseLine> + 'a {
        self.purchases
            .iter()
            .filter(move |p| scope.contains(p.company_id, Some(p.warehouse_id)))
    }

    pub fn expenses_in<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a ExpenseLine> + 'a {
        self.expenses
            .iter()
            .filter(move |e| scope.contains(e.company_id, Some(e.warehouse_id)))
    }

    pub fn payments_in<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a SalePayment> + 'a {
        self.payments
            .iter()
            .filter(move |p| scope.contains(p.company_id, Some(p.warehouse_id)))
    }

    pub fn movements_in<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a StockMovement> + 'a {
        self.movements
            .iter()
            .filter(move |m| scope.contains(m.company_id, Some(m.warehouse_id)))
    }
}

fn check(field: &str, value: f64) -> Result<(), LedgerError> {
    if !value.is_finite() || value < 0.0 {
        return Err(LedgerError::InvalidRow(format!(
            "{field} must be a finite non-negative number, got {value}"
        )));
    }
    Ok(())
}
