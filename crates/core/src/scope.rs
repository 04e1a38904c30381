//! Request scope and entity keys.
//!
//! Every pipeline runs over exactly one company and, for most pipelines, one
//! warehouse. Scope ids arrive from callers as optional raw integers; they are
//! validated here before any computation starts.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{CompanyId, ProductId, WarehouseId};

/// Validated execution scope of a pipeline invocation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    company: CompanyId,
    warehouse: Option<WarehouseId>,
}

impl Scope {
    /// Company-wide scope (segmentation, supplier scoring).
    pub fn company(company: Option<i64>) -> DomainResult<Self> {
        Ok(Self {
            company: require("company_id", company).map(CompanyId::new)?,
            warehouse: None,
        })
    }

    /// Company + warehouse scope (forecast, inventory, pricing, ...).
    pub fn warehouse(company: Option<i64>, warehouse: Option<i64>) -> DomainResult<Self> {
        let company = require("company_id", company).map(CompanyId::new)?;
        let warehouse = require("warehouse_id", warehouse).map(WarehouseId::new)?;
        Ok(Self {
            company,
            warehouse: Some(warehouse),
        })
    }

    pub fn company_id(&self) -> CompanyId {
        self.company
    }

    pub fn warehouse_id(&self) -> Option<WarehouseId> {
        self.warehouse
    }

    /// Returns the warehouse or a `MissingScope` error for company-only scopes.
    pub fn require_warehouse(&self) -> DomainResult<WarehouseId> {
        self.warehouse
            .ok_or_else(|| DomainError::missing_scope("warehouse_id is required"))
    }

    /// Whether a row owned by `(company, warehouse)` is visible in this scope.
    pub fn contains(&self, company: CompanyId, warehouse: Option<WarehouseId>) -> bool {
        if company != self.company {
            return false;
        }
        match (self.warehouse, warehouse) {
            (None, _) => true,
            (Some(w), Some(row)) => w == row,
            (Some(_), None) => false,
        }
    }
}

fn require(name: &str, raw: Option<i64>) -> DomainResult<i64> {
    match raw {
        None => Err(DomainError::missing_scope(format!("{name} is required"))),
        Some(v) if v <= 0 => Err(DomainError::invalid_id(format!(
            "{name} must be positive, got {v}"
        ))),
        Some(v) => Ok(v),
    }
}

/// Grouping unit for forecasts and inventory decisions.
///
/// `product` is absent for warehouse-level series (profit, cash flow).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub company: CompanyId,
    pub warehouse: WarehouseId,
    pub product: Option<ProductId>,
}

impl EntityKey {
    pub fn product(company: CompanyId, warehouse: WarehouseId, product: ProductId) -> Self {
        Self {
            company,
            warehouse,
            product: Some(product),
        }
    }

    pub fn warehouse(company: CompanyId, warehouse: WarehouseId) -> Self {
        Self {
            company,
            warehouse,
            product: None,
        }
    }

    /// Stable, filesystem-safe name (used by on-disk model stores).
    pub fn storage_name(&self) -> String {
        match self.product {
            Some(p) => format!("c{}_w{}_p{}", self.company, self.warehouse, p),
            None => format!("c{}_w{}", self.company, self.warehouse),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.product {
            Some(p) => write!(f, "{}/{}/{}", self.company, self.warehouse, p),
            None => write!(f, "{}/{}", self.company, self.warehouse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warehouse_scope_requires_both_ids() {
        match Scope::warehouse(Some(1), None) {
            Err(DomainError::MissingScope(msg)) => assert!(msg.contains("warehouse_id")),
            other => panic!("expected MissingScope, got {other:?}"),
        }
        match Scope::warehouse(None, Some(5)) {
            Err(DomainError::MissingScope(msg)) => assert!(msg.contains("company_id")),
            other => panic!("expected MissingScope, got {other:?}"),
        }
        assert!(Scope::warehouse(Some(1), Some(5)).is_ok());
    }

    #[test]
    fn non_positive_scope_ids_are_invalid() {
        match Scope::company(Some(0)) {
            Err(DomainError::InvalidId(_)) => {}
            other => panic!("expected InvalidId, got {other:?}"),
        }
    }

    #[test]
    fn company_scope_contains_every_warehouse() {
        let s = Scope::company(Some(1)).unwrap();
        assert!(s.contains(CompanyId::new(1), Some(WarehouseId::new(9))));
        assert!(s.contains(CompanyId::new(1), None));
        assert!(!s.contains(CompanyId::new(2), None));

        let w = Scope::warehouse(Some(1), Some(5)).unwrap();
        assert!(w.contains(CompanyId::new(1), Some(WarehouseId::new(5))));
        assert!(!w.contains(CompanyId::new(1), Some(WarehouseId::new(6))));
    }

    #[test]
    fn storage_name_distinguishes_product_and_warehouse_keys() {
        let c = CompanyId::new(1);
        let w = WarehouseId::new(5);
        assert_eq!(EntityKey::product(c, w, ProductId::new(100)).storage_name(), "c1_w5_p100");
        assert_eq!(EntityKey::warehouse(c, w).storage_name(), "c1_w5");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

            /// Property: a raw scope id is accepted exactly when it is positive.
            #[test]
            fn scope_ids_must_be_positive(company in -5i64..5, warehouse in -5i64..5) {
                let scope = Scope::warehouse(Some(company), Some(warehouse));
                prop_assert_eq!(scope.is_ok(), company > 0 && warehouse > 0);
            }

            /// Property: a warehouse scope never sees rows of another company.
            #[test]
            fn scope_is_company_partitioned(company in 1i64..10, other in 1i64..10, warehouse in 1i64..10) {
                let scope = Scope::warehouse(Some(company), Some(warehouse)).unwrap();
                let visible = scope.contains(CompanyId::new(other), Some(WarehouseId::new(warehouse)));
                prop_assert_eq!(visible, company == other);
            }
        }
    }
}
