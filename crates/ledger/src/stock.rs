//! Stock-on-hand from approved movements.

use std::collections::BTreeMap;

use insight_core::{CompanyId, ProductId, WarehouseId};

use crate::rows::StockMovement;

/// Current stock per product for one warehouse.
///
/// Only approved movements count; inbound codes add, outbound codes subtract,
/// unknown codes are ignored.
pub fn stock_balances<'a>(
    movements: impl IntoIterator<Item = &'a StockMovement>,
    company: CompanyId,
    warehouse: WarehouseId,
) -> BTreeMap<ProductId, f64> {
    let mut out: BTreeMap<ProductId, f64> = BTreeMap::new();
    for m in movements {
        if !m.approved || m.company_id != company || m.warehouse_id != warehouse {
            continue;
        }
        *out.entry(m.product_id).or_insert(0.0) += m.signed_quantity();
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::rows::MovementKind;

    fn mv(product: i64, kind: MovementKind, qty: f64, approved: bool) -> StockMovement {
        StockMovement {
            company_id: CompanyId::new(1),
            warehouse_id: WarehouseId::new(5),
            product_id: ProductId::new(product),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            kind,
            approved,
            quantity: qty,
        }
    }

    #[test]
    fn balances_net_inbound_against_outbound() {
        let rows = vec![
            mv(100, MovementKind::ReceiptIn, 80.0, true),
            mv(100, MovementKind::SaleOut, 25.0, true),
            mv(100, MovementKind::ReturnIn, 5.0, true),
            mv(100, MovementKind::AdjustmentOut, 10.0, true),
            mv(200, MovementKind::TransferIn, 3.0, true),
        ];
        let b = stock_balances(&rows, CompanyId::new(1), WarehouseId::new(5));
        assert_eq!(b.get(&ProductId::new(100)), Some(&50.0));
        assert_eq!(b.get(&ProductId::new(200)), Some(&3.0));
    }

    #[test]
    fn unapproved_and_foreign_movements_are_ignored() {
        let mut other_wh = mv(100, MovementKind::ReceiptIn, 99.0, true);
        other_wh.warehouse_id = WarehouseId::new(6);
        let rows = vec![
            mv(100, MovementKind::ReceiptIn, 10.0, true),
            mv(100, MovementKind::ReceiptIn, 500.0, false),
            other_wh,
        ];
        let b = stock_balances(&rows, CompanyId::new(1), WarehouseId::new(5));
        assert_eq!(b.get(&ProductId::new(100)), Some(&10.0));
    }
}
