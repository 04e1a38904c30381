//! Pipeline service: ledger snapshot → aggregation → engine job → record store.
//!
//! Every pipeline runs synchronously on the caller's thread inside a
//! `pipeline` span tagged with a fresh UUIDv7 `run_id`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use insight_ai::anomaly::{AnomalyInput, AnomalyRecord, AnomalySubject, Observation, SalesAnomalyJob};
use insight_ai::finance::{
    CashflowInput, CashflowJob, CashflowRecord, ProfitabilityInput, ProfitabilityJob, ProfitabilityRecord,
};
use insight_ai::forecast::{
    DemandForecastJob, ForecastInput, ForecastModelManager, ForecastPoint, InMemoryModelStore, ModelStore,
};
use insight_ai::inventory::{InventoryDecision, InventoryInput, InventoryOptimizationJob};
use insight_ai::pricing::{PriceObservation, PricingInput, PricingJob, PricingRecommendation, ProductPricing};
use insight_ai::scoring::{
    SalespersonInput, SalespersonOrder, SalespersonScore, SalespersonScoringJob, SupplierDelivery,
    SupplierInput, SupplierScore, SupplierScoringJob,
};
use insight_ai::segmentation::{CustomerOrder, CustomerSegment, SegmentationInput, SegmentationJob, check_customer_column};
use insight_ai::{AiError, AiResult, AiScheduler, LocalAiScheduler};
use insight_core::{CompanyId, DomainError, NaturalKeyed, ProductId, Scope, TimeSeriesPoint, WarehouseId};
use insight_ledger::{Aggregator, LedgerSnapshot, SaleLine, order_totals, stock_balances};

use crate::config::EngineConfig;
use crate::ledger_source::{LedgerSource, LedgerSourceError};
use crate::model_store::FileModelStore;
use crate::records::{InMemoryRecordStore, PersistError, RecordStore, Stored};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rejected before any computation.
    #[error("invalid input: {0}")]
    Input(String),

    #[error("engine failure: {0}")]
    Engine(AiError),

    /// Results were computed but could not be stored.
    #[error("persistence failed: {0}")]
    Persist(#[from] PersistError),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl From<DomainError> for PipelineError {
    fn from(e: DomainError) -> Self {
        PipelineError::Input(e.to_string())
    }
}

impl From<AiError> for PipelineError {
    fn from(e: AiError) -> Self {
        match e {
            AiError::InvalidInput(msg) => PipelineError::Input(msg),
            other => PipelineError::Engine(other),
        }
    }
}

impl From<LedgerSourceError> for PipelineError {
    fn from(e: LedgerSourceError) -> Self {
        match e {
            LedgerSourceError::Ledger(e) => PipelineError::Input(e.to_string()),
            other => PipelineError::Unavailable(other.to_string()),
        }
    }
}

/// Outcome of one pipeline invocation.
#[derive(Debug, Clone)]
pub struct PipelineRun<T> {
    pub run_id: Uuid,
    pub result: AiResult<T>,
    /// Records written to the store (0 for an insufficient-data outcome).
    pub persisted: usize,
}

impl<T> PipelineRun<T> {
    pub fn count(&self) -> usize {
        self.result.len()
    }

    pub fn message(&self) -> Option<&str> {
        self.result.explanation.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub scope: Scope,
    /// Restrict to one SKU; all SKUs of the warehouse otherwise.
    pub product_id: Option<ProductId>,
    pub horizon_days: Option<u32>,
    pub as_of: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyRequest {
    pub scope: Scope,
    /// Score daily sales totals instead of individual sales.
    pub per_day: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InventoryRequest {
    pub scope: Scope,
    pub lead_time_days: Option<f64>,
    pub service_level_z: Option<f64>,
    pub horizon_days: Option<u32>,
    pub lookback_days: Option<u32>,
    pub as_of: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationRequest {
    pub scope: Scope,
    pub customer_column: String,
    pub days_window: Option<u32>,
    pub as_of: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodRequest {
    pub scope: Scope,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

/// Scope plus "today"; used by pricing, profitability and cash flow.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedRequest {
    pub scope: Scope,
    pub as_of: NaiveDate,
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// One record store per pipeline output.
#[derive(Clone)]
pub struct RecordStores {
    pub forecasts: Arc<dyn RecordStore<ForecastPoint>>,
    pub anomalies: Arc<dyn RecordStore<AnomalyRecord>>,
    pub inventory: Arc<dyn RecordStore<InventoryDecision>>,
    pub pricing: Arc<dyn RecordStore<PricingRecommendation>>,
    pub segments: Arc<dyn RecordStore<CustomerSegment>>,
    pub suppliers: Arc<dyn RecordStore<SupplierScore>>,
    pub salespersons: Arc<dyn RecordStore<SalespersonScore>>,
    pub profitability: Arc<dyn RecordStore<ProfitabilityRecord>>,
    pub cashflow: Arc<dyn RecordStore<CashflowRecord>>,
}

impl RecordStores {
    pub fn in_memory() -> Self {
        Self {
            forecasts: Arc::new(InMemoryRecordStore::new()),
            anomalies: Arc::new(InMemoryRecordStore::new()),
            inventory: Arc::new(InMemoryRecordStore::new()),
            pricing: Arc::new(InMemoryRecordStore::new()),
            segments: Arc::new(InMemoryRecordStore::new()),
            suppliers: Arc::new(InMemoryRecordStore::new()),
            salespersons: Arc::new(InMemoryRecordStore::new()),
            profitability: Arc::new(InMemoryRecordStore::new()),
            cashflow: Arc::new(InMemoryRecordStore::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct AnalyticsPipelines {
    config: EngineConfig,
    ledger: Arc<LedgerSource>,
    manager: Arc<ForecastModelManager>,
    stores: RecordStores,
}

impl AnalyticsPipelines {
    pub fn new(
        config: EngineConfig,
        ledger: Arc<LedgerSource>,
        manager: Arc<ForecastModelManager>,
        stores: RecordStores,
    ) -> Self {
        Self {
            config,
            ledger,
            manager,
            stores,
        }
    }

    /// Wires the model store and ledger named by the configuration, with
    /// in-memory record stores.
    pub fn from_config(config: EngineConfig) -> Result<Self, PipelineError> {
        let model_store: Arc<dyn ModelStore> = match &config.forecast.model_dir {
            Some(dir) => Arc::new(
                FileModelStore::open(dir.clone()).map_err(|e| PipelineError::Unavailable(e.to_string()))?,
            ),
            None => Arc::new(InMemoryModelStore::new()),
        };
        let ledger = match &config.ledger_path {
            Some(path) => LedgerSource::from_file(path).map_err(|e| PipelineError::Unavailable(e.to_string()))?,
            None => LedgerSource::default(),
        };
        let manager = ForecastModelManager::new(model_store, config.forecast.params());

        Ok(Self::new(
            config,
            Arc::new(ledger),
            Arc::new(manager),
            RecordStores::in_memory(),
        ))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &LedgerSource {
        &self.ledger
    }

    pub fn replace_ledger(&self, snapshot: LedgerSnapshot) -> Result<(), PipelineError> {
        self.ledger.replace(snapshot)?;
        Ok(())
    }

    fn run<T, F>(
        &self,
        name: &'static str,
        scope: &Scope,
        store: &dyn RecordStore<T>,
        job: F,
    ) -> Result<PipelineRun<T>, PipelineError>
    where
        T: NaturalKeyed + Clone,
        F: FnOnce(&LedgerSnapshot, LocalAiScheduler) -> Result<AiResult<T>, PipelineError>,
    {
        let run_id = Uuid::now_v7();
        let span = info_span!(
            "pipeline",
            name,
            run_id = %run_id,
            company = %scope.company_id(),
            warehouse = ?scope.warehouse_id(),
        );
        let _entered = span.enter();
        let started = Instant::now();

        let snapshot = self.ledger.snapshot()?;
        let result = job(&snapshot, LocalAiScheduler::for_company(scope.company_id()))?;

        let persisted = if result.is_empty() {
            0
        } else {
            store.upsert_batch(result.records.clone()).map_err(|e| {
                warn!(error = %e, records = result.len(), "pipeline results not persisted");
                PipelineError::from(e)
            })?
        };

        info!(
            records = result.len(),
            persisted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            explanation = result.explanation.as_deref().unwrap_or(""),
            "pipeline finished"
        );
        Ok(PipelineRun {
            run_id,
            result,
            persisted,
        })
    }

    // -- forecast ----------------------------------------------------------

    pub fn forecast(&self, req: ForecastRequest) -> Result<PipelineRun<ForecastPoint>, PipelineError> {
        let warehouse_id = req.scope.require_warehouse()?;
        let horizon = req.horizon_days.unwrap_or(self.config.forecast.horizon_days);
        if horizon == 0 {
            return Err(PipelineError::Input("horizon_days must be positive".to_string()));
        }

        self.run("forecast", &req.scope, self.stores.forecasts.as_ref(), |snapshot, scheduler| {
            let mut series = settled_demand(snapshot, &req.scope);
            if let Some(product) = req.product_id {
                series.retain(|p, _| *p == product);
            }

            let input = ForecastInput {
                company_id: req.scope.company_id(),
                warehouse_id,
                series,
                as_of: req.as_of,
            };
            let job = DemandForecastJob::new(input, Arc::clone(&self.manager))
                .with_horizon_days(horizon as usize)
                .with_model_version(self.config.model_version.clone());
            Ok(scheduler.run(job)?)
        })
    }

    /// Stored forecast points, date ascending.
    pub fn forecasts(
        &self,
        company_id: CompanyId,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<Stored<ForecastPoint>>, PipelineError> {
        let mut rows = self.current(self.stores.forecasts.list(company_id)?, |r| {
            r.warehouse_id == warehouse_id && r.model_version == self.config.model_version
        });
        rows.sort_by(|a, b| {
            (a.record.forecast_date, a.record.product_id).cmp(&(b.record.forecast_date, b.record.product_id))
        });
        Ok(rows)
    }

    // -- anomaly -----------------------------------------------------------

    pub fn anomalies_detect(&self, req: AnomalyRequest) -> Result<PipelineRun<AnomalyRecord>, PipelineError> {
        let warehouse_id = req.scope.require_warehouse()?;

        self.run("anomaly", &req.scope, self.stores.anomalies.as_ref(), |snapshot, scheduler| {
            let totals = order_totals(snapshot.sales_in(&req.scope).filter(|s| s.status.is_settled()));
            let observations: Vec<Observation> = if req.per_day {
                Aggregator::daily()
                    .aggregate_total(totals.iter(), |o| o.date, |o| o.amount)
                    .into_iter()
                    .map(|p| Observation {
                        subject: AnomalySubject::Day {
                            warehouse_id,
                            date: p.date,
                        },
                        amount: p.value,
                    })
                    .collect()
            } else {
                totals
                    .iter()
                    .map(|o| Observation {
                        subject: AnomalySubject::Sale { sale_id: o.sale_id },
                        amount: o.amount,
                    })
                    .collect()
            };

            let input = AnomalyInput {
                company_id: req.scope.company_id(),
                warehouse_id,
                observations,
            };
            let job = SalesAnomalyJob::new(input)
                .with_config(self.config.anomaly)
                .with_model_version(self.config.model_version.clone());
            Ok(scheduler.run(job)?)
        })
    }

    /// Stored anomalies, newest run first, then score descending.
    pub fn anomalies(
        &self,
        company_id: CompanyId,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<Stored<AnomalyRecord>>, PipelineError> {
        let mut rows = self.current(self.stores.anomalies.list(company_id)?, |r| {
            r.warehouse_id == warehouse_id && r.model_version == self.config.model_version
        });
        rows.sort_by(|a, b| {
            b.generated_at
                .cmp(&a.generated_at)
                .then(b.record.score.total_cmp(&a.record.score))
        });
        Ok(rows)
    }

    // -- inventory ---------------------------------------------------------

    pub fn inventory(&self, req: InventoryRequest) -> Result<PipelineRun<InventoryDecision>, PipelineError> {
        let warehouse_id = req.scope.require_warehouse()?;
        let mut policy = self.config.inventory;
        if let Some(v) = req.lead_time_days {
            policy.lead_time_days = v;
        }
        if let Some(v) = req.service_level_z {
            policy.service_level_z = v;
        }
        if let Some(v) = req.horizon_days {
            policy.horizon_days = v;
        }
        if let Some(v) = req.lookback_days {
            policy.lookback_days = v;
        }
        policy.validate()?;

        self.run("inventory", &req.scope, self.stores.inventory.as_ref(), |snapshot, scheduler| {
            let company_id = req.scope.company_id();
            let stock = stock_balances(snapshot.movements_in(&req.scope), company_id, warehouse_id);
            let daily_demand = Aggregator::daily().aggregate(
                snapshot.sales_in(&req.scope).filter(|s| s.status.is_committed()),
                |s| s.product_id,
                |s| s.date,
                |s| s.quantity,
            );

            let input = InventoryInput {
                company_id,
                warehouse_id,
                stock,
                daily_demand,
                forecast_series: settled_demand(snapshot, &req.scope),
                as_of: req.as_of,
            };
            let job = InventoryOptimizationJob::new(input, Arc::clone(&self.manager))
                .with_policy(policy)
                .with_model_version(self.config.model_version.clone());
            Ok(scheduler.run(job)?)
        })
    }

    /// Stored decisions that call for a reorder, largest quantity first.
    pub fn reorders(
        &self,
        company_id: CompanyId,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<Stored<InventoryDecision>>, PipelineError> {
        let mut rows = self.current(self.stores.inventory.list(company_id)?, |r| {
            r.warehouse_id == warehouse_id
                && r.model_version == self.config.model_version
                && r.suggested_reorder_qty > 0.0
        });
        rows.sort_by(|a, b| b.record.suggested_reorder_qty.total_cmp(&a.record.suggested_reorder_qty));
        Ok(rows)
    }

    /// Stored decisions, least healthy first.
    pub fn inventory_decisions(
        &self,
        company_id: CompanyId,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<Stored<InventoryDecision>>, PipelineError> {
        let mut rows = self.current(self.stores.inventory.list(company_id)?, |r| {
            r.warehouse_id == warehouse_id && r.model_version == self.config.model_version
        });
        rows.sort_by(|a, b| a.record.inventory_health_score.total_cmp(&b.record.inventory_health_score));
        Ok(rows)
    }

    // -- pricing -----------------------------------------------------------

    pub fn pricing(&self, req: ScopedRequest) -> Result<PipelineRun<PricingRecommendation>, PipelineError> {
        let warehouse_id = req.scope.require_warehouse()?;

        self.run("pricing", &req.scope, self.stores.pricing.as_ref(), |snapshot, scheduler| {
            let mut products = price_histories(
                snapshot
                    .sales_in(&req.scope)
                    .filter(|s| s.status.is_committed() && s.quantity > 0.0 && s.unit_price > 0.0),
            );

            let mut costs: BTreeMap<ProductId, (f64, usize)> = BTreeMap::new();
            for p in snapshot.purchases_in(&req.scope) {
                if products.contains_key(&p.product_id) && p.unit_cost.is_finite() {
                    let c = costs.entry(p.product_id).or_insert((0.0, 0));
                    c.0 += p.unit_cost;
                    c.1 += 1;
                }
            }
            for (product, (sum, n)) in costs {
                if let Some(p) = products.get_mut(&product) {
                    p.avg_cost = sum / n as f64;
                }
            }
            let mut settled = settled_demand(snapshot, &req.scope);
            for (product, p) in products.iter_mut() {
                p.demand = settled.remove(product).unwrap_or_default();
            }

            let input = PricingInput {
                company_id: req.scope.company_id(),
                warehouse_id,
                products,
                as_of: req.as_of,
            };
            let job = PricingJob::new(input, Arc::clone(&self.manager))
                .with_model_version(self.config.model_version.clone());
            Ok(scheduler.run(job)?)
        })
    }

    /// Stored recommendations, largest price change first.
    pub fn pricing_recommendations(
        &self,
        company_id: CompanyId,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<Stored<PricingRecommendation>>, PipelineError> {
        let mut rows = self.current(self.stores.pricing.list(company_id)?, |r| {
            r.warehouse_id == warehouse_id && r.model_version == self.config.model_version
        });
        rows.sort_by(|a, b| b.record.price_change_pct.total_cmp(&a.record.price_change_pct));
        Ok(rows)
    }

    // -- customers ---------------------------------------------------------

    pub fn segment_customers(
        &self,
        req: SegmentationRequest,
    ) -> Result<PipelineRun<CustomerSegment>, PipelineError> {
        check_customer_column(&req.customer_column)?;
        let days_window = req.days_window.unwrap_or(self.config.segmentation.days_window);
        if days_window == 0 {
            return Err(PipelineError::Input("days_window must be positive".to_string()));
        }

        self.run("segmentation", &req.scope, self.stores.segments.as_ref(), |snapshot, scheduler| {
            let orders = order_totals(snapshot.sales_in(&req.scope).filter(|s| s.status.is_settled()))
                .into_iter()
                .filter_map(|o| {
                    o.customer_id.map(|customer_id| CustomerOrder {
                        customer_id,
                        sale_id: o.sale_id,
                        date: o.date,
                        amount: o.amount,
                    })
                })
                .collect();

            let input = SegmentationInput {
                company_id: req.scope.company_id(),
                warehouse_id: req.scope.warehouse_id(),
                orders,
                as_of: req.as_of,
            };
            let job = SegmentationJob::new(input)
                .with_days_window(days_window)
                .with_model_version(self.config.model_version.clone());
            Ok(scheduler.run(job)?)
        })
    }

    /// Stored segments of every warehouse scope, highest CLV first.
    pub fn customer_segments(&self, company_id: CompanyId) -> Result<Vec<Stored<CustomerSegment>>, PipelineError> {
        let mut rows = self.current(self.stores.segments.list(company_id)?, |r| {
            r.model_version == self.config.model_version
        });
        rows.sort_by(|a, b| b.record.clv_score.total_cmp(&a.record.clv_score));
        Ok(rows)
    }

    // -- suppliers ---------------------------------------------------------

    /// Supplier scores are company-wide; a warehouse in the scope is ignored.
    pub fn score_suppliers(&self, req: PeriodRequest) -> Result<PipelineRun<SupplierScore>, PipelineError> {
        if req.period_start > req.period_end {
            return Err(PipelineError::Input("period_start must not be after period_end".to_string()));
        }
        let company_id = req.scope.company_id();

        self.run("supplier_scoring", &req.scope, self.stores.suppliers.as_ref(), |snapshot, scheduler| {
            let deliveries = snapshot
                .purchases
                .iter()
                .filter(|p| p.company_id == company_id && p.approved)
                .map(|p| SupplierDelivery {
                    supplier_id: p.supplier_id,
                    purchase_id: p.purchase_id,
                    order_date: p.date,
                    days_to_deliver: p.days_to_deliver(),
                    quantity_ordered: p.quantity_ordered,
                    quantity_received: p.quantity_received,
                    rejected: p.rejected,
                    unit_cost: p.unit_cost,
                })
                .collect();

            let input = SupplierInput {
                company_id,
                period_start: req.period_start,
                period_end: req.period_end,
                deliveries,
            };
            let job = SupplierScoringJob::new(input)
                .with_weights(self.config.scoring.supplier)
                .with_model_version(self.config.model_version.clone());
            Ok(scheduler.run(job)?)
        })
    }

    /// Stored supplier scores, best first.
    pub fn supplier_scores(&self, company_id: CompanyId) -> Result<Vec<Stored<SupplierScore>>, PipelineError> {
        let mut rows = self.current(self.stores.suppliers.list(company_id)?, |r| {
            r.model_version == self.config.model_version
        });
        rows.sort_by(|a, b| b.record.overall_score.total_cmp(&a.record.overall_score));
        Ok(rows)
    }

    // -- salespersons ------------------------------------------------------

    pub fn score_salespersons(&self, req: PeriodRequest) -> Result<PipelineRun<SalespersonScore>, PipelineError> {
        if req.period_start > req.period_end {
            return Err(PipelineError::Input("start_date must not be after end_date".to_string()));
        }

        self.run("salesperson_scoring", &req.scope, self.stores.salespersons.as_ref(), |snapshot, scheduler| {
            let orders = order_totals(snapshot.sales_in(&req.scope).filter(|s| s.status.is_settled()))
                .into_iter()
                .filter_map(|o| {
                    o.salesperson_id.map(|salesperson_id| SalespersonOrder {
                        salesperson_id,
                        sale_id: o.sale_id,
                        date: o.date,
                        amount: o.amount,
                    })
                })
                .collect();

            let input = SalespersonInput {
                company_id: req.scope.company_id(),
                warehouse_id: req.scope.warehouse_id(),
                period_start: req.period_start,
                period_end: req.period_end,
                orders,
            };
            let job = SalespersonScoringJob::new(input)
                .with_weights(self.config.scoring.salesperson)
                .with_model_version(self.config.model_version.clone());
            Ok(scheduler.run(job)?)
        })
    }

    /// Stored salesperson scores for one warehouse, best first.
    pub fn salesperson_scores(
        &self,
        company_id: CompanyId,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<Stored<SalespersonScore>>, PipelineError> {
        let mut rows = self.current(self.stores.salespersons.list(company_id)?, |r| {
            r.warehouse_id == Some(warehouse_id) && r.model_version == self.config.model_version
        });
        rows.sort_by(|a, b| b.record.score.total_cmp(&a.record.score));
        Ok(rows)
    }

    // -- finance -----------------------------------------------------------

    pub fn profitability(&self, req: ScopedRequest) -> Result<PipelineRun<ProfitabilityRecord>, PipelineError> {
        let warehouse_id = req.scope.require_warehouse()?;

        self.run("profitability", &req.scope, self.stores.profitability.as_ref(), |snapshot, scheduler| {
            let monthly = Aggregator::monthly();
            let revenue = monthly.aggregate_total(
                snapshot.sales_in(&req.scope).filter(|s| s.status.is_settled()),
                |s| s.date,
                |s| s.line_total(),
            );
            let cogs = monthly.aggregate_total(
                snapshot.purchases_in(&req.scope).filter(|p| p.approved),
                |p| p.date,
                |p| p.received_cost(),
            );
            let expenses = monthly.aggregate_total(
                snapshot.expenses_in(&req.scope).filter(|e| e.approved),
                |e| e.date,
                |e| e.amount,
            );

            let input = ProfitabilityInput {
                company_id: req.scope.company_id(),
                warehouse_id,
                revenue,
                cogs,
                expenses,
                as_of: req.as_of,
            };
            let job = ProfitabilityJob::new(input, Arc::clone(&self.manager))
                .with_model_version(self.config.model_version.clone());
            Ok(scheduler.run(job)?)
        })
    }

    /// Stored profitability months, ascending.
    pub fn profitability_records(
        &self,
        company_id: CompanyId,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<Stored<ProfitabilityRecord>>, PipelineError> {
        let mut rows = self.current(self.stores.profitability.list(company_id)?, |r| {
            r.warehouse_id == warehouse_id && r.model_version == self.config.model_version
        });
        rows.sort_by_key(|r| r.record.month);
        Ok(rows)
    }

    pub fn cashflow(&self, req: ScopedRequest) -> Result<PipelineRun<CashflowRecord>, PipelineError> {
        let warehouse_id = req.scope.require_warehouse()?;

        self.run("cashflow", &req.scope, self.stores.cashflow.as_ref(), |snapshot, scheduler| {
            let monthly = Aggregator::monthly();
            let inflows = monthly.aggregate_total(
                snapshot.payments_in(&req.scope).filter(|p| p.status.is_committed()),
                |p| p.date,
                |p| p.amount,
            );
            let purchases = monthly.aggregate_total(
                snapshot.purchases_in(&req.scope).filter(|p| p.approved),
                |p| p.date,
                |p| p.received_cost(),
            );
            let expenses = monthly.aggregate_total(
                snapshot.expenses_in(&req.scope).filter(|e| e.approved),
                |e| e.date,
                |e| e.amount,
            );

            let input = CashflowInput {
                company_id: req.scope.company_id(),
                warehouse_id,
                inflows,
                purchases,
                expenses,
                as_of: req.as_of,
            };
            let job = CashflowJob::new(input, Arc::clone(&self.manager))
                .with_model_version(self.config.model_version.clone());
            Ok(scheduler.run(job)?)
        })
    }

    /// Stored cash-flow months, ascending.
    pub fn cashflow_records(
        &self,
        company_id: CompanyId,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<Stored<CashflowRecord>>, PipelineError> {
        let mut rows = self.current(self.stores.cashflow.list(company_id)?, |r| {
            r.warehouse_id == warehouse_id && r.model_version == self.config.model_version
        });
        rows.sort_by_key(|r| r.record.month);
        Ok(rows)
    }

    fn current<T>(&self, rows: Vec<Stored<T>>, keep: impl Fn(&T) -> bool) -> Vec<Stored<T>> {
        rows.into_iter().filter(|s| keep(&s.record)).collect()
    }
}

/// One observation per product and day: quantity-weighted average price and
/// total quantity, ascending by date.
/// Daily settled quantity per product. Every demand model is fit on this
/// series, so the cached model for a product is the same whichever pipeline
/// trains it first.
fn settled_demand(snapshot: &LedgerSnapshot, scope: &Scope) -> BTreeMap<ProductId, Vec<TimeSeriesPoint>> {
    Aggregator::daily().aggregate(
        snapshot.sales_in(scope).filter(|s| s.status.is_settled()),
        |s| s.product_id,
        |s| s.date,
        |s| s.quantity,
    )
}

fn price_histories<'a>(lines: impl Iterator<Item = &'a SaleLine>) -> BTreeMap<ProductId, ProductPricing> {
    let mut daily: BTreeMap<(ProductId, NaiveDate), (f64, f64)> = BTreeMap::new();
    for l in lines {
        let d = daily.entry((l.product_id, l.date)).or_insert((0.0, 0.0));
        d.0 += l.line_total();
        d.1 += l.quantity;
    }

    let mut out: BTreeMap<ProductId, ProductPricing> = BTreeMap::new();
    for ((product, date), (revenue, quantity)) in daily {
        out.entry(product).or_default().history.push(PriceObservation {
            date,
            price: revenue / quantity,
            quantity,
        });
    }
    out
}
