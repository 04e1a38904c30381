use axum::http::StatusCode;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use insight_core::{ProductId, Scope};
use insight_infra::{
    AnomalyRequest, ForecastRequest, InventoryRequest, PeriodRequest, PipelineRun, ScopedRequest,
    SegmentationRequest,
};

use crate::app::errors;

type DtoResult<T> = Result<T, axum::response::Response>;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ForecastBody {
    pub company_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub product_id: Option<i64>,
    pub days: Option<u32>,
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct AnomalyBody {
    pub company_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    #[serde(default)]
    pub per_day: bool,
}

#[derive(Debug, Deserialize)]
pub struct InventoryBody {
    pub company_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub lead_time_days: Option<f64>,
    pub service_level_z: Option<f64>,
    pub horizon_days: Option<u32>,
    pub lookback_days: Option<u32>,
    pub as_of: Option<NaiveDate>,
}

/// Body of the warehouse-scoped pipelines that take no extra parameters
/// (pricing, profitability, cash flow).
#[derive(Debug, Deserialize)]
pub struct ScopedBody {
    pub company_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct SegmentsBody {
    pub company_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub customer_column: Option<String>,
    pub days_window: Option<u32>,
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct SupplierScoreBody {
    pub company_id: Option<i64>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct SalespersonScoreBody {
    pub company_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

// -------------------------
// Request mapping
// -------------------------

impl ForecastBody {
    pub fn into_request(self) -> DtoResult<ForecastRequest> {
        let product_id = match self.product_id {
            Some(raw) => Some(ProductId::try_new(raw).map_err(errors::scope_error)?),
            None => None,
        };
        Ok(ForecastRequest {
            scope: warehouse_scope(self.company_id, self.warehouse_id)?,
            product_id,
            horizon_days: self.days,
            as_of: as_of_or_today(self.as_of),
        })
    }
}

impl AnomalyBody {
    pub fn into_request(self) -> DtoResult<AnomalyRequest> {
        Ok(AnomalyRequest {
            scope: warehouse_scope(self.company_id, self.warehouse_id)?,
            per_day: self.per_day,
        })
    }
}

impl InventoryBody {
    pub fn into_request(self) -> DtoResult<InventoryRequest> {
        Ok(InventoryRequest {
            scope: warehouse_scope(self.company_id, self.warehouse_id)?,
            lead_time_days: self.lead_time_days,
            service_level_z: self.service_level_z,
            horizon_days: self.horizon_days,
            lookback_days: self.lookback_days,
            as_of: as_of_or_today(self.as_of),
        })
    }
}

impl ScopedBody {
    pub fn into_request(self) -> DtoResult<ScopedRequest> {
        Ok(ScopedRequest {
            scope: warehouse_scope(self.company_id, self.warehouse_id)?,
            as_of: as_of_or_today(self.as_of),
        })
    }
}

impl SegmentsBody {
    pub fn into_request(self) -> DtoResult<SegmentationRequest> {
        let scope = optional_warehouse_scope(self.company_id, self.warehouse_id)?;
        let customer_column = self
            .customer_column
            .ok_or_else(|| missing("customer_column is required"))?;
        Ok(SegmentationRequest {
            scope,
            customer_column,
            days_window: self.days_window,
            as_of: as_of_or_today(self.as_of),
        })
    }
}

impl SupplierScoreBody {
    pub fn into_request(self) -> DtoResult<PeriodRequest> {
        let scope = Scope::company(self.company_id).map_err(errors::scope_error)?;
        match (self.period_start, self.period_end) {
            (Some(period_start), Some(period_end)) => Ok(PeriodRequest {
                scope,
                period_start,
                period_end,
            }),
            _ => Err(missing("period_start and period_end are required")),
        }
    }
}

impl SalespersonScoreBody {
    pub fn into_request(self) -> DtoResult<PeriodRequest> {
        let scope = optional_warehouse_scope(self.company_id, self.warehouse_id)?;
        match (self.start_date, self.end_date) {
            (Some(period_start), Some(period_end)) => Ok(PeriodRequest {
                scope,
                period_start,
                period_end,
            }),
            _ => Err(missing("start_date and end_date are required")),
        }
    }
}

fn warehouse_scope(company: Option<i64>, warehouse: Option<i64>) -> DtoResult<Scope> {
    Scope::warehouse(company, warehouse).map_err(errors::scope_error)
}

fn optional_warehouse_scope(company: Option<i64>, warehouse: Option<i64>) -> DtoResult<Scope> {
    match warehouse {
        Some(_) => warehouse_scope(company, warehouse),
        None => Scope::company(company).map_err(errors::scope_error),
    }
}

fn as_of_or_today(as_of: Option<NaiveDate>) -> NaiveDate {
    as_of.unwrap_or_else(|| Utc::now().date_naive())
}

fn missing(message: &str) -> axum::response::Response {
    errors::json_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub status: &'static str,
    pub count: usize,
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `ok` with a message when nothing was produced, `success` otherwise.
pub fn run_summary<T>(run: &PipelineRun<T>, count: usize) -> RunSummary {
    let status = if count == 0 { "ok" } else { "success" };
    let message = match (count, run.message()) {
        (_, Some(m)) => Some(m.to_string()),
        (0, None) => Some("no records produced".to_string()),
        _ => None,
    };
    RunSummary {
        status,
        count,
        run_id: run.run_id.to_string(),
        message,
    }
}
