//! Exchange rate handlers

use crate::dto::{
    ApiResponse, ExchangeRateRecordResponse, ExchangeRateResponse, HistoryParams, RefreshParams,
};
use actix_web::{web, HttpResponse};
use domus_core::models::RateSource;
use domus_core::AppError;
use domus_services::ExchangeRateResolver;
use tracing::{debug, instrument, warn};
use validator::Validate;

fn parse_source(raw: &str) -> Result<RateSource, AppError> {
    RateSource::from_str(raw).ok_or_else(|| AppError::UnknownRateSource(raw.to_string()))
}

/// Rates of every source
///
/// GET /api/v1/exchange-rates
#[instrument(skip(resolver))]
pub async fn list_rates(
    resolver: web::Data<ExchangeRateResolver>,
    query: web::Query<RefreshParams>,
) -> Result<HttpResponse, AppError> {
    let rates = resolver.get_all_rates(query.force_refresh).await?;
    let response: Vec<ExchangeRateResponse> = rates.into_iter().map(Into::into).collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// GET /api/v1/exchange-rates/{source}
#[instrument(skip(resolver))]
pub async fn get_rate(
    resolver: web::Data<ExchangeRateResolver>,
    path: web::Path<String>,
    query: web::Query<RefreshParams>,
) -> Result<HttpResponse, AppError> {
    let source = parse_source(&path.into_inner())?;
    debug!(source = %source, force_refresh = query.force_refresh, "Resolving rate");

    let resolved = resolver.get_rate(source, query.force_refresh).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(ExchangeRateResponse::from(resolved))))
}

/// Persisted rates of a source, newest first
///
/// GET /api/v1/exchange-rates/{source}/history
#[instrument(skip(resolver))]
pub async fn rate_history(
    resolver: web::Data<ExchangeRateResolver>,
    path: web::Path<String>,
    query: web::Query<HistoryParams>,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("History query validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let source = parse_source(&path.into_inner())?;
    let records = resolver.history(source, query.limit).await?;
    let response: Vec<ExchangeRateRecordResponse> = records.into_iter().map(Into::into).collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// Configure exchange rate routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/exchange-rates")
            .route("", web::get().to(list_rates))
            .route("/{source}", web::get().to(get_rate))
            .route("/{source}/history", web::get().to(rate_history)),
    );
}
