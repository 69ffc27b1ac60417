use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::{HeaderName, HeaderValue, StatusCode, request::Parts},
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::db;
use crate::error::{AppError, AppResult};
use crate::finance;
use crate::models::{
    AccountSummary, AllocateRequest, FinanceProfile, FortnightOverview, FortnightSpendingRecord,
    NewHolding, PaycheckAllocation, ProfileUpdate, RecordSpendingRequest, StockHolding,
};
use crate::period::FortnightCalendar;
use crate::tax::{PayEstimate, fortnightly_net_pay};

pub struct AppState {
    db: Mutex<Connection>,
    pub calendar: FortnightCalendar,
    pub user_header: HeaderName,
    pub clock: fn() -> DateTime<Utc>,
}

impl AppState {
    pub fn new(conn: Connection, calendar: FortnightCalendar, user_header: HeaderName) -> Self {
        Self {
            db: Mutex::new(conn),
            calendar,
            user_header,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    fn conn(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal("database lock poisoned".into()))
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

/// Identity of the caller, taken from the configured user header.
pub struct CurrentUser(pub String);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(&state.user_header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| CurrentUser(s.to_string()))
            .ok_or(AppError::Unauthorized)
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<FinanceProfile>> {
    let conn = state.conn()?;
    Ok(Json(db::get_or_create_profile(&conn, &user)?))
}

async fn patch_profile(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(patch): Json<Map<String, Value>>,
) -> AppResult<Json<ProfileUpdate>> {
    let conn = state.conn()?;
    Ok(Json(finance::apply_profile_patch(&conn, &user, &patch)?))
}

async fn get_fortnight(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<FortnightOverview>> {
    let conn = state.conn()?;
    let overview = finance::fortnight_overview(&conn, &state.calendar, &user, state.now())?;
    Ok(Json(overview))
}

async fn record_fortnight(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<RecordSpendingRequest>,
) -> AppResult<Json<FortnightSpendingRecord>> {
    let amount = finance::parse_amount(req.amount.as_ref())?;
    let period = finance::parse_period(req.period.as_deref())?;
    let conn = state.conn()?;
    let record = finance::record_spending(&conn, &state.calendar, &user, amount, period, state.now())?;
    Ok(Json(record))
}

async fn allocate_paycheck(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<AllocateRequest>,
) -> AppResult<Json<PaycheckAllocation>> {
    let conn = state.conn()?;
    let allocation = finance::allocate_paycheck(
        &conn,
        &state.calendar,
        &user,
        req.paycheck_amount,
        req.strict,
        state.now(),
    )?;
    Ok(Json(allocation))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayEstimateQuery {
    hours: f64,
    wage: f64,
    #[serde(default = "default_true")]
    low_income_reduction: bool,
}

fn default_true() -> bool {
    true
}

async fn pay_estimate(
    CurrentUser(_): CurrentUser,
    Query(query): Query<PayEstimateQuery>,
) -> Json<PayEstimate> {
    Json(fortnightly_net_pay(query.hours, query.wage, query.low_income_reduction))
}

async fn get_summary(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<AccountSummary>> {
    let conn = state.conn()?;
    Ok(Json(finance::account_summary(&conn, &user)?))
}

async fn list_holdings(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<StockHolding>>> {
    let conn = state.conn()?;
    Ok(Json(db::list_holdings(&conn, &user)?))
}

async fn create_holding(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(holding): Json<NewHolding>,
) -> AppResult<(StatusCode, Json<StockHolding>)> {
    let conn = state.conn()?;
    let created = finance::create_holding(&conn, &user, holding, state.now())?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_holding(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(holding): Json<NewHolding>,
) -> AppResult<Json<StockHolding>> {
    let conn = state.conn()?;
    Ok(Json(finance::update_holding(&conn, &user, id, holding)?))
}

async fn delete_holding(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let conn = state.conn()?;
    finance::delete_holding(&conn, &user, id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/finance", get(get_profile).patch(patch_profile))
        .route("/finance/fortnight", get(get_fortnight).post(record_fortnight))
        .route("/finance/allocate", post(allocate_paycheck))
        .route("/finance/pay-estimate", get(pay_estimate))
        .route("/finance/summary", get(get_summary))
        .route("/finance/holdings", get(list_holdings).post(create_holding))
        .route("/finance/holdings/:id", put(update_holding).delete(delete_holding))
}

pub fn app_router(state: Arc<AppState>, cors_allow: &[String]) -> Router {
    let origins = if cors_allow.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(cors_allow.iter().filter_map(|o| HeaderValue::from_str(o).ok()))
    };
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .merge(router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use chrono::TimeZone;
    use tower::ServiceExt;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 5, 8, 0, 0).unwrap()
    }

    fn test_app() -> Router {
        let conn = Connection::open_in_memory().unwrap();
        db::init_tables(&conn).unwrap();
        let state = AppState::new(conn, FortnightCalendar::default(), HeaderName::from_static("x-user-id"))
            .with_clock(fixed_now);
        app_router(Arc::new(state), &["*".to_string()])
    }

    fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", "alice");
        match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_health_needs_no_identity() {
        let app = test_app();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_finance_routes_require_identity() {
        let app = test_app();
        let routes = [
            (Method::GET, "/finance", None),
            (Method::PATCH, "/finance", Some(json!({ "savingsBalance": 1.0 }))),
            (Method::GET, "/finance/fortnight", None),
            (Method::POST, "/finance/fortnight", Some(json!({ "amount": 5 }))),
            (Method::POST, "/finance/allocate", Some(json!({ "paycheckAmount": 100.0 }))),
            (Method::GET, "/finance/pay-estimate?hours=10&wage=30", None),
            (Method::GET, "/finance/summary", None),
            (Method::GET, "/finance/holdings", None),
            (
                Method::POST,
                "/finance/holdings",
                Some(json!({
                    "ticker": "VAS",
                    "exchange": "ASX",
                    "shares": 1,
                    "averagePrice": 1.0,
                    "currency": "AUD"
                })),
            ),
            (
                Method::PUT,
                "/finance/holdings/1",
                Some(json!({
                    "ticker": "VAS",
                    "exchange": "ASX",
                    "shares": 1,
                    "averagePrice": 1.0,
                    "currency": "AUD"
                })),
            ),
            (Method::DELETE, "/finance/holdings/1", None),
        ];
        for (method, uri, body) in routes {
            let builder = Request::builder().method(method.clone()).uri(uri);
            let req = match body {
                Some(b) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(b.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            let (status, body) = send(&app, req).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(body["code"], 401);
        }

        let blank = Request::builder()
            .uri("/finance")
            .header("x-user-id", "   ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, blank).await.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_get_profile_creates_defaults() {
        let app = test_app();
        let (status, body) = send(&app, request(Method::GET, "/finance", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["userId"], "alice");
        assert_eq!(body["savingPercent"], 70.0);
        assert_eq!(body["savingsInterestRatePA"], 0.0);
    }

    #[tokio::test]
    async fn test_patch_profile_reports_applied_fields() {
        let app = test_app();
        let patch = json!({ "savingsBalance": 500.0, "spendingPercent": 120 });
        let (status, body) = send(&app, request(Method::PATCH, "/finance", Some(patch))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["applied"], json!(["savingsBalance"]));
        assert_eq!(body["ignored"], json!(["spendingPercent"]));
        assert_eq!(body["profile"]["savingsBalance"], 500.0);
        assert_eq!(body["profile"]["spendingPercent"], 10.0);
    }

    #[tokio::test]
    async fn test_patch_profile_nothing_to_update() {
        let app = test_app();
        let patch = json!({ "savingPercent": -1 });
        let (status, body) = send(&app, request(Method::PATCH, "/finance", Some(patch))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "nothing to update");
    }

    #[tokio::test]
    async fn test_fortnight_defaults_then_records() {
        let app = test_app();

        let (status, body) = send(&app, request(Method::GET, "/finance/fortnight", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentPeriodStart"], "2026-03-01T00:00:00Z");
        assert_eq!(body["previousPeriodStart"], "2026-02-15T00:00:00Z");
        assert_eq!(body["currentAmount"], 0.0);
        assert_eq!(body["previousAmount"], 0.0);

        let post = json!({ "amount": 80.5, "period": "previous" });
        let (status, body) = send(&app, request(Method::POST, "/finance/fortnight", Some(post))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["amountSpent"], 80.5);
        assert_eq!(body["periodStart"], "2026-02-15T00:00:00Z");

        let post = json!({ "amount": 12 });
        send(&app, request(Method::POST, "/finance/fortnight", Some(post))).await;

        let (_, body) = send(&app, request(Method::GET, "/finance/fortnight", None)).await;
        assert_eq!(body["currentAmount"], 12.0);
        assert_eq!(body["previousAmount"], 80.5);
    }

    #[tokio::test]
    async fn test_record_fortnight_rejects_bad_amounts() {
        let app = test_app();
        for body in [
            json!({}),
            json!({ "amount": -4 }),
            json!({ "amount": "ten" }),
            json!({ "amount": 5, "period": "next" }),
        ] {
            let (status, _) = send(&app, request(Method::POST, "/finance/fortnight", Some(body.clone()))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        }
    }

    #[tokio::test]
    async fn test_allocate_endpoint() {
        let app = test_app();
        let post = json!({ "amount": 50, "period": "previous" });
        send(&app, request(Method::POST, "/finance/fortnight", Some(post))).await;

        let req = json!({ "paycheckAmount": 1000.0 });
        let (status, body) = send(&app, request(Method::POST, "/finance/allocate", Some(req))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["previousPeriodSpent"], 50.0);
        assert!((body["toSaving"].as_f64().unwrap() - 750.0).abs() < 1e-9);
        assert!((body["toSpending"].as_f64().unwrap() - 50.0).abs() < 1e-9);
        assert!((body["toInvesting"].as_f64().unwrap() - 200.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_pay_estimate_endpoint() {
        let app = test_app();
        let uri = "/finance/pay-estimate?hours=20&wage=25";
        let (status, body) = send(&app, request(Method::GET, uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["gross"], 500.0);
        assert_eq!(body["tax"], 0.0);
        assert_eq!(body["net"], 500.0);
    }

    #[tokio::test]
    async fn test_holdings_lifecycle() {
        let app = test_app();
        let new = json!({
            "ticker": "vgs",
            "exchange": "ASX",
            "shares": 4,
            "averagePrice": 110.25,
            "currency": "AUD"
        });
        let (status, created) = send(&app, request(Method::POST, "/finance/holdings", Some(new))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["ticker"], "VGS");
        let id = created["id"].as_i64().unwrap();

        let changed = json!({
            "ticker": "VGS",
            "exchange": "ASX",
            "shares": 6,
            "averagePrice": 112.0,
            "currency": "AUD"
        });
        let uri = format!("/finance/holdings/{id}");
        let (status, updated) = send(&app, request(Method::PUT, &uri, Some(changed))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["shares"], 6.0);

        let (_, summary) = send(&app, request(Method::GET, "/finance/summary", None)).await;
        assert_eq!(summary["holdingsCostAud"], 672.0);

        let (status, _) = send(&app, request(Method::DELETE, &uri, None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, request(Method::DELETE, &uri, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, list) = send(&app, request(Method::GET, "/finance/holdings", None)).await;
        assert_eq!(list, json!([]));
    }

    #[tokio::test]
    async fn test_create_holding_rejects_zero_shares() {
        let app = test_app();
        let new = json!({
            "ticker": "VGS",
            "exchange": "ASX",
            "shares": 0,
            "averagePrice": 110.0,
            "currency": "USD"
        });
        let (status, _) = send(&app, request(Method::POST, "/finance/holdings", Some(new))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
