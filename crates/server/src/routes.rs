use axum::{
    extract::{DefaultBodyLimit, Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use concilia_core::{DateRange, MatchingResult, MatchingRule, ResultSummary};
use concilia_import::{
    import, normalize_bank_batch, normalize_ledger_batch, RawBankRecord, RawLedgerRecord,
};
use concilia_storage as storage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// Either a self-contained batch or a pointer at data already in the store.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RunRequest {
    Inline {
        bank: Vec<RawBankRecord>,
        ledger: Vec<RawLedgerRecord>,
        /// Stored active rules are used when omitted.
        #[serde(default)]
        rules: Option<Vec<MatchingRule>>,
    },
    Stored {
        account_id: String,
        company_id: String,
        start: NaiveDate,
        end: NaiveDate,
        #[serde(default)]
        statuses: Vec<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct ReconciliationView {
    pub id: Uuid,
    pub summary: ResultSummary,
    pub result: MatchingResult,
}

#[derive(Debug, Serialize)]
pub struct ReviewOutcome {
    pub changed: bool,
    pub summary: ResultSummary,
}

#[derive(Debug, Serialize)]
pub struct Imported {
    pub imported: usize,
}

pub fn router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/reconciliations", post(run_reconciliation))
        .route(
            "/reconciliations/{id}",
            get(get_reconciliation).delete(close_reconciliation),
        )
        .route("/reconciliations/{id}/confirm/{key}", post(confirm))
        .route("/reconciliations/{id}/reject/{key}", post(reject))
        .route("/accounts/{account_id}/statement", post(import_statement))
        .route("/companies/{company_id}/ledger", post(import_ledger))
        .route("/rules", get(list_rules).post(save_rule))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(config.body_limit_bytes)),
        );

    if config.cors_permissive {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn run_reconciliation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunRequest>,
) -> ApiResult<(StatusCode, Json<ReconciliationView>)> {
    let (bank, ledger, rules) = match req {
        RunRequest::Inline { bank, ledger, rules } => {
            let rules = match rules {
                Some(rules) => rules,
                None => storage::list_rules(&state.db, true).await?,
            };
            (normalize_bank_batch(&bank)?, normalize_ledger_batch(&ledger)?, rules)
        }
        RunRequest::Stored {
            account_id,
            company_id,
            start,
            end,
            statuses,
        } => {
            let range = DateRange::new(start, end)?;
            tracing::debug!(%account_id, %company_id, %range, "loading stored transactions");
            (
                storage::list_bank_transactions(&state.db, &account_id, range).await?,
                storage::list_ledger_entries(&state.db, &company_id, range, &statuses).await?,
                storage::list_rules(&state.db, true).await?,
            )
        }
    };

    let result = state.engine.run(&bank, &ledger, &rules)?;
    let summary = result.summary();
    let (id, _) = state.open_session(result.clone()).await;
    tracing::info!(%id, exact = summary.exact, suggested = summary.suggested, "reconciliation opened");

    Ok((StatusCode::CREATED, Json(ReconciliationView { id, summary, result })))
}

async fn get_reconciliation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReconciliationView>> {
    let session = state.session(id).await?;
    let result = session.snapshot();
    Ok(Json(ReconciliationView {
        id,
        summary: result.summary(),
        result,
    }))
}

async fn close_reconciliation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.close_session(id).await?;
    tracing::info!(%id, "reconciliation closed");
    Ok(StatusCode::NO_CONTENT)
}

async fn confirm(
    State(state): State<Arc<AppState>>,
    Path((id, key)): Path<(Uuid, String)>,
) -> ApiResult<Json<ReviewOutcome>> {
    let (changed, summary) = state.session(id).await?.confirm(&key);
    tracing::debug!(%id, %key, changed, "confirm");
    Ok(Json(ReviewOutcome { changed, summary }))
}

async fn reject(
    State(state): State<Arc<AppState>>,
    Path((id, key)): Path<(Uuid, String)>,
) -> ApiResult<Json<ReviewOutcome>> {
    let (changed, summary) = state.session(id).await?.reject(&key);
    tracing::debug!(%id, %key, changed, "reject");
    Ok(Json(ReviewOutcome { changed, summary }))
}

/// CSV body laid out per the configured statement profile.
async fn import_statement(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
    body: String,
) -> ApiResult<Json<Imported>> {
    let txs = import::bank_statement(body.as_bytes(), &state.statement_profile)?;
    let imported = storage::insert_bank_transactions(&state.db, &account_id, &txs).await?;
    tracing::info!(%account_id, count = imported, "statement imported");
    Ok(Json(Imported { imported }))
}

async fn import_ledger(
    State(state): State<Arc<AppState>>,
    Path(company_id): Path<String>,
    Json(rows): Json<Vec<RawLedgerRecord>>,
) -> ApiResult<Json<Imported>> {
    let entries = normalize_ledger_batch(&rows)?;
    let imported = storage::insert_ledger_entries(&state.db, &company_id, &entries).await?;
    tracing::info!(%company_id, count = imported, "ledger entries imported");
    Ok(Json(Imported { imported }))
}

async fn list_rules(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<MatchingRule>>> {
    Ok(Json(storage::list_rules(&state.db, false).await?))
}

async fn save_rule(
    State(state): State<Arc<AppState>>,
    Json(rule): Json<MatchingRule>,
) -> ApiResult<(StatusCode, Json<MatchingRule>)> {
    rule.validate()?;
    storage::save_rule(&state.db, &rule).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use concilia_engine::MatchEngine;
    use concilia_import::StatementProfile;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app() -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = storage::create_db(&dir.path().join("test.db")).await.unwrap();
        let state = Arc::new(AppState::new(
            db,
            MatchEngine::default(),
            StatementProfile::default(),
        ));
        (router(state, &ServerConfig::default()), dir)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn inline_batch() -> Value {
        json!({
            "bank": [
                {"id": "b1", "date": "2024-01-15", "description": "PIX ACME", "amount": "100.00", "kind": "credit"},
                {"id": "b2", "date": "2024-01-16", "description": "ACME services", "amount": "101.00", "kind": "credit"}
            ],
            "ledger": [
                {"id": "s1", "date": "2024-01-15", "description": "Invoice 12", "amount": "100.00", "category": "revenue"},
                {"id": "s2", "date": "2024-01-17", "description": "ACME services", "amount": "102.00", "category": "revenue"}
            ],
            "rules": []
        })
    }

    #[tokio::test]
    async fn health_responds() {
        let (app, _dir) = app().await;
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn inline_run_then_review() {
        let (app, _dir) = app().await;
        let (status, body) = send(&app, "POST", "/reconciliations", Some(inline_batch())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["summary"]["exact"], 1);
        assert_eq!(body["summary"]["suggested"], 1);
        assert_eq!(body["result"]["suggested_matches"][0]["bank"]["id"], "b2");

        let id = body["id"].as_str().unwrap().to_string();
        let (status, body) = send(&app, "POST", &format!("/reconciliations/{id}/confirm/b2"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["changed"], true);
        assert_eq!(body["summary"]["exact"], 2);
        assert_eq!(body["summary"]["suggested"], 0);

        let (_, body) = send(&app, "POST", &format!("/reconciliations/{id}/reject/b2"), None).await;
        assert_eq!(body["changed"], false);

        let (status, body) = send(&app, "GET", &format!("/reconciliations/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["exact_matches"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reject_moves_pair_to_unmatched() {
        let (app, _dir) = app().await;
        let (_, body) = send(&app, "POST", "/reconciliations", Some(inline_batch())).await;
        let id = body["id"].as_str().unwrap().to_string();

        let (_, body) = send(&app, "POST", &format!("/reconciliations/{id}/reject/s2"), None).await;
        assert_eq!(body["changed"], true);
        assert_eq!(body["summary"]["unmatched_bank"], 1);
        assert_eq!(body["summary"]["unmatched_system"], 1);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (app, _dir) = app().await;
        let uri = format!("/reconciliations/{}", Uuid::new_v4());
        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn closed_session_is_gone() {
        let (app, _dir) = app().await;
        let (_, body) = send(&app, "POST", "/reconciliations", Some(inline_batch())).await;
        let uri = format!("/reconciliations/{}", body["id"].as_str().unwrap());

        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "POST", &format!("{uri}/confirm/b2"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    async fn post_csv(app: &Router, uri: &str, csv: &'static str) -> StatusCode {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "text/csv")
            .body(Body::from(csv))
            .unwrap();
        app.clone().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn successive_statements_for_one_account_are_all_kept() {
        let (app, _dir) = app().await;
        let uri = "/accounts/acc/statement";
        let january = "date,description,amount\n2024-01-05,JAN RENT,-1200.00\n";
        let february = "date,description,amount\n2024-02-05,FEB RENT,-1200.00\n";
        assert_eq!(post_csv(&app, uri, january).await, StatusCode::OK);
        assert_eq!(post_csv(&app, uri, february).await, StatusCode::OK);
        // Re-importing a statement does not duplicate its rows.
        assert_eq!(post_csv(&app, uri, january).await, StatusCode::OK);

        let run = json!({
            "account_id": "acc",
            "company_id": "co",
            "start": "2024-01-01",
            "end": "2024-02-29"
        });
        let (status, body) = send(&app, "POST", "/reconciliations", Some(run)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["summary"]["unmatched_bank"], 2);
        let descriptions: Vec<&str> = body["result"]["unmatched_bank"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["description"].as_str().unwrap())
            .collect();
        assert_eq!(descriptions, ["JAN RENT", "FEB RENT"]);
    }

    #[tokio::test]
    async fn zero_filled_debit_column_keeps_the_credit() {
        let dir = tempfile::tempdir().unwrap();
        let db = storage::create_db(&dir.path().join("test.db")).await.unwrap();
        let mut profile = StatementProfile::default();
        profile.columns.amount = None;
        profile.columns.debit = Some(2);
        profile.columns.credit = Some(3);
        let state = Arc::new(AppState::new(db, MatchEngine::default(), profile));
        let app = router(state, &ServerConfig::default());

        let csv = "date,description,debit,credit\n2024-01-15,SALARY,0.00,3000.00\n";
        assert_eq!(post_csv(&app, "/accounts/acc/statement", csv).await, StatusCode::OK);

        let run = json!({"account_id": "acc", "company_id": "co", "start": "2024-01-01", "end": "2024-01-31"});
        let (_, body) = send(&app, "POST", "/reconciliations", Some(run)).await;
        let row = &body["result"]["unmatched_bank"][0];
        assert_eq!(row["amount"], "3000.00");
        assert_eq!(row["direction"], "credit");

        let csv = "date,description,debit,credit\n2024-01-16,ODD,10.00,20.00\n";
        assert_eq!(
            post_csv(&app, "/accounts/acc/statement", csv).await,
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn malformed_rows_are_unprocessable() {
        let (app, _dir) = app().await;
        let mut batch = inline_batch();
        batch["ledger"][0]["amount"] = json!("lots");
        let (status, body) = send(&app, "POST", "/reconciliations", Some(batch)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("s1"));
    }

    #[tokio::test]
    async fn invalid_rule_is_rejected() {
        let (app, _dir) = app().await;
        let rule = json!({
            "id": "r1",
            "name": "Backwards",
            "priority": 1,
            "conditions": {"value_range": {"min": "500", "max": "100"}}
        });
        let (status, _) = send(&app, "POST", "/rules", Some(rule)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (_, body) = send(&app, "GET", "/rules", None).await;
        assert_eq!(body.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn stored_run_uses_imported_data_and_rules() {
        let (app, _dir) = app().await;

        let request = Request::builder()
            .method("POST")
            .uri("/accounts/acc-1/statement")
            .header(header::CONTENT_TYPE, "text/csv")
            .body(Body::from(
                "date,description,amount\n2024-01-15,PIX ACME,250.00\n2024-01-20,ALUGUEL,-1200.00\n",
            ))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let ledger = json!([
            {"id": "s1", "date": "2024-01-15", "description": "ACME", "amount": "250.00"},
            {"id": "s2", "date": "2024-01-18", "description": "Office rent", "amount": "-1200.00"},
            {"id": "s3", "date": "2024-01-18", "description": "Old", "amount": "5.00", "status": "settled"}
        ]);
        let (status, body) = send(&app, "POST", "/companies/co-1/ledger", Some(ledger)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["imported"], 3);

        let rule = json!({
            "id": "rent",
            "name": "Rent",
            "priority": 1,
            "conditions": {
                "value_range": {"min": "1000", "max": "1500"},
                "keywords": ["aluguel", "rent"],
                "date_tolerance_days": 3
            }
        });
        let (status, _) = send(&app, "POST", "/rules", Some(rule)).await;
        assert_eq!(status, StatusCode::CREATED);

        let run = json!({
            "account_id": "acc-1",
            "company_id": "co-1",
            "start": "2024-01-01",
            "end": "2024-01-31",
            "statuses": ["pending"]
        });
        let (status, body) = send(&app, "POST", "/reconciliations", Some(run)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["summary"]["exact"], 1);
        assert_eq!(body["summary"]["suggested"], 1);
        assert_eq!(body["summary"]["unmatched_system"], 0);
        let reasons = &body["result"]["suggested_matches"][0]["reasons"];
        assert_eq!(reasons[0], "rule: Rent");
    }

    #[tokio::test]
    async fn stored_run_rejects_inverted_period() {
        let (app, _dir) = app().await;
        let run = json!({
            "account_id": "acc-1",
            "company_id": "co-1",
            "start": "2024-02-01",
            "end": "2024-01-01"
        });
        let (status, _) = send(&app, "POST", "/reconciliations", Some(run)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
