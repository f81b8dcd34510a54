use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Webhook kinds the stub accepts under `/callbacks/{variant}`.
pub const CALLBACK_VARIANTS: &[&str] = &[
    "callback",
    "payment",
    "disbursement",
    "tax_remittance",
    "flat_stk",
    "transaction_status",
];

pub const MALFORMED_BODY: &str = r#"{"ResponseCode": "0", "#;

/// JSON-shaped body carrying bytes that are not valid UTF-8.
pub const INVALID_UTF8_BODY: &[u8] = b"{\"errorMessage\":\"\xff\xfe\"}";

/// An STK push the stub has accepted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "Amount")]
    pub amount: Option<Value>,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: Option<Value>,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
}

#[derive(Deserialize)]
pub struct StkPushRequest {
    #[serde(rename = "Amount")]
    pub amount: Option<Value>,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_in: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Acknowledgement {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: String,
    #[serde(rename = "CustomerMessage")]
    pub customer_message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GatewayError {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(rename = "errorCode")]
    pub error_code: String,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookReply {
    #[serde(rename = "ResultCode")]
    pub result_code: String,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EchoedHeader {
    pub name: String,
    pub value: String,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Transaction>>>;

type Rejection = (StatusCode, Json<GatewayError>);

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/oauth/v1/generate", get(generate_token))
        .route("/mpesa/stkpush/v1/processrequest", post(stk_push))
        .route("/transactions", get(list_transactions))
        .route("/empty", get(no_content).post(no_content))
        .route("/malformed", get(malformed))
        .route("/invalid-utf8", get(invalid_utf8))
        .route("/headers", get(echo_headers))
        .route("/echo", post(echo_body))
        .route("/callbacks/{variant}", post(receive_callback))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn authorization<'a>(headers: &'a HeaderMap, scheme: &str) -> Option<&'a str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(scheme)
        .map(str::trim)
        .filter(|credentials| !credentials.is_empty())
}

fn unauthorized(code: &str, message: &str) -> Rejection {
    warn!("rejecting request: {message}");
    (
        StatusCode::UNAUTHORIZED,
        Json(GatewayError {
            request_id: Uuid::new_v4().to_string(),
            error_code: code.to_string(),
            error_message: message.to_string(),
        }),
    )
}

async fn generate_token(headers: HeaderMap) -> Result<Json<AccessToken>, Rejection> {
    authorization(&headers, "Basic ")
        .ok_or_else(|| unauthorized("400.008.01", "Invalid Authentication passed"))?;
    info!("issuing access token");
    Ok(Json(AccessToken {
        access_token: Uuid::new_v4().simple().to_string(),
        expires_in: "3599".to_string(),
    }))
}

async fn stk_push(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<StkPushRequest>,
) -> Result<Json<Acknowledgement>, Rejection> {
    authorization(&headers, "Bearer ")
        .ok_or_else(|| unauthorized("404.001.03", "Invalid Access Token"))?;

    let id = Uuid::new_v4();
    let transaction = Transaction {
        merchant_request_id: format!("{}-1", id.as_fields().0),
        checkout_request_id: format!("ws_CO_{}", id.simple()),
        amount: input.amount,
        phone_number: input.phone_number,
        result_code: 0,
    };
    info!("accepted STK push {}", transaction.checkout_request_id);

    let ack = Acknowledgement {
        merchant_request_id: transaction.merchant_request_id.clone(),
        checkout_request_id: transaction.checkout_request_id.clone(),
        response_code: "0".to_string(),
        response_description: "Success. Request accepted for processing".to_string(),
        customer_message: "Success. Request accepted for processing".to_string(),
    };
    db.write().await.insert(id, transaction);
    Ok(Json(ack))
}

async fn list_transactions(State(db): State<Db>) -> Json<Vec<Transaction>> {
    let transactions = db.read().await;
    Json(transactions.values().cloned().collect())
}

async fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn malformed() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], MALFORMED_BODY)
}

async fn invalid_utf8() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], INVALID_UTF8_BODY)
}

async fn echo_headers(headers: HeaderMap) -> Json<Vec<EchoedHeader>> {
    let echoed = headers
        .iter()
        .map(|(name, value)| EchoedHeader {
            name: name.as_str().to_string(),
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        })
        .collect();
    Json(echoed)
}

async fn echo_body(body: String) -> impl IntoResponse {
    debug!("echoing {} bytes", body.len());
    ([(header::CONTENT_TYPE, "application/json")], body)
}

async fn receive_callback(
    Path(variant): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<WebhookReply>, StatusCode> {
    if !CALLBACK_VARIANTS.contains(&variant.as_str()) {
        warn!("unknown callback variant '{variant}'");
        return Err(StatusCode::NOT_FOUND);
    }
    debug!("{variant} callback: {body}");
    Ok(Json(WebhookReply {
        result_code: "0".to_string(),
        result_desc: "Success".to_string(),
    }))
}
