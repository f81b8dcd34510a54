//! Wire DTOs for gateway replies and webhook callbacks.
//!
//! # Design
//! One `MpesaResponse` absorbs every reply and callback the gateway sends;
//! which parts are populated depends on the message. The gateway is
//! inconsistent about casing and scalar types, so decoding is lenient:
//! codes arrive as numbers or numeric strings, item values as strings or
//! numbers (or not at all), and some lists collapse to a single object when
//! they hold one entry. Every field is optional so the codec's "no content"
//! placeholder decodes cleanly.

use std::borrow::Cow;

use serde::{Deserialize, Deserializer};

/// A status code as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Code {
    Number(i64),
    Text(String),
}

impl Code {
    /// Numeric reading; numeric strings are accepted.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Code::Number(n) => Some(*n),
            Code::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Textual reading; numbers are rendered in decimal.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Code::Number(n) => Cow::Owned(n.to_string()),
            Code::Text(s) => Cow::Borrowed(s),
        }
    }
}

impl From<i64> for Code {
    fn from(n: i64) -> Self {
        Code::Number(n)
    }
}

impl From<&str> for Code {
    fn from(s: &str) -> Self {
        Code::Text(s.to_string())
    }
}

/// A scalar item value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WireValue {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
    Other(serde_json::Value),
}

impl WireValue {
    /// Text form of a scalar; structured values have none.
    pub fn as_text(&self) -> Option<String> {
        match self {
            WireValue::Text(s) => Some(s.clone()),
            WireValue::Number(n) => Some(n.to_string()),
            WireValue::Flag(b) => Some(b.to_string()),
            WireValue::Other(_) => None,
        }
    }
}

/// Any reply or callback from the gateway.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MpesaResponse {
    pub access_token: Option<String>,
    pub expires_in: Option<WireValue>,

    #[serde(rename = "requestId")]
    pub request_id: Option<String>,
    #[serde(rename = "errorCode")]
    pub error_code: Option<String>,
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,

    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "RequestID")]
    pub gateway_request_id: Option<String>,
    #[serde(rename = "ResponseCode")]
    pub response_code: Option<Code>,
    #[serde(rename = "ResponseDescription")]
    pub response_description: Option<String>,
    #[serde(rename = "CustomerMessage")]
    pub customer_message: Option<String>,
    #[serde(rename = "ResultCode", alias = "resultCode")]
    pub result_code: Option<Code>,
    #[serde(rename = "ResultDesc", alias = "resultDesc")]
    pub result_desc: Option<String>,
    #[serde(rename = "OriginatorConversationID", alias = "OriginatorCoversationID")]
    pub originator_conversation_id: Option<String>,
    #[serde(rename = "ConversationID", alias = "conversationID")]
    pub conversation_id: Option<String>,

    #[serde(rename = "Body", alias = "body")]
    pub body: Option<CallbackEnvelope>,
    #[serde(rename = "Result", alias = "result")]
    pub result: Option<ResultEnvelope>,
    #[serde(rename = "ResponseBody")]
    pub response_body: Option<UssdResponseBody>,

    // C2B confirmation/validation
    #[serde(rename = "TransactionType")]
    pub transaction_type: Option<String>,
    #[serde(rename = "TransID")]
    pub trans_id: Option<String>,
    #[serde(rename = "TransTime")]
    pub trans_time: Option<String>,
    #[serde(rename = "TransAmount")]
    pub trans_amount: Option<WireValue>,
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: Option<WireValue>,
    #[serde(rename = "BillRefNumber")]
    pub bill_ref_number: Option<String>,
    #[serde(rename = "InvoiceNumber")]
    pub invoice_number: Option<String>,
    #[serde(rename = "OrgAccountBalance")]
    pub org_account_balance: Option<WireValue>,
    #[serde(rename = "ThirdPartyTransID")]
    pub third_party_trans_id: Option<String>,
    #[serde(rename = "MSISDN")]
    pub msisdn: Option<String>,
    #[serde(rename = "FirstName")]
    pub first_name: Option<String>,
    #[serde(rename = "MiddleName")]
    pub middle_name: Option<String>,
    #[serde(rename = "LastName")]
    pub last_name: Option<String>,

    #[serde(rename = "QRCode")]
    pub qr_code: Option<String>,

    // USSD push result
    pub amount: Option<WireValue>,
    #[serde(rename = "paymentReference")]
    pub payment_reference: Option<String>,
    #[serde(rename = "resultType")]
    pub result_type: Option<Code>,
    #[serde(rename = "transactionId")]
    pub transaction_id: Option<String>,
    pub status: Option<String>,

    /// Set when the body was absent and the placeholder was decoded.
    pub message: Option<String>,
}

/// `Body` of an STK push callback.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CallbackEnvelope {
    #[serde(rename = "stkCallback", alias = "callback")]
    pub stk_callback: Option<StkCallback>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResultCode", alias = "resultCode")]
    pub result_code: Option<Code>,
    #[serde(rename = "ResultDesc", alias = "resultDesc")]
    pub result_desc: Option<String>,
    #[serde(rename = "CallbackMetadata", alias = "callbackMetadata")]
    pub callback_metadata: Option<CallbackMetadata>,
    /// Items sent directly on the callback instead of under `CallbackMetadata`.
    #[serde(rename = "items", alias = "Item", deserialize_with = "one_or_many")]
    pub items: Vec<Item>,
}

impl StkCallback {
    pub fn metadata_items(&self) -> &[Item] {
        match &self.callback_metadata {
            Some(metadata) if !metadata.items.is_empty() => &metadata.items,
            _ => &self.items,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", alias = "items", deserialize_with = "one_or_many")]
    pub items: Vec<Item>,
}

/// A `Name`/`Value` pair from callback metadata.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Item {
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    #[serde(rename = "Value", alias = "value")]
    pub value: Option<WireValue>,
}

/// `Result` of an asynchronous B2B, B2C, tax or transaction-status reply.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResultEnvelope {
    #[serde(rename = "ResultType")]
    pub result_type: Option<Code>,
    #[serde(rename = "ResultCode", alias = "resultCode")]
    pub result_code: Option<Code>,
    #[serde(rename = "ResultDesc", alias = "resultDesc")]
    pub result_desc: Option<String>,
    #[serde(rename = "OriginatorConversationID")]
    pub originator_conversation_id: Option<String>,
    #[serde(rename = "ConversationID")]
    pub conversation_id: Option<String>,
    #[serde(rename = "TransactionID")]
    pub transaction_id: Option<String>,
    #[serde(rename = "ResultParameters")]
    pub result_parameters: Option<ResultParameters>,
    #[serde(rename = "ReferenceData")]
    pub reference_data: Option<ReferenceData>,
}

impl ResultEnvelope {
    pub fn parameters(&self) -> &[KeyValue] {
        self.result_parameters
            .as_ref()
            .map(|p| p.parameters.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResultParameters {
    #[serde(rename = "ResultParameter", deserialize_with = "one_or_many")]
    pub parameters: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReferenceData {
    #[serde(rename = "ReferenceItem", deserialize_with = "one_or_many")]
    pub items: Vec<KeyValue>,
}

/// A `Key`/`Value` pair; the value is absent on some reference items.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct KeyValue {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: Option<WireValue>,
}

/// `ResponseBody` of a USSD push (B2B STK) reply.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UssdResponseBody {
    pub code: Option<Code>,
    pub status: Option<String>,
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
    })
}
