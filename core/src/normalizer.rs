//! Canonical success/failure for gateway callbacks and result messages.
//!
//! # Design
//! Each `ResponseVariant` maps to one pure extraction function. Dispatch is
//! an exhaustive `match`, so adding a variant without an extractor does not
//! compile. Extractors only read the decoded response; running one twice on
//! the same input yields the same result.
//!
//! Two quirks of the wire protocol are kept as-is. `FlatStk` compares the
//! result code as text against `"0"` while every other variant compares it
//! numerically against `0`. Unparsable timestamps leave the field unset
//! instead of failing the result.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::error::NormalizeError;
use crate::types::{Code, MpesaResponse, WireValue};

/// Timestamp layout used by the gateway, e.g. `20191219102115`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Gateway timestamps are East Africa Time.
const GATEWAY_UTC_OFFSET_SECS: i32 = 3 * 3600;

/// Which message shape a decoded response is interpreted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseVariant {
    /// STK push callback, `Body.stkCallback`.
    Callback,
    /// B2B payment result, `Result`.
    Payment,
    /// B2C disbursement result, `Result`.
    Disbursement,
    /// Tax remittance result, `Result`.
    TaxRemittance,
    /// USSD push (B2B STK) result with top-level fields.
    FlatStk,
    /// Transaction status query result, `Result.ResultParameters`.
    TransactionStatus,
}

type Extractor = fn(&MpesaResponse) -> Result<NormalizedResult, NormalizeError>;

impl ResponseVariant {
    pub const ALL: [ResponseVariant; 6] = [
        ResponseVariant::Callback,
        ResponseVariant::Payment,
        ResponseVariant::Disbursement,
        ResponseVariant::TaxRemittance,
        ResponseVariant::FlatStk,
        ResponseVariant::TransactionStatus,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ResponseVariant::Callback => "callback",
            ResponseVariant::Payment => "payment",
            ResponseVariant::Disbursement => "disbursement",
            ResponseVariant::TaxRemittance => "tax_remittance",
            ResponseVariant::FlatStk => "flat_stk",
            ResponseVariant::TransactionStatus => "transaction_status",
        }
    }

    fn extractor(self) -> Extractor {
        match self {
            ResponseVariant::Callback => extract_callback,
            ResponseVariant::Payment | ResponseVariant::Disbursement | ResponseVariant::TaxRemittance => {
                extract_result_status
            }
            ResponseVariant::FlatStk => extract_flat_stk,
            ResponseVariant::TransactionStatus => extract_transaction_status,
        }
    }
}

impl fmt::Display for ResponseVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResponseVariant {
    type Err = NormalizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResponseVariant::ALL
            .into_iter()
            .find(|variant| variant.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| NormalizeError::UnknownVariant(s.to_string()))
    }
}

/// Canonical outcome derived from a gateway message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedResult {
    pub internal_status: bool,
    pub amount: Option<Decimal>,
    /// Gateway receipt / transaction reference.
    pub reference_code: Option<String>,
    pub phone_number: Option<String>,
    pub display_name: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl NormalizedResult {
    /// A result with the given status and the response's top-level error
    /// fields carried over.
    pub(crate) fn with_status(internal_status: bool, response: &MpesaResponse) -> Self {
        Self {
            internal_status,
            error_code: response.error_code.clone(),
            error_message: response.error_message.clone(),
            ..Self::default()
        }
    }
}

/// Interpret `response` as `variant`.
pub fn normalize(response: &MpesaResponse, variant: ResponseVariant) -> Result<NormalizedResult, NormalizeError> {
    (variant.extractor())(response)
}

impl MpesaResponse {
    pub fn normalize(&self, variant: ResponseVariant) -> Result<NormalizedResult, NormalizeError> {
        normalize(self, variant)
    }
}

fn numeric_zero(code: Option<&Code>) -> bool {
    code.and_then(Code::as_number) == Some(0)
}

fn extract_callback(response: &MpesaResponse) -> Result<NormalizedResult, NormalizeError> {
    let Some(callback) = response.body.as_ref().and_then(|b| b.stk_callback.as_ref()) else {
        return Ok(NormalizedResult::with_status(false, response));
    };

    let mut result = NormalizedResult::with_status(numeric_zero(callback.result_code.as_ref()), response);
    for item in callback.metadata_items() {
        let Some(value) = item.value.as_ref().and_then(WireValue::as_text) else {
            continue;
        };
        match item.name.as_str() {
            "Amount" => result.amount = Some(parse_amount(&item.name, &value)?),
            "MpesaReceiptNumber" | "ReceiptNumber" => result.reference_code = Some(value),
            "PhoneNumber" => result.phone_number = Some(value),
            "TransactionDate" => result.timestamp = parse_timestamp(&value),
            _ => {}
        }
    }
    Ok(result)
}

fn extract_result_status(response: &MpesaResponse) -> Result<NormalizedResult, NormalizeError> {
    let status = numeric_zero(response.result.as_ref().and_then(|r| r.result_code.as_ref()));
    Ok(NormalizedResult::with_status(status, response))
}

fn extract_flat_stk(response: &MpesaResponse) -> Result<NormalizedResult, NormalizeError> {
    let status = response
        .result_code
        .as_ref()
        .is_some_and(|code| code.as_text() == "0");

    let mut result = NormalizedResult::with_status(status, response);
    // A blank or non-numeric top-level amount reads as absent.
    result.amount = response
        .amount
        .as_ref()
        .and_then(WireValue::as_text)
        .and_then(|amount| match parse_amount("amount", &amount) {
            Ok(amount) => Some(amount),
            Err(e) => {
                log::debug!("ignoring {e}");
                None
            }
        });
    result.reference_code = response.transaction_id.clone();
    Ok(result)
}

fn extract_transaction_status(response: &MpesaResponse) -> Result<NormalizedResult, NormalizeError> {
    let Some(envelope) = response.result.as_ref() else {
        return Ok(NormalizedResult::with_status(false, response));
    };

    let mut result = NormalizedResult::with_status(numeric_zero(envelope.result_code.as_ref()), response);
    for parameter in envelope.parameters() {
        let Some(value) = parameter.value.as_ref().and_then(WireValue::as_text) else {
            continue;
        };
        match parameter.key.as_str() {
            "Amount" => result.amount = Some(parse_amount(&parameter.key, &value)?),
            "ReceiptNo" => result.reference_code = Some(value),
            "DebitPartyName" => {
                let (phone, name) = split_debit_party(&value);
                if phone.is_some() {
                    result.phone_number = phone;
                }
                if name.is_some() {
                    result.display_name = name;
                }
            }
            "FinalisedTime" => result.timestamp = parse_timestamp(&value),
            _ => {}
        }
    }
    Ok(result)
}

/// Split `"<phone> - <name>"` on `-`, trimming segments and dropping blank
/// ones. Names that themselves contain `-` are cut at the first one.
pub fn split_debit_party(value: &str) -> (Option<String>, Option<String>) {
    let mut segments = value.split('-').map(str::trim).filter(|s| !s.is_empty());
    let phone = segments.next().map(str::to_string);
    let name = segments.next().map(str::to_string);
    (phone, name)
}

fn parse_amount(field: &str, value: &str) -> Result<Decimal, NormalizeError> {
    Decimal::from_str(value.trim()).map_err(|_| NormalizeError::InvalidAmount {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Parse a gateway timestamp; `None` when it does not match the layout.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let naive = match NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT) {
        Ok(naive) => naive,
        Err(e) => {
            log::debug!("ignoring unparsable timestamp '{value}': {e}");
            return None;
        }
    };
    FixedOffset::east_opt(GATEWAY_UTC_OFFSET_SECS)
        .and_then(|offset| offset.from_local_datetime(&naive).single())
        .map(|local| local.with_timezone(&Utc))
}

/// Render an instant in the gateway's timestamp layout.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(GATEWAY_UTC_OFFSET_SECS) {
        Some(offset) => instant.with_timezone(&offset).format(TIMESTAMP_FORMAT).to_string(),
        None => instant.format(TIMESTAMP_FORMAT).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> MpesaResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn callback_success_extracts_items() {
        let response = decode(
            r#"{"Body":{"stkCallback":{"MerchantRequestID":"29115-34620561-1","CheckoutRequestID":"ws_CO_191220191020363925","ResultCode":0,"ResultDesc":"The service request is processed successfully.","CallbackMetadata":{"Item":[{"Name":"Amount","Value":1},{"Name":"MpesaReceiptNumber","Value":"NLJ7RT61SV"},{"Name":"TransactionDate","Value":20191219102115},{"Name":"PhoneNumber","Value":254708374149}]}}}}"#,
        );
        let result = response.normalize(ResponseVariant::Callback).unwrap();
        assert!(result.internal_status);
        assert_eq!(result.amount, Some(Decimal::from(1)));
        assert_eq!(result.reference_code.as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(result.phone_number.as_deref(), Some("254708374149"));
        assert_eq!(
            result.timestamp.map(|t| t.to_rfc3339()),
            Some("2019-12-19T07:21:15+00:00".to_string())
        );
    }

    #[test]
    fn callback_failure_without_items() {
        let response = decode(
            r#"{"Body":{"stkCallback":{"MerchantRequestID":"6e86-45dd-91ac-fd5d4178ab52485825","CheckoutRequestID":"ws_CO_20022024202003133719726698","ResultCode":1037,"ResultDesc":"DS timeout user cannot be reached"}}}"#,
        );
        let result = normalize(&response, ResponseVariant::Callback).unwrap();
        assert_eq!(result, NormalizedResult::default());
    }

    #[test]
    fn callback_with_bad_timestamp_keeps_other_fields() {
        let response = decode(
            r#"{"body":{"callback":{"resultCode":0,"items":[{"name":"TransactionDate","value":"yesterday"},{"name":"ReceiptNumber","value":"R1"},{"name":"Unknown","value":"x"}]}}}"#,
        );
        let result = normalize(&response, ResponseVariant::Callback).unwrap();
        assert!(result.internal_status);
        assert!(result.timestamp.is_none());
        assert_eq!(result.reference_code.as_deref(), Some("R1"));
    }

    #[test]
    fn callback_with_non_numeric_amount_fails() {
        let response = decode(r#"{"body":{"callback":{"resultCode":0,"items":[{"name":"Amount","value":"ten"}]}}}"#);
        let err = normalize(&response, ResponseVariant::Callback).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::InvalidAmount {
                field: "Amount".to_string(),
                value: "ten".to_string()
            }
        );
    }

    #[test]
    fn missing_nested_structure_is_failure() {
        let empty = decode(r#"{"message":"no content"}"#);
        for variant in ResponseVariant::ALL {
            let result = normalize(&empty, variant).unwrap();
            assert!(!result.internal_status, "{variant}");
        }
    }

    #[test]
    fn result_variants_compare_numerically() {
        let quoted = decode(r#"{"Result":{"ResultType":"0","ResultCode":"0","ResultDesc":"ok"}}"#);
        let failed = decode(r#"{"Result":{"ResultType":0,"ResultCode":17,"ResultDesc":"System internal error."}}"#);
        for variant in [
            ResponseVariant::Payment,
            ResponseVariant::Disbursement,
            ResponseVariant::TaxRemittance,
        ] {
            assert!(normalize(&quoted, variant).unwrap().internal_status);
            assert!(!normalize(&failed, variant).unwrap().internal_status);
        }
    }

    #[test]
    fn flat_stk_blank_amount_keeps_status() {
        for amount in [r#""""#, r#""n/a""#] {
            let response = decode(&format!(
                r#"{{"resultCode":"0","amount":{amount},"transactionId":"RDQ01NFT1Q"}}"#
            ));
            let result = normalize(&response, ResponseVariant::FlatStk).unwrap();
            assert!(result.internal_status);
            assert!(result.amount.is_none());
            assert_eq!(result.reference_code.as_deref(), Some("RDQ01NFT1Q"));
        }
    }

    #[test]
    fn flat_stk_compares_text() {
        assert!(decode(r#"{"resultCode":"0"}"#)
            .normalize(ResponseVariant::FlatStk)
            .unwrap()
            .internal_status);
        assert!(decode(r#"{"resultCode":0}"#)
            .normalize(ResponseVariant::FlatStk)
            .unwrap()
            .internal_status);
        // Numerically zero but not the text "0".
        assert!(!decode(r#"{"resultCode":"00"}"#)
            .normalize(ResponseVariant::FlatStk)
            .unwrap()
            .internal_status);
    }

    #[test]
    fn flat_stk_reads_top_level_fields() {
        let response = decode(
            r#"{"resultCode":"0","resultDesc":"The service request is processed successfully.","amount":"71.0","requestId":"404e1aec-19e0-4ce3-973d-bd92e94c8021","resultType":"0","conversationID":"AG_20230426_2010434680d9f5a73766","transactionId":"RDQ01NFT1Q","status":"SUCCESS"}"#,
        );
        let result = normalize(&response, ResponseVariant::FlatStk).unwrap();
        assert!(result.internal_status);
        assert_eq!(result.amount, Some(Decimal::new(710, 1)));
        assert_eq!(result.reference_code.as_deref(), Some("RDQ01NFT1Q"));
    }

    #[test]
    fn transaction_status_extracts_parameters() {
        let response = decode(
            r#"{"Result":{"ResultType":0,"ResultCode":0,"ResultParameters":{"ResultParameter":[{"Key":"ReceiptNo","Value":"NLJ41HAY6Q"},{"Key":"Amount","Value":"190.00"},{"Key":"DebitPartyName","Value":"254708374149 - John Doe -"},{"Key":"FinalisedTime","Value":"20221110110717"},{"Key":"DebitPartyCharges","Value":""}]}}}"#,
        );
        let result = normalize(&response, ResponseVariant::TransactionStatus).unwrap();
        assert!(result.internal_status);
        assert_eq!(result.amount, Some(Decimal::new(19000, 2)));
        assert_eq!(result.reference_code.as_deref(), Some("NLJ41HAY6Q"));
        assert_eq!(result.phone_number.as_deref(), Some("254708374149"));
        assert_eq!(result.display_name.as_deref(), Some("John Doe"));
        assert_eq!(result.timestamp.map(format_timestamp).as_deref(), Some("20221110110717"));
    }

    #[test]
    fn debit_party_split_drops_blank_segments() {
        assert_eq!(
            split_debit_party("254708374149 - John Doe -"),
            (Some("254708374149".to_string()), Some("John Doe".to_string()))
        );
        assert_eq!(split_debit_party(" - "), (None, None));
        assert_eq!(split_debit_party("254708374149"), (Some("254708374149".to_string()), None));
        // Hyphenated names lose everything after the hyphen.
        assert_eq!(
            split_debit_party("254700000000 - Mary-Jane Doe"),
            (Some("254700000000".to_string()), Some("Mary".to_string()))
        );
    }

    #[test]
    fn normalizing_twice_is_stable() {
        let response = decode(
            r#"{"Result":{"ResultCode":0,"ResultParameters":{"ResultParameter":{"Key":"DebitPartyName","Value":"254708374149 - John Doe"}}}}"#,
        );
        let first = normalize(&response, ResponseVariant::TransactionStatus).unwrap();
        let second = normalize(&response, ResponseVariant::TransactionStatus).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.display_name.as_deref(), Some("John Doe"));
    }

    #[test]
    fn error_fields_are_carried_over() {
        let response = decode(
            r#"{"requestId":"r1","errorCode":"404.001.03","errorMessage":"Invalid Access Token"}"#,
        );
        let result = normalize(&response, ResponseVariant::Payment).unwrap();
        assert!(!result.internal_status);
        assert_eq!(result.error_code.as_deref(), Some("404.001.03"));
        assert_eq!(result.error_message.as_deref(), Some("Invalid Access Token"));
    }

    #[test]
    fn variant_labels_round_trip() {
        for variant in ResponseVariant::ALL {
            assert_eq!(variant.label().parse::<ResponseVariant>().unwrap(), variant);
        }
        assert!(matches!(
            "b2x".parse::<ResponseVariant>(),
            Err(NormalizeError::UnknownVariant(_))
        ));
    }
}
