//! Synchronous gateway replies and the replies integrators send back.
//!
//! Direct API replies (token issue, request acknowledgements, STK query and
//! USSD push) carry their status at the top level rather than inside a
//! callback envelope. `evaluate` reduces them to the same
//! [`NormalizedResult`] the callback normalizer produces.
//!
//! `ValidationReply` is the body an integrator answers C2B validation and
//! confirmation webhooks with.

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::ClientError;
use crate::normalizer::NormalizedResult;
use crate::types::{Code, MpesaResponse};

/// Which direct reply a decoded response is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    /// OAuth token issue.
    AccessToken,
    /// `ResponseCode` acknowledgement: STK send, URL registration,
    /// transaction-status request, B2B/B2C/tax submission, QR generation.
    Acknowledgement,
    /// STK push query.
    StkQuery,
    /// USSD push (B2B STK) submission.
    UssdPush,
}

pub fn evaluate(response: &MpesaResponse, kind: ReplyKind) -> NormalizedResult {
    let acknowledged = response.response_code.as_ref().and_then(Code::as_number) == Some(0);
    match kind {
        ReplyKind::AccessToken => NormalizedResult::with_status(response.access_token.is_some(), response),
        ReplyKind::Acknowledgement => NormalizedResult::with_status(acknowledged, response),
        ReplyKind::StkQuery => {
            let completed = response.result_code.as_ref().is_some_and(|c| c.as_text() == "0");
            NormalizedResult::with_status(acknowledged && completed, response)
        }
        ReplyKind::UssdPush => {
            let body = response.response_body.as_ref();
            let code = body.and_then(|b| b.code.as_ref());
            let status = code.and_then(Code::as_number) == Some(0);
            let mut result = NormalizedResult::with_status(status, response);
            if !status {
                if let Some(code) = code {
                    result.error_code = Some(code.as_text().into_owned());
                }
                if let Some(message) = body.and_then(|b| b.status.clone()) {
                    result.error_message = Some(message);
                }
            }
            result
        }
    }
}

impl MpesaResponse {
    pub fn evaluate(&self, kind: ReplyKind) -> NormalizedResult {
        evaluate(self, kind)
    }
}

/// `ResultCode` values for validation replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseStatus {
    Success,
    InvalidMsisdn,
    InvalidAccountNumber,
    InvalidAmount,
    InvalidKycDetails,
    InvalidShortcode,
    OtherError,
}

impl ResponseStatus {
    pub fn value(&self) -> &'static str {
        match self {
            ResponseStatus::Success => "0",
            ResponseStatus::InvalidMsisdn => "Invalid MSISDN",
            ResponseStatus::InvalidAccountNumber => "Invalid Account Number",
            ResponseStatus::InvalidAmount => "Invalid Amount",
            ResponseStatus::InvalidKycDetails => "Invalid KYC Details",
            ResponseStatus::InvalidShortcode => "Invalid Shortcode",
            ResponseStatus::OtherError => "Other Error",
        }
    }
}

/// `ResultDesc` values for validation replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultDesc {
    Success,
    Accepted,
    Rejected,
}

impl ResultDesc {
    pub fn value(&self) -> &'static str {
        match self {
            ResultDesc::Success => "Success",
            ResultDesc::Accepted => "Accepted",
            ResultDesc::Rejected => "Rejected",
        }
    }
}

/// Reply body for C2B validation and confirmation webhooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReply {
    #[serde(rename = "ResultCode")]
    pub result_code: String,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    #[serde(rename = "ThirdPartyTransID", default, skip_serializing_if = "Option::is_none")]
    pub third_party_trans_id: Option<String>,
}

impl ValidationReply {
    /// An empty `third_party_trans_id` is omitted.
    pub fn new(status: ResponseStatus, desc: ResultDesc, third_party_trans_id: Option<&str>) -> Self {
        Self {
            result_code: status.value().to_string(),
            result_desc: desc.value().to_string(),
            third_party_trans_id: third_party_trans_id
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        }
    }

    pub fn accept() -> Self {
        Self::new(ResponseStatus::Success, ResultDesc::Accepted, None)
    }

    pub fn reject(status: ResponseStatus) -> Self {
        Self::new(status, ResultDesc::Rejected, None)
    }

    /// Reply to a confirmation webhook.
    pub fn acknowledgement() -> Self {
        Self::new(ResponseStatus::Success, ResultDesc::Success, None)
    }

    pub fn to_json(&self) -> Result<String, ClientError> {
        codec::encode(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> MpesaResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn access_token_presence() {
        let issued = decode(r#"{"access_token":"c9SQxWWhmdVRlyh0zh8gZDTkubVF","expires_in":"3599"}"#);
        assert!(evaluate(&issued, ReplyKind::AccessToken).internal_status);

        let denied = decode(r#"{"requestId":"r","errorCode":"400.008.01","errorMessage":"Invalid Authentication passed"}"#);
        let result = evaluate(&denied, ReplyKind::AccessToken);
        assert!(!result.internal_status);
        assert_eq!(result.error_code.as_deref(), Some("400.008.01"));
    }

    #[test]
    fn acknowledgement_accepts_quoted_zero() {
        let ack = decode(
            r#"{"MerchantRequestID":"29115-34620561-1","CheckoutRequestID":"ws_CO_191220191020363925","ResponseCode":"0","ResponseDescription":"Success. Request accepted for processing","CustomerMessage":"Success. Request accepted for processing"}"#,
        );
        assert!(ack.evaluate(ReplyKind::Acknowledgement).internal_status);
        assert!(!decode(r#"{"message":"no content"}"#)
            .evaluate(ReplyKind::Acknowledgement)
            .internal_status);
    }

    #[test]
    fn stk_query_needs_both_codes() {
        let done = decode(r#"{"ResponseCode":"0","ResultCode":"0"}"#);
        let cancelled = decode(r#"{"ResponseCode":"0","ResultCode":"1032","ResultDesc":"Request cancelled by user"}"#);
        assert!(evaluate(&done, ReplyKind::StkQuery).internal_status);
        assert!(!evaluate(&cancelled, ReplyKind::StkQuery).internal_status);
    }

    #[test]
    fn ussd_push_failure_reports_body_code_and_status() {
        let ok = decode(r#"{"ResponseBody":{"code":"0","status":"USSD Initiated Successfully"}}"#);
        assert!(evaluate(&ok, ReplyKind::UssdPush).internal_status);

        let failed = decode(r#"{"ResponseBody":{"code":"4104","status":"Missing Nominated Number"}}"#);
        let result = evaluate(&failed, ReplyKind::UssdPush);
        assert!(!result.internal_status);
        assert_eq!(result.error_code.as_deref(), Some("4104"));
        assert_eq!(result.error_message.as_deref(), Some("Missing Nominated Number"));
    }

    #[test]
    fn validation_reply_json() {
        assert_eq!(
            ValidationReply::acknowledgement().to_json().unwrap(),
            r#"{"ResultCode":"0","ResultDesc":"Success"}"#
        );
        let reply = ValidationReply::new(ResponseStatus::InvalidMsisdn, ResultDesc::Rejected, Some("T-1"));
        assert_eq!(
            reply.to_json().unwrap(),
            r#"{"ResultCode":"Invalid MSISDN","ResultDesc":"Rejected","ThirdPartyTransID":"T-1"}"#
        );
        assert!(ValidationReply::new(ResponseStatus::Success, ResultDesc::Accepted, Some(""))
            .third_party_trans_id
            .is_none());
        assert_eq!(ValidationReply::reject(ResponseStatus::InvalidAmount).result_desc, "Rejected");
        assert_eq!(ValidationReply::accept().result_desc, "Accepted");
    }
}
