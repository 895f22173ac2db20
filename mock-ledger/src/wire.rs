//! JSON bodies exchanged with the mock ledger.
use serde::{Deserialize, Serialize};

/// Header carrying the MSP id of the submitting identity.
pub const MSP_ID_HEADER: &str = "x-msp-id";

/// A contract method call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InvokeRequest {
    pub method: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProposalResponse {
    pub transaction_id: String,
}

/// `result` is the contract's return payload, usually JSON or empty.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EndorseResponse {
    pub transaction_id: String,
    pub result: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    pub transaction_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub transaction_id: String,
    pub code: i32,
    pub successful: bool,
}

/// Error body of every non-2xx response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default)]
    pub details: Vec<ErrorDetail>,
}

/// What a single peer reported while handling a request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub address: String,
    pub msp_id: String,
    pub message: String,
}

/// Validation codes reported by the commit status route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ValidationCode {
    Valid = 0,
    MvccReadConflict = 11,
}

impl ValidationCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            ValidationCode::Valid => "VALID",
            ValidationCode::MvccReadConflict => "MVCC_READ_CONFLICT",
        }
    }
}
