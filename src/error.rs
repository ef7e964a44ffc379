use super::passport::DppStatus;

/// Coarse classification every [`DppError`] maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    PermissionDenied,
    InvalidTransition,
    InvalidPayload,
    Storage,
}

#[derive(thiserror::Error, Debug)]
pub enum DppError {
    #[error("Passport {0} does not exist")]
    NotFound(String),
    #[error("Passport {0} already exists")]
    AlreadyExists(String),
    #[error("Product identifier must not be empty")]
    InvalidIdentifier,
    #[error("Caller {caller} is not the owner of passport {dpp_id} (owner: {owner})")]
    NotOwner {
        dpp_id: String,
        caller: String,
        owner: String,
    },
    #[error("Passport {0} cannot be transferred to its current owner")]
    SelfTransfer(String),
    #[error("Passport {dpp_id} is not transferable in status {status}")]
    NotTransferable { dpp_id: String, status: DppStatus },
    #[error("Passport {dpp_id} is not in transit to {caller} (status: {status})")]
    ReceiptMismatch {
        dpp_id: String,
        caller: String,
        status: DppStatus,
    },
    #[error("Passport {0} is blocked and accepts no further test results")]
    PassportBlocked(String),
    #[error("Passport {dpp_id} was consumed by transformation into {output_id}")]
    PassportConsumed { dpp_id: String, output_id: String },
    #[error("Transformation input {dpp_id} is not usable (status: {status}, owner: {owner})")]
    TransformationInputInvalid {
        dpp_id: String,
        status: DppStatus,
        owner: String,
    },
    #[error("Invalid payload field '{field}': {reason}")]
    InvalidPayload { field: String, reason: String },
    #[error("Ledger access failed")]
    Ledger(#[from] LedgerError),
    #[error("Record codec failure: {0}")]
    Codec(String),
}

impl DppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::NotOwner { .. } => ErrorKind::PermissionDenied,
            Self::SelfTransfer(_)
            | Self::NotTransferable { .. }
            | Self::ReceiptMismatch { .. }
            | Self::PassportBlocked(_)
            | Self::PassportConsumed { .. }
            | Self::TransformationInputInvalid { .. } => ErrorKind::InvalidTransition,
            Self::InvalidIdentifier | Self::InvalidPayload { .. } => ErrorKind::InvalidPayload,
            Self::Ledger(_) | Self::Codec(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn payload(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("sled backend error")]
    Sled(#[from] sled::Error),
    #[error("Write to key {0} was rejected by the ledger")]
    WriteRejected(String),
    #[error("Ledger entry in {0} could not be decoded")]
    Corrupt(String),
    #[error("Ledger state lock poisoned")]
    Poisoned,
}
