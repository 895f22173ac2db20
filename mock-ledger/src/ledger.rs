use crate::config::MockConfig;
use crate::contract::{simulate, Asset, RwSet, WorldState};
use crate::error::LedgerError;
use crate::wire::{
    EndorseResponse, InvokeRequest, ProposalResponse, StatusResponse, SubmitResponse,
    ValidationCode,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics::counter;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::watch;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn, Instrument};

enum TxState {
    Proposed(InvokeRequest),
    Endorsing,
    Endorsed(RwSet),
    Rejected,
    Submitted,
    Committed(ValidationCode),
}

impl TxState {
    fn name(&self) -> &'static str {
        match self {
            TxState::Proposed(_) => "proposed",
            TxState::Endorsing => "endorsing",
            TxState::Endorsed(_) => "endorsed",
            TxState::Rejected => "rejected",
            TxState::Submitted => "submitted",
            TxState::Committed(_) => "committed",
        }
    }
}

struct TxEntry {
    creator: String,
    state: TxState,
    status: watch::Sender<Option<ValidationCode>>,
}

/// World state plus every transaction seen since startup.
///
/// Phases must be driven in order for each transaction id. Commits run in the background once a
/// transaction has been ordered and are applied one at a time.
pub struct Ledger {
    config: MockConfig,
    world: RwLock<WorldState>,
    transactions: Mutex<HashMap<String, TxEntry>>,
    order_limiter: Option<DefaultDirectRateLimiter>,
}

impl Ledger {
    pub fn new(config: MockConfig) -> Self {
        let order_limiter = config
            .max_order_rate
            .map(|rate| RateLimiter::direct(Quota::per_second(rate)));
        Self {
            config,
            world: RwLock::new(WorldState::default()),
            transactions: Mutex::new(HashMap::new()),
            order_limiter,
        }
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    /// Runs a read-only query against the committed state.
    pub fn evaluate(&self, request: &InvokeRequest) -> Result<Vec<u8>, LedgerError> {
        counter!("mock_ledger_evaluations").increment(1);
        let world = self.world.read()?;
        simulate(&world, &request.method, &request.args)
            .map(|(payload, _)| payload)
            .map_err(LedgerError::Evaluate)
    }

    pub fn propose(&self, creator: &str, request: InvokeRequest) -> Result<ProposalResponse, LedgerError> {
        let transaction_id = uuid::Uuid::new_v4().simple().to_string();
        trace!("Proposal {transaction_id} for {} from {creator}", request.method);

        let (status, _) = watch::channel(None);
        self.transactions.lock()?.insert(
            transaction_id.clone(),
            TxEntry {
                creator: creator.to_string(),
                state: TxState::Proposed(request),
                status,
            },
        );
        counter!("mock_ledger_transactions", "phase" => "propose").increment(1);

        Ok(ProposalResponse { transaction_id })
    }

    /// Simulates the proposal against the current state and keeps its read/write set.
    pub async fn endorse(&self, transaction_id: &str) -> Result<EndorseResponse, LedgerError> {
        let request = self.transition(transaction_id, "proposed", TxState::Endorsing, |state| {
            match state {
                TxState::Proposed(request) => Ok(request),
                other => Err(other),
            }
        })?;

        tokio::time::sleep(self.config.endorse_delay).await;
        counter!("mock_ledger_transactions", "phase" => "endorse").increment(1);

        let simulated = {
            let world = self.world.read()?;
            simulate(&world, &request.method, &request.args)
        };

        let mut transactions = self.transactions.lock()?;
        let entry = transactions
            .get_mut(transaction_id)
            .ok_or_else(|| LedgerError::UnknownTransaction(transaction_id.to_string()))?;
        match simulated {
            Ok((payload, rwset)) => {
                entry.state = TxState::Endorsed(rwset);
                Ok(EndorseResponse {
                    transaction_id: transaction_id.to_string(),
                    result: String::from_utf8_lossy(&payload).into_owned(),
                })
            }
            Err(source) => {
                debug!("Endorsement of {transaction_id} rejected: {source}");
                entry.state = TxState::Rejected;
                Err(LedgerError::Endorse {
                    transaction_id: transaction_id.to_string(),
                    source,
                })
            }
        }
    }

    /// Orders an endorsed transaction and schedules its commit.
    pub async fn submit(
        self: &Arc<Self>,
        transaction_id: &str,
    ) -> Result<SubmitResponse, LedgerError> {
        let rwset = self.transition(transaction_id, "endorsed", TxState::Submitted, |state| {
            match state {
                TxState::Endorsed(rwset) => Ok(rwset),
                other => Err(other),
            }
        })?;

        tokio::time::sleep(self.config.order_delay).await;
        if let Some(limiter) = &self.order_limiter {
            limiter.until_ready().await;
        }
        counter!("mock_ledger_transactions", "phase" => "submit").increment(1);

        let ledger = self.clone();
        let id = transaction_id.to_string();
        tokio::spawn(
            async move {
                tokio::time::sleep(ledger.config.commit_delay).await;
                if let Err(err) = ledger.commit(&id, &rwset) {
                    error!("Failed to commit {id}: {err}");
                }
            }
            .in_current_span(),
        );

        Ok(SubmitResponse {
            transaction_id: transaction_id.to_string(),
        })
    }

    /// Waits until the transaction has been committed.
    pub async fn status(&self, transaction_id: &str) -> Result<StatusResponse, LedgerError> {
        let mut rx = {
            let transactions = self.transactions.lock()?;
            let entry = transactions
                .get(transaction_id)
                .ok_or_else(|| LedgerError::UnknownTransaction(transaction_id.to_string()))?;
            match entry.state {
                TxState::Committed(code) => return Ok(status_response(transaction_id, code)),
                TxState::Submitted => entry.status.subscribe(),
                ref other => {
                    return Err(LedgerError::OutOfOrder {
                        transaction_id: transaction_id.to_string(),
                        state: other.name(),
                        expected: "submitted",
                    })
                }
            }
        };

        let code = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|code| *code)
            .ok_or_else(|| LedgerError::UnknownTransaction(transaction_id.to_string()))?;
        Ok(status_response(transaction_id, code))
    }

    /// Committed value of an asset.
    pub fn asset(&self, id: &str) -> Result<Option<Asset>, LedgerError> {
        let world = self.world.read()?;
        Ok(world
            .get(id)
            .and_then(|v| serde_json::from_slice(&v.value).ok()))
    }

    pub fn height(&self) -> Result<u64, LedgerError> {
        Ok(self.world.read()?.height())
    }

    /// MSP id of the identity that proposed the transaction.
    pub fn creator(&self, transaction_id: &str) -> Result<Option<String>, LedgerError> {
        Ok(self
            .transactions
            .lock()?
            .get(transaction_id)
            .map(|entry| entry.creator.clone()))
    }

    fn commit(&self, transaction_id: &str, rwset: &RwSet) -> Result<ValidationCode, LedgerError> {
        let code = match self.world.write()?.apply(rwset) {
            Ok(height) => {
                trace!("Committed {transaction_id} at height {height}");
                ValidationCode::Valid
            }
            Err(stale) => {
                warn!("Transaction {transaction_id} read stale keys {stale:?}");
                ValidationCode::MvccReadConflict
            }
        };
        counter!("mock_ledger_commits", "code" => code.name()).increment(1);

        let mut transactions = self.transactions.lock()?;
        if let Some(entry) = transactions.get_mut(transaction_id) {
            entry.state = TxState::Committed(code);
            entry.status.send_replace(Some(code));
        }
        Ok(code)
    }

    /// Swaps the state of a transaction for `next` if `take` accepts the current one.
    fn transition<T>(
        &self,
        transaction_id: &str,
        expected: &'static str,
        next: TxState,
        take: impl FnOnce(TxState) -> Result<T, TxState>,
    ) -> Result<T, LedgerError> {
        let mut transactions = self.transactions.lock()?;
        let entry = transactions
            .get_mut(transaction_id)
            .ok_or_else(|| LedgerError::UnknownTransaction(transaction_id.to_string()))?;

        match take(std::mem::replace(&mut entry.state, next)) {
            Ok(value) => Ok(value),
            Err(previous) => {
                let state = previous.name();
                entry.state = previous;
                Err(LedgerError::OutOfOrder {
                    transaction_id: transaction_id.to_string(),
                    state,
                    expected,
                })
            }
        }
    }
}

fn status_response(transaction_id: &str, code: ValidationCode) -> StatusResponse {
    StatusResponse {
        transaction_id: transaction_id.to_string(),
        code: code.code(),
        successful: code == ValidationCode::Valid,
    }
}
