//! HTTP gateway to a ledger peer.
//!
//! A [`Contract`] submits transactions either in one call ([`Contract::submit`]), in two steps
//! ([`Contract::submit_async`] then [`Contract::status`]), or phase by phase through its
//! [`Pipeline`] implementation, which is what the benchmarks drive.
use ledgerbench::core::{CommitStatus, Invocation, PipelineError};
use ledgerbench::Pipeline;
use mock_ledger::wire::{
    EndorseResponse, ErrorBody, ErrorDetail, InvokeRequest, ProposalResponse, StatusResponse,
    SubmitResponse, MSP_ID_HEADER,
};
use reqwest::{Certificate, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};
use url::Url;

pub const DEFAULT_EVALUATE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_ENDORSE_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_COMMIT_STATUS_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message} (HTTP {status}){}", render_details(.details))]
    Status {
        status: u16,
        message: String,
        details: Vec<ErrorDetail>,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No certificate found in {0}")]
    NoCertificate(PathBuf),

    #[error("Invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

fn render_details(details: &[ErrorDetail]) -> String {
    details
        .iter()
        .map(|d| {
            format!(
                "\n- address: {}, mspId: {}, message: {}",
                d.address, d.msp_id, d.message
            )
        })
        .collect()
}

impl GatewayError {
    /// Per-peer details attached to a rejected request.
    pub fn details(&self) -> &[ErrorDetail] {
        match self {
            GatewayError::Status { details, .. } => details,
            _ => &[],
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Transport(err) if err.is_timeout())
    }

    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> GatewayError + '_ {
        move |source| GatewayError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// The client identity: MSP id and PEM certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub msp_id: String,
    pub certificate: Vec<u8>,
}

impl Identity {
    pub fn new(msp_id: impl Into<String>, certificate: impl Into<Vec<u8>>) -> Self {
        Self {
            msp_id: msp_id.into(),
            certificate: certificate.into(),
        }
    }

    /// Uses the first file (by name) found in `dir` as the certificate.
    pub fn from_cert_dir(msp_id: impl Into<String>, dir: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let dir = dir.as_ref();
        let mut files = std::fs::read_dir(dir)
            .map_err(GatewayError::io(dir))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect::<Vec<_>>();
        files.sort();

        let path = files
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::NoCertificate(dir.to_path_buf()))?;
        let certificate = std::fs::read(&path).map_err(GatewayError::io(&path))?;
        debug!("Loaded identity certificate from {}", path.display());

        Ok(Self::new(msp_id, certificate))
    }
}

/// Per-call timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub evaluate: Duration,
    pub endorse: Duration,
    pub submit: Duration,
    pub commit_status: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            evaluate: DEFAULT_EVALUATE_TIMEOUT,
            endorse: DEFAULT_ENDORSE_TIMEOUT,
            submit: DEFAULT_SUBMIT_TIMEOUT,
            commit_status: DEFAULT_COMMIT_STATUS_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    endpoint: String,
    identity: Identity,
    tls_ca: Option<PathBuf>,
    timeouts: Timeouts,
}

impl ConnectOptions {
    /// `endpoint` is a URL or a bare `host:port`.
    pub fn new(endpoint: impl Into<String>, identity: Identity) -> Self {
        Self {
            endpoint: endpoint.into(),
            identity,
            tls_ca: None,
            timeouts: Timeouts::default(),
        }
    }

    /// Trust the PEM CA certificate at `path`; bare endpoints then default to https.
    pub fn tls_ca(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls_ca = Some(path.into());
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn evaluate_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.evaluate = timeout;
        self
    }

    pub fn endorse_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.endorse = timeout;
        self
    }

    pub fn submit_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.submit = timeout;
        self
    }

    pub fn commit_status_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.commit_status = timeout;
        self
    }

    fn base_url(&self) -> Result<Url, GatewayError> {
        let mut endpoint = if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else {
            let scheme = if self.tls_ca.is_some() { "https" } else { "http" };
            format!("{scheme}://{}", self.endpoint)
        };
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        Ok(Url::parse(&endpoint)?)
    }
}

struct Inner {
    client: Client,
    base: Url,
    identity: Identity,
    timeouts: Timeouts,
}

impl Inner {
    fn url(&self, path: &str) -> Result<Url, GatewayError> {
        Ok(self.base.join(path)?)
    }

    async fn call_raw(&self, request: RequestBuilder, timeout: Duration) -> Result<Vec<u8>, GatewayError> {
        let response = request
            .header(MSP_ID_HEADER, &self.identity.msp_id)
            .timeout(timeout)
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            return Ok(body.to_vec());
        }

        let (message, details) = match serde_json::from_slice::<ErrorBody>(&body) {
            Ok(err) => (err.message, err.details),
            Err(_) => (String::from_utf8_lossy(&body).into_owned(), vec![]),
        };
        Err(GatewayError::Status {
            status: status.as_u16(),
            message,
            details,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        timeout: Duration,
    ) -> Result<T, GatewayError> {
        let body = self.call_raw(request, timeout).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// A connection to one gateway peer, shared by every network and contract created from it.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<Inner>,
}

impl Gateway {
    pub fn connect(options: ConnectOptions) -> Result<Self, GatewayError> {
        let base = options.base_url()?;

        let mut builder = Client::builder();
        if let Some(path) = &options.tls_ca {
            let pem = std::fs::read(path).map_err(GatewayError::io(path))?;
            builder = builder.add_root_certificate(Certificate::from_pem(&pem)?);
        }
        let client = builder.build()?;
        info!(
            "Connected to {base} as {} ({:?})",
            options.identity.msp_id, options.timeouts
        );

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                base,
                identity: options.identity,
                timeouts: options.timeouts,
            }),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    pub fn network(&self, channel: impl Into<String>) -> Network {
        Network {
            inner: self.inner.clone(),
            channel: channel.into(),
        }
    }
}

#[derive(Clone)]
pub struct Network {
    inner: Arc<Inner>,
    channel: String,
}

impl Network {
    pub fn name(&self) -> &str {
        &self.channel
    }

    pub fn contract(&self, name: impl Into<String>) -> Contract {
        Contract {
            inner: self.inner.clone(),
            channel: self.channel.clone(),
            name: name.into(),
        }
    }
}

/// A created, not yet endorsed, transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    transaction_id: String,
}

/// An endorsed transaction, ready to be ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    transaction_id: String,
    result: Vec<u8>,
}

/// An ordered transaction whose commit status can be awaited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    transaction_id: String,
}

impl Proposal {
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }
}

impl Transaction {
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    /// Payload returned by the contract during endorsement.
    pub fn result(&self) -> &[u8] {
        &self.result
    }
}

impl Commit {
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }
}

/// A smart contract deployed on a channel.
#[derive(Clone)]
pub struct Contract {
    inner: Arc<Inner>,
    channel: String,
    name: String,
}

impl Contract {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn contract_url(&self, route: &str) -> Result<Url, GatewayError> {
        self.inner
            .url(&format!("channels/{}/contracts/{}/{route}", self.channel, self.name))
    }

    fn transaction_url(&self, id: &str, route: &str) -> Result<Url, GatewayError> {
        self.inner.url(&format!("transactions/{id}/{route}"))
    }

    /// Runs a query on the peer; nothing is ordered or committed.
    #[instrument(skip(self, args), fields(contract = %self.name))]
    pub async fn evaluate(&self, method: &str, args: &[&str]) -> Result<Vec<u8>, GatewayError> {
        let url = self.contract_url("evaluate")?;
        let body = InvokeRequest {
            method: method.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        };
        let request = self.inner.client.post(url).json(&body);
        self.inner.call_raw(request, self.inner.timeouts.evaluate).await
    }

    /// Submits a transaction and waits for it to commit. Returns the contract's payload.
    pub async fn submit(&self, method: &str, args: &[&str]) -> Result<Vec<u8>, PipelineError> {
        let (result, commit) = self.submit_async(method, args).await?;
        let status = self.status(commit).await?;
        if status.successful {
            Ok(result)
        } else {
            Err(PipelineError::Commit {
                transaction_id: status.transaction_id,
                code: status.code,
            })
        }
    }

    /// Returns once the transaction has been ordered. The commit status is awaited separately with
    /// [`Contract::status`].
    pub async fn submit_async(
        &self,
        method: &str,
        args: &[&str],
    ) -> Result<(Vec<u8>, Commit), PipelineError> {
        let proposal = self.propose(&Invocation::new(method, args.iter().copied())).await?;
        let transaction = self.endorse(proposal).await?;
        let result = transaction.result.clone();
        let commit = Pipeline::submit(self, transaction).await?;
        Ok((result, commit))
    }

    async fn propose_inner(&self, invocation: &Invocation) -> Result<Proposal, GatewayError> {
        let url = self.contract_url("proposals")?;
        let body = InvokeRequest {
            method: invocation.method.clone(),
            args: invocation.args.clone(),
        };
        let request = self.inner.client.post(url).json(&body);
        let response: ProposalResponse = self.inner.call(request, self.inner.timeouts.endorse).await?;
        Ok(Proposal {
            transaction_id: response.transaction_id,
        })
    }

    async fn endorse_inner(&self, id: &str) -> Result<Transaction, GatewayError> {
        let request = self.inner.client.post(self.transaction_url(id, "endorse")?);
        let response: EndorseResponse = self.inner.call(request, self.inner.timeouts.endorse).await?;
        Ok(Transaction {
            transaction_id: response.transaction_id,
            result: response.result.into_bytes(),
        })
    }

    async fn submit_inner(&self, id: &str) -> Result<Commit, GatewayError> {
        let request = self.inner.client.post(self.transaction_url(id, "submit")?);
        let response: SubmitResponse = self.inner.call(request, self.inner.timeouts.submit).await?;
        Ok(Commit {
            transaction_id: response.transaction_id,
        })
    }

    async fn status_inner(&self, id: &str) -> Result<CommitStatus, GatewayError> {
        let request = self.inner.client.get(self.transaction_url(id, "status")?);
        let response: StatusResponse = self
            .inner
            .call(request, self.inner.timeouts.commit_status)
            .await?;
        Ok(CommitStatus {
            transaction_id: response.transaction_id,
            code: response.code,
            successful: response.successful,
        })
    }
}

impl Pipeline for Contract {
    type Proposal = Proposal;
    type Transaction = Transaction;
    type Commit = Commit;

    async fn propose(&self, invocation: &Invocation) -> Result<Proposal, PipelineError> {
        self.propose_inner(invocation)
            .await
            .map_err(|err| PipelineError::Proposal {
                detail: err.to_string(),
            })
    }

    async fn endorse(&self, proposal: Proposal) -> Result<Transaction, PipelineError> {
        self.endorse_inner(&proposal.transaction_id)
            .await
            .map_err(|err| PipelineError::Endorse {
                transaction_id: proposal.transaction_id,
                detail: err.to_string(),
            })
    }

    async fn submit(&self, transaction: Transaction) -> Result<Commit, PipelineError> {
        self.submit_inner(&transaction.transaction_id)
            .await
            .map_err(|err| PipelineError::Order {
                transaction_id: transaction.transaction_id,
                detail: err.to_string(),
            })
    }

    async fn status(&self, commit: Commit) -> Result<CommitStatus, PipelineError> {
        self.status_inner(&commit.transaction_id)
            .await
            .map_err(|err| PipelineError::CommitStatus {
                transaction_id: commit.transaction_id,
                timed_out: err.is_timeout(),
                detail: err.to_string(),
            })
    }
}
