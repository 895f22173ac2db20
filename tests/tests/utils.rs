use ledger_client::{ConnectOptions, Contract, Gateway, Identity};
use mock_ledger::MockConfig;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::error;

pub const CHANNEL: &str = "mychannel";
pub const CHAINCODE: &str = "basic";

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));
    });
}

/// Starts a fresh mock ledger on an ephemeral port.
#[allow(unused)]
pub async fn spawn_ledger(config: MockConfig) -> SocketAddr {
    init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Err(err) = mock_ledger::serve(listener, config).await {
            error!("Mock ledger stopped: {err}");
        }
    });
    addr
}

#[allow(unused)]
pub fn connect(addr: SocketAddr) -> Contract {
    let identity = Identity::new("Org1MSP", b"-----BEGIN CERTIFICATE-----".to_vec());
    Gateway::connect(ConnectOptions::new(addr.to_string(), identity))
        .unwrap()
        .network(CHANNEL)
        .contract(CHAINCODE)
}

/// A contract connected to its own mock ledger.
#[allow(unused)]
pub async fn ledger_contract(config: MockConfig) -> Contract {
    connect(spawn_ledger(config).await)
}
