#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use signing_provider_adapters::{EthereumSigningProvider, ProviderConfig, TransportFactory};
use signing_provider_core::{
    ChainConfig, ChainNamespace, ProviderError, ProviderEvent, ProviderEventKind, PublicKey,
    RecoverableSignature, RpcTransport, SharedCapability, SigningCapability,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Deterministic signer: `r` echoes the signed hash and `s` repeats the seed byte.
pub struct TestCapability {
    seed: u8,
    pub signed: Mutex<Vec<(B256, Option<Vec<u8>>)>>,
}

impl TestCapability {
    pub fn new(seed: u8) -> Arc<Self> {
        Arc::new(Self {
            seed,
            signed: Mutex::new(Vec::new()),
        })
    }

    pub fn public(&self) -> PublicKey {
        PublicKey([self.seed; 64])
    }

    pub fn address(&self) -> Address {
        self.public().address()
    }

    pub fn shared(self: &Arc<Self>) -> SharedCapability {
        self.clone()
    }
}

#[async_trait]
impl SigningCapability for TestCapability {
    async fn sign(
        &self,
        hash: B256,
        raw_message: Option<&[u8]>,
    ) -> Result<RecoverableSignature, ProviderError> {
        self.signed
            .lock()
            .expect("signed log")
            .push((hash, raw_message.map(<[u8]>::to_vec)));
        Ok(RecoverableSignature {
            v: 27,
            r: hash,
            s: B256::repeat_byte(self.seed),
        })
    }

    async fn public_key(&self) -> Result<PublicKey, ProviderError> {
        Ok(self.public())
    }
}

/// Canned JSON-RPC node keyed by method name.
pub struct MockRpc {
    responses: Mutex<HashMap<String, Value>>,
    delay: Option<Duration>,
    gate: Mutex<Option<(String, Arc<Notify>)>>,
    pub calls: Mutex<Vec<(String, Value)>>,
}

impl MockRpc {
    pub fn new(net_version: &str) -> Arc<Self> {
        Self::build(net_version, None)
    }

    pub fn slow(net_version: &str, delay: Duration) -> Arc<Self> {
        Self::build(net_version, Some(delay))
    }

    fn build(net_version: &str, delay: Option<Duration>) -> Arc<Self> {
        let mut responses = HashMap::new();
        responses.insert("net_version".to_owned(), json!(net_version));
        Arc::new(Self {
            responses: Mutex::new(responses),
            delay,
            gate: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn respond(&self, method: &str, result: Value) {
        self.responses
            .lock()
            .expect("responses")
            .insert(method.to_owned(), result);
    }

    /// Parks calls to `method` until the returned handle is notified once per call.
    pub fn hold(&self, method: &str) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        *self.gate.lock().expect("gate") = Some((method.to_owned(), Arc::clone(&release)));
        release
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl RpcTransport for MockRpc {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.calls
            .lock()
            .expect("calls")
            .push((method.to_owned(), params));
        let held = self
            .gate
            .lock()
            .expect("gate")
            .as_ref()
            .filter(|(m, _)| m == method)
            .map(|(_, release)| Arc::clone(release));
        if let Some(release) = held {
            release.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .expect("responses")
            .get(method)
            .cloned()
            .ok_or_else(|| ProviderError::Rpc {
                code: -32601,
                message: format!("the method {method} does not exist"),
                data: None,
            })
    }
}

#[derive(Default)]
pub struct MockTransports {
    nodes: Mutex<HashMap<String, Arc<MockRpc>>>,
    pub built: Mutex<Vec<String>>,
}

impl MockTransports {
    pub fn with(self: Arc<Self>, rpc_target: &str, node: Arc<MockRpc>) -> Arc<Self> {
        self.nodes
            .lock()
            .expect("nodes")
            .insert(rpc_target.to_owned(), node);
        self
    }

    pub fn node(&self, rpc_target: &str) -> Arc<MockRpc> {
        self.nodes
            .lock()
            .expect("nodes")
            .get(rpc_target)
            .cloned()
            .expect("mock node registered")
    }
}

impl TransportFactory for MockTransports {
    fn transport(&self, chain: &ChainConfig) -> Result<Arc<dyn RpcTransport>, ProviderError> {
        self.built
            .lock()
            .expect("built")
            .push(chain.rpc_target.clone());
        let node = self
            .nodes
            .lock()
            .expect("nodes")
            .get(&chain.rpc_target)
            .cloned()
            .ok_or_else(|| ProviderError::Transport(format!("no route to {}", chain.rpc_target)))?;
        Ok(node)
    }
}

pub const MAINNET_RPC: &str = "mock://mainnet";
pub const POLYGON_RPC: &str = "mock://polygon";
pub const MISCONFIGURED_RPC: &str = "mock://optimism-pointing-at-mainnet";

pub fn mainnet() -> ChainConfig {
    ChainConfig::eip155(1, MAINNET_RPC, "Ethereum")
}

pub fn polygon() -> ChainConfig {
    ChainConfig::eip155(137, POLYGON_RPC, "Polygon")
}

/// Optimism chain id whose RPC target actually serves mainnet.
pub fn misconfigured_optimism() -> ChainConfig {
    ChainConfig::eip155(10, MISCONFIGURED_RPC, "OP Mainnet")
}

pub fn solana_devnet() -> ChainConfig {
    ChainConfig {
        chain_namespace: ChainNamespace::Solana,
        ..ChainConfig::eip155(0x67, "mock://solana", "Solana Devnet")
    }
}

pub fn transports() -> Arc<MockTransports> {
    Arc::new(MockTransports::default())
        .with(MAINNET_RPC, MockRpc::new("1"))
        .with(POLYGON_RPC, MockRpc::new("137"))
        .with(MISCONFIGURED_RPC, MockRpc::new("1"))
}

pub fn provider_with(config: ProviderConfig, transports: Arc<MockTransports>) -> EthereumSigningProvider {
    init_tracing();
    EthereumSigningProvider::with_transport_factory(
        config,
        vec![mainnet(), polygon(), misconfigured_optimism(), solana_devnet()],
        transports,
    )
    .expect("provider")
}

pub fn provider(transports: Arc<MockTransports>) -> EthereumSigningProvider {
    provider_with(ProviderConfig::default(), transports)
}

pub fn kinds(events: &[ProviderEvent]) -> Vec<ProviderEventKind> {
    events.iter().map(|e| e.kind).collect()
}
