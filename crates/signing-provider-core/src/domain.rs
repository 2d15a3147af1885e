use std::fmt;

use alloy::primitives::{keccak256, Address, Bytes, B256, U256, U64};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::ports::SharedCapability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainNamespace {
    Eip155,
    Solana,
    Casper,
    Xrpl,
    #[serde(other)]
    Other,
}

impl fmt::Display for ChainNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eip155 => "eip155",
            Self::Solana => "solana",
            Self::Casper => "casper",
            Self::Xrpl => "xrpl",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    pub chain_id: String,
    pub chain_namespace: ChainNamespace,
    pub rpc_target: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_explorer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default)]
    pub is_testnet: bool,
}

impl ChainConfig {
    pub fn eip155(chain_id: u64, rpc_target: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            chain_id: to_hex_chain_id(chain_id),
            chain_namespace: ChainNamespace::Eip155,
            rpc_target: rpc_target.into(),
            display_name: display_name.into(),
            ws_target: None,
            block_explorer_url: None,
            ticker: None,
            ticker_name: None,
            decimals: None,
            logo: None,
            is_testnet: false,
        }
    }

    /// Validates the config and rewrites `chain_id` into canonical `0x`-prefixed lowercase hex.
    pub fn normalized(mut self) -> Result<Self, ProviderError> {
        if self.rpc_target.trim().is_empty() {
            return Err(ProviderError::InvalidParams(format!(
                "chain {} has an empty rpcTarget",
                self.chain_id
            )));
        }
        self.chain_id = canonical_chain_id(&self.chain_id)?;
        Ok(self)
    }

    pub fn chain_id_u64(&self) -> Result<u64, ProviderError> {
        parse_hex_chain_id(&self.chain_id)
    }
}

/// `wallet_addEthereumChain` parameter shape (EIP-3085).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEthereumChainParameter {
    pub chain_id: String,
    #[serde(default)]
    pub chain_name: Option<String>,
    #[serde(default)]
    pub rpc_urls: Vec<String>,
    #[serde(default)]
    pub native_currency: Option<NativeCurrency>,
    #[serde(default)]
    pub block_explorer_urls: Vec<String>,
    #[serde(default)]
    pub icon_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl TryFrom<AddEthereumChainParameter> for ChainConfig {
    type Error = ProviderError;

    fn try_from(p: AddEthereumChainParameter) -> Result<Self, Self::Error> {
        let rpc_target = p
            .rpc_urls
            .into_iter()
            .next()
            .ok_or(ProviderError::MissingParams("rpcUrls"))?;
        let chain_id = canonical_chain_id(&p.chain_id)?;
        let config = ChainConfig {
            display_name: p.chain_name.unwrap_or_else(|| chain_id.clone()),
            chain_id,
            chain_namespace: ChainNamespace::Eip155,
            rpc_target,
            ws_target: None,
            block_explorer_url: p.block_explorer_urls.into_iter().next(),
            ticker: p.native_currency.as_ref().map(|c| c.symbol.clone()),
            ticker_name: p.native_currency.as_ref().map(|c| c.name.clone()),
            decimals: p.native_currency.as_ref().map(|c| c.decimals),
            logo: p.icon_urls.into_iter().next(),
            is_testnet: false,
        };
        config.normalized()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchChainParams {
    pub chain_id: String,
}

/// Advertised chain id. `Loading` is the transient marker set while a chain switch is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChainIdState {
    #[default]
    Loading,
    Chain(String),
}

impl ChainIdState {
    pub fn as_chain(&self) -> Option<&str> {
        match self {
            Self::Loading => None,
            Self::Chain(id) => Some(id),
        }
    }
}

impl fmt::Display for ChainIdState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => f.write_str("loading"),
            Self::Chain(id) => f.write_str(id),
        }
    }
}

/// Uncompressed secp256k1 public key without the `0x04` prefix (x || y, 64 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(pub [u8; 64]);

impl PublicKey {
    /// Accepts 64 raw bytes or the 65-byte SEC1 uncompressed form.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProviderError> {
        let raw = match bytes.len() {
            64 => bytes,
            65 if bytes[0] == 0x04 => &bytes[1..],
            n => {
                return Err(ProviderError::Signing(format!(
                    "public key must be 64 bytes or 65 bytes uncompressed, got {n}"
                )))
            }
        };
        let mut out = [0u8; 64];
        out.copy_from_slice(raw);
        Ok(Self(out))
    }

    pub fn address(&self) -> Address {
        Address::from_slice(&keccak256(self.0)[12..])
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", alloy::hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

/// `{v, r, s}` as produced by a signing capability. `v` is a 1-byte recovery id (0/1 or 27/28).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub v: u8,
    pub r: B256,
    pub s: B256,
}

impl RecoverableSignature {
    pub fn y_parity(&self) -> Result<bool, ProviderError> {
        match self.v {
            0 | 27 => Ok(false),
            1 | 28 => Ok(true),
            v => Err(ProviderError::Signing(format!("unsupported recovery id: {v}"))),
        }
    }

    /// 65-byte `r || s || v` with `v` in {27, 28}.
    pub fn to_rsv_bytes(&self) -> Result<[u8; 65], ProviderError> {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(self.r.as_slice());
        out[32..64].copy_from_slice(self.s.as_slice());
        out[64] = 27 + u8::from(self.y_parity()?);
        Ok(out)
    }

    pub fn to_hex(&self) -> Result<String, ProviderError> {
        Ok(format!("0x{}", alloy::hex::encode(self.to_rsv_bytes()?)))
    }
}

#[derive(Clone, Default)]
pub struct ProviderState {
    pub chain_id: ChainIdState,
    pub capability: Option<SharedCapability>,
}

impl fmt::Debug for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderState")
            .field("chain_id", &self.chain_id)
            .field("capability", &self.capability.as_ref().map(|_| "<capability>"))
            .finish()
    }
}

/// Partial update merged into [`ProviderState`]; `None` fields are left untouched.
#[derive(Clone, Default)]
pub struct ProviderStatePatch {
    pub chain_id: Option<ChainIdState>,
    pub capability: Option<SharedCapability>,
}

impl ProviderStatePatch {
    pub fn chain_id(chain_id: ChainIdState) -> Self {
        Self {
            chain_id: Some(chain_id),
            capability: None,
        }
    }

    pub fn capability(capability: SharedCapability) -> Self {
        Self {
            chain_id: None,
            capability: Some(capability),
        }
    }
}

/// Outgoing transaction fields as they appear in `eth_signTransaction` / `eth_sendTransaction`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, alias = "input", skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U64>,
    #[serde(default, alias = "gasLimit", skip_serializing_if = "Option::is_none")]
    pub gas: Option<U64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<U64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub tx_type: Option<U64>,
}

impl TransactionParams {
    pub fn is_eip1559(&self) -> bool {
        self.gas_price.is_none()
            && (self.max_fee_per_gas.is_some() || self.max_priority_fee_per_gas.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderEventKind {
    Connect,
    ChainChanged,
    AccountsChanged,
    Disconnect,
}

impl ProviderEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::ChainChanged => "chainChanged",
            Self::AccountsChanged => "accountsChanged",
            Self::Disconnect => "disconnect",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEvent {
    pub sequence: u64,
    pub kind: ProviderEventKind,
    pub data: Value,
}

pub fn to_hex_chain_id(chain_id: u64) -> String {
    format!("0x{chain_id:x}")
}

pub fn parse_hex_chain_id(raw: &str) -> Result<u64, ProviderError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| ProviderError::InvalidParams(format!("chain id must be 0x-prefixed hex: {raw}")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| ProviderError::InvalidParams(format!("invalid hex chain id {raw}: {e}")))
}

/// Parses a chain id or network version given as `0x` hex or decimal.
pub fn parse_chain_id(raw: &str) -> Result<u64, ProviderError> {
    let raw = raw.trim();
    if raw.starts_with("0x") || raw.starts_with("0X") {
        parse_hex_chain_id(raw)
    } else {
        raw.parse()
            .map_err(|e| ProviderError::InvalidParams(format!("invalid chain id {raw}: {e}")))
    }
}

pub fn canonical_chain_id(raw: &str) -> Result<String, ProviderError> {
    Ok(to_hex_chain_id(parse_hex_chain_id(raw.trim())?))
}
