use alloy::primitives::{Address, U256, U64};
use signing_provider_core::{ChainConfig, ChainNamespace, JsonRpcRequest, TransactionParams};

#[test]
fn chain_config_uses_camel_case_keys() {
    let config = ChainConfig::eip155(137, "https://polygon-rpc.com", "Polygon");
    let json = serde_json::to_value(&config).expect("serialize chain config");
    assert_eq!(json["chainId"], "0x89");
    assert_eq!(json["chainNamespace"], "eip155");
    assert_eq!(json["rpcTarget"], "https://polygon-rpc.com");
    assert_eq!(json["displayName"], "Polygon");
    assert!(json.get("ticker").is_none());
}

#[test]
fn chain_config_from_json_keeps_namespace() {
    let config: ChainConfig = serde_json::from_value(serde_json::json!({
        "chainId": "0x1",
        "chainNamespace": "solana",
        "rpcTarget": "https://api.mainnet-beta.solana.com"
    }))
    .expect("deserialize chain config");
    assert_eq!(config.chain_namespace, ChainNamespace::Solana);
    assert_eq!(config.display_name, "");
    assert!(!config.is_testnet);
}

#[test]
fn unknown_namespace_deserializes_as_other() {
    let config: ChainConfig = serde_json::from_value(serde_json::json!({
        "chainId": "0x76",
        "chainNamespace": "cosmos",
        "rpcTarget": "https://rpc.cosmos.network"
    }))
    .expect("unknown namespace still deserializes");
    assert_eq!(config.chain_namespace, ChainNamespace::Other);
}

#[test]
fn normalized_rejects_empty_rpc_target() {
    let mut config = ChainConfig::eip155(1, "", "Mainnet");
    config.rpc_target = "  ".to_owned();
    let err = config.normalized().expect_err("empty rpc target");
    assert!(err.to_string().contains("empty rpcTarget"));
}

#[test]
fn transaction_params_accept_input_and_gas_limit_aliases() {
    let tx: TransactionParams = serde_json::from_value(serde_json::json!({
        "from": "0x1000000000000000000000000000000000000001",
        "to": "0x000000000000000000000000000000000000cafe",
        "value": "0xde0b6b3a7640000",
        "input": "0xa9059cbb",
        "gasLimit": "0x5208",
        "maxFeePerGas": "0x3b9aca00"
    }))
    .expect("deserialize tx params");
    let from: Address = "0x1000000000000000000000000000000000000001"
        .parse()
        .expect("from address");
    assert_eq!(tx.from, Some(from));
    assert_eq!(tx.value, Some(U256::from(1_000_000_000_000_000_000u64)));
    assert_eq!(tx.gas, Some(U64::from(21_000u64)));
    assert_eq!(tx.data.as_ref().map(|d| d.len()), Some(4));
    assert!(tx.is_eip1559());
}

#[test]
fn request_param_treats_object_params_as_first_position() {
    let req = JsonRpcRequest::new(
        "wallet_switchEthereumChain",
        serde_json::json!({"chainId": "0x89"}),
    );
    assert_eq!(req.param(0).and_then(|v| v.get("chainId")), Some(&serde_json::json!("0x89")));
    assert!(req.param(1).is_none());

    let wire = serde_json::to_value(&req).expect("serialize request");
    assert_eq!(wire["jsonrpc"], "2.0");
    assert!(wire.get("capability").is_none());
}
