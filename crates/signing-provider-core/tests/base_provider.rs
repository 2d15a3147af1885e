use std::sync::{Arc, Mutex};

use serde_json::json;
use signing_provider_core::{
    BaseProvider, ChainConfig, ChainIdState, Engine, JsonRpcRequest, ProviderAction,
    ProviderError, ProviderEvent, ProviderEventKind, ProviderStatePatch, ProviderStatus,
};

fn mainnet() -> ChainConfig {
    ChainConfig::eip155(1, "https://rpc.mainnet.example", "Ethereum")
}

#[test]
fn get_chain_normalizes_and_reports_unknown_ids() {
    let base = BaseProvider::new(vec![mainnet()]).expect("base provider");
    assert_eq!(base.get_chain("0x01").expect("padded id").chain_id, "0x1");
    let err = base.get_chain("0x89").expect_err("unknown chain");
    assert!(matches!(err, ProviderError::ChainNotFound(ref id) if id == "0x89"));
    let err = base.get_chain("mainnet").expect_err("not hex");
    assert!(matches!(err, ProviderError::ChainNotFound(_)));
}

#[test]
fn add_chain_is_first_write_wins() {
    let base = BaseProvider::new(vec![mainnet()]).expect("base provider");
    let mut replacement = mainnet();
    replacement.rpc_target = "https://other.example".to_owned();

    assert!(!base.add_chain(replacement).expect("duplicate add"));
    let chains = base.chains().expect("chains");
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].rpc_target, "https://rpc.mainnet.example");

    assert!(base
        .add_chain(ChainConfig::eip155(137, "https://polygon.example", "Polygon"))
        .expect("new chain"));
    assert_eq!(base.chains().expect("chains").len(), 2);
}

#[test]
fn update_emits_chain_changed_once_per_new_chain() {
    let base = BaseProvider::new(vec![mainnet()]).expect("base provider");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    base.on(ProviderEventKind::ChainChanged, move |e| {
        sink.lock().expect("sink").push(e.data.clone());
    })
    .expect("register listener");

    base.update(ProviderStatePatch::chain_id(ChainIdState::Chain("0x1".to_owned())))
        .expect("update to 0x1");
    base.update(ProviderStatePatch::chain_id(ChainIdState::Chain("0x1".to_owned())))
        .expect("same chain");
    base.update(ProviderStatePatch::chain_id(ChainIdState::Loading))
        .expect("loading marker");
    assert_eq!(base.chain_id().expect("chain id"), ChainIdState::Loading);

    assert_eq!(*seen.lock().expect("seen"), vec![json!("0x1")]);
}

#[test]
fn update_after_explicit_announcement_stays_quiet() {
    let base = BaseProvider::new(vec![mainnet()]).expect("base provider");
    base.emit(ProviderEventKind::ChainChanged, json!("0x1")).expect("announce");
    base.update(ProviderStatePatch::chain_id(ChainIdState::Chain("0x1".to_owned())))
        .expect("update");

    let events = base.drain_events().expect("drain");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ProviderEventKind::ChainChanged);
}

#[test]
fn event_journal_is_sequenced_and_drained() {
    let base = BaseProvider::new(vec![]).expect("base provider");
    base.emit(ProviderEventKind::Connect, json!({"chainId": "0x1"})).expect("connect");
    base.emit(ProviderEventKind::AccountsChanged, json!([])).expect("accounts");

    let events = base.drain_events().expect("drain");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].sequence + 1, events[1].sequence);
    assert!(base.drain_events().expect("drain again").is_empty());
}

#[test]
fn listeners_can_be_removed() {
    let base = BaseProvider::new(vec![]).expect("base provider");
    let count = Arc::new(Mutex::new(0u32));
    let sink = Arc::clone(&count);
    let id = base
        .on_any(Arc::new(move |_: &ProviderEvent| {
            *sink.lock().expect("count") += 1
        }))
        .expect("register");
    base.emit(ProviderEventKind::Disconnect, json!({"code": 4900})).expect("emit");
    assert!(base.off(id).expect("off"));
    base.emit(ProviderEventKind::Disconnect, json!({"code": 4900})).expect("emit");
    assert_eq!(*count.lock().expect("count"), 1);
}

#[tokio::test]
async fn request_raw_wraps_errors_and_echoes_id() {
    let base = BaseProvider::new(vec![]).expect("base provider");
    let resp = base
        .request_raw(JsonRpcRequest::new("eth_accounts", json!([])).with_id(7))
        .await;
    assert_eq!(resp.id, json!(7));
    assert_eq!(resp.error.as_ref().map(|e| e["code"].clone()), Some(json!(4900)));

    base.update_provider_engine_proxy(Engine::new()).expect("install empty engine");
    let resp = base
        .request_raw(JsonRpcRequest::new("eth_accounts", json!([])).with_id("abc"))
        .await;
    assert_eq!(resp.id, json!("abc"));
    assert_eq!(resp.error.as_ref().map(|e| e["code"].clone()), Some(json!(-32601)));
}

#[test]
fn status_follows_transitions() {
    let base = BaseProvider::new(vec![]).expect("base provider");
    assert_eq!(base.status().expect("status"), ProviderStatus::Uninitialized);
    base.transition(ProviderAction::SetupComplete).expect("setup");
    base.transition(ProviderAction::BeginSwitch).expect("switch");
    assert_eq!(base.status().expect("status"), ProviderStatus::Switching);
    base.transition(ProviderAction::SwitchRolledBack).expect("rollback");
    assert_eq!(base.status().expect("status"), ProviderStatus::Connected);
}
