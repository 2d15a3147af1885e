use crate::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Uninitialized,
    Connected,
    Switching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderAction {
    SetupComplete,
    BeginSwitch,
    SwitchFailed,
    SwitchRolledBack,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: ProviderStatus,
    pub to: ProviderStatus,
    pub reason: &'static str,
}

pub fn provider_transition(
    from: ProviderStatus,
    action: ProviderAction,
) -> Result<(ProviderStatus, StateTransition), ProviderError> {
    use ProviderAction as A;
    use ProviderStatus as S;

    let (to, reason) = match (from, action) {
        (S::Uninitialized, A::SetupComplete) => (S::Connected, "provider connected"),
        (S::Connected, A::SetupComplete) => (S::Connected, "provider re-initialized"),
        (S::Switching, A::SetupComplete) => (S::Connected, "chain switch completed"),
        (S::Uninitialized | S::Connected | S::Switching, A::BeginSwitch) => {
            (S::Switching, "chain switch started")
        }
        (S::Switching, A::SwitchFailed) => (S::Switching, "chain switch failed; loading kept"),
        (S::Switching, A::SwitchRolledBack) => (S::Connected, "chain switch rolled back"),
        (_, A::Disconnect) => (S::Uninitialized, "provider disconnected"),
        _ => {
            return Err(ProviderError::Internal(format!(
                "illegal provider transition: {from:?} + {action:?}"
            )))
        }
    };

    Ok((to, StateTransition { from, to, reason }))
}
