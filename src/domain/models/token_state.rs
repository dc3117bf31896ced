use serde::Serialize;

/// `Active` is the only non-terminal state; nothing leaves a terminal state.
/// A revoked login token is stored as one whose expiry was pulled back, so it
/// surfaces as `Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenState {
    Active,
    Expired,
    Used,
}
