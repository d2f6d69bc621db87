/// Lifecycle misuse of a [crate::delivery_session::DeliverySession]. These are programming
///  errors on the caller's side, not runtime conditions: duplicates, late arrivals and cancels
///  for unknown ids are reported through ordinary return values instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session was already started")]
    AlreadyStarted,
    #[error("session is not active")]
    NotActive,
}
