//! Shared application state.

use std::sync::Arc;

use crate::usecase::RelayUseCase;

/// Shared application state
pub struct AppState {
    /// RelayUseCase（イベント中継のユースケース）
    pub relay: Arc<RelayUseCase>,
}
