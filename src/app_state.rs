//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::SaviumConfig;
use crate::domain::{EventBus, PreviewRegistry, SessionRegistry};
use crate::service::{
    AccountService, DepositIntentClient, DepositService, IdentityVerifier, TransactionLog,
    WithdrawalService,
};
use crate::store::DocumentStore;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Document store backing every service.
    pub store: Arc<dyn DocumentStore>,
    /// Account provisioning and observation.
    pub accounts: AccountService,
    /// Ledger history.
    pub transactions: TransactionLog,
    /// Withdrawal dialogs and commits.
    pub withdrawals: Arc<WithdrawalService>,
    /// Deposit intake.
    pub deposits: Arc<DepositService>,
    /// Bearer-token sessions.
    pub sessions: Arc<SessionRegistry>,
    /// Checks identity-provider ID tokens at sign-in.
    pub identity: Arc<dyn IdentityVerifier>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
    /// Loaded configuration.
    pub config: Arc<SaviumConfig>,
}

impl AppState {
    /// Wires every service over `store`.
    #[must_use]
    pub fn new(
        config: SaviumConfig,
        store: Arc<dyn DocumentStore>,
        deposit_client: Arc<dyn DepositIntentClient>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);
        let previews = Arc::new(PreviewRegistry::new());

        Self {
            accounts: AccountService::new(Arc::clone(&store)),
            transactions: TransactionLog::new(
                Arc::clone(&store),
                config.transactions_overfetch_factor,
            ),
            withdrawals: Arc::new(
                WithdrawalService::new(
                    Arc::clone(&store),
                    config.eligibility_policy(),
                    event_bus.clone(),
                    previews,
                )
                .with_document_limit(config.withdrawal_max_documents),
            ),
            deposits: Arc::new(DepositService::new(
                Arc::clone(&store),
                deposit_client,
                event_bus.clone(),
            )),
            sessions: Arc::new(SessionRegistry::new()),
            identity,
            event_bus,
            config: Arc::new(config),
            store,
        }
    }
}
