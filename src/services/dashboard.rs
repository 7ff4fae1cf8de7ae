use super::financial::FinancialService;
use crate::cancel::CancelToken;
use crate::error::{ApiError, DashboardError};
use crate::http::ApiClient;
use crate::notify::Toast;
use crate::types::Dashboard;
use time::OffsetDateTime;
use tracing::{debug, info};

const RECENT_TRANSACTIONS_LIMIT: u32 = 20;
const DEFAULT_CURRENCY: &str = "USD";

pub const MSG_TOKEN_REQUIRED: &str = "An access token is required for authentication.";

fn now_iso() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Loads the overview screen: five independent panels fetched at once.
#[derive(Clone)]
pub struct DashboardService {
    api: ApiClient,
    financial: FinancialService,
}

impl DashboardService {
    pub fn new(api: ApiClient) -> Self {
        Self {
            financial: FinancialService::new(api.clone()),
            api,
        }
    }

    /// Refuses to load without a stored access token, toasting the reason.
    pub fn require_session(&self) -> Result<(), DashboardError> {
        if self.api.session().has_session() {
            Ok(())
        } else {
            self.api.notify(Toast::error(MSG_TOKEN_REQUIRED));
            Err(DashboardError::Unauthenticated)
        }
    }

    fn settle<T>(&self, panel: &str, result: Result<T, ApiError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(ApiError::Cancelled) => None,
            Err(err) => {
                debug!(panel, error = %err, "dashboard panel failed");
                self.api.notify(Toast::error(format!("Failed to load {panel}")));
                None
            }
        }
    }

    /// A failing panel comes back as `None` with its own toast; the other
    /// panels are unaffected. When `cancel` fires every pending panel
    /// resolves quietly to `None`.
    pub async fn load(&self, cancel: Option<&CancelToken>) -> Result<Dashboard, DashboardError> {
        self.require_session()?;

        let (summary, working_capital, recent, scheduled, wallet) = tokio::join!(
            self.financial.summary(cancel),
            self.financial.working_capital(cancel),
            self.financial
                .recent_transactions(RECENT_TRANSACTIONS_LIMIT, None, cancel),
            self.financial.scheduled_transfers(cancel),
            self.financial.wallet(cancel),
        );

        let summary = self.settle("financial summary", summary);
        let working_capital = self.settle("working capital", working_capital);
        let recent_transactions = self.settle("recent transactions", recent);
        let scheduled_transfers = self.settle("scheduled transfers", scheduled);
        let wallet = self.settle("wallet", wallet);

        let currency = summary
            .as_ref()
            .map(|s| s.currency.clone())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        info!(
            summary = summary.is_some(),
            working_capital = working_capital.is_some(),
            recent_transactions = recent_transactions.is_some(),
            scheduled_transfers = scheduled_transfers.is_some(),
            wallet = wallet.is_some(),
            "dashboard loaded"
        );

        Ok(Dashboard {
            summary,
            working_capital,
            recent_transactions,
            scheduled_transfers,
            wallet,
            currency,
            loaded_at: now_iso(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelSource;
    use crate::http::client_testing::client_with;
    use crate::http::transport_testing::{path_of, respond, ScriptedTransport};
    use crate::notify::ToastLevel;
    use crate::services::financial::{SUMMARY_PATH, WALLET_PATH};
    use crate::session::TokenPair;
    use serde_json::json;
    use std::time::Duration;

    fn signed_in(client: &ApiClient) {
        client.session().store_tokens(&TokenPair {
            access_token: "a".into(),
            refresh_token: None,
        });
    }

    #[tokio::test]
    async fn no_token_means_no_requests() {
        let transport = ScriptedTransport::new(|_| respond(200, json!({})));
        let (client, notifier) = client_with(&transport);

        let err = DashboardService::new(client).load(None).await.unwrap_err();

        assert!(matches!(err, DashboardError::Unauthenticated));
        assert!(transport.sent().is_empty());
        assert_eq!(notifier.toasts(), vec![Toast::error(MSG_TOKEN_REQUIRED)]);
    }

    #[tokio::test]
    async fn loads_all_panels() {
        let transport = ScriptedTransport::new(|req| match path_of(req) {
            SUMMARY_PATH => respond(200, json!({ "data": { "totalBalance": { "amount": 10, "currency": "EUR" } } })),
            _ => respond(200, json!({ "data": {} })),
        });
        let (client, notifier) = client_with(&transport);
        signed_in(&client);

        let dashboard = DashboardService::new(client).load(None).await.unwrap();

        assert_eq!(transport.sent().len(), 5);
        assert_eq!(dashboard.currency, "EUR");
        assert_eq!(dashboard.totals().balance, 10.0);
        assert_eq!(dashboard.recent_transactions, Some(vec![]));
        assert_eq!(dashboard.wallet.map(|w| w.cards.len()), Some(0));
        assert!(dashboard.loaded_at.contains('T'));
        assert!(notifier.toasts().is_empty());
        assert!(transport
            .sent()
            .iter()
            .any(|r| r.url.ends_with("/financial/transactions/recent?limit=20")));
    }

    #[tokio::test]
    async fn failing_panel_is_isolated() {
        let transport = ScriptedTransport::new(|req| match path_of(req) {
            WALLET_PATH => respond(500, json!({ "message": "wallet service down" })),
            _ => respond(200, json!({})),
        });
        let (client, notifier) = client_with(&transport);
        signed_in(&client);

        let dashboard = DashboardService::new(client).load(None).await.unwrap();

        assert!(dashboard.wallet.is_none());
        assert!(dashboard.summary.is_some());
        assert_eq!(dashboard.currency, "USD");
        let messages: Vec<String> = notifier
            .toasts()
            .into_iter()
            .filter(|t| t.level == ToastLevel::Error)
            .map(|t| t.message)
            .collect();
        assert_eq!(
            messages,
            vec!["wallet service down".to_string(), "Failed to load wallet".to_string()]
        );
    }

    #[tokio::test]
    async fn cancelled_load_is_silent() {
        let transport = ScriptedTransport::new(|_| respond(500, json!({})))
            .with_delay(Duration::from_secs(5));
        let (client, notifier) = client_with(&transport);
        signed_in(&client);
        let source = CancelSource::new();
        let token = source.token();

        let service = DashboardService::new(client);
        let pending = tokio::spawn(async move { service.load(Some(&token)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        source.cancel();

        let dashboard = pending.await.unwrap().unwrap();
        assert!(dashboard.summary.is_none());
        assert!(dashboard.wallet.is_none());
        assert!(notifier.toasts().is_empty());
    }
}
