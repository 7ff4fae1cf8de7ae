use super::{payload, read_array, read_number, read_opt_string, read_string};
use crate::cancel::CancelToken;
use crate::error::ApiError;
use crate::http::{ApiClient, ApiRequest};
use crate::types::{
  FinancialSummary, RecentTransaction, ScheduledTransfer, SummaryTotals, Wallet, WalletCard,
  WorkingCapital, WorkingPoint,
};
use serde_json::Value;

const DEFAULT_CURRENCY: &str = "USD";

pub const SUMMARY_PATH: &str = "/financial/summary";
pub const WORKING_CAPITAL_PATH: &str = "/financial/working-capital";
pub const WALLET_PATH: &str = "/financial/wallet";
pub const RECENT_TRANSACTIONS_PATH: &str = "/financial/transactions/recent";
pub const SCHEDULED_TRANSFERS_PATH: &str = "/financial/transfers/scheduled";

fn parse_summary(body: &Value) -> FinancialSummary {
  let root = payload(body);
  let balance = root.get("totalBalance");
  let expense = root.get("totalExpense");
  let savings = root.get("totalSavings");

  let currency = [balance, expense, savings]
    .into_iter()
    .find_map(|section| read_opt_string(section.and_then(|s| s.get("currency"))))
    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

  FinancialSummary {
    totals: SummaryTotals {
      balance: read_number(balance.and_then(|s| s.get("amount"))),
      spending: read_number(expense.and_then(|s| s.get("amount"))),
      saved: read_number(savings.and_then(|s| s.get("amount"))),
    },
    currency,
  }
}

fn parse_working_capital(body: &Value) -> WorkingCapital {
  let root = payload(body);
  let points = read_array(root.get("data"))
    .iter()
    .map(|m| WorkingPoint {
      date: read_string(m.get("month")),
      income: read_number(m.get("income")),
      expenses: read_number(m.get("expense")),
    })
    .collect();

  WorkingCapital {
    points,
    currency: read_opt_string(root.get("currency")),
  }
}

/// Display form of a card number plus its last four digits. A number the
/// server already masked is shown untouched; otherwise digits are grouped by
/// four.
pub(crate) fn format_card_number(raw: &str) -> (String, String) {
  let has_mask = raw.contains(['*', '•']);
  let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
  let last4 = digits[digits.len().saturating_sub(4)..].to_string();

  let display = if has_mask && !raw.trim().is_empty() {
    raw.to_string()
  } else {
    digits
      .as_bytes()
      .chunks(4)
      .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
      .collect::<Vec<_>>()
      .join(" ")
  };
  (display, last4)
}

pub(crate) fn format_expiry(month: Option<&Value>, year: Option<&Value>) -> String {
  let month = read_number(month) as i64;
  let year = read_string(year);
  let year_suffix: String = {
    let chars: Vec<char> = year.chars().collect();
    chars[chars.len().saturating_sub(2)..].iter().collect()
  };
  format!("{month:02}/{year_suffix}")
}

fn parse_wallet(body: &Value) -> Wallet {
  let root = payload(body);
  let mut raw_cards: Vec<&Value> = read_array(root.get("cards")).iter().collect();
  // Stable: default card first, server order otherwise.
  raw_cards.sort_by_key(|c| c.get("isDefault") != Some(&Value::Bool(true)));

  let cards = raw_cards
    .into_iter()
    .map(|c| {
      let (masked, last4) = format_card_number(&read_string(c.get("cardNumber")));
      WalletCard {
        bank: read_string(c.get("bank")),
        last4,
        brand: read_string(c.get("network")),
        masked,
        exp: format_expiry(c.get("expiryMonth"), c.get("expiryYear")),
      }
    })
    .collect();

  Wallet { cards }
}

fn parse_transactions(body: &Value) -> Vec<RecentTransaction> {
  read_array(payload(body).get("transactions"))
    .iter()
    .map(|t| RecentTransaction {
      id: read_string(t.get("id")),
      name: read_string(t.get("name")),
      kind: read_string(t.get("type")),
      amount: read_number(t.get("amount")),
      date: read_string(t.get("date")),
    })
    .collect()
}

fn parse_scheduled_transfers(body: &Value) -> Vec<ScheduledTransfer> {
  read_array(payload(body).get("transfers"))
    .iter()
    .map(|t| ScheduledTransfer {
      id: read_string(t.get("id")),
      name: read_string(t.get("name")),
      date: read_string(t.get("date")),
      amount: read_number(t.get("amount")),
      currency: read_string(t.get("currency")),
    })
    .collect()
}

/// Read-only access to the financial endpoints, reshaped into view models.
#[derive(Clone)]
pub struct FinancialService {
  api: ApiClient,
}

impl FinancialService {
  pub fn new(api: ApiClient) -> Self {
    Self { api }
  }

  async fn get(&self, request: ApiRequest, cancel: Option<&CancelToken>) -> Result<Value, ApiError> {
    let response = self.api.send(request.with_cancel(cancel)).await?;
    Ok(response.body)
  }

  pub async fn summary(&self, cancel: Option<&CancelToken>) -> Result<FinancialSummary, ApiError> {
    let body = self.get(ApiRequest::get(SUMMARY_PATH), cancel).await?;
    Ok(parse_summary(&body))
  }

  pub async fn working_capital(
    &self,
    cancel: Option<&CancelToken>,
  ) -> Result<WorkingCapital, ApiError> {
    let body = self.get(ApiRequest::get(WORKING_CAPITAL_PATH), cancel).await?;
    Ok(parse_working_capital(&body))
  }

  pub async fn wallet(&self, cancel: Option<&CancelToken>) -> Result<Wallet, ApiError> {
    let body = self.get(ApiRequest::get(WALLET_PATH), cancel).await?;
    Ok(parse_wallet(&body))
  }

  pub async fn recent_transactions(
    &self,
    limit: u32,
    offset: Option<u32>,
    cancel: Option<&CancelToken>,
  ) -> Result<Vec<RecentTransaction>, ApiError> {
    let mut request = ApiRequest::get(RECENT_TRANSACTIONS_PATH).query("limit", limit);
    if let Some(offset) = offset {
      request = request.query("offset", offset);
    }
    let body = self.get(request, cancel).await?;
    Ok(parse_transactions(&body))
  }

  /// One page of the transactions list. Pages start at 1.
  pub async fn transactions_page(
    &self,
    page: u32,
    page_size: u32,
    cancel: Option<&CancelToken>,
  ) -> Result<Vec<RecentTransaction>, ApiError> {
    let offset = page.max(1).saturating_sub(1).saturating_mul(page_size);
    self.recent_transactions(page_size, Some(offset), cancel).await
  }

  pub async fn scheduled_transfers(
    &self,
    cancel: Option<&CancelToken>,
  ) -> Result<Vec<ScheduledTransfer>, ApiError> {
    let body = self.get(ApiRequest::get(SCHEDULED_TRANSFERS_PATH), cancel).await?;
    Ok(parse_scheduled_transfers(&body))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::http::client_testing::client_with;
  use crate::http::transport_testing::{respond, ScriptedTransport};
  use serde_json::json;

  #[test]
  fn summary_reads_totals_and_first_currency() {
    let body = json!({
      "success": true,
      "data": {
        "totalBalance": { "amount": 5240.21 },
        "totalExpense": { "amount": "250.8", "currency": "EUR" },
        "totalSavings": { "amount": 550.25, "currency": "TRY" }
      }
    });
    let summary = parse_summary(&body);
    assert_eq!(summary.currency, "EUR");
    assert_eq!(
      summary.totals,
      SummaryTotals {
        balance: 5240.21,
        spending: 250.8,
        saved: 550.25
      }
    );
  }

  #[test]
  fn summary_defaults_when_empty() {
    let summary = parse_summary(&json!({}));
    assert_eq!(summary.currency, "USD");
    assert_eq!(summary.totals, SummaryTotals::default());
  }

  #[test]
  fn working_capital_maps_months() {
    let body = json!({
      "data": {
        "currency": "USD",
        "data": [
          { "month": "2024-01", "income": 1200, "expense": 800 },
          { "month": "2024-02", "income": "900.5" }
        ]
      }
    });
    let wc = parse_working_capital(&body);
    assert_eq!(wc.currency.as_deref(), Some("USD"));
    assert_eq!(
      wc.points,
      vec![
        WorkingPoint {
          date: "2024-01".into(),
          income: 1200.0,
          expenses: 800.0
        },
        WorkingPoint {
          date: "2024-02".into(),
          income: 900.5,
          expenses: 0.0
        },
      ]
    );
  }

  #[test]
  fn card_number_formatting() {
    assert_eq!(
      format_card_number("5495762358592321"),
      ("5495 7623 5859 2321".to_string(), "2321".to_string())
    );
    assert_eq!(
      format_card_number("8595 2548 **** 8868"),
      ("8595 2548 **** 8868".to_string(), "8868".to_string())
    );
    assert_eq!(
      format_card_number("•••• 12"),
      ("•••• 12".to_string(), "12".to_string())
    );
    assert_eq!(format_card_number(""), (String::new(), String::new()));
  }

  #[test]
  fn expiry_is_zero_padded() {
    assert_eq!(format_expiry(Some(&json!(9)), Some(&json!(2025))), "09/25");
    assert_eq!(format_expiry(Some(&json!("12")), Some(&json!("27"))), "12/27");
    assert_eq!(format_expiry(None, None), "00/");
  }

  #[test]
  fn wallet_puts_default_card_first_and_keeps_order() {
    let body = json!({
      "data": {
        "cards": [
          { "bank": "A", "cardNumber": "1111222233334444", "network": "visa", "expiryMonth": 1, "expiryYear": 2026 },
          { "bank": "B", "cardNumber": "5555666677778888", "network": "mastercard", "expiryMonth": 2, "expiryYear": 2027 },
          { "bank": "C", "cardNumber": "9999000011112222", "network": "visa", "expiryMonth": 3, "expiryYear": 2028, "isDefault": true }
        ]
      }
    });
    let wallet = parse_wallet(&body);
    let banks: Vec<&str> = wallet.cards.iter().map(|c| c.bank.as_str()).collect();
    assert_eq!(banks, vec!["C", "A", "B"]);
    assert_eq!(
      wallet.cards[0],
      WalletCard {
        bank: "C".into(),
        last4: "2222".into(),
        brand: "visa".into(),
        masked: "9999 0000 1111 2222".into(),
        exp: "03/28".into(),
      }
    );
  }

  #[test]
  fn transactions_and_transfers_tolerate_missing_fields() {
    let body = json!({ "data": { "transactions": [{ "id": 7, "name": "Netflix", "type": "expense", "amount": -15.99, "date": "2024-03-01" }, {}] } });
    let txs = parse_transactions(&body);
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].id, "7");
    assert_eq!(txs[0].kind, "expense");
    assert_eq!(txs[0].amount, -15.99);
    assert_eq!(txs[1].name, "");

    let body = json!({ "transfers": [{ "id": "t1", "name": "Rent", "date": "2024-04-01", "amount": 1200, "currency": "USD" }] });
    let transfers = parse_scheduled_transfers(&body);
    assert_eq!(transfers[0].name, "Rent");
    assert_eq!(transfers[0].currency, "USD");
  }

  #[tokio::test]
  async fn transactions_page_sends_limit_and_offset() {
    let transport = ScriptedTransport::new(|_| respond(200, json!({ "data": { "transactions": [] } })));
    let (client, _) = client_with(&transport);
    let service = FinancialService::new(client);

    service.transactions_page(3, 15, None).await.unwrap();
    service.recent_transactions(20, None, None).await.unwrap();

    let sent = transport.sent();
    assert!(sent[0].url.ends_with("/financial/transactions/recent?limit=15&offset=30"));
    assert!(sent[1].url.ends_with("/financial/transactions/recent?limit=20"));
  }

  #[tokio::test]
  async fn failures_are_forwarded() {
    let transport = ScriptedTransport::new(|_| respond(503, json!({ "message": "maintenance" })));
    let (client, _) = client_with(&transport);
    let service = FinancialService::new(client);

    let err = service.wallet(None).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
  }
}
