pub mod cancel;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod notify;
mod redact;
pub mod services;
pub mod session;
pub mod storage;
pub mod types;

pub use cancel::{CancelSource, CancelToken};
pub use config::{Config, SessionBackend};
pub use error::{ApiError, ConfigError, DashboardError, StorageError};
pub use http::{ApiClient, ApiRequest, ApiResponse};
pub use notify::{LogNotifier, Notifier, Toast, ToastChannel, ToastLevel};
pub use redact::redact_secrets;
pub use services::account::AccountService;
pub use services::dashboard::DashboardService;
pub use services::financial::FinancialService;
pub use session::{SessionStore, TokenPair};
