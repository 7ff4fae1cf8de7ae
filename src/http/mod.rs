mod client;
pub mod messages;
mod request;
mod transport;

pub use client::ApiClient;
pub use request::{
    ApiRequest, HEADER_SUCCESS_MESSAGE, HEADER_SUPPRESS_ERROR_TOAST, HEADER_SUPPRESS_TOAST,
    REFRESH_TOKEN_PATH,
};
pub use transport::{ApiResponse, OutgoingRequest, ReqwestTransport, Transport};

#[cfg(test)]
pub(crate) use client::testing as client_testing;
#[cfg(test)]
pub(crate) use transport::testing as transport_testing;
