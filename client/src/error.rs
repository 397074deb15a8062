use courier_common::order::OrderError;
use courier_common::wallet::WalletError;
use courier_common::wire::WireError;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Failures surfaced by the sync engine.
#[derive(Debug)]
pub enum ClientError {
    /// Transport-level failure: connect, timeout, TLS.
    Http(reqwest::Error),
    /// Filesystem failure while persisting or restoring the session.
    Io(std::io::Error),
    /// Server answered with a non-success status.
    Api { status: u16, body: String },
    /// Payload did not match the documented shape.
    Decode(String),
    /// Configuration value could not be parsed.
    Config(String),
    /// Operation requires an authenticated session and none exists.
    NotAuthenticated,
    /// Operation references an order the current snapshot does not hold.
    UnknownOrder(String),
    /// Order-side validation rejection.
    Order(OrderError),
    /// Wallet-side rejection.
    Wallet(WalletError),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "http: {e}"),
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Api { status, body } => write!(f, "api rejected request ({status}): {body}"),
            Self::Decode(msg) => write!(f, "decode: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::NotAuthenticated => write!(f, "no authenticated session"),
            Self::UnknownOrder(id) => write!(f, "unknown order {id}"),
            Self::Order(e) => write!(f, "{e}"),
            Self::Wallet(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<OrderError> for ClientError {
    fn from(e: OrderError) -> Self {
        Self::Order(e)
    }
}

impl From<WalletError> for ClientError {
    fn from(e: WalletError) -> Self {
        Self::Wallet(e)
    }
}

impl From<WireError> for ClientError {
    fn from(e: WireError) -> Self {
        Self::Decode(e.to_string())
    }
}
