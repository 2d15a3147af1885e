pub mod config;
pub mod ethereum;
pub mod formatter;
pub mod network;
pub mod signing;
pub mod transport;

pub use config::ProviderConfig;
pub use ethereum::EthereumSigningProvider;
pub use formatter::EthTransactionFormatter;
pub use network::NetworkMiddleware;
pub use signing::SigningMiddleware;
pub use transport::{HttpTransport, HttpTransportFactory, TransportFactory};
