//! Data layer: remote providers, the Parquet series store, and the
//! supplier that decides between them and merges fetches.

pub mod circuit_breaker;
pub mod eastmoney;
pub mod provider;
pub mod store;
pub mod supplier;
pub mod synthetic;

pub use circuit_breaker::{CircuitBreaker, ProviderOutcome};
pub use eastmoney::EastmoneyProvider;
pub use provider::{DataError, DownloadProgress, QuoteProvider, StdoutProgress};
pub use store::{SeriesStore, StoreMeta, StoreStatus};
pub use supplier::{DataSupplier, FetchMode, SupplierConfig};
pub use synthetic::SyntheticProvider;
