pub mod aggregate;
pub mod circuit_breaker;
pub mod directory;
pub mod export;
pub mod fdic;
pub mod financials;
pub mod fred;
pub mod macro_series;
pub mod normalize;
pub mod panel;
pub mod provider;
pub mod query;
pub mod schema;
pub mod throttle;
pub mod transport;

pub use aggregate::{aggregate, aggregate_with_stats, AggregationScope, AggregationStats};
pub use circuit_breaker::CircuitBreaker;
pub use directory::fetch_active_institutions;
pub use export::export_csv;
pub use fdic::FdicClient;
pub use financials::fetch_financials;
pub use fred::{load_api_key, FredClient};
pub use macro_series::{default_series, MacroMeta, MacroSeriesTable, SeriesSpec};
pub use normalize::{normalize, normalize_batch, NormalizeError, NormalizedBatch, RejectedRecord};
pub use panel::{
    quarterly_summary, read_panel, read_panel_rows, PanelError, PanelMeta, PanelWriter,
    QuarterSummary,
};
pub use provider::{
    DataError, Endpoint, FdicSource, FetchProgress, LogProgress, Observation, QueryPage,
    RawRecord, SeriesSource, SilentProgress,
};
pub use query::{FilterExpr, Query, SortOrder};
pub use schema::{FdicField, PanelSchema, SchemaError};
pub use throttle::RequestThrottle;
pub use transport::{HttpTransport, TransportSettings};
