pub mod narrative;
pub mod trend_api;

pub use narrative::NarrativeClient;
pub use trend_api::{TrendApiClient, TrendApiConfig};
