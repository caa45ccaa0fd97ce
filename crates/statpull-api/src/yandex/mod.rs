pub mod client;
pub mod direct;
pub mod metrika;
pub mod oauth;
pub mod wordstat;

pub use client::{ProtoResponse, Service, YandexClient, YandexEndpoints};
pub use metrika::{Counter, CounterPaging, DEFAULT_DIMENSIONS, METRIKA_PAGE_SIZE, MetrikaQuery};
pub use oauth::CallbackParams;
pub use wordstat::{WordstatJob, WordstatReportInfo, WordstatStatus};
