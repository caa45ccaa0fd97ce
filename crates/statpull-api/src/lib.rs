// statpull-api: Async clients for Google Analytics and Yandex Metrika/Direct

pub mod auth;
pub mod dates;
pub mod error;
pub mod ga;
pub mod normalize;
pub mod transport;
pub mod yandex;

pub use auth::{AppCredentials, CredentialHolder, TokenBundle, TokenEndpoint};
pub use error::{Error, ErrorKind};
pub use ga::{AnalyticsClient, DayResult, GaEndpoints, V3Query, V4Request, split_outcomes};
pub use normalize::{FieldNames, Origin, Row};
pub use transport::{TlsMode, TransportConfig};
pub use yandex::{
    CallbackParams, MetrikaQuery, WordstatJob, WordstatStatus, YandexClient, YandexEndpoints,
};
