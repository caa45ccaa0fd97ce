//! Command handlers: bridge CLI args -> API clients -> output formatting.

pub mod ga;
pub mod util;
pub mod yandex;
