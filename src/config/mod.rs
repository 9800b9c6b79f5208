mod params;
mod types;

pub use params::{first_usable_address, RunParams};
pub use types::PkiConfig;
