mod manager;
mod run;

pub use manager::{CertManager, CertStatus, StartupReport};
pub use run::run_app;
