mod discover;

pub use discover::{analyze_certificate, CertificateInfo};
