use super::CertManager;
use crate::config::PkiConfig;
use crate::types::Args;
use crate::utils::logging::{ConsoleLogger, FileLogger, Logger, MultiLogger};
use chrono::Utc;
use std::io;

fn load_or_create_config(path: &str, logger: &mut dyn Logger) -> io::Result<PkiConfig> {
    match PkiConfig::load_from_file(path) {
        Ok(config) => Ok(config),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let config = PkiConfig::default();
            config.save_to_file(path)?;
            logger.log(&format!("No configuration found, wrote defaults to {}", path));
            Ok(config)
        }
        Err(e) => Err(io::Error::new(
            e.kind(),
            format!("Failed to load configuration from {}: {}", path, e),
        )),
    }
}

fn build_logger(config: &PkiConfig, debug: bool) -> io::Result<MultiLogger> {
    let mut logger = MultiLogger::new().with(Box::new(ConsoleLogger::new(debug)));
    if let Some(log_file) = &config.log_file {
        let log_file = shellexpand::tilde(log_file).to_string();
        logger = logger.with(Box::new(FileLogger::new(&log_file, debug)?));
    }
    Ok(logger)
}

pub fn run_app(args: &Args) -> io::Result<()> {
    let mut console = ConsoleLogger::new(args.debug);
    let mut config = load_or_create_config(&args.config, &mut console)?;
    if let Some(data_dir) = &args.data_dir {
        config.data_dir = data_dir.clone();
    }
    config.validate()?;

    let logger = build_logger(&config, args.debug)?;
    let mut cert_manager = CertManager::new(config, args.debug, Box::new(logger));
    let now = Utc::now();

    if args.check {
        let due = cert_manager.check_at(now)?;
        if due.is_empty() {
            println!("No certificates are due for regeneration");
        }
        for entry in &due {
            println!("{}\t{}", entry.path, entry.reason);
        }
    } else {
        let report = cert_manager.initialize_at(now)?;
        for outcome in &report.regeneration.outcomes {
            println!("{}", outcome);
        }
        println!(
            "{} certificates ready, {} bundles written",
            report.certificates,
            report.bundles.len()
        );
    }

    if args.status {
        for row in cert_manager.certificate_status(now)? {
            println!(
                "{:<70} {:<8} {:<11} {} ({} days){}{}",
                row.path.to_string(),
                row.cert_type.to_string(),
                row.lifetime.to_string(),
                row.not_after.format("%Y-%m-%d"),
                row.days_remaining,
                if row.rotation_exempt { " exempt" } else { "" },
                row.due.map(|reason| format!(" due: {}", reason)).unwrap_or_default(),
            );
        }
    }
    Ok(())
}
