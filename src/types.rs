use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the JSON configuration file, created with defaults if missing
    #[arg(short, long, default_value = "pki_config.json")]
    pub config: String,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Override the configured data directory
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Build or load the certificates and list what is due, without regenerating
    #[arg(long)]
    pub check: bool,

    /// Print the expiry of every certificate when done
    #[arg(long)]
    pub status: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_every_flag_has_help() {
        let command = Args::command();
        for arg in command.get_arguments() {
            let id = arg.get_id().as_str();
            if id == "help" || id == "version" {
                continue;
            }
            assert!(arg.get_help().is_some(), "--{} has no help text", id);
        }
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["controlplane-pki"]).unwrap();
        assert_eq!(args.config, "pki_config.json");
        assert!(!args.debug && !args.check && !args.status);
        assert!(args.data_dir.is_none());
    }
}
