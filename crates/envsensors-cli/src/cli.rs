use clap::Parser;
use envsensors_core::SimulationMode;
use envsensors_core::constants::{DEFAULT_HOST, DEFAULT_MOCK_READ_INTERVAL_MS, DEFAULT_PORT};

#[derive(Parser, Debug)]
#[command(name = "envsensors")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Host name or address to listen on
    #[arg(long, env = "ESS_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// TCP port to listen on
    #[arg(short, long, env = "ESS_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Replace every configured device with a mock sensor (0 or 1)
    #[arg(short, long, env = "ESS_SIMULATION_MODE", default_value = "0")]
    pub simulation_mode: SimulationMode,

    /// Delay between two mock sensor lines in milliseconds
    #[arg(long, default_value_t = DEFAULT_MOCK_READ_INTERVAL_MS)]
    pub mock_read_interval_ms: u64,

    /// Enable debug logging
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_simulation_mode_flag() {
        let cli = Cli::try_parse_from(["envsensors", "--simulation-mode", "1", "--port", "6000"]).unwrap();
        assert_eq!(cli.simulation_mode, SimulationMode::On);
        assert_eq!(cli.port, 6000);
    }

    #[test]
    fn test_invalid_simulation_mode() {
        let result = Cli::try_parse_from(["envsensors", "--simulation-mode", "2"]);
        assert!(result.is_err());
    }
}
