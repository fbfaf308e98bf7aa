use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::time::Duration;

const PORT: u16 = 8080;

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
    /// The address to listen on
    #[arg(long, env = "RESERVATIONS_HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// The port to listen on
    #[arg(short, long, env = "RESERVATIONS_PORT", default_value_t = PORT)]
    pub port: u16,

    /// Delay between two greetings of the same stream, in milliseconds
    #[arg(long, env = "RESERVATIONS_GREETING_INTERVAL_MS", default_value_t = 1000)]
    pub greeting_interval_ms: u64,

    /// Do not reseed the reservation store on startup
    #[arg(long, env = "RESERVATIONS_NO_SEED")]
    pub no_seed: bool,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn greeting_interval(&self) -> Duration {
        Duration::from_millis(self.greeting_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse_from(["reservations"]);

        assert_eq!(config.addr(), "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.greeting_interval(), Duration::from_secs(1));
        assert!(!config.no_seed);
    }

    #[test]
    fn flags() {
        let config = Config::parse_from([
            "reservations",
            "--host",
            "0.0.0.0",
            "-p",
            "9000",
            "--greeting-interval-ms",
            "250",
            "--no-seed",
        ]);

        assert_eq!(config.addr(), "0.0.0.0:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.greeting_interval(), Duration::from_millis(250));
        assert!(config.no_seed);
    }
}
