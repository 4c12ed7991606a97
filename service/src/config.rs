use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_USER_AGENT: &str = concat!("sse_mux/", env!("CARGO_PKG_VERSION"));

/// A `--headers` entry that is not of the form `Name: value`.
#[derive(Debug, PartialEq, Eq)]
pub struct HeaderParseError {
    pub entry: String,
}

impl fmt::Display for HeaderParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid header entry {:?}, expected `Name: value`", self.entry)
    }
}

impl std::error::Error for HeaderParseError {}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full SSE endpoint URLs to subscribe to.
    #[arg(long, env, value_delimiter = ',', use_value_delimiter = true)]
    pub urls: Vec<String>,

    /// Extra request headers sent on every stream request, as `Name: value` pairs.
    #[arg(long, env, value_delimiter = ',', use_value_delimiter = true)]
    headers: Vec<String>,

    /// Milliseconds to wait after a transport error before reconnecting
    #[arg(long, env, default_value_t = DEFAULT_RECONNECT_DELAY_MS)]
    pub reconnect_delay_ms: u64,

    /// Timeout in seconds for establishing the connection of a stream request
    #[arg(long, env, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,

    /// User agent sent with every stream request
    #[arg(long, env, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Parses the configured header pairs. Later duplicates of a name win.
    pub fn headers(&self) -> Result<BTreeMap<String, String>, HeaderParseError> {
        self.headers
            .iter()
            .filter(|entry| !entry.trim().is_empty())
            .map(|entry| parse_header(entry))
            .collect()
    }
}

fn parse_header(entry: &str) -> Result<(String, String), HeaderParseError> {
    let invalid = || HeaderParseError {
        entry: entry.to_string(),
    };

    let (name, value) = entry.split_once(':').ok_or_else(invalid)?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(invalid());
    }

    Ok((name.to_string(), value.trim().to_string()))
}
