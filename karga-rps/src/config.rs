use std::{fmt, num::NonZeroU64, time::Duration};

use clap::Parser;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method, Url,
};
use typed_builder::TypedBuilder;

use crate::{error::ConfigError, report::OutputFormat};

pub const DEFAULT_TARGET: &str = "https://www.google.com";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Relative slack added to `rate × duration` before flooring, a few ulps of
/// the product.
const ROUNDING_ULPS: f64 = 4.0 * f64::EPSILON;

/// Requests per second. Always finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Rate(f64);

impl Rate {
    pub fn new(per_second: f64) -> Result<Self, ConfigError> {
        if per_second.is_finite() && per_second > 0.0 {
            Ok(Self(per_second))
        } else {
            Err(ConfigError::InvalidRate(per_second))
        }
    }

    pub fn per_second(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Rate {
    type Error = ConfigError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a paced run needs, validated.
#[derive(Debug, Clone, TypedBuilder)]
pub struct LoadConfig {
    pub target: Url,

    #[builder(default = Method::GET)]
    pub method: Method,

    #[builder(default)]
    pub headers: HeaderMap,

    pub rate: Rate,

    pub duration_secs: NonZeroU64,

    /// Pacer bucket capacity. 1 means no burst on top of the steady rate.
    #[builder(default = 1)]
    pub burst: u32,

    #[builder(default = DEFAULT_CONNECT_TIMEOUT)]
    pub connect_timeout: Duration,

    /// Bound on a whole request, body included. Never zero.
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    pub request_timeout: Duration,

    /// Honor `HTTP_PROXY`/`HTTPS_PROXY` from the environment.
    #[builder(default = true)]
    pub system_proxy: bool,
}

impl LoadConfig {
    /// `floor(rate × duration)`, see [`total_requests`].
    pub fn total_requests(&self) -> u64 {
        total_requests(self.rate, self.duration_secs)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs.get())
    }
}

/// Number of requests a run at `rate` for `duration_secs` issues.
///
/// The product is floored after absorbing its own representation error, so
/// `0.29 × 100` (computed as `28.999999999999996`) yields 29, while a product
/// genuinely short of an integer such as `0.9999999999 × 3` still yields 2.
pub fn total_requests(rate: Rate, duration_secs: NonZeroU64) -> u64 {
    let product = rate.per_second() * duration_secs.get() as f64;
    (product * (1.0 + ROUNDING_ULPS)).floor() as u64
}

/// Parses `http`/`https` absolute urls with a host.
pub fn parse_target(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|err| ConfigError::InvalidTarget {
        url: raw.to_owned(),
        reason: err.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(ConfigError::UnsupportedScheme(other.to_owned())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidTarget {
            url: raw.to_owned(),
            reason: "missing host".to_owned(),
        });
    }

    Ok(url)
}

pub fn parse_method(raw: &str) -> Result<Method, ConfigError> {
    Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ConfigError::InvalidMethod(raw.to_owned()))
}

/// Parses a single `Name: value` header line.
pub fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), ConfigError> {
    let invalid = || ConfigError::InvalidHeader(raw.to_owned());

    let (name, value) = raw.split_once(':').ok_or_else(invalid)?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| invalid())?;
    let value = HeaderValue::from_str(value.trim()).map_err(|_| invalid())?;

    Ok((name, value))
}

/// Paced HTTP load generator.
///
/// Every option can also be set through the environment variable listed in
/// its help; a flag on the command line wins over the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "karga-rps", version, about)]
pub struct Cli {
    /// Absolute http(s) url every request is sent to
    #[arg(long, env = "TARGET_URL", default_value = DEFAULT_TARGET)]
    pub target: String,

    /// Requests per second, fractional rates are allowed
    #[arg(long, env = "REQUESTS_PER_SECOND", default_value_t = 1000.0)]
    pub rate: f64,

    /// Test duration in whole seconds
    #[arg(long, value_name = "SECONDS", env = "TEST_DURATION_SECONDS", default_value_t = 10)]
    pub duration: u64,

    /// HTTP method of every request
    #[arg(long, env = "REQUEST_METHOD", default_value = "GET")]
    pub method: String,

    /// Extra request header as `Name: value`, repeatable
    #[arg(long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Permits the pacer may hand out back to back
    #[arg(long, env = "PACER_BURST", default_value_t = 1)]
    pub burst: u32,

    /// Connect timeout of the shared client
    #[arg(long, env = "CONNECT_TIMEOUT", default_value = "5s", value_parser = humantime::parse_duration)]
    pub connect_timeout: Duration,

    /// Whole-request timeout of the shared client, must be above zero
    #[arg(long, env = "REQUEST_TIMEOUT", default_value = "30s", value_parser = humantime::parse_duration)]
    pub request_timeout: Duration,

    /// Connect to the target directly, ignoring proxy environment variables
    #[arg(long, default_value_t = false)]
    pub no_proxy: bool,

    /// Summary format written to stdout
    #[arg(long, env = "OUTPUT_FORMAT", value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,
}

impl Cli {
    pub fn load_config(&self) -> Result<LoadConfig, ConfigError> {
        let target = parse_target(&self.target)?;
        let method = parse_method(&self.method)?;
        let rate = Rate::new(self.rate)?;
        let duration_secs = NonZeroU64::new(self.duration).ok_or(ConfigError::ZeroDuration)?;

        let mut headers = HeaderMap::new();
        for raw in &self.headers {
            let (name, value) = parse_header(raw)?;
            headers.append(name, value);
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroRequestTimeout);
        }

        Ok(LoadConfig::builder()
            .target(target)
            .method(method)
            .headers(headers)
            .rate(rate)
            .duration_secs(duration_secs)
            .burst(self.burst.max(1))
            .connect_timeout(self.connect_timeout)
            .request_timeout(self.request_timeout)
            .system_proxy(!self.no_proxy)
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> NonZeroU64 {
        NonZeroU64::new(n).unwrap()
    }

    fn rate(r: f64) -> Rate {
        Rate::new(r).unwrap()
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("karga-rps").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn total_requests_is_rate_times_duration() {
        assert_eq!(total_requests(rate(1000.0), secs(10)), 10_000);
        assert_eq!(total_requests(rate(10.0), secs(2)), 20);
        assert_eq!(total_requests(rate(5.0), secs(1)), 5);
    }

    #[test]
    fn total_requests_floors_fractional_products() {
        assert_eq!(total_requests(rate(2.5), secs(3)), 7);
        assert_eq!(total_requests(rate(0.5), secs(3)), 1);
        assert_eq!(total_requests(rate(0.3), secs(1)), 0);
    }

    #[test]
    fn total_requests_absorbs_representation_error() {
        // 0.29 * 100 evaluates to 28.999999999999996
        assert_eq!(total_requests(rate(0.29), secs(100)), 29);
        assert_eq!(total_requests(rate(0.1), secs(30)), 3);
    }

    #[test]
    fn total_requests_never_rounds_a_real_shortfall_up() {
        assert_eq!(total_requests(rate(0.9999999999), secs(3)), 2);
        assert_eq!(total_requests(rate(999.9999), secs(10)), 9_999);
    }

    #[test]
    fn rate_rejects_non_positive_and_non_finite() {
        assert_eq!(Rate::new(0.0), Err(ConfigError::InvalidRate(0.0)));
        assert_eq!(Rate::new(-1.0), Err(ConfigError::InvalidRate(-1.0)));
        assert!(Rate::new(f64::NAN).is_err());
        assert!(Rate::new(f64::INFINITY).is_err());
        assert_eq!(Rate::try_from(0.25).unwrap().per_second(), 0.25);
    }

    #[test]
    fn target_must_be_absolute_http() {
        assert!(parse_target("http://localhost:3000/health").is_ok());
        assert!(parse_target("https://example.com").is_ok());
        assert!(matches!(
            parse_target("/relative/path"),
            Err(ConfigError::InvalidTarget { .. })
        ));
        assert_eq!(
            parse_target("ftp://example.com"),
            Err(ConfigError::UnsupportedScheme("ftp".to_owned()))
        );
    }

    #[test]
    fn header_lines_are_split_on_first_colon() {
        let (name, value) = parse_header("X-Trace-Id: abc:def").unwrap();
        assert_eq!(name.as_str(), "x-trace-id");
        assert_eq!(value, "abc:def");

        assert!(parse_header("no-colon").is_err());
        assert!(parse_header("bad name: v").is_err());
    }

    #[test]
    fn method_is_case_insensitive() {
        assert_eq!(parse_method("post").unwrap(), Method::POST);
        assert!(parse_method("GE T").is_err());
    }

    #[test]
    fn cli_defaults_produce_valid_config() {
        let cli = parse(&["--target", "http://127.0.0.1:8080"]);
        let config = cli.load_config().unwrap();

        assert_eq!(config.method, Method::GET);
        assert_eq!(config.rate.per_second(), 1000.0);
        assert_eq!(config.duration(), Duration::from_secs(10));
        assert_eq!(config.total_requests(), 10_000);
        assert_eq!(config.burst, 1);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(config.system_proxy);
        assert_eq!(cli.output, OutputFormat::Human);
    }

    #[test]
    fn cli_flags_override_defaults() {
        let cli = parse(&[
            "--target",
            "http://127.0.0.1:8080",
            "--rate",
            "2.5",
            "--duration",
            "4",
            "--method",
            "head",
            "--header",
            "Accept: text/plain",
            "--burst",
            "0",
            "--request-timeout",
            "2s",
            "--connect-timeout",
            "250ms",
            "--output",
            "json",
            "--no-proxy",
        ]);
        let config = cli.load_config().unwrap();

        assert_eq!(config.total_requests(), 10);
        assert_eq!(config.method, Method::HEAD);
        assert_eq!(config.headers["accept"], "text/plain");
        assert_eq!(config.burst, 1);
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert!(!config.system_proxy);
        assert_eq!(cli.output, OutputFormat::Json);
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        let zero_duration = parse(&["--target", "http://localhost", "--duration", "0"]);
        assert_eq!(
            zero_duration.load_config().unwrap_err(),
            ConfigError::ZeroDuration
        );

        let zero_rate = parse(&["--target", "http://localhost", "--rate", "0"]);
        assert_eq!(
            zero_rate.load_config().unwrap_err(),
            ConfigError::InvalidRate(0.0)
        );

        let unbounded = parse(&["--target", "http://localhost", "--request-timeout", "0s"]);
        assert_eq!(
            unbounded.load_config().unwrap_err(),
            ConfigError::ZeroRequestTimeout
        );

        let bad_target = parse(&["--target", "not a url"]);
        assert!(matches!(
            bad_target.load_config(),
            Err(ConfigError::InvalidTarget { .. })
        ));
    }
}
