//! Agent configuration.

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use brahms_core::Params;
use brahms_http::DEFAULT_REQUEST_TIMEOUT;

use crate::error::{Error, Result};

/// Everything an [`Agent`](crate::Agent) needs to run.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Address to listen on and to advertise to peers. Required.
    pub listen_addr: Option<IpAddr>,

    /// Port to listen on; 0 picks a free one.
    pub listen_port: u16,

    /// Share of the view filled from pushes.
    pub alpha: f64,
    /// Share of the view filled from pulls.
    pub beta: f64,
    /// Share of the sample carried into each view.
    pub gamma: f64,
    /// View size.
    pub l1: usize,
    /// Sample size.
    pub l2: usize,

    /// Time between gossip rounds.
    pub update_interval: Duration,
    /// Time a gossip round may wait for peers.
    pub update_budget: Duration,

    /// Time between validation passes.
    pub validate_interval: Duration,
    /// Time a validation pass may wait for probes.
    pub validate_budget: Duration,

    /// Timeout of a single outbound HTTP request.
    pub request_timeout: Duration,

    /// Seed for the agent's randomness; random when unset.
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::local_test()
    }
}

impl AgentConfig {
    /// Loopback agent on a free port with small views and quick timers.
    pub fn local_test() -> Self {
        Self {
            listen_addr: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            listen_port: 0,
            alpha: 0.45,
            beta: 0.45,
            gamma: 0.1,
            l1: 10,
            l2: 10,
            update_interval: Duration::from_secs(1),
            update_budget: Duration::from_millis(500),
            validate_interval: Duration::from_secs(5),
            validate_budget: Duration::from_secs(1),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            seed: None,
        }
    }

    /// [`local_test`](Self::local_test) overlaid with `BRAHMS_*` environment variables.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `BRAHMS_LISTEN_ADDR` | `listen_addr` |
    /// | `BRAHMS_LISTEN_PORT` | `listen_port` |
    /// | `BRAHMS_ALPHA`, `BRAHMS_BETA`, `BRAHMS_GAMMA` | ratios |
    /// | `BRAHMS_L1`, `BRAHMS_L2` | view and sample size |
    /// | `BRAHMS_UPDATE_INTERVAL_MS`, `BRAHMS_UPDATE_BUDGET_MS` | gossip timer |
    /// | `BRAHMS_VALIDATE_INTERVAL_MS`, `BRAHMS_VALIDATE_BUDGET_MS` | validation timer |
    /// | `BRAHMS_REQUEST_TIMEOUT_MS` | `request_timeout` |
    /// | `BRAHMS_SEED` | `seed` |
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `var`.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::local_test();
        let get = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("BRAHMS_LISTEN_ADDR") {
            config.listen_addr = Some(parse_var("BRAHMS_LISTEN_ADDR", &v)?);
        }
        if let Some(v) = get("BRAHMS_LISTEN_PORT") {
            config.listen_port = parse_var("BRAHMS_LISTEN_PORT", &v)?;
        }
        if let Some(v) = get("BRAHMS_ALPHA") {
            config.alpha = parse_var("BRAHMS_ALPHA", &v)?;
        }
        if let Some(v) = get("BRAHMS_BETA") {
            config.beta = parse_var("BRAHMS_BETA", &v)?;
        }
        if let Some(v) = get("BRAHMS_GAMMA") {
            config.gamma = parse_var("BRAHMS_GAMMA", &v)?;
        }
        if let Some(v) = get("BRAHMS_L1") {
            config.l1 = parse_var("BRAHMS_L1", &v)?;
        }
        if let Some(v) = get("BRAHMS_L2") {
            config.l2 = parse_var("BRAHMS_L2", &v)?;
        }
        if let Some(v) = get("BRAHMS_UPDATE_INTERVAL_MS") {
            config.update_interval = parse_millis("BRAHMS_UPDATE_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("BRAHMS_UPDATE_BUDGET_MS") {
            config.update_budget = parse_millis("BRAHMS_UPDATE_BUDGET_MS", &v)?;
        }
        if let Some(v) = get("BRAHMS_VALIDATE_INTERVAL_MS") {
            config.validate_interval = parse_millis("BRAHMS_VALIDATE_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("BRAHMS_VALIDATE_BUDGET_MS") {
            config.validate_budget = parse_millis("BRAHMS_VALIDATE_BUDGET_MS", &v)?;
        }
        if let Some(v) = get("BRAHMS_REQUEST_TIMEOUT_MS") {
            config.request_timeout = parse_millis("BRAHMS_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("BRAHMS_SEED") {
            config.seed = Some(parse_var("BRAHMS_SEED", &v)?);
        }

        Ok(config)
    }

    /// Protocol parameters derived from the ratios and sizes.
    pub fn params(&self) -> Result<Params> {
        Params::new(self.alpha, self.beta, self.gamma, self.l1, self.l2)
            .map_err(|e| Error::invalid("params", e.to_string()))
    }

    /// Set the listen address.
    #[must_use]
    pub fn with_listen_addr(mut self, addr: impl Into<IpAddr>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set both timer intervals and budgets at once.
    #[must_use]
    pub fn with_timers(mut self, update: (Duration, Duration), validate: (Duration, Duration)) -> Self {
        (self.update_interval, self.update_budget) = update;
        (self.validate_interval, self.validate_budget) = validate;
        self
    }
}

fn parse_var<T: FromStr>(name: &'static str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::invalid("config", format!("{name}={value}: {e}")))
}

fn parse_millis(name: &'static str, value: &str) -> Result<Duration> {
    parse_var::<u64>(name, value).map(Duration::from_millis)
}
