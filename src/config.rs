use std::env;

use anyhow::Context;

/// Longest session a login may hold: one year.
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the clinic REST API. Nothing works without it.
    pub api_link: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub api_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_link = env::var("API_LINK").context("API_LINK must point at the clinic API")?;
        if api_link.trim().is_empty() {
            anyhow::bail!("API_LINK is empty");
        }
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let session_ttl_hours = session_ttl_hours(env::var("SESSION_TTL_HOURS").ok().as_deref())?;
        let api_timeout_secs = env::var("API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(10);

        Ok(Self {
            api_link,
            bind_addr,
            session_ttl_hours,
            api_timeout_secs,
        })
    }
}

fn session_ttl_hours(raw: Option<&str>) -> anyhow::Result<i64> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(24);
    };
    let hours: i64 = raw
        .parse()
        .with_context(|| format!("SESSION_TTL_HOURS is not a number: {raw}"))?;
    if !(1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
        anyhow::bail!("SESSION_TTL_HOURS must be between 1 and {MAX_SESSION_TTL_HOURS}, got {hours}");
    }
    Ok(hours)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ttl_defaults_and_bounds() {
        assert_eq!(session_ttl_hours(None).unwrap(), 24);
        assert_eq!(session_ttl_hours(Some(" ")).unwrap(), 24);
        assert_eq!(session_ttl_hours(Some("8")).unwrap(), 8);
        assert_eq!(session_ttl_hours(Some("8760")).unwrap(), 8760);

        for bad in ["0", "-3", "1000000000", "a day"] {
            assert!(session_ttl_hours(Some(bad)).is_err(), "{bad}");
        }
    }
}
