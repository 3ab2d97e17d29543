use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use reqwest::Url;

use crate::store::StoreOptions;

/// Where the service lives and where local state is kept.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Base URL of the transaction service
    #[arg(long, env = "BUDGETMATE_API", default_value = "http://localhost:5000/")]
    pub api: Url,
    /// File holding the session and the monthly budgets
    #[arg(long, env = "BUDGETMATE_STATE", default_value = "budgetmate.json")]
    pub state: PathBuf,
    /// Seconds to wait for the service before giving up
    #[arg(long, env = "BUDGETMATE_TIMEOUT", default_value_t = 10)]
    pub timeout_secs: u64,
}

impl Settings {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use clap::Parser;

    #[derive(Parser)]
    struct Opts {
        #[command(flatten)]
        settings: Settings,
    }

    #[test]
    fn test_settings_from_flags() -> Result<()> {
        let opts = Opts::try_parse_from([
            "budgetmate",
            "--api",
            "http://budget.local:8080/",
            "--state",
            "/tmp/state.json",
            "--timeout-secs",
            "3",
        ])?;
        assert_eq!(opts.settings.api.as_str(), "http://budget.local:8080/");
        assert_eq!(opts.settings.state, PathBuf::from("/tmp/state.json"));
        assert_eq!(opts.settings.store_options().timeout, Duration::from_secs(3));
        Ok(())
    }
}
