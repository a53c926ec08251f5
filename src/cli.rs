//! Command-line interface definitions for Alert Digest.
//!
//! Secrets can be given as flags but are normally taken from the environment.

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the Alert Digest application.
///
/// # Examples
///
/// ```sh
/// # Summarize every exported alert in ./inbox and mail the result
/// LLM_API_KEY=... SMTP_PASSWORD=... alert_digest -i ./inbox
///
/// # Produce the spreadsheet only
/// alert_digest -i ./inbox -c config.yaml -o /tmp/digest --no-notify
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory of exported alert emails (`.eml`, or bare `.html` bodies)
    #[arg(short, long)]
    pub inbox: PathBuf,

    /// Path to config.yaml
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Output directory for the spreadsheet (overrides the config file)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Only read emails dated on or after this day, YYYY-MM-DD (overrides the config file)
    #[arg(long)]
    pub since: Option<NaiveDate>,

    /// Only read emails dated on or before this day, YYYY-MM-DD (overrides the config file)
    #[arg(long)]
    pub until: Option<NaiveDate>,

    /// API key for the chat completions endpoint
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// Password for the SMTP account in the config file
    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Write the spreadsheet but do not send any mail
    #[arg(long)]
    pub no_notify: bool,
}
