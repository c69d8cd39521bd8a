//! Command-line surface for `navigation_cli` (spec.md §6 "CLI").

use clap::Parser;

/// Run one task (`-t`), a batch of tasks from a CSV (`-f`), or list every
/// recorded task and exit (`--list_recorded_tasks`). Exactly one of these
/// modes is selected; `main` rejects any other combination.
#[derive(Debug, Parser)]
#[command(name = "navigation_cli", about = "Drives a web navigation agent against a goal")]
pub struct Cli {
    /// Path to the TOML config file. Defaults to `config.toml` in the
    /// current directory.
    #[arg(long, env = "NAV_CONFIG", default_value = "config.toml")]
    pub config: String,

    /// Task goal for a single run.
    #[arg(short = 't', long = "task")]
    pub task: Option<String>,

    /// Starting URL for a single run.
    #[arg(short = 'u', long = "url")]
    pub url: Option<String>,

    /// Site name for a single run; also selects stored credentials.
    #[arg(short = 'n', long = "site", default_value = "default")]
    pub site: String,

    /// LLM provider id to use; defaults to the first configured provider.
    #[arg(short = 'l', long = "model")]
    pub model: Option<String>,

    /// Skip data masking for this run (masking is on by default).
    #[arg(short = 's', long = "skip-mask")]
    pub skip_mask: bool,

    /// Allow more than one action per model turn.
    #[arg(short = 'm', long = "multi-action")]
    pub multi_action: bool,

    /// Record this run, or replay it if a matching recording exists.
    #[arg(short = 'R', long = "record")]
    pub record: bool,

    /// Parameterize the task before looking up a recording.
    #[arg(short = 'p', long = "parameterize")]
    pub parameterize: bool,

    /// Send a screenshot to the model alongside the distilled page text.
    #[arg(short = 'S', long = "screenshot")]
    pub send_screenshot: bool,

    /// Save a screenshot of every turn to the downloads folder.
    #[arg(short = 'w', long = "save-screenshot")]
    pub save_screenshot: bool,

    /// Drive the system browser instead of a managed headless instance.
    #[arg(short = 'b', long = "system-browser")]
    pub system_browser: bool,

    /// Username to store/use for this task's site.
    #[arg(short = 'U', long = "username")]
    pub username: Option<String>,

    /// Password to store/use for this task's site.
    #[arg(short = 'P', long = "password")]
    pub password: Option<String>,

    /// Attach to an already-running browser over this CDP endpoint
    /// instead of launching one.
    #[arg(short = 'a', long = "attach")]
    pub attach: Option<String>,

    /// CSV file of tasks to run concurrently (batch mode).
    #[arg(short = 'f', long = "file")]
    pub batch_file: Option<String>,

    /// Maximum number of batch tasks to run concurrently.
    #[arg(short = 'c', long = "concurrency", default_value_t = 10)]
    pub concurrency: usize,

    /// Print every stored recording as JSON and exit.
    #[arg(long = "list_recorded_tasks")]
    pub list_recorded_tasks: bool,
}

/// One row of a batch CSV file (spec.md §6 "Batch" columns).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BatchRow {
    #[serde(default)]
    pub run: Option<String>,
    pub task_goal: String,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub enable_data_masking: Option<bool>,
    #[serde(default)]
    pub multi_action_per_turn: Option<bool>,
    #[serde(default)]
    pub record_and_replay: Option<bool>,
    #[serde(default)]
    pub rr_use_parameterization: Option<bool>,
    #[serde(default)]
    pub use_screenshot: Option<bool>,
    #[serde(default)]
    pub save_screenshot: Option<bool>,
}

impl BatchRow {
    /// Builds the `RunOptions` this row asks for, layered over the
    /// defaults (spec.md §6: unset CSV columns fall back to `RunOptions`
    /// defaults rather than `false`).
    pub fn run_options(&self) -> nav_domain::task::RunOptions {
        let defaults = nav_domain::task::RunOptions::default();
        nav_domain::task::RunOptions {
            mask_data: self.enable_data_masking.unwrap_or(defaults.mask_data),
            multi_action_per_turn: self.multi_action_per_turn.unwrap_or(defaults.multi_action_per_turn),
            record_and_replay: self.record_and_replay.unwrap_or(defaults.record_and_replay),
            parameterize_replay: self.rr_use_parameterization.unwrap_or(defaults.parameterize_replay),
            send_screenshot: self.use_screenshot.unwrap_or(defaults.send_screenshot),
            save_screenshot: self.save_screenshot.unwrap_or(defaults.save_screenshot),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_single_task_flags() {
        let cli = Cli::parse_from([
            "navigation_cli",
            "-t",
            "Search for Macbook Pro",
            "-u",
            "acme.test",
            "-n",
            "Acme",
            "-s",
            "-R",
        ]);
        assert_eq!(cli.task.as_deref(), Some("Search for Macbook Pro"));
        assert_eq!(cli.url.as_deref(), Some("acme.test"));
        assert_eq!(cli.site, "Acme");
        assert!(cli.skip_mask);
        assert!(cli.record);
        assert!(!cli.multi_action);
    }

    #[test]
    fn cli_parses_batch_flags() {
        let cli = Cli::parse_from(["navigation_cli", "-f", "tasks.csv", "-c", "4"]);
        assert_eq!(cli.batch_file.as_deref(), Some("tasks.csv"));
        assert_eq!(cli.concurrency, 4);
    }

    #[test]
    fn batch_row_falls_back_to_run_options_defaults() {
        let row = BatchRow {
            run: None,
            task_goal: "go".into(),
            site_name: None,
            url: None,
            username: None,
            password: None,
            enable_data_masking: None,
            multi_action_per_turn: None,
            record_and_replay: Some(true),
            rr_use_parameterization: None,
            use_screenshot: None,
            save_screenshot: None,
        };
        let opts = row.run_options();
        assert!(opts.mask_data);
        assert!(opts.record_and_replay);
        assert!(!opts.parameterize_replay);
    }
}
