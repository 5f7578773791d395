use clap::{Parser, Subcommand};
use std::io::{stdout, Write};

use crate::api::types::ListExperimentsQuery;
use crate::client::{ApiClient, DEFAULT_BASE_URL};
use crate::domain::{Experiment, ExperimentStatus, JsonMap};
use crate::error::{Result, TrackerError};

#[derive(Parser)]
#[command(name = "exptrack")]
#[command(version = "0.1.0")]
#[command(about = "Experiment tracking service and client", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// API server base URL for client commands
    #[arg(short, long, default_value = DEFAULT_BASE_URL, env = "EXPTRACK_URL")]
    pub url: String,

    /// Config directory for the serve command
    #[arg(short, long, default_value = "config")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the experiment tracking API server
    Serve,
    /// List tracked experiments
    List {
        /// Filter by status (running, completed, failed)
        #[arg(short, long)]
        status: Option<String>,
        /// Filter by the user who logged the run
        #[arg(short = 'U', long)]
        user: Option<String>,
        /// Number of experiments to skip
        #[arg(long, default_value = "0")]
        skip: i64,
        /// Maximum number of experiments to show
        #[arg(short, long, default_value = "10")]
        limit: i64,
    },
    /// Show a single experiment in full
    Show {
        /// Experiment ID
        id: i32,
    },
    /// Compare experiments side by side
    Compare {
        /// Experiment IDs to compare
        #[arg(required = true)]
        ids: Vec<i32>,
    },
    /// Delete an experiment
    Delete {
        /// Experiment ID
        id: i32,
    },
    /// Check API server health
    Health,
}

/// List experiments with optional filters
pub async fn list_experiments(
    client: &ApiClient,
    status: Option<&str>,
    user: Option<&str>,
    skip: i64,
    limit: i64,
) -> Result<()> {
    let status = match status {
        Some(s) => Some(ExperimentStatus::try_from(s).map_err(TrackerError::Validation)?),
        None => None,
    };

    let query = ListExperimentsQuery {
        skip: Some(skip),
        limit: Some(limit),
        status,
        user: user.map(str::to_string),
    };

    match client.list_experiments(&query).await {
        Ok(experiments) => {
            if experiments.is_empty() {
                println!("  No experiments found.");
            } else {
                println!("  Found {} experiments:\n", experiments.len());
                for exp in &experiments {
                    println!(
                        "  {:>4}. {} [{}{}\x1b[0m]",
                        exp.id,
                        exp.name,
                        status_color(exp.status),
                        exp.status
                    );
                    println!(
                        "        User: {}  Created: {}",
                        exp.user.as_deref().unwrap_or("-"),
                        exp.created_at.format("%Y-%m-%d %H:%M:%S")
                    );
                    if !exp.metrics.is_empty() {
                        println!("        Metrics: {}", format_map_preview(&exp.metrics));
                    }
                    println!();
                }
            }
        }
        Err(e) => {
            println!("\x1b[31mError:\x1b[0m {}", e);
        }
    }

    Ok(())
}

/// Show full details for one experiment
pub async fn show_experiment(client: &ApiClient, id: i32) -> Result<()> {
    match client.get_experiment(id).await {
        Ok(exp) => {
            println!("\x1b[36m╔{}╗\x1b[0m", "═".repeat(63));
            println!(
                "\x1b[36m║  Experiment #{:<48} ║\x1b[0m",
                format!("{} - {}", exp.id, truncate(&exp.name, 40))
            );
            println!("\x1b[36m╚{}╝\x1b[0m\n", "═".repeat(63));

            println!(
                "  Status:   {}{}\x1b[0m",
                status_color(exp.status),
                exp.status
            );
            println!("  User:     {}", exp.user.as_deref().unwrap_or("-"));
            println!("  Branch:   {}", exp.git_branch.as_deref().unwrap_or("-"));
            println!("  Commit:   {}", exp.git_commit.as_deref().unwrap_or("-"));
            println!(
                "  Dataset:  {}",
                exp.dataset_version.as_deref().unwrap_or("-")
            );
            println!("  Created:  {}", exp.created_at.format("%Y-%m-%d %H:%M:%S"));
            println!("  Updated:  {}", exp.updated_at.format("%Y-%m-%d %H:%M:%S"));
            if let Some(desc) = &exp.description {
                println!("  About:    {}", desc);
            }

            print_map_section("Params", &exp.params);
            print_map_section("Metrics", &exp.metrics);
            print_map_section("Artifacts", &exp.artifacts);
        }
        Err(e) => {
            println!("\x1b[31mError:\x1b[0m {}", e);
        }
    }

    println!();
    Ok(())
}

/// Compare experiments in a side-by-side table
pub async fn compare_experiments(client: &ApiClient, ids: &[i32]) -> Result<()> {
    println!("Comparing experiments: {:?}\n", ids);

    match client.compare_experiments(ids).await {
        Ok(result) => {
            let experiments = &result.experiments;
            let width = 16 + 15 * experiments.len();

            // Header: ids then names
            print!("  {:<14}", "");
            for exp in experiments {
                print!(" {:>14}", format!("#{}", exp.id));
            }
            println!();
            print!("  {:<14}", "");
            for exp in experiments {
                print!(" {:>14}", truncate(&exp.name, 14));
            }
            println!();
            println!("  {}", "─".repeat(width));

            print!("  {:<14}", "status");
            for exp in experiments {
                print!(" {}{:>14}\x1b[0m", status_color(exp.status), exp.status);
            }
            println!();

            println!("\n  \x1b[33mParams:\x1b[0m");
            if result.comparison.params_keys.is_empty() {
                println!("    (none)");
            } else {
                for key in &result.comparison.params_keys {
                    print_comparison_row(key, experiments, |exp| &exp.params);
                }
            }

            println!("\n  \x1b[33mMetrics:\x1b[0m");
            if result.comparison.metrics_keys.is_empty() {
                println!("    (none)");
            } else {
                for key in &result.comparison.metrics_keys {
                    print_comparison_row(key, experiments, |exp| &exp.metrics);
                }
            }

            println!(
                "\n  {} experiments, {} params, {} metrics compared",
                result.comparison.count,
                result.comparison.params_keys.len(),
                result.comparison.metrics_keys.len()
            );
        }
        Err(e) => {
            println!("\x1b[31mError:\x1b[0m {}", e);
        }
    }

    println!();
    Ok(())
}

/// Delete an experiment by ID
pub async fn delete_experiment(client: &ApiClient, id: i32) -> Result<()> {
    match client.delete_experiment(id).await {
        Ok(resp) => {
            println!("\x1b[32m✓\x1b[0m Deleted experiment #{}", resp.id);
        }
        Err(e) => {
            println!("\x1b[31mError:\x1b[0m {}", e);
        }
    }

    Ok(())
}

/// Check that the API server is reachable
pub async fn check_health(client: &ApiClient) -> Result<()> {
    print!("  Checking {} ... ", client.base_url());
    stdout().flush()?;

    match client.health().await {
        Ok(health) => {
            println!("\x1b[32mOK\x1b[0m (status: {})", health.status);
        }
        Err(e) => {
            println!("\x1b[31mFAILED\x1b[0m");
            println!("    Error: {}", e);
        }
    }

    println!();
    Ok(())
}

fn status_color(status: ExperimentStatus) -> &'static str {
    match status {
        ExperimentStatus::Running => "\x1b[33m",
        ExperimentStatus::Completed => "\x1b[32m",
        ExperimentStatus::Failed => "\x1b[31m",
    }
}

fn print_map_section(title: &str, map: &JsonMap) {
    println!("\n  \x1b[33m{}:\x1b[0m", title);
    if map.is_empty() {
        println!("    (none)");
    } else {
        for (key, value) in map {
            println!("    {}: {}", key, display_value(value));
        }
    }
}

fn print_comparison_row<'a, F>(key: &str, experiments: &'a [Experiment], map_of: F)
where
    F: Fn(&'a Experiment) -> &'a JsonMap,
{
    print!("  {:<14}", truncate(key, 14));
    for exp in experiments {
        let cell = map_of(exp)
            .get(key)
            .map(display_value)
            .unwrap_or_else(|| "-".to_string());
        print!(" {:>14}", truncate(&cell, 14));
    }
    println!();
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_map_preview(map: &JsonMap) -> String {
    let mut parts: Vec<String> = map
        .iter()
        .take(4)
        .map(|(k, v)| format!("{}={}", k, display_value(v)))
        .collect();

    if map.len() > 4 {
        parts.push("...".to_string());
    }

    parts.join(", ")
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
