// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # npu-rt
//!
//! Command-line interface for the npu-exec-rt inference engine.
//!
//! ## Usage
//! ```bash
//! # Run a configured workload
//! npu-rt run --config ./session.toml
//!
//! # Run with overrides
//! npu-rt run --config ./session.toml --executors 4 --tasks 100
//!
//! # Show which backends this build can use
//! npu-rt status
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "npu-rt",
    about = "Multi-backend model inference execution engine",
    version
)]
struct Cli {
    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a configured inference workload.
    Run {
        /// Path to a TOML session configuration file.
        #[arg(short, long)]
        config: std::path::PathBuf,

        /// Override the configured executor count.
        #[arg(short, long)]
        executors: Option<usize>,

        /// Override the configured task count.
        #[arg(short, long)]
        tasks: Option<usize>,

        /// Override the configured device list with one device name.
        #[arg(short, long)]
        device: Option<String>,

        /// Print each task's decoded outputs.
        #[arg(long)]
        print_outputs: bool,
    },

    /// Display the backends available in this build.
    Status,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            config,
            executors,
            tasks,
            device,
            print_outputs,
        } => commands::run::execute(config, executors, tasks, device, print_outputs),
        Commands::Status => commands::status::execute(),
    }
}
