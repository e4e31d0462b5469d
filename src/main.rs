//! linkflash - build flags and firmware upload for radio-link devices
//!
//! Two independent stages of a firmware build:
//!
//! - **build-flags**: merges layered flag source files, applies `!-D`
//!   removal directives, injects the build identity and prints the final
//!   compiler defines
//! - **upload**: puts a compiled image on a device over UART, through an
//!   EdgeTX radio in passthrough mode, or copies it to an output location

mod cli;
mod commands;
mod config;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{BuildFlagsOptions, UploadOptions};
use config::ProjectConfig;
use linkflash_core::banner;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let config = match ProjectConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let _ = banner::fatal(e.to_string());
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::BuildFlags {
            sources,
            flags,
            target,
            platform,
            metadata_out,
            repo,
        } => {
            let build = config.build;
            let opts = BuildFlagsOptions {
                sources: if sources.is_empty() {
                    build.sources
                } else {
                    sources
                },
                base_flags: build.flags.into_iter().chain(flags).collect(),
                target: target.or(build.target),
                platform: platform.or(build.platform),
                metadata_out: metadata_out.or(build.metadata_out),
                repo,
            };
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = commands::run_build_flags(&opts, &mut stdout) {
                log::error!("{}", e);
                std::process::exit(1);
            }
        }
        Commands::Upload {
            firmware,
            port,
            platform,
            mcu,
            baud,
            erase,
            output,
            method,
            esptool,
            non_interactive,
        } => {
            let upload = config.upload;
            let opts = UploadOptions {
                firmware,
                port: port.or(upload.port),
                platform: platform.or(upload.platform),
                mcu: mcu.or(upload.mcu),
                baud: baud.or(upload.baud),
                erase,
                output,
                method: method.or(upload.method),
                esptool: esptool.or(upload.esptool),
                non_interactive,
            };
            match commands::run_upload(&opts) {
                Ok(outcome) if outcome.is_success() => {}
                Ok(_) => std::process::exit(1),
                Err(e) => {
                    log::error!("{}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
