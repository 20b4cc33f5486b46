// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `loadspin validate` command - Validate configuration file.

use loadspin_core::config::RepoKind;
use loadspin_core::ConfigLoader;

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Controller:");
            println!("  Region:             {}", config.region);
            println!("  Scaling Mode:       {}", config.mode.name());
            println!("  Listen Address:     {}", config.listen_addr);
            println!("  Ring Capacity:      {}", config.controller.ring_capacity);
            println!(
                "  Score Interval:     {}ms",
                config.controller.score_interval.as_millis()
            );
            println!();
            println!("Workers:");
            println!("  Rate:               {}/s", config.worker.rate_per_second);
            println!(
                "  Request Timeout:    {}ms",
                config.worker.request_timeout.as_millis()
            );
            println!("  Working Set:        {} ids", config.repo.working_set_size);
            println!();
            println!("Regions:");
            println!("  eu -> {}", config.regions.eu);
            println!("  us -> {}", config.regions.us);
            println!("  ap -> {}", config.regions.ap);
            println!();
            match &config.repo.kind {
                RepoKind::Postgres {
                    max_connections,
                    region_scoped,
                    ..
                } => println!(
                    "Repository: postgres (max connections: {}, region scoped: {})",
                    max_connections, region_scoped
                ),
                RepoKind::Memory(memory) => println!(
                    "Repository: memory ({} accounts, {}ms latency, {} desired workers)",
                    memory.accounts,
                    memory.latency.as_millis(),
                    memory.desired_workers
                ),
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
