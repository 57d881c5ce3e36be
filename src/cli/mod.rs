use std::fs::File;
use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use crate::api;
use crate::application::BalanceService;
use crate::config::{ServerConfig, StoreConfig};
use crate::domain::{HouseNumber, format_kwh, parse_kwh};
use crate::io::Exporter;

/// CenErg - prepaid house energy ledger
#[derive(Parser)]
#[command(name = "cenerg")]
#[command(about = "Per-house prepaid energy balances with an HTTP API for meters and operators")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreConfig,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database schema
    Init,

    /// Run the HTTP API
    Serve {
        #[command(flatten)]
        server: ServerConfig,
    },

    /// House provisioning commands
    #[command(subcommand)]
    House(HouseCommands),

    /// Recharge a house (same transaction as the HTTP recharge)
    Recharge {
        /// House number
        house_number: HouseNumber,

        /// Energy to add in kWh (e.g., "25.5")
        amount: String,
    },

    /// Export data to CSV or JSON
    Export {
        /// What to export: recharges, balances, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Format: csv, json (default: csv for recharges/balances, json for full)
        #[arg(short, long)]
        format: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum HouseCommands {
    /// Provision a new house
    Add {
        /// House number (must be unique)
        house_number: HouseNumber,

        /// Initial remaining energy in kWh
        #[arg(short, long, default_value = "0")]
        energy: String,
    },

    /// List all houses and their balances
    List,

    /// Show a house's balance and recharge history
    Show {
        /// House number
        house_number: HouseNumber,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                let service = BalanceService::init(&self.store).await?;
                service.close().await;
                println!("Database initialized: {}", self.store.database_url);
            }

            Commands::Serve { server } => {
                let service = BalanceService::init(&self.store).await?;
                api::serve(service, &server).await?;
            }

            Commands::House(house_cmd) => {
                let service = BalanceService::connect(&self.store).await?;
                run_house_command(&service, house_cmd).await?;
            }

            Commands::Recharge {
                house_number,
                amount,
            } => {
                let service = BalanceService::connect(&self.store).await?;
                let amount_wh =
                    parse_kwh(&amount).context("Invalid amount format. Use '25.5' or '10'")?;
                let receipt = service.apply_recharge(house_number, amount_wh).await?;
                println!(
                    "Recharged house {}: +{} kWh, remaining {} kWh",
                    receipt.house_number,
                    format_kwh(receipt.recharged_wh),
                    format_kwh(receipt.remaining_energy_wh)
                );
            }

            Commands::Export {
                export_type,
                output,
                format,
            } => {
                let service = BalanceService::connect(&self.store).await?;
                run_export_command(&service, &export_type, output, format).await?;
            }
        }

        Ok(())
    }
}

async fn run_house_command(service: &BalanceService, cmd: HouseCommands) -> Result<()> {
    match cmd {
        HouseCommands::Add {
            house_number,
            energy,
        } => {
            let energy_wh =
                parse_kwh(&energy).context("Invalid energy format. Use '50.0' or '50'")?;
            let house = service.create_house(house_number, energy_wh).await?;
            println!(
                "Created house {} with {} kWh",
                house.house_number,
                format_kwh(house.remaining_energy_wh)
            );
        }

        HouseCommands::List => {
            let houses = service.list_houses().await?;
            if houses.is_empty() {
                println!("No houses found.");
            } else {
                println!("{:<8} {:>14} {:<20}", "HOUSE", "ENERGY (kWh)", "LAST UPDATE");
                println!("{}", "-".repeat(46));
                for house in houses {
                    let flag = if house.is_depleted() { "  depleted" } else { "" };
                    println!(
                        "{:<8} {:>14} {:<20}{}",
                        house.house_number,
                        format_kwh(house.remaining_energy_wh),
                        house.last_update.format("%Y-%m-%d %H:%M:%S"),
                        flag
                    );
                }
            }
        }

        HouseCommands::Show { house_number } => {
            let info = service.get_house_info(house_number).await?;
            let house = &info.house;

            println!("House: {}", house.house_number);
            println!("  Remaining:   {} kWh", format_kwh(house.remaining_energy_wh));
            println!(
                "  Last update: {}",
                house.last_update.format("%Y-%m-%d %H:%M:%S")
            );
            println!(
                "  Created:     {}",
                house.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!();
            if info.recharges.is_empty() {
                println!("  No recharges.");
            } else {
                println!("  Recharges ({}):", info.recharges.len());
                for recharge in &info.recharges {
                    println!(
                        "    {}  +{:>10} kWh  {}",
                        recharge.created_at.format("%Y-%m-%d %H:%M:%S"),
                        format_kwh(recharge.amount_wh),
                        recharge.id
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_export_command(
    service: &BalanceService,
    export_type: &str,
    output: Option<String>,
    format: Option<String>,
) -> Result<()> {
    let writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create {}", path))?,
        ),
        None => Box::new(io::stdout()),
    };
    let exporter = Exporter::new(service);

    let default_format = if export_type == "full" { "json" } else { "csv" };
    let format = format.as_deref().unwrap_or(default_format);

    let count = match (export_type, format) {
        ("recharges", "csv") => exporter.export_recharges_csv(writer).await?,
        ("balances", "csv") => exporter.export_balances_csv(writer).await?,
        ("full", "json") => {
            let snapshot = exporter.export_full_json(writer).await?;
            snapshot.houses.len() + snapshot.recharges.len()
        }
        ("recharges" | "balances" | "full", _) => {
            bail!("Unsupported format '{}' for {} export", format, export_type)
        }
        _ => bail!(
            "Unknown export type '{}'. Valid types: recharges, balances, full",
            export_type
        ),
    };

    if let Some(path) = output {
        eprintln!("Exported {} records to {}", count, path);
    }
    Ok(())
}
