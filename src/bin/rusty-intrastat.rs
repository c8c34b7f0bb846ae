//! rusty-intrastat CLI - Intrastat data preparation
//!
//! ## Example Usage
//!
//! ```bash
//! # Dense SEK/USD rate table for 2022
//! rusty-intrastat fx --start 2022-01-01 --end 2022-12-31 -C SEK -C USD -o rates.csv
//!
//! # Pivot a local observation file
//! rusty-intrastat pivot observations.csv
//!
//! # Build a declaration from a shipment export
//! rusty-intrastat declare shipments.csv -o declaration.csv
//!
//! # Check VAT numbers and commodity codes
//! rusty-intrastat vies ATU25700701 FI15601431
//! rusty-intrastat commodity check 46012110 61041990
//!
//! # Current VAT rates for one member state
//! rusty-intrastat vat-rates SE
//! ```

use anyhow::{bail, Context};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rusty_intrastat::commodity::{self, CommodityCodeTable, TariffClient};
use rusty_intrastat::config::AppConfig;
use rusty_intrastat::country::{CountriesClient, CountryLookup};
use rusty_intrastat::declaration::{
    build_declaration, check_codes_against_table, declared_codes, partner_vat_numbers,
    read_shipments_csv, write_declaration_csv, DeclarationLine,
};
use rusty_intrastat::fx::{
    self, build_dense_table, parse_date_arg, read_observations_csv, EcbClient, RateTable,
    RateWindow,
};
use rusty_intrastat::population;
use rusty_intrastat::vatr;
use rusty_intrastat::storage::{BucketConnector, FileFormat, LocalObjectStore};
use rusty_intrastat::vies::{self, ViesClient};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

/// rusty-intrastat: Intrastat declaration data preparation
#[derive(Parser)]
#[command(name = "rusty-intrastat")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Intrastat declaration data preparation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dense daily ECB rate table
    Fx {
        /// Start date (YYYY-MM-DD), default one year before the end date
        #[arg(short = 's', long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD), default today
        #[arg(short = 'e', long)]
        end: Option<String>,

        /// Currencies to keep (default: all)
        #[arg(short = 'C', long = "currency")]
        currencies: Vec<String>,

        /// Read the feed from a local XML file instead of downloading it
        #[arg(short = 'i', long)]
        input: Option<PathBuf>,

        /// Output CSV file (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Pivot a Date,Currency,Rate CSV into the dense daily table
    Pivot {
        #[arg(value_name = "OBSERVATIONS")]
        input: PathBuf,

        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Commodity code utilities
    Commodity {
        #[command(subcommand)]
        action: CommodityAction,
    },

    /// Validate VAT numbers through VIES
    Vies {
        #[arg(value_name = "VAT_NUMBER", required = true)]
        numbers: Vec<String>,

        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Translate countries to Intrastat ISO-2 codes
    Country {
        #[arg(value_name = "VALUE", required = true)]
        values: Vec<String>,

        /// What the values are
        #[arg(short = 'k', long, value_enum, default_value = "name")]
        kind: CountryKind,

        /// Read the country list from a local JSON file
        #[arg(long)]
        countries_json: Option<PathBuf>,
    },

    /// Build an Intrastat declaration from a shipment CSV
    Declare {
        #[arg(value_name = "SHIPMENTS")]
        input: PathBuf,

        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Reporting currency (default from config)
        #[arg(long)]
        currency: Option<String>,

        /// Read ECB rates from a local XML file
        #[arg(long)]
        rates_xml: Option<PathBuf>,

        /// Read the country list from a local JSON file
        #[arg(long)]
        countries_json: Option<PathBuf>,

        /// Check commodity codes against a lookup table CSV
        #[arg(long)]
        code_table: Option<PathBuf>,

        /// Validate partner VAT numbers through VIES
        #[arg(long)]
        check_vat: bool,

        /// Look commodity codes up in the trade tariff API
        #[arg(long)]
        check_codes: bool,
    },

    /// Copy a table between buckets of the local object store
    Etl {
        #[arg(long)]
        source_bucket: String,

        #[arg(long)]
        source_key: String,

        #[arg(long)]
        target_bucket: String,

        #[arg(long)]
        target_key: String,

        /// Source field delimiter
        #[arg(long, default_value = ",")]
        delimiter: char,

        /// Target format (csv, parquet)
        #[arg(long, default_value = "csv")]
        format: String,
    },

    /// Current EU VAT rates
    VatRates {
        /// Alpha-2 code or member state name (default: all)
        #[arg(value_name = "COUNTRY")]
        country: Option<String>,

        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Export US population by year
    Population {
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CommodityAction {
    /// Print codes in 8-digit query form
    Normalize {
        #[arg(value_name = "CODE", required = true)]
        codes: Vec<String>,
    },

    /// Turn a raw code list CSV into the CN8 lookup table
    Table {
        #[arg(value_name = "CODES_CSV")]
        input: PathBuf,

        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Look codes up in the trade tariff API
    Check {
        #[arg(value_name = "CODE", required = true)]
        codes: Vec<String>,

        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CountryKind {
    Name,
    Alpha2,
    Alpha3,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            process::exit(1);
        }
    };

    if cli.verbose {
        eprintln!(
            "{} v{}",
            "rusty-intrastat".cyan().bold(),
            env!("CARGO_PKG_VERSION")
        );
    }

    let result = match cli.command {
        Commands::Fx {
            start,
            end,
            currencies,
            input,
            output,
        } => run_fx(&config, start, end, currencies, input, output).await,
        Commands::Pivot { input, output } => run_pivot(&input, output.as_deref()),
        Commands::Commodity { action } => run_commodity(&config, action).await,
        Commands::Vies { numbers, output } => run_vies(&config, numbers, output).await,
        Commands::Country {
            values,
            kind,
            countries_json,
        } => run_country(&config, values, kind, countries_json).await,
        Commands::Declare {
            input,
            output,
            currency,
            rates_xml,
            countries_json,
            code_table,
            check_vat,
            check_codes,
        } => {
            run_declare(
                &config,
                DeclareArgs {
                    input,
                    output,
                    currency,
                    rates_xml,
                    countries_json,
                    code_table,
                    check_vat,
                    check_codes,
                },
            )
            .await
        }
        Commands::Etl {
            source_bucket,
            source_key,
            target_bucket,
            target_key,
            delimiter,
            format,
        } => run_etl(
            &config,
            EtlArgs {
                source_bucket,
                source_key,
                target_bucket,
                target_key,
                delimiter,
                format,
            },
        ),
        Commands::VatRates { country, output } => run_vat_rates(&config, country, output).await,
        Commands::Population { output } => run_population(&config, output).await,
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

struct DeclareArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    currency: Option<String>,
    rates_xml: Option<PathBuf>,
    countries_json: Option<PathBuf>,
    code_table: Option<PathBuf>,
    check_vat: bool,
    check_codes: bool,
}

struct EtlArgs {
    source_bucket: String,
    source_key: String,
    target_bucket: String,
    target_key: String,
    delimiter: char,
    format: String,
}

/// File output or stdout
fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(io::stdout())),
    }
}

fn report_written(path: Option<&Path>, what: &str, count: usize) {
    if let Some(path) = path {
        println!(
            "{} {} {} written to {}",
            "✓".green().bold(),
            count,
            what,
            path.display()
        );
    }
}

fn progress_bar(message: &'static str) -> anyhow::Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    bar.set_message(message);
    Ok(bar)
}

async fn tariff_checks(
    config: &AppConfig,
    codes: &[String],
) -> anyhow::Result<Vec<commodity::CommodityCheck>> {
    let client = TariffClient::new(&config.http, config.endpoints.tariff_url.as_str())?;
    let bar = progress_bar("commodity codes")?;
    let checks = client
        .check_codes(codes, |done, total| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
        })
        .await?;
    bar.finish_and_clear();
    Ok(checks)
}

async fn vies_checks(config: &AppConfig, numbers: &[String]) -> anyhow::Result<Vec<vies::VatCheck>> {
    let client = ViesClient::new(&config.http, config.endpoints.vies_url.as_str())?;
    let bar = progress_bar("VAT numbers")?;
    let checks = client
        .check_all(numbers, |done, total| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
        })
        .await?;
    bar.finish_and_clear();
    Ok(checks)
}

fn parse_window(start: Option<String>, end: Option<String>) -> anyhow::Result<RateWindow> {
    let start = start.as_deref().map(parse_date_arg).transpose()?;
    let end = end.as_deref().map(parse_date_arg).transpose()?;
    Ok(RateWindow::resolve(
        start,
        end,
        Local::now().date_naive(),
    )?)
}

async fn load_rates(config: &AppConfig, input: Option<&Path>) -> anyhow::Result<RateTable> {
    let observations = match input {
        Some(path) => {
            let xml = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            fx::parse_ecb_xml(&xml)?
        }
        None => {
            EcbClient::new(&config.http, config.endpoints.ecb_url.as_str())?
                .fetch_observations()
                .await?
        }
    };
    Ok(build_dense_table(&observations)?)
}

async fn load_countries(config: &AppConfig, input: Option<&Path>) -> anyhow::Result<CountryLookup> {
    let lookup = match input {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            CountryLookup::from_json(&json)?
        }
        None => {
            CountriesClient::new(&config.http, config.endpoints.countries_url.as_str())?
                .fetch_lookup()
                .await?
        }
    };
    Ok(lookup)
}

async fn run_fx(
    config: &AppConfig,
    start: Option<String>,
    end: Option<String>,
    currencies: Vec<String>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let window = parse_window(start, end)?;
    let table = window.apply(&load_rates(config, input.as_deref()).await?);
    let table = if currencies.is_empty() {
        table
    } else {
        let wanted: Vec<&str> = currencies.iter().map(String::as_str).collect();
        table.select(&wanted)?
    };

    table.write_csv(open_output(output.as_deref())?)?;
    report_written(output.as_deref(), "days of rates", table.len());
    Ok(())
}

fn run_pivot(input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let file = File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let observations = read_observations_csv(file)?;
    let table = build_dense_table(&observations)?;
    table.write_csv(open_output(output)?)?;
    report_written(output, "days of rates", table.len());
    Ok(())
}

async fn run_commodity(config: &AppConfig, action: CommodityAction) -> anyhow::Result<()> {
    match action {
        CommodityAction::Normalize { codes } => {
            for code in codes {
                println!("{}", commodity::normalize_query_code(&code));
            }
        }
        CommodityAction::Table { input, output } => {
            let file =
                File::open(&input).with_context(|| format!("Failed to open {}", input.display()))?;
            let table = CommodityCodeTable::read_csv(file)?;
            table.write_csv(open_output(output.as_deref())?)?;
            report_written(output.as_deref(), "commodity codes", table.len());
        }
        CommodityAction::Check { codes, output } => {
            let checks = tariff_checks(config, &codes).await?;
            commodity::write_checks_csv(&checks, open_output(output.as_deref())?)?;
            report_written(output.as_deref(), "commodity checks", checks.len());
        }
    }
    Ok(())
}

async fn run_vies(
    config: &AppConfig,
    numbers: Vec<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let checks = vies_checks(config, &numbers).await?;
    vies::write_checks_csv(&checks, open_output(output.as_deref())?)?;
    report_written(output.as_deref(), "VAT checks", checks.len());
    Ok(())
}

async fn run_country(
    config: &AppConfig,
    values: Vec<String>,
    kind: CountryKind,
    countries_json: Option<PathBuf>,
) -> anyhow::Result<()> {
    let lookup = load_countries(config, countries_json.as_deref()).await?;
    for value in values {
        let code = match kind {
            CountryKind::Name => lookup.country_to_iso2(&value),
            CountryKind::Alpha2 => lookup.alpha2_to_iso2(&value),
            CountryKind::Alpha3 => lookup.alpha3_to_iso2(&value),
        };
        match code {
            Some(code) => println!("{}\t{}", value, code),
            None => println!("{}\t{}", value, "unknown".yellow()),
        }
    }
    Ok(())
}

async fn run_declare(config: &AppConfig, args: DeclareArgs) -> anyhow::Result<()> {
    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let shipments = read_shipments_csv(file)?;

    let mut settings = config.declaration.clone();
    if let Some(currency) = args.currency {
        settings.currency = currency.trim().to_uppercase();
    }

    let rates = load_rates(config, args.rates_xml.as_deref()).await?;
    let countries = load_countries(config, args.countries_json.as_deref()).await?;
    let lines = build_declaration(&shipments, &countries, &rates, &settings)?;

    if let Some(path) = args.code_table {
        let file =
            File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
        let table = CommodityCodeTable::read_csv(file)?;
        for (code, status) in check_codes_against_table(&lines, &table) {
            if status == commodity::CodeStatus::Error {
                eprintln!("{} commodity code {} not in lookup table", "Warning:".yellow(), code);
            }
        }
    }

    if args.check_vat {
        report_vies(config, &lines, &settings.b2c_vat_placeholder).await?;
    }
    if args.check_codes {
        report_tariff(config, &lines).await?;
    }

    write_declaration_csv(&lines, open_output(args.output.as_deref())?)?;
    report_written(args.output.as_deref(), "declaration lines", lines.len());
    Ok(())
}

async fn report_vies(
    config: &AppConfig,
    lines: &[DeclarationLine],
    placeholder: &str,
) -> anyhow::Result<()> {
    let numbers = partner_vat_numbers(lines, placeholder);
    let checks = vies_checks(config, &numbers).await?;
    for check in checks.iter().filter(|c| !c.valid) {
        eprintln!(
            "{} partner VAT {}: {}",
            "Warning:".yellow(),
            check.vat_number,
            check.description
        );
    }
    eprintln!(
        "{} of {} partner VAT numbers valid",
        checks.iter().filter(|c| c.valid).count(),
        checks.len()
    );
    Ok(())
}

async fn report_tariff(config: &AppConfig, lines: &[DeclarationLine]) -> anyhow::Result<()> {
    let checks = tariff_checks(config, &declared_codes(lines)).await?;
    for check in checks.iter().filter(|c| !c.valid) {
        eprintln!(
            "{} commodity code {}: {}",
            "Warning:".yellow(),
            check.cn8,
            check.description
        );
    }
    eprintln!(
        "{} of {} commodity codes known to the tariff service",
        checks.iter().filter(|c| c.valid).count(),
        checks.len()
    );
    Ok(())
}

fn run_etl(config: &AppConfig, args: EtlArgs) -> anyhow::Result<()> {
    if !args.delimiter.is_ascii() {
        bail!("Delimiter must be a single ASCII character");
    }
    let format: FileFormat = args.format.parse()?;

    let source = BucketConnector::new(LocalObjectStore::new(
        &config.storage.root,
        args.source_bucket.as_str(),
    )?);
    let target = BucketConnector::new(LocalObjectStore::new(
        &config.storage.root,
        args.target_bucket.as_str(),
    )?);

    log::info!("ETL job started");
    let table = source.read_csv(&args.source_key, args.delimiter as u8)?;
    if target.write_table(&table, &args.target_key, format)? {
        println!(
            "{} {} rows written to {}/{}",
            "✓".green().bold(),
            table.len(),
            args.target_bucket,
            args.target_key
        );
    }
    log::info!("ETL job finished");
    Ok(())
}

async fn run_vat_rates(
    config: &AppConfig,
    country: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let rates = vatr::fetch_vat_rates(&config.http, &config.endpoints.vat_rates_url).await?;
    let rates = vatr::filter_vat_rates(rates, country.as_deref().unwrap_or_default());
    vatr::write_vat_rates_csv(&rates, open_output(output.as_deref())?)?;
    report_written(output.as_deref(), "VAT rate rows", rates.len());
    Ok(())
}

async fn run_population(config: &AppConfig, output: Option<PathBuf>) -> anyhow::Result<()> {
    let records =
        population::fetch_population(&config.http, &config.endpoints.population_url).await?;
    population::write_population_csv(&records, open_output(output.as_deref())?)?;
    report_written(output.as_deref(), "population records", records.len());
    Ok(())
}
