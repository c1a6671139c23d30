use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use serde::Serialize;
use std::path::PathBuf;

use phytoscan_cli::extract::run_extract;
use phytoscan_cli::inference::inference;
use phytoscan_cli::inference::input::InferenceConfig;
use phytoscan_cli::train::input::TrainConfig;
use phytoscan_cli::train::trainer;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("PHYTOSCAN_LOG", "error,phytoscan=info"))
        .init();

    let matches = Command::new("phytoscan")
        .version(clap::crate_version!())
        .author("Justin Sing <justincsing@gmail.com>")
        .about("\u{1F33F} PhytoScan CLI - Leaf disease classification and soil estimation")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("train")
                .about("Train a model bundle from soil records and leaf images")
                .arg(
                    Arg::new("config")
                        .help("Path to training configuration file")
                        .required(false)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("soil_data")
                        .short('d')
                        .long("soil_data")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Path to soil records (*.csv or *.tsv). Overrides the soil data \
                             file specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("image_dir")
                        .short('i')
                        .long("image_dir")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Directory of leaf images named by the record keys. Overrides \
                             the image directory specified in the configuration file.",
                        )
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("model_dir")
                        .short('o')
                        .long("model_dir")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Directory the model bundle will be written to. \
                             Overrides the directory specified in the configuration file.",
                        )
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("report_file")
                        .long("report")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("File path of the HTML training report.")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("no_report")
                        .long("no-report")
                        .help("Disable HTML report generation.")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("report_file"),
                ),
        )
        .subcommand(
            Command::new("predict")
                .about("Predict disease type, soil values and health score for leaf images")
                .arg(
                    Arg::new("config")
                        .help("Path to inference configuration file")
                        .required(false)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("model_dir")
                        .short('m')
                        .long("model")
                        .help("Directory of a trained model bundle")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("image")
                        .short('i')
                        .long("image")
                        .help("Image file or directory of images. May be repeated.")
                        .action(ArgAction::Append)
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::AnyPath),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output_file")
                        .help("Path to the output file for predictions (*.json, *.csv or *.tsv)")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(
            Command::new("extract")
                .about("Print the disease scalars and descriptor of one image as JSON")
                .arg(
                    Arg::new("image")
                        .help("Path to the image file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Written by {author-with-newline}Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("train", sub_m)) => handle_train(sub_m),
        Some(("predict", sub_m)) => handle_predict(sub_m),
        Some(("extract", sub_m)) => {
            let image: &PathBuf = sub_m
                .get_one("image")
                .ok_or_else(|| anyhow::anyhow!("missing image argument"))?;
            match run_extract(image) {
                Ok(_) => Ok(()),
                Err(e) => {
                    log::error!("Extraction failed: {:#}", e);
                    std::process::exit(1)
                }
            }
        }
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

/// Print a default config to stdout so it can be redirected into a file.
fn print_template<T: Serialize>(template: &T) -> Result<()> {
    eprintln!("[PhytoScan] No config file provided; default configuration template:");
    println!("{}", serde_json::to_string_pretty(template)?);
    Ok(())
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let config_path: Option<&PathBuf> = matches.get_one("config");
    if config_path.is_none() && matches.get_one::<String>("soil_data").is_none() {
        return print_template(&TrainConfig::default());
    }
    log::info!("[PhytoScan::Train] Training from config: {:?}", config_path);

    let params = match TrainConfig::from_arguments(config_path.map(|p| p.as_path()), matches) {
        Ok(params) => params,
        Err(e) => {
            log::error!("Invalid training configuration: {:#}", e);
            std::process::exit(1)
        }
    };

    match trainer::run_training(&params) {
        Ok(report) => {
            log::info!(
                "[PhytoScan::Train] Bundle {} trained on {} of {} records",
                report.bundle_id,
                report.n_matched,
                report.n_records
            );
            Ok(())
        }
        Err(e) => {
            log::error!("Training failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_predict(matches: &ArgMatches) -> Result<()> {
    let config_path: Option<&PathBuf> = matches.get_one("config");
    if config_path.is_none() && matches.get_many::<String>("image").is_none() {
        return print_template(&InferenceConfig::default());
    }
    log::info!("[PhytoScan::Predict] Inference using config: {:?}", config_path);

    let params = match InferenceConfig::from_arguments(config_path.map(|p| p.as_path()), matches)
    {
        Ok(params) => params,
        Err(e) => {
            log::error!("Invalid inference configuration: {:#}", e);
            std::process::exit(1)
        }
    };

    match inference::run_inference(&params) {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!("Inference failed: {:#}", e);
            std::process::exit(1)
        }
    }
}
