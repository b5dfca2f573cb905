use clap::{Args, Parser, Subcommand};
use kdam::{tqdm, BarExt};
use log::info;
use riskpredict::model::ProbabilisticModel;
use riskpredict::{utils, Config, Frame, ModelBundle, Predictor, ProbabilityOrder};
use serde_json::{from_str, json, Map, Value};
use std::error::Error;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "riskpredict", about = "Score customer records with a trained risk model")]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true, default_value = "riskpredict.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Predict risk categories for JSON-lines records
    Predict(PredictArgs),
    /// Re-encode a bundle; formats follow the file extensions
    Convert { from: PathBuf, to: PathBuf },
    /// Describe a bundle
    Inspect { bundle: PathBuf },
}

#[derive(Args)]
struct PredictArgs {
    /// Records, one JSON object per line (.gz is fine, - is stdin)
    input: String,
    /// Model bundle; overrides the config file
    #[arg(short, long)]
    bundle: Option<PathBuf>,
    /// Where to write predictions (default stdout)
    #[arg(short, long)]
    output: Option<String>,
    /// Copy this field from each record into its prediction
    #[arg(long, value_name = "FIELD")]
    id_column: Option<String>,
    /// Order probabilities like the bundle's class_names
    #[arg(long)]
    align_classes: bool,
    /// Records scored per batch
    #[arg(long)]
    batch_size: Option<usize>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Cli::parse();
    let config = Config::load_or_default(&args.config)?;

    match args.command {
        Command::Predict(predict_args) => predict(config, predict_args)?,
        Command::Convert { from, to } => {
            let bundle = ModelBundle::load(&from)?;
            bundle.save(&to)?;
        }
        Command::Inspect { bundle } => inspect(&bundle)?,
    }
    Ok(())
}

fn predict(mut config: Config, args: PredictArgs) -> Result<(), Box<dyn Error>> {
    if args.align_classes {
        config.predict.probability_order = ProbabilityOrder::ClassNames;
    }
    if let Some(n) = args.batch_size {
        config.predict.batch_size = n.max(1);
    }
    let bundle_path = args
        .bundle
        .or(config.model.path.clone())
        .ok_or("no model bundle given (use --bundle or [model] path in the config)")?;

    let bundle = ModelBundle::load(&bundle_path)?;
    let predictor = Predictor::with_options(bundle, config.predict.options())?;
    let columns = predictor.probability_labels()?;

    let input = utils::reader(&args.input)?;
    let mut out = utils::writer(args.output.as_deref())?;
    let mut progress = tqdm!(desc = "Scoring", unit = " rows");
    let mut batch = Vec::with_capacity(config.predict.batch_size);
    let mut total = 0;

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        batch.push(from_str::<Map<String, Value>>(&line)?);
        if batch.len() >= config.predict.batch_size {
            total += score_batch(&predictor, &columns, &mut batch, &args.id_column, &mut out)?;
            progress.update_to(total)?;
        }
    }
    if !batch.is_empty() {
        total += score_batch(&predictor, &columns, &mut batch, &args.id_column, &mut out)?;
        progress.update_to(total)?;
    }
    out.flush()?;
    progress.refresh()?;
    eprintln!();
    info!("scored {} records with {}", total, bundle_path.display());
    Ok(())
}

fn score_batch(
    predictor: &Predictor,
    columns: &[String],
    batch: &mut Vec<Map<String, Value>>,
    id_column: &Option<String>,
    out: &mut Box<dyn Write>,
) -> Result<usize, Box<dyn Error>> {
    let ids: Vec<Option<Value>> = match id_column {
        Some(id) => batch.iter().map(|r| r.get(id).cloned()).collect(),
        None => Vec::new(),
    };
    let frame = Frame::from_records(batch.drain(..));
    let predictions = predictor.predict(&frame)?;

    for (i, (label, proba)) in predictions.iter().enumerate() {
        let probabilities: Map<String, Value> = columns
            .iter()
            .cloned()
            .zip(proba.iter().map(|p| json!(p)))
            .collect();
        let mut line = Map::new();
        if let Some(id) = id_column {
            line.insert(id.clone(), ids[i].clone().unwrap_or(Value::Null));
        }
        line.insert("prediction".to_string(), json!(label));
        line.insert("probabilities".to_string(), Value::Object(probabilities));
        writeln!(out, "{}", Value::Object(line))?;
    }
    Ok(predictions.len())
}

fn inspect(path: &Path) -> Result<(), Box<dyn Error>> {
    let bundle = ModelBundle::load(path)?;
    let model = bundle.model();

    println!("model: {}", model.kind());
    println!(
        "labels: {}",
        match bundle.label_encoder() {
            Some(_) => "encoded",
            None => "direct",
        }
    );
    println!("classes: {}", model.n_classes());
    println!("class_names: {}", bundle.class_names().join(", "));
    match bundle.classifier().labels() {
        Ok(labels) => println!("probability order: {}", labels.join(", ")),
        Err(e) => println!("probability order: undecodable ({})", e),
    }
    if let Some(enc) = bundle.label_encoder() {
        for (code, label) in enc.classes().iter().enumerate() {
            println!("  {} -> {}", code, label);
        }
    }
    println!("features ({}):", bundle.feature_names().len());
    for (i, name) in bundle.feature_names().iter().enumerate() {
        println!("  {:>3} {}", i, name);
    }
    Ok(())
}
