//! Internship match scoring CLI
//!
//! Reads JSON on stdin and writes a single JSON object on stdout. Logs go to
//! stderr.

use std::io::Read;

use clap::{Parser, Subcommand};
use internmatch::{Config, MatchError, Result};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "internmatch")]
#[command(about = "Student-internship match quality scoring", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Override the model directory from the config
    #[arg(long)]
    model_dir: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the model from a JSON array of samples on stdin
    Train,
    /// Score match records from a JSON request on stdin
    Predict,
    /// Report whether a trained model bundle exists
    Status,
    /// Write a default config file
    Init {
        /// Replace an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Serialize)]
struct Failure {
    success: bool,
    error: String,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let outcome = load_config(&cli).and_then(|config| {
        configure_threads(&config);
        match cli.command {
            Commands::Train => read_stdin().and_then(|input| commands::train(&config, &input)),
            Commands::Predict => read_stdin().and_then(|input| commands::predict(&config, &input)),
            Commands::Status => commands::status(&config),
            Commands::Init { force } => commands::init(&cli.config, force),
        }
    });

    match outcome {
        Ok(output) => println!("{}", output),
        Err(e) => {
            log::error!("{}", e);
            println!("{}", failure_json(&e));
            std::process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if std::path::Path::new(&cli.config).exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };
    if let Some(dir) = &cli.model_dir {
        config.data.model_dir = dir.clone();
    }
    Ok(config)
}

fn configure_threads(config: &Config) {
    if config.training.threads == 0 {
        return;
    }
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(config.training.threads)
        .build_global()
    {
        log::warn!("Could not size thread pool: {}", e);
    }
}

fn read_stdin() -> Result<String> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    Ok(input)
}

/// Message shown to callers; input errors carry their text verbatim
fn boundary_message(e: &MatchError) -> String {
    match e {
        MatchError::InvalidInput(msg) => msg.clone(),
        other => other.to_string(),
    }
}

fn failure_json(e: &MatchError) -> String {
    let failure = Failure {
        success: false,
        error: boundary_message(e),
    };
    serde_json::to_string(&failure)
        .unwrap_or_else(|_| r#"{"success":false,"error":"unserializable error"}"#.to_string())
}

mod commands {
    use super::*;
    use internmatch::data::{ArtifactStore, TrainingSample};
    use internmatch::features::{extract_record, InternshipProfile, RawMatchRecord, StudentProfile};
    use internmatch::predict::{PredictionResult, Predictor};
    use internmatch::training::{ModelTrainer, TrainMetrics};
    use serde::Deserialize;

    #[derive(Serialize)]
    struct TrainResponse {
        success: bool,
        metrics: TrainMetrics,
        message: &'static str,
    }

    #[derive(Serialize)]
    struct PredictResponse {
        success: bool,
        predictions: Vec<PredictionResult>,
    }

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct StatusResponse {
        success: bool,
        is_model_trained: bool,
        model_path: String,
    }

    #[derive(Serialize)]
    struct InitResponse {
        success: bool,
        message: String,
    }

    /// A student and internship to be turned into a record
    #[derive(Deserialize)]
    struct PairInput {
        student: StudentProfile,
        internship: InternshipProfile,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct PredictRequest {
        #[serde(default)]
        data: Option<Vec<RawMatchRecord>>,
        #[serde(default)]
        pairs: Option<Vec<PairInput>>,
        #[serde(default)]
        include_confidence: Option<bool>,
    }

    pub fn train(config: &Config, input: &str) -> Result<String> {
        let samples: Vec<TrainingSample> = serde_json::from_str(input)
            .map_err(|e| MatchError::InvalidInput(format!("Malformed training data: {}", e)))?;
        if samples.is_empty() {
            return Err(MatchError::InvalidInput("No training data provided".into()));
        }

        log::info!("Training on {} samples", samples.len());
        let store = ArtifactStore::new(&config.data.model_dir);
        let metrics = ModelTrainer::new().train_and_save(&samples, &store)?;

        Ok(serde_json::to_string(&TrainResponse {
            success: true,
            metrics,
            message: "Model trained and saved successfully",
        })?)
    }

    pub fn predict(config: &Config, input: &str) -> Result<String> {
        let request: PredictRequest = serde_json::from_str(input)
            .map_err(|e| MatchError::InvalidInput(format!("Malformed prediction request: {}", e)))?;

        // Records first, then any profile pairs, in the order given
        let mut records = request.data.unwrap_or_default();
        records.extend(
            request
                .pairs
                .unwrap_or_default()
                .iter()
                .map(|p| extract_record(&p.student, &p.internship)),
        );
        if records.is_empty() {
            return Err(MatchError::InvalidInput("No prediction data provided".into()));
        }

        let predictor = Predictor::load(&config.data.model_dir)?;
        let predictions = predictor.score(&records, request.include_confidence.unwrap_or(false))?;
        log::info!("Scored {} records", predictions.len());

        Ok(serde_json::to_string(&PredictResponse {
            success: true,
            predictions,
        })?)
    }

    pub fn status(config: &Config) -> Result<String> {
        let store = ArtifactStore::new(&config.data.model_dir);
        Ok(serde_json::to_string(&StatusResponse {
            success: true,
            is_model_trained: store.exists(),
            model_path: config.data.model_dir.clone(),
        })?)
    }

    pub fn init(config_path: &str, force: bool) -> Result<String> {
        if std::path::Path::new(config_path).exists() {
            if !force {
                return Err(MatchError::Config(format!(
                    "{} already exists, pass --force to overwrite it",
                    config_path
                )));
            }
            log::warn!("Overwriting existing config {}", config_path);
        }

        let config = Config::default();
        config.save(config_path)?;
        Ok(serde_json::to_string(&InitResponse {
            success: true,
            message: format!("Wrote default config to {}", config_path),
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.data.model_dir = dir.join("models").to_string_lossy().into_owned();
        config
    }

    fn training_input(n: usize) -> String {
        let samples: Vec<Value> = (0..n)
            .map(|i| {
                json!({
                    "skillOverlapCount": i % 4,
                    "skillOverlapRatio": (i % 4) as f64 / 4.0,
                    "gpa": 6.5 + (i % 3) as f64,
                    "domainMatch": i % 2 == 0,
                    "stipend": 10000,
                    "targetScore": 0.2 + (i % 4) as f64 * 0.2,
                })
            })
            .collect();
        Value::Array(samples).to_string()
    }

    #[test]
    fn test_empty_prediction_data() {
        let tmp = tempfile::tempdir().unwrap();
        let err = commands::predict(&config_in(tmp.path()), r#"{"data": []}"#).unwrap_err();
        let out: Value = serde_json::from_str(&failure_json(&err)).unwrap();

        assert_eq!(out, json!({"success": false, "error": "No prediction data provided"}));
    }

    #[test]
    fn test_train_too_few_samples() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        let err = commands::train(&config, &training_input(4)).unwrap_err();

        assert!(matches!(err, MatchError::InsufficientData { .. }));
        assert!(!std::path::Path::new(&config.data.model_dir).exists());
    }

    #[test]
    fn test_train_malformed_input() {
        let tmp = tempfile::tempdir().unwrap();
        let err = commands::train(&config_in(tmp.path()), "{\"not\": \"an array\"}").unwrap_err();
        assert!(matches!(err, MatchError::InvalidInput(_)));
    }

    #[test]
    fn test_predict_without_model() {
        let tmp = tempfile::tempdir().unwrap();
        let err = commands::predict(&config_in(tmp.path()), r#"{"data": [{"gpa": 8}]}"#).unwrap_err();
        assert!(matches!(err, MatchError::ModelNotFound(_)));
    }

    #[test]
    fn test_init_keeps_existing_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        let path = path.to_str().unwrap();

        commands::init(path, false).unwrap();
        let mut custom = Config::load(path).unwrap();
        custom.training.threads = 3;
        custom.save(path).unwrap();

        let err = commands::init(path, false).unwrap_err();
        assert!(matches!(err, MatchError::Config(_)));
        assert_eq!(Config::load(path).unwrap().training.threads, 3);

        commands::init(path, true).unwrap();
        assert_eq!(Config::load(path).unwrap().training.threads, 0);
    }

    #[test]
    fn test_train_from_star_reviews() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        let samples: Vec<Value> = (0..15)
            .map(|i| json!({"skillOverlapCount": i % 5, "overallScore": 1 + i % 5}))
            .collect();

        let trained: Value =
            serde_json::from_str(&commands::train(&config, &Value::Array(samples).to_string()).unwrap()).unwrap();
        assert_eq!(trained["success"], json!(true));

        let predicted: Value =
            serde_json::from_str(&commands::predict(&config, r#"{"data": [{"skillOverlapCount": 4}]}"#).unwrap())
                .unwrap();
        let score = predicted["predictions"][0]["score"].as_f64().unwrap();
        assert!(score > 0.5);
    }

    #[test]
    fn test_train_then_predict() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());

        let trained: Value = serde_json::from_str(&commands::train(&config, &training_input(25)).unwrap()).unwrap();
        assert_eq!(trained["success"], json!(true));
        assert_eq!(trained["metrics"]["n_samples"], json!(25));
        assert_eq!(trained["metrics"]["feature_importance"].as_object().unwrap().len(), 15);

        let status: Value = serde_json::from_str(&commands::status(&config).unwrap()).unwrap();
        assert_eq!(status["isModelTrained"], json!(true));

        let request = json!({
            "data": [{"skillOverlapCount": 3, "gpa": 8.0}, {"skillOverlapCount": 0}],
            "pairs": [{
                "student": {"skills": [{"name": "Rust", "level": 4}], "gpa": 8.1},
                "internship": {"requiredSkills": ["rust"], "stipend": 9000}
            }],
            "includeConfidence": true,
        });
        let predicted: Value = serde_json::from_str(&commands::predict(&config, &request.to_string()).unwrap()).unwrap();
        let predictions = predicted["predictions"].as_array().unwrap();

        assert_eq!(predictions.len(), 3);
        for p in predictions {
            let score = p["score"].as_f64().unwrap();
            let confidence = p["confidence"].as_f64().unwrap();
            assert!((0.0..=1.0).contains(&score));
            assert!((0.0..=1.0).contains(&confidence));
            assert!(p["std_dev"].as_f64().unwrap() >= 0.0);
        }

        let plain: Value = serde_json::from_str(
            &commands::predict(&config, r#"{"data": [{"gpa": 7}]}"#).unwrap(),
        )
        .unwrap();
        assert!(plain["predictions"][0].get("confidence").is_none());
    }
}
