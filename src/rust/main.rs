use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use imgclass::{Classifier, ClassifyOptions, Image, Keyword, ModelFiles, ModelStore, RuntimeConfig};
use log::info;
use serde::Serialize;

#[derive(Parser)]
#[command(author, version, about = "Classify images into ranked keywords", long_about = None)]
struct Args {
    /// Image files to classify
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Name of an installed model bundle
    #[arg(short, long, conflicts_with = "topology")]
    model: Option<String>,

    /// Directory holding model bundles (defaults to IMGCLASS_MODEL_PATH or the user cache)
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// ONNX topology file
    #[arg(long, requires_all = ["weights", "mean", "labels"])]
    topology: Option<PathBuf>,

    /// Trained weights: the topology itself or its external-data file
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Caffe binaryproto mean image
    #[arg(long)]
    mean: Option<PathBuf>,

    /// Label file, one label per line
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Number of predictions to expand into keywords
    #[arg(short = 'n', long, default_value_t = imgclass::classifier::DEFAULT_TOP_N)]
    top_n: usize,

    /// Drop predictions whose confidence is not above this value
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Print one JSON object per image
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    image: &'a str,
    keywords: &'a [Keyword],
}

fn model_files(args: &Args) -> Result<ModelFiles> {
    if let Some(name) = &args.model {
        let store = match &args.models_dir {
            Some(dir) => ModelStore::new(dir),
            None => ModelStore::new_default(),
        }
        .context("Failed to open model store")?;
        return store
            .load_files(name)
            .with_context(|| format!("Model bundle '{}' unusable in {}", name, store.models_dir().display()));
    }

    match (&args.topology, &args.weights, &args.mean, &args.labels) {
        (Some(topology), Some(weights), Some(mean), Some(labels)) => {
            Ok(ModelFiles::new(topology, weights, mean, labels))
        }
        _ => bail!("Pass either --model or all of --topology, --weights, --mean and --labels"),
    }
}

fn main() -> Result<()> {
    imgclass::init_logger();
    let args = Args::parse();

    let files = model_files(&args)?;
    let start_time = Instant::now();
    let mut classifier = Classifier::load(&files, &RuntimeConfig::from_env())
        .with_context(|| format!("Failed to load classifier from {}", files.topology.display()))?;
    info!("Classifier ready in {:.2?}: {:?}", start_time.elapsed(), classifier.info());

    let mut options = ClassifyOptions::default().with_top_n(args.top_n);
    if let Some(threshold) = args.threshold {
        options = options.with_min_confidence(threshold);
    }

    for path in &args.images {
        let decoded = image::open(path).with_context(|| format!("Failed to decode {}", path.display()))?;
        let image = Image::from_dynamic(&decoded);

        let start_time = Instant::now();
        let keywords = classifier.classify_with(&image, &options)?;
        info!("Classified {} in {:.2?}", path.display(), start_time.elapsed());

        if args.json {
            let report = Report {
                image: &path.to_string_lossy(),
                keywords: &keywords,
            };
            println!("{}", serde_json::to_string(&report)?);
        } else {
            println!("{}", path.display());
            for keyword in &keywords {
                println!("  {:<30} {:.4}", keyword.keyword, keyword.confidence);
            }
        }
    }

    Ok(())
}
