//! Command line tool for inference

use anyhow::Context;
use burn_text_classifier::{backend, cli, pipelines::text_classification};
use pico_args::Arguments;

fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let Some(args) = cli::parse_infer(Arguments::from_env())? else {
        println!("{}", cli::INFER_HELP);
        return Ok(());
    };

    let predictions =
        text_classification::infer::<backend::Inner>(backend::device(), &args.run_dir, args.texts)
            .with_context(|| format!("unable to classify with {}", args.run_dir.display()))?;

    for (i, prediction) in predictions.iter().enumerate() {
        println!(
            "\n=== Item {i} ===\
             \n- Text: {}\
             \n- Class: {}\
             \n- Confidence: {:.4}\
             \n================",
            prediction.text, prediction.label, prediction.confidence
        );
    }

    Ok(())
}
