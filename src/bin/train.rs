//! Command line tool for training

use burn_text_classifier::{backend, cli, pipelines::text_classification};
use pico_args::Arguments;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let Some(config) = cli::parse_train(Arguments::from_env())? else {
        print!("{}", cli::TRAIN_HELP);
        return Ok(());
    };

    let summary =
        text_classification::train::<backend::Training>(backend::device(), config).await?;

    println!(
        "Stopped at step {} ({}), held-out accuracy {:.4}",
        summary.outcome.state.current_step, summary.outcome.reason, summary.report.accuracy
    );
    println!("- Predictions: {}", summary.predictions_file.display());
    println!("- Labels: {}", summary.labels_file.display());

    Ok(())
}
