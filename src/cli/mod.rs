use std::{ffi::OsString, path::PathBuf};

use burn::config::Config as _;
use pico_args::Arguments;

use crate::{
    error::{Error, Result},
    models::Architecture,
    training::{parse_filter_sizes, Config, EmbeddingMode},
};

/// Usage of the `train` binary
pub const TRAIN_HELP: &str = "\
Usage: train [OPTIONS]

Options:
  -h, --help                   Print help
  -c, --config <FILE>          JSON configuration to start from
  -d, --data-dir <DIR>         Directory holding 0.csv .. N.csv (defaults to 'data')
      --checkpoint-dir <DIR>   Root directory for checkpoints (defaults to 'logs')
  -e, --embedding-file <FILE>  Pretrained word vectors in text form
      --train-index <N>        Index of the held-out file (defaults to 1)
      --text-column <NAME>     Header of the text column (defaults to 'text')
      --label-column <NAME>    Header of the label column (defaults to 'label')
  -a, --architecture <NAME>    textcnn, multi_layers_cnn, hierarchical_cnn, textlstm,
                               text_bilstm or text_cnn_lstm (defaults to text_bilstm)
  -m, --embedding-mode <MODE>  random, static, trainable or dual_channel
      --embedding-dim <N>      Word vector width
      --filter-sizes <LIST>    Comma separated filter widths, e.g. 3,4,5
      --num-filters <N>        Filters per filter size
      --hidden-size <N>        Recurrent hidden state size
      --dropout-keep-prob <P>  Dropout keep probability
      --l2-reg-lambda <L>      L2 regularization strength
      --learning-rate <LR>     Initial learning rate
      --decay-rate <R>         Learning rate decay per epoch
  -b, --batch-size <N>         Batch size
  -n, --num-epochs <N>         Number of epochs
      --require-improvement <N>
                               Epochs without improvement before stopping
      --evaluate-every <N>     Evaluation reporting cadence
      --print-loss <N>         Training reporting cadence
      --checkpoint-every <N>   Steps between checkpoints
      --num-checkpoints <N>    Checkpoints to keep
      --max-seq-length <N>     Cap on the padded sequence length
      --seed <N>               Shuffle seed
      --restore                Resume from the latest checkpoint
";

/// Usage of the `infer` binary
pub const INFER_HELP: &str = "\
Usage: infer --run-dir <DIR> TEXT...

Arguments:
  TEXT                 One or more texts to classify

Options:
  -h, --help           Print help
  -r, --run-dir <DIR>  The run directory written by training, e.g. 'logs/textcnn'
";

/// Parsed arguments of the `infer` binary
#[derive(Debug, Clone, PartialEq)]
pub struct InferArgs {
    /// The run directory holding the artifacts and checkpoints
    pub run_dir: PathBuf,

    /// The texts to classify
    pub texts: Vec<String>,
}

/// Parse the `train` arguments into a configuration. Returns `None` when help was requested.
pub fn parse_train(mut pargs: Arguments) -> Result<Option<Config>> {
    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        return Ok(None);
    }

    let base: Option<PathBuf> = pargs
        .opt_value_from_str(["-c", "--config"])
        .map_err(invalid)?;

    let mut config = match base {
        Some(path) => Config::load(&path).map_err(|e| {
            Error::Configuration(format!("unable to load {}: {e}", path.display()))
        })?,
        None => Config::new(),
    };

    macro_rules! set {
        ($field:ident, $keys:expr) => {
            if let Some(value) = pargs.opt_value_from_str($keys).map_err(invalid)? {
                config.$field = value;
            }
        };
    }

    set!(data_dir, ["-d", "--data-dir"]);
    set!(checkpoint_dir, "--checkpoint-dir");
    set!(train_index, "--train-index");
    set!(text_column, "--text-column");
    set!(label_column, "--label-column");
    set!(embedding_dim, "--embedding-dim");
    set!(num_filters, "--num-filters");
    set!(hidden_size, "--hidden-size");
    set!(dropout_keep_prob, "--dropout-keep-prob");
    set!(l2_reg_lambda, "--l2-reg-lambda");
    set!(learning_rate, "--learning-rate");
    set!(decay_rate, "--decay-rate");
    set!(batch_size, ["-b", "--batch-size"]);
    set!(num_epochs, ["-n", "--num-epochs"]);
    set!(require_improvement, "--require-improvement");
    set!(evaluate_every, "--evaluate-every");
    set!(print_loss, "--print-loss");
    set!(checkpoint_every, "--checkpoint-every");
    set!(num_checkpoints_kept, "--num-checkpoints");

    if let Some(file) = pargs
        .opt_value_from_str(["-e", "--embedding-file"])
        .map_err(invalid)?
    {
        config.embedding_file = Some(file);
    }

    if let Some(length) = pargs
        .opt_value_from_str("--max-seq-length")
        .map_err(invalid)?
    {
        config.max_seq_length = Some(length);
    }

    if let Some(seed) = pargs.opt_value_from_str("--seed").map_err(invalid)? {
        config.seed = Some(seed);
    }

    if let Some(architecture) = pargs
        .opt_value_from_fn(["-a", "--architecture"], |value| {
            Architecture::try_from(value)
        })
        .map_err(invalid)?
    {
        config.architecture = architecture;
    }

    if let Some(mode) = pargs
        .opt_value_from_fn(["-m", "--embedding-mode"], |value| {
            EmbeddingMode::try_from(value)
        })
        .map_err(invalid)?
    {
        config.embedding_mode = mode;
    }

    if let Some(sizes) = pargs
        .opt_value_from_fn("--filter-sizes", parse_filter_sizes)
        .map_err(invalid)?
    {
        config.filter_sizes = sizes;
    }

    if pargs.contains("--restore") {
        config.allow_restore_from_checkpoint = true;
    }

    reject_leftovers(pargs.finish())?;

    Ok(Some(config))
}

/// Parse the `infer` arguments. Returns `None` when help was requested.
pub fn parse_infer(mut pargs: Arguments) -> Result<Option<InferArgs>> {
    if pargs.contains(["-h", "--help"]) {
        return Ok(None);
    }

    let run_dir = pargs
        .value_from_str(["-r", "--run-dir"])
        .map_err(invalid)?;

    let texts = pargs
        .finish()
        .into_iter()
        .map(|text| {
            text.into_string()
                .map_err(|text| Error::Configuration(format!("{text:?} is not valid UTF-8")))
        })
        .collect::<Result<Vec<_>>>()?;

    if texts.is_empty() {
        return Err(Error::Configuration(
            "missing required argument: TEXT".to_string(),
        ));
    }

    Ok(Some(InferArgs { run_dir, texts }))
}

fn invalid(error: pico_args::Error) -> Error {
    Error::Configuration(error.to_string())
}

fn reject_leftovers(remaining: Vec<OsString>) -> Result<()> {
    if remaining.is_empty() {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "unexpected arguments: {remaining:?}"
        )))
    }
}
