use bimm_zoo::datasets::cifar10::Cifar10Config;
use bimm_zoo::datasets::split::Cifar10Split;
use bimm_zoo::models::input::ClassifierOptions;
use bimm_zoo::models::registry::CIFAR10_MODEL_REGISTRY;
use bimm_zoo::weights::DEFAULT_WEIGHTS_DIR;
use burn::backend::NdArray;
use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SplitArg {
    Train,
    Val,
    Test,
}

impl From<SplitArg> for Cifar10Split {
    fn from(split: SplitArg) -> Self {
        match split {
            SplitArg::Train => Cifar10Split::Train,
            SplitArg::Val => Cifar10Split::Validation,
            SplitArg::Test => Cifar10Split::Test,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory of CIFAR-10 `*.bin` batches; downloads to the cache when unset.
    #[arg(long)]
    data_dir: Option<String>,

    /// Split to load.
    #[arg(long, value_enum, default_value = "test")]
    split: SplitArg,

    /// List the registered models and exit.
    #[arg(long)]
    list_models: bool,

    /// Load a model by name after loading the split.
    #[arg(long)]
    model: Option<String>,

    /// Directory holding pretrained weights.
    #[arg(long, default_value = DEFAULT_WEIGHTS_DIR)]
    weights_dir: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    type B = NdArray<f32>;
    let device = Default::default();

    if args.list_models {
        for entry in CIFAR10_MODEL_REGISTRY.items {
            println!("{:<18} {}", entry.name, entry.description);
        }
        return Ok(());
    }

    let mut dataset = Cifar10Config::new()
        .with_data_dir(args.data_dir)
        .with_weights_dir(args.weights_dir)
        .init();

    let split: Cifar10Split = args.split.into();
    let (images, labels) = dataset.get_split(split)?;
    println!("{split} images: {:?}", images.shape);
    println!("{split} labels: {:?}", labels.shape);

    if let Some(name) = args.model {
        let model = dataset.load_model_by_name::<B>(&name, ClassifierOptions::default(), &device)?;
        println!(
            "{}: {:?}, {} parameters",
            model.name(),
            model.architecture(),
            model.num_params()
        );
    }

    Ok(())
}
