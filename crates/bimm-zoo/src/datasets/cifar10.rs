//! # CIFAR-10
//!
//! Loads the CIFAR-10 binary batches as ``(images, labels)`` pairs:
//! * images: ``[N, 32, 32, 3]`` `f32`, pixels scaled to ``[0, 1]``.
//! * labels: ``[N, 10]`` `f32`, one-hot.
//!
//! The validation split is the leading `validation_size` rows of the
//! training split; it overlaps train.
//!
//! [`Cifar10Dataset`] also resolves zoo model names through
//! [`CIFAR10_MODEL_REGISTRY`].

use crate::cache::archive::extract_tar_gz;
use crate::cache::disk::DiskCacheConfig;
use crate::datasets::encoders::one_hot;
use crate::datasets::split::Cifar10Split;
use crate::error::Error;
use crate::models::classifier::Classifier;
use crate::models::input::ClassifierOptions;
use crate::models::registry::CIFAR10_MODEL_REGISTRY;
use crate::weights::DEFAULT_WEIGHTS_DIR;
use burn::prelude::{Backend, Config};
use burn::tensor::TensorData;
use std::path::{Path, PathBuf};

/// The dataset name used in weights paths and errors.
pub const CIFAR10_DATASET_NAME: &str = "CIFAR-10";

/// Source archive of the binary batches.
pub const CIFAR10_ARCHIVE_URL: &str = "https://www.cs.toronto.edu/~kriz/cifar-10-binary.tar.gz";

/// The directory the archive extracts to.
pub const CIFAR10_BATCHES_DIR: &str = "cifar-10-batches-bin";

/// Training batch files, in order.
pub const CIFAR10_TRAIN_BATCHES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];

/// Test batch files.
pub const CIFAR10_TEST_BATCHES: [&str; 1] = ["test_batch.bin"];

/// Image height and width.
pub const CIFAR10_IMAGE_SIZE: usize = 32;

/// Image channels.
pub const CIFAR10_NUM_CHANNELS: usize = 3;

/// Number of classes.
pub const CIFAR10_NUM_CLASSES: usize = 10;

/// Bytes per image.
pub const CIFAR10_IMAGE_BYTES: usize =
    CIFAR10_IMAGE_SIZE * CIFAR10_IMAGE_SIZE * CIFAR10_NUM_CHANNELS;

/// Bytes per record: one label byte, then the image planes.
pub const CIFAR10_RECORD_SIZE: usize = 1 + CIFAR10_IMAGE_BYTES;

/// Class names, by label index.
pub const CIFAR10_CLASS_NAMES: [&str; CIFAR10_NUM_CLASSES] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

/// Decoded records, images in ``HWC`` byte order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecords {
    /// ``[len, 32, 32, 3]`` row-major pixels.
    pub pixels: Vec<u8>,

    /// ``[len]`` class indices.
    pub labels: Vec<u8>,
}

impl RawRecords {
    /// Number of records.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Are there no records?
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Append one ``label + CHW planes`` record, transposing to ``HWC``.
    fn push_record(
        &mut self,
        record: &[u8],
    ) {
        let plane = CIFAR10_IMAGE_SIZE * CIFAR10_IMAGE_SIZE;
        let (label, planes) = record.split_at(1);

        self.labels.push(label[0]);
        self.pixels.reserve(CIFAR10_IMAGE_BYTES);
        for idx in 0..plane {
            for channel in 0..CIFAR10_NUM_CHANNELS {
                self.pixels.push(planes[channel * plane + idx]);
            }
        }
    }

    /// Keep only the leading `len` records.
    pub fn truncate(
        &mut self,
        len: usize,
    ) {
        self.labels.truncate(len);
        self.pixels.truncate(len * CIFAR10_IMAGE_BYTES);
    }

    /// Normalize and encode.
    ///
    /// # Returns
    ///
    /// ``(images [N, 32, 32, 3], labels [N, 10])``
    pub fn into_arrays(self) -> Result<(TensorData, TensorData), Error> {
        let n = self.len();
        let labels = one_hot(&self.labels, CIFAR10_NUM_CLASSES)?;
        let images: Vec<f32> = self.pixels.into_iter().map(|p| p as f32 / 255.0).collect();

        Ok((
            TensorData::new(
                images,
                [
                    n,
                    CIFAR10_IMAGE_SIZE,
                    CIFAR10_IMAGE_SIZE,
                    CIFAR10_NUM_CHANNELS,
                ],
            ),
            TensorData::new(labels, [n, CIFAR10_NUM_CLASSES]),
        ))
    }
}

/// A directory of CIFAR-10 binary batch files.
#[derive(Debug, Clone, PartialEq)]
pub struct Cifar10Source {
    batches_dir: PathBuf,
}

impl Cifar10Source {
    /// Read batches from an existing directory.
    pub fn from_dir<P: AsRef<Path>>(batches_dir: P) -> Self {
        Self {
            batches_dir: batches_dir.as_ref().to_path_buf(),
        }
    }

    /// Download and extract the archive into the disk cache, if needed.
    pub fn fetch(cache: &DiskCacheConfig) -> Result<Self, Error> {
        let archive =
            cache.fetch_resource(CIFAR10_ARCHIVE_URL, &["cifar10", "cifar-10-binary.tar.gz"])?;
        let dest = archive
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let batches_dir = extract_tar_gz(&archive, &dest)?;
        if !batches_dir.ends_with(CIFAR10_BATCHES_DIR) {
            return Err(Error::Archive(format!(
                "expected {CIFAR10_BATCHES_DIR} in {}, found {}",
                archive.display(),
                batches_dir.display()
            )));
        }
        Ok(Self::from_dir(batches_dir))
    }

    /// The batch directory.
    pub fn batches_dir(&self) -> &Path {
        &self.batches_dir
    }

    /// Read records from batch files, in order.
    ///
    /// # Arguments
    ///
    /// - `files`: batch file names, relative to [`Self::batches_dir`].
    /// - `limit`: stop once this many records are read; later files are not opened.
    pub fn read_records(
        &self,
        files: &[&str],
        limit: Option<usize>,
    ) -> Result<RawRecords, Error> {
        let mut records = RawRecords::default();
        for file in files {
            if limit.is_some_and(|limit| records.len() >= limit) {
                break;
            }

            let path = self.batches_dir.join(file);
            log::debug!("Reading batch: {}", path.display());
            let bytes = std::fs::read(&path)?;
            if bytes.len() % CIFAR10_RECORD_SIZE != 0 {
                return Err(Error::CorruptBatch {
                    path,
                    len: bytes.len(),
                    record_size: CIFAR10_RECORD_SIZE,
                });
            }

            for record in bytes.chunks_exact(CIFAR10_RECORD_SIZE) {
                if limit.is_some_and(|limit| records.len() >= limit) {
                    break;
                }
                records.push_record(record);
            }
        }
        Ok(records)
    }
}

/// [`Cifar10Dataset`] Config.
#[derive(Config, Debug, PartialEq)]
pub struct Cifar10Config {
    /// Directory holding the `*.bin` batches; when unset, the disk cache is used.
    pub data_dir: Option<String>,

    /// Directory holding pretrained weights.
    #[config(default = "DEFAULT_WEIGHTS_DIR.to_string()")]
    pub weights_dir: String,

    /// Leading training rows that form the validation split.
    #[config(default = 5000)]
    pub validation_size: usize,

    /// Download cache policy.
    #[config(default = "DiskCacheConfig::new()")]
    pub cache: DiskCacheConfig,
}

impl Default for Cifar10Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Cifar10Config {
    /// Initialize a [`Cifar10Dataset`].
    pub fn init(&self) -> Cifar10Dataset {
        Cifar10Dataset::new(self.clone())
    }
}

/// The CIFAR-10 dataset and model loader.
#[derive(Debug, Clone)]
pub struct Cifar10Dataset {
    /// Dataset name.
    pub dataset_name: &'static str,

    /// Image height and width.
    pub image_size: usize,

    /// Image channels.
    pub num_channels: usize,

    /// Number of classes.
    pub num_classes: usize,

    config: Cifar10Config,
    model_name: Option<String>,
}

impl Default for Cifar10Dataset {
    fn default() -> Self {
        Self::new(Cifar10Config::default())
    }
}

impl Cifar10Dataset {
    /// Create a loader.
    pub fn new(config: Cifar10Config) -> Self {
        Self {
            dataset_name: CIFAR10_DATASET_NAME,
            image_size: CIFAR10_IMAGE_SIZE,
            num_channels: CIFAR10_NUM_CHANNELS,
            num_classes: CIFAR10_NUM_CLASSES,
            config,
            model_name: None,
        }
    }

    /// The loader config.
    pub fn config(&self) -> &Cifar10Config {
        &self.config
    }

    /// Class names, by label index.
    pub fn class_names(&self) -> &'static [&'static str] {
        &CIFAR10_CLASS_NAMES
    }

    /// The last model name passed validation in [`Self::load_model_by_name`].
    pub fn last_model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    /// The configured or cached data source.
    pub fn source(&self) -> Result<Cifar10Source, Error> {
        match &self.config.data_dir {
            Some(dir) => Ok(Cifar10Source::from_dir(dir)),
            None => Cifar10Source::fetch(&self.config.cache),
        }
    }

    /// Load one split's raw records.
    pub fn load_split(
        &self,
        split: Cifar10Split,
    ) -> Result<RawRecords, Error> {
        let source = self.source()?;
        let records = match split {
            Cifar10Split::Train => source.read_records(&CIFAR10_TRAIN_BATCHES, None)?,
            Cifar10Split::Validation => source
                .read_records(&CIFAR10_TRAIN_BATCHES, Some(self.config.validation_size))?,
            Cifar10Split::Test => source.read_records(&CIFAR10_TEST_BATCHES, None)?,
        };
        log::info!("Loaded {} {split} records.", records.len());
        Ok(records)
    }

    /// Load a split as ``(images, labels)``.
    pub fn get_split(
        &self,
        split: Cifar10Split,
    ) -> Result<(TensorData, TensorData), Error> {
        self.load_split(split)?.into_arrays()
    }

    /// The training split.
    pub fn get_train_dataset(&self) -> Result<(TensorData, TensorData), Error> {
        self.get_split(Cifar10Split::Train)
    }

    /// The test split.
    pub fn get_test_dataset(&self) -> Result<(TensorData, TensorData), Error> {
        self.get_split(Cifar10Split::Test)
    }

    /// The validation split: the leading `validation_size` training rows.
    pub fn get_val_dataset(&self) -> Result<(TensorData, TensorData), Error> {
        self.get_split(Cifar10Split::Validation)
    }

    /// Load all splits, reading the training batches once.
    ///
    /// # Returns
    ///
    /// ``[train, val, test]``, each ``(images, labels)``.
    pub fn get_all_datasets(&self) -> Result<[(TensorData, TensorData); 3], Error> {
        let source = self.source()?;
        let train = source.read_records(&CIFAR10_TRAIN_BATCHES, None)?;
        let mut val = train.clone();
        val.truncate(self.config.validation_size);
        let test = source.read_records(&CIFAR10_TEST_BATCHES, None)?;

        Ok([train.into_arrays()?, val.into_arrays()?, test.into_arrays()?])
    }

    /// Resolve the weights path for a model name.
    pub fn weights_path_for(
        &self,
        model_name: &str,
    ) -> Result<PathBuf, Error> {
        CIFAR10_MODEL_REGISTRY.resolve_weights_path(model_name, Path::new(&self.config.weights_dir))
    }

    /// Construct a zoo classifier by name and load its pretrained weights.
    ///
    /// `resnet*` and `distillation` ignore `options`.
    ///
    /// # Arguments
    ///
    /// - `model_name`: a name from [`CIFAR10_MODEL_REGISTRY`].
    /// - `options`: ``{logits, input_range, pre_filter}``.
    /// - `device`: the target device.
    ///
    /// # Returns
    ///
    /// The loaded classifier, or [`Error::UnsupportedModel`] / [`Error::WeightsLoad`].
    pub fn load_model_by_name<B: Backend>(
        &mut self,
        model_name: &str,
        options: ClassifierOptions<B>,
        device: &B::Device,
    ) -> Result<Classifier<B>, Error> {
        let entry = CIFAR10_MODEL_REGISTRY.try_lookup_by_name(model_name)?;
        self.model_name = Some(model_name.to_string());

        entry.load(
            self.dataset_name,
            Path::new(&self.config.weights_dir),
            options,
            device,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use hamcrest::prelude::*;

    type B = NdArray<f32>;

    /// A record whose pixel at plane `c`, offset `i` is ``(label + c + i) % 256``.
    fn record(label: u8) -> Vec<u8> {
        let mut record = vec![label];
        for c in 0..CIFAR10_NUM_CHANNELS {
            for i in 0..CIFAR10_IMAGE_SIZE * CIFAR10_IMAGE_SIZE {
                record.push(((label as usize + c + i) % 256) as u8);
            }
        }
        record
    }

    /// Writes 5 train batches of 3 records and a test batch of 2.
    fn write_batches(dir: &Path) {
        for (b, file) in CIFAR10_TRAIN_BATCHES.iter().enumerate() {
            let bytes: Vec<u8> = (0..3)
                .flat_map(|r| record(((b * 3 + r) % 10) as u8))
                .collect();
            std::fs::write(dir.join(file), bytes).unwrap();
        }
        let bytes: Vec<u8> = [7u8, 2].iter().flat_map(|&l| record(l)).collect();
        std::fs::write(dir.join(CIFAR10_TEST_BATCHES[0]), bytes).unwrap();
    }

    fn dataset(
        dir: &Path,
        validation_size: usize,
    ) -> Cifar10Dataset {
        Cifar10Config::new()
            .with_data_dir(Some(dir.to_string_lossy().to_string()))
            .with_weights_dir(dir.join("weights").to_string_lossy().to_string())
            .with_validation_size(validation_size)
            .init()
    }

    fn check_split(
        images: &TensorData,
        labels: &TensorData,
        n: usize,
    ) {
        assert_eq!(images.shape, vec![n, 32, 32, 3]);
        assert_eq!(labels.shape, vec![n, 10]);

        let images = images.to_vec::<f32>().unwrap();
        assert_that!(images.iter().all(|v| (0.0..=1.0).contains(v)), is(equal_to(true)));

        let labels = labels.to_vec::<f32>().unwrap();
        for row in labels.chunks(10) {
            assert_eq!(row.iter().sum::<f32>(), 1.0);
            assert_eq!(row.iter().filter(|&&v| v == 1.0).count(), 1);
        }
    }

    #[test]
    fn test_defaults() {
        let config = Cifar10Config::default();
        assert_eq!(config.data_dir, None);
        assert_eq!(config.weights_dir, "downloads/trained_models");
        assert_eq!(config.validation_size, 5000);
        assert_eq!(config.cache, DiskCacheConfig::default());

        let loader = config.init();
        assert_eq!(loader.dataset_name, "CIFAR-10");
        assert_eq!(loader.image_size, 32);
        assert_eq!(loader.num_channels, 3);
        assert_eq!(loader.num_classes, 10);
        assert_eq!(loader.class_names().len(), 10);
        assert_eq!(loader.last_model_name(), None);
    }

    #[test]
    fn test_record_layout_is_hwc() {
        let mut records = RawRecords::default();
        records.push_record(&record(4));
        assert_eq!(records.labels, vec![4]);
        assert_eq!(records.pixels.len(), CIFAR10_IMAGE_BYTES);

        // Pixel (y=0, x=1) takes one byte from each plane.
        assert_eq!(&records.pixels[3..6], &[5, 6, 7]);
    }

    #[test]
    fn test_splits() {
        let dir = tempfile::tempdir().unwrap();
        write_batches(dir.path());
        let loader = dataset(dir.path(), 4);

        let (images, labels) = loader.get_train_dataset().unwrap();
        check_split(&images, &labels, 15);

        let (images, labels) = loader.get_test_dataset().unwrap();
        check_split(&images, &labels, 2);
        assert_eq!(labels.to_vec::<f32>().unwrap()[7], 1.0);

        let (images, labels) = loader.get_val_dataset().unwrap();
        check_split(&images, &labels, 4);
    }

    #[test]
    fn test_val_is_train_prefix() {
        let dir = tempfile::tempdir().unwrap();
        write_batches(dir.path());
        let loader = dataset(dir.path(), 4);

        let (train_images, train_labels) = loader.get_train_dataset().unwrap();
        let (val_images, val_labels) = loader.get_val_dataset().unwrap();

        let train_images = train_images.to_vec::<f32>().unwrap();
        let val_images = val_images.to_vec::<f32>().unwrap();
        assert_eq!(val_images[..], train_images[..val_images.len()]);

        let train_labels = train_labels.to_vec::<f32>().unwrap();
        let val_labels = val_labels.to_vec::<f32>().unwrap();
        assert_eq!(val_labels[..], train_labels[..4 * 10]);
    }

    #[test]
    fn test_val_stops_reading_early() {
        let dir = tempfile::tempdir().unwrap();
        write_batches(dir.path());
        // A corrupt later batch is never opened.
        std::fs::write(dir.path().join(CIFAR10_TRAIN_BATCHES[4]), b"junk").unwrap();

        let loader = dataset(dir.path(), 4);
        let (images, _) = loader.get_val_dataset().unwrap();
        assert_eq!(images.shape[0], 4);

        assert!(matches!(
            loader.get_train_dataset().unwrap_err(),
            Error::CorruptBatch { len: 4, .. }
        ));
    }

    #[test]
    fn test_all_datasets() {
        let dir = tempfile::tempdir().unwrap();
        write_batches(dir.path());
        let loader = dataset(dir.path(), 5);

        let [(train, _), (val, val_labels), (test, _)] = loader.get_all_datasets().unwrap();
        assert_eq!(train.shape[0], 15);
        assert_eq!(val.shape[0], 5);
        assert_eq!(test.shape[0], 2);

        let (expected, expected_labels) = loader.get_val_dataset().unwrap();
        assert_eq!(
            val.to_vec::<f32>().unwrap(),
            expected.to_vec::<f32>().unwrap()
        );
        assert_eq!(
            val_labels.to_vec::<f32>().unwrap(),
            expected_labels.to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn test_bad_label() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CIFAR10_TEST_BATCHES[0]), record(12)).unwrap();

        let loader = dataset(dir.path(), 1);
        assert!(matches!(
            loader.get_test_dataset().unwrap_err(),
            Error::LabelOutOfRange {
                label: 12,
                num_classes: 10
            }
        ));
    }

    #[test]
    fn test_load_model_by_name_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = dataset(dir.path(), 1);

        let err = loader
            .load_model_by_name::<B>("bogus_name", ClassifierOptions::default(), &Default::default())
            .unwrap_err();
        assert_that!(
            err.to_string(),
            is(equal_to("Undefined model [bogus_name] for CIFAR-10.".to_string()))
        );
        assert_eq!(loader.last_model_name(), None);
    }

    #[test]
    fn test_load_model_by_name_records_name_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = dataset(dir.path(), 1);

        let err = loader
            .load_model_by_name::<B>("cnn1", ClassifierOptions::default(), &Default::default())
            .unwrap_err();
        match err {
            Error::WeightsLoad { path, .. } => {
                assert_eq!(path, loader.weights_path_for("cnn1").unwrap());
                assert_eq!(path, dir.path().join("weights").join("CIFAR-10_cnn1.mpk"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(loader.last_model_name(), Some("cnn1"));
    }

    #[test]
    fn test_load_model_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let mut loader = dataset(dir.path(), 1);

        let path = loader.weights_path_for("lenet").unwrap();
        let trained = CIFAR10_MODEL_REGISTRY
            .lookup_by_name("lenet")
            .unwrap()
            .constructor
            .construct::<B>("lenet", ClassifierOptions::default(), &device);
        trained.save_weights(&path).unwrap();

        let model = loader
            .load_model_by_name::<B>(
                "lenet",
                ClassifierOptions::default().with_logits(true),
                &device,
            )
            .unwrap();
        assert_eq!(model.name(), "lenet");
        assert!(model.logits());
        assert_eq!(loader.last_model_name(), Some("lenet"));
    }
}
