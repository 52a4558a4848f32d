//! End-to-end tests over real files on disk
//!
//! Fixtures are written with the helpers in `common`: classic Level 5 files
//! (plain and compressed) and MATLAB-style v7.3 HDF5 files.

mod common;

use common::{
    add_hdf5_group, add_hdf5_string_dataset, mat_header, write_hdf5_mat, Hdf5Var, Level5Writer,
};
use mat_images::{
    classic_io::{ByteOrder, ClassicReader},
    container::{detect_format, load_image_variables, Container, ContainerFormat},
    data_source::{LoadedArray, VariableCatalog},
    dtype::{DType, Scalar},
    errors::{MatImagesError, Result},
    metadata::describe_variables,
    reader::{get_reader, read_paths, MatImageReader},
    statistics::ContrastLimits,
    ReaderConfig,
};
use ndarray::{ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tempfile::tempdir;

fn random_f64(shape: &[usize], seed: u64) -> ArrayD<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    ArrayD::from_shape_fn(IxDyn(shape), |_| rng.gen_range(-5.0..5.0))
}

#[test]
fn test_classic_round_trip_2d() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("plane.mat");
    let data = random_f64(&[25, 25], 1);
    Level5Writer::new(false).numeric("img", &data).write(&path)?;

    let records = read_paths(&[&path])?.expect("one image");
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.name, "img");
    assert!(!record.array.is_lazy());
    assert_eq!(record.channel_axis, None);
    assert_eq!(record.is_pyramid(), None);

    let loaded = record.array.compute()?.into_typed::<f64>()?;
    assert_eq!(loaded.shape(), &[25, 25]);
    for (a, b) in loaded.iter().zip(data.iter()) {
        assert!((a - b).abs() < 1e-12);
    }

    let ContrastLimits::Single([min, max]) = &record.contrast_limits else {
        panic!("expected a single pair of limits");
    };
    let true_min = data.iter().cloned().fold(f64::INFINITY, f64::min);
    let true_max = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    assert!(min.as_f64() >= true_min && max.as_f64() <= true_max);
    Ok(())
}

#[test]
fn test_compressed_classic_stack() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("stack.mat");
    let stack = ArrayD::from_shape_fn(IxDyn(&[22, 24, 30]), |ix| (ix[0] + 22 * ix[1] + 1000 * ix[2]) as u16);
    Level5Writer::new(true)
        .numeric("stack", &stack)
        .numeric("pic", &random_f64(&[30, 40], 2))
        .write(&path)?;

    assert_eq!(detect_format(&path)?, ContainerFormat::Classic);

    let mut reader = MatImageReader::new(ReaderConfig::default().with_seed(1));
    let records = reader.read_path(&path)?;
    assert_eq!(records.len(), 2);

    let stack_record = &records[0];
    assert_eq!(stack_record.name, "stack");
    assert_eq!(stack_record.array.shape(), vec![30, 22, 24]);
    let values = stack_record.array.compute()?.into_typed::<u16>()?;
    assert_eq!(values[[7, 3, 5]], stack[[3, 5, 7]]);

    // Unsigned data always starts at zero
    let ContrastLimits::Single([min, _]) = &stack_record.contrast_limits else {
        panic!("expected a single pair of limits");
    };
    assert_eq!(*min, Scalar::UInt16(0));

    assert_eq!(records[1].name, "pic");
    assert_eq!(records[1].array.shape(), vec![30, 40]);
    Ok(())
}

#[test]
fn test_non_images_are_filtered_and_discarded() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("mixed.mat");
    Level5Writer::new(false)
        .numeric("lut", &random_f64(&[5, 5], 3))
        .chars("label", &[30, 30], 'x')
        .numeric("img", &random_f64(&[25, 30], 4))
        .numeric("row", &random_f64(&[1, 300], 5))
        .write(&path)?;

    let container = Container::open(&path)?;
    let variables = container.variables()?;
    let names: Vec<&str> = variables.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["lut", "label", "img", "row"]);
    assert_eq!(variables[1].dtype, None);
    assert_eq!(variables[2].dtype, Some(DType::Float64));

    // The char array passes the shape filter but is dropped after loading
    let loaded = load_image_variables(&path, &ReaderConfig::default())?;
    let loaded_names: Vec<&str> = loaded.arrays.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(loaded_names, vec!["img"]);
    assert!(loaded.skipped.is_empty());
    Ok(())
}

#[test]
fn test_logical_and_narrow_storage() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("mask.mat");
    let mask = ArrayD::from_shape_fn(IxDyn(&[30, 30]), |ix| ix[0] > ix[1]);
    let small = ArrayD::from_shape_fn(IxDyn(&[30, 30]), |ix| ((ix[0] * ix[1]) % 200) as u8);
    Level5Writer::new(false)
        .logical("mask", &mask)
        .double_stored_as_u8("counts", &small)
        .write(&path)?;

    let records = read_paths(&[&path])?.expect("two images");
    assert_eq!(records[0].array.dtype(), DType::Bool);
    assert_eq!(records[0].array.compute()?.into_typed::<bool>()?, mask);

    assert_eq!(records[1].array.dtype(), DType::Float64);
    let counts = records[1].array.compute()?.into_typed::<f64>()?;
    assert_eq!(counts[[7, 9]], 63.0);
    Ok(())
}

#[test]
fn test_malformed_variable_is_skipped() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("partial.mat");
    Level5Writer::new(true)
        .truncated_double("broken", &[30, 30])
        .numeric("img", &random_f64(&[25, 25], 6))
        .write(&path)?;

    let mut reader = MatImageReader::new(ReaderConfig::default());
    let report = reader.read_path_report(&path)?;
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].name, "img");
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name, "broken");
    Ok(())
}

#[test]
fn test_hdf5_end_to_end() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("channels.mat");
    let matlab = ArrayD::from_shape_fn(IxDyn(&[27, 25, 30, 3]), |ix| {
        (ix[3] * 1000 + ix[0] + ix[1] + ix[2]) as f64
    });
    write_hdf5_mat(
        &path,
        &[Hdf5Var {
            name: "cube",
            data: matlab.clone(),
            chunks: Some(vec![1, 1, 25, 27]),
        }],
        true,
    )?;

    assert_eq!(detect_format(&path)?, ContainerFormat::Hdf5);

    // One slice per chunk on the longest axis is widened before opening
    let loaded = load_image_variables(&path, &ReaderConfig::default())?;
    let LoadedArray::Lazy(lazy) = &loaded.arrays[0].1 else {
        panic!("HDF5 variables load lazily");
    };
    assert_eq!(lazy.shape(), vec![3, 30, 25, 27]);
    assert_eq!(lazy.chunks(), vec![1, 10, 25, 27]);

    let records = read_paths(&[&path])?.expect("one image");
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.array.shape(), vec![30, 27, 25, 3]);
    assert_eq!(record.channel_axis, Some(3));
    assert_eq!(record.is_pyramid(), Some(false));

    let ContrastLimits::PerChannel(limits) = &record.contrast_limits else {
        panic!("4D records carry one pair per channel");
    };
    assert_eq!(limits.len(), 3);
    for (channel, [min, max]) in limits.iter().enumerate() {
        // Every slice is sampled (30 <= 100), so the limits are exact
        let base = (channel * 1000) as f64;
        assert_eq!(*min, Scalar::Float64(base));
        assert_eq!(*max, Scalar::Float64(base + 26.0 + 24.0 + 29.0));
    }

    let values = record.array.compute()?.into_typed::<f64>()?;
    assert_eq!(values[[12, 4, 20, 2]], matlab[[4, 20, 12, 2]]);

    let (_, meta) = record.clone().into_layer_data();
    let json = serde_json::to_value(&meta).expect("metadata serializes");
    assert_eq!(json["channel_axis"], 3);
    assert_eq!(json["is_pyramid"], false);
    assert_eq!(json["contrast_limits"].as_array().map(Vec::len), Some(3));
    Ok(())
}

#[test]
fn test_hdf5_plain_file_and_reserved_names() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("plain.mat");
    write_hdf5_mat(
        &path,
        &[
            Hdf5Var {
                name: "img",
                data: random_f64(&[45, 200], 7),
                chunks: None,
            },
            Hdf5Var {
                name: "#refs#",
                data: random_f64(&[50, 50], 8),
                chunks: None,
            },
        ],
        false,
    )?;
    add_hdf5_group(&path, "#subsystem#")?;

    assert_eq!(detect_format(&path)?, ContainerFormat::Hdf5);
    let container = Container::open(&path)?;
    let names: Vec<String> = container.variables()?.into_iter().map(|v| v.name).collect();
    assert_eq!(names, vec!["img".to_string()]);

    // 2D arrays come back in MATLAB order
    let records = read_paths(&[&path])?.expect("one image");
    assert_eq!(records[0].array.shape(), vec![45, 200]);
    assert!(records[0].metadata().channel_axis.is_none());
    Ok(())
}

#[test]
fn test_format_errors() -> Result<()> {
    let dir = tempdir()?;

    let garbage = dir.path().join("garbage.mat");
    std::fs::write(&garbage, vec![0x42u8; 4096])?;
    assert!(matches!(
        read_paths(&[&garbage]),
        Err(MatImagesError::FormatError { .. })
    ));

    let tiny = dir.path().join("tiny.mat");
    std::fs::write(&tiny, b"MATLAB")?;
    assert!(matches!(detect_format(&tiny), Err(MatImagesError::FormatError { .. })));

    // A v7.3 header with nothing behind it
    let hollow = dir.path().join("hollow.mat");
    let mut bytes = mat_header(0x0200);
    bytes.resize(2048, 0);
    std::fs::write(&hollow, bytes)?;
    assert!(matches!(detect_format(&hollow), Err(MatImagesError::FormatError { .. })));

    let missing = dir.path().join("missing.mat");
    assert!(matches!(read_paths(&[&missing]), Err(MatImagesError::IoError(_))));
    Ok(())
}

#[test]
fn test_no_images_returns_none() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("small.mat");
    Level5Writer::new(false)
        .numeric("a", &random_f64(&[3, 3], 9))
        .numeric("b", &random_f64(&[1, 100], 10))
        .write(&path)?;

    assert!(read_paths(&[&path])?.is_none());
    Ok(())
}

#[test]
fn test_multiple_paths_flatten_in_order() -> Result<()> {
    let dir = tempdir()?;
    let first = dir.path().join("first.mat");
    let second = dir.path().join("second.mat");
    Level5Writer::new(false).numeric("one", &random_f64(&[25, 25], 11)).write(&first)?;
    Level5Writer::new(true)
        .numeric("two", &random_f64(&[25, 25], 12))
        .numeric("three", &random_f64(&[25, 25], 13))
        .write(&second)?;

    let reader = get_reader(&[&first, &second]).expect(".mat accepted");
    let records = reader(&[first, second])?.expect("three images");
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["one", "two", "three"]);
    Ok(())
}

#[test]
fn test_get_reader_extension_filter() {
    assert!(get_reader(&["scan.mat"]).is_some());
    assert!(get_reader(&["scan.mat", "notes.txt"]).is_some());
    assert!(get_reader(&["scan.tif"]).is_none());
    assert!(get_reader(&["notes.txt", "scan.mat"]).is_none());
    assert!(get_reader::<PathBuf>(&[]).is_none());
}

#[test]
fn test_seeded_sampling_is_reproducible() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("volume.mat");
    Level5Writer::new(false)
        .numeric("vol", &random_f64(&[24, 24, 200], 14))
        .write(&path)?;

    let config = ReaderConfig::default().with_seed(42).with_contrast_samples(Some(5));
    let first = MatImageReader::new(config.clone()).read_path(&path)?;
    let second = MatImageReader::new(config).read_path(&path)?;
    assert_eq!(first[0].contrast_limits, second[0].contrast_limits);
    assert_eq!(first[0].array.shape(), vec![200, 24, 24]);

    let rng = StdRng::seed_from_u64(42);
    let injected = MatImageReader::with_rng(ReaderConfig::default().with_contrast_samples(Some(5)), rng)
        .read_path(&path)?;
    assert_eq!(injected[0].contrast_limits, first[0].contrast_limits);
    Ok(())
}

#[test]
fn test_describe_variables() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("catalog.mat");
    Level5Writer::new(true)
        .numeric("zeta", &random_f64(&[30, 30], 15))
        .numeric("alpha", &random_f64(&[2, 2], 16))
        .chars("name", &[1, 12], 'a')
        .write(&path)?;

    let described = describe_variables(&path, 20)?;
    let names: Vec<&str> = described.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "name", "zeta"]);
    assert!(described[2].is_image);
    assert_eq!(described[2].kind, "float64");
    assert_eq!(described[2].estimated_size_bytes, Some(30 * 30 * 8));
    assert_eq!(described[1].kind, "other");
    assert_eq!(described[1].estimated_size_bytes, None);
    Ok(())
}

#[test]
fn test_big_endian_classic_file() -> Result<()> {
    let dir = tempdir()?;
    for compress in [false, true] {
        let path = dir.path().join(format!("big_endian_{compress}.mat"));
        let plane = random_f64(&[25, 30], 17);
        let stack = ArrayD::from_shape_fn(IxDyn(&[21, 22, 40]), |ix| {
            (ix[0] as i16 - 10) * 100 + ix[1] as i16 - ix[2] as i16
        });
        Level5Writer::big_endian(compress)
            .numeric("plane", &plane)
            .numeric("stack", &stack)
            .chars("label", &[1, 8], 'q')
            .write(&path)?;

        assert_eq!(detect_format(&path)?, ContainerFormat::Classic);
        let reader = ClassicReader::open(&path)?;
        assert_eq!(reader.header().byte_order, ByteOrder::BigEndian);

        let names: Vec<String> = reader.variables()?.into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["plane", "stack", "label"]);

        let loaded = reader.load(&names)?;
        assert!(loaded.skipped.is_empty());
        assert_eq!(loaded.arrays.len(), 2);
        assert_eq!(loaded.arrays[0].1.compute()?.into_typed::<f64>()?, plane);
        assert_eq!(loaded.arrays[1].1.dtype(), DType::Int16);
        assert_eq!(loaded.arrays[1].1.compute()?.into_typed::<i16>()?, stack);
    }
    Ok(())
}

#[test]
fn test_nan_masked_images_are_kept() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("masked.mat");
    let mut masked = ArrayD::from_elem(IxDyn(&[40, 40]), f64::NAN);
    masked[[0, 0]] = 1.0;
    let blank = ArrayD::from_elem(IxDyn(&[30, 30]), f64::NAN);
    Level5Writer::new(false)
        .numeric("masked", &masked)
        .numeric("blank", &blank)
        .write(&path)?;

    // A handful of samples will almost surely miss the one real value
    let config = ReaderConfig::default().with_seed(1).with_contrast_samples(Some(5));
    let report = MatImageReader::new(config).read_path_report(&path)?;
    assert!(report.skipped.is_empty());
    assert_eq!(report.records.len(), 2);

    assert_eq!(
        report.records[0].contrast_limits,
        ContrastLimits::Single([Scalar::Float64(1.0), Scalar::Float64(1.0)])
    );

    let ContrastLimits::Single([min, max]) = &report.records[1].contrast_limits else {
        panic!("expected a single pair of limits");
    };
    assert!(matches!(min, Scalar::Float64(v) if v.is_nan()));
    assert!(matches!(max, Scalar::Float64(v) if v.is_nan()));

    let json = serde_json::to_value(report.records[1].metadata()).expect("metadata serializes");
    assert!(json["contrast_limits"][0].is_null());

    assert_eq!(read_paths(&[&path])?.map(|records| records.len()), Some(2));
    Ok(())
}

#[test]
fn test_oversized_dimensions_are_skipped() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("oversized.mat");
    Level5Writer::new(false)
        .truncated_double("huge", &[2_000_000_000; 3])
        .numeric("img", &random_f64(&[25, 25], 18))
        .write(&path)?;

    let report = MatImageReader::new(ReaderConfig::default()).read_path_report(&path)?;
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].name, "img");
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name, "huge");
    assert!(report.skipped[0].reason.contains("overflow"));

    let described = describe_variables(&path, 20)?;
    let huge = described.iter().find(|v| v.name == "huge").expect("listed");
    assert_eq!(huge.total_elements, usize::MAX);
    assert_eq!(huge.estimated_size_bytes, None);
    Ok(())
}

#[test]
fn test_hdf5_catalog_lists_non_numeric_datasets() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("strings.mat");
    write_hdf5_mat(
        &path,
        &[Hdf5Var {
            name: "img",
            data: random_f64(&[30, 30], 19),
            chunks: None,
        }],
        true,
    )?;
    add_hdf5_string_dataset(&path, "notes", &[40, 40])?;

    let container = Container::open(&path)?;
    let variables = container.variables()?;
    let notes = variables.iter().find(|v| v.name == "notes").expect("listed");
    assert_eq!(notes.dtype, None);
    assert_eq!(notes.shape, vec![40, 40]);

    // The string dataset passes the shape filter but never becomes a record
    let records = read_paths(&[&path])?.expect("one image");
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["img"]);
    Ok(())
}
