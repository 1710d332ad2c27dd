//! COCO box-shard samples built from on-disk image/json pairs.

use image::RgbImage;
use instruct_samples::templates::BBOX_TO_OBJECT_POOL;
use instruct_samples::{
    grid_tokens, index_shard_pairs, load_shard_pair, FormatError, Identity, ImageDims,
    JsonlSampleWriter, SampleTags, ShapeOnly, ShardAnnotation, ShardSampleBuilder, ShardTask,
    TrainingSample,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;

fn annotation() -> ShardAnnotation {
    ShardAnnotation {
        objects: vec!["person".into(), "kite".into()],
        bbox: vec![[0.25, 0.5, 0.1, 0.2], [0.05, 0.12, 0.3, 0.15]],
        caption: "a person flying a kite".into(),
    }
}

fn write_pair(dir: &Path, key: &str, ann: &ShardAnnotation) -> anyhow::Result<()> {
    RgbImage::new(16, 8).save(dir.join(format!("{key}.png")))?;
    fs::write(dir.join(format!("{key}.json")), serde_json::to_vec(ann)?)?;
    Ok(())
}

#[test]
fn grid_tokens_follow_corner_plus_extent() -> anyhow::Result<()> {
    assert_eq!(
        grid_tokens(&annotation())?,
        vec!["<25><50><35><70>", "<5><12><35><27>"]
    );
    Ok(())
}

#[test]
fn identify_all_lists_every_object() -> anyhow::Result<()> {
    let builder = ShardSampleBuilder::new(ShapeOnly, Identity);
    let mut rng = StdRng::seed_from_u64(3);
    let sample = builder.identify_all(RgbImage::new(4, 4), &annotation(), &mut rng)?;
    assert_eq!(
        sample.instruction_input,
        "<Img><ImageHere></Img> Given an image, identify the objects and their bounding boxes in the format of {object,x1 y1 x2 y2}. "
    );
    let forward = "{person,<25><50><35><70>}, {kite,<5><12><35><27>}";
    let reversed = "{kite,<5><12><35><27>}, {person,<25><50><35><70>}";
    assert!(
        sample.answer == forward || sample.answer == reversed,
        "{}",
        sample.answer
    );
    assert_eq!(sample.tags, SampleTags::bbox());
    assert_eq!(sample.image, ImageDims { width: 4, height: 4 });
    Ok(())
}

#[test]
fn bbox_to_object_names_the_sampled_box() -> anyhow::Result<()> {
    let builder = ShardSampleBuilder::new(ShapeOnly, Identity);
    let ann = annotation();
    for seed in 0..8 {
        let mut rng = StdRng::seed_from_u64(seed);
        let sample = builder.build(ShardTask::BboxToObject, RgbImage::new(2, 2), &ann, &mut rng)?;
        let expected_box = match sample.answer.as_str() {
            "person" => "{<25><50><35><70>}",
            "kite" => "{<5><12><35><27>}",
            other => panic!("unexpected answer {other}"),
        };
        assert!(BBOX_TO_OBJECT_POOL
            .iter()
            .any(|t| t.replacen("{}", expected_box, 1) == sample.instruction_input));
    }
    Ok(())
}

#[test]
fn empty_or_mismatched_annotations_are_rejected() {
    let builder = ShardSampleBuilder::new(ShapeOnly, Identity);
    let mut rng = StdRng::seed_from_u64(0);
    let empty = ShardAnnotation {
        objects: Vec::new(),
        bbox: Vec::new(),
        caption: String::new(),
    };
    assert!(matches!(
        builder
            .bbox_to_object(RgbImage::new(1, 1), &empty, &mut rng)
            .unwrap_err(),
        FormatError::NoObjects
    ));

    let mut mismatched = annotation();
    mismatched.objects.pop();
    assert!(matches!(
        builder
            .identify_all(RgbImage::new(1, 1), &mismatched, &mut rng)
            .unwrap_err(),
        FormatError::ObjectBoxMismatch {
            objects: 1,
            boxes: 2
        }
    ));

    let mut outside = annotation();
    outside.bbox[0] = [0.9, 0.0, 0.2, 0.1];
    assert!(matches!(
        builder
            .identify_all(RgbImage::new(1, 1), &outside, &mut rng)
            .unwrap_err(),
        FormatError::OutOfGrid { .. }
    ));
}

#[test]
fn shard_directory_pairs_by_key() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_pair(tmp.path(), "000002", &annotation())?;
    write_pair(tmp.path(), "000001", &annotation())?;
    fs::write(tmp.path().join("000003.json"), b"{}")?;
    fs::write(tmp.path().join("notes.txt"), b"ignored")?;

    let pairs = index_shard_pairs(tmp.path())?;
    let keys: Vec<&str> = pairs.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(keys, vec!["000001", "000002"]);

    let (image, ann) = load_shard_pair(&pairs[0])?;
    assert_eq!(image.dimensions(), (16, 8));
    assert_eq!(ann, annotation());
    Ok(())
}

#[test]
fn exported_samples_round_trip_through_jsonl() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let out = tmp.path().join("nested").join("samples.jsonl");
    let builder = ShardSampleBuilder::new(ShapeOnly, Identity);
    let mut rng = StdRng::seed_from_u64(11);
    let mut writer = JsonlSampleWriter::create(&out)?;
    for task in [ShardTask::IdentifyAll, ShardTask::BboxToObject] {
        let sample = builder.build(task, RgbImage::new(3, 3), &annotation(), &mut rng)?;
        writer.write(&sample)?;
    }
    writer.flush()?;
    drop(writer);

    let mut appender = JsonlSampleWriter::append(&out)?;
    appender.write(&TrainingSample {
        image: ImageDims { width: 1, height: 1 },
        instruction_input: "x".into(),
        answer: "y".into(),
        tags: SampleTags::Image { image_id: 5 },
    })?;
    appender.flush()?;

    let text = fs::read_to_string(&out)?;
    let rows: Vec<TrainingSample<ImageDims>> = text
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].tags, SampleTags::bbox());
    assert_eq!(rows[2].tags, SampleTags::Image { image_id: 5 });
    Ok(())
}
