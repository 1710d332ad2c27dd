//! Integration tests for loading, indexing, and querying a synthetic corpus.

use refer_contracts::{
    Annotation, Bbox, Category, Image, InstancesFile, Reference, Sentence, ValidationError,
};
use refer_dataset::{
    summarize_corpus, Corpus, CorpusIndex, DatasetName, EntityKind, Refer, ReferError,
};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

fn sentence(sent_id: u64, raw: &str) -> Sentence {
    Sentence {
        sent_id,
        raw: raw.to_string(),
        tokens: raw.split_whitespace().map(str::to_string).collect(),
        sent: Some(raw.to_lowercase()),
    }
}

fn reference(ref_id: u64, ann_id: u64, image_id: u64, category_id: u64, split: &str) -> Reference {
    Reference {
        ref_id,
        ann_id,
        category_id,
        image_id,
        split: split.to_string(),
        sentences: vec![
            sentence(ref_id * 10, &format!("object {ref_id} on the left")),
            sentence(ref_id * 10 + 1, &format!("the {ref_id} thing")),
        ],
        file_name: Some(format!("COCO_train2014_{image_id:012}_{ref_id}.jpg")),
        sent_ids: vec![ref_id * 10, ref_id * 10 + 1],
    }
}

fn annotation(id: u64, image_id: u64, category_id: u64, bbox: [f64; 4]) -> Annotation {
    Annotation {
        id,
        image_id,
        category_id,
        bbox: Bbox(bbox),
        segmentation: None,
        area: Some(bbox[2] * bbox[3]),
        iscrowd: Some(0),
    }
}

fn image(id: u64) -> Image {
    Image {
        id,
        file_name: format!("COCO_train2014_{id:012}.jpg"),
        width: Some(640),
        height: Some(480),
        extra: Default::default(),
    }
}

fn fixture_refs() -> Vec<Reference> {
    vec![
        reference(100, 10, 1, 1, "train"),
        reference(101, 11, 1, 2, "val"),
        reference(102, 12, 2, 1, "testA"),
        reference(103, 13, 3, 2, "testAB"),
    ]
}

fn fixture_instances() -> InstancesFile {
    InstancesFile {
        images: vec![image(1), image(2), image(3)],
        annotations: vec![
            annotation(10, 1, 1, [10.0, 20.0, 30.0, 40.0]),
            annotation(11, 1, 2, [0.0, 0.0, 50.0, 50.0]),
            annotation(12, 2, 1, [5.0, 5.0, 10.0, 10.0]),
            annotation(13, 3, 2, [1.0, 1.0, 0.0, 0.0]),
            annotation(14, 3, 1, [2.0, 2.0, 4.0, 4.0]),
        ],
        categories: vec![
            Category {
                id: 1,
                name: "person".into(),
                supercategory: Some("person".into()),
            },
            Category {
                id: 2,
                name: "dog".into(),
                supercategory: Some("animal".into()),
            },
        ],
    }
}

/// Write `refs(unc).p` and `instances.json` for refcoco under `root`.
fn write_corpus(root: &Path) -> anyhow::Result<PathBuf> {
    let ann_dir = root.join("refcoco");
    fs::create_dir_all(&ann_dir)?;
    let mut refs_file = BufWriter::new(File::create(ann_dir.join("refs(unc).p"))?);
    serde_pickle::to_writer(&mut refs_file, &fixture_refs(), serde_pickle::SerOptions::new())?;
    let instances = serde_json::to_vec(&fixture_instances())?;
    fs::write(ann_dir.join("instances.json"), instances)?;
    Ok(root.to_path_buf())
}

fn load_fixture() -> anyhow::Result<(tempfile::TempDir, Refer)> {
    let tmp = tempfile::tempdir()?;
    let root = write_corpus(tmp.path())?;
    let refer = Refer::new(&root, &root.join("images"), "refcoco", "unc")?;
    Ok((tmp, refer))
}

#[test]
fn loads_pickled_refs_and_instances() -> anyhow::Result<()> {
    let (_tmp, refer) = load_fixture()?;
    assert_eq!(refer.dataset(), DatasetName::RefCoco);
    assert_eq!(refer.corpus().refs, fixture_refs());
    assert_eq!(refer.corpus().annotations.len(), 5);
    assert_eq!(refer.index().sentence_count(), 8);
    Ok(())
}

#[test]
fn unfiltered_ref_ids_follow_file_order() -> anyhow::Result<()> {
    let (_tmp, refer) = load_fixture()?;
    assert_eq!(refer.get_ref_ids(&[], &[], &[], None)?, vec![100, 101, 102, 103]);
    assert_eq!(refer.get_ref_ids(&[], &[], &[], Some(""))?, vec![100, 101, 102, 103]);
    Ok(())
}

#[test]
fn filtered_ref_ids_are_subsets_of_all_ids() -> anyhow::Result<()> {
    let (_tmp, refer) = load_fixture()?;
    let all = refer.get_ref_ids(&[], &[], &[], None)?;
    let cases: Vec<(Vec<u64>, Vec<u64>, Vec<u64>, Option<&str>)> = vec![
        (vec![1], vec![], vec![], None),
        (vec![1, 3], vec![2], vec![], None),
        (vec![], vec![1], vec![], Some("test")),
        (vec![], vec![], vec![101, 999], None),
        (vec![42], vec![], vec![], Some("train")),
        (vec![2, 3], vec![], vec![102, 103], Some("testA")),
    ];
    for (images, cats, refs, split) in cases {
        let got = refer.get_ref_ids(&images, &cats, &refs, split)?;
        assert!(got.iter().all(|id| all.contains(id)), "{got:?} not within {all:?}");
    }
    Ok(())
}

#[test]
fn image_and_category_filters_intersect() -> anyhow::Result<()> {
    let (_tmp, refer) = load_fixture()?;
    assert_eq!(refer.get_ref_ids(&[1], &[], &[], None)?, vec![100, 101]);
    assert_eq!(refer.get_ref_ids(&[1], &[2], &[], None)?, vec![101]);
    assert_eq!(refer.get_ref_ids(&[], &[1], &[], None)?, vec![100, 102]);
    assert!(refer.get_ref_ids(&[42], &[], &[], None)?.is_empty());
    Ok(())
}

#[test]
fn load_refs_of_single_ref_filter_returns_that_ref() -> anyhow::Result<()> {
    let (_tmp, refer) = load_fixture()?;
    for id in [100, 101, 102, 103] {
        let ids = refer.get_ref_ids(&[], &[], &[id], None)?;
        let refs = refer.load_refs(&ids)?;
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].ref_id, id);
    }
    Ok(())
}

#[test]
fn split_filter_letter_and_exact_semantics() -> anyhow::Result<()> {
    let (_tmp, refer) = load_fixture()?;
    assert_eq!(refer.get_ref_ids(&[], &[], &[], Some("testA"))?, vec![102, 103]);
    assert_eq!(refer.get_ref_ids(&[], &[], &[], Some("testAB"))?, vec![103]);
    assert_eq!(refer.get_ref_ids(&[], &[], &[], Some("testB"))?, vec![103]);
    assert_eq!(refer.get_ref_ids(&[], &[], &[], Some("test"))?, vec![102, 103]);
    assert_eq!(refer.get_ref_ids(&[], &[], &[], Some("train"))?, vec![100]);
    assert_eq!(refer.get_ref_ids(&[], &[], &[], Some("val"))?, vec![101]);
    assert!(refer.get_ref_ids(&[], &[], &[], Some("testC"))?.is_empty());
    let err = refer.get_ref_ids(&[], &[], &[], Some("holdout")).unwrap_err();
    assert!(matches!(err, ReferError::InvalidSplit(s) if s == "holdout"));
    Ok(())
}

#[test]
fn ref_box_matches_linked_annotation() -> anyhow::Result<()> {
    let (_tmp, refer) = load_fixture()?;
    for id in refer.get_ref_ids(&[], &[], &[], None)? {
        let ann = refer.ref_to_ann(id)?;
        assert_eq!(refer.get_ref_box(id)?, ann.bbox);
        assert_eq!(refer.ann_to_ref(ann.id)?.ref_id, id);
    }
    assert_eq!(refer.get_ref_box(100)?, Bbox::new(10.0, 20.0, 30.0, 40.0));
    assert!(matches!(
        refer.get_ref_box(5).unwrap_err(),
        ReferError::NotFound {
            kind: EntityKind::Ref,
            id: 5
        }
    ));
    Ok(())
}

#[test]
fn ann_ids_narrow_by_ref_filter() -> anyhow::Result<()> {
    let (_tmp, refer) = load_fixture()?;
    assert_eq!(refer.get_ann_ids(&[], &[], &[])?, vec![10, 11, 12, 13, 14]);
    assert_eq!(refer.get_ann_ids(&[3], &[], &[])?, vec![13, 14]);
    assert_eq!(refer.get_ann_ids(&[3], &[1], &[])?, vec![14]);
    assert_eq!(refer.get_ann_ids(&[3], &[], &[103])?, vec![13]);
    assert_eq!(refer.get_ann_ids(&[], &[], &[100, 102])?, vec![10, 12]);
    assert!(refer.get_ann_ids(&[99], &[], &[])?.is_empty());
    assert!(matches!(
        refer.get_ann_ids(&[], &[], &[7]).unwrap_err(),
        ReferError::NotFound { .. }
    ));
    Ok(())
}

#[test]
fn image_and_category_id_listings() -> anyhow::Result<()> {
    let (_tmp, refer) = load_fixture()?;
    assert_eq!(refer.get_img_ids(&[])?, vec![1, 2, 3]);
    assert_eq!(refer.get_img_ids(&[101, 100, 102])?, vec![1, 2]);
    assert_eq!(refer.get_cat_ids(), vec![1, 2]);
    assert_eq!(refer.load_cats(&[2, 1])?, vec!["dog", "person"]);
    assert_eq!(refer.load_imgs(&[3])?[0].file_name, "COCO_train2014_000000000003.jpg");
    assert_eq!(refer.load_anns(&[12])?[0].image_id, 2);
    assert!(matches!(
        refer.load_imgs(&[1, 99]).unwrap_err(),
        ReferError::NotFound {
            kind: EntityKind::Image,
            id: 99
        }
    ));
    assert!(matches!(
        refer.get_img_ids(&[100, 555]).unwrap_err(),
        ReferError::NotFound {
            kind: EntityKind::Ref,
            id: 555
        }
    ));
    Ok(())
}

#[test]
fn sentence_relations() -> anyhow::Result<()> {
    let (_tmp, refer) = load_fixture()?;
    assert_eq!(refer.sent_to_ref(1021)?.ref_id, 102);
    assert_eq!(refer.sent_tokens(1000)?, ["object", "100", "on", "the", "left"]);
    assert_eq!(refer.load_sentence(1031)?.raw, "the 103 thing");
    assert_eq!(refer.image_to_refs(1).len(), 2);
    assert_eq!(refer.image_to_anns(3).len(), 2);
    assert_eq!(refer.cat_to_refs(2).len(), 2);
    assert!(refer.sent_to_ref(5).is_err());
    Ok(())
}

#[test]
fn index_build_is_deterministic() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = write_corpus(tmp.path())?;
    let images = root.join("images");
    let first = Corpus::load(&root, &images, "refcoco", "unc")?;
    let second = Corpus::load(&root, &images, "refcoco", "unc")?;
    assert_eq!(first, second);
    assert_eq!(CorpusIndex::build(&first)?, CorpusIndex::build(&second)?);
    let a = Refer::new(&root, &images, "refcoco", "unc")?;
    let b = Refer::new(&root, &images, "refcoco", "unc")?;
    assert_eq!(a.index(), b.index());
    Ok(())
}

#[test]
fn inverse_dataset_name_shares_storage() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = write_corpus(tmp.path())?;
    let refer = Refer::new(&root, &root, "invrefcoco", "unc")?;
    assert_eq!(refer.dataset(), DatasetName::RefCoco);
    Ok(())
}

#[test]
fn unsupported_dataset_names_fail() {
    let root = Path::new("/nonexistent");
    assert!(matches!(
        Refer::new(root, root, "refclef", "unc").unwrap_err(),
        ReferError::NoRefClefImages
    ));
    assert!(matches!(
        Refer::new(root, root, "flickr30k", "unc").unwrap_err(),
        ReferError::UnsupportedDataset(name) if name == "flickr30k"
    ));
}

#[test]
fn missing_and_malformed_files_fail_to_load() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = write_corpus(tmp.path())?;
    let err = Refer::new(&root, &root, "refcoco", "umd").unwrap_err();
    assert!(matches!(err, ReferError::Io { .. }));

    fs::write(root.join("refcoco").join("instances.json"), b"{not json")?;
    let err = Refer::new(&root, &root, "refcoco", "unc").unwrap_err();
    assert!(matches!(err, ReferError::Json { .. }));

    fs::write(root.join("refcoco").join("refs(unc).p"), b"garbage")?;
    let err = Refer::new(&root, &root, "refcoco", "unc").unwrap_err();
    assert!(matches!(err, ReferError::Pickle { .. }));
    Ok(())
}

#[test]
fn dangling_annotation_is_reported_at_build_time() {
    let mut refs = fixture_refs();
    refs[1].ann_id = 999;
    let corpus = Corpus::from_parts(
        DatasetName::RefCoco,
        "unc",
        Path::new("images"),
        refs,
        fixture_instances(),
    );
    assert!(matches!(
        Refer::from_corpus(corpus).unwrap_err(),
        ReferError::DanglingAnnotation {
            ref_id: 101,
            ann_id: 999
        }
    ));
}

#[test]
fn duplicate_ids_and_orphans_are_rejected() {
    let mut refs = fixture_refs();
    refs[2].ref_id = 100;
    let corpus = Corpus::from_parts(
        DatasetName::RefCoco,
        "unc",
        Path::new("images"),
        refs,
        fixture_instances(),
    );
    assert!(matches!(
        CorpusIndex::build(&corpus).unwrap_err(),
        ReferError::DuplicateId {
            kind: EntityKind::Ref,
            id: 100
        }
    ));

    let mut instances = fixture_instances();
    instances.annotations[4].image_id = 77;
    let corpus = Corpus::from_parts(
        DatasetName::RefCoco,
        "unc",
        Path::new("images"),
        fixture_refs(),
        instances,
    );
    assert!(matches!(
        CorpusIndex::build(&corpus).unwrap_err(),
        ReferError::OrphanAnnotation {
            ann_id: 14,
            image_id: 77
        }
    ));

    let mut refs = fixture_refs();
    refs[1].ann_id = 10;
    refs[1].image_id = 1;
    let corpus = Corpus::from_parts(
        DatasetName::RefCoco,
        "unc",
        Path::new("images"),
        refs,
        fixture_instances(),
    );
    assert!(matches!(
        CorpusIndex::build(&corpus).unwrap_err(),
        ReferError::SharedAnnotation {
            ann_id: 10,
            first: 100,
            second: 101
        }
    ));
}

#[test]
fn ref_image_must_match_its_annotation() {
    let mut refs = fixture_refs();
    refs[0].image_id = 99;
    let corpus = Corpus::from_parts(
        DatasetName::RefCoco,
        "unc",
        Path::new("images"),
        refs,
        fixture_instances(),
    );
    assert!(matches!(
        Refer::from_corpus(corpus).unwrap_err(),
        ReferError::RefImageMismatch {
            ref_id: 100,
            image_id: 99,
            ann_image_id: 1
        }
    ));
}

#[test]
fn in_memory_corpus_records_are_validated() {
    let mut instances = fixture_instances();
    instances.annotations[0].bbox = Bbox([f64::NAN, 0.0, 1.0, 1.0]);
    let corpus = Corpus::from_parts(
        DatasetName::RefCoco,
        "unc",
        Path::new("images"),
        fixture_refs(),
        instances,
    );
    assert!(matches!(
        Refer::from_corpus(corpus).unwrap_err(),
        ReferError::InvalidRecord {
            kind: EntityKind::Annotation,
            source: ValidationError::InvalidBbox { ann_id: 10, .. }
        }
    ));

    let mut refs = fixture_refs();
    refs[3].split = " ".into();
    let corpus = Corpus::from_parts(
        DatasetName::RefCoco,
        "unc",
        Path::new("images"),
        refs,
        fixture_instances(),
    );
    assert!(matches!(
        CorpusIndex::build(&corpus).unwrap_err(),
        ReferError::InvalidRecord {
            kind: EntityKind::Ref,
            source: ValidationError::EmptySplit(103)
        }
    ));
}

#[test]
fn summary_counts_splits_and_empty_boxes() -> anyhow::Result<()> {
    let (_tmp, refer) = load_fixture()?;
    let summary = summarize_corpus(&refer);
    assert_eq!(summary.dataset, "refcoco");
    assert_eq!(summary.refs, 4);
    assert_eq!(summary.sentences, 8);
    assert_eq!(summary.refs_by_split.get("testAB"), Some(&1));
    assert_eq!(summary.refs_with_empty_boxes, 1);
    assert_eq!(summary.refs_without_sentences, 0);
    Ok(())
}
