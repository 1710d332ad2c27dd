//! Id and relation maps derived from a loaded corpus.
//!
//! Maps store positions into the corpus vectors rather than clones, so entity
//! order always follows file order and the index stays cheap to build twice.

use crate::store::Corpus;
use crate::types::{DatasetResult, EntityKind, ReferError};
use refer_contracts::{AnnId, CategoryId, ImageId, RefId, SentId, ValidationError};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusIndex {
    pub(crate) refs: HashMap<RefId, usize>,
    pub(crate) anns: HashMap<AnnId, usize>,
    pub(crate) imgs: HashMap<ImageId, usize>,
    pub(crate) cats: HashMap<CategoryId, usize>,
    /// sent_id -> (ref position, sentence position within the ref).
    pub(crate) sents: HashMap<SentId, (usize, usize)>,
    pub(crate) img_to_anns: HashMap<ImageId, Vec<usize>>,
    pub(crate) img_to_refs: HashMap<ImageId, Vec<usize>>,
    pub(crate) cat_to_refs: HashMap<CategoryId, Vec<usize>>,
    pub(crate) ref_to_ann: HashMap<RefId, usize>,
    pub(crate) ann_to_ref: HashMap<AnnId, usize>,
}

fn insert_unique<K>(
    map: &mut HashMap<K, usize>,
    id: K,
    pos: usize,
    kind: EntityKind,
) -> DatasetResult<()>
where
    K: Eq + Hash + Copy + Into<u64>,
{
    match map.entry(id) {
        Entry::Occupied(_) => Err(ReferError::DuplicateId {
            kind,
            id: id.into(),
        }),
        Entry::Vacant(slot) => {
            slot.insert(pos);
            Ok(())
        }
    }
}

/// Record checks for corpora assembled in memory; file loaders run the same
/// checks with the offending path attached.
fn validate_records(corpus: &Corpus) -> DatasetResult<()> {
    fn invalid(kind: EntityKind) -> impl Fn(ValidationError) -> ReferError {
        move |source| ReferError::InvalidRecord { kind, source }
    }
    for img in &corpus.images {
        img.validate().map_err(invalid(EntityKind::Image))?;
    }
    for cat in &corpus.categories {
        cat.validate().map_err(invalid(EntityKind::Category))?;
    }
    for ann in &corpus.annotations {
        ann.validate().map_err(invalid(EntityKind::Annotation))?;
    }
    for r in &corpus.refs {
        r.validate().map_err(invalid(EntityKind::Ref))?;
    }
    Ok(())
}

impl CorpusIndex {
    /// Build every map in one pass per collection. Fails on invalid records, on
    /// duplicate ids, on refs or annotations that point at missing entities, and
    /// on refs that disagree with their annotation.
    pub fn build(corpus: &Corpus) -> DatasetResult<Self> {
        validate_records(corpus)?;
        let mut index = CorpusIndex::default();

        for (pos, img) in corpus.images.iter().enumerate() {
            insert_unique(&mut index.imgs, img.id, pos, EntityKind::Image)?;
        }
        for (pos, cat) in corpus.categories.iter().enumerate() {
            insert_unique(&mut index.cats, cat.id, pos, EntityKind::Category)?;
        }
        for (pos, ann) in corpus.annotations.iter().enumerate() {
            insert_unique(&mut index.anns, ann.id, pos, EntityKind::Annotation)?;
            if !index.imgs.contains_key(&ann.image_id) {
                return Err(ReferError::OrphanAnnotation {
                    ann_id: ann.id,
                    image_id: ann.image_id,
                });
            }
            index.img_to_anns.entry(ann.image_id).or_default().push(pos);
        }

        for (pos, r) in corpus.refs.iter().enumerate() {
            insert_unique(&mut index.refs, r.ref_id, pos, EntityKind::Ref)?;
            let ann_pos = *index
                .anns
                .get(&r.ann_id)
                .ok_or(ReferError::DanglingAnnotation {
                    ref_id: r.ref_id,
                    ann_id: r.ann_id,
                })?;
            let ann_image_id = corpus.annotations[ann_pos].image_id;
            if r.image_id != ann_image_id {
                return Err(ReferError::RefImageMismatch {
                    ref_id: r.ref_id,
                    image_id: r.image_id,
                    ann_image_id,
                });
            }
            if let Some(&first) = index.ann_to_ref.get(&r.ann_id) {
                return Err(ReferError::SharedAnnotation {
                    ann_id: r.ann_id,
                    first: corpus.refs[first].ref_id,
                    second: r.ref_id,
                });
            }
            index.ann_to_ref.insert(r.ann_id, pos);
            index.img_to_refs.entry(r.image_id).or_default().push(pos);
            index.cat_to_refs.entry(r.category_id).or_default().push(pos);
            index.ref_to_ann.insert(r.ref_id, ann_pos);

            for (sent_pos, sent) in r.sentences.iter().enumerate() {
                if index.sents.insert(sent.sent_id, (pos, sent_pos)).is_some() {
                    return Err(ReferError::DuplicateId {
                        kind: EntityKind::Sentence,
                        id: sent.sent_id,
                    });
                }
            }
        }

        Ok(index)
    }

    pub fn ref_count(&self) -> usize {
        self.refs.len()
    }

    pub fn sentence_count(&self) -> usize {
        self.sents.len()
    }
}
