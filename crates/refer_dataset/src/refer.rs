//! Read-only query layer over an indexed corpus.

use crate::index::CorpusIndex;
use crate::store::Corpus;
use crate::types::{DatasetName, DatasetResult, EntityKind, ReferError, SplitFilter};
use refer_contracts::{
    AnnId, Annotation, Bbox, Category, CategoryId, Image, ImageId, RefId, Reference, SentId,
    Sentence,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;
use tracing::info;

fn lookup<'a, T>(
    map: &HashMap<u64, usize>,
    items: &'a [T],
    id: u64,
    kind: EntityKind,
) -> DatasetResult<&'a T> {
    map.get(&id)
        .map(|&pos| &items[pos])
        .ok_or(ReferError::NotFound { kind, id })
}

/// Loaded and indexed referring-expression corpus.
///
/// Every filter argument is a list; an empty list means "no filter". Callers
/// holding a single id pass `&[id]`.
#[derive(Debug, Clone)]
pub struct Refer {
    corpus: Corpus,
    index: CorpusIndex,
}

impl Refer {
    /// Load `<corpus_root>/<dataset>/refs(<split_by>).p` and `instances.json`, then index them.
    pub fn new(
        corpus_root: &Path,
        image_root: &Path,
        dataset: &str,
        split_by: &str,
    ) -> DatasetResult<Self> {
        let start = Instant::now();
        let corpus = Corpus::load(corpus_root, image_root, dataset, split_by)?;
        let refer = Self::from_corpus(corpus)?;
        info!("DONE (t={:.2}s)", start.elapsed().as_secs_f64());
        Ok(refer)
    }

    pub fn from_corpus(corpus: Corpus) -> DatasetResult<Self> {
        info!("creating index...");
        let index = CorpusIndex::build(&corpus)?;
        info!(
            refs = index.ref_count(),
            sentences = index.sentence_count(),
            "index created"
        );
        Ok(Self { corpus, index })
    }

    pub fn dataset(&self) -> DatasetName {
        self.corpus.dataset
    }

    pub fn image_root(&self) -> &Path {
        &self.corpus.image_root
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn index(&self) -> &CorpusIndex {
        &self.index
    }

    pub fn get_ref_ids(
        &self,
        image_ids: &[ImageId],
        cat_ids: &[CategoryId],
        ref_ids: &[RefId],
        split: Option<&str>,
    ) -> DatasetResult<Vec<RefId>> {
        let split = split
            .filter(|s| !s.is_empty())
            .map(SplitFilter::parse)
            .transpose()?;
        if image_ids.is_empty() && cat_ids.is_empty() && ref_ids.is_empty() && split.is_none() {
            return Ok(self.corpus.refs.iter().map(|r| r.ref_id).collect());
        }

        let mut refs: Vec<&Reference> = if image_ids.is_empty() {
            self.corpus.refs.iter().collect()
        } else {
            image_ids
                .iter()
                .filter_map(|id| self.index.img_to_refs.get(id))
                .flatten()
                .map(|&pos| &self.corpus.refs[pos])
                .collect()
        };
        if !cat_ids.is_empty() {
            let cats: HashSet<CategoryId> = cat_ids.iter().copied().collect();
            refs.retain(|r| cats.contains(&r.category_id));
        }
        if !ref_ids.is_empty() {
            let wanted: HashSet<RefId> = ref_ids.iter().copied().collect();
            refs.retain(|r| wanted.contains(&r.ref_id));
        }
        if let Some(filter) = &split {
            refs.retain(|r| filter.matches(&r.split));
        }
        Ok(refs.into_iter().map(|r| r.ref_id).collect())
    }

    /// Annotation ids filtered by image, category, and the annotations the given refs point at.
    pub fn get_ann_ids(
        &self,
        image_ids: &[ImageId],
        cat_ids: &[CategoryId],
        ref_ids: &[RefId],
    ) -> DatasetResult<Vec<AnnId>> {
        if image_ids.is_empty() && cat_ids.is_empty() && ref_ids.is_empty() {
            return Ok(self.corpus.annotations.iter().map(|a| a.id).collect());
        }

        let mut anns: Vec<&Annotation> = if image_ids.is_empty() {
            self.corpus.annotations.iter().collect()
        } else {
            image_ids
                .iter()
                .filter_map(|id| self.index.img_to_anns.get(id))
                .flatten()
                .map(|&pos| &self.corpus.annotations[pos])
                .collect()
        };
        if !cat_ids.is_empty() {
            let cats: HashSet<CategoryId> = cat_ids.iter().copied().collect();
            anns.retain(|a| cats.contains(&a.category_id));
        }
        if !ref_ids.is_empty() {
            let wanted = ref_ids
                .iter()
                .map(|&id| self.load_ref(id).map(|r| r.ann_id))
                .collect::<DatasetResult<HashSet<AnnId>>>()?;
            anns.retain(|a| wanted.contains(&a.id));
        }
        Ok(anns.into_iter().map(|a| a.id).collect())
    }

    /// Distinct image ids of the given refs (first-seen order), or every image id.
    pub fn get_img_ids(&self, ref_ids: &[RefId]) -> DatasetResult<Vec<ImageId>> {
        if ref_ids.is_empty() {
            return Ok(self.corpus.images.iter().map(|i| i.id).collect());
        }
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for &id in ref_ids {
            let image_id = self.load_ref(id)?.image_id;
            if seen.insert(image_id) {
                out.push(image_id);
            }
        }
        Ok(out)
    }

    pub fn get_cat_ids(&self) -> Vec<CategoryId> {
        self.corpus.categories.iter().map(|c| c.id).collect()
    }

    pub fn load_ref(&self, id: RefId) -> DatasetResult<&Reference> {
        lookup(&self.index.refs, &self.corpus.refs, id, EntityKind::Ref)
    }

    pub fn load_ann(&self, id: AnnId) -> DatasetResult<&Annotation> {
        lookup(
            &self.index.anns,
            &self.corpus.annotations,
            id,
            EntityKind::Annotation,
        )
    }

    pub fn load_img(&self, id: ImageId) -> DatasetResult<&Image> {
        lookup(&self.index.imgs, &self.corpus.images, id, EntityKind::Image)
    }

    pub fn load_cat(&self, id: CategoryId) -> DatasetResult<&Category> {
        lookup(
            &self.index.cats,
            &self.corpus.categories,
            id,
            EntityKind::Category,
        )
    }

    /// Batch lookup; the first missing id fails the whole batch.
    pub fn load_refs(&self, ids: &[RefId]) -> DatasetResult<Vec<&Reference>> {
        ids.iter().map(|&id| self.load_ref(id)).collect()
    }

    pub fn load_anns(&self, ids: &[AnnId]) -> DatasetResult<Vec<&Annotation>> {
        ids.iter().map(|&id| self.load_ann(id)).collect()
    }

    pub fn load_imgs(&self, ids: &[ImageId]) -> DatasetResult<Vec<&Image>> {
        ids.iter().map(|&id| self.load_img(id)).collect()
    }

    /// Category names for the given ids.
    pub fn load_cats(&self, ids: &[CategoryId]) -> DatasetResult<Vec<&str>> {
        ids.iter()
            .map(|&id| self.load_cat(id).map(|c| c.name.as_str()))
            .collect()
    }

    /// `[x, y, width, height]` in original image pixels of the annotation behind `ref_id`.
    pub fn get_ref_box(&self, ref_id: RefId) -> DatasetResult<Bbox> {
        self.ref_to_ann(ref_id).map(|ann| ann.bbox)
    }

    pub fn ref_to_ann(&self, ref_id: RefId) -> DatasetResult<&Annotation> {
        self.index
            .ref_to_ann
            .get(&ref_id)
            .map(|&pos| &self.corpus.annotations[pos])
            .ok_or(ReferError::NotFound {
                kind: EntityKind::Ref,
                id: ref_id,
            })
    }

    pub fn ann_to_ref(&self, ann_id: AnnId) -> DatasetResult<&Reference> {
        lookup(
            &self.index.ann_to_ref,
            &self.corpus.refs,
            ann_id,
            EntityKind::Annotation,
        )
    }

    pub fn image_to_refs(&self, image_id: ImageId) -> Vec<&Reference> {
        self.index
            .img_to_refs
            .get(&image_id)
            .map(|positions| positions.iter().map(|&p| &self.corpus.refs[p]).collect())
            .unwrap_or_default()
    }

    pub fn image_to_anns(&self, image_id: ImageId) -> Vec<&Annotation> {
        self.index
            .img_to_anns
            .get(&image_id)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&p| &self.corpus.annotations[p])
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn cat_to_refs(&self, cat_id: CategoryId) -> Vec<&Reference> {
        self.index
            .cat_to_refs
            .get(&cat_id)
            .map(|positions| positions.iter().map(|&p| &self.corpus.refs[p]).collect())
            .unwrap_or_default()
    }

    fn sentence_position(&self, sent_id: SentId) -> DatasetResult<(usize, usize)> {
        self.index
            .sents
            .get(&sent_id)
            .copied()
            .ok_or(ReferError::NotFound {
                kind: EntityKind::Sentence,
                id: sent_id,
            })
    }

    pub fn load_sentence(&self, sent_id: SentId) -> DatasetResult<&Sentence> {
        let (ref_pos, sent_pos) = self.sentence_position(sent_id)?;
        Ok(&self.corpus.refs[ref_pos].sentences[sent_pos])
    }

    pub fn sent_to_ref(&self, sent_id: SentId) -> DatasetResult<&Reference> {
        let (ref_pos, _) = self.sentence_position(sent_id)?;
        Ok(&self.corpus.refs[ref_pos])
    }

    pub fn sent_tokens(&self, sent_id: SentId) -> DatasetResult<&[String]> {
        self.load_sentence(sent_id).map(|s| s.tokens.as_slice())
    }
}
