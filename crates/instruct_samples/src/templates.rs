//! Fixed instruction pools. Every template holds exactly one `{}` slot.

use rand::seq::IndexedRandom;
use rand::Rng;

/// Marker the model replaces with image embeddings.
pub const IMAGE_PLACEHOLDER: &str = "<Img><ImageHere></Img>";

/// Sentence -> box.
pub const REFER_POOL: &[&str] = &[
    "[refer] {}",
    "[refer] give me the location of {}",
    "[refer] where is {} ?",
    "[refer] from this image, tell me the location of {}",
    "[refer] the location of {} is",
    "[refer] could you tell me the location for {} ?",
    "[refer] where can I locate the {} ?",
];

/// Box -> sentence.
pub const IDENTIFY_POOL: &[&str] = &[
    "[identify] {}",
    "[identify] what object is in this location {}",
    "[identify] identify the object present at this location {}",
    "[identify] what is it in {}",
    "[identify] describe this object in {}",
    "[identify] this {} is",
    "[identify] the object in {} is",
];

/// Box -> object name, already wrapped with the image placeholder.
pub const BBOX_TO_OBJECT_POOL: &[&str] = &[
    "<Img><ImageHere></Img> what object is in this bounding box location {} ",
    "<Img><ImageHere></Img> what object is in this location {} ",
    "<Img><ImageHere></Img> identify the object present at this location {} ",
    "<Img><ImageHere></Img> what is it in bounding box location{} ",
    "<Img><ImageHere></Img> describe this object in {} ",
    "<Img><ImageHere></Img> this {} is ",
    "<Img><ImageHere></Img> the object in {} is ",
    "<Img><ImageHere></Img> please tell me what is inside the bounding box position {} ",
    "<Img><ImageHere></Img> what can you find in the bounding box area at position {}? ",
    "<Img><ImageHere></Img> what is the object occupying this area {} ",
    "<Img><ImageHere></Img> could you identify the content within the bounding box located at {} ",
];

pub const IDENTIFY_ALL_INSTRUCTION: &str = "Given an image, identify the objects and their bounding boxes in the format of {object,x1 y1 x2 y2}. ";

/// Substitute `value` into the template's single `{}` slot.
pub fn fill(template: &str, value: &str) -> String {
    template.replacen("{}", value, 1)
}

/// Pick one template uniformly at random.
pub fn choose<'a, R: Rng + ?Sized>(pool: &[&'a str], rng: &mut R) -> &'a str {
    pool.choose(rng).copied().unwrap_or("{}")
}

/// `"<Img><ImageHere></Img> {instruction} "`, the wrapper used by the referring tasks.
pub fn with_image_prefix(instruction: &str) -> String {
    format!("{IMAGE_PLACEHOLDER} {instruction} ")
}
