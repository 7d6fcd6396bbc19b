//! Heuristic image classifier
//!
//! Pure functions over a caption and pixel dimensions. They decide how far the
//! vision model's caption can be believed and whether an OCR pass is worth
//! running. Nothing here performs I/O, so every result can be recomputed
//! offline from the three output columns CAPTION, WIDTH and HEIGHT.
//!
//! # Type classification order
//! First match wins:
//! 1. square and longer side < 80 → icon
//! 2. square → logo
//! 3. width > 400 and width > 2 × height → banner
//! 4. caption contains "photograph" → photograph
//! 5. trustworthy caption → photograph
//! 6. caption contains "a blurry" → banner
//! 7. graphic-design keyword and longer side > 400 → banner
//! 8. graphic-design keyword → logo
//! 9. otherwise → unknown
//!
//! Unknown dimensions (a side of 0) never count as square and never fall in
//! an aspect band, so rules 1, 2 and 5 cannot match them. The remaining rules
//! apply to the raw numbers: a 0×0 sign is a logo, 500×0 is a banner.
//!
//! Keyword matching is case-sensitive. Captioning models emit lower case, and
//! "Photograph" or "SIGN" from any other source does not trigger a rule.

use crate::models::{Classification, Dimensions};

/// Captions for logos, banners and other designed artwork
pub const GRAPHIC_DESIGN_WORDS: &[&str] = &["sign", "poster", "collage", "clock"];

pub const PERSON_WORDS: &[&str] = &[
    "person", "people", "man", "men", "woman", "women", "boy", "boys", "girl", "girls", "child",
    "children", "kid", "kids", "baby", "family", "couple", "guy", "lady", "crowd",
];

pub const DWELLING_WORDS: &[&str] = &[
    "house", "houses", "home", "homes", "building", "buildings", "apartment", "room", "bedroom",
    "bathroom", "kitchen", "cabin", "cottage", "villa", "cabana", "hotel", "resort", "condo",
    "patio", "porch",
];

pub const FURNITURE_WORDS: &[&str] = &[
    "chair", "chairs", "table", "tables", "couch", "sofa", "bed", "beds", "desk", "bench",
    "stool", "dresser", "cabinet", "shelf", "bookshelf", "lounge", "recliner", "ottoman",
    "armchair", "hammock",
];

const BLURRY_PHRASES: &[&str] = &["blurry image", "blurry photo"];
const MONOCHROME_PHRASES: &[&str] = &["black and white", "white and black"];

/// Squares smaller than this are icons rather than logos
pub const ICON_MAX_SIDE: u32 = 80;
/// Longer side above which graphics count as large
pub const LARGE_GRAPHIC_SIDE: u32 = 400;

const LANDSCAPE_BAND: (f64, f64) = (1.2, 1.4);
const PORTRAIT_BAND: (f64, f64) = (0.7, 0.8);

/// All heuristic judgments for one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub classification: Classification,
    pub trustworthy: bool,
    pub text_bearing: bool,
}

/// Caption split into words once per judgment
struct CaptionText<'a> {
    raw: &'a str,
    words: Vec<&'a str>,
}

impl<'a> CaptionText<'a> {
    fn new(caption: &'a str) -> Self {
        let words = caption
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        Self { raw: caption, words }
    }

    fn contains(&self, phrase: &str) -> bool {
        self.raw.contains(phrase)
    }

    fn contains_any(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|p| self.contains(p))
    }

    fn has_any_word(&self, vocabulary: &[&str]) -> bool {
        self.words.iter().any(|w| vocabulary.contains(w))
    }

    fn is_graphic_design(&self) -> bool {
        self.has_any_word(GRAPHIC_DESIGN_WORDS)
    }

    fn is_monochrome(&self) -> bool {
        self.contains_any(MONOCHROME_PHRASES)
    }

    fn mentions_photographic_subject(&self) -> bool {
        self.has_any_word(PERSON_WORDS)
            || self.has_any_word(DWELLING_WORDS)
            || self.has_any_word(FURNITURE_WORDS)
    }
}

fn in_band(ratio: f64, (low, high): (f64, f64)) -> bool {
    ratio >= low && ratio <= high
}

fn in_photographic_band(dims: Dimensions) -> bool {
    dims.aspect_ratio()
        .map(|r| in_band(r, LANDSCAPE_BAND) || in_band(r, PORTRAIT_BAND))
        .unwrap_or(false)
}

fn is_banner_shaped(dims: Dimensions) -> bool {
    dims.width > LARGE_GRAPHIC_SIDE
        && u64::from(dims.width) > 2 * u64::from(dims.height)
}

fn trustworthy(text: &CaptionText, dims: Dimensions) -> bool {
    let negative = text.is_graphic_design()
        || text.contains_any(BLURRY_PHRASES)
        || dims.is_square()
        || text.is_monochrome();
    if negative {
        return false;
    }

    in_photographic_band(dims) && text.mentions_photographic_subject()
}

fn text_bearing(text: &CaptionText, dims: Dimensions) -> bool {
    if dims.is_square() && text.is_monochrome() {
        return false;
    }
    text.is_graphic_design() || text.contains("a blurry image")
}

fn classify_text(text: &CaptionText, dims: Dimensions) -> Classification {
    if dims.is_square() {
        return if dims.max_side() < ICON_MAX_SIDE {
            Classification::Icon
        } else {
            Classification::Logo
        };
    }
    if is_banner_shaped(dims) {
        return Classification::Banner;
    }
    if text.contains("photograph") {
        return Classification::Photograph;
    }
    if trustworthy(text, dims) {
        return Classification::Photograph;
    }
    if text.contains("a blurry") {
        return Classification::Banner;
    }
    if text.is_graphic_design() {
        return if dims.max_side() > LARGE_GRAPHIC_SIDE {
            Classification::Banner
        } else {
            Classification::Logo
        };
    }
    Classification::Unknown
}

/// Heuristic type label for an image
pub fn classify(caption: &str, width: u32, height: u32) -> Classification {
    classify_text(&CaptionText::new(caption), Dimensions::new(width, height))
}

/// Whether the caption can be believed as-is
///
/// Requires both the absence of every negative trigger (graphic-design words,
/// blurry phrasing, square shape, black-and-white wording) and positive
/// confirmation (photographic aspect ratio plus a person, dwelling or
/// furniture word).
pub fn is_trustworthy(caption: &str, width: u32, height: u32) -> bool {
    trustworthy(&CaptionText::new(caption), Dimensions::new(width, height))
}

/// Whether the image probably contains readable text (gates OCR)
pub fn is_likely_text_bearing(caption: &str, width: u32, height: u32) -> bool {
    text_bearing(&CaptionText::new(caption), Dimensions::new(width, height))
}

/// Compute every judgment from one caption parse
pub fn assess(caption: &str, dims: Dimensions) -> Assessment {
    let text = CaptionText::new(caption);
    Assessment {
        classification: classify_text(&text, dims),
        trustworthy: trustworthy(&text, dims),
        text_bearing: text_bearing(&text, dims),
    }
}
