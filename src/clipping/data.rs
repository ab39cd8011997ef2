use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ClippingError, Result};
use crate::geometry::Quad;

use super::key::ClippingKey;
use super::magic::Segment;
use super::transform::{adjust_bounds, clipping_box, compute_interpolation};

/// Top-level member wrapping a clipping inside a project file
const PROJECT_MEMBER: &str = "ClippingData";

/// Reference segment marked on one keyed frame, used by the alignment tool
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reference {
    pub frame: u32,
    pub segment: Segment,
}

/// A clipping project: the source video, the output size and the authored
/// keys describing the crop over time.
///
/// Keys are kept sorted by frame with at most one key per frame. Every
/// mutator bumps [`Clipping::version`] so callers can detect unsaved changes.
/// The source video geometry is not persisted; it is attached with
/// [`Clipping::set_video_info`] once the video has been opened.
#[derive(Debug, Clone, PartialEq)]
pub struct Clipping {
    video_path: String,
    w: u32,
    h: u32,
    video_w: u32,
    video_h: u32,
    frame_count: u32,
    keys: Vec<ClippingKey>,
    reference: Option<Reference>,
    version: u64,
}

#[derive(Serialize, Deserialize)]
struct ClippingFile {
    #[serde(default)]
    video_path: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    keys: Vec<ClippingKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reference: Option<ReferenceFile>,
}

#[derive(Serialize, Deserialize)]
struct ReferenceFile {
    frame: u32,
    rx1: f64,
    ry1: f64,
    rx2: f64,
    ry2: f64,
}

impl Clipping {
    /// Empty clipping over a `video_w x video_h` video of `frame_count`
    /// frames. The output size starts equal to the video size.
    pub fn new(video_path: &str, video_w: u32, video_h: u32, frame_count: u32) -> Self {
        Self {
            video_path: video_path.to_string(),
            w: video_w,
            h: video_h,
            video_w,
            video_h,
            frame_count,
            keys: Vec::new(),
            reference: None,
            version: 0,
        }
    }

    /// Parse the persisted form produced by [`Clipping::serialize`]
    pub fn load(value: &Value) -> std::result::Result<Self, ClippingError> {
        let file: ClippingFile =
            serde_json::from_value(value.clone()).map_err(|e| ClippingError::ParseFailed {
                reason: e.to_string(),
            })?;

        let mut clipping = Self::new(&file.video_path, 0, 0, 0);
        clipping.w = file.width;
        clipping.h = file.height;

        for key in file.keys {
            clipping.add(key);
        }

        if let Some(r) = file.reference {
            clipping.reference = Some(Reference {
                frame: r.frame,
                segment: Segment::new(r.rx1, r.ry1, r.rx2, r.ry2),
            });
        }

        clipping.version = 0;
        Ok(clipping)
    }

    pub fn serialize(&self) -> Value {
        let mut data = json!({
            "video_path": self.video_path,
            "width": self.w,
            "height": self.h,
            "keys": self.keys,
        });

        if let Some(reference) = self.reference() {
            data["reference"] = json!({
                "frame": reference.frame,
                "rx1": reference.segment.p1.x,
                "ry1": reference.segment.p1.y,
                "rx2": reference.segment.p2.x,
                "ry2": reference.segment.p2.y,
            });
        }

        data
    }

    /// Read a project file. Both a bare clipping object and one wrapped in a
    /// `ClippingData` member are accepted.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let root: Value = serde_json::from_str(&content)?;
        let data = root.get(PROJECT_MEMBER).unwrap_or(&root);

        debug!("Loading clipping from {}", path.as_ref().display());
        Ok(Self::load(data)?)
    }

    /// Write the project file, wrapped in a `ClippingData` member
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let root = json!({ PROJECT_MEMBER: self.serialize() });
        std::fs::write(path, serde_json::to_string_pretty(&root)?)?;
        Ok(())
    }

    /// Attach the source video geometry. A zero output size defaults to the
    /// video size.
    pub fn set_video_info(&mut self, video_w: u32, video_h: u32, frame_count: u32) {
        self.video_w = video_w;
        self.video_h = video_h;
        self.frame_count = frame_count;

        if self.w == 0 || self.h == 0 {
            self.set_wh(video_w, video_h);
        }
    }

    pub fn video_path(&self) -> &str {
        &self.video_path
    }

    pub fn set_video_path(&mut self, path: &str) {
        if path != self.video_path {
            self.bump();
            self.video_path = path.to_string();
        }
    }

    pub fn video_w(&self) -> u32 {
        self.video_w
    }

    pub fn video_h(&self) -> u32 {
        self.video_h
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Whether `width x height` pictures can be rendered with this clipping.
    /// False until [`Clipping::set_video_info`] has run on a loaded project.
    pub fn matches_video(&self, width: u32, height: u32) -> bool {
        self.video_w != 0 && self.video_h != 0 && (self.video_w, self.video_h) == (width, height)
    }

    pub fn w(&self) -> u32 {
        self.w
    }

    pub fn h(&self) -> u32 {
        self.h
    }

    pub fn set_wh(&mut self, w: u32, h: u32) {
        self.bump();
        self.w = w;
        self.h = h;
    }

    /// Bytes of one rendered RGB24 output frame
    pub fn req_buffer_size(&self) -> usize {
        self.w as usize * self.h as usize * 3
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn keys(&self) -> &[ClippingKey] {
        &self.keys
    }

    /// Insert `key`, replacing any key already at its frame
    pub fn add(&mut self, key: ClippingKey) {
        self.bump();
        let mut key = key;
        key.computed = false;

        match self.keys.binary_search_by_key(&key.frame, |k| k.frame) {
            Ok(index) => self.keys[index] = key,
            Err(index) => self.keys.insert(index, key),
        }
    }

    pub fn remove(&mut self, frame: u32) {
        if self.keys.is_empty() {
            return;
        }
        self.bump();
        self.keys.retain(|k| k.frame != frame);
        self.prune_reference();
    }

    /// Drop every key, keeping only the crop in effect at `frame_to_keep`
    pub fn remove_all(&mut self, frame_to_keep: u32) {
        self.bump();
        let key = self.at(frame_to_keep);
        self.keys.clear();
        self.add(key);
        self.prune_reference();
    }

    pub fn clear(&mut self) {
        self.bump();
        self.keys.clear();
        self.reference = None;
    }

    /// Crop in effect at `frame`. Without keys this is the whole output size
    /// centered in the video.
    pub fn at(&self, frame: u32) -> ClippingKey {
        compute_interpolation(frame, &self.keys).unwrap_or_else(|| {
            let mut key = ClippingKey::new(
                frame,
                f64::from(self.video_w / 2),
                f64::from(self.video_h / 2),
                1.0,
                0.0,
            );
            key.computed = true;
            key
        })
    }

    pub fn at_index(&self, index: usize) -> Option<&ClippingKey> {
        self.keys.get(index)
    }

    pub fn find_index(&self, frame: u32) -> Option<usize> {
        self.keys.iter().position(|k| k.frame == frame)
    }

    pub fn first_frame(&self) -> u32 {
        self.keys.first().map_or(1, |k| k.frame)
    }

    pub fn last_frame(&self) -> u32 {
        self.keys.last().map_or(self.frame_count, |k| k.frame)
    }

    pub fn set_reference(&mut self, frame: u32, segment: Segment) {
        self.bump();
        self.reference = Some(Reference { frame, segment });
    }

    pub fn clear_reference(&mut self) {
        self.bump();
        self.reference = None;
    }

    /// The reference pair, as long as its frame still carries a key
    pub fn reference(&self) -> Option<&Reference> {
        self.reference
            .as_ref()
            .filter(|r| self.find_index(r.frame).is_some())
    }

    fn prune_reference(&mut self) {
        if self.reference().is_none() {
            self.reference = None;
        }
    }

    /// Cut the clipping at `frame`.
    ///
    /// With `from_begin` every key up to `frame` is discarded and the crop at
    /// `frame` becomes the first key; otherwise every key from `frame` on is
    /// discarded and it becomes the last one. At least two keys remain.
    pub fn cutoff(&mut self, frame: u32, from_begin: bool) {
        self.bump();
        let mut cut = self.at(frame);

        if from_begin {
            self.keys.retain(|k| k.frame > frame);
        } else {
            self.keys.retain(|k| k.frame < frame);
        }

        let mut frame = frame;
        if from_begin && self.frame_count >= 2 && frame + 1 >= self.frame_count {
            frame = self.frame_count - 2;
        } else if !from_begin && frame == 0 {
            frame = 1;
        }

        cut.frame = frame;
        self.add(cut);

        if self.keys.len() < 2 {
            let other = if from_begin {
                frame + 1
            } else {
                frame.saturating_sub(1)
            };
            let key = self.at(other);
            self.add(key);
        }

        self.prune_reference();
    }

    pub fn define_start(&mut self, frame: u32) {
        self.cutoff(frame, true);
    }

    pub fn define_end(&mut self, frame: u32) {
        self.cutoff(frame, false);
    }

    pub fn cutoff_center(&mut self, frame: u32) {
        self.remove_all(frame);
    }

    /// `key` clamped to the source video
    pub fn constrained(&self, key: ClippingKey) -> ClippingKey {
        adjust_bounds(key, self.w, self.h, self.video_w, self.video_h)
    }

    /// Axis-aligned source area rendered at `frame`
    pub fn bounding_box(&self, frame: u32) -> Quad {
        self.occupied_area(&self.constrained(self.at(frame)))
    }

    fn occupied_area(&self, key: &ClippingKey) -> Quad {
        clipping_box(key, self.w, self.h).occupied_area()
    }

    pub fn positionate_left(&mut self, frame: u32) {
        let mut key = self.at(frame);
        let bb = self.occupied_area(&self.constrained(key));
        if bb[0].x <= 0.0 {
            return;
        }
        key.px -= bb[0].x;
        self.add(key);
    }

    pub fn positionate_right(&mut self, frame: u32) {
        let mut key = self.at(frame);
        let bb = self.occupied_area(&self.constrained(key));
        let video_w = f64::from(self.video_w);
        if bb[1].x >= video_w {
            return;
        }
        key.px = video_w - (bb[1].x - bb[0].x) / 2.0;
        self.add(key);
    }

    pub fn positionate_top(&mut self, frame: u32) {
        let mut key = self.at(frame);
        let bb = self.occupied_area(&self.constrained(key));
        if bb[0].y <= 0.0 {
            return;
        }
        key.py -= bb[0].y;
        self.add(key);
    }

    pub fn positionate_bottom(&mut self, frame: u32) {
        let mut key = self.at(frame);
        let bb = self.occupied_area(&self.constrained(key));
        let video_h = f64::from(self.video_h);
        if bb[2].y >= video_h {
            return;
        }
        key.py = video_h - (bb[2].y - bb[1].y) / 2.0;
        self.add(key);
    }

    pub fn center_vertical(&mut self, frame: u32) {
        let mut key = self.at(frame);
        key.py = f64::from(self.video_h) / 2.0;
        self.add(key);
    }

    pub fn center_horizontal(&mut self, frame: u32) {
        let mut key = self.at(frame);
        key.px = f64::from(self.video_w) / 2.0;
        self.add(key);
    }

    /// Store the clamped crop as an authored key
    pub fn normalize_scale(&mut self, frame: u32) {
        let key = self.constrained(self.at(frame));
        self.add(key);
    }

    /// Grow the crop until it spans the video height
    pub fn fit_vertical(&mut self, frame: u32) {
        self.center_vertical(frame);
        let mut key = self.at(frame);
        let b = self.occupied_area(&self.constrained(key));
        let height = b[2].y - b[0].y;

        if b[0].y > 0.0 && height > 0.0 {
            key.scale *= (f64::from(self.video_h) / height).trunc() + 2.0;
            self.add(key);
        }

        self.normalize_scale(frame);
    }

    /// Grow the crop until it spans the video width
    pub fn fit_horizontal(&mut self, frame: u32) {
        self.center_horizontal(frame);
        let mut key = self.at(frame);
        let b = self.occupied_area(&self.constrained(key));
        let width = b[1].x - b[0].x;

        if b[0].x > 0.0 && width > 0.0 {
            key.scale *= (f64::from(self.video_w) / width).trunc() + 2.0;
            self.add(key);
        }

        self.normalize_scale(frame);
    }

    pub fn fit_left(&mut self, frame: u32) {
        self.center_horizontal(frame);
        self.fit_vertical(frame);
        self.positionate_left(frame);
    }

    pub fn fit_right(&mut self, frame: u32) {
        self.center_horizontal(frame);
        self.fit_vertical(frame);
        self.positionate_right(frame);
    }

    pub fn fit_top(&mut self, frame: u32) {
        self.center_vertical(frame);
        self.fit_horizontal(frame);
        self.positionate_top(frame);
    }

    pub fn fit_bottom(&mut self, frame: u32) {
        self.center_vertical(frame);
        self.fit_horizontal(frame);
        self.positionate_bottom(frame);
    }

    pub fn fit_all(&mut self, frame: u32) {
        self.center_vertical(frame);
        self.center_horizontal(frame);
        self.fit_vertical(frame);
        self.fit_horizontal(frame);
    }

    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1).max(1);
    }
}
