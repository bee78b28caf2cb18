// src/model/params.rs

//! Sticker and grid render parameters
//!
//! Parameters exist in two shapes: a declared shape with every field optional
//! (what manifests write, and what per-sticker overrides contain) and a
//! resolved shape with every field required (what the renderer consumes).
//! Overlay and resolve are explicit, fallible steps: a manifest whose
//! parameters do not resolve is rejected as a whole.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

use super::{is_default, is_false};
use std::collections::BTreeMap;

/// RGBA color as written in manifests: `[r, g, b, a]`
pub type RgbaColor = (u8, u8, u8, u8);

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Center,
    End,
    Justify,
    Left,
    Right,
    Start,
}

/// Font style variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontStyle {
    Bold,
    BoldItalic,
    Italic,
    Normal,
}

/// Fully resolved sticker render parameters; every field is required
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickerParams {
    pub width: u32,
    pub height: u32,
    /// Base image path, relative to the pack directory
    pub base_image: String,
    pub text: String,
    pub text_x: f64,
    pub text_y: f64,
    pub text_align: TextAlign,
    pub text_rotate_degrees: f64,
    pub text_color: RgbaColor,
    pub stroke_color: RgbaColor,
    pub stroke_width_factor: f64,
    pub font_size: f64,
    pub font_style: FontStyle,
    pub font_families: Vec<String>,
}

/// Declared sticker render parameters; every field is optional
///
/// Manifests carry these as pack-level defaults and per-sticker overrides.
/// [`PartialStickerParams::overlay`] layers one set over another and
/// [`PartialStickerParams::resolve`] turns the result into a
/// [`StickerParams`], failing with the list of still-missing fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialStickerParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_align: Option<TextAlign>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_rotate_degrees: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<RgbaColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<RgbaColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_style: Option<FontStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_families: Option<Vec<String>>,
}

impl PartialStickerParams {
    /// Layer `over` on top of `self`: fields set in `over` win
    pub fn overlay(&self, over: &Self) -> Self {
        Self {
            width: over.width.or(self.width),
            height: over.height.or(self.height),
            base_image: over.base_image.clone().or_else(|| self.base_image.clone()),
            text: over.text.clone().or_else(|| self.text.clone()),
            text_x: over.text_x.or(self.text_x),
            text_y: over.text_y.or(self.text_y),
            text_align: over.text_align.or(self.text_align),
            text_rotate_degrees: over.text_rotate_degrees.or(self.text_rotate_degrees),
            text_color: over.text_color.or(self.text_color),
            stroke_color: over.stroke_color.or(self.stroke_color),
            stroke_width_factor: over.stroke_width_factor.or(self.stroke_width_factor),
            font_size: over.font_size.or(self.font_size),
            font_style: over.font_style.or(self.font_style),
            font_families: over
                .font_families
                .clone()
                .or_else(|| self.font_families.clone()),
        }
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.width.is_none() {
            missing.push("width");
        }
        if self.height.is_none() {
            missing.push("height");
        }
        if self.base_image.is_none() {
            missing.push("base_image");
        }
        if self.text.is_none() {
            missing.push("text");
        }
        if self.text_x.is_none() {
            missing.push("text_x");
        }
        if self.text_y.is_none() {
            missing.push("text_y");
        }
        if self.text_align.is_none() {
            missing.push("text_align");
        }
        if self.text_rotate_degrees.is_none() {
            missing.push("text_rotate_degrees");
        }
        if self.text_color.is_none() {
            missing.push("text_color");
        }
        if self.stroke_color.is_none() {
            missing.push("stroke_color");
        }
        if self.stroke_width_factor.is_none() {
            missing.push("stroke_width_factor");
        }
        if self.font_size.is_none() {
            missing.push("font_size");
        }
        if self.font_style.is_none() {
            missing.push("font_style");
        }
        if self.font_families.is_none() {
            missing.push("font_families");
        }
        missing
    }

    /// Resolve into full [`StickerParams`], naming every missing field
    pub fn resolve(&self) -> Result<StickerParams> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(Error::ValidationError(format!(
                "incomplete sticker params, missing: {}",
                missing.join(", ")
            )));
        }

        // All fields checked present above
        Ok(StickerParams {
            width: self.width.unwrap(),
            height: self.height.unwrap(),
            base_image: self.base_image.clone().unwrap(),
            text: self.text.clone().unwrap(),
            text_x: self.text_x.unwrap(),
            text_y: self.text_y.unwrap(),
            text_align: self.text_align.unwrap(),
            text_rotate_degrees: self.text_rotate_degrees.unwrap(),
            text_color: self.text_color.unwrap(),
            stroke_color: self.stroke_color.unwrap(),
            stroke_width_factor: self.stroke_width_factor.unwrap(),
            font_size: self.font_size.unwrap(),
            font_style: self.font_style.unwrap(),
            font_families: self.font_families.clone().unwrap(),
        })
    }
}

/// Resolve pack defaults layered with per-sticker overrides
pub fn resolve_sticker_params(
    defaults: &PartialStickerParams,
    overrides: &PartialStickerParams,
) -> Result<StickerParams> {
    defaults.overlay(overrides).resolve()
}

/// Grid padding: a scalar applies to all sides, two elements are
/// vertical/horizontal, four are top/right/bottom/left
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaddingSpec {
    Uniform(f64),
    One([f64; 1]),
    Two([f64; 2]),
    Four([f64; 4]),
}

impl Default for PaddingSpec {
    fn default() -> Self {
        Self::Uniform(16.0)
    }
}

impl PaddingSpec {
    /// Top/right/bottom/left
    pub fn resolved(&self) -> (f64, f64, f64, f64) {
        match *self {
            Self::Uniform(p) => (p, p, p, p),
            Self::One([p]) => (p, p, p, p),
            Self::Two([x, y]) => (x, y, x, y),
            Self::Four([t, r, b, l]) => (t, r, b, l),
        }
    }
}

/// Grid gap: a scalar applies to both axes, two elements are x/y
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GapSpec {
    Uniform(f64),
    One([f64; 1]),
    Two([f64; 2]),
}

impl Default for GapSpec {
    fn default() -> Self {
        Self::Uniform(16.0)
    }
}

impl GapSpec {
    /// X/y gap
    pub fn resolved(&self) -> (f64, f64) {
        match *self {
            Self::Uniform(g) => (g, g),
            Self::One([g]) => (g, g),
            Self::Two([x, y]) => (x, y),
        }
    }
}

/// Grid background: a flat RGBA color or an image path relative to the pack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Background {
    Color(RgbaColor),
    Image(String),
}

impl Default for Background {
    fn default() -> Self {
        Self::Color((40, 44, 52, 255))
    }
}

impl Background {
    /// The image path, if this background is an image rather than a color
    pub fn image_path(&self) -> Option<&str> {
        match self {
            Self::Image(path) => Some(path),
            Self::Color(_) => None,
        }
    }
}

fn default_cols() -> Option<u32> {
    Some(5)
}

fn is_default_cols(value: &Option<u32>) -> bool {
    *value == default_cols()
}

/// Layout parameters for one rendered sticker grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickerGridParams {
    #[serde(default, skip_serializing_if = "is_default")]
    pub padding: PaddingSpec,
    #[serde(default, skip_serializing_if = "is_default")]
    pub gap: GapSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    #[serde(default = "default_cols", skip_serializing_if = "is_default_cols")]
    pub cols: Option<u32>,
    #[serde(default, skip_serializing_if = "is_default")]
    pub background: Background,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker_size_fixed: Option<(u32, u32)>,
}

impl Default for StickerGridParams {
    fn default() -> Self {
        Self {
            padding: PaddingSpec::default(),
            gap: GapSpec::default(),
            rows: None,
            cols: default_cols(),
            background: Background::default(),
            sticker_size_fixed: None,
        }
    }
}

impl StickerGridParams {
    /// The grid is laid out along exactly one fixed axis
    pub fn validate(&self) -> Result<()> {
        match (self.rows, self.cols) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err(Error::ValidationError(
                "exactly one of rows and cols must be set".to_string(),
            )),
        }
    }
}

/// Per-category grid overrides; unset fields fall back to the defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialStickerGridParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<PaddingSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap: Option<GapSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker_size_fixed: Option<(u32, u32)>,
}

impl PartialStickerGridParams {
    /// Apply these overrides on top of `base`
    ///
    /// Setting either of rows/cols replaces the whole axis pair, so an
    /// override can switch the fixed axis without spelling out a null.
    pub fn apply_to(&self, base: &StickerGridParams) -> StickerGridParams {
        let (rows, cols) = match (self.rows, self.cols) {
            (None, None) => (base.rows, base.cols),
            (rows, cols) => (rows, cols),
        };
        StickerGridParams {
            padding: self.padding.unwrap_or(base.padding),
            gap: self.gap.unwrap_or(base.gap),
            rows,
            cols,
            background: self.background.clone().unwrap_or_else(|| base.background.clone()),
            sticker_size_fixed: self.sticker_size_fixed.or(base.sticker_size_fixed),
        }
    }
}

/// Grid settings declared by a manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StickerGridSettings {
    #[serde(default, skip_serializing_if = "is_false")]
    pub disable_category_select: bool,
    #[serde(default, skip_serializing_if = "is_default")]
    pub default_params: StickerGridParams,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub override_params: BTreeMap<String, PartialStickerGridParams>,
}

impl StickerGridSettings {
    pub fn validate(&self) -> Result<()> {
        self.default_params
            .validate()
            .map_err(|e| Error::ValidationError(format!("grid default params: {}", e)))?;
        for (category, partial) in &self.override_params {
            partial
                .apply_to(&self.default_params)
                .validate()
                .map_err(|e| {
                    Error::ValidationError(format!(
                        "grid override for category `{}`: {}",
                        category, e
                    ))
                })?;
        }
        Ok(())
    }
}
