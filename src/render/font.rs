use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use ttf_parser::{Face, name_id};
use usvg::fontdb;

use crate::settings::RenderConfig;

const FALLBACK_FAMILIES: [&str; 5] = [
    "DejaVu Sans",
    "Noto Sans",
    "Liberation Sans",
    "Arial",
    "Helvetica",
];

/// Horizontal metrics of one face of a font file.
#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    space_advance: u16,
    family: Option<String>,
}

impl FontMetrics {
    /// Picks the face named `preferred` from a file or collection, else the
    /// first face that parses.
    fn parse(data: Vec<u8>, preferred: Option<&str>) -> Result<Self> {
        let data = Arc::new(data);
        let faces = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
        let mut first = None;
        for face_index in 0..faces {
            let Ok(face) = Face::parse(&data, face_index) else {
                continue;
            };
            let units_per_em = face.units_per_em().max(1);
            let metrics = Self {
                data: Arc::clone(&data),
                face_index,
                units_per_em,
                space_advance: advance_of(&face, ' ').unwrap_or(units_per_em / 2),
                family: family_name(&face),
            };
            let wanted = match (preferred, metrics.family.as_deref()) {
                (Some(preferred), Some(found)) => found.eq_ignore_ascii_case(preferred),
                _ => false,
            };
            if wanted {
                return Ok(metrics);
            }
            first.get_or_insert(metrics);
        }
        first.ok_or_else(|| anyhow!("no usable face in font data"))
    }

    /// Looks `family` up in the database; "sans-serif" means the generic family.
    fn from_database(db: &fontdb::Database, family: &str) -> Result<Self> {
        let wanted = if family.eq_ignore_ascii_case("sans-serif") {
            fontdb::Family::SansSerif
        } else {
            fontdb::Family::Name(family)
        };
        let families = [wanted];
        let query = fontdb::Query {
            families: &families,
            ..fontdb::Query::default()
        };
        let id = db
            .query(&query)
            .ok_or_else(|| anyhow!("font family not installed: {}", family))?;
        let data = db
            .with_face_data(id, |data, _| data.to_vec())
            .ok_or_else(|| anyhow!("font data unavailable: {}", family))?;
        Self::parse(data, Some(family))
    }

    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Width of `text` at `font_size`; `None` if the face no longer parses.
    fn width_px(&self, text: &str, font_size: f32) -> Option<f32> {
        let face = Face::parse(&self.data, self.face_index).ok()?;
        let units: u32 = text
            .chars()
            .filter(|ch| *ch != '\n')
            .map(|ch| match ch {
                ' ' | '\u{a0}' => self.space_advance as u32,
                _ => advance_of(&face, ch).unwrap_or(self.space_advance) as u32,
            })
            .fold(0u32, u32::saturating_add);
        Some(units as f32 * font_size / self.units_per_em as f32)
    }
}

fn advance_of(face: &Face<'_>, ch: char) -> Option<u16> {
    face.glyph_index(ch)
        .and_then(|glyph| face.glyph_hor_advance(glyph))
}

/// Typographic family when present, else the legacy family name.
fn family_name(face: &Face<'_>) -> Option<String> {
    let named = |id: u16| {
        face.names()
            .into_iter()
            .filter(|name| name.name_id == id)
            .find_map(|name| name.to_string())
    };
    named(name_id::TYPOGRAPHIC_FAMILY).or_else(|| named(name_id::FAMILY))
}

/// The overlay font: metrics for layout, plus the database the painter
/// rasterizes with. Built once per render engine.
#[derive(Clone)]
pub struct FontBook {
    metrics: Option<FontMetrics>,
    family: String,
    database: Arc<fontdb::Database>,
}

impl FontBook {
    /// Configured file first, then the configured family, then common sans
    /// families. Fails when none of them resolves, since nothing could be
    /// painted.
    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        Self::resolve(config, db)
    }

    fn resolve(config: &RenderConfig, mut db: fontdb::Database) -> Result<Self> {
        if let Some(path) = config.font_path.as_deref() {
            let metrics = load_font_metrics(path)?;
            db.load_font_data(metrics.data().to_vec());
            let family = metrics
                .family()
                .map(str::to_string)
                .or_else(|| config.font_family.clone())
                .unwrap_or_else(|| "sans-serif".to_string());
            debug!("render: using font file {} ({})", path.display(), family);
            return Ok(Self {
                metrics: Some(metrics),
                family,
                database: Arc::new(db),
            });
        }

        let candidates = config
            .font_family
            .as_deref()
            .into_iter()
            .chain(FALLBACK_FAMILIES);
        for candidate in candidates {
            if let Ok(metrics) = FontMetrics::from_database(&db, candidate) {
                let family = metrics.family().unwrap_or(candidate).to_string();
                debug!("render: using system font {}", family);
                return Ok(Self {
                    metrics: Some(metrics),
                    family,
                    database: Arc::new(db),
                });
            }
        }

        Err(anyhow!(
            "no overlay font found (tried {})",
            FALLBACK_FAMILIES.join(", ")
        ))
    }

    /// Layout-only book: measures with width estimates and has no faces to
    /// paint with.
    pub fn estimated() -> Self {
        Self {
            metrics: None,
            family: "sans-serif".to_string(),
            database: Arc::new(fontdb::Database::new()),
        }
    }

    /// Whether the painter has a face to draw glyphs with.
    pub fn can_paint(&self) -> bool {
        self.metrics.is_some()
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn database(&self) -> Arc<fontdb::Database> {
        Arc::clone(&self.database)
    }

    pub fn measure(&self, text: &str, font_size: f32) -> f32 {
        measure_text_width_px(text, font_size, self.metrics.as_ref())
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    FontMetrics::parse(data, None)
        .with_context(|| format!("failed to parse font: {}", path.display()))
}

pub(crate) fn measure_text_width_px(
    text: &str,
    font_size: f32,
    font: Option<&FontMetrics>,
) -> f32 {
    font.and_then(|font| font.width_px(text, font_size))
        .unwrap_or_else(|| estimated_em(text) * font_size)
}

/// Rough width in em: narrow spaces and punctuation, half-width latin,
/// full-width CJK.
fn estimated_em(text: &str) -> f32 {
    text.chars()
        .map(|ch| match ch {
            '\n' => 0.0,
            ch if ch.is_whitespace() => 0.25,
            ch if ch.is_ascii_alphanumeric() => 0.55,
            ch if ch.is_ascii() => 0.35,
            '\u{4e00}'..='\u{9fff}' | '\u{3040}'..='\u{30ff}' | '\u{31f0}'..='\u{31ff}' => 1.0,
            _ => 0.9,
        })
        .sum()
}
