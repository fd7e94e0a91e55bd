//! Composites a hand onto the spread template.

use super::layout::{SpreadLayout, CANVAS_HEIGHT, CANVAS_WIDTH};
use super::Hand;
use crate::error::{OracleError, OracleResult};
use chrono::Utc;
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SpreadRenderer {
    layout: SpreadLayout,
}

impl SpreadRenderer {
    pub fn new(layout: SpreadLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &SpreadLayout {
        &self.layout
    }

    /// Template drawn at the origin at its natural size, then each card
    /// scaled into its slot of [`SpreadLayout::plan`].
    pub fn render(&self, hand: &Hand) -> OracleResult<RgbaImage> {
        let mut canvas = RgbaImage::new(CANVAS_WIDTH, CANVAS_HEIGHT);

        let template = load(&self.layout.template_path())?;
        imageops::overlay(&mut canvas, &template, 0, 0);

        for placement in self.layout.plan(hand) {
            let card = load(&placement.asset)?;
            let card = imageops::resize(
                &card,
                placement.width,
                placement.height,
                FilterType::Triangle,
            );
            imageops::overlay(&mut canvas, &card, placement.x.into(), placement.y.into());
        }

        Ok(canvas)
    }

    pub fn render_png(&self, hand: &Hand) -> OracleResult<Vec<u8>> {
        let canvas = self.render(hand)?;
        let mut bytes = Vec::new();
        canvas.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    /// Render `hand` and write it to `out_dir/result_<unix millis>.png`,
    /// creating the directory if needed.
    pub fn write_png(&self, hand: &Hand, out_dir: &Path) -> OracleResult<PathBuf> {
        fs::create_dir_all(out_dir).map_err(|err| {
            OracleError::RenderFailed(format!("cannot create {}: {err}", out_dir.display()))
        })?;

        let path = out_dir.join(format!("result_{}.png", Utc::now().timestamp_millis()));
        self.render(hand)?.save_with_format(&path, ImageFormat::Png)?;

        info!(path = %path.display(), "spread image written");
        Ok(path)
    }
}

fn load(path: &Path) -> OracleResult<RgbaImage> {
    debug!(path = %path.display(), "loading spread artwork");
    let image = image::open(path)
        .map_err(|err| OracleError::RenderFailed(format!("{}: {err}", path.display())))?;
    Ok(image.to_rgba8())
}
