//! Deterministic page layout: how many frame slots fit on a printable
//! page and where each frame lands on it.

use std::path::{Path, PathBuf};

use image::{imageops, Rgb, RgbImage};
use tracing::info;

use crate::error::{Error, Result};
use crate::{frame_path, page_path};

const A4_WIDTH: u32 = 4960;
const A4_HEIGHT: u32 = 3508;
const A4_BORDER: u32 = 25;
const A4_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Geometry of a printable page plus the fixed slot size of one frame.
/// Row/column capacity is computed once at construction and never
/// changes afterwards.
#[derive(Debug, Clone)]
pub struct PageTemplate {
    width: u32,
    height: u32,
    background: Rgb<u8>,
    border: u32,
    frame_width: u32,
    frame_height: u32,
    frames_per_row: u32,
    frames_per_column: u32,
    max_images: u32,
}

impl PageTemplate {
    pub fn new(
        width: u32,
        height: u32,
        background: Rgb<u8>,
        border: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Self> {
        let frames_per_row = axis_capacity(width, frame_width, border);
        let frames_per_column = axis_capacity(height, frame_height, border);
        if frames_per_row == 0 || frames_per_column == 0 {
            return Err(Error::Template(format!(
                "page {width}x{height} cannot fit a {frame_width}x{frame_height} frame with border {border}"
            )));
        }

        Ok(PageTemplate {
            width,
            height,
            background,
            border,
            frame_width,
            frame_height,
            frames_per_row,
            frames_per_column,
            max_images: frames_per_row * frames_per_column,
        })
    }

    /// The A4 reference template: 4960x3508, white background, 25px border.
    pub fn a4(frame_width: u32, frame_height: u32) -> Result<Self> {
        PageTemplate::new(
            A4_WIDTH,
            A4_HEIGHT,
            A4_BACKGROUND,
            A4_BORDER,
            frame_width,
            frame_height,
        )
    }

    pub fn frames_per_row(&self) -> u32 {
        self.frames_per_row
    }

    pub fn frames_per_column(&self) -> u32 {
        self.frames_per_column
    }

    pub fn max_images(&self) -> usize {
        self.max_images as usize
    }

    /// Compose one page from an ordered list of frame files, placed
    /// row-major from the top-left corner. Fails before touching the
    /// filesystem when the list exceeds the page capacity; a page file
    /// only appears once every frame was pasted.
    pub fn compose(&self, frames: &[PathBuf], out: &Path) -> Result<()> {
        if frames.len() > self.max_images as usize {
            return Err(Error::PageOverflow {
                count: frames.len(),
                max: self.max_images as usize,
            });
        }

        let mut canvas = RgbImage::from_pixel(self.width, self.height, self.background);
        let mut x = self.border;
        let mut y = self.border;
        let mut column = 0;

        for path in frames {
            let frame = image::open(path)
                .map_err(|source| Error::FrameOpen {
                    path: path.clone(),
                    source,
                })?
                .to_rgb8();
            // Clip to the slot so an oversized frame cannot bleed into
            // its neighbours.
            let slot = imageops::crop_imm(&frame, 0, 0, self.frame_width, self.frame_height);
            imageops::replace(&mut canvas, &slot.to_image(), i64::from(x), i64::from(y));

            column += 1;
            if column < self.frames_per_row {
                x += self.frame_width + self.border;
            } else {
                column = 0;
                x = self.border;
                y += self.frame_height + self.border;
            }
        }

        canvas.save(out).map_err(|source| Error::PageSave {
            path: out.to_path_buf(),
            source,
        })?;
        info!(page = %out.display(), frames = frames.len(), "page done");
        Ok(())
    }
}

/// Slots along one axis: `floor(span / (slot + border))`, minus one when
/// the trailing remainder is narrower than a border.
fn axis_capacity(span: u32, slot: u32, border: u32) -> u32 {
    let full = slot + border;
    let mut count = span / full;
    if count > 0 && span % full < border {
        count -= 1;
    }
    count
}

/// Walk `frame-<i>.png` for `0..frame_count` under `dir`, batch them
/// into page-sized groups and write `page-<n>.png` starting at 1.
/// Returns the number of pages written.
pub fn generate_pages(dir: &Path, frame_count: u32, template: &PageTemplate) -> Result<u32> {
    let mut batch = Vec::with_capacity(template.max_images());
    let mut page = 0;

    for index in 0..frame_count {
        let frame = frame_path(dir, index);
        if !frame.exists() {
            return Err(Error::MissingFrame(frame));
        }
        batch.push(frame);

        if batch.len() == template.max_images() || index == frame_count - 1 {
            page += 1;
            template.compose(&batch, &page_path(dir, page))?;
            batch.clear();
        }
    }

    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_frame(path: &Path, width: u32, height: u32, shade: u8) {
        RgbImage::from_pixel(width, height, Rgb([shade, shade, shade]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn a4_reference_capacity() {
        // W=4960, f=680, b=25: floor(4960/705)=7, remainder 25 is not
        // < 25, so no decrement.
        let template = PageTemplate::a4(680, 472).unwrap();
        assert_eq!(template.frames_per_row(), 7);
        assert_eq!(template.frames_per_column(), 6);
        assert_eq!(template.max_images(), 42);
    }

    #[test]
    fn capacity_decrements_on_narrow_remainder() {
        // 700 / (100 + 10) = 6 with remainder 40, keeps 6.
        assert_eq!(axis_capacity(700, 100, 10), 6);
        // 665 / 110 = 6 with remainder 5 < 10, drops to 5.
        assert_eq!(axis_capacity(665, 100, 10), 5);
        // Exact fit leaves remainder 0 < border, drops by one.
        assert_eq!(axis_capacity(660, 100, 10), 5);
    }

    #[test]
    fn max_images_is_row_column_product() {
        let template = PageTemplate::new(230, 120, Rgb([0, 0, 0]), 10, 100, 40).unwrap();
        assert_eq!(
            template.max_images(),
            (template.frames_per_row() * template.frames_per_column()) as usize
        );
        assert_eq!(template.max_images(), 4);
    }

    #[test]
    fn zero_capacity_template_is_rejected() {
        let result = PageTemplate::new(50, 50, Rgb([0, 0, 0]), 10, 100, 100);
        assert!(matches!(result, Err(Error::Template(_))));
    }

    #[test]
    fn compose_fills_a_page_and_rejects_overflow() {
        let dir = tempfile::tempdir().unwrap();
        // 2x2 grid of 8x6 slots with a 2px border on a 22x18 page.
        let template = PageTemplate::new(22, 18, Rgb([255, 255, 255]), 2, 8, 6).unwrap();
        assert_eq!(template.max_images(), 4);

        let mut frames = Vec::new();
        for index in 0..4 {
            let path = dir.path().join(format!("f{index}.png"));
            tiny_frame(&path, 8, 6, 40 * (index as u8 + 1));
            frames.push(path);
        }

        let out = dir.path().join("page.png");
        template.compose(&frames, &out).unwrap();

        let page = image::open(&out).unwrap().to_rgb8();
        // Frame 0 lands at (2, 2), frame 1 at (12, 2), frame 2 at (2, 10).
        assert_eq!(page.get_pixel(2, 2), &Rgb([40, 40, 40]));
        assert_eq!(page.get_pixel(12, 2), &Rgb([80, 80, 80]));
        assert_eq!(page.get_pixel(2, 10), &Rgb([120, 120, 120]));
        // The border stays background.
        assert_eq!(page.get_pixel(0, 0), &Rgb([255, 255, 255]));

        frames.push(frames[0].clone());
        let result = template.compose(&frames, &out);
        assert!(matches!(
            result,
            Err(Error::PageOverflow { count: 5, max: 4 })
        ));
    }

    #[test]
    fn compose_fails_on_unreadable_frame() {
        let dir = tempfile::tempdir().unwrap();
        let template = PageTemplate::new(22, 18, Rgb([255, 255, 255]), 2, 8, 6).unwrap();
        let missing = vec![dir.path().join("nope.png")];
        let result = template.compose(&missing, &dir.path().join("page.png"));
        assert!(matches!(result, Err(Error::FrameOpen { .. })));
    }

    #[test]
    fn generate_pages_splits_batches() {
        let dir = tempfile::tempdir().unwrap();
        let template = PageTemplate::new(22, 18, Rgb([255, 255, 255]), 2, 8, 6).unwrap();

        // 4 frames per page, 7 frames total: one full page plus one of 3.
        for index in 0..7 {
            tiny_frame(&frame_path(dir.path(), index), 8, 6, 10);
        }
        let pages = generate_pages(dir.path(), 7, &template).unwrap();
        assert_eq!(pages, 2);
        assert!(page_path(dir.path(), 1).exists());
        assert!(page_path(dir.path(), 2).exists());
        assert!(!page_path(dir.path(), 3).exists());
    }

    #[test]
    fn generate_pages_fails_on_gap() {
        let dir = tempfile::tempdir().unwrap();
        let template = PageTemplate::new(22, 18, Rgb([255, 255, 255]), 2, 8, 6).unwrap();
        tiny_frame(&frame_path(dir.path(), 0), 8, 6, 10);
        // frame-1.png missing
        let result = generate_pages(dir.path(), 2, &template);
        assert!(matches!(result, Err(Error::MissingFrame(_))));
    }
}
