//! Incremental image collage.
//!
//! Tiles are appended left to right from a running cursor, or pasted at an
//! explicit coordinate; the canvas grows on demand and never shrinks, so the
//! final extent does not have to be known up front.

use std::path::Path;

use image::{DynamicImage, imageops};

#[derive(Debug, thiserror::Error)]
pub enum CollageError {
    #[error("collage is empty, nothing to save")]
    Empty,

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// A growing composite image plus the cursor where the next tile lands.
///
/// The canvas pixel format is fixed by the first image added; later images
/// are pasted into that format as-is.
#[derive(Default)]
pub struct Collage {
    image: Option<DynamicImage>,
    next_x: u32,
    next_y: u32,
}

impl Collage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `path` and adds it to the collage. See [`Collage::add_image`].
    pub fn add_image_file(
        &mut self,
        path: &Path,
        coord: Option<(u32, u32)>,
    ) -> Result<(), CollageError> {
        let new_image = image::open(path)?;
        self.add_image(new_image, coord);
        Ok(())
    }

    /// Adds an image; with no `coord` it lands at the running cursor.
    ///
    /// The cursor always advances right by the new image's width, also after
    /// an explicit-coordinate paste.
    pub fn add_image(&mut self, new_image: DynamicImage, coord: Option<(u32, u32)>) {
        let advance = new_image.width();

        match self.image.take() {
            // First image becomes the canvas, no paste needed.
            None => self.image = Some(new_image),
            Some(current) => {
                let (x, y) = coord.unwrap_or((self.next_x, self.next_y));

                let width = current.width().max(x + new_image.width());
                let height = current.height().max(y + new_image.height());

                let mut grown = DynamicImage::new(width, height, current.color());
                imageops::replace(&mut grown, &current, 0, 0);
                imageops::replace(&mut grown, &new_image, i64::from(x), i64::from(y));

                self.image = Some(grown);
            }
        }

        self.next_x += advance;
    }

    /// Moves the cursor to the left edge, below everything placed so far.
    pub fn new_line(&mut self) {
        let (_, height) = self.size();
        self.next_x = 0;
        self.next_y = height;
    }

    /// Current canvas size, `(0, 0)` while empty.
    pub fn size(&self) -> (u32, u32) {
        self.image
            .as_ref()
            .map_or((0, 0), |image| (image.width(), image.height()))
    }

    /// Where the next image lands absent an explicit coordinate.
    pub fn next_coord(&self) -> (u32, u32) {
        (self.next_x, self.next_y)
    }

    pub fn image(&self) -> Option<&DynamicImage> {
        self.image.as_ref()
    }

    /// Serializes the canvas; the format follows the target's extension.
    pub fn save(&self, target: &Path) -> Result<(), CollageError> {
        let image = self.image.as_ref().ok_or(CollageError::Empty)?;
        image.save(target)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ColorType;

    fn square(side: u32) -> DynamicImage {
        DynamicImage::new(side, side, ColorType::L8)
    }

    #[test]
    fn first_image_becomes_the_canvas() {
        let mut collage = Collage::new();
        assert_eq!(collage.size(), (0, 0));

        collage.add_image(square(2), None);
        assert_eq!(collage.size(), (2, 2));
        assert_eq!(collage.next_coord(), (2, 0));
    }

    #[test]
    fn raster_order_growth_with_new_line() {
        let mut collage = Collage::new();
        collage.add_image(square(2), None);
        collage.add_image(square(2), None);
        assert_eq!(collage.size(), (4, 2));

        collage.new_line();
        assert_eq!(collage.next_coord(), (0, 2));

        collage.add_image(square(2), None);
        assert_eq!(collage.size(), (4, 4));
    }

    #[test]
    fn explicit_coordinate_extends_the_bounding_box() {
        let mut collage = Collage::new();
        collage.add_image(square(2), None);
        collage.add_image(square(2), Some((1, 1)));
        assert_eq!(collage.size(), (3, 3));
    }

    #[test]
    fn cursor_advances_even_for_explicit_coordinates() {
        let mut collage = Collage::new();
        collage.add_image(square(2), None);
        collage.add_image(square(2), Some((0, 0)));
        assert_eq!(collage.next_coord(), (4, 0));
    }

    #[test]
    fn explicit_placement_inside_current_bounds_keeps_size() {
        let mut collage = Collage::new();
        collage.add_image(square(4), None);
        collage.add_image(square(2), Some((1, 1)));
        assert_eq!(collage.size(), (4, 4));
    }

    #[test]
    fn saving_an_empty_collage_is_an_error() {
        let collage = Collage::new();
        let err = collage.save(Path::new("never_written.png")).unwrap_err();
        assert!(matches!(err, CollageError::Empty));
    }
}
