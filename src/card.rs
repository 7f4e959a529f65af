pub mod layout;

use crate::error::Error;
use crate::parts::{CardPictures, GenerationParts, PlayerInfo};
use crate::raster::compose::paste_rgba;
use crate::raster::contours::{fill, fill_mask, find_external};
use crate::raster::{crop, mask_where, points_of};
use crate::shapes::{Point, Rect};
use crate::shirt::ShirtLayers;
use ab_glyph::{FontRef, PxScale};
use anyhow::Result;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder, Luma, Rgb, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use layout::{
    Anchor, Depending, Direction, Kind, LayoutEntry, Source, CAPTION_SIZE, CARD_LAYOUT, DEFAULT_MARGIN, NOTE_WHITE,
    STAR_COLOR,
};
use tracing::{debug, info, span, Level};

const TRANSPARENT: Rgba<u8> = Rgba([255, 255, 255, 0]);
const DRAWN_TEXT: Rgba<u8> = Rgba([NOTE_WHITE.0[0], NOTE_WHITE.0[1], NOTE_WHITE.0[2], 255]);

const TEXT_GAP: i32 = 25;
const CAPTION_GAP: i32 = 50;
const STAR_GAP: i64 = 25;
const FLAG_HEIGHT: u32 = 350;
const CLUB_SIZE: f32 = 96.;

/// Number of fully lit stars and the lit fraction of the next one, for a
/// note out of 100.
pub fn star_fill(note: u32) -> (u32, f32) {
    let note = note.min(100);
    let filled = note / 20;
    let partial = (note % 20) as f32 / 20.;
    (filled, partial)
}

fn with_alpha(color: Rgb<u8>, alpha: u8) -> Rgba<u8> {
    let Rgb([r, g, b]) = color;
    Rgba([r, g, b, alpha])
}

/// Card colour inside the black outline of `shape`, covered by the middle
/// band of `pattern`.
fn card_background(shape: &RgbaImage, pattern: &RgbaImage, color: Rgb<u8>) -> RgbaImage {
    let (w, h) = shape.dimensions();
    let top = (pattern.height() as i32 - h as i32) / 2;
    let band = crop(pattern, Rect::new(0, top, w as i32, top + h as i32));

    let contours = find_external(&mask_where(shape, Rgba([0, 0, 0, 255])));
    let inside = fill_mask(&contours, w, h);

    let mut card = RgbaImage::from_pixel(w, h, TRANSPARENT);
    fill(&mut card, &contours, with_alpha(color, 255));

    let mut kept = RgbaImage::from_pixel(w, h, TRANSPARENT);
    for (x, y, p) in band.enumerate_pixels() {
        if inside.get_pixel(x, y)[0] > 0 {
            kept.put_pixel(x, y, *p);
        }
    }
    paste_rgba(&mut card, &kept, 0, 0);
    card
}

/// Top-left corner of a `w` x `h` box anchored at (`x`, `y`).
fn anchored(anchor: Anchor, x: i32, y: i32, w: u32, h: u32) -> (i32, i32) {
    let (w, h) = (w as i32, h as i32);
    match anchor {
        Anchor::LeftTop => (x, y),
        Anchor::MiddleTop => (x - w / 2, y),
        Anchor::RightTop => (x - w, y),
        Anchor::MiddleBottom => (x - w / 2, y - h),
    }
}

/// Where the text drawn so far ends: the rightmost column with the top row
/// for `LastX`, the rightmost column with the bottom row for `LastY`.
fn drawn_text_position(card: &RgbaImage, depending: Depending) -> Option<Point> {
    let points = points_of(card, DRAWN_TEXT);
    let max_x = points.iter().map(|p| p.x).max()?;
    let y = match depending {
        Depending::LastX => points.iter().map(|p| p.y).min()?,
        Depending::LastY => points.iter().map(|p| p.y).max()?,
    };
    Some(Point::new(max_x, y))
}

fn resize_to_height(img: &RgbaImage, height: u32) -> RgbaImage {
    if img.height() == 0 || img.height() == height {
        return img.clone();
    }
    let width = ((img.width() as f64 * height as f64 / img.height() as f64) as u32).max(1);
    image::imageops::thumbnail(img, width, height)
}

#[allow(clippy::too_many_arguments)]
fn draw_text(
    canvas: &mut RgbaImage,
    font: &FontRef,
    text: &str,
    size: f32,
    fill: Rgb<u8>,
    opacity: u8,
    at: (i32, i32),
    anchor: Anchor,
) {
    let scale = PxScale::from(size);
    let (w, h) = text_size(scale, font, text);
    let (x, y) = anchored(anchor, at.0, at.1, w, h);

    let mut coverage = GrayImage::new(canvas.width(), canvas.height());
    draw_text_mut(&mut coverage, Luma([255]), x, y, scale, font, text);

    let layer = RgbaImage::from_fn(canvas.width(), canvas.height(), |px, py| {
        let c = coverage.get_pixel(px, py)[0] as u32;
        with_alpha(fill, (c * opacity as u32 / 255) as u8)
    });
    paste_rgba(canvas, &layer, 0, 0);
}

/// Paints the stars from (`x`, `y`) on. Every star after the lit ones is
/// dimmed, and the first of those is partly lit from the right.
fn draw_stars(
    card: &mut RgbaImage,
    star: &RgbaImage,
    at: Point,
    note: u32,
    opacity: u8,
    count: usize,
    direction: Direction,
) {
    let (filled, partial) = star_fill(note);
    let w = star.width();
    let step = (w as i64 + STAR_GAP)
        * match direction {
            Direction::Left => -1,
            Direction::Right => 1,
        };

    let mut star = star.clone();
    let mut dimmed = false;
    let (mut x, y) = (at.x as i64, at.y as i64);
    for i in 1..=count as u32 {
        if i > filled && !dimmed {
            for p in star.pixels_mut() {
                if p[3] > 0 {
                    *p = with_alpha(STAR_COLOR, opacity);
                }
            }
            dimmed = true;
        }
        paste_rgba(card, &star, x, y);

        if i == filled + 1 && partial > 0. {
            let cleared = w - (w as f32 * partial).floor() as u32;
            let mut lit = star.clone();
            for (px, _, p) in lit.enumerate_pixels_mut() {
                *p = if px < cleared || p[3] == 0 { TRANSPARENT } else { with_alpha(STAR_COLOR, 255) };
            }
            paste_rgba(card, &lit, x, y);
        }
        x += step;
    }
}

fn text_of(source: Source, player: &PlayerInfo) -> Option<String> {
    let text = match source {
        Source::Literal(text) => text.to_string(),
        Source::GlobalNote => player.global_note.to_string(),
        Source::FirstName => player.first_name.clone(),
        Source::LastName => player.last_name.clone(),
        Source::NftCount => player.nft_count.clone(),
        Source::Club => player.club.clone(),
        Source::PositionNote => player.position_note.to_string(),
        Source::MentalNote => player.mental_note.to_string(),
        Source::PhysicalNote => player.physical_note.to_string(),
        Source::Age => player.age.to_string(),
        Source::Height => player.height.to_string(),
        Source::Weight => player.weight.to_string(),
        _ => return None,
    };
    Some(text)
}

fn icon_of(source: Source, pictures: &CardPictures) -> Option<&RgbaImage> {
    match source {
        Source::PositionIcon => Some(&pictures.position),
        Source::MentalIcon => Some(&pictures.mental),
        Source::PhysicalIcon => Some(&pictures.physical),
        Source::AgeIcon => Some(&pictures.age),
        Source::HeightIcon => Some(&pictures.height),
        Source::WeightIcon => Some(&pictures.weight),
        _ => None,
    }
}

struct Painter<'a> {
    card: RgbaImage,
    shape: &'a RgbaImage,
    font: FontRef<'a>,
    parts: &'a GenerationParts,
    layers: &'a ShirtLayers,
}

impl Painter<'_> {
    fn missing(entry: &LayoutEntry, what: &str) -> anyhow::Error {
        Error::Config(format!("layout entry {:?} has no {what}", entry.value)).into()
    }

    fn anchor(&self, color: Rgb<u8>) -> Option<Point> {
        self.shape
            .enumerate_pixels()
            .find(|(_, _, p)| p.0[..3] == color.0)
            .map(|(x, y, _)| Point::new(x as i32, y as i32))
    }

    fn last_y(&self, entry: &LayoutEntry, fallback: i32) -> i32 {
        let margin = entry.margin.unwrap_or(DEFAULT_MARGIN);
        drawn_text_position(&self.card, Depending::LastY)
            .map(|p| p.y + margin)
            .unwrap_or(fallback)
    }

    fn text(&mut self, entry: &LayoutEntry, at: Point) -> Result<()> {
        let mut text = text_of(entry.value, &self.parts.player).ok_or_else(|| Self::missing(entry, "text"))?;
        if entry.uppercase {
            text = text.to_uppercase();
        }

        let (mut x, mut y) = (at.x, at.y);
        match entry.depending {
            Some(Depending::LastX) => {
                if let Some(p) = drawn_text_position(&self.card, Depending::LastX) {
                    (x, y) = (p.x + TEXT_GAP, p.y);
                }
            }
            Some(Depending::LastY) => {
                if let Some(p) = drawn_text_position(&self.card, Depending::LastY) {
                    y = p.y + entry.margin.unwrap_or(DEFAULT_MARGIN);
                }
            }
            None => {}
        }

        debug!("Drawing {text:?} at ({x}, {y})");
        draw_text(&mut self.card, &self.font, &text, entry.size, entry.fill, entry.opacity, (x, y), entry.anchor);
        Ok(())
    }

    fn picture(&mut self, entry: &LayoutEntry, at: Point) -> Result<()> {
        match entry.value {
            Source::Shirt => {
                let shirt = &self.layers.shirt;
                let (x, y) = anchored(entry.anchor, at.x, at.y, shirt.width(), shirt.height());
                paste_rgba(&mut self.card, shirt, x as i64, y as i64);
            }
            Source::Star => {
                let (count, direction) = entry.repeat.unwrap_or((1, Direction::Right));
                draw_stars(
                    &mut self.card,
                    &self.parts.card.star,
                    at,
                    self.parts.player.global_note,
                    entry.opacity,
                    count,
                    direction,
                );
            }
            Source::FlagAndCrest => self.flag_and_crest(entry, at)?,
            source => {
                let icon = icon_of(source, &self.parts.card).ok_or_else(|| Self::missing(entry, "picture"))?;
                let icon = match entry.resize {
                    Some(height) => resize_to_height(icon, height),
                    None => icon.clone(),
                };

                let (mut x, mut y) = anchored(entry.anchor, at.x, at.y, icon.width(), icon.height());
                if entry.depending.is_some() {
                    x += entry.shift.unwrap_or(0);
                    y = self.last_y(entry, y);
                }
                paste_rgba(&mut self.card, &icon, x as i64, y as i64);

                if let Some(caption) = entry.caption {
                    let text = text_of(caption, &self.parts.player).ok_or_else(|| Self::missing(entry, "caption"))?;
                    let below = (at.x, y + icon.height() as i32 + CAPTION_GAP);
                    draw_text(&mut self.card, &self.font, &text, CAPTION_SIZE, NOTE_WHITE, 255, below, Anchor::MiddleTop);
                }
            }
        }
        Ok(())
    }

    /// Country flag left of the club crest, the club name under the crest.
    fn flag_and_crest(&mut self, entry: &LayoutEntry, at: Point) -> Result<()> {
        let y = match entry.depending {
            Some(_) => self.last_y(entry, at.y),
            None => at.y,
        };
        let (w, h) = self.card.dimensions();
        let flag = resize_to_height(&self.parts.card.flag, FLAG_HEIGHT);
        let crest = resize_to_height(&self.layers.crest, FLAG_HEIGHT);

        let mut group = RgbaImage::from_pixel(w, h, TRANSPARENT);
        paste_rgba(&mut group, &flag, (at.x - flag.width() as i32 - TEXT_GAP) as i64, 0);

        let mut club = RgbaImage::from_pixel(w, h, TRANSPARENT);
        paste_rgba(&mut club, &crest, (at.x - crest.width() as i32 / 2) as i64, 0);
        let name = text_of(entry.caption.unwrap_or(Source::Club), &self.parts.player)
            .ok_or_else(|| Self::missing(entry, "caption"))?;
        let below = (at.x, crest.height() as i32 + CAPTION_GAP);
        draw_text(&mut club, &self.font, &name, CLUB_SIZE, NOTE_WHITE, 255, below, Anchor::MiddleTop);

        paste_rgba(&mut group, &club, crest.width() as i64 + TEXT_GAP as i64, 0);
        paste_rgba(&mut self.card, &group, 0, y as i64);
        Ok(())
    }
}

/// Lays the player's card out following [`CARD_LAYOUT`].
#[derive(Debug, Default, Clone, Copy)]
pub struct CardCompositor;

impl CardCompositor {
    pub fn new() -> CardCompositor {
        CardCompositor
    }

    pub fn render(&self, parts: &GenerationParts, layers: &ShirtLayers) -> Result<RgbaImage> {
        let span = span!(Level::DEBUG, "card");
        let _guard = span.enter();

        let font = FontRef::try_from_slice(&parts.font).map_err(|e| Error::Config(format!("invalid font: {e}")))?;
        let shape = &parts.card.shape;
        let mut painter = Painter {
            card: card_background(shape, &parts.card.pattern, parts.colors.card),
            shape,
            font,
            parts,
            layers,
        };

        let mut anchor: Option<Point> = None;
        for entry in CARD_LAYOUT.iter() {
            if let Some(marker) = entry.marker {
                anchor = painter.anchor(marker).or(anchor);
            }
            let at = anchor.ok_or_else(|| {
                Error::Config(format!("card shape has no anchor for {:?}", entry.value))
            })?;

            match entry.kind {
                Kind::Text => painter.text(entry, at)?,
                Kind::Picture | Kind::Pictures => painter.picture(entry, at)?,
            }
        }

        Ok(painter.card)
    }

    /// Renders the card and encodes it as PNG.
    pub fn compose(&self, parts: &GenerationParts, layers: &ShirtLayers) -> Result<Vec<u8>> {
        let card = self.render(parts, layers)?;
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes).write_image(card.as_raw(), card.width(), card.height(), ExtendedColorType::Rgba8)?;
        info!("Card for player {} encoded, {} bytes", parts.player.code, bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_fill() {
        assert_eq!(star_fill(100), (5, 0.));
        assert_eq!(star_fill(95), (4, 0.75));
        assert_eq!(star_fill(40), (2, 0.));
        assert_eq!(star_fill(0), (0, 0.));
        assert_eq!(star_fill(250), (5, 0.));
    }

    #[test]
    fn test_card_background() {
        let shape = RgbaImage::from_fn(20, 10, |x, y| {
            let border = (x == 2 || x == 17) && (1..=8).contains(&y) || (y == 1 || y == 8) && (2..=17).contains(&x);
            if border { Rgba([0, 0, 0, 255]) } else { TRANSPARENT }
        });
        let pattern = RgbaImage::from_fn(20, 14, |_, y| Rgba([(y * 10) as u8, 0, 0, 255]));

        let card = card_background(&shape, &pattern, Rgb([16, 32, 48]));
        assert_eq!(card.dimensions(), (20, 10));
        // rows of the pattern are taken from its middle
        assert_eq!(*card.get_pixel(5, 4), Rgba([60, 0, 0, 255]));
        assert_eq!(*card.get_pixel(0, 0), TRANSPARENT);
        assert_eq!(*card.get_pixel(19, 9), TRANSPARENT);
    }

    #[test]
    fn test_card_color_under_transparent_pattern() {
        let shape = RgbaImage::from_fn(10, 10, |x, y| {
            if x == 0 || y == 0 || x == 9 || y == 9 { Rgba([0, 0, 0, 255]) } else { TRANSPARENT }
        });
        let pattern = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 0]));
        let card = card_background(&shape, &pattern, Rgb([16, 32, 48]));
        assert_eq!(*card.get_pixel(5, 5), Rgba([16, 32, 48, 255]));
    }

    #[test]
    fn test_anchored() {
        assert_eq!(anchored(Anchor::LeftTop, 100, 50, 40, 20), (100, 50));
        assert_eq!(anchored(Anchor::MiddleTop, 100, 50, 40, 20), (80, 50));
        assert_eq!(anchored(Anchor::RightTop, 100, 50, 40, 20), (60, 50));
        assert_eq!(anchored(Anchor::MiddleBottom, 100, 50, 40, 20), (80, 30));
    }

    #[test]
    fn test_drawn_text_position() {
        let mut card = RgbaImage::from_pixel(40, 20, TRANSPARENT);
        assert_eq!(drawn_text_position(&card, Depending::LastX), None);

        for (x, y) in [(10, 5), (20, 8), (15, 12)] {
            card.put_pixel(x, y, DRAWN_TEXT);
        }
        // gray text does not count
        card.put_pixel(30, 18, Rgba([204, 204, 204, 255]));

        assert_eq!(drawn_text_position(&card, Depending::LastX), Some(Point::new(20, 5)));
        assert_eq!(drawn_text_position(&card, Depending::LastY), Some(Point::new(20, 12)));
    }

    #[test]
    fn test_stars() {
        let mut card = RgbaImage::from_pixel(200, 30, TRANSPARENT);
        let star = RgbaImage::from_pixel(10, 10, Rgba([200, 0, 0, 255]));
        draw_stars(&mut card, &star, Point::new(150, 5), 50, 128, 5, Direction::Left);

        // two lit stars keep their colour
        assert_eq!(*card.get_pixel(152, 10), Rgba([200, 0, 0, 255]));
        assert_eq!(*card.get_pixel(117, 10), Rgba([200, 0, 0, 255]));

        // the third is half lit from the right
        assert_eq!(*card.get_pixel(87, 10), Rgba([249, 236, 49, 255]));
        let dim = *card.get_pixel(82, 10);
        assert!(dim[3] > 0 && dim[3] < 255);

        // the rest stay dimmed
        assert_eq!(*card.get_pixel(47, 10), dim);
        assert_eq!(*card.get_pixel(12, 10), dim);
        assert_eq!(*card.get_pixel(30, 10), TRANSPARENT);
    }

    #[test]
    fn test_resize_to_height() {
        let icon = RgbaImage::from_pixel(40, 20, Rgba([1, 2, 3, 255]));
        let resized = resize_to_height(&icon, 10);
        assert_eq!(resized.dimensions(), (20, 10));
    }
}
