use crate::colorimetry::hex_to_rgb;
use crate::error::Error;
use crate::shirt::{ClubColors, ShirtParts};
use crate::styling::Palette;
use ab_glyph::FontRef;
use anyhow::Result;
use image::{Rgb, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub code: String,
    pub first_name: String,
    pub last_name: String,
    pub age: u32,
    pub height: u32,
    pub weight: u32,
    pub club: String,
    pub position_note: u32,
    pub mental_note: u32,
    pub physical_note: u32,
    pub global_note: u32,
    pub nft_count: String,
}

/// `#RRGGBB` colors as written in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestColors {
    pub skin: String,
    pub hair: String,
    pub eyes: String,
    pub mouth: String,
    pub card: String,
    pub first: String,
    pub second: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestPictures {
    pub photo: PathBuf,
    pub iris: PathBuf,
    pub shirt: PathBuf,
    pub shirt_pattern: PathBuf,
    pub pectoral: PathBuf,
    pub crest_shape: PathBuf,
    pub crest_pattern: PathBuf,
    pub crest_content: PathBuf,
    pub card_shape: PathBuf,
    pub card_pattern: PathBuf,
    pub flag: PathBuf,
    pub star: PathBuf,
    pub position: PathBuf,
    pub mental: PathBuf,
    pub physical: PathBuf,
    pub age: PathBuf,
    pub height: PathBuf,
    pub weight: PathBuf,
}

/// The JSON document naming every part of a generation. Paths are relative
/// to the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub player: PlayerInfo,
    pub colors: ManifestColors,
    pub pictures: ManifestPictures,
    pub font: PathBuf,
}

#[derive(Debug, Clone, Copy)]
pub struct PartColors {
    pub skin: Rgb<u8>,
    pub hair: Rgb<u8>,
    pub eyes: Rgb<u8>,
    pub mouth: Rgb<u8>,
    pub card: Rgb<u8>,
    pub first: Rgb<u8>,
    pub second: Rgb<u8>,
}

pub struct CardPictures {
    pub shape: RgbaImage,
    pub pattern: RgbaImage,
    pub flag: RgbaImage,
    pub star: RgbaImage,
    pub position: RgbaImage,
    pub mental: RgbaImage,
    pub physical: RgbaImage,
    pub age: RgbaImage,
    pub height: RgbaImage,
    pub weight: RgbaImage,
}

pub struct GenerationParts {
    pub player: PlayerInfo,
    pub colors: PartColors,
    pub photo: RgbImage,
    pub iris: RgbaImage,
    pub shirt: ShirtParts,
    pub card: CardPictures,
    /// TrueType font data.
    pub font: Vec<u8>,
}

impl PartColors {
    pub fn parse(colors: &ManifestColors) -> Result<PartColors> {
        Ok(PartColors {
            skin: hex_to_rgb(&colors.skin)?,
            hair: hex_to_rgb(&colors.hair)?,
            eyes: hex_to_rgb(&colors.eyes)?,
            mouth: hex_to_rgb(&colors.mouth)?,
            card: hex_to_rgb(&colors.card)?,
            first: hex_to_rgb(&colors.first)?,
            second: hex_to_rgb(&colors.second)?,
        })
    }
}

struct Resolver<'a> {
    base: &'a Path,
}

impl Resolver<'_> {
    fn path(&self, relative: &Path) -> PathBuf {
        self.base.join(relative)
    }

    fn open(&self, relative: &Path) -> Result<image::DynamicImage> {
        let path = self.path(relative);
        debug!("Loading {}", path.display());
        image::open(&path).map_err(|e| Error::Config(format!("could not read {}: {e}", path.display())).into())
    }

    fn rgb(&self, relative: &Path) -> Result<RgbImage> {
        Ok(self.open(relative)?.to_rgb8())
    }

    fn rgba(&self, relative: &Path) -> Result<RgbaImage> {
        Ok(self.open(relative)?.to_rgba8())
    }
}

impl GenerationParts {
    pub fn load(manifest_path: &Path) -> Result<GenerationParts> {
        let content = fs::read_to_string(manifest_path)
            .map_err(|e| Error::Config(format!("could not read {}: {e}", manifest_path.display())))?;
        let manifest: Manifest = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("could not parse {}: {e}", manifest_path.display())))?;

        let base = manifest_path.parent().unwrap_or(Path::new("."));
        let parts = GenerationParts::resolve(&manifest, base)?;
        info!("Loaded parts for player {}", parts.player.code);
        Ok(parts)
    }

    pub fn resolve(manifest: &Manifest, base: &Path) -> Result<GenerationParts> {
        let r = Resolver { base };
        let p = &manifest.pictures;

        let font_path = r.path(&manifest.font);
        let font = fs::read(&font_path)
            .map_err(|e| Error::Config(format!("could not read {}: {e}", font_path.display())))?;
        FontRef::try_from_slice(&font)
            .map_err(|e| Error::Config(format!("invalid font {}: {e}", font_path.display())))?;

        Ok(GenerationParts {
            player: manifest.player.clone(),
            colors: PartColors::parse(&manifest.colors)?,
            photo: r.rgb(&p.photo)?,
            iris: r.rgba(&p.iris)?,
            shirt: ShirtParts {
                jersey: r.rgb(&p.shirt)?,
                pattern: r.rgb(&p.shirt_pattern)?,
                pectoral: r.rgb(&p.pectoral)?,
                crest_shape: r.rgb(&p.crest_shape)?,
                crest_pattern: r.rgb(&p.crest_pattern)?,
                crest_content: r.rgb(&p.crest_content)?,
            },
            card: CardPictures {
                shape: r.rgba(&p.card_shape)?,
                pattern: r.rgba(&p.card_pattern)?,
                flag: r.rgba(&p.flag)?,
                star: r.rgba(&p.star)?,
                position: r.rgba(&p.position)?,
                mental: r.rgba(&p.mental)?,
                physical: r.rgba(&p.physical)?,
                age: r.rgba(&p.age)?,
                height: r.rgba(&p.height)?,
                weight: r.rgba(&p.weight)?,
            },
            font,
        })
    }

    pub fn palette(&self) -> Palette {
        Palette {
            skin: self.colors.skin,
            hair: self.colors.hair,
            eyes: self.colors.eyes,
            mouth: self.colors.mouth,
        }
    }

    pub fn club_colors(&self) -> ClubColors {
        ClubColors {
            first: self.colors.first,
            second: self.colors.second,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_json() -> &'static str {
        r##"{
            "player": {
                "code": "P-0042", "first_name": "Jean", "last_name": "Dupont",
                "age": 24, "height": 182, "weight": 76, "club": "FC Test",
                "position_note": 80, "mental_note": 75, "physical_note": 88,
                "global_note": 95, "nft_count": "1/250"
            },
            "colors": {
                "skin": "#C89678", "hair": "#281e14", "eyes": "#3C5AA0",
                "mouth": "#B43C3C", "card": "#102030", "first": "#FF0000", "second": "#0000ff"
            },
            "pictures": {
                "photo": "photo.png", "iris": "iris.png", "shirt": "shirt.png",
                "shirt_pattern": "pattern.png", "pectoral": "pec.png",
                "crest_shape": "crest_shape.png", "crest_pattern": "crest_pattern.png",
                "crest_content": "crest_content.png", "card_shape": "card_shape.png",
                "card_pattern": "card_pattern.png", "flag": "flag.png", "star": "star.png",
                "position": "position.png", "mental": "mental.png", "physical": "physical.png",
                "age": "age.png", "height": "height.png", "weight": "weight.png"
            },
            "font": "font.ttf"
        }"##
    }

    #[test]
    fn test_manifest_colors() {
        let manifest: Manifest = serde_json::from_str(manifest_json()).unwrap();
        let colors = PartColors::parse(&manifest.colors).unwrap();
        assert_eq!(colors.skin, Rgb([200, 150, 120]));
        assert_eq!(colors.second, Rgb([0, 0, 255]));
        assert_eq!(manifest.player.global_note, 95);
    }

    #[test]
    fn test_bad_color_is_config_error() {
        let mut manifest: Manifest = serde_json::from_str(manifest_json()).unwrap();
        manifest.colors.card = "#12345".to_string();
        let err = PartColors::parse(&manifest.colors).unwrap_err();
        assert!(Error::is_fatal(&err));
    }

    #[test]
    fn test_missing_files_are_config_errors() {
        let manifest: Manifest = serde_json::from_str(manifest_json()).unwrap();
        let err = GenerationParts::resolve(&manifest, Path::new("/nonexistent/parts")).err().unwrap();
        assert!(Error::is_fatal(&err));
        assert!(err.to_string().contains("/nonexistent/parts/font.ttf"));
    }
}
