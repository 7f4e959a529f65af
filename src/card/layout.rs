use image::Rgb;

pub const NOTE_WHITE: Rgb<u8> = Rgb([254, 254, 254]);
pub const NOTE_GRAY: Rgb<u8> = Rgb([204, 204, 204]);
pub const STAR_COLOR: Rgb<u8> = Rgb([249, 236, 49]);

pub const DEFAULT_MARGIN: i32 = 100;
pub const CAPTION_SIZE: f32 = 100.;
pub const ICON_HEIGHT: u32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Text,
    Picture,
    Pictures,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    LeftTop,
    MiddleTop,
    RightTop,
    MiddleBottom,
}

/// Position taken from what was drawn before the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depending {
    /// Right of the last drawn text.
    LastX,
    /// Below the last drawn text.
    LastY,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Where an entry's content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Literal(&'static str),
    GlobalNote,
    FirstName,
    LastName,
    NftCount,
    Club,
    FlagAndCrest,
    Shirt,
    Star,
    PositionIcon,
    MentalIcon,
    PhysicalIcon,
    AgeIcon,
    HeightIcon,
    WeightIcon,
    PositionNote,
    MentalNote,
    PhysicalNote,
    Age,
    Height,
    Weight,
}

#[derive(Debug, Clone, Copy)]
pub struct LayoutEntry {
    pub kind: Kind,
    pub value: Source,
    /// Color of the card shape pixel anchoring the entry. Without one the
    /// previous entry's anchor is reused.
    pub marker: Option<Rgb<u8>>,
    pub anchor: Anchor,
    pub depending: Option<Depending>,
    /// Target height of a picture.
    pub resize: Option<u32>,
    pub margin: Option<i32>,
    /// Horizontal shift applied with a dependency.
    pub shift: Option<i32>,
    pub size: f32,
    pub fill: Rgb<u8>,
    pub opacity: u8,
    pub uppercase: bool,
    pub repeat: Option<(usize, Direction)>,
    /// Text drawn under a picture.
    pub caption: Option<Source>,
}

const TEXT: LayoutEntry = LayoutEntry {
    kind: Kind::Text,
    value: Source::Literal(""),
    marker: None,
    anchor: Anchor::LeftTop,
    depending: None,
    resize: None,
    margin: None,
    shift: None,
    size: 100.,
    fill: NOTE_WHITE,
    opacity: 255,
    uppercase: false,
    repeat: None,
    caption: None,
};

const ICON: LayoutEntry = LayoutEntry {
    kind: Kind::Picture,
    anchor: Anchor::MiddleTop,
    resize: Some(ICON_HEIGHT),
    ..TEXT
};

const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

pub static CARD_LAYOUT: [LayoutEntry; 14] = [
    LayoutEntry {
        value: Source::GlobalNote,
        marker: Some(BLUE),
        size: 640.,
        ..TEXT
    },
    LayoutEntry {
        value: Source::Literal("/100"),
        marker: Some(BLUE),
        depending: Some(Depending::LastX),
        size: 250.,
        fill: NOTE_GRAY,
        opacity: 160,
        ..TEXT
    },
    LayoutEntry {
        value: Source::FirstName,
        marker: Some(GREEN),
        anchor: Anchor::MiddleTop,
        size: 250.,
        ..TEXT
    },
    LayoutEntry {
        value: Source::LastName,
        anchor: Anchor::MiddleTop,
        depending: Some(Depending::LastY),
        size: 300.,
        uppercase: true,
        ..TEXT
    },
    LayoutEntry {
        kind: Kind::Pictures,
        value: Source::FlagAndCrest,
        marker: Some(GREEN),
        depending: Some(Depending::LastY),
        caption: Some(Source::Club),
        ..TEXT
    },
    LayoutEntry {
        kind: Kind::Picture,
        value: Source::Shirt,
        marker: Some(Rgb([255, 255, 0])),
        anchor: Anchor::MiddleBottom,
        ..TEXT
    },
    LayoutEntry {
        kind: Kind::Picture,
        value: Source::Star,
        marker: Some(Rgb([128, 128, 128])),
        opacity: 128,
        repeat: Some((5, Direction::Left)),
        ..TEXT
    },
    LayoutEntry {
        value: Source::PositionIcon,
        marker: Some(Rgb([255, 0, 0])),
        caption: Some(Source::PositionNote),
        ..ICON
    },
    LayoutEntry {
        value: Source::MentalIcon,
        marker: Some(Rgb([255, 0, 255])),
        caption: Some(Source::MentalNote),
        ..ICON
    },
    LayoutEntry {
        value: Source::PhysicalIcon,
        marker: Some(Rgb([0, 255, 255])),
        caption: Some(Source::PhysicalNote),
        ..ICON
    },
    LayoutEntry {
        value: Source::AgeIcon,
        marker: Some(Rgb([0, 0, 128])),
        caption: Some(Source::Age),
        ..ICON
    },
    LayoutEntry {
        value: Source::HeightIcon,
        marker: Some(Rgb([0, 128, 0])),
        caption: Some(Source::Height),
        ..ICON
    },
    LayoutEntry {
        value: Source::WeightIcon,
        marker: Some(Rgb([128, 0, 0])),
        caption: Some(Source::Weight),
        ..ICON
    },
    LayoutEntry {
        value: Source::NftCount,
        marker: Some(Rgb([0, 128, 128])),
        anchor: Anchor::MiddleTop,
        size: 75.,
        ..TEXT
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_markers_are_distinct_per_anchor() {
        let markers: Vec<_> = CARD_LAYOUT.iter().filter_map(|e| e.marker).collect();
        assert_eq!(markers.len(), 13);
        // only the note and the names share anchors
        let mut unique = markers.clone();
        unique.sort_by_key(|c| c.0);
        unique.dedup();
        assert_eq!(unique.len(), 11);
    }

    #[test]
    fn test_icons_have_captions() {
        for entry in CARD_LAYOUT.iter().filter(|e| e.resize == Some(ICON_HEIGHT)) {
            assert_eq!(entry.anchor, Anchor::MiddleTop);
            assert!(entry.caption.is_some());
        }
    }
}
