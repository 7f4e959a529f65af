//! Face mesh indices grouped by the part they trace. "Left" and "right" are
//! as seen in the image.

pub const LEFT_EYE: [usize; 16] = [
    133, 173, 157, 158, 159, 160, 161, 246, 33, 7, 163, 144, 145, 153, 154, 155,
];
pub const RIGHT_EYE: [usize; 16] = [
    263, 466, 388, 387, 386, 385, 384, 398, 362, 382, 381, 380, 374, 373, 390, 249,
];

pub const LEFT_EYE_IRIS: [usize; 4] = [469, 470, 471, 472];
pub const RIGHT_EYE_IRIS: [usize; 4] = [474, 475, 476, 477];

pub const LEFT_UP_EYE: [usize; 9] = [33, 246, 161, 160, 159, 158, 157, 173, 133];
pub const RIGHT_UP_EYE: [usize; 9] = [362, 398, 384, 385, 386, 387, 388, 466, 263];

/// Crease above each eye, outer corner first.
pub const LEFT_UP_EYELID: [usize; 7] = [247, 30, 29, 27, 28, 56, 190];
pub const RIGHT_UP_EYELID: [usize; 7] = [467, 260, 259, 257, 258, 286, 414];

/// Upper lid followed by the crease, closing into the skin band between them.
pub const LEFT_EYELID: [usize; 16] = [
    33, 246, 161, 160, 159, 158, 157, 173, 133, 190, 56, 28, 27, 29, 30, 247,
];
pub const RIGHT_EYELID: [usize; 16] = [
    362, 398, 384, 385, 386, 387, 388, 466, 263, 467, 260, 259, 257, 258, 286, 414,
];

pub const LEFT_EYE_LEFT_POINT: usize = 33;
pub const LEFT_EYE_RIGHT_POINT: usize = 133;
pub const RIGHT_EYE_LEFT_POINT: usize = 362;
pub const RIGHT_EYE_RIGHT_POINT: usize = 263;

pub const NOSE: [usize; 22] = [
    168, 193, 245, 188, 174, 217, 126, 142, 129, 98, 97, 2, 326, 327, 358, 371, 355, 437, 399,
    412, 465, 417,
];
pub const DOWN_NOSE: [usize; 5] = [98, 97, 2, 326, 327];
pub const NOSE_TIP_LINE: [usize; 9] = [219, 218, 237, 44, 1, 274, 457, 438, 439];
pub const LEFT_NOSTRIL: [usize; 7] = [79, 166, 59, 75, 60, 20, 238];
pub const RIGHT_NOSTRIL: [usize; 7] = [309, 392, 289, 305, 290, 250, 458];

pub const INTERN_MOUTH: [usize; 20] = [
    78, 191, 80, 81, 82, 13, 312, 311, 310, 415, 308, 324, 318, 402, 317, 14, 87, 178, 88, 95,
];
pub const EXTERN_MOUTH: [usize; 20] = [
    61, 185, 40, 39, 37, 0, 267, 269, 270, 409, 291, 375, 321, 405, 314, 17, 84, 181, 91, 146,
];

pub const LIPS: [(usize, usize); 40] = [
    (61, 146),
    (146, 91),
    (91, 181),
    (181, 84),
    (84, 17),
    (17, 314),
    (314, 405),
    (405, 321),
    (321, 375),
    (375, 291),
    (61, 185),
    (185, 40),
    (40, 39),
    (39, 37),
    (37, 0),
    (0, 267),
    (267, 269),
    (269, 270),
    (270, 409),
    (409, 291),
    (78, 95),
    (95, 88),
    (88, 178),
    (178, 87),
    (87, 14),
    (14, 317),
    (317, 402),
    (402, 318),
    (318, 324),
    (324, 308),
    (78, 191),
    (191, 80),
    (80, 81),
    (81, 82),
    (82, 13),
    (13, 312),
    (312, 311),
    (311, 310),
    (310, 415),
    (415, 308),
];

pub const LEFT_NECK: usize = 136;
pub const RIGHT_NECK: usize = 365;
pub const EAR_POINT: usize = 127;

pub const CHEEK_POINTS: [usize; 4] = [234, 1, 1, 454];
pub const LEFT_POINT: usize = 234;
pub const RIGHT_POINT: usize = 454;
pub const LEFT_TILT_POINTS: [usize; 4] = [105, 118, 192, 172];
pub const RIGHT_TILT_POINTS: [usize; 4] = [334, 347, 416, 397];

/// Midpoints appended after the mesh, in this order.
pub const SYNTHESIZED_PAIRS: [(usize, usize); 2] = [(2, 98), (2, 327)];
pub const LEFT_NARE: usize = 478;
pub const RIGHT_NARE: usize = 479;

/// Fan around the nose tip shaded by depth.
pub const NOSE_SHADING: [[usize; 3]; 4] = [
    [98, LEFT_NARE, 1],
    [LEFT_NARE, 2, 1],
    [2, RIGHT_NARE, 1],
    [RIGHT_NARE, 327, 1],
];
