use crate::segmentation::{BinaryMask, Frame};
use image::Rgb;
use std::fmt;
use std::str::FromStr;

/// Flat color substituted for background pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackgroundColor(pub [u8; 3]);

impl BackgroundColor {
    pub const BLACK: Self = Self([0, 0, 0]);

    pub fn rgb(self) -> Rgb<u8> {
        Rgb(self.0)
    }
}

impl fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

impl FromStr for BackgroundColor {
    type Err = String;

    /// Accepts `#rrggbb`, `rrggbb` or `r,g,b`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains(',') {
            let parts: Vec<&str> = s.split(',').map(str::trim).collect();
            if parts.len() != 3 {
                return Err(format!("expected r,g,b but got '{s}'"));
            }
            let mut rgb = [0u8; 3];
            for (slot, part) in rgb.iter_mut().zip(parts) {
                let digits = !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
                *slot = part
                    .parse()
                    .ok()
                    .filter(|_| digits)
                    .ok_or_else(|| format!("'{part}' is not a channel value (0-255)"))?;
            }
            return Ok(Self(rgb));
        }

        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(format!("expected #rrggbb but got '{s}'"));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| format!("invalid hex color '{s}'"))
        };
        Ok(Self([channel(0)?, channel(2)?, channel(4)?]))
    }
}

/// Replace every pixel whose mask value is exactly zero with `background`
///
/// Non-zero mask values keep the source pixel unchanged; there is no
/// blending. Returns `None` when the mask and frame sizes differ.
pub fn composite(frame: &Frame, mask: &BinaryMask, background: BackgroundColor) -> Option<Frame> {
    if frame.dimensions() != mask.dimensions() {
        return None;
    }

    let _span = tracing::debug_span!("composite").entered();
    let mut output = frame.clone();
    let fill = background.rgb();
    for (pixel, keep) in output.pixels_mut().zip(mask.pixels()) {
        if keep[0] == 0 {
            *pixel = fill;
        }
    }
    Some(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use proptest::prelude::*;

    #[test]
    fn test_parse_colors() {
        assert_eq!("#00ff80".parse::<BackgroundColor>(), Ok(BackgroundColor([0, 255, 128])));
        assert_eq!("00FF80".parse::<BackgroundColor>(), Ok(BackgroundColor([0, 255, 128])));
        assert_eq!(" 1, 2 ,3".parse::<BackgroundColor>(), Ok(BackgroundColor([1, 2, 3])));
        assert!("1,2".parse::<BackgroundColor>().is_err());
        assert!("256,0,0".parse::<BackgroundColor>().is_err());
        assert!("#12345".parse::<BackgroundColor>().is_err());
        assert!("#gg0000".parse::<BackgroundColor>().is_err());
    }

    #[test]
    fn test_parse_rejects_signs() {
        assert!("#+f+f+f".parse::<BackgroundColor>().is_err());
        assert!("+f+f+f".parse::<BackgroundColor>().is_err());
        assert!("+1,2,3".parse::<BackgroundColor>().is_err());
        assert!("1,,3".parse::<BackgroundColor>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        let color = BackgroundColor([18, 52, 86]);
        assert_eq!(color.to_string(), "#123456");
        assert_eq!(color.to_string().parse::<BackgroundColor>(), Ok(color));
    }

    #[test]
    fn test_size_mismatch() {
        assert!(composite(&Frame::new(2, 2), &BinaryMask::new(2, 3), BackgroundColor::BLACK).is_none());
    }

    #[test]
    fn test_partial_values_are_kept_verbatim() {
        let frame = Frame::from_pixel(3, 1, Rgb([10, 20, 30]));
        let mask = BinaryMask::from_raw(3, 1, vec![0, 1, 200]).unwrap();
        let out = composite(&frame, &mask, BackgroundColor([9, 9, 9])).unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgb([9, 9, 9]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([10, 20, 30]));
        assert_eq!(out.get_pixel(2, 0), &Rgb([10, 20, 30]));
    }

    proptest! {
        #[test]
        fn prop_zero_mask_pixels_become_background(
            w in 1u32..16,
            h in 1u32..16,
            pixels in proptest::collection::vec(any::<(u8, u8, u8, u8)>(), 256),
            bg in any::<[u8; 3]>(),
        ) {
            let at = |x: u32, y: u32| pixels[(y * 16 + x) as usize];
            let frame = Frame::from_fn(w, h, |x, y| {
                let (r, g, b, _) = at(x, y);
                Rgb([r, g, b])
            });
            let mask = BinaryMask::from_fn(w, h, |x, y| Luma([at(x, y).3 % 3]));
            let out = composite(&frame, &mask, BackgroundColor(bg)).unwrap();

            for (x, y, pixel) in out.enumerate_pixels() {
                if mask.get_pixel(x, y)[0] == 0 {
                    prop_assert_eq!(pixel, &Rgb(bg));
                } else {
                    prop_assert_eq!(pixel, frame.get_pixel(x, y));
                }
            }
        }
    }
}
