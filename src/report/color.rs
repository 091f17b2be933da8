use palette::{Hsl, IntoColor, Srgb};
use rust_xlsxwriter::Color;

// ---------------------------------------------------------------------------
// Series palette
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues, one per
/// channel series.
pub fn generate_palette(n: usize) -> Vec<Color> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.45);
            let rgb: Srgb = hsl.into_color();
            Color::RGB(pack_rgb(rgb))
        })
        .collect()
}

fn pack_rgb(rgb: Srgb) -> u32 {
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
    (channel(rgb.red) << 16) | (channel(rgb.green) << 8) | channel(rgb.blue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_requested_length() {
        assert!(generate_palette(0).is_empty());
        assert_eq!(generate_palette(29).len(), 29);
    }

    #[test]
    fn first_colour_is_red_hue() {
        assert_eq!(pack_rgb(Srgb::new(1.0, 0.0, 0.0)), 0xFF0000);
        match generate_palette(3)[0] {
            Color::RGB(rgb) => assert!(rgb >> 16 > (rgb >> 8) & 0xFF),
            other => panic!("unexpected colour {other:?}"),
        }
    }
}
