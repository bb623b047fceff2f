use palette::{Hsl, IntoColor, Srgb};
use plotters::style::RGBColor;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues. Used
/// for the per-sub-station traces of a time-series chart.
pub fn generate_palette(n: usize) -> Vec<RGBColor> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            hsl_to_rgb(hue, 0.75, 0.45)
        })
        .collect()
}

/// Map `t ∈ [0, 1]` onto a blue→red hue sweep. Depth-profile traces are
/// coloured by sampling date with this gradient, early dates cold, late
/// dates warm.
pub fn gradient(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0) as f32;
    let hue = 240.0 * (1.0 - t);
    hsl_to_rgb(hue, 0.85, 0.45)
}

fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> RGBColor {
    let hsl = Hsl::new(hue, saturation, lightness);
    let rgb: Srgb = hsl.into_color();
    RGBColor(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_requested_size_and_distinct_entries() {
        let palette = generate_palette(12);
        assert_eq!(palette.len(), 12);
        assert_ne!(palette[0], palette[6]);
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn gradient_endpoints_are_blue_and_red() {
        let cold = gradient(0.0);
        let warm = gradient(1.0);
        assert!(cold.2 > cold.0); // blue-dominant
        assert!(warm.0 > warm.2); // red-dominant
    }
}
