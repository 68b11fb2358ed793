use palette::{FromColor, Hsl, Srgb};

use crate::led::color::{Color, ColorMatrix};
use crate::util::error::{ControlError, Result};

/// Frame builders for `update_leds`.
pub struct Pattern;

impl Pattern {
    pub fn alternating(leds: usize, colors: &[Color]) -> Result<ColorMatrix> {
        if colors.is_empty() {
            return Err(ControlError::InvalidArgument(
                "Color list is empty".to_string(),
            ));
        }
        Ok((0..leds).map(|i| colors[i % colors.len()]).collect())
    }

    /// Hues spread evenly over the LEDs, rotated by `offset` (a fraction of a full turn).
    pub fn color_wheel(leds: usize, offset: f64) -> ColorMatrix {
        (0..leds)
            .map(|i| {
                let hue = ((i as f64 / leds as f64 + offset).rem_euclid(1.0)) * 360.0;
                let rgb = Srgb::from_color(Hsl::new(hue as f32, 1.0, 0.5));
                let (r, g, b) = rgb.into_components();
                Color::from_rgb(to_byte(r), to_byte(g), to_byte(b))
            })
            .collect()
    }

    pub fn dim_color(color: Color, prop: f64) -> Color {
        let (r, g, b) = color.to_rgb();
        let dim = |c: u8| (c as f64 * prop).round().clamp(0.0, 255.0) as u8;
        Color::from_rgb(dim(r), dim(g), dim(b))
    }

    /// Every LED of `matrix` scaled by `prop`.
    pub fn dim(matrix: &ColorMatrix, prop: f64) -> ColorMatrix {
        matrix
            .colors()
            .iter()
            .map(|&color| Pattern::dim_color(color, prop))
            .collect()
    }

    pub fn blend_colors(from: Color, to: Color, prop: f64) -> Color {
        let (r1, g1, b1) = from.to_rgb();
        let (r2, g2, b2) = to.to_rgb();
        let blend = |c1: u8, c2: u8| {
            (c1 as f64 * (1.0 - prop) + c2 as f64 * prop)
                .round()
                .clamp(0.0, 255.0) as u8
        };
        Color::from_rgb(blend(r1, r2), blend(g1, g2), blend(b1, b2))
    }

    /// Linear fade from `from` on the first LED to `to` on the last.
    pub fn gradient(leds: usize, from: Color, to: Color) -> ColorMatrix {
        let span = leds.saturating_sub(1).max(1) as f64;
        (0..leds)
            .map(|i| Pattern::blend_colors(from, to, i as f64 / span))
            .collect()
    }
}

fn to_byte(component: f32) -> u8 {
    (component * 255.0).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alternating() {
        let red = Color::from_rgb(255, 0, 0);
        let blue = Color::from_rgb(0, 0, 255);
        let matrix = Pattern::alternating(5, &[red, blue]).unwrap();
        assert_eq!(matrix.colors(), &[red, blue, red, blue, red]);
        assert!(Pattern::alternating(5, &[]).is_err());
    }

    #[test]
    fn test_color_wheel_starts_red() {
        let matrix = Pattern::color_wheel(6, 0.0);
        assert_eq!(matrix.len(), 6);
        assert_eq!(matrix.colors()[0], Color::from_rgb(255, 0, 0));
        assert_eq!(matrix.colors()[2], Color::from_rgb(0, 255, 0));
        assert_eq!(matrix.colors()[4], Color::from_rgb(0, 0, 255));
    }

    #[test]
    fn test_blend_and_dim() {
        let black = Color::BLACK;
        let white = Color::WHITE;
        assert_eq!(Pattern::blend_colors(black, white, 0.0), black);
        assert_eq!(Pattern::blend_colors(black, white, 1.0), white);
        assert_eq!(Pattern::dim_color(white, 0.5), Color::from_rgb(128, 128, 128));

        let dimmed = Pattern::dim(&ColorMatrix::solid(2, white), 0.0);
        assert_eq!(dimmed.colors(), &[black, black]);

        let gradient = Pattern::gradient(3, black, white);
        assert_eq!(gradient.colors()[0], black);
        assert_eq!(gradient.colors()[2], white);
        assert_eq!(Pattern::gradient(1, black, white).colors(), &[black]);
    }
}
