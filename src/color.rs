use std::collections::BTreeMap;

use palette::{Hsl, IntoColor, Srgb};

/// 8-bit sRGB triple.
pub type Rgb = [u8; 3];

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Rgb> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.45);
            let rgb: Srgb = hsl.into_color();
            [
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            ]
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Band colour names
// ---------------------------------------------------------------------------

const NAMED: [(&str, Rgb); 12] = [
    ("blue", [31, 119, 180]),
    ("orange", [255, 127, 14]),
    ("green", [44, 160, 44]),
    ("red", [214, 39, 40]),
    ("purple", [148, 103, 189]),
    ("brown", [140, 86, 75]),
    ("pink", [227, 119, 194]),
    ("olive", [188, 189, 34]),
    ("cyan", [23, 190, 207]),
    ("magenta", [255, 0, 255]),
    ("grey", [127, 127, 127]),
    ("gray", [127, 127, 127]),
];

/// RGB of a band colour name, case-insensitive.
pub fn named_colour(name: &str) -> Option<Rgb> {
    let lower = name.trim().to_ascii_lowercase();
    NAMED
        .iter()
        .find(|(n, _)| *n == lower)
        .map(|&(_, rgb)| rgb)
}

// ---------------------------------------------------------------------------
// Color mapping: curve label → colour
// ---------------------------------------------------------------------------

/// Maps curve labels (plot titles, scan names) to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<String, Rgb>,
    order: Vec<String>,
    default_color: Rgb,
}

impl ColorMap {
    /// Colours are assigned in the order labels are given; duplicates share one.
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut order: Vec<String> = Vec::new();
        for label in labels {
            let label = label.as_ref();
            if !order.iter().any(|l| l == label) {
                order.push(label.to_string());
            }
        }
        let palette = generate_palette(order.len());
        let mapping = order.iter().cloned().zip(palette).collect();
        ColorMap {
            mapping,
            order,
            default_color: [128, 128, 128],
        }
    }

    pub fn color_for(&self, label: &str) -> Rgb {
        self.mapping
            .get(label)
            .copied()
            .unwrap_or(self.default_color)
    }

    /// Legend entries (label → colour) in assignment order.
    pub fn legend_entries(&self) -> Vec<(String, Rgb)> {
        self.order
            .iter()
            .map(|l| (l.clone(), self.color_for(l)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_is_distinct() {
        let palette = generate_palette(5);
        assert_eq!(palette.len(), 5);
        for (i, a) in palette.iter().enumerate() {
            for b in &palette[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn test_named_colours() {
        assert_eq!(named_colour("Orange"), Some([255, 127, 14]));
        assert_eq!(named_colour("chartreuse"), None);
    }

    #[test]
    fn test_color_map_keeps_label_order() {
        let map = ColorMap::new(&["b", "a", "b"]);
        let legend = map.legend_entries();
        assert_eq!(legend.len(), 2);
        assert_eq!(legend[0].0, "b");
        assert_eq!(map.color_for("zzz"), [128, 128, 128]);
    }
}
