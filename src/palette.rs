use plotters::style::RGBColor;

/// Qualitative palette for categorical series
#[derive(Debug, Clone)]
pub struct ColorPalette {
    colors: Vec<RGBColor>,
}

impl ColorPalette {
    /// Ten muted colours, in the order bars and hues are assigned
    pub fn deep() -> Self {
        Self {
            colors: vec![
                RGBColor(76, 114, 176),
                RGBColor(221, 132, 82),
                RGBColor(85, 168, 104),
                RGBColor(196, 78, 82),
                RGBColor(129, 114, 179),
                RGBColor(147, 120, 96),
                RGBColor(218, 139, 195),
                RGBColor(140, 140, 140),
                RGBColor(204, 185, 116),
                RGBColor(100, 181, 205),
            ],
        }
    }

    /// Colour for the `index`-th category, cycling when categories outnumber colours
    pub fn color(&self, index: usize) -> RGBColor {
        self.colors[index % self.colors.len()]
    }
}

/// Sequential colour ramp for choropleth fills
#[derive(Debug, Clone)]
pub struct ColorRamp {
    stops: Vec<RGBColor>,
}

impl ColorRamp {
    pub fn viridis() -> Self {
        Self {
            stops: vec![
                RGBColor(68, 1, 84),
                RGBColor(72, 36, 117),
                RGBColor(65, 68, 135),
                RGBColor(53, 95, 141),
                RGBColor(42, 120, 142),
                RGBColor(33, 145, 140),
                RGBColor(34, 168, 132),
                RGBColor(68, 191, 112),
                RGBColor(122, 209, 81),
                RGBColor(189, 223, 38),
                RGBColor(253, 231, 37),
            ],
        }
    }

    /// Colour for `value` on the scale `[min, max]`; values outside are clamped
    pub fn color(&self, value: f64, min: f64, max: f64) -> RGBColor {
        let t = if max > min { (value - min) / (max - min) } else { 0.5 };
        self.color_at(t)
    }

    /// Colour at relative position `t` in `[0, 1]`
    pub fn color_at(&self, t: f64) -> RGBColor {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let last = self.stops.len() - 1;
        let pos = t * last as f64;
        let lo = (pos.floor() as usize).min(last);
        let hi = (lo + 1).min(last);
        let frac = pos - lo as f64;

        let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;
        let (a, b) = (self.stops[lo], self.stops[hi]);
        RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_cycles() {
        let p = ColorPalette::deep();
        assert_eq!(p.color(0), p.color(10));
        assert_ne!(p.color(0), p.color(1));
    }

    #[test]
    fn test_palette_order() {
        let p = ColorPalette::deep();
        assert_eq!(p.color(0), RGBColor(76, 114, 176));
        assert_eq!(p.color(1), RGBColor(221, 132, 82));
    }

    #[test]
    fn test_ramp_endpoints() {
        let ramp = ColorRamp::viridis();
        assert_eq!(ramp.color(0.0, 0.0, 100.0), RGBColor(68, 1, 84));
        assert_eq!(ramp.color(100.0, 0.0, 100.0), RGBColor(253, 231, 37));
        assert_eq!(ramp.color(250.0, 0.0, 100.0), RGBColor(253, 231, 37));
        assert_eq!(ramp.color(-5.0, 0.0, 100.0), RGBColor(68, 1, 84));
    }

    #[test]
    fn test_ramp_midpoint() {
        let ramp = ColorRamp::viridis();
        assert_eq!(ramp.color_at(0.5), RGBColor(33, 145, 140));
    }

    #[test]
    fn test_ramp_degenerate_scale() {
        let ramp = ColorRamp::viridis();
        assert_eq!(ramp.color(3.0, 3.0, 3.0), ramp.color_at(0.5));
    }
}
