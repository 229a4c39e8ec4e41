//! Correlation heatmap: a fixed [-1, 1] diverging colour scale plus two
//! renderers, the interactive terminal grid in [`view`] and a plain-text dump.

pub mod view;

use crate::analysis::CorrelationMatrix;
use crate::utils::fmt_corr;

pub const TITLE: &str = "Historical FTSE100 stock correlation";

/// Lower and upper bound of the colour scale. Values outside are clamped.
pub const SCALE_MIN: f64 = -1.0;
pub const SCALE_MAX: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Cells with no defined correlation.
pub const MISSING: Rgb = Rgb(96, 96, 96);

// Red → yellow → green, strong negative to strong positive.
const RD_YL_GN: [Rgb; 11] = [
    Rgb(165, 0, 38),
    Rgb(215, 48, 39),
    Rgb(244, 109, 67),
    Rgb(253, 174, 97),
    Rgb(254, 224, 139),
    Rgb(255, 255, 191),
    Rgb(217, 239, 139),
    Rgb(166, 217, 106),
    Rgb(102, 189, 99),
    Rgb(26, 152, 80),
    Rgb(0, 104, 55),
];

fn lerp(a: u8, b: u8, t: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * t).round() as u8
}

/// Colour for a correlation value on the fixed [-1, 1] scale.
pub fn color_for(value: f64) -> Rgb {
    if value.is_nan() {
        return MISSING;
    }
    let clamped = value.clamp(SCALE_MIN, SCALE_MAX);
    let t = (clamped - SCALE_MIN) / (SCALE_MAX - SCALE_MIN);

    let last = RD_YL_GN.len() - 1;
    let pos = t * last as f64;
    let lo = (pos.floor() as usize).min(last);
    let hi = (lo + 1).min(last);
    let frac = pos - lo as f64;

    let (a, b) = (RD_YL_GN[lo], RD_YL_GN[hi]);
    Rgb(lerp(a.0, b.0, frac), lerp(a.1, b.1, frac), lerp(a.2, b.2, frac))
}

pub fn cell_color(value: Option<f64>) -> Rgb {
    value.map(color_for).unwrap_or(MISSING)
}

/// Plain-text rendering for pipes and logs: labelled rows, two decimals.
pub fn render_text(matrix: &CorrelationMatrix) -> String {
    let labels = matrix.labels();
    let label_w = labels.iter().map(|l| l.len()).max().unwrap_or(0).max(4);
    let cell_w = label_w.max(6);

    let mut out = format!("{}\n{:label_w$}", TITLE, "");
    for l in labels {
        out.push_str(&format!(" {:>cell_w$}", l));
    }
    out.push('\n');

    for (i, row_label) in labels.iter().enumerate() {
        out.push_str(&format!("{:<label_w$}", row_label));
        for j in 0..labels.len() {
            out.push_str(&format!(" {:>cell_w$}", fmt_corr(matrix.get(i, j))));
        }
        out.push('\n');
    }
    out
}
