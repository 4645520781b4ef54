//! Sparkline quantization.
//!
//! Turns a sample series into a `height × width` grid of glyph levels in
//! `0..=8`, where 0 is an empty cell and 8 a full block. The grid does not
//! know about colours or terminals; [`Graph::lines`] maps levels onto the
//! Unicode lower-block glyphs for text output.

/// Glyphs for levels 0 through 8.
pub const GLYPHS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Highest glyph level (a full cell).
pub const FULL: u8 = 8;

/// Scale floor used when the derived maximum is zero or negative.
pub const MIN_SCALE: f64 = 0.001;

/// Quantized sparkline. `rows[0]` is the top row, the last row is the baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    rows: Vec<Vec<u8>>,
}

impl Graph {
    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Level stack of one column, bottom row first.
    pub fn column(&self, x: usize) -> Vec<u8> {
        self.rows.iter().rev().map(|row| row[x]).collect()
    }

    /// One string per row, top first.
    pub fn lines(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|&lvl| GLYPHS[lvl as usize]).collect())
            .collect()
    }
}

/// Render `samples` (oldest first) into a `width × height` grid.
///
/// With fewer than `width` samples the series is left-padded with zeros so the
/// newest sample stays in the rightmost column; with more, only the newest
/// `width` are drawn. `max` fixes the scale; otherwise the largest sample is
/// used, floored at [`MIN_SCALE`]. Values are clamped to `[0, max]`.
pub fn render_graph(samples: &[f64], width: usize, height: usize, max: Option<f64>) -> Graph {
    let scale = max
        .unwrap_or_else(|| samples.iter().copied().fold(0.0, f64::max))
        .max(MIN_SCALE);

    let visible = &samples[samples.len().saturating_sub(width)..];
    let pad = width - visible.len();

    let mut rows = vec![vec![0u8; width]; height];
    for (i, &value) in visible.iter().enumerate() {
        let x = pad + i;
        let filled = cell_height(value, scale, height);
        for level_row in 0..height {
            // level_row counts from the baseline; rows are stored top first.
            rows[height - 1 - level_row][x] = level_for_row(filled, level_row);
        }
    }

    Graph { rows }
}

/// Column height in cells, in `[0, height]`.
fn cell_height(value: f64, scale: f64, height: usize) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value / scale).clamp(0.0, 1.0) * height as f64
}

fn level_for_row(filled: f64, row: usize) -> u8 {
    let row = row as f64;
    if filled >= row + 1.0 {
        FULL
    } else if filled > row {
        (((filled - row) * f64::from(FULL)) as u8).min(FULL)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn all_zero_series_is_empty() {
        let g = render_graph(&[0.0; 10], 8, 4, None);
        assert!(g.rows().iter().flatten().all(|&l| l == 0));
    }

    #[test]
    fn empty_series_is_empty_grid_of_requested_size() {
        let g = render_graph(&[], 5, 3, Some(10.0));
        assert_eq!(g.height(), 3);
        assert_eq!(g.width(), 5);
        assert!(g.rows().iter().flatten().all(|&l| l == 0));
    }

    #[test]
    fn value_at_explicit_max_fills_its_column() {
        let g = render_graph(&[0.0, 100.0, 0.0], 3, 4, Some(100.0));
        assert_eq!(g.column(1), vec![FULL; 4]);
        assert_eq!(g.column(0), vec![0; 4]);
        assert_eq!(g.column(2), vec![0; 4]);
    }

    #[test]
    fn short_series_is_right_aligned() {
        let g = render_graph(&[5.0], 4, 2, Some(5.0));
        assert_eq!(g.column(3), vec![FULL, FULL]);
        for x in 0..3 {
            assert_eq!(g.column(x), vec![0, 0]);
        }
    }

    #[test]
    fn long_series_keeps_newest() {
        let g = render_graph(&[9.0, 9.0, 0.0, 9.0], 2, 1, Some(9.0));
        assert_eq!(g.rows()[0], vec![0, FULL]);
    }

    #[test]
    fn fractional_top_cell_gets_partial_glyph() {
        // 50 / 100 over 3 rows = 1.5 cells: one full, one half.
        let g = render_graph(&[50.0], 1, 3, Some(100.0));
        assert_eq!(g.column(0), vec![FULL, 4, 0]);
    }

    #[test]
    fn derived_max_scales_to_largest_sample() {
        let g = render_graph(&[1.0, 2.0], 2, 2, None);
        assert_eq!(g.column(1), vec![FULL, FULL]);
        assert_eq!(g.column(0), vec![FULL, 0]);
    }

    #[test]
    fn values_above_max_and_negative_are_clamped() {
        let g = render_graph(&[-5.0, 500.0, f64::NAN], 3, 2, Some(100.0));
        assert_eq!(g.column(0), vec![0, 0]);
        assert_eq!(g.column(1), vec![FULL, FULL]);
        assert_eq!(g.column(2), vec![0, 0]);
    }

    #[test]
    fn zero_max_uses_floor() {
        let g = render_graph(&[0.002], 1, 1, Some(0.0));
        assert_eq!(g.rows()[0], vec![FULL]);
    }

    #[test]
    fn lines_map_levels_to_glyphs() {
        let g = render_graph(&[0.0, 50.0, 100.0], 3, 1, Some(100.0));
        assert_eq!(g.lines(), vec![" ▄█".to_string()]);
    }

    proptest! {
        #[test]
        fn shape_matches_request(
            samples in prop::collection::vec(-10.0f64..1000.0, 0..120),
            width in 0usize..80,
            height in 0usize..12,
            max in prop::option::of(0.0f64..500.0),
        ) {
            let g = render_graph(&samples, width, height, max);
            prop_assert_eq!(g.rows().len(), height);
            for row in g.rows() {
                prop_assert_eq!(row.len(), width);
                prop_assert!(row.iter().all(|&l| l <= FULL));
            }
        }
    }
}
