//! PNG render surface backed by plotters

use chrono::Local;
use plotters::prelude::*;
use tracing::debug;

use super::sync_service::{RenderError, RenderSurface};
use crate::config::ChartStyle;
use crate::models::chart::{AxisSide, SeriesSet};

/// Renders the current series set as a line chart PNG.
///
/// The x axis is the shared label axis in feed order. Left-bound series plot
/// against the primary y axis, right-bound series against a secondary axis
/// that is only drawn when the layout uses it.
pub struct PngRenderer {
    style: ChartStyle,
}

impl PngRenderer {
    pub fn new(style: ChartStyle) -> Self {
        Self { style }
    }

    /// Pad a value range so the lines don't hug the frame
    fn padded_range(range: Option<(f64, f64)>) -> (f64, f64) {
        let (min, max) = range.unwrap_or((0.0, 1.0));
        let span = (max - min).max(1e-8); // Avoid a zero-height range
        let padding = span * 0.1;
        ((min - padding).max(0.0), max + padding)
    }

    fn render(&self, set: &SeriesSet) -> Result<(), RenderError> {
        let root = BitMapBackend::new(&self.style.path, (self.style.width, self.style.height))
            .into_drawing_area();
        root.fill(&WHITE)
            .map_err(|e| RenderError::Draw(format!("Failed to fill canvas: {}", e)))?;

        if set.is_empty() {
            // Nothing fetched yet: a blank canvas beats a degenerate axis
            root.present()
                .map_err(|e| RenderError::Draw(format!("Failed to render chart: {}", e)))?;
            return Ok(());
        }

        let n = set.len() as i32;
        let (y_left_min, y_left_max) = Self::padded_range(set.value_range(AxisSide::Left));
        let (y_right_min, y_right_max) = Self::padded_range(set.value_range(AxisSide::Right));
        let has_right_axis = set.series.iter().any(|s| s.spec.axis == AxisSide::Right);

        let caption = format!(
            "{} ({})",
            self.style.caption,
            Local::now().format("%d-%m-%Y %H:%M")
        );

        let mut chart = ChartBuilder::on(&root)
            .caption(&caption, ("sans-serif", 30.0).into_font())
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .right_y_label_area_size(if has_right_axis { 60 } else { 0 })
            .build_cartesian_2d(0..n, y_left_min..y_left_max)
            .map_err(|e| RenderError::Draw(format!("Failed to build chart: {}", e)))?
            .set_secondary_coord(0..n, y_right_min..y_right_max);

        chart
            .configure_mesh()
            .x_desc(&self.style.x_desc)
            .y_desc(&self.style.y_left_desc)
            .x_label_formatter(&|idx: &i32| {
                set.labels
                    .get(*idx as usize)
                    .cloned()
                    .unwrap_or_default()
            })
            .draw()
            .map_err(|e| RenderError::Draw(format!("Failed to draw mesh: {}", e)))?;

        if has_right_axis {
            chart
                .configure_secondary_axes()
                .y_desc(&self.style.y_right_desc)
                .draw()
                .map_err(|e| RenderError::Draw(format!("Failed to draw secondary axis: {}", e)))?;
        }

        for series in &set.series {
            let color = RGBColor(
                series.spec.color.0,
                series.spec.color.1,
                series.spec.color.2,
            );
            let points = series
                .data
                .iter()
                .enumerate()
                .map(|(i, value)| (i as i32, *value));
            let line = LineSeries::new(points, color.stroke_width(2));

            let anno = match series.spec.axis {
                AxisSide::Left => chart
                    .draw_series(line)
                    .map_err(|e| RenderError::Draw(format!("Failed to draw series: {}", e)))?,
                AxisSide::Right => chart
                    .draw_secondary_series(line)
                    .map_err(|e| RenderError::Draw(format!("Failed to draw series: {}", e)))?,
            };
            anno.label(&series.spec.label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| RenderError::Draw(format!("Failed to draw legend: {}", e)))?;

        root.present()
            .map_err(|e| RenderError::Draw(format!("Failed to render chart: {}", e)))?;

        debug!(
            "Rendered {} points to {}",
            set.len(),
            self.style.path.display()
        );
        Ok(())
    }
}

impl RenderSurface for PngRenderer {
    fn redraw(&mut self, series: &SeriesSet) -> Result<(), RenderError> {
        self.render(series)
    }
}
