use std::io::Cursor;
use std::ops::Range;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::coord::Shift;
use plotters::prelude::*;
use crate::drivers::error::SinkError;
use crate::drivers::RunResult;
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub foreground: RGBColor,
    pub raw_color: RGBColor,
    pub filtered_color: RGBColor,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1400,
            height: 900,
            background: WHITE,
            foreground: BLACK,
            raw_color: RGBColor(120, 160, 230),
            filtered_color: RED,
        }
    }
}
/// Axis bounds over the finite values only, padded when the data is flat.
fn finite_bounds(values: impl Iterator<Item = f64>) -> Option<Range<f64>> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return None;
    }
    let pad = if (hi - lo).abs() < f64::EPSILON {
        lo.abs().max(1e-15) * 0.1
    } else {
        (hi - lo) * 0.05
    };
    Some((lo - pad)..(hi + pad))
}
struct Trace<'a> {
    label: &'a str,
    values: &'a [f64],
    color: RGBColor,
}
fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    y_label: &str,
    time: &[f64],
    traces: &[Trace<'_>],
    style: &PlotStyle,
) -> Result<(), SinkError>
where
    DB::ErrorType: 'static,
{
    let x_range = finite_bounds(time.iter().copied()).unwrap_or(0.0..1.0);
    let y_range = finite_bounds(traces.iter().flat_map(|t| t.values.iter().copied()))
        .unwrap_or(-1.0..1.0);
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption(title, ("sans-serif", 18).into_font().color(&style.foreground))
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x_range, y_range)?;
    chart
        .configure_mesh()
        .x_desc("Temps (s)")
        .y_desc(y_label)
        .y_label_formatter(&|v| format!("{v:.2e}"))
        .light_line_style(&style.foreground.mix(0.08))
        .draw()?;
    for trace in traces {
        let color = trace.color;
        let points = time
            .iter()
            .copied()
            .zip(trace.values.iter().copied())
            .filter(|(t, v)| t.is_finite() && v.is_finite());
        chart
            .draw_series(LineSeries::new(points, &color))?
            .label(trace.label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
    }
    if traces.len() > 1 {
        chart
            .configure_series_labels()
            .border_style(&style.foreground.mix(0.3))
            .background_style(&style.background)
            .draw()?;
    }
    Ok(())
}
/// Renders the diagnostic figure: current, resistance and resistivity against time,
/// plus a short run summary in the last cell.
pub fn render_run_png(result: &RunResult, style: &PlotStyle) -> Result<Vec<u8>, SinkError> {
    if result.is_empty() {
        return Err(SinkError::Plot("run has no samples to plot".into()));
    }
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let panels = root.split_evenly((2, 2));
        draw_panel(
            &panels[0],
            "Courant de fuite",
            "Courant (A)",
            &result.elapsed_s,
            &[
                Trace {
                    label: "brut",
                    values: &result.raw_current,
                    color: style.raw_color,
                },
                Trace {
                    label: "filtré",
                    values: &result.filtered_current,
                    color: style.filtered_color,
                },
            ],
            style,
        )?;
        draw_panel(
            &panels[1],
            "Résistance",
            "Résistance (Ohm)",
            &result.elapsed_s,
            &[Trace {
                label: "résistance",
                values: &result.resistance,
                color: style.foreground,
            }],
            style,
        )?;
        draw_panel(
            &panels[2],
            "Résistivité",
            "Résistivité (Ohm.m)",
            &result.elapsed_s,
            &[Trace {
                label: "résistivité",
                values: &result.resistivity,
                color: style.foreground,
            }],
            style,
        )?;
        let summary = [
            format!("issue : {}", result.outcome),
            format!("points : {}", result.len()),
            format!(
                "durée : {:.1} s",
                result.elapsed_s.last().copied().unwrap_or(0.0)
            ),
        ];
        let text_style = ("sans-serif", 20).into_font().color(&style.foreground);
        for (row, line) in summary.iter().enumerate() {
            panels[3].draw(&Text::new(
                line.as_str(),
                (40, 40 + 32 * row as i32),
                text_style.clone(),
            ))?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, SinkError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| SinkError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
