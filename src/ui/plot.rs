use std::ops::RangeInclusive;

use eframe::egui::{Color32, Ui};
use egui_plot::{GridMark, Legend, Line, MarkerShape, Plot, PlotPoint, PlotPoints, Points, Text};
use vibroscan::color::{named_colour, ColorMap};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Curve plot (central panel)
// ---------------------------------------------------------------------------

fn hint(ui: &mut Ui, text: &str) {
    ui.centered_and_justified(|ui: &mut Ui| {
        ui.heading(text);
    });
}

fn frequency_label(log_x: f64) -> String {
    let hz = 10f64.powf(log_x);
    if hz >= 1000.0 {
        format!("{:.3} kHz", hz / 1000.0)
    } else {
        format!("{hz:.1} Hz")
    }
}

/// Curves of the current view over a logarithmic frequency axis.
pub fn curve_plot(ui: &mut Ui, state: &AppState) {
    if state.planes.is_empty() {
        hint(ui, "Open scan files to begin  (File → Open scans…)");
        return;
    }
    let curves = &state.bundle.curves;
    let Some(first) = curves.first() else {
        hint(ui, "Nothing to show for this view");
        return;
    };

    let titles: Vec<&str> = curves.iter().map(|c| c.plot_title.as_str()).collect();
    let colours = ColorMap::new(&titles);

    Plot::new("curve_plot")
        .legend(Legend::default())
        .x_axis_label(first.x_label_with_unit())
        .y_axis_label(first.y_label_with_unit())
        .x_axis_formatter(|mark: GridMark, _range: &RangeInclusive<f64>| {
            let hz = 10f64.powf(mark.value);
            if hz >= 1000.0 {
                format!("{}k", hz / 1000.0)
            } else {
                format!("{hz:.0}")
            }
        })
        .label_formatter(|name, value| {
            let at = format!("{}, {:.2}", frequency_label(value.x), value.y);
            if name.is_empty() {
                at
            } else {
                format!("{name}\n{at}")
            }
        })
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for curve in curves {
                let points: PlotPoints = curve
                    .x
                    .iter()
                    .zip(curve.y.iter())
                    .filter(|&(&x, &y)| x > 0.0 && y.is_finite())
                    .map(|(&x, &y)| [x.log10(), y])
                    .collect();
                let [r, g, b] = colours.color_for(&curve.plot_title);

                plot_ui.line(
                    Line::new(points)
                        .name(&curve.plot_title)
                        .color(Color32::from_rgb(r, g, b))
                        .width(1.5),
                );
            }
        });
}

// ---------------------------------------------------------------------------
// Point layout
// ---------------------------------------------------------------------------

/// Scan point positions: valid points coloured by band, anomalous as crosses.
pub fn layout_plot(ui: &mut Ui, state: &AppState) {
    let Some(plane) = state.plane() else {
        hint(ui, "Open scan files to begin  (File → Open scans…)");
        return;
    };
    if plane.coordinates().is_empty() {
        hint(ui, "This scan file carries no point coordinates");
        return;
    }

    let (valid, anomalous) = plane.coordinates_partition();
    let band_of = |n: u32| plane.bands().iter().position(|b| b.contains(&n));

    Plot::new("layout_plot")
        .legend(Legend::default())
        .data_aspect(1.0)
        .x_axis_label("X")
        .y_axis_label("Y")
        .show(ui, |plot_ui| {
            let unassigned: PlotPoints = valid
                .iter()
                .filter(|(n, _)| band_of(*n).is_none())
                .map(|(_, c)| [c[0], c[1]])
                .collect();
            plot_ui.points(
                Points::new(unassigned)
                    .name("Valid")
                    .radius(4.0)
                    .filled(true)
                    .color(Color32::GRAY),
            );

            for (i, band) in plane.bands().iter().enumerate() {
                let colour = plane.band_colour(i);
                let [r, g, b] = named_colour(colour).unwrap_or([128, 128, 128]);
                let members: PlotPoints = valid
                    .iter()
                    .filter(|(n, _)| band.contains(n))
                    .map(|(_, c)| [c[0], c[1]])
                    .collect();
                plot_ui.points(
                    Points::new(members)
                        .name(format!("Band {}", i + 1))
                        .radius(5.0)
                        .filled(true)
                        .color(Color32::from_rgb(r, g, b)),
                );
            }

            let crosses: PlotPoints = anomalous.iter().map(|(_, c)| [c[0], c[1]]).collect();
            plot_ui.points(
                Points::new(crosses)
                    .name("Anomalous")
                    .shape(MarkerShape::Cross)
                    .radius(6.0)
                    .color(Color32::RED),
            );

            for (n, c) in valid.iter().chain(anomalous.iter()) {
                plot_ui.text(Text::new(PlotPoint::new(c[0], c[1]), format!("  {n}")));
            }
        });
}
