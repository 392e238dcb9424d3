use anyhow::{Result, anyhow};
use egui::Color32;
use egui_plot::{Line, Plot, PlotPoints};

use crate::reading::{Channel, ReadingTable, RowPolicy};

/// One line chart of a channel against time.
struct Panel {
    id: String,
    title: String,
    x: Channel,
    y: Channel,
    color: Color32,
    points: Vec<[f64; 2]>,
}

impl Panel {
    fn new(table: &ReadingTable, policy: RowPolicy, title: &str, y: Channel, color: Color32) -> Self {
        Panel {
            id: format!("{}_plot", y.as_ref()),
            title: title.to_string(),
            x: Channel::Time,
            y,
            color,
            points: table
                .series(Channel::Time, y, policy)
                .into_iter()
                .map(|(x, y)| [x, y])
                .collect(),
        }
    }

    fn show(&self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.heading(&self.title);
        });

        let points: PlotPoints = self.points.iter().copied().collect();
        Plot::new(&self.id)
            .x_axis_label(self.x.label())
            .y_axis_label(self.y.label())
            .show(ui, |plot_ui| {
                plot_ui.line(Line::new(self.y.as_ref(), points).color(self.color));
            });
    }
}

pub struct PlotApp {
    panels: [Panel; 2],
}

impl PlotApp {
    pub fn new(table: &ReadingTable, policy: RowPolicy) -> Self {
        PlotApp {
            panels: [
                Panel::new(
                    table,
                    policy,
                    "Gas Sensor Reading vs. Time",
                    Channel::Gas,
                    Color32::from_rgb(255, 0, 0),
                ),
                Panel::new(
                    table,
                    policy,
                    "Temperature vs. Time",
                    Channel::Temp,
                    Color32::from_rgb(0, 128, 128),
                ),
            ],
        }
    }
}

impl eframe::App for PlotApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.columns(2, |columns| {
                for (ui, panel) in columns.iter_mut().zip(&self.panels) {
                    panel.show(ui);
                }
            });
        });
    }
}

/// Opens the plot window and blocks until it is closed.
pub fn show(table: &ReadingTable, policy: RowPolicy) -> Result<()> {
    let app = PlotApp::new(table, policy);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1100.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native("TPG Readings", options, Box::new(|_| Ok(Box::new(app))))
        .map_err(|e| anyhow!("Plot window failed: {e}"))
}
