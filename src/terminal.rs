// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based camera viewer
//!
//! Renders the camera preview to the terminal using Unicode half-block
//! characters for improved vertical resolution. Shake capture runs in the
//! background; the status bar shows what the last capture did.

use crate::backends::motion::ScriptedMotionSource;
use crate::config::Config;
use crate::constants::timing;
use crate::context::{CameraContext, CaptureOrigin, CaptureStatus, ContextParts};
use crate::orientation::{DeviceOrientation, OrientationObserver};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use image::RgbImage;
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, stdout};
use std::path::Path;
use tracing::{error, info};

/// Run the terminal camera viewer
///
/// `motion` replays a JSON motion script in place of the accelerometer, which
/// is the only way to get shake capture with the virtual camera.
pub fn run(
    config: &Config,
    use_virtual: bool,
    motion: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let script = motion.map(ScriptedMotionSource::from_json_file).transpose()?;

    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();

    let observer = OrientationObserver::new(DeviceOrientation::Portrait);
    let parts = match (use_virtual, script) {
        (true, script) => ContextParts::simulated(config, script),
        (false, Some(script)) => ContextParts::hardware(config).with_motion(script),
        (false, None) => ContextParts::hardware(config),
    }
    .with_orientation(observer.clone());

    // A failed start leaves the context disabled; the viewer still shows why
    let mut context = CameraContext::new(parts, config);
    if let Err(e) = context.start() {
        error!(error = %e, "Camera unavailable");
    }

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = run_app(&mut terminal, &mut context, &observer);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    context.close();
    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    context: &mut CameraContext,
    observer: &OrientationObserver,
) -> Result<(), Box<dyn std::error::Error>> {
    let status = context.status();
    let mut events = context.take_events();

    let mut frame_widget = FrameWidget::new();
    let mut show_help = false;
    let mut notice: Option<String> = None;

    loop {
        if let Some(frame) = context.session().latest_preview() {
            frame_widget.update_frame(frame);
        }

        // Drain completions so the channel never fills up
        if let Some(rx) = events.as_mut() {
            while let Ok(event) = rx.try_recv() {
                info!(id = %event.id, origin = ?event.origin, "Capture finished");
                notice = None;
            }
        }

        let message = if show_help {
            build_help_message()
        } else {
            build_status_message(
                &status.borrow(),
                context.shake_active(),
                observer.current(),
                notice.as_deref(),
            )
        };

        // Draw
        terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom line for status
            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };

            f.render_widget(&frame_widget, camera_area);

            // Render status bar
            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };

            let bar = StatusBar { message: &message };
            f.render_widget(bar, status_area);
        })?;

        // Handle input with timeout for frame updates
        if event::poll(timing::UI_POLL_INTERVAL)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            // Ctrl+C to quit
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                break;
            }

            match key.code {
                KeyCode::Char('p') => {
                    show_help = false;
                    notice = None;
                    context.capture(CaptureOrigin::Manual);
                }
                KeyCode::Char('s') => {
                    show_help = false;
                    notice = Some(match context.share_last() {
                        Ok(path) => format!("Shared {}", path.display()),
                        Err(e) => {
                            error!(error = %e, "Share failed");
                            e.to_string()
                        }
                    });
                }
                KeyCode::Char('o') => {
                    observer.publish(observer.current().rotated_clockwise());
                }
                KeyCode::Char('h') => show_help = !show_help,
                KeyCode::Char('q') => break,
                _ => {}
            }
        }
    }

    Ok(())
}

fn build_status_message(
    status: &CaptureStatus,
    shake_active: bool,
    orientation: DeviceOrientation,
    notice: Option<&str>,
) -> String {
    let state = notice.map(str::to_string).unwrap_or_else(|| status.to_string());
    let shake = if shake_active { "shake on" } else { "shake off" };
    format!(
        "{} | {} | {} | 'p' picture | 's' share | 'h' help | 'q' quit",
        state,
        shake,
        orientation.display_name()
    )
}

fn build_help_message() -> String {
    "p: Take picture | s: Share last | o: Rotate | h: Toggle help | q/Ctrl+C: Quit".to_string()
}

/// Widget that renders a preview frame using half-block characters
struct FrameWidget {
    frame: Option<RgbImage>,
}

impl FrameWidget {
    fn new() -> Self {
        Self { frame: None }
    }

    fn update_frame(&mut self, frame: RgbImage) {
        self.frame = Some(frame);
    }
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame.as_ref().filter(|f| f.width() > 0 && f.height() > 0) else {
            // No frame yet - show placeholder
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };

        let (display_width, display_height) = fit_to_area(frame.width(), frame.height(), area);
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        // Scale factors
        let x_scale = frame.width() as f64 / display_width as f64;
        let y_scale = frame.height() as f64 / (display_height * 2) as f64;

        // Each terminal cell represents 2 vertical pixels:
        // upper half (▀) colored with fg, lower half with bg
        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let top_color = sample_pixel(frame, src_x, src_y_top);
                let bottom_color = sample_pixel(frame, src_x, src_y_bottom);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }
    }
}

/// Largest cell size that keeps the frame's aspect ratio inside `area`
fn fit_to_area(width: u32, height: u32, area: Rect) -> (u16, u16) {
    let frame_aspect = width as f64 / height as f64;
    let term_width = area.width as f64;
    let term_height = (area.height * 2) as f64; // *2 because half-blocks

    if term_width / term_height > frame_aspect {
        // Terminal is wider - fit to height
        let h = term_height;
        let w = h * frame_aspect;
        (w as u16, (h / 2.0) as u16)
    } else {
        // Terminal is taller - fit to width
        let w = term_width;
        let h = w / frame_aspect;
        (w as u16, (h / 2.0) as u16)
    }
}

fn sample_pixel(frame: &RgbImage, x: u32, y: u32) -> Color {
    let x = x.min(frame.width() - 1);
    let y = y.min(frame.height() - 1);
    let [r, g, b] = frame.get_pixel(x, y).0;
    Color::Rgb(r, g, b)
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        // Truncate on a char boundary
        let text: String = self.message.chars().take(area.width as usize).collect();

        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::path::PathBuf;

    #[test]
    fn test_fit_keeps_aspect_ratio() {
        let area = Rect::new(0, 0, 80, 24);
        // 4:3 frame in 80x48 half-block pixels is height bound
        assert_eq!(fit_to_area(640, 480, area), (64, 24));
    }

    #[test]
    fn test_frame_widget_paints_half_blocks() {
        let mut widget = FrameWidget::new();
        widget.update_frame(RgbImage::from_pixel(4, 4, Rgb([10, 20, 30])));

        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);
        (&widget).render(area, &mut buf);

        let cell = buf.cell((0, 0)).unwrap();
        assert_eq!(cell.symbol(), "▀");
        assert_eq!(cell.fg, Color::Rgb(10, 20, 30));
    }

    #[test]
    fn test_status_message_shows_capture_state() {
        let status = CaptureStatus::Saved(PathBuf::from("/tmp/IMG_1.jpg"));
        let msg = build_status_message(&status, true, DeviceOrientation::Portrait, None);
        assert!(msg.starts_with("Saved /tmp/IMG_1.jpg | shake on | Portrait"));

        let msg = build_status_message(&status, false, DeviceOrientation::Portrait, Some("Shared"));
        assert!(msg.starts_with("Shared | shake off"));
    }

    #[test]
    fn test_status_bar_truncates() {
        let area = Rect::new(0, 0, 5, 1);
        let mut buf = Buffer::empty(area);
        StatusBar {
            message: "abcdefgh",
        }
        .render(area, &mut buf);
        assert_eq!(buf.cell((4, 0)).unwrap().symbol(), "e");
    }
}
