// FitNode: Status page rendering
//
// The page is drawn with embedded-graphics into any `BinaryColor` target.
// On the device that target is `FrameBuffer`, whose byte layout matches the
// SSD1306 page-addressing mode, so the OLED driver can push it verbatim.

use core::convert::Infallible;

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};

use crate::config::*;
use crate::events::{LinkStatus, TelemetryRecord};

const LINE_HEIGHT: i32 = 12;
#[cfg(test)]
const PAGE_COUNT: usize = SCREEN_HEIGHT as usize / 8;

/// 128x64 monochrome framebuffer, one bit per pixel, eight vertical pixels
/// per byte.
pub struct FrameBuffer {
    buf: [u8; DISPLAY_BUFFER_SIZE],
}

impl FrameBuffer {
    pub const fn new() -> Self {
        Self { buf: [0; DISPLAY_BUFFER_SIZE] }
    }

    /// One 128-byte page (rows `8*n .. 8*n+8`).
    #[cfg(test)]
    fn page(&self, n: usize) -> &[u8] {
        let width = SCREEN_WIDTH as usize;
        let n = n.min(PAGE_COUNT - 1);
        &self.buf[n * width..(n + 1) * width]
    }

    pub fn pages(&self) -> impl Iterator<Item = &[u8]> {
        self.buf.chunks(SCREEN_WIDTH as usize)
    }

    #[cfg(test)]
    fn is_set(&self, x: u32, y: u32) -> bool {
        if x >= SCREEN_WIDTH || y >= SCREEN_HEIGHT {
            return false;
        }
        let idx = x as usize + (y as usize / 8) * SCREEN_WIDTH as usize;
        self.buf[idx] & (1 << (y % 8)) != 0
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(SCREEN_WIDTH, SCREEN_HEIGHT)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) else {
                continue;
            };
            if x >= SCREEN_WIDTH || y >= SCREEN_HEIGHT {
                continue;
            }
            let idx = x as usize + (y as usize / 8) * SCREEN_WIDTH as usize;
            let mask = 1u8 << (y % 8);
            match color {
                BinaryColor::On => self.buf[idx] |= mask,
                BinaryColor::Off => self.buf[idx] &= !mask,
            }
        }
        Ok(())
    }
}

/// Text lines shown on the status page.
pub fn status_lines(snapshot: &TelemetryRecord) -> [String; 4] {
    let link = match snapshot.link_status {
        LinkStatus::Ok => "ok",
        LinkStatus::Lost => "lost",
    };
    let hr = if snapshot.heart_rate > 0 {
        format!("HR {:>3} bpm{}", snapshot.heart_rate, if snapshot.beat_detected { " *" } else { "" })
    } else {
        "HR  -- bpm".to_string()
    };
    [
        format!("P{:>6.1} R{:>6.1}", snapshot.pitch, snapshot.roll),
        format!("Y{:>6.1}", snapshot.yaw),
        hr,
        format!("LINK {} {:>6.0}s", link, snapshot.timestamp),
    ]
}

/// Clear `target` and draw the status page.
pub fn render_status<D>(target: &mut D, snapshot: &TelemetryRecord) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    target.clear(BinaryColor::Off)?;
    let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);

    for (row, line) in status_lines(snapshot).iter().enumerate() {
        Text::with_baseline(line, Point::new(0, row as i32 * LINE_HEIGHT), style, Baseline::Top)
            .draw(target)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::mock_display::MockDisplay;

    fn snapshot() -> TelemetryRecord {
        TelemetryRecord {
            pitch: -12.3,
            roll: 4.0,
            yaw: 179.9,
            heart_rate: 72,
            beat_detected: true,
            timestamp: 42.0,
            link_status: LinkStatus::Ok,
            ..Default::default()
        }
    }

    #[test]
    fn test_status_lines() {
        let lines = status_lines(&snapshot());
        assert_eq!(lines[0], "P -12.3 R   4.0");
        assert_eq!(lines[1], "Y 179.9");
        assert_eq!(lines[2], "HR  72 bpm *");
        assert!(lines[3].starts_with("LINK ok"));
    }

    #[test]
    fn test_status_lines_without_pulse() {
        let record = TelemetryRecord::default();
        let lines = status_lines(&record);
        assert_eq!(lines[2], "HR  -- bpm");
        assert!(lines[3].starts_with("LINK lost"));
    }

    #[test]
    fn test_render_into_framebuffer() {
        let mut fb = FrameBuffer::new();
        render_status(&mut fb, &snapshot()).unwrap();
        assert!(fb.pages().any(|page| page.iter().any(|&b| b != 0)));
        // Nothing below the fourth text line
        assert!(fb.page(PAGE_COUNT - 1).iter().all(|&b| b == 0));
    }

    #[test]
    fn test_render_clears_previous_frame() {
        let mut fb = FrameBuffer::new();
        Pixel(Point::new(127, 63), BinaryColor::On).draw(&mut fb).unwrap();
        assert!(fb.is_set(127, 63));
        render_status(&mut fb, &snapshot()).unwrap();
        assert!(!fb.is_set(127, 63));
    }

    #[test]
    fn test_framebuffer_page_layout() {
        let mut fb = FrameBuffer::new();
        Pixel(Point::new(3, 10), BinaryColor::On).draw(&mut fb).unwrap();
        // Row 10 lives in page 1, bit 2
        assert_eq!(fb.page(1)[3], 0b0000_0100);
        assert!(fb.is_set(3, 10));

        // Off-screen pixels are ignored
        Pixel(Point::new(-1, 0), BinaryColor::On).draw(&mut fb).unwrap();
        Pixel(Point::new(200, 70), BinaryColor::On).draw(&mut fb).unwrap();
        assert_eq!(fb.pages().flatten().filter(|&&b| b != 0).count(), 1);
    }

    #[test]
    fn test_render_on_mock_display() {
        let mut display = MockDisplay::<BinaryColor>::new();
        display.set_allow_out_of_bounds_drawing(true);
        display.set_allow_overdraw(true);
        render_status(&mut display, &snapshot()).unwrap();

        let lit = (0..64)
            .flat_map(|y| (0..64).map(move |x| Point::new(x, y)))
            .filter(|&p| display.get_pixel(p) == Some(BinaryColor::On))
            .count();
        assert!(lit > 0);
    }
}
