//! Framebuffer writer using embedded-graphics
//!
//! The bootloader leaves the machine in a graphics mode, so the live text
//! page is not shown by the hardware. This renders it: every timer tick the
//! page is compared against what was last drawn and changed cells are
//! repainted with a monospace font, plus an underline cursor.

use crate::arch::Machine;
use crate::config::VIDEO_MEMORY;
use crate::sync::IrqMutex;
use crate::terminal::screen::{COLUMNS, PAGE_BYTES, ROWS};
use bootloader_api::info::{FrameBuffer, PixelFormat};
use embedded_graphics::{
    mono_font::{ascii::FONT_8X13, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
    Drawable,
};
use x86_64::PhysAddr;

const CELL_WIDTH: i32 = 8;
const CELL_HEIGHT: i32 = 16;

/// The 16 text-mode colours.
const PALETTE: [Rgb888; 16] = [
    Rgb888::new(0x00, 0x00, 0x00),
    Rgb888::new(0x00, 0x00, 0xAA),
    Rgb888::new(0x00, 0xAA, 0x00),
    Rgb888::new(0x00, 0xAA, 0xAA),
    Rgb888::new(0xAA, 0x00, 0x00),
    Rgb888::new(0xAA, 0x00, 0xAA),
    Rgb888::new(0xAA, 0x55, 0x00),
    Rgb888::new(0xAA, 0xAA, 0xAA),
    Rgb888::new(0x55, 0x55, 0x55),
    Rgb888::new(0x55, 0x55, 0xFF),
    Rgb888::new(0x55, 0xFF, 0x55),
    Rgb888::new(0x55, 0xFF, 0xFF),
    Rgb888::new(0xFF, 0x55, 0x55),
    Rgb888::new(0xFF, 0x55, 0xFF),
    Rgb888::new(0xFF, 0xFF, 0x55),
    Rgb888::new(0xFF, 0xFF, 0xFF),
];

pub struct FramebufferWriter {
    framebuffer: &'static mut [u8],
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub bytes_per_pixel: usize,
    pixel_format: PixelFormat,
}

impl FramebufferWriter {
    pub fn new(fb: &'static mut FrameBuffer) -> Self {
        let info = fb.info();

        Self {
            framebuffer: fb.buffer_mut(),
            width: info.width,
            height: info.height,
            stride: info.stride,
            bytes_per_pixel: info.bytes_per_pixel,
            pixel_format: info.pixel_format,
        }
    }

    /// Fill entire screen with a color
    pub fn clear(&mut self, color: Rgb888) {
        let rect = Rectangle::new(Point::zero(), Size::new(self.width as u32, self.height as u32));
        rect.into_styled(PrimitiveStyle::with_fill(color))
            .draw(self)
            .ok();
    }

    /// Paints one text cell: background, glyph, and the cursor bar if set.
    fn draw_cell(&mut self, row: usize, col: usize, ch: u8, attribute: u8, cursor: bool) {
        let fg = PALETTE[(attribute & 0x0F) as usize];
        let bg = PALETTE[((attribute >> 4) & 0x07) as usize];
        let origin = Point::new(col as i32 * CELL_WIDTH, row as i32 * CELL_HEIGHT);

        Rectangle::new(origin, Size::new(CELL_WIDTH as u32, CELL_HEIGHT as u32))
            .into_styled(PrimitiveStyle::with_fill(bg))
            .draw(self)
            .ok();

        let glyph = if ch.is_ascii_graphic() { ch } else { b' ' };
        let mut buf = [0u8; 4];
        let s = (glyph as char).encode_utf8(&mut buf);
        let style = MonoTextStyle::new(&FONT_8X13, fg);
        Text::with_baseline(s, origin, style, Baseline::Top)
            .draw(self)
            .ok();

        if cursor {
            Rectangle::new(origin + Point::new(0, CELL_HEIGHT - 2), Size::new(CELL_WIDTH as u32, 2))
                .into_styled(PrimitiveStyle::with_fill(fg))
                .draw(self)
                .ok();
        }
    }
}

// Implement DrawTarget for embedded-graphics
impl DrawTarget for FramebufferWriter {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(Point { x, y }, color) in pixels {
            if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
                continue;
            }

            let offset = (y as usize * self.stride + x as usize) * self.bytes_per_pixel;
            if offset + self.bytes_per_pixel > self.framebuffer.len() {
                continue;
            }
            let pixel = &mut self.framebuffer[offset..offset + self.bytes_per_pixel];
            match self.pixel_format {
                PixelFormat::Rgb => pixel[..3].copy_from_slice(&[color.r(), color.g(), color.b()]),
                PixelFormat::Bgr => pixel[..3].copy_from_slice(&[color.b(), color.g(), color.r()]),
                _ => pixel[0] = ((color.r() as u16 + color.g() as u16 + color.b() as u16) / 3) as u8,
            }
        }
        Ok(())
    }
}

impl OriginDimensions for FramebufferWriter {
    fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }
}

struct TextDisplay {
    writer: FramebufferWriter,
    shown: [u8; PAGE_BYTES],
    /// Read buffer for the live page.
    live: [u8; PAGE_BYTES],
    cursor: (usize, usize),
}

static DISPLAY: IrqMutex<Option<TextDisplay>> = IrqMutex::new(None);

pub fn init(fb: &'static mut FrameBuffer) {
    let mut writer = FramebufferWriter::new(fb);
    writer.clear(PALETTE[0]);
    *DISPLAY.lock() = Some(TextDisplay {
        writer,
        // Blank cells never match, so the first refresh paints everything.
        shown: [0; PAGE_BYTES],
        live: [0; PAGE_BYTES],
        cursor: (0, 0),
    });
}

/// Repaints the cells of the live page that changed since the last call.
pub fn refresh(machine: &dyn Machine, cursor: (usize, usize)) {
    let mut display = DISPLAY.lock();
    let Some(TextDisplay { writer, shown, live, cursor: old_cursor }) = display.as_mut() else {
        return;
    };
    machine.read_phys(PhysAddr::new(VIDEO_MEMORY), live);

    for row in 0..ROWS {
        for col in 0..COLUMNS {
            let at = (row * COLUMNS + col) * 2;
            let moved = (row, col) == *old_cursor || (row, col) == cursor;
            if !moved && live[at..at + 2] == shown[at..at + 2] {
                continue;
            }
            writer.draw_cell(row, col, live[at], live[at + 1], (row, col) == cursor);
        }
    }
    shown.copy_from_slice(&live[..]);
    *old_cursor = cursor;
}
