//! 80x25 text page rendering.
//!
//! A text page is 2000 cells of two bytes each: the character, then its
//! attribute. Pages live in physical memory and are written through the
//! machine, so the same code renders to the live page and to a hidden
//! terminal's private page.

use crate::arch::Machine;
use x86_64::PhysAddr;

pub const COLUMNS: usize = 80;
pub const ROWS: usize = 25;
pub const ATTRIBUTE: u8 = 0x07;
pub const PAGE_BYTES: usize = COLUMNS * ROWS * 2;

/// Cells a tab occupies.
pub const TAB_WIDTH: usize = 4;

const ROW_BYTES: usize = COLUMNS * 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Screen {
    row: usize,
    col: usize,
}

impl Screen {
    pub const fn new() -> Self {
        Self { row: 0, col: 0 }
    }

    /// `(row, column)` of the next cell to be written.
    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    /// Blanks the whole page and homes the cursor.
    pub fn clear(&mut self, machine: &mut dyn Machine, page: PhysAddr) {
        for row in 0..ROWS {
            blank_row(machine, page, row);
        }
        self.row = 0;
        self.col = 0;
    }

    pub fn write(&mut self, machine: &mut dyn Machine, page: PhysAddr, bytes: &[u8]) {
        for &byte in bytes {
            self.put_byte(machine, page, byte);
        }
    }

    pub fn put_byte(&mut self, machine: &mut dyn Machine, page: PhysAddr, byte: u8) {
        match byte {
            b'\n' | b'\r' => self.new_line(machine, page),
            b'\x08' => self.erase(machine, page),
            b'\t' => {
                for _ in 0..TAB_WIDTH {
                    self.put_byte(machine, page, b' ');
                }
            }
            _ => {
                self.set_cell(machine, page, self.row, self.col, byte);
                self.col += 1;
                if self.col == COLUMNS {
                    self.new_line(machine, page);
                }
            }
        }
    }

    /// Steps back one cell, across a line break if needed, and blanks it.
    fn erase(&mut self, machine: &mut dyn Machine, page: PhysAddr) {
        if self.col > 0 {
            self.col -= 1;
        } else if self.row > 0 {
            self.row -= 1;
            self.col = COLUMNS - 1;
        } else {
            return;
        }
        self.set_cell(machine, page, self.row, self.col, b' ');
    }

    fn new_line(&mut self, machine: &mut dyn Machine, page: PhysAddr) {
        self.col = 0;
        if self.row + 1 < ROWS {
            self.row += 1;
        } else {
            scroll(machine, page);
        }
    }

    fn set_cell(&self, machine: &mut dyn Machine, page: PhysAddr, row: usize, col: usize, byte: u8) {
        let offset = (row * COLUMNS + col) * 2;
        machine.write_phys(page + offset as u64, &[byte, ATTRIBUTE]);
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self::new()
    }
}

fn row_addr(page: PhysAddr, row: usize) -> PhysAddr {
    page + (row * ROW_BYTES) as u64
}

fn blank_row(machine: &mut dyn Machine, page: PhysAddr, row: usize) {
    let mut blank = [0u8; ROW_BYTES];
    for cell in blank.chunks_exact_mut(2) {
        cell.copy_from_slice(&[b' ', ATTRIBUTE]);
    }
    machine.write_phys(row_addr(page, row), &blank);
}

/// Moves every row up by one and blanks the bottom row.
fn scroll(machine: &mut dyn Machine, page: PhysAddr) {
    let mut line = [0u8; ROW_BYTES];
    for row in 1..ROWS {
        machine.read_phys(row_addr(page, row), &mut line);
        machine.write_phys(row_addr(page, row - 1), &line);
    }
    blank_row(machine, page, ROWS - 1);
}
