//! Character display backends.
//!
//! Two interchangeable panels: a 20x4 LCD with center-aligned word wrap and
//! an 8-row OLED with plain sequential lines. Both keep their row buffer in
//! memory and render changed frames to the log under `target: "display"`,
//! which is how the host build "shows" the panel.

use log::info;

use super::Display;

const LCD_COLS: usize = 20;
const LCD_ROWS: usize = 4;

const OLED_COLS: usize = 21;
const OLED_ROWS: usize = 8;

const MENU_TOP: &str = "Press BTN to add new IR code.";
const MENU_BOTTOM: &str = "READY FOR CONTROL";

/// 20x4 character LCD.
///
/// Text is wrapped to the panel width with a preference for breaking at the
/// last space, and each fragment is centered on its row. Long messages spill
/// onto following rows until the panel runs out.
pub struct LcdPanel {
    rows: [String; LCD_ROWS],
    backlight: bool,
}

impl Default for LcdPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl LcdPanel {
    pub fn new() -> Self {
        LcdPanel {
            rows: Default::default(),
            backlight: true,
        }
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn backlight(&self) -> bool {
        self.backlight
    }

    fn render(&self) {
        for (i, row) in self.rows.iter().enumerate() {
            if !row.trim().is_empty() {
                info!(target: "display", "lcd[{}] {}", i, row.trim_end());
            }
        }
    }

    fn wipe_from(&mut self, row: usize) {
        for r in &mut self.rows[row..] {
            r.clear();
        }
    }

    /// Split `text` into panel-width fragments, breaking at the last space
    /// when one exists inside the window.
    fn wrap(text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut fragments = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let window = (chars.len() - start).min(LCD_COLS);
            let mut take = window;
            if start + window < chars.len() {
                let slice = &chars[start..start + window];
                if let Some(pos) = slice.iter().rposition(|c| *c == ' ') {
                    if pos > 0 {
                        take = pos + 1;
                    }
                }
            }
            let fragment: String = chars[start..start + take].iter().collect();
            fragments.push(fragment.trim_end().to_string());
            start += take;
        }
        fragments
    }

    fn center(fragment: &str) -> String {
        let len = fragment.chars().count().min(LCD_COLS);
        let pad = (LCD_COLS - len) / 2;
        format!("{}{}", " ".repeat(pad), fragment)
    }
}

impl Display for LcdPanel {
    fn info(&mut self, row: usize, text: &str, clear_all: bool) {
        if row >= LCD_ROWS {
            return;
        }
        if clear_all {
            self.wipe_from(0);
        } else {
            self.wipe_from(row);
        }
        let mut current = row;
        for fragment in Self::wrap(text) {
            if current >= LCD_ROWS {
                break;
            }
            self.rows[current] = Self::center(&fragment);
            current += 1;
        }
        self.render();
    }

    fn clear(&mut self) {
        self.wipe_from(0);
    }

    fn main_menu(&mut self) {
        self.info(0, MENU_TOP, true);
        self.info(LCD_ROWS - 1, MENU_BOTTOM, false);
    }

    fn set_backlight(&mut self, on: bool) {
        if self.backlight != on {
            self.backlight = on;
            info!(target: "display", "lcd backlight {}", if on { "on" } else { "off" });
        }
    }
}

/// 128x64 OLED, driven as 8 rows of small text. No backlight control; lines
/// are written as-is, truncated at the panel width.
pub struct OledPanel {
    rows: [String; OLED_ROWS],
}

impl Default for OledPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl OledPanel {
    pub fn new() -> Self {
        OledPanel {
            rows: Default::default(),
        }
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }
}

impl Display for OledPanel {
    fn info(&mut self, row: usize, text: &str, clear_all: bool) {
        if row >= OLED_ROWS {
            return;
        }
        if clear_all {
            self.clear();
        }
        let mut current = row;
        for line in text.lines() {
            if current >= OLED_ROWS {
                break;
            }
            self.rows[current] = line.chars().take(OLED_COLS).collect();
            current += 1;
        }
        for (i, line) in self.rows.iter().enumerate() {
            if !line.is_empty() {
                info!(target: "display", "oled[{}] {}", i, line);
            }
        }
    }

    fn clear(&mut self) {
        for r in &mut self.rows {
            r.clear();
        }
    }

    fn main_menu(&mut self) {
        self.clear();
        self.rows[0] = "Press BTN to add".into();
        self.rows[1] = "new IR code.".into();
        self.rows[OLED_ROWS - 1] = "WAITING FOR CONTROL".into();
    }

    fn set_backlight(&mut self, _on: bool) {
        // OLED has no backlight; idle dimming is a no-op here.
    }
}

/// Runtime-selected panel backend, so the deployment config picks the panel
/// without making the whole appliance generic over it at the CLI layer.
pub enum PanelBackend {
    Lcd(LcdPanel),
    Oled(OledPanel),
}

impl Display for PanelBackend {
    fn info(&mut self, row: usize, text: &str, clear_all: bool) {
        match self {
            PanelBackend::Lcd(p) => p.info(row, text, clear_all),
            PanelBackend::Oled(p) => p.info(row, text, clear_all),
        }
    }

    fn clear(&mut self) {
        match self {
            PanelBackend::Lcd(p) => p.clear(),
            PanelBackend::Oled(p) => p.clear(),
        }
    }

    fn main_menu(&mut self) {
        match self {
            PanelBackend::Lcd(p) => p.main_menu(),
            PanelBackend::Oled(p) => p.main_menu(),
        }
    }

    fn set_backlight(&mut self, on: bool) {
        match self {
            PanelBackend::Lcd(p) => p.set_backlight(on),
            PanelBackend::Oled(p) => p.set_backlight(on),
        }
    }
}
