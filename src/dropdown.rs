//! Header dropdown state: open/closed, click-outside dismissal, and the text
//! the panel shows.

use serde::{Deserialize, Serialize};

use crate::notification::NotificationList;

pub const DROPDOWN_TITLE: &str = "Notifications";
pub const EMPTY_MESSAGE: &str = "No new notifications.";

/// Pointer position in the same coordinate space as [`Bounds`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rectangle occupied by the open dropdown panel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Edges are inside
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dropdown {
    open: bool,
    bounds: Option<Bounds>,
}

impl Dropdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Flip visibility; returns the new state
    pub fn toggle(&mut self) -> bool {
        self.open = !self.open;
        self.open
    }

    pub fn close(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }

    /// Record where the panel was laid out
    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = Some(bounds);
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Close when a pointer-down lands outside the open panel
    ///
    /// Returns `true` if this call closed the dropdown. Without known bounds
    /// nothing counts as outside.
    pub fn handle_pointer_down(&mut self, point: Point) -> bool {
        match self.bounds {
            Some(bounds) if self.open && !bounds.contains(point) => self.close(),
            _ => false,
        }
    }

    /// Lines of the dropdown panel for the given list
    pub fn render(&self, list: &NotificationList) -> Vec<String> {
        let mut lines = vec![DROPDOWN_TITLE.to_string()];
        if list.is_empty() {
            lines.push(EMPTY_MESSAGE.to_string());
        } else {
            lines.extend(list.iter().map(|item| item.message.clone()));
        }
        lines
    }
}
