//! Screen layout templates for multi-zone signage. A template divides
//! the screen into rectangular zones, each with its own independent
//! content playlist.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PlayerError, Result};

/// A rectangular region of the screen. Coordinates are percentages
/// (0-100) of the total screen area; conversion to pixels happens at the
/// backend boundary via [`Zone::pixel_rect`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub playlist_dir: PathBuf,
    #[serde(default)]
    pub z_index: u32,
}

impl Zone {
    /// True when the zone covers the whole screen from the origin.
    pub fn is_full_screen(&self) -> bool {
        self.x == 0 && self.y == 0 && self.width >= 100 && self.height >= 100
    }

    /// Convert the percent rectangle to pixels as (x, y, width, height).
    pub fn pixel_rect(&self, screen_w: u32, screen_h: u32) -> (u32, u32, u32, u32) {
        (
            self.x * screen_w / 100,
            self.y * screen_h / 100,
            self.width * screen_w / 100,
            self.height * screen_h / 100,
        )
    }
}

/// A named screen layout with one or more zones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub zones: Vec<Zone>,
}

impl Template {
    /// Read and validate a template definition from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let template: Template = serde_json::from_str(&data)?;
        template.validate()?;
        Ok(template)
    }

    /// Check that the template has at least one zone, unique ids, and
    /// that every zone stays within screen bounds.
    pub fn validate(&self) -> Result<()> {
        if self.zones.is_empty() {
            return Err(PlayerError::Template(format!(
                "template {:?} has no zones",
                self.name
            )));
        }

        let mut ids = std::collections::HashSet::new();
        for zone in &self.zones {
            if zone.id.is_empty() {
                return Err(PlayerError::Template("zone missing id".into()));
            }
            if !ids.insert(zone.id.as_str()) {
                return Err(PlayerError::Template(format!(
                    "duplicate zone id: {}",
                    zone.id
                )));
            }
            if zone.width == 0 || zone.height == 0 {
                return Err(PlayerError::Template(format!(
                    "zone {:?} has invalid dimensions: {}x{}",
                    zone.id, zone.width, zone.height
                )));
            }
            if zone.x + zone.width > 100 || zone.y + zone.height > 100 {
                return Err(PlayerError::Template(format!(
                    "zone {:?} exceeds screen bounds",
                    zone.id
                )));
            }
        }

        Ok(())
    }

    /// A single-zone template filling the entire screen. The default
    /// layout for simple deployments.
    pub fn fullscreen(playlist_dir: impl Into<PathBuf>) -> Self {
        Template {
            name: "fullscreen".into(),
            zones: vec![Zone {
                id: "main".into(),
                x: 0,
                y: 0,
                width: 100,
                height: 100,
                playlist_dir: playlist_dir.into(),
                z_index: 0,
            }],
        }
    }

    /// Two zones: a large main area and a horizontal footer strip.
    pub fn main_with_footer(main_dir: impl Into<PathBuf>, footer_dir: impl Into<PathBuf>) -> Self {
        Template {
            name: "main-with-footer".into(),
            zones: vec![
                Zone {
                    id: "main".into(),
                    x: 0,
                    y: 0,
                    width: 100,
                    height: 85,
                    playlist_dir: main_dir.into(),
                    z_index: 0,
                },
                Zone {
                    id: "footer".into(),
                    x: 0,
                    y: 85,
                    width: 100,
                    height: 15,
                    playlist_dir: footer_dir.into(),
                    z_index: 1,
                },
            ],
        }
    }

    /// Two zones: a main content area and a vertical sidebar on the right.
    pub fn main_with_sidebar(main_dir: impl Into<PathBuf>, side_dir: impl Into<PathBuf>) -> Self {
        Template {
            name: "main-with-sidebar".into(),
            zones: vec![
                Zone {
                    id: "main".into(),
                    x: 0,
                    y: 0,
                    width: 75,
                    height: 100,
                    playlist_dir: main_dir.into(),
                    z_index: 0,
                },
                Zone {
                    id: "sidebar".into(),
                    x: 75,
                    y: 0,
                    width: 25,
                    height: 100,
                    playlist_dir: side_dir.into(),
                    z_index: 1,
                },
            ],
        }
    }

    /// Three zones in an "L" layout: main content, sidebar, and footer.
    pub fn l_shape(
        main_dir: impl Into<PathBuf>,
        footer_dir: impl Into<PathBuf>,
        side_dir: impl Into<PathBuf>,
    ) -> Self {
        Template {
            name: "l-shape".into(),
            zones: vec![
                Zone {
                    id: "main".into(),
                    x: 0,
                    y: 0,
                    width: 75,
                    height: 85,
                    playlist_dir: main_dir.into(),
                    z_index: 0,
                },
                Zone {
                    id: "sidebar".into(),
                    x: 75,
                    y: 0,
                    width: 25,
                    height: 100,
                    playlist_dir: side_dir.into(),
                    z_index: 1,
                },
                Zone {
                    id: "footer".into(),
                    x: 0,
                    y: 85,
                    width: 75,
                    height: 15,
                    playlist_dir: footer_dir.into(),
                    z_index: 2,
                },
            ],
        }
    }
}
