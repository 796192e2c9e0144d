use serde::{Deserialize, Serialize};

use crate::PlayerId;

/// Avatar color, assigned by the server when a player joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for PlayerColor {
    fn default() -> Self {
        Self::PALETTE[0]
    }
}

impl PlayerColor {
    /// Colors handed out to joining players, in rotation.
    pub const PALETTE: &[PlayerColor] = &[
        PlayerColor {
            r: 255,
            g: 87,
            b: 87,
        }, // Red
        PlayerColor {
            r: 78,
            g: 205,
            b: 196,
        }, // Teal
        PlayerColor {
            r: 255,
            g: 195,
            b: 18,
        }, // Yellow
        PlayerColor {
            r: 130,
            g: 88,
            b: 255,
        }, // Purple
        PlayerColor {
            r: 46,
            g: 213,
            b: 115,
        }, // Green
        PlayerColor {
            r: 255,
            g: 148,
            b: 77,
        }, // Orange
        PlayerColor {
            r: 83,
            g: 152,
            b: 255,
        }, // Blue
        PlayerColor {
            r: 255,
            g: 107,
            b: 175,
        }, // Pink
    ];

    /// Palette color for a player id. Ids start at 1, so the first player is red.
    pub fn for_player(id: PlayerId) -> Self {
        let idx = (id.saturating_sub(1) % Self::PALETTE.len() as u64) as usize;
        Self::PALETTE[idx]
    }

    /// CSS hex form (`#rrggbb`) for web clients.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}
