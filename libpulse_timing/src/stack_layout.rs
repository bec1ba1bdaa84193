use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use super::constants::STACK_SIZE;
use super::error::StackLayoutError;
use super::run::ChannelId;

/// Where a detector sits in the vertical stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackPosition {
    Top,
    Middle,
    Bottom,
}

impl StackPosition {
    /// Top and bottom detectors see corner-clipped tracks
    pub fn is_edge(&self) -> bool {
        matches!(self, Self::Top | Self::Bottom)
    }
}

impl Display for StackPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Top => write!(f, "Top"),
            Self::Middle => write!(f, "Middle"),
            Self::Bottom => write!(f, "Bottom"),
        }
    }
}

/// The order of channels in the stack, top to bottom.
///
/// Parsed from a position string such as `"2134"`, where the character at index k
/// names the channel occupying position k.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackLayout {
    order: [ChannelId; STACK_SIZE],
}

impl FromStr for StackLayout {
    type Err = StackLayoutError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != STACK_SIZE {
            return Err(StackLayoutError::BadLength(s.to_string()));
        }
        let mut order = [0; STACK_SIZE];
        for (position, c) in chars.into_iter().enumerate() {
            let channel = match c.to_digit(10) {
                Some(d) if d > 0 => d as ChannelId,
                _ => return Err(StackLayoutError::BadChannel(c)),
            };
            if order.contains(&channel) {
                return Err(StackLayoutError::DuplicateChannel(channel));
            }
            order[position] = channel;
        }
        Ok(Self { order })
    }
}

impl Display for StackLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for channel in self.order.iter() {
            write!(f, "{channel}")?;
        }
        Ok(())
    }
}

impl StackLayout {
    /// The position of a channel, or None if it is not part of the stack
    pub fn position_of(&self, channel: ChannelId) -> Option<StackPosition> {
        let index = self.order.iter().position(|c| *c == channel)?;
        Some(if index == 0 {
            StackPosition::Top
        } else if index == STACK_SIZE - 1 {
            StackPosition::Bottom
        } else {
            StackPosition::Middle
        })
    }

    /// The two channels in the middle of the stack, which see full-length tracks
    pub fn middle_pair(&self) -> (ChannelId, ChannelId) {
        let (a, b) = (self.order[1], self.order[2]);
        (a.min(b), a.max(b))
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.order
    }
}
