//! # UI Module
//!
//! Embeds and interactive components shown in Discord.
//!
//! - [`embeds`] - Rich cards for now playing, queue listings and help
//! - [`buttons`] - Playback control rows attached to announcements

pub mod buttons;
pub mod embeds;
