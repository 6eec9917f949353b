//! # Audio Module
//!
//! Per-guild audio playback system for Rockola.
//!
//! This module provides the core playback functionality including:
//! - A bounded FIFO queue per guild with shuffle/repeat modes
//! - A playback state machine driven by a single async task per guild
//! - A registry mapping guilds to their active players
//! - A transport seam over songbird voice connections
//!
//! ## Architecture
//!
//! The audio system is built around four main components:
//!
//! ### [`player`] - Playback State Machine
//! - One task per guild consumes the queue and drives the voice connection
//! - Handles pause/resume/skip/stop, volume and loop modes
//! - Destroys itself after a configurable idle timeout
//!
//! ### [`queue`] - Queue Management
//! - Bounded queue operations with capacity enforcement
//! - Shuffle and 1-based removal used by the command surface
//!
//! ### [`registry`] - Player Registry
//! - Atomic get-or-create per guild
//! - Tracks which disconnects were requested by the bot itself
//!
//! ### [`transport`] - Voice Transport
//! - Trait boundary over songbird so the state machine is testable
//! - Signals end-of-stream exactly once per played track
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use rockola::audio::registry::PlayerRegistry;
//! use serenity::all::GuildId;
//!
//! # async fn example(registry: std::sync::Arc<PlayerRegistry>) -> anyhow::Result<()> {
//! let guild_id = GuildId::new(123456789);
//!
//! if let Some(player) = registry.get(guild_id) {
//!     player.pause()?;
//!     player.resume()?;
//!     player.skip()?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod player;
pub mod queue;
pub mod registry;
pub mod transport;

use thiserror::Error;

/// Errores de las operaciones sobre el reproductor
///
/// Los mensajes son los que ve el usuario en Discord, por eso están en
/// español y no exponen detalles internos.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("La cola está llena (máximo {0} canciones)")]
    QueueFull(usize),

    #[error("La cola está vacía")]
    EmptyQueue,

    #[error("Se necesitan al menos 2 canciones en la cola para mezclar")]
    NotEnoughTracks,

    #[error("Posición inválida: {position} (la cola tiene {len} canciones)")]
    InvalidPosition { position: usize, len: usize },

    #[error("El volumen debe estar entre 0 y 100")]
    VolumeOutOfRange,

    #[error("No hay nada reproduciéndose")]
    NothingPlaying,

    #[error("La reproducción no está pausada")]
    NotPaused,

    #[error("El reproductor ya fue destruido")]
    Destroyed,

    #[error("Error del transporte de voz: {0}")]
    Transport(String),
}
