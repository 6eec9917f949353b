use serenity::all::Timestamp;
use serenity::builder::{CreateEmbed, CreateEmbedFooter};
use std::time::Duration;

use crate::audio::player::{LoopMode, QueueSnapshot};
use crate::sources::Track;

/// Paleta de colores del bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Rockola";

/// Crea el embed de "Reproduciendo Ahora" que anuncia cada track
pub fn create_now_playing_embed(track: &Track, state: &QueueSnapshot) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**[{}]({})**", track.title(), track.url()))
        .color(colors::MUSIC_PURPLE);

    embed = match track.duration() {
        Some(duration) => embed.field("⏱️ Duración", format_duration(duration), true),
        None => embed.field("⏱️ Duración", "🔴 En vivo", true),
    };

    embed = embed
        .field("🔊 Volumen", format!("{}%", state.volume_percent), true)
        .field("🔁 Repetición", state.loop_mode.label(), true);

    if let Some(uploader) = track.uploader() {
        embed = embed.field("🎤 Artista", uploader, true);
    }
    if state.total > 0 {
        embed = embed.field("📜 En espera", format!("{} canciones", state.total), true);
    }
    embed = embed.field("👤 Pedida por", format!("<@{}>", track.requested_by()), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea el embed de confirmación cuando se encola una canción
pub fn create_track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Agregada a la Cola")
        .description(format!("**[{}]({})**", track.title(), track.url()))
        .color(colors::SUCCESS_GREEN)
        .field("📌 Posición", position.to_string(), true);

    if let Some(duration) = track.duration() {
        embed = embed.field("⏱️ Duración", format_duration(duration), true);
    }
    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea el embed de confirmación cuando se encola una tanda de canciones
pub fn create_playlist_added_embed(name: &str, added: usize, skipped: usize) -> CreateEmbed {
    let mut description = if added == 1 {
        format!("Se agregó **1** canción de **{name}** a la cola")
    } else {
        format!("Se agregaron **{added}** canciones de **{name}** a la cola")
    };
    if skipped > 0 {
        description.push_str(&format!(
            "\n⚠️ {skipped} quedaron afuera porque la cola se llenó"
        ));
    }

    CreateEmbed::default()
        .title("📋 Playlist Agregada")
        .description(description)
        .color(colors::MUSIC_PURPLE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea el embed de la cola de reproducción
pub fn create_queue_embed(state: &QueueSnapshot) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if state.current.is_none() && state.total == 0 {
        return embed
            .description("📭 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    if let Some(current) = &state.current {
        let status = match state.loop_mode {
            LoopMode::Track => "🔂",
            LoopMode::Queue => "🔁",
            LoopMode::Off => "▶️",
        };
        embed = embed.field(
            format!("{status} Sonando ahora"),
            format!("**[{}]({})**", current.title(), current.url()),
            false,
        );
    }

    if !state.upcoming.is_empty() {
        let mut lines = String::new();
        for (i, track) in state.upcoming.iter().enumerate() {
            let duration = track
                .duration()
                .map(|d| format!(" `[{}]`", format_duration(d)))
                .unwrap_or_default();
            lines.push_str(&format!("**{}.** {}{}\n", i + 1, track.title(), duration));
        }
        let remaining = state.total.saturating_sub(state.upcoming.len());
        if remaining > 0 {
            lines.push_str(&format!("*...y {remaining} canciones más*\n"));
        }
        embed = embed.field("Próximas canciones", lines, false);
    }

    embed = embed.field(
        "Información",
        format!(
            "**Total:** {} canciones • **Volumen:** {}% • **Repetición:** {}",
            state.total,
            state.volume_percent,
            state.loop_mode.label()
        ),
        false,
    );

    embed
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea el embed de ayuda con todos los comandos
pub fn create_help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Rockola - Guía de Comandos")
        .color(colors::INFO_BLUE)
        .description("Bot de música con colas por servidor")
        .field(
            "🎵 Reproducción",
            "• `/play <canción o URL>` - Reproduce o encola\n\
            • `/pause` - Pausa la reproducción\n\
            • `/resume` - Reanuda la reproducción\n\
            • `/skip` - Salta la canción actual\n\
            • `/stop` - Detiene todo y limpia la cola",
            false,
        )
        .field(
            "📜 Cola",
            "• `/queue` - Muestra la cola\n\
            • `/clear` - Vacía la cola\n\
            • `/shuffle` - Mezcla la cola\n\
            • `/remove <posición>` - Saca una canción\n\
            • `/loop` - Repite la canción actual\n\
            • `/loopqueue` - Repite la cola completa",
            false,
        )
        .field(
            "🎛️ Audio",
            "• `/volume <0-100>` - Ajusta el volumen\n\
            • `/nowplaying` - Muestra qué está sonando",
            false,
        )
        .field(
            "🔊 Conexión",
            "• `/join` - Conecta al canal de voz\n\
            • `/leave` - Desconecta del canal",
            false,
        )
        .field(
            "🎵 Fuentes Soportadas",
            "• YouTube / YouTube Music\n\
            • Playlists de YouTube\n\
            • Links de Spotify (se buscan en YouTube)\n\
            • Búsquedas de texto",
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Formatea una duración en formato legible
fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_duration_short_and_long() {
        assert_eq!(format_duration(Duration::from_secs(45)), "0:45");
        assert_eq!(format_duration(Duration::from_secs(213)), "3:33");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1:00:00");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }
}
