use serenity::{builder::CreateMessage, http::Http, model::id::ChannelId};
use std::sync::Arc;
use tracing::warn;

use crate::{
    audio::player::{PlayerNotifier, QueueSnapshot},
    sources::Track,
    ui::{buttons, embeds},
};

use async_trait::async_trait;

/// Publica los avisos del reproductor en el canal de texto que lo invocó
///
/// El reproductor no conoce Discord; este adaptador guarda el handle HTTP y
/// el canal donde cayó el `/play` original, y traduce cada aviso en un
/// mensaje. Los fallos de envío se loguean y nada más: perder un anuncio no
/// justifica cortar la música.
pub struct ChannelNotifier {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl PlayerNotifier for ChannelNotifier {
    async fn now_playing(&self, track: &Track, state: &QueueSnapshot) {
        let embed = embeds::create_now_playing_embed(track, state);
        // El track recién arrancó, los controles salen en estado "sonando"
        let controls = buttons::create_player_controls(false, state.loop_mode);

        let message = CreateMessage::new().embed(embed).components(controls);
        if let Err(e) = self.channel_id.send_message(&self.http, message).await {
            warn!(
                "⚠️ No se pudo anunciar el track en el canal {}: {}",
                self.channel_id, e
            );
        }
    }

    async fn track_failed(&self, title: &str, reason: &str) {
        let content = format!("❌ Error al reproducir **{}**: {}", title, reason);
        if let Err(e) = self.channel_id.say(&self.http, content).await {
            warn!(
                "⚠️ No se pudo avisar el fallo en el canal {}: {}",
                self.channel_id, e
            );
        }
    }
}
