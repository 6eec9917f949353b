use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use songbird::{
    input::{HttpRequest, Input},
    tracks::TrackHandle,
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

/// Cómo terminó el stream que estaba sonando
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Llegó al final o fue detenido (skip/stop cuentan como detención)
    Finished,
    /// El driver reportó un error de reproducción
    Errored,
}

/// Control sobre el track actualmente en reproducción
pub trait PlayingTrack: Send + Sync {
    fn pause(&self) -> Result<()>;
    fn resume(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;
    fn set_volume(&self, volume: f32) -> Result<()>;
}

/// Abstracción del transporte de voz de un guild
///
/// El reproductor habla con la conexión de voz únicamente a través de este
/// trait, así su máquina de estados se puede testear sin gateway ni driver.
/// La implementación real envuelve la `Call` de songbird.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Verifica si la conexión de voz sigue activa
    async fn is_connected(&self) -> bool;

    /// Reproduce una URL de audio directa al volumen dado
    ///
    /// `on_end` se dispara exactamente una vez cuando el stream termina,
    /// es interrumpido o falla.
    async fn play(
        &self,
        stream_url: &str,
        volume: f32,
        on_end: oneshot::Sender<StreamEnd>,
    ) -> Result<Box<dyn PlayingTrack>>;

    /// Corta la conexión de voz del guild (tolerante si ya no existe)
    async fn disconnect(&self) -> Result<()>;
}

/// Transporte real sobre el manager de songbird
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    http_client: reqwest::Client,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>, guild_id: GuildId) -> Self {
        Self {
            manager,
            guild_id,
            // Sin timeout total: los streams de audio viven más de lo que
            // cualquier timeout razonable de request permitiría
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn is_connected(&self) -> bool {
        match self.manager.get(self.guild_id) {
            Some(call) => call.lock().await.current_connection().is_some(),
            None => false,
        }
    }

    async fn play(
        &self,
        stream_url: &str,
        volume: f32,
        on_end: oneshot::Sender<StreamEnd>,
    ) -> Result<Box<dyn PlayingTrack>> {
        let call = self
            .manager
            .get(self.guild_id)
            .ok_or_else(|| anyhow::anyhow!("No hay conexión de voz para el guild {}", self.guild_id))?;

        let request = HttpRequest::new(self.http_client.clone(), stream_url.to_string());
        let input = Input::from(request);

        let mut handler = call.lock().await;
        let track_handle = handler.play_input(input);
        track_handle
            .set_volume(volume)
            .map_err(|e| anyhow::anyhow!("Error al fijar volumen inicial: {}", e))?;

        // End y Error pueden llegar ambos para el mismo track; comparten el
        // sender y el primero que llegue se lo lleva
        let sender = Arc::new(Mutex::new(Some(on_end)));
        track_handle
            .add_event(
                Event::Track(TrackEvent::End),
                StreamEndNotifier {
                    sender: sender.clone(),
                    outcome: StreamEnd::Finished,
                },
            )
            .map_err(|e| anyhow::anyhow!("Error al registrar evento de fin: {}", e))?;
        track_handle
            .add_event(
                Event::Track(TrackEvent::Error),
                StreamEndNotifier {
                    sender,
                    outcome: StreamEnd::Errored,
                },
            )
            .map_err(|e| anyhow::anyhow!("Error al registrar evento de error: {}", e))?;

        Ok(Box::new(SongbirdTrack {
            handle: track_handle,
        }))
    }

    async fn disconnect(&self) -> Result<()> {
        if self.manager.get(self.guild_id).is_some() {
            self.manager
                .remove(self.guild_id)
                .await
                .map_err(|e| anyhow::anyhow!("Error al desconectar del canal de voz: {}", e))?;
            debug!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        }
        Ok(())
    }
}

struct SongbirdTrack {
    handle: TrackHandle,
}

impl PlayingTrack for SongbirdTrack {
    fn pause(&self) -> Result<()> {
        self.handle
            .pause()
            .map_err(|e| anyhow::anyhow!("Error al pausar: {}", e))
    }

    fn resume(&self) -> Result<()> {
        self.handle
            .play()
            .map_err(|e| anyhow::anyhow!("Error al reanudar: {}", e))
    }

    fn stop(&self) -> Result<()> {
        self.handle
            .stop()
            .map_err(|e| anyhow::anyhow!("Error al detener: {}", e))
    }

    fn set_volume(&self, volume: f32) -> Result<()> {
        self.handle
            .set_volume(volume)
            .map_err(|e| anyhow::anyhow!("Error al cambiar volumen: {}", e))
    }
}

/// Handler de songbird que dispara la señal de fin una sola vez
///
/// El sender sale del `Option` antes de usarse, así el segundo evento que
/// llegue (End después de Error, o viceversa) no encuentra nada que enviar.
struct StreamEndNotifier {
    sender: Arc<Mutex<Option<oneshot::Sender<StreamEnd>>>>,
    outcome: StreamEnd,
}

#[async_trait::async_trait]
impl VoiceEventHandler for StreamEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        if let Some(sender) = self.sender.lock().take() {
            debug!("🎶 Stream terminado: {:?}", self.outcome);
            // El receptor puede haberse soltado si el reproductor ya murió
            let _ = sender.send(self.outcome);
        }
        None
    }
}
