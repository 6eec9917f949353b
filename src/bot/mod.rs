//! # Bot Module
//!
//! Main Discord bot implementation for Rockola.
//!
//! This module wires Discord events to the per-guild players:
//! - Command registration and handling
//! - Voice connection management
//! - Event handling (ready, interactions, voice state updates)
//!
//! ## Architecture
//!
//! The bot is built around the [`RockolaBot`] struct which implements
//! Serenity's [`EventHandler`] trait. It holds the pieces every handler
//! needs:
//!
//! - Per-guild players through [`PlayerRegistry`]
//! - Track resolution via a shared [`YtDlpResolver`]
//! - Optional Spotify metadata lookups with [`SpotifyClient`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use rockola::bot::RockolaBot;
//! use rockola::config::Config;
//!
//! let config = Config::load()?;
//! let bot = RockolaBot::new(config)?;
//! ```

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;
pub mod notifier;

use crate::{
    audio::registry::PlayerRegistry,
    config::Config,
    sources::{SpotifyClient, YtDlpResolver},
};

/// Handler principal del bot, uno por proceso
pub struct RockolaBot {
    pub config: Config,
    pub registry: Arc<PlayerRegistry>,
    pub resolver: Arc<YtDlpResolver>,
    pub spotify: Option<Arc<SpotifyClient>>,
}

impl RockolaBot {
    /// Arma el bot con sus dependencias a partir de la configuración
    pub fn new(config: Config) -> Result<Self> {
        let registry = PlayerRegistry::new(config.player_config());
        let resolver = Arc::new(YtDlpResolver::new());

        let spotify = match (&config.spotify_client_id, &config.spotify_client_secret) {
            (Some(id), Some(secret)) => {
                Some(Arc::new(SpotifyClient::new(id.clone(), secret.clone())?))
            }
            _ => {
                info!("🎶 Soporte de Spotify deshabilitado (sin credenciales)");
                None
            }
        };

        Ok(Self {
            config,
            registry,
            resolver,
            spotify,
        })
    }

    /// Registra los comandos slash según la configuración
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                commands::register_guild_commands(ctx, GuildId::new(guild_id)).await?;
                info!("✅ Comandos registrados en guild {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Conecta el bot al canal de voz indicado, ensordecido
    pub async fn join_voice_channel(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<()> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let call = manager.join(guild_id, channel_id).await?;
        {
            let mut call = call.lock().await;
            if !call.is_deaf() {
                call.deafen(true).await?;
            }
        }

        info!("🔊 Conectado al canal {} en guild {}", channel_id, guild_id);
        Ok(())
    }
}

#[async_trait]
impl EventHandler for RockolaBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("❌ Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                    error!("❌ Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component) => {
                if let Err(e) = handlers::handle_component(&ctx, component, self).await {
                    error!("❌ Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Detecta cuando el propio bot queda fuera de un canal de voz
    ///
    /// Las salidas pedidas (stop, leave, timeout de inactividad) dejan una
    /// marca antes de desconectar; si no hay marca, alguien sacó al bot a
    /// mano y el reproductor del guild tiene que morir ya.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }

        // Solo interesa la transición "estaba en un canal y ya no está";
        // moverse de canal trae channel_id nuevo y no pasa por acá
        if old.is_none() || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };

        if self.registry.disconnect_intents().consume(guild_id) {
            debug!("🔌 Desconexión esperada en guild {}", guild_id);
            return;
        }

        warn!(
            "🔌 Bot expulsado del canal de voz en guild {}, destruyendo reproductor",
            guild_id
        );
        if let Some(player) = self.registry.get(guild_id) {
            player.destroy_now().await;
        }
    }
}
