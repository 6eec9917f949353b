use anyhow::Result;
use serenity::{
    builder::{
        CreateActionRow, CreateEmbed, CreateInteractionResponse,
        CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    audio::{
        player::{Lifecycle, Player, PlayerDeps},
        transport::SongbirdTransport,
    },
    bot::{notifier::ChannelNotifier, RockolaBot},
    sources::{Resolved, SpotifyClient, TrackResolver},
    ui::{
        buttons::{self, button_ids},
        embeds,
    },
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RockolaBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, bot, guild_id).await?,
        "pause" => handle_pause(ctx, command, bot, guild_id).await?,
        "resume" => handle_resume(ctx, command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, command, bot, guild_id).await?,
        "stop" => handle_stop(ctx, command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, command, bot, guild_id).await?,
        "nowplaying" => handle_nowplaying(ctx, command, bot, guild_id).await?,
        "volume" => handle_volume(ctx, command, bot, guild_id).await?,
        "clear" => handle_clear(ctx, command, bot, guild_id).await?,
        "shuffle" => handle_shuffle(ctx, command, bot, guild_id).await?,
        "remove" => handle_remove(ctx, command, bot, guild_id).await?,
        "loop" => handle_loop(ctx, command, bot, guild_id).await?,
        "loopqueue" => handle_loopqueue(ctx, command, bot, guild_id).await?,
        "join" => handle_join(ctx, command, bot, guild_id).await?,
        "leave" => handle_leave(ctx, command, bot, guild_id).await?,
        "help" => handle_help(ctx, command).await?,
        _ => {
            respond_text(ctx, &command, "❌ Comando no reconocido", true).await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RockolaBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = option_str(&command, "query")
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    // Defer la respuesta ya que resolver puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    // Verificar que el usuario esté en un canal de voz
    let voice_channel = match user_voice_channel(ctx, guild_id, command.user.id) {
        Some(channel) => channel,
        None => {
            return edit_text(
                ctx,
                &command,
                "❌ Debes estar en un canal de voz para usar este comando",
            )
            .await;
        }
    };

    // Conectar al canal de voz si no está conectado
    let manager = songbird::get(ctx)
        .await
        .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;
    if manager.get(guild_id).is_none() {
        if let Err(e) = bot.join_voice_channel(ctx, guild_id, voice_channel).await {
            debug!("🔌 Fallo al conectar en guild {}: {:?}", guild_id, e);
            return edit_text(ctx, &command, "❌ No pude conectarme al canal de voz").await;
        }
    }

    let http = Arc::clone(&ctx.http);
    let channel_id = command.channel_id;
    let player = bot.registry.get_or_create(guild_id, || PlayerDeps {
        transport: Arc::new(SongbirdTransport::new(Arc::clone(&manager), guild_id)),
        resolver: bot.resolver.clone(),
        notifier: Arc::new(ChannelNotifier::new(http, channel_id)),
    });

    // Corta antes de gastar un proceso de yt-dlp si ya no hay lugar
    if player.snapshot(0).total >= bot.config.max_queue_size {
        return edit_text(
            ctx,
            &command,
            format!(
                "❌ La cola está llena (máximo {} canciones)",
                bot.config.max_queue_size
            ),
        )
        .await;
    }

    if SpotifyClient::is_spotify_url(&query) {
        return play_spotify(ctx, &command, bot, &player, &query).await;
    }

    match bot.resolver.resolve(&query, command.user.id).await {
        Ok(Resolved::Track(track)) => match player.enqueue(track.clone()) {
            Ok(position) => {
                let embed = embeds::create_track_added_embed(&track, position);
                edit_embed(ctx, &command, embed).await?;
            }
            Err(e) => edit_text(ctx, &command, format!("❌ {}", e)).await?,
        },
        Ok(Resolved::Playlist { name, tracks }) => {
            let requested = tracks.len();
            match player.enqueue_all(tracks) {
                Ok(added) => {
                    let embed =
                        embeds::create_playlist_added_embed(&name, added, requested - added);
                    edit_embed(ctx, &command, embed).await?;
                }
                Err(e) => edit_text(ctx, &command, format!("❌ {}", e)).await?,
            }
        }
        Err(e) => edit_text(ctx, &command, format!("❌ {}", e)).await?,
    }

    Ok(())
}

/// Convierte un enlace de Spotify en búsquedas de YouTube y las encola
///
/// Spotify solo presta metadatos; cada "artista - título" se resuelve por
/// separado y las que no encuentren nada se saltan sin frenar al resto.
async fn play_spotify(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RockolaBot,
    player: &Arc<Player>,
    url: &str,
) -> Result<()> {
    let spotify = match bot.spotify.as_ref() {
        Some(client) => client,
        None => {
            return edit_text(
                ctx,
                command,
                "❌ El soporte de Spotify no está configurado en este bot",
            )
            .await;
        }
    };

    let queries = match spotify.to_search_queries(url).await {
        Ok(queries) => queries,
        Err(e) => return edit_text(ctx, command, format!("❌ {}", e)).await,
    };

    let user_id = command.user.id;
    let lookups = queries
        .iter()
        .map(|query| bot.resolver.resolve(query, user_id));
    let results = futures::future::join_all(lookups).await;

    let mut tracks = Vec::new();
    for result in results {
        match result {
            Ok(Resolved::Track(track)) => tracks.push(track),
            Ok(Resolved::Playlist { tracks: mut found, .. }) => tracks.append(&mut found),
            Err(e) => debug!("🎶 Búsqueda de Spotify sin resultado: {}", e),
        }
    }

    if tracks.is_empty() {
        return edit_text(
            ctx,
            command,
            "❌ No se encontró ninguna de las canciones en YouTube",
        )
        .await;
    }

    let requested = tracks.len();
    match player.enqueue_all(tracks) {
        Ok(added) => {
            let skipped = requested - added;
            let mut content = if added == 1 {
                "✅ Se agregó **1** canción a la cola".to_string()
            } else {
                format!("✅ Se agregaron **{}** canciones a la cola", added)
            };
            if skipped > 0 {
                content.push_str(&format!(
                    "\n⚠️ {} quedaron afuera porque la cola se llenó",
                    skipped
                ));
            }
            edit_text(ctx, command, content).await?;
        }
        Err(e) => edit_text(ctx, command, format!("❌ {}", e)).await?,
    }

    Ok(())
}

async fn handle_pause(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RockolaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_text(ctx, &command, "❌ No hay nada reproduciéndose", true).await;
    };

    match player.pause() {
        Ok(()) => respond_text(ctx, &command, "⏸️ Reproducción pausada", false).await,
        Err(e) => respond_text(ctx, &command, format!("❌ {}", e), true).await,
    }
}

async fn handle_resume(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RockolaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_text(ctx, &command, "❌ No hay nada reproduciéndose", true).await;
    };

    match player.resume() {
        Ok(()) => respond_text(ctx, &command, "▶️ Reproducción reanudada", false).await,
        Err(e) => respond_text(ctx, &command, format!("❌ {}", e), true).await,
    }
}

async fn handle_skip(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RockolaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_text(ctx, &command, "❌ No hay nada reproduciéndose", true).await;
    };

    let current = player.current_track();
    match player.skip() {
        Ok(()) => {
            let content = match current {
                Some(track) => format!("⏭️ Saltada: **{}**", track.title()),
                None => "⏭️ Canción saltada".to_string(),
            };
            respond_text(ctx, &command, content, false).await
        }
        Err(e) => respond_text(ctx, &command, format!("❌ {}", e), true).await,
    }
}

async fn handle_stop(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RockolaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_text(ctx, &command, "❌ No hay nada reproduciéndose", true).await;
    };

    match player.stop() {
        Ok(()) => {
            respond_text(
                ctx,
                &command,
                "⏹️ Reproducción detenida y cola limpiada",
                false,
            )
            .await
        }
        Err(e) => respond_text(ctx, &command, format!("❌ {}", e), true).await,
    }
}

async fn handle_queue(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RockolaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_text(ctx, &command, "❌ No hay nada reproduciéndose", true).await;
    };

    let state = player.snapshot(10);
    respond_embed(ctx, &command, embeds::create_queue_embed(&state)).await
}

async fn handle_nowplaying(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RockolaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_text(
            ctx,
            &command,
            "❌ No hay nada reproduciéndose actualmente",
            true,
        )
        .await;
    };

    match player.current_track() {
        Some(track) => {
            let state = player.snapshot(10);
            let paused = player.lifecycle() == Lifecycle::Paused;
            let controls = buttons::create_player_controls(paused, state.loop_mode);

            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .embed(embeds::create_now_playing_embed(&track, &state))
                            .components(controls),
                    ),
                )
                .await?;
            Ok(())
        }
        None => {
            respond_text(
                ctx,
                &command,
                "❌ No hay nada reproduciéndose actualmente",
                true,
            )
            .await
        }
    }
}

async fn handle_volume(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RockolaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_text(ctx, &command, "❌ No hay nada reproduciéndose", true).await;
    };

    match option_i64(&command, "level") {
        Some(level) => match player.set_volume(level) {
            Ok(()) => {
                respond_text(ctx, &command, format!("🔊 Volumen ajustado a {}%", level), false)
                    .await
            }
            Err(e) => respond_text(ctx, &command, format!("❌ {}", e), true).await,
        },
        None => {
            respond_text(
                ctx,
                &command,
                format!("🔊 Volumen actual: {}%", player.volume_percent()),
                false,
            )
            .await
        }
    }
}

async fn handle_clear(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RockolaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_text(ctx, &command, "❌ No hay nada reproduciéndose", true).await;
    };

    match player.clear() {
        Ok(removed) => {
            let content = if removed == 1 {
                "🗑️ Se eliminó 1 canción de la cola".to_string()
            } else {
                format!("🗑️ Se eliminaron {} canciones de la cola", removed)
            };
            respond_text(ctx, &command, content, false).await
        }
        Err(e) => respond_text(ctx, &command, format!("❌ {}", e), true).await,
    }
}

async fn handle_shuffle(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RockolaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_text(ctx, &command, "❌ No hay nada reproduciéndose", true).await;
    };

    match player.shuffle() {
        Ok(()) => respond_text(ctx, &command, "🔀 Cola mezclada", false).await,
        Err(e) => respond_text(ctx, &command, format!("❌ {}", e), true).await,
    }
}

async fn handle_remove(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RockolaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_text(ctx, &command, "❌ No hay nada reproduciéndose", true).await;
    };

    let position = option_i64(&command, "position")
        .ok_or_else(|| anyhow::anyhow!("Posición no proporcionada"))?;

    if position < 1 {
        return respond_text(ctx, &command, "❌ La posición debe ser mayor que 0", true).await;
    }

    match player.remove_at(position as usize) {
        Ok(track) => {
            respond_text(
                ctx,
                &command,
                format!("🗑️ Se eliminó **{}** de la cola", track.title()),
                false,
            )
            .await
        }
        Err(e) => respond_text(ctx, &command, format!("❌ {}", e), true).await,
    }
}

async fn handle_loop(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RockolaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_text(ctx, &command, "❌ No hay nada reproduciéndose", true).await;
    };

    match player.toggle_loop_track() {
        Ok(true) => respond_text(ctx, &command, "🔂 Repetición de canción activada", false).await,
        Ok(false) => {
            respond_text(ctx, &command, "➡️ Repetición de canción desactivada", false).await
        }
        Err(e) => respond_text(ctx, &command, format!("❌ {}", e), true).await,
    }
}

async fn handle_loopqueue(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RockolaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_text(ctx, &command, "❌ No hay nada reproduciéndose", true).await;
    };

    match player.toggle_loop_queue() {
        Ok(true) => respond_text(ctx, &command, "🔁 Repetición de cola activada", false).await,
        Ok(false) => respond_text(ctx, &command, "➡️ Repetición de cola desactivada", false).await,
        Err(e) => respond_text(ctx, &command, format!("❌ {}", e), true).await,
    }
}

async fn handle_join(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RockolaBot,
    guild_id: GuildId,
) -> Result<()> {
    let voice_channel = match user_voice_channel(ctx, guild_id, command.user.id) {
        Some(channel) => channel,
        None => {
            return respond_text(
                ctx,
                &command,
                "❌ Debes estar en un canal de voz para usar este comando",
                true,
            )
            .await;
        }
    };

    match bot.join_voice_channel(ctx, guild_id, voice_channel).await {
        Ok(()) => respond_text(ctx, &command, "🔊 Conectado al canal de voz", false).await,
        Err(e) => {
            debug!("🔌 Fallo al conectar en guild {}: {:?}", guild_id, e);
            respond_text(ctx, &command, "❌ No pude conectarme al canal de voz", true).await
        }
    }
}

async fn handle_leave(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RockolaBot,
    guild_id: GuildId,
) -> Result<()> {
    let manager = songbird::get(ctx)
        .await
        .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

    if manager.get(guild_id).is_none() {
        return respond_text(
            ctx,
            &command,
            "❌ No estoy conectado a ningún canal de voz",
            true,
        )
        .await;
    }

    match bot.registry.get(guild_id) {
        // stop() marca la salida como intencional y desconecta al destruirse
        Some(player) if !player.is_destroyed() => {
            let _ = player.stop();
        }
        _ => {
            bot.registry.disconnect_intents().mark(guild_id);
            manager.remove(guild_id).await?;
        }
    }

    respond_text(ctx, &command, "👋 Desconectado del canal de voz", false).await
}

async fn handle_help(ctx: &Context, command: CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_help_embed())
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

/// Maneja interacciones con los botones del reproductor
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &RockolaBot,
) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Componente usado fuera de un servidor"))?;

    info!(
        "🔘 Botón {} presionado por {} en guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    let Some(player) = bot.registry.get(guild_id) else {
        return component_reply(ctx, &component, "❌ No hay nada reproduciéndose", true).await;
    };

    // Los botones quedan en mensajes viejos; solo los usuarios que comparten
    // canal con el bot pueden tocar la reproducción
    if !user_shares_bot_channel(ctx, guild_id, component.user.id) {
        return component_reply(
            ctx,
            &component,
            "❌ Debes estar en el mismo canal de voz que el bot",
            true,
        )
        .await;
    }

    match component.data.custom_id.as_str() {
        button_ids::PLAY_PAUSE => {
            let result = if player.lifecycle() == Lifecycle::Paused {
                player.resume()
            } else {
                player.pause()
            };
            match result {
                Ok(()) => {
                    let paused = player.lifecycle() == Lifecycle::Paused;
                    let controls = buttons::create_player_controls(paused, player.loop_mode());
                    component_update_controls(ctx, &component, controls).await
                }
                Err(e) => component_reply(ctx, &component, format!("❌ {}", e), true).await,
            }
        }
        button_ids::SKIP => match player.skip() {
            Ok(()) => component_reply(ctx, &component, "⏭️ Canción saltada", true).await,
            Err(e) => component_reply(ctx, &component, format!("❌ {}", e), true).await,
        },
        button_ids::STOP => match player.stop() {
            Ok(()) => {
                // El reproductor murió; el mensaje pierde sus controles
                component
                    .create_response(
                        &ctx.http,
                        CreateInteractionResponse::UpdateMessage(
                            CreateInteractionResponseMessage::new()
                                .content("⏹️ Reproducción detenida")
                                .components(Vec::new()),
                        ),
                    )
                    .await?;
                Ok(())
            }
            Err(e) => component_reply(ctx, &component, format!("❌ {}", e), true).await,
        },
        button_ids::LOOP => match player.cycle_loop() {
            Ok(mode) => {
                let paused = player.lifecycle() == Lifecycle::Paused;
                let controls = buttons::create_player_controls(paused, mode);
                component_update_controls(ctx, &component, controls).await
            }
            Err(e) => component_reply(ctx, &component, format!("❌ {}", e), true).await,
        },
        button_ids::QUEUE => {
            let state = player.snapshot(10);
            component
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .embed(embeds::create_queue_embed(&state))
                            .ephemeral(true),
                    ),
                )
                .await?;
            Ok(())
        }
        button_ids::VOLUME_UP => {
            let target = (i64::from(player.volume_percent()) + 10).min(100);
            adjust_volume(ctx, &component, &player, target).await
        }
        button_ids::VOLUME_DOWN => {
            let target = (i64::from(player.volume_percent()) - 10).max(0);
            adjust_volume(ctx, &component, &player, target).await
        }
        _ => component_reply(ctx, &component, "❌ Acción no reconocida", true).await,
    }
}

async fn adjust_volume(
    ctx: &Context,
    component: &ComponentInteraction,
    player: &Arc<Player>,
    target: i64,
) -> Result<()> {
    match player.set_volume(target) {
        Ok(()) => component_reply(ctx, component, format!("🔊 Volumen: {}%", target), true).await,
        Err(e) => component_reply(ctx, component, format!("❌ {}", e), true).await,
    }
}

// Funciones auxiliares

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn option_i64(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

/// Canal de voz donde está el usuario, según el caché del guild
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

fn user_shares_bot_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> bool {
    let bot_user_id = ctx.cache.current_user().id;
    let bot_channel = user_voice_channel(ctx, guild_id, bot_user_id);
    bot_channel.is_some() && bot_channel == user_voice_channel(ctx, guild_id, user_id)
}

async fn respond_text(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;

    Ok(())
}

async fn respond_embed(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;

    Ok(())
}

async fn edit_text(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;

    Ok(())
}

async fn edit_embed(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

async fn component_reply(
    ctx: &Context,
    component: &ComponentInteraction,
    content: impl Into<String>,
    ephemeral: bool,
) -> Result<()> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;

    Ok(())
}

async fn component_update_controls(
    ctx: &Context,
    component: &ComponentInteraction,
    controls: Vec<CreateActionRow>,
) -> Result<()> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::UpdateMessage(
                CreateInteractionResponseMessage::new().components(controls),
            ),
        )
        .await?;

    Ok(())
}
