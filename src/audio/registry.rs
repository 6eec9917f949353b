use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::audio::player::{Player, PlayerConfig, PlayerDeps};

/// Marcas de desconexión pedida por el bot
///
/// El observer de voice_state las consume para distinguir un stop nuestro
/// de una expulsión: si la marca no está, al bot lo sacaron.
#[derive(Default)]
pub struct DisconnectIntents {
    guilds: Mutex<HashSet<GuildId>>,
}

impl DisconnectIntents {
    /// Marca que la próxima desconexión en este guild es nuestra
    pub fn mark(&self, guild_id: GuildId) {
        self.guilds.lock().insert(guild_id);
    }

    /// Retira la marca y devuelve si existía; cada marca se consume una vez
    pub fn consume(&self, guild_id: GuildId) -> bool {
        self.guilds.lock().remove(&guild_id)
    }
}

/// Reproductores activos, uno por guild
pub struct PlayerRegistry {
    players: DashMap<GuildId, Arc<Player>>,
    disconnect_intents: DisconnectIntents,
    config: PlayerConfig,
}

impl PlayerRegistry {
    pub fn new(config: PlayerConfig) -> Arc<Self> {
        Arc::new(Self {
            players: DashMap::new(),
            disconnect_intents: DisconnectIntents::default(),
            config,
        })
    }

    /// Devuelve el reproductor del guild, creándolo si hace falta
    ///
    /// Un reproductor destruido que todavía figura en el mapa se reemplaza
    /// acá mismo; `deps` solo se evalúa cuando hay que crear uno.
    pub fn get_or_create(
        self: &Arc<Self>,
        guild_id: GuildId,
        deps: impl FnOnce() -> PlayerDeps,
    ) -> Arc<Player> {
        match self.players.entry(guild_id) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_destroyed() {
                    debug!("🎧 Reemplazando reproductor destruido en guild {}", guild_id);
                    let player =
                        Player::spawn(guild_id, deps(), Arc::downgrade(self), self.config.clone());
                    occupied.insert(player.clone());
                    player
                } else {
                    occupied.get().clone()
                }
            }
            Entry::Vacant(vacant) => {
                info!("🎧 Creando reproductor para guild {}", guild_id);
                let player =
                    Player::spawn(guild_id, deps(), Arc::downgrade(self), self.config.clone());
                vacant.insert(player.clone());
                player
            }
        }
    }

    /// Reproductor existente del guild, sin crear uno nuevo
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Player>> {
        self.players.get(&guild_id).map(|entry| entry.value().clone())
    }

    /// Saca del mapa al reproductor dado, y solo a ese
    ///
    /// La comparación por puntero evita que un reproductor viejo, al
    /// terminar de destruirse tarde, se lleve puesto al que lo reemplazó.
    pub(crate) fn remove_player(&self, player: &Arc<Player>) {
        self.players
            .remove_if(&player.guild_id(), |_, existing| Arc::ptr_eq(existing, player));
    }

    pub fn disconnect_intents(&self) -> &DisconnectIntents {
        &self.disconnect_intents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::player::{PlayerNotifier, QueueSnapshot};
    use crate::audio::transport::{PlayingTrack, StreamEnd, VoiceTransport};
    use crate::sources::{MockTrackResolver, Track};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::{oneshot, Notify};
    use tokio::time::{sleep, Instant};

    struct NullTransport;

    #[async_trait]
    impl VoiceTransport for NullTransport {
        async fn is_connected(&self) -> bool {
            true
        }

        async fn play(
            &self,
            _stream_url: &str,
            _volume: f32,
            _on_end: oneshot::Sender<StreamEnd>,
        ) -> anyhow::Result<Box<dyn PlayingTrack>> {
            unimplemented!("estos tests no reproducen nada")
        }

        async fn disconnect(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    /// Transporte cuya desconexión queda colgada hasta que el test la libere
    struct StallingTransport {
        stalled: AtomicBool,
        gate: Notify,
    }

    impl StallingTransport {
        fn new() -> Self {
            Self {
                stalled: AtomicBool::new(false),
                gate: Notify::new(),
            }
        }

        fn is_stalled(&self) -> bool {
            self.stalled.load(Ordering::SeqCst)
        }

        fn release(&self) {
            self.gate.notify_one();
        }
    }

    #[async_trait]
    impl VoiceTransport for StallingTransport {
        async fn is_connected(&self) -> bool {
            true
        }

        async fn play(
            &self,
            _stream_url: &str,
            _volume: f32,
            _on_end: oneshot::Sender<StreamEnd>,
        ) -> anyhow::Result<Box<dyn PlayingTrack>> {
            unimplemented!("estos tests no reproducen nada")
        }

        async fn disconnect(&self) -> anyhow::Result<()> {
            self.stalled.store(true, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(())
        }
    }

    struct NullNotifier;

    #[async_trait]
    impl PlayerNotifier for NullNotifier {
        async fn now_playing(&self, _track: &Track, _state: &QueueSnapshot) {}

        async fn track_failed(&self, _title: &str, _reason: &str) {}
    }

    fn test_config() -> PlayerConfig {
        PlayerConfig {
            max_queue_size: 10,
            idle_timeout: Duration::from_secs(10),
            default_volume: 0.5,
        }
    }

    fn null_deps() -> PlayerDeps {
        PlayerDeps {
            transport: Arc::new(NullTransport),
            resolver: Arc::new(MockTrackResolver::new()),
            notifier: Arc::new(NullNotifier),
        }
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            if Instant::now() > deadline {
                panic!("la condición no se cumplió a tiempo");
            }
            sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_live_player() {
        let registry = PlayerRegistry::new(test_config());

        let a = registry.get_or_create(GuildId::new(1), null_deps);
        let b = registry.get_or_create(GuildId::new(1), null_deps);
        assert!(Arc::ptr_eq(&a, &b));

        let other = registry.get_or_create(GuildId::new(2), null_deps);
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[tokio::test]
    async fn test_get_does_not_create() {
        let registry = PlayerRegistry::new(test_config());

        assert!(registry.get(GuildId::new(5)).is_none());

        let created = registry.get_or_create(GuildId::new(5), null_deps);
        let fetched = registry.get(GuildId::new(5)).unwrap();
        assert!(Arc::ptr_eq(&created, &fetched));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_create_yields_one_player() {
        let registry = PlayerRegistry::new(test_config());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.get_or_create(GuildId::new(3), null_deps)
            }));
        }

        let players = futures::future::join_all(handles).await;
        let first = players[0].as_ref().unwrap().clone();
        for player in players {
            assert!(Arc::ptr_eq(&first, &player.unwrap()));
        }
    }

    #[tokio::test]
    async fn test_destroyed_player_is_replaced_without_evicting_successor() {
        let registry = PlayerRegistry::new(test_config());
        let transport = Arc::new(StallingTransport::new());
        let guild = GuildId::new(4);

        let deps = PlayerDeps {
            transport: transport.clone() as Arc<dyn VoiceTransport>,
            resolver: Arc::new(MockTrackResolver::new()),
            notifier: Arc::new(NullNotifier),
        };
        let old = registry.get_or_create(guild, move || deps);

        // El viejo queda marcado como destruido pero colgado en la
        // desconexión, todavía presente en el mapa
        old.stop().unwrap();
        wait_until(|| transport.is_stalled()).await;
        assert!(old.is_destroyed());
        assert!(registry.get(guild).is_some());

        let new = registry.get_or_create(guild, null_deps);
        assert!(!Arc::ptr_eq(&old, &new));

        // Cuando el viejo termina de destruirse no desaloja al reemplazo
        transport.release();
        sleep(Duration::from_millis(50)).await;
        let fetched = registry.get(guild).unwrap();
        assert!(Arc::ptr_eq(&new, &fetched));
    }

    #[test]
    fn test_disconnect_intents_consume_once() {
        let intents = DisconnectIntents::default();
        let guild = GuildId::new(8);

        assert!(!intents.consume(guild));
        intents.mark(guild);
        assert!(intents.consume(guild));
        assert!(!intents.consume(guild));
    }
}
