use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::audio::queue::TrackQueue;
use crate::audio::registry::PlayerRegistry;
use crate::audio::transport::{PlayingTrack, StreamEnd, VoiceTransport};
use crate::audio::PlayerError;
use crate::sources::{Track, TrackResolver};

/// Modos de repetición
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Off,
    Track,
    Queue,
}

impl LoopMode {
    /// Siguiente modo en el ciclo del botón de repetición
    pub fn next(self) -> Self {
        match self {
            LoopMode::Off => LoopMode::Track,
            LoopMode::Track => LoopMode::Queue,
            LoopMode::Queue => LoopMode::Off,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LoopMode::Off => "desactivada",
            LoopMode::Track => "canción",
            LoopMode::Queue => "cola",
        }
    }
}

/// Fases de vida del reproductor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Creado o entre tracks
    Idle,
    /// Hay un stream sonando
    Playing,
    /// El stream actual está pausado
    Paused,
    /// Cola vacía, esperando tracks antes de autodestruirse
    Draining,
    /// stop() pedido, el loop está saliendo
    Stopped,
    /// Recursos liberados, no acepta más operaciones
    Destroyed,
}

/// Parámetros de funcionamiento de un reproductor
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub max_queue_size: usize,
    pub idle_timeout: Duration,
    pub default_volume: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 100,
            idle_timeout: Duration::from_secs(300),
            default_volume: 0.5,
        }
    }
}

/// Avisos del reproductor hacia el canal de texto que lo invocó
///
/// Lleva exactamente lo que los avisos necesitan; el reproductor no conoce
/// canales ni HTTP de Discord.
#[async_trait]
pub trait PlayerNotifier: Send + Sync {
    /// Anuncia el track que empieza a sonar, con el estado para el embed
    async fn now_playing(&self, track: &Track, state: &QueueSnapshot);

    /// Avisa que un track falló sin tirar abajo el reproductor
    async fn track_failed(&self, title: &str, reason: &str);
}

/// Dependencias externas del reproductor
pub struct PlayerDeps {
    pub transport: Arc<dyn VoiceTransport>,
    pub resolver: Arc<dyn TrackResolver>,
    pub notifier: Arc<dyn PlayerNotifier>,
}

/// Foto del estado del reproductor para armar embeds
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub current: Option<Track>,
    pub upcoming: Vec<Track>,
    pub total: usize,
    pub loop_mode: LoopMode,
    pub volume_percent: u8,
}

/// Por qué terminó el loop de reproducción
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisconnectReason {
    /// stop() o /leave del usuario
    Stopped,
    /// Se agotó la espera con la cola vacía
    IdleTimeout,
    /// La conexión de voz se cayó sin que lo pidiéramos
    ConnectionLost,
}

impl DisconnectReason {
    /// Las salidas pedidas por nosotros se marcan para que el observer de
    /// voice_state no las confunda con una expulsión
    fn is_intentional(self) -> bool {
        matches!(self, DisconnectReason::Stopped | DisconnectReason::IdleTimeout)
    }
}

enum DrainOutcome {
    Track(Track),
    TimedOut,
    Exit,
}

/// Estado mutable del reproductor
///
/// Todo vive detrás de un solo lock, que nunca se mantiene a través de un
/// await.
struct PlayerState {
    queue: TrackQueue,
    current: Option<Track>,
    current_handle: Option<Box<dyn PlayingTrack>>,
    volume: f32,
    loop_mode: LoopMode,
    stopped: bool,
    lifecycle: Lifecycle,
}

/// Reproductor de un guild
///
/// Una tarea por guild consume la cola y maneja los streams; los comandos
/// mutan el estado a través de los métodos públicos y el loop es el único
/// que reproduce.
pub struct Player {
    guild_id: GuildId,
    state: Mutex<PlayerState>,
    queue_signal: Notify,
    transport: Arc<dyn VoiceTransport>,
    resolver: Arc<dyn TrackResolver>,
    notifier: Arc<dyn PlayerNotifier>,
    registry: Weak<PlayerRegistry>,
    config: PlayerConfig,
    destroyed: AtomicBool,
}

impl Player {
    /// Crea el reproductor y arranca su loop en una tarea propia
    pub fn spawn(
        guild_id: GuildId,
        deps: PlayerDeps,
        registry: Weak<PlayerRegistry>,
        config: PlayerConfig,
    ) -> Arc<Self> {
        let player = Arc::new(Self {
            guild_id,
            state: Mutex::new(PlayerState {
                queue: TrackQueue::new(config.max_queue_size),
                current: None,
                current_handle: None,
                volume: config.default_volume,
                loop_mode: LoopMode::Off,
                stopped: false,
                lifecycle: Lifecycle::Idle,
            }),
            queue_signal: Notify::new(),
            transport: deps.transport,
            resolver: deps.resolver,
            notifier: deps.notifier,
            registry,
            config,
            destroyed: AtomicBool::new(false),
        });

        let task = player.clone();
        tokio::spawn(async move {
            task.run().await;
        });

        player
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.is_destroyed() {
            return Lifecycle::Destroyed;
        }
        self.state.lock().lifecycle
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.state.lock().loop_mode
    }

    pub fn current_track(&self) -> Option<Track> {
        self.state.lock().current.clone()
    }

    pub fn volume_percent(&self) -> u8 {
        (self.state.lock().volume * 100.0).round() as u8
    }

    /// Agrega un track; devuelve su posición en la cola (1-based)
    pub fn enqueue(&self, track: Track) -> Result<usize, PlayerError> {
        self.ensure_alive()?;
        let position = self.state.lock().queue.push(track)?;
        self.queue_signal.notify_one();
        Ok(position)
    }

    /// Agrega una tanda de tracks hasta donde entre
    ///
    /// Devuelve cuántos entraron; si la cola estaba llena y no entró
    /// ninguno, es un error para que el usuario se entere.
    pub fn enqueue_all(&self, tracks: Vec<Track>) -> Result<usize, PlayerError> {
        self.ensure_alive()?;
        if tracks.is_empty() {
            return Ok(0);
        }

        let mut added = 0;
        {
            let mut st = self.state.lock();
            for track in tracks {
                if st.queue.push(track).is_err() {
                    break;
                }
                added += 1;
            }
        }

        if added == 0 {
            return Err(PlayerError::QueueFull(self.config.max_queue_size));
        }
        self.queue_signal.notify_one();
        Ok(added)
    }

    /// Pausa el stream actual
    pub fn pause(&self) -> Result<(), PlayerError> {
        self.ensure_alive()?;
        let mut st = self.state.lock();
        if st.lifecycle != Lifecycle::Playing {
            return Err(PlayerError::NothingPlaying);
        }
        let handle = st.current_handle.as_ref().ok_or(PlayerError::NothingPlaying)?;
        handle
            .pause()
            .map_err(|e| PlayerError::Transport(e.to_string()))?;
        st.lifecycle = Lifecycle::Paused;
        info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
        Ok(())
    }

    /// Reanuda el stream pausado
    pub fn resume(&self) -> Result<(), PlayerError> {
        self.ensure_alive()?;
        let mut st = self.state.lock();
        if st.lifecycle != Lifecycle::Paused {
            return Err(PlayerError::NotPaused);
        }
        let handle = st.current_handle.as_ref().ok_or(PlayerError::NotPaused)?;
        handle
            .resume()
            .map_err(|e| PlayerError::Transport(e.to_string()))?;
        st.lifecycle = Lifecycle::Playing;
        info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
        Ok(())
    }

    /// Salta el track actual
    ///
    /// Apaga la repetición de canción: saltar algo que se repetiría solo no
    /// tiene sentido. La repetición de cola se respeta.
    pub fn skip(&self) -> Result<(), PlayerError> {
        self.ensure_alive()?;
        let handle = {
            let mut st = self.state.lock();
            if !matches!(st.lifecycle, Lifecycle::Playing | Lifecycle::Paused) {
                return Err(PlayerError::NothingPlaying);
            }
            if st.loop_mode == LoopMode::Track {
                st.loop_mode = LoopMode::Off;
            }
            st.current_handle.take()
        };

        if let Some(handle) = handle {
            // Detener dispara la señal de fin y el loop avanza solo; si el
            // track justo terminó, la señal ya salió y esto no hace nada
            let _ = handle.stop();
        }
        info!("⏭️ Track saltado en guild {}", self.guild_id);
        Ok(())
    }

    /// Frena todo: limpia la cola y deja que el loop se destruya
    pub fn stop(&self) -> Result<(), PlayerError> {
        self.ensure_alive()?;
        let handle = {
            let mut st = self.state.lock();
            st.stopped = true;
            st.queue.clear();
            st.current = None;
            st.loop_mode = LoopMode::Off;
            st.lifecycle = Lifecycle::Stopped;
            st.current_handle.take()
        };

        if let Some(handle) = handle {
            let _ = handle.stop();
        }
        self.queue_signal.notify_one();
        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
        Ok(())
    }

    /// Ajusta el volumen (0 a 100)
    ///
    /// Aplica al stream actual si hay uno y queda fijado para los próximos.
    pub fn set_volume(&self, percent: i64) -> Result<(), PlayerError> {
        self.ensure_alive()?;
        if !(0..=100).contains(&percent) {
            return Err(PlayerError::VolumeOutOfRange);
        }

        let mut st = self.state.lock();
        st.volume = percent as f32 / 100.0;
        if let Some(handle) = st.current_handle.as_ref() {
            // Si el track justo terminó, el volumen igual vale para el próximo
            let _ = handle.set_volume(st.volume);
        }
        info!("🔊 Volumen ajustado a {}% en guild {}", percent, self.guild_id);
        Ok(())
    }

    /// Activa/desactiva la repetición del track actual
    ///
    /// Los modos de repetición son excluyentes: activar este reemplaza la
    /// repetición de cola si estaba puesta.
    pub fn toggle_loop_track(&self) -> Result<bool, PlayerError> {
        self.ensure_alive()?;
        let mut st = self.state.lock();
        let enabled = st.loop_mode != LoopMode::Track;
        st.loop_mode = if enabled { LoopMode::Track } else { LoopMode::Off };
        Ok(enabled)
    }

    /// Activa/desactiva la repetición de la cola completa
    pub fn toggle_loop_queue(&self) -> Result<bool, PlayerError> {
        self.ensure_alive()?;
        let mut st = self.state.lock();
        let enabled = st.loop_mode != LoopMode::Queue;
        st.loop_mode = if enabled { LoopMode::Queue } else { LoopMode::Off };
        Ok(enabled)
    }

    /// Pasa al siguiente modo de repetición (para el botón)
    pub fn cycle_loop(&self) -> Result<LoopMode, PlayerError> {
        self.ensure_alive()?;
        let mut st = self.state.lock();
        st.loop_mode = st.loop_mode.next();
        Ok(st.loop_mode)
    }

    /// Vacía la cola; devuelve cuántos tracks había
    pub fn clear(&self) -> Result<usize, PlayerError> {
        self.ensure_alive()?;
        let mut st = self.state.lock();
        if st.queue.is_empty() {
            return Err(PlayerError::EmptyQueue);
        }
        let cleared = st.queue.len();
        st.queue.clear();
        Ok(cleared)
    }

    /// Mezcla la cola
    pub fn shuffle(&self) -> Result<(), PlayerError> {
        self.ensure_alive()?;
        self.state.lock().queue.shuffle()
    }

    /// Elimina el track en la posición dada (1-based)
    pub fn remove_at(&self, position: usize) -> Result<Track, PlayerError> {
        self.ensure_alive()?;
        self.state.lock().queue.remove_at(position)
    }

    /// Foto del estado para los embeds de cola y "sonando ahora"
    pub fn snapshot(&self, limit: usize) -> QueueSnapshot {
        let st = self.state.lock();
        QueueSnapshot {
            current: st.current.clone(),
            upcoming: st.queue.preview(limit),
            total: st.queue.len(),
            loop_mode: st.loop_mode,
            volume_percent: (st.volume * 100.0).round() as u8,
        }
    }

    /// Destruye el reproductor desde afuera (expulsión del canal de voz)
    pub async fn destroy_now(self: &Arc<Self>) {
        let handle = self.state.lock().current_handle.take();
        if let Some(handle) = handle {
            let _ = handle.stop();
        }
        self.queue_signal.notify_one();
        self.destroy(DisconnectReason::ConnectionLost).await;
    }

    fn ensure_alive(&self) -> Result<(), PlayerError> {
        if self.is_destroyed() {
            return Err(PlayerError::Destroyed);
        }
        Ok(())
    }

    // ==== Loop de reproducción ====

    async fn run(self: Arc<Self>) {
        info!("🎧 Reproductor iniciado para guild {}", self.guild_id);
        let reason = self.run_inner().await;
        self.destroy(reason).await;
    }

    async fn run_inner(&self) -> DisconnectReason {
        loop {
            if self.should_exit() {
                return DisconnectReason::Stopped;
            }

            if !self.transport.is_connected().await {
                warn!("🔌 Conexión de voz perdida en guild {}", self.guild_id);
                return DisconnectReason::ConnectionLost;
            }

            let track = match self.select_next() {
                Some(track) => track,
                None => match self.wait_for_track().await {
                    DrainOutcome::Track(track) => track,
                    DrainOutcome::Exit => return DisconnectReason::Stopped,
                    DrainOutcome::TimedOut => {
                        info!(
                            "⏳ {} segundos sin actividad en guild {}, cerrando reproductor",
                            self.config.idle_timeout.as_secs(),
                            self.guild_id
                        );
                        return DisconnectReason::IdleTimeout;
                    }
                },
            };

            match self.play_track(&track).await {
                Ok(()) => self.after_stream_end(),
                Err(e) => {
                    if !self.transport.is_connected().await {
                        warn!(
                            "🔌 Conexión perdida durante la reproducción en guild {}",
                            self.guild_id
                        );
                        return DisconnectReason::ConnectionLost;
                    }
                    // Un track que falla no baja el reproductor: avisar y seguir
                    let reason: String = e.to_string().chars().take(50).collect();
                    warn!("⚠️ Falló la reproducción de {}: {}", track.title(), reason);
                    self.notifier.track_failed(track.title(), &reason).await;
                    self.clear_failed_track();
                }
            }
        }
    }

    /// Decide qué suena ahora según el modo de repetición
    fn select_next(&self) -> Option<Track> {
        let mut st = self.state.lock();
        if st.loop_mode == LoopMode::Track {
            if let Some(current) = st.current.clone() {
                info!("🔂 Repitiendo: {}", current.title());
                return Some(current);
            }
        }

        let track = st.queue.pop()?;
        st.current = Some(track.clone());
        Some(track)
    }

    /// Espera un track nuevo con la cola vacía
    ///
    /// El plazo se fija al entrar y no se estira con despertares que no
    /// traen nada; vencido el plazo, el reproductor se cierra.
    async fn wait_for_track(&self) -> DrainOutcome {
        let deadline = Instant::now() + self.config.idle_timeout;
        self.state.lock().lifecycle = Lifecycle::Draining;
        debug!("📭 Cola vacía en guild {}, esperando tracks", self.guild_id);

        loop {
            {
                let mut st = self.state.lock();
                if st.stopped || self.is_destroyed() {
                    return DrainOutcome::Exit;
                }
                if let Some(track) = st.queue.pop() {
                    st.current = Some(track.clone());
                    return DrainOutcome::Track(track);
                }
            }

            match timeout_at(deadline, self.queue_signal.notified()).await {
                Ok(()) => continue,
                Err(_) => return DrainOutcome::TimedOut,
            }
        }
    }

    /// Reproduce un track y espera a que termine
    ///
    /// El único punto de suspensión largo es la espera de la señal de fin;
    /// el resto son pasos cortos con chequeos de stop en el medio.
    async fn play_track(&self, track: &Track) -> anyhow::Result<()> {
        // Las URLs de stream expiran: se resuelven justo antes de sonar
        let stream_url = match track.stream_url() {
            Some(url) => url.to_string(),
            None => self.resolver.resolve_stream(track).await?,
        };

        if self.state.lock().stopped {
            return Ok(());
        }

        let volume = self.state.lock().volume;
        let (tx, rx) = oneshot::channel();
        let handle = self.transport.play(&stream_url, volume, tx).await?;

        {
            let mut st = self.state.lock();
            if st.stopped {
                // stop() llegó mientras preparábamos el stream
                let _ = handle.stop();
                return Ok(());
            }
            st.current_handle = Some(handle);
            st.lifecycle = Lifecycle::Playing;
        }

        info!("🎵 Reproduciendo en guild {}: {}", self.guild_id, track.title());
        let state = self.snapshot(10);
        self.notifier.now_playing(track, &state).await;

        match rx.await {
            Ok(StreamEnd::Finished) => {
                debug!("✅ Stream terminado: {}", track.title());
            }
            Ok(StreamEnd::Errored) => {
                warn!("⚠️ El stream terminó con error: {}", track.title());
            }
            Err(_) => {
                // El driver murió sin avisar; el chequeo de conexión del
                // loop decide si es fatal
                warn!("⚠️ Señal de fin perdida para: {}", track.title());
            }
        }
        Ok(())
    }

    /// Contabiliza el fin del stream según el modo de repetición
    fn after_stream_end(&self) {
        let mut st = self.state.lock();
        st.current_handle = None;
        if matches!(st.lifecycle, Lifecycle::Playing | Lifecycle::Paused) {
            st.lifecycle = Lifecycle::Idle;
        }

        match st.loop_mode {
            // El track queda como current y select_next lo repite
            LoopMode::Track => {}
            LoopMode::Queue => {
                if let Some(finished) = st.current.take() {
                    st.queue.requeue(finished);
                }
            }
            LoopMode::Off => {
                st.current = None;
            }
        }
    }

    /// Un track que falló no debe repetirse ni quedar como current
    fn clear_failed_track(&self) {
        let mut st = self.state.lock();
        st.current = None;
        st.current_handle = None;
        if matches!(st.lifecycle, Lifecycle::Playing | Lifecycle::Paused) {
            st.lifecycle = Lifecycle::Idle;
        }
    }

    fn should_exit(&self) -> bool {
        self.is_destroyed() || self.state.lock().stopped
    }

    /// Único camino de limpieza; corre a lo sumo una vez
    async fn destroy(self: &Arc<Self>, reason: DisconnectReason) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        // La marca va antes de desconectar para que el observer de
        // voice_state la encuentre cuando llegue el evento
        if reason.is_intentional() {
            if let Some(registry) = self.registry.upgrade() {
                registry.disconnect_intents().mark(self.guild_id);
            }
        }

        if let Err(e) = self.transport.disconnect().await {
            warn!("⚠️ Error al desconectar en guild {}: {}", self.guild_id, e);
        }

        if let Some(registry) = self.registry.upgrade() {
            registry.remove_player(self);
        }

        {
            let mut st = self.state.lock();
            st.queue.clear();
            st.current = None;
            st.current_handle = None;
            st.lifecycle = Lifecycle::Destroyed;
        }
        self.queue_signal.notify_one();
        info!("💀 Reproductor destruido en guild {} ({:?})", self.guild_id, reason);
    }
}
