pub mod spotify;
pub mod ytdlp;

use async_trait::async_trait;
use serenity::model::id::UserId;
use std::time::Duration;
use thiserror::Error;

pub use spotify::SpotifyClient;
pub use ytdlp::YtDlpResolver;

/// Errores al convertir la entrada del usuario en tracks reproducibles
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No se encontraron resultados para: {0}")]
    NoResults(String),

    #[error("El contenido no está disponible: {0}")]
    Unavailable(String),

    #[error("URL no soportada: {0}")]
    UnsupportedUrl(String),

    #[error("Fallo al extraer información: {0}")]
    Extraction(String),

    #[error("Error de red: {0}")]
    Network(String),
}

/// Resultado de resolver una entrada del usuario
#[derive(Debug, Clone)]
pub enum Resolved {
    /// Un único track listo para encolar
    Track(Track),
    /// Una playlist con nombre y sus tracks
    Playlist { name: String, tracks: Vec<Track> },
}

/// Trait común para resolver entradas del usuario en tracks
///
/// La resolución ocurre en dos fases: `resolve` convierte texto (URL o
/// búsqueda) en metadatos encolables, y `resolve_stream` obtiene la URL de
/// audio justo antes de reproducir, porque las URLs de stream expiran.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resuelve una URL o término de búsqueda en tracks encolables
    async fn resolve(&self, input: &str, requested_by: UserId) -> Result<Resolved, ResolveError>;

    /// Obtiene la URL de audio reproducible para un track ya encolado
    async fn resolve_stream(&self, track: &Track) -> Result<String, ResolveError>;
}

/// Representa un track de música en la cola
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    title: String,
    url: String,
    stream_url: Option<String>,
    duration: Option<Duration>,
    thumbnail: Option<String>,
    uploader: Option<String>,
    requested_by: UserId,
}

impl Track {
    pub fn new(title: String, url: String, requested_by: UserId) -> Self {
        Self {
            title,
            url,
            stream_url: None,
            duration: None,
            thumbnail: None,
            uploader: None,
            requested_by,
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn stream_url(&self) -> Option<&str> {
        self.stream_url.as_deref()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn uploader(&self) -> Option<&str> {
        self.uploader.as_deref()
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }

    // Setters
    pub fn with_stream_url(mut self, stream_url: String) -> Self {
        self.stream_url = Some(stream_url);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: String) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    pub fn with_uploader(mut self, uploader: String) -> Self {
        self.uploader = Some(uploader);
        self
    }
}
