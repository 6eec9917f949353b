use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::ResolveError;

const API_TIMEOUT: Duration = Duration::from_secs(15);

/// Cliente de la Web API de Spotify con client credentials
///
/// Spotify no sirve audio por API: acá solo se traducen sus links a
/// búsquedas "artista - título" que después resuelve YouTube.
pub struct SpotifyClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
    url_pattern: Regex,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpotifyKind {
    Track,
    Playlist,
    Album,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            client_id,
            client_secret,
            token: Mutex::new(None),
            url_pattern: Regex::new(
                r"spotify\.com/(?:intl-[a-zA-Z-]+/)?(track|playlist|album)/([a-zA-Z0-9]+)",
            )?,
        })
    }

    pub fn is_spotify_url(input: &str) -> bool {
        input.contains("spotify.com")
    }

    /// Convierte un link de Spotify en búsquedas para YouTube
    ///
    /// Un track produce una búsqueda; playlists y álbumes producen una por
    /// canción.
    pub async fn to_search_queries(&self, url: &str) -> Result<Vec<String>, ResolveError> {
        let (kind, id) = self
            .parse_url(url)
            .ok_or_else(|| ResolveError::UnsupportedUrl(url.to_string()))?;

        let queries = match kind {
            SpotifyKind::Track => vec![self.track_query(&id).await?],
            SpotifyKind::Playlist => self.playlist_queries(&id).await?,
            SpotifyKind::Album => self.album_queries(&id).await?,
        };

        if queries.is_empty() {
            return Err(ResolveError::NoResults(url.to_string()));
        }
        info!("🎶 Spotify: {} búsquedas desde un link de {:?}", queries.len(), kind);
        Ok(queries)
    }

    fn parse_url(&self, url: &str) -> Option<(SpotifyKind, String)> {
        let captures = self.url_pattern.captures(url)?;
        let kind = match captures.get(1)?.as_str() {
            "track" => SpotifyKind::Track,
            "playlist" => SpotifyKind::Playlist,
            "album" => SpotifyKind::Album,
            _ => return None,
        };
        Some((kind, captures.get(2)?.as_str().to_string()))
    }

    async fn track_query(&self, track_id: &str) -> Result<String, ResolveError> {
        let track: ApiTrack = self
            .api_get(&format!("https://api.spotify.com/v1/tracks/{track_id}"))
            .await?;
        Ok(search_query(&track))
    }

    async fn playlist_queries(&self, playlist_id: &str) -> Result<Vec<String>, ResolveError> {
        let mut queries = Vec::new();
        let mut next = Some(format!(
            "https://api.spotify.com/v1/playlists/{playlist_id}/tracks?fields=items(track(name,artists(name))),next&limit=100"
        ));

        // El API pagina de a 100; `next` trae la URL de la página siguiente
        while let Some(url) = next {
            let page: PlaylistPage = self.api_get(&url).await?;
            for item in page.items {
                if let Some(track) = item.track {
                    queries.push(search_query(&track));
                }
            }
            next = page.next;
        }
        Ok(queries)
    }

    async fn album_queries(&self, album_id: &str) -> Result<Vec<String>, ResolveError> {
        let album: AlbumResponse = self
            .api_get(&format!("https://api.spotify.com/v1/albums/{album_id}"))
            .await?;
        Ok(album.tracks.items.iter().map(search_query).collect())
    }

    async fn api_get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ResolveError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .timeout(API_TIMEOUT)
            .send()
            .await
            .map_err(|e| ResolveError::Network(format!("Spotify no responde: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ResolveError::Unavailable(
                "el contenido de Spotify no existe o es privado".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(ResolveError::Network(format!("Spotify respondió {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ResolveError::Extraction(format!("respuesta de Spotify ilegible: {e}")))
    }

    async fn access_token(&self) -> Result<String, ResolveError> {
        {
            let cached = self.token.lock();
            if let Some(token) = cached.as_ref() {
                if Instant::now() < token.expires_at {
                    return Ok(token.access_token.clone());
                }
            }
        }

        debug!("🔑 Renovando token de Spotify");
        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = self
            .http
            .post("https://accounts.spotify.com/api/token")
            .header("Authorization", format!("Basic {credentials}"))
            .form(&[("grant_type", "client_credentials")])
            .timeout(API_TIMEOUT)
            .send()
            .await
            .map_err(|e| ResolveError::Network(format!("token de Spotify: {e}")))?;

        if !response.status().is_success() {
            return Err(ResolveError::Network(format!(
                "Spotify rechazó las credenciales: {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ResolveError::Extraction(format!("token de Spotify ilegible: {e}")))?;

        let access = token.access_token.clone();
        *self.token.lock() = Some(CachedToken {
            access_token: token.access_token,
            // Renovar un minuto antes del vencimiento real
            expires_at: Instant::now() + Duration::from_secs(token.expires_in.saturating_sub(60)),
        });
        Ok(access)
    }
}

fn search_query(track: &ApiTrack) -> String {
    match track.artists.first() {
        Some(artist) => format!("{} - {}", artist.name, track.name),
        None => track.name.clone(),
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    name: String,
    artists: Vec<ApiArtist>,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistPage {
    items: Vec<PlaylistItem>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct AlbumResponse {
    tracks: AlbumTracks,
}

#[derive(Debug, Deserialize)]
struct AlbumTracks {
    items: Vec<ApiTrack>,
}
