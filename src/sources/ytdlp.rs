use async_trait::async_trait;
use serde::Deserialize;
use serenity::model::id::UserId;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use super::{Resolved, ResolveError, Track, TrackResolver};

/// Procesos yt-dlp simultáneos como máximo
const MAX_CONCURRENT_PROCESSES: usize = 3;

/// Flags comunes a toda invocación de yt-dlp
const BASE_ARGS: &[&str] = &[
    "--quiet",
    "--no-warnings",
    "--no-check-certificates",
    "--socket-timeout",
    "15",
    "--retries",
    "2",
];

/// Resolución vía el binario yt-dlp
///
/// Toda la extracción pasa por procesos yt-dlp acotados por un semáforo:
/// un aluvión de /play no puede llenar la máquina de procesos.
pub struct YtDlpResolver {
    process_slots: Semaphore,
}

impl YtDlpResolver {
    pub fn new() -> Self {
        Self {
            process_slots: Semaphore::new(MAX_CONCURRENT_PROCESSES),
        }
    }

    async fn run_ytdlp(&self, args: &[&str]) -> Result<String, ResolveError> {
        let _permit = self
            .process_slots
            .acquire()
            .await
            .map_err(|_| ResolveError::Extraction("el límite de procesos fue cerrado".to_string()))?;

        debug!("🎬 Ejecutando: yt-dlp {}", args.join(" "));
        let output = Command::new("yt-dlp")
            .args(BASE_ARGS)
            .args(args)
            .output()
            .await
            .map_err(|e| ResolveError::Extraction(format!("no se pudo ejecutar yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("⚠️ yt-dlp terminó con error: {}", stderr.trim());
            return Err(classify_failure(&stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, input: &str, requested_by: UserId) -> Result<Resolved, ResolveError> {
        match classify_input(input) {
            InputKind::VideoUrl => {
                let json = self
                    .run_ytdlp(&["--dump-json", "--no-playlist", input])
                    .await?;
                let track = parse_single(&json, requested_by)?;
                info!("🎵 Track resuelto: {}", track.title());
                Ok(Resolved::Track(track))
            }
            InputKind::PlaylistUrl => {
                let output = self
                    .run_ytdlp(&["--dump-json", "--flat-playlist", input])
                    .await?;
                let resolved = parse_playlist(&output, input, requested_by)?;
                if let Resolved::Playlist { name, tracks } = &resolved {
                    info!("🎵 Playlist «{}» extraída con {} tracks", name, tracks.len());
                }
                Ok(resolved)
            }
            InputKind::Search => {
                info!("🔍 Buscando: {}", input);
                let search = format!("ytsearch1:{input}");
                let json = self
                    .run_ytdlp(&["--dump-json", "--no-playlist", &search])
                    .await?;
                if json.trim().is_empty() {
                    return Err(ResolveError::NoResults(input.to_string()));
                }
                let track = parse_single(&json, requested_by)?;
                info!("🔍 Encontrado: {}", track.title());
                Ok(Resolved::Track(track))
            }
            InputKind::OtherUrl => Err(ResolveError::UnsupportedUrl(input.to_string())),
        }
    }

    async fn resolve_stream(&self, track: &Track) -> Result<String, ResolveError> {
        let output = self
            .run_ytdlp(&["-f", "bestaudio/best", "--no-playlist", "--get-url", track.url()])
            .await?;

        output
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ResolveError::Extraction(format!("yt-dlp no devolvió URL de stream para {}", track.url()))
            })
    }
}

/// Qué hacer con lo que escribió el usuario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    /// URL de un video suelto
    VideoUrl,
    /// URL de playlist, o de video dentro de una playlist
    PlaylistUrl,
    /// URL de un dominio que no manejamos
    OtherUrl,
    /// Texto libre: búsqueda en YouTube
    Search,
}

fn classify_input(input: &str) -> InputKind {
    let trimmed = input.trim();

    let parsed = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Url::parse(trimmed).ok()
    } else if trimmed.starts_with("www.")
        || trimmed.starts_with("youtube.com")
        || trimmed.starts_with("music.youtube.com")
        || trimmed.starts_with("youtu.be")
    {
        // Los usuarios pegan URLs sin esquema todo el tiempo
        Url::parse(&format!("https://{trimmed}")).ok()
    } else {
        None
    };

    let Some(url) = parsed else {
        return InputKind::Search;
    };

    let host = url
        .host_str()
        .unwrap_or_default()
        .trim_start_matches("www.");

    match host {
        "youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtu.be" => {
            let has_list = url.query_pairs().any(|(key, _)| key == "list");
            if url.path() == "/playlist" || has_list {
                InputKind::PlaylistUrl
            } else {
                InputKind::VideoUrl
            }
        }
        _ => InputKind::OtherUrl,
    }
}

/// Subconjunto del JSON de `yt-dlp --dump-json` que nos interesa
#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    title: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    uploader: Option<String>,
    playlist_title: Option<String>,
}

impl YtDlpEntry {
    fn into_track(self, requested_by: UserId) -> Result<Track, ResolveError> {
        let title = self.title.unwrap_or_else(|| "Desconocido".to_string());
        let url = self
            .webpage_url
            .or(self.url)
            .ok_or_else(|| ResolveError::Extraction(format!("entrada sin URL: {title}")))?;

        let mut track = Track::new(title, url, requested_by);
        if let Some(secs) = self.duration.filter(|d| d.is_finite() && *d > 0.0) {
            track = track.with_duration(Duration::from_secs_f64(secs));
        }
        if let Some(thumbnail) = self.thumbnail {
            track = track.with_thumbnail(thumbnail);
        }
        if let Some(uploader) = self.uploader {
            track = track.with_uploader(uploader);
        }
        Ok(track)
    }
}

fn parse_single(json: &str, requested_by: UserId) -> Result<Track, ResolveError> {
    let line = json
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| ResolveError::Extraction("yt-dlp no devolvió información".to_string()))?;

    let entry: YtDlpEntry = serde_json::from_str(line)
        .map_err(|e| ResolveError::Extraction(format!("JSON inválido de yt-dlp: {e}")))?;
    entry.into_track(requested_by)
}

fn parse_playlist(
    output: &str,
    source_url: &str,
    requested_by: UserId,
) -> Result<Resolved, ResolveError> {
    let mut name = None;
    let mut tracks = Vec::new();

    for line in output.lines().filter(|line| !line.trim().is_empty()) {
        let entry: YtDlpEntry = match serde_json::from_str(line) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("⚠️ Entrada de playlist ilegible, se omite: {}", e);
                continue;
            }
        };

        if name.is_none() {
            name = entry.playlist_title.clone();
        }
        match entry.into_track(requested_by) {
            Ok(track) => tracks.push(track),
            Err(e) => warn!("⚠️ Entrada de playlist descartada: {}", e),
        }
    }

    if tracks.is_empty() {
        return Err(ResolveError::NoResults(source_url.to_string()));
    }

    Ok(Resolved::Playlist {
        name: name.unwrap_or_else(|| "Playlist".to_string()),
        tracks,
    })
}

fn classify_failure(stderr: &str) -> ResolveError {
    let detail = stderr
        .lines()
        .rev()
        .find(|line| line.contains("ERROR"))
        .or_else(|| stderr.lines().last())
        .unwrap_or("yt-dlp falló sin detalle")
        .trim()
        .to_string();

    if stderr.contains("Video unavailable")
        || stderr.contains("Private video")
        || stderr.contains("This video is not available")
        || stderr.contains("members-only")
    {
        ResolveError::Unavailable(detail)
    } else if stderr.contains("HTTP Error")
        || stderr.contains("Unable to download")
        || stderr.contains("timed out")
        || stderr.contains("Temporary failure in name resolution")
    {
        ResolveError::Network(detail)
    } else {
        ResolveError::Extraction(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user() -> UserId {
        UserId::new(42)
    }

    #[test]
    fn test_classify_input_video_urls() {
        assert_eq!(
            classify_input("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            InputKind::VideoUrl
        );
        assert_eq!(
            classify_input("https://youtu.be/dQw4w9WgXcQ"),
            InputKind::VideoUrl
        );
        assert_eq!(
            classify_input("https://music.youtube.com/watch?v=abc123"),
            InputKind::VideoUrl
        );
        // Sin esquema también cuenta
        assert_eq!(
            classify_input("www.youtube.com/watch?v=dQw4w9WgXcQ"),
            InputKind::VideoUrl
        );
    }

    #[test]
    fn test_classify_input_playlist_urls() {
        assert_eq!(
            classify_input("https://www.youtube.com/playlist?list=PLabc"),
            InputKind::PlaylistUrl
        );
        // Video dentro de una playlist: se encola la playlist entera
        assert_eq!(
            classify_input("https://www.youtube.com/watch?v=abc&list=PLabc"),
            InputKind::PlaylistUrl
        );
    }

    #[test]
    fn test_classify_input_foreign_and_search() {
        assert_eq!(
            classify_input("https://vimeo.com/12345"),
            InputKind::OtherUrl
        );
        assert_eq!(classify_input("never gonna give you up"), InputKind::Search);
        assert_eq!(classify_input("  rick astley  "), InputKind::Search);
    }

    #[test]
    fn test_parse_single_maps_fields() {
        let json = r#"{
            "title": "Never Gonna Give You Up",
            "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "url": "https://cdn.example/audio",
            "duration": 212.5,
            "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hq720.jpg",
            "uploader": "Rick Astley"
        }"#;

        let track = parse_single(json, user()).unwrap();
        assert_eq!(track.title(), "Never Gonna Give You Up");
        // webpage_url tiene prioridad sobre url
        assert_eq!(track.url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(track.duration(), Some(Duration::from_secs_f64(212.5)));
        assert_eq!(track.uploader(), Some("Rick Astley"));
        assert_eq!(track.requested_by(), user());
    }

    #[test]
    fn test_parse_single_defaults_and_errors() {
        let without_title = r#"{"webpage_url": "https://youtu.be/abc"}"#;
        let track = parse_single(without_title, user()).unwrap();
        assert_eq!(track.title(), "Desconocido");
        assert_eq!(track.duration(), None);

        let without_url = r#"{"title": "Huérfana"}"#;
        assert!(matches!(
            parse_single(without_url, user()),
            Err(ResolveError::Extraction(_))
        ));

        assert!(matches!(
            parse_single("esto no es json", user()),
            Err(ResolveError::Extraction(_))
        ));
    }

    #[test]
    fn test_parse_single_ignores_bogus_duration() {
        let json = r#"{"title": "En vivo", "webpage_url": "https://youtu.be/live", "duration": -1.0}"#;
        let track = parse_single(json, user()).unwrap();
        assert_eq!(track.duration(), None);
    }

    #[test]
    fn test_parse_playlist_collects_entries_and_name() {
        let output = concat!(
            r#"{"title": "Uno", "url": "https://youtu.be/a", "playlist_title": "Mis temas"}"#,
            "\n",
            "esto no parsea\n",
            r#"{"title": "Dos", "url": "https://youtu.be/b", "playlist_title": "Mis temas"}"#,
            "\n",
        );

        let resolved = parse_playlist(output, "https://youtube.com/playlist?list=x", user()).unwrap();
        match resolved {
            Resolved::Playlist { name, tracks } => {
                assert_eq!(name, "Mis temas");
                assert_eq!(tracks.len(), 2);
                assert_eq!(tracks[0].title(), "Uno");
                assert_eq!(tracks[1].url(), "https://youtu.be/b");
            }
            Resolved::Track(_) => panic!("debería ser una playlist"),
        }
    }

    #[test]
    fn test_parse_playlist_empty_is_no_results() {
        assert!(matches!(
            parse_playlist("", "https://youtube.com/playlist?list=x", user()),
            Err(ResolveError::NoResults(_))
        ));
    }

    #[test]
    fn test_classify_failure_variants() {
        assert!(matches!(
            classify_failure("ERROR: [youtube] abc: Video unavailable"),
            ResolveError::Unavailable(_)
        ));
        assert!(matches!(
            classify_failure("ERROR: unable to download video data: HTTP Error 403"),
            ResolveError::Network(_)
        ));
        assert!(matches!(
            classify_failure("ERROR: algo inesperado"),
            ResolveError::Extraction(_)
        ));
    }
}
