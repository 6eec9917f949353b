use anyhow::Result;
use std::time::Duration;

use crate::audio::player::PlayerConfig;

/// Configuración del bot, cargada desde variables de entorno
#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: Option<u64>,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Spotify (opcional, ambas o ninguna)
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,

    // Reproducción
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub idle_timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN no está definido"))?,
            application_id: std::env::var("APPLICATION_ID")
                .ok()
                .and_then(|s| s.parse().ok()),
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Spotify
            spotify_client_id: non_empty_var("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: non_empty_var("SPOTIFY_CLIENT_SECRET"),

            // Reproducción
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            idle_timeout_secs: std::env::var("IDLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Revisa los valores antes de arrancar, para fallar acá y no a mitad de
    /// una reproducción
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN está vacío");
        }

        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!(
                "DEFAULT_VOLUME debe estar entre 0.0 y 1.0, se recibió: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("MAX_QUEUE_SIZE debe ser mayor que 0");
        }

        if self.idle_timeout_secs == 0 {
            anyhow::bail!("IDLE_TIMEOUT_SECS debe ser mayor que 0");
        }

        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            anyhow::bail!("SPOTIFY_CLIENT_ID y SPOTIFY_CLIENT_SECRET deben definirse juntos");
        }

        Ok(())
    }

    /// Parámetros que los reproductores toman de la configuración
    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            max_queue_size: self.max_queue_size,
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            default_volume: self.default_volume,
        }
    }

    /// Resumen apto para logs: sin token ni secretos
    pub fn summary(&self) -> String {
        format!(
            "Config: guild={}, spotify={}, vol={}%, cola máx={}, timeout={}s",
            self.guild_id
                .map_or("global".to_string(), |id| id.to_string()),
            if self.spotify_client_id.is_some() {
                "sí"
            } else {
                "no"
            },
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.idle_timeout_secs
        )
    }
}

/// Lee una variable tratando vacío y espacios como ausente
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base_config() -> Config {
        Config {
            discord_token: "token-de-prueba".to_string(),
            application_id: None,
            guild_id: None,
            spotify_client_id: None,
            spotify_client_secret: None,
            default_volume: 0.5,
            max_queue_size: 100,
            idle_timeout_secs: 300,
        }
    }

    #[test]
    fn test_valid_config_passes_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_volume_out_of_range_is_rejected() {
        let mut config = base_config();
        config.default_volume = 1.5;
        assert!(config.validate().is_err());

        config.default_volume = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spotify_credentials_must_come_in_pairs() {
        let mut config = base_config();
        config.spotify_client_id = Some("id".to_string());
        assert!(config.validate().is_err());

        config.spotify_client_secret = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_player_config_derivation() {
        let mut config = base_config();
        config.max_queue_size = 25;
        config.idle_timeout_secs = 60;
        config.default_volume = 0.8;

        let player_config = config.player_config();
        assert_eq!(player_config.max_queue_size, 25);
        assert_eq!(player_config.idle_timeout, Duration::from_secs(60));
        assert_eq!(player_config.default_volume, 0.8);
    }
}
