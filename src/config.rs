//! Server configuration
//!
//! Every option is a command-line flag that can also be set through the
//! environment. Directory defaults depend on the runtime mode.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::api::assets::{AssetConfig, Collection};
use crate::types::{StabilityWindow, WatchedResource};

const PRODUCTION_ROOT: &str = "/var/www/allsky";
const DEVELOPMENT_ROOT: &str = "public";

/// Selects directory defaults and the default log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RuntimeMode {
    Development,
    Production,
}

impl RuntimeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    fn default_dir(&self, name: &str) -> PathBuf {
        match self {
            Self::Development if name == "images" => PathBuf::from(DEVELOPMENT_ROOT),
            Self::Development => Path::new(DEVELOPMENT_ROOT).join(name),
            Self::Production => Path::new(PRODUCTION_ROOT).join(name),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "allsky-server")]
#[command(about = "Live image server for an all-sky camera")]
#[command(version)]
pub struct Config {
    /// Runtime mode
    #[arg(long, env = "ALLSKY_ENV", value_enum, default_value = "development")]
    pub mode: RuntimeMode,

    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Directory holding the live image (default depends on mode)
    #[arg(long, env = "ALLSKY_IMAGE_DIR")]
    pub image_dir: Option<PathBuf>,

    /// File name of the live image inside the image directory
    #[arg(long, env = "ALLSKY_IMAGE_NAME", default_value = "latest.jpg")]
    pub image_name: String,

    /// Served in place of a stale image
    #[arg(long, env = "ALLSKY_OFFLINE_IMAGE", default_value = "public/offline.jpg")]
    pub offline_image: PathBuf,

    /// Timelapse videos (default depends on mode)
    #[arg(long, env = "ALLSKY_VIDEOS_DIR")]
    pub videos_dir: Option<PathBuf>,

    /// Keograms (default depends on mode)
    #[arg(long, env = "ALLSKY_KEOGRAMS_DIR")]
    pub keograms_dir: Option<PathBuf>,

    /// Front-end files served for every other path
    #[arg(long, env = "ALLSKY_STATIC_DIR", default_value = "public")]
    pub static_dir: PathBuf,

    /// Image age in seconds after which the offline image is served
    #[arg(long, env = "ALLSKY_STALE_AFTER_SECS", default_value_t = 600)]
    pub stale_after_secs: u64,

    /// Quiet period in milliseconds before a write counts as finished
    #[arg(long, env = "ALLSKY_STABILITY_MS", default_value_t = 2000)]
    pub stability_ms: u64,

    /// How often pending writes are re-examined, in milliseconds
    #[arg(long, env = "ALLSKY_POLL_MS", default_value_t = 100)]
    pub poll_ms: u64,
}

impl Config {
    /// Host and port to bind, resolved by the listener
    pub fn listen_addr(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }

    pub fn image_dir(&self) -> PathBuf {
        self.image_dir
            .clone()
            .unwrap_or_else(|| self.mode.default_dir("images"))
    }

    pub fn image_path(&self) -> PathBuf {
        self.image_dir().join(&self.image_name)
    }

    pub fn asset_config(&self) -> AssetConfig {
        let videos = self
            .videos_dir
            .clone()
            .unwrap_or_else(|| self.mode.default_dir("videos"));
        let keograms = self
            .keograms_dir
            .clone()
            .unwrap_or_else(|| self.mode.default_dir("keograms"));

        AssetConfig {
            image_dir: self.image_dir(),
            offline_image: self.offline_image.clone(),
            stale_after: Duration::from_secs(self.stale_after_secs),
            collections: vec![
                Collection::new("videos", videos),
                Collection::new("keograms", keograms),
            ],
            static_dir: self.static_dir.clone(),
        }
    }

    /// The live image, with the configured stability window
    pub fn watched_resource(&self) -> WatchedResource {
        WatchedResource::file(self.image_path()).with_window(StabilityWindow {
            threshold: Duration::from_millis(self.stability_ms),
            poll_interval: Duration::from_millis(self.poll_ms),
        })
    }

    /// Filter used when `RUST_LOG` is unset
    pub fn default_log_filter(&self) -> &'static str {
        match self.mode {
            RuntimeMode::Development => "allsky_live=debug,allsky_server=debug,tower_http=info",
            RuntimeMode::Production => "allsky_live=info,allsky_server=info,tower_http=info",
        }
    }
}
