// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use clipplayer::{audio, clips, config, player::Player, trigger, util};

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=trigger driven clip player
After=sound.target

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/clipplayer
ExecStart=/usr/local/bin/clipplayer start "$CLIPPLAYER_CONFIG"

[Install]
WantedBy=multi-user.target
Alias=clipplayer.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A trigger driven clip player for installations."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {
        /// Only list devices whose name contains this string.
        filter: Option<String>,
    },
    /// Lists and verifies all clips in the given directory.
    Clips {
        /// The path to the clip directory.
        path: String,
        /// The clip file extension.
        #[arg(short, long, default_value = "mp3")]
        extension: String,
        /// The sample rate clips are converted to.
        #[arg(short, long, default_value_t = 48000)]
        sample_rate: u32,
    },
    /// Starts the player.
    Start {
        /// The path to the player config.
        config_path: String,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices { filter } => {
            let devices: Vec<_> = audio::list_devices()?
                .into_iter()
                .filter(|device| {
                    filter
                        .as_deref()
                        .map_or(true, |filter| device.name().contains(filter))
                })
                .collect();

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Clips {
            path,
            extension,
            sample_rate,
        } => {
            let library = clips::load_library(&PathBuf::from(&path), &extension, sample_rate)?;

            println!(
                "Triggers (count: {}, clips: {}):",
                library.keys().len(),
                library.clip_count()
            );
            for key in library.keys() {
                println!("- {}", key);
                for clip in library.clips(key).unwrap_or_default() {
                    println!(
                        "  - {} ({})",
                        clip.name(),
                        util::duration_minutes_seconds(clip.duration())
                    );
                }
            }
        }
        Commands::Start { config_path } => {
            let config = config::Player::deserialize(&PathBuf::from(config_path))?;
            let driver = trigger::driver(config.triggers())?;
            let mut player = Player::new(&config, driver)?;

            let interrupted = tokio::select! {
                result = player.join() => {
                    result?;
                    false
                }
                result = tokio::signal::ctrl_c() => {
                    result?;
                    true
                }
            };
            if interrupted {
                info!(status = %player.status(), "Interrupted, stopping.");
                player.stop();
                player.join().await?;
            }
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}
