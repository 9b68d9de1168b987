use color_eyre::{eyre::eyre, Result};
use mqttkeypad::config::{KeypadConfig, SurfaceDriver};
use mqttkeypad::controller::ControlLoop;
use mqttkeypad::keypad::{HeadlessSurface, KeySurface, KeypadBoard, RgbKeypad};
use mqttkeypad::mapping::ColorPolicy;
use mqttkeypad::mqtt::{MqttHandler, SessionManager};
use mqttkeypad::network::HostLink;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let apply_debug_mode = setup()?;

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(KeypadConfig::default_path);
    let config = KeypadConfig::load_or_init(&path).await?;
    apply_debug_mode(config.debug_mode)?;
    info!("Loaded configuration from {}", path.display());

    // Misconfigured color tables are fatal here, never at runtime
    let policy = ColorPolicy::from_config(&config.colors)?;

    let surface = open_surface(&config)?;
    let mut link = HostLink::new(config.mqtt.host.clone(), config.mqtt.port);
    let board = KeypadBoard::create(surface, config.keypad.idle_color)
        .wait_for_link(&mut link, config.timing.link_poll())
        .await?;

    let session = SessionManager::new(MqttHandler::default(), config.mqtt.clone());
    let mut control = ControlLoop::new(session, board, policy, &config);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        shutdown.cancel();
    });

    tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        _ = control.connect_until_ready() => {}
    }

    control
        .run(cancel)
        .await
        .map_err(|e| eyre!("Control loop stopped with error: {}", e))
}

fn open_surface(config: &KeypadConfig) -> Result<Box<dyn KeySurface>> {
    match config.keypad.driver {
        SurfaceDriver::RgbKeypad => {
            let keypad = RgbKeypad::open(&config.keypad.rgb_keypad_settings())?;
            Ok(Box::new(keypad))
        }
        SurfaceDriver::Headless => {
            warn!("Running without keypad hardware");
            Ok(Box::new(HeadlessSurface::new(config.keypad.grid())))
        }
    }
}

fn setup() -> Result<impl FnOnce(bool) -> Result<()>> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(setup_logging_env())
}

// Logs at INFO until the config is read; `debug_mode` then raises the level
fn setup_logging_env() -> impl FnOnce(bool) -> Result<()> {
    let builder = FmtSubscriber::builder()
        .with_max_level(LevelFilter::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .with_filter_reloading();
    let handle = builder.reload_handle();
    builder.init();

    move |debug_mode| {
        if debug_mode {
            handle.modify(|filter| *filter = LevelFilter::DEBUG)?;
        }
        Ok(())
    }
}
