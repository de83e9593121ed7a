//! npc-wire-probe binary
//!
//! Spawns one demo actor against an in-memory observer, runs a short
//! scripted sequence and prints every outbound frame. With `--classify` it
//! instead decodes one hex-encoded inbound frame.
//!
//! ## Configuration (env / TOML via `config` crate)
//!
//! | Key                                  | Default     | Description                       |
//! |--------------------------------------|-------------|-----------------------------------|
//! | `NPC_WIRE_PROTOCOL`                  | `1.9`       | Wire protocol spoken              |
//! | `NPC_WIRE_ENTITY_ID_BASE`            | `536870912` | First entity id handed out        |
//! | `NPC_WIRE_LISTING_REMOVAL_DELAY_TICKS` | `2`       | Ticks before unlisting            |
//! | `NPC_WIRE_FAN_OUT`                   | `broadcast` | `broadcast` or `targeted`         |
//! | `NPC_WIRE_SKIN__TIMEOUT_MS`          | `5000`      | Skin lookup timeout               |
//!
//! CLI flags override both.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use npc_wire::{
    interceptor::classify_use_entity, ActorBuilder, Animation, Engine, EngineConfig, FanOut,
    Packet, Pose, ProtocolVersion, RecordingObserver, Status,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "npc-wire-probe", about = "NPC wire protocol probe", version)]
struct Args {
    /// Optional TOML config file
    #[arg(long, env = "NPC_WIRE_CONFIG")]
    config: Option<String>,

    /// Protocol version (1.8, 1.9.4, 1.14, v1_9_R2, 498, …)
    #[arg(long)]
    protocol: Option<String>,

    /// Interaction fan-out (broadcast | targeted)
    #[arg(long)]
    fan_out: Option<FanOut>,

    /// Display name of the demo actor
    #[arg(long, default_value = "Probe")]
    name: String,

    /// Resolve and apply the skin worn by this account
    #[arg(long)]
    skin: Option<String>,

    /// Drop the actor from the player list after spawning
    #[arg(long)]
    unlisted: bool,

    /// Print frames as JSON lines
    #[arg(long)]
    json: bool,

    /// Classify one hex-encoded inbound frame and exit
    #[arg(long)]
    classify: Option<String>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct FrameDump {
    kind: String,
    id: i32,
    hex: String,
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn from_hex(s: &str) -> Result<Vec<u8>> {
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if s.len() % 2 != 0 {
        return Err(anyhow!("odd number of hex digits"));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).with_context(|| format!("bad hex at {}", i)))
        .collect()
}

fn print_frames(packets: &[Packet], json: bool) -> Result<()> {
    for packet in packets {
        let dump = FrameDump {
            kind: format!("{:?}", packet.kind),
            id: packet.id,
            hex: to_hex(&packet.encode()),
        };
        if json {
            println!("{}", serde_json::to_string(&dump)?);
        } else {
            println!("{:<16} {:#04x} {}", dump.kind, dump.id, dump.hex);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = &args.config {
        builder = builder.add_source(config::File::with_name(path).required(false));
    }
    let mut engine_config: EngineConfig = builder
        .add_source(
            config::Environment::with_prefix("NPC_WIRE")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .context("loading configuration")?
        .try_deserialize()
        .context("parsing configuration")?;

    if let Some(protocol) = &args.protocol {
        engine_config.protocol = protocol.parse::<ProtocolVersion>()?;
    }
    if let Some(fan_out) = args.fan_out {
        engine_config.fan_out = fan_out;
    }
    Ok(engine_config)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("npc_wire=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    if let Some(hex) = &args.classify {
        let frame = from_hex(hex)?;
        let use_entity_id = npc_wire::catalog::Catalog::for_version(config.protocol)
            .use_entity_id()?;
        match classify_use_entity(use_entity_id, &frame) {
            Ok(Some((kind, target))) => println!("{:?} target={}", kind, target),
            Ok(None) => println!("not an interaction"),
            Err(e) => println!("malformed: {}", e),
        }
        return Ok(());
    }

    tracing::info!(
        "Starting npc-wire-probe (protocol={}, fan_out={:?})",
        config.protocol,
        config.fan_out
    );

    let engine = Engine::new(config);
    let driver = engine.start_scheduler();
    let observer = Arc::new(RecordingObserver::new(
        "observer",
        Pose::new("world", 3.0, 64.0, 5.0, 0.0, 0.0),
    ));

    let start = Pose::new("world", 0.5, 64.0, 0.5, 45.0, 0.0);
    let mut actor = ActorBuilder::new(args.name.clone(), start)
        .listed(!args.unlisted)
        .build(engine.clone(), observer.clone());

    actor.spawn().context("spawn")?;
    actor.rotate_head(90.0, -10.0).context("rotate_head")?;
    actor
        .play_animation(Animation::SwingMainArm)
        .context("play_animation")?;
    actor.play_status(Status::TakeDamage).context("play_status")?;
    actor.sneak(true).context("sneak")?;
    actor
        .teleport(Pose::new("world", 10.0, 65.0, -4.5, 180.0, 0.0), true)
        .context("teleport")?;
    actor.focus_observer().context("focus_observer")?;
    if let Some(owner) = &args.skin {
        let changed = actor.set_skin(owner).await?;
        tracing::info!("skin of '{}' applied: {}", owner, changed);
    }

    // Let the deferred listing removal fire, with a spare tick.
    let ticks = engine.config().listing_removal_delay_ticks + 2;
    let tick_secs = 1.0 / engine.config().tick_rate_hz.max(1.0);
    tokio::time::sleep(Duration::from_secs_f32(ticks as f32 * tick_secs)).await;
    actor.destroy().context("destroy")?;
    driver.abort();

    print_frames(&observer.drain(), args.json)
}
