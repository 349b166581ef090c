//! Scene demo: a small fleet built on shared cached assets
//!
//! Frigates drift forward with escorts orbiting them as children. Escorts
//! expire after a random lifetime, and the demo logs world positions and
//! cache statistics as nodes come and go.
//!
//! Usage: `scene_demo [config.toml|config.ron]`

use rand::Rng;
use scene_engine::foundation::logging;
use scene_engine::prelude::*;
use thiserror::Error;

const NUM_FRIGATES: usize = 2;
const ESCORTS_PER_FRIGATE: usize = 4;
const FRIGATE_SPEED: f32 = 5.0;
const FRIGATE_SPACING: f32 = 30.0;
const ESCORT_ORBIT_RADIUS: f32 = 8.0;
const FRAMES: u32 = 240;
const DELTA_TIME: f32 = 1.0 / 60.0;
const REPORT_EVERY: u32 = 60;

#[derive(Debug, Error)]
enum DemoError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("scene setup failed: {0}")]
    Scene(#[from] scene_engine::scene::SceneError),
}

struct Fleet {
    frigates: Vec<NodeKey>,
    camera: NodeKey,
}

fn main() {
    let config_path = std::env::args().nth(1);
    let config = match config_path.as_deref().map(EngineConfig::load_from_file) {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            eprintln!("Failed to load config: {e}. Using defaults.");
            EngineConfig::default()
        }
        None => EngineConfig::default(),
    };

    logging::init_with_filter(&config.log_filter);

    if let Err(e) = run(config) {
        log::error!("Demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run(config: EngineConfig) -> Result<(), DemoError> {
    let mut engine = Engine::new(config);
    let fleet = build_fleet(&mut engine)?;

    for frame in 1..=FRAMES {
        let report = engine.update(DELTA_TIME)?;
        if report.nodes_purged > 0 {
            log::info!("Frame {}: {} expired node(s) purged", frame, report.nodes_purged);
        }
        if frame % REPORT_EVERY == 0 {
            log_fleet(&engine, &fleet, frame);
        }
    }

    let leaked = engine.shutdown();
    if leaked > 0 {
        log::warn!("{} cache entries outlived the scene", leaked);
    }
    Ok(())
}

fn build_fleet(engine: &mut Engine) -> Result<Fleet, DemoError> {
    log::info!("Building fleet with {} frigates", NUM_FRIGATES);
    let mut rng = rand::thread_rng();
    let root = engine.scene().root();

    let sun = engine.scene_mut().spawn_with_pose(
        "sun",
        root,
        Pose::identity().with_rotation_axis_angle(Vec3::x(), -0.8),
    )?;
    engine.attach_from_spec(
        sun,
        &ComponentSpec::new("light")
            .with("type", "directional")
            .with("color", "1.0, 0.95, 0.9")
            .with("intensity", "1.5"),
    )?;

    let mut frigates = Vec::with_capacity(NUM_FRIGATES);
    for i in 0..NUM_FRIGATES {
        let x = (i as f32 - (NUM_FRIGATES as f32 - 1.0) * 0.5) * FRIGATE_SPACING;
        let frigate = engine.scene_mut().spawn_with_pose(
            format!("frigate{i}"),
            root,
            Pose::from_translation(Vec3::new(x, 0.0, 0.0)).with_uniform_scale(2.0),
        )?;
        engine.attach_from_spec(
            frigate,
            &ComponentSpec::new("model")
                .with("mesh", "builtin/cube")
                .with("texture", "builtin/checker"),
        )?;
        engine.scene_mut().add_component(
            frigate,
            ScriptComponent::drift(Vec3::new(0.0, 0.0, -FRIGATE_SPEED)),
        )?;

        // escorts orbit a pivot so their own poses stay fixed
        let pivot = engine.scene_mut().spawn(format!("frigate{i}/pivot"), frigate)?;
        let orbit_speed = rng.gen_range(0.3..1.2);
        engine
            .scene_mut()
            .add_component(pivot, ScriptComponent::spin(Vec3::y(), orbit_speed))?;

        for j in 0..ESCORTS_PER_FRIGATE {
            let angle = j as f32 / ESCORTS_PER_FRIGATE as f32 * std::f32::consts::TAU;
            let offset = Vec3::new(angle.cos(), rng.gen_range(-0.5..0.5), angle.sin()) * ESCORT_ORBIT_RADIUS;
            let escort = engine.scene_mut().spawn_with_pose(
                format!("frigate{i}/escort{j}"),
                pivot,
                Pose::from_translation(offset).with_uniform_scale(0.25),
            )?;
            engine.attach_from_spec(escort, &ComponentSpec::new("model").with("mesh", "builtin/cube"))?;
            engine
                .scene_mut()
                .add_component(escort, ScriptComponent::lifetime(rng.gen_range(1.0..4.0)))?;
        }
        frigates.push(frigate);
    }

    let lead_id = engine
        .scene()
        .node(frigates[0])
        .map(scene_engine::scene::Node::id)
        .ok_or(scene_engine::scene::SceneError::NodeNotFound(frigates[0]))?;
    let camera = engine.scene_mut().spawn_with_pose(
        "camera",
        root,
        Pose::from_translation(Vec3::new(0.0, 20.0, 40.0)),
    )?;
    engine
        .scene_mut()
        .add_component(camera, CameraComponent::default().looking_at(lead_id))?;

    log::info!(
        "Fleet ready: {} nodes, cube mesh shared by {} handle(s)",
        engine.scene().len(),
        engine.resources().meshes().ref_count("builtin/cube")
    );
    Ok(Fleet { frigates, camera })
}

fn log_fleet(engine: &Engine, fleet: &Fleet, frame: u32) {
    let scene = engine.scene();
    for frigate in &fleet.frigates {
        let name = scene.node(*frigate).map_or("?", |node| node.name());
        match scene.world_position(*frigate) {
            Ok(position) => log::info!("Frame {}: {} at {:?}", frame, name, position),
            Err(e) => log::warn!("Frame {}: {} unavailable: {}", frame, name, e),
        }
    }

    if let Some(camera) = scene.component::<CameraComponent>(fleet.camera) {
        log::info!("Frame {}: camera eye {:?}, tracking: {}", frame, camera.eye(), camera.target.is_some());
    }

    for (kind, stats) in engine.resources().stats() {
        if stats.misses > 0 {
            log::info!(
                "Frame {}: {} cache hits={} misses={} evictions={}",
                frame,
                kind,
                stats.hits,
                stats.misses,
                stats.evictions
            );
        }
    }
    log::info!(
        "Frame {}: cube mesh handles alive: {}",
        frame,
        engine.resources().meshes().ref_count("builtin/cube")
    );
}
