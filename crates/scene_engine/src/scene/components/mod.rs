//! Built-in component kinds
//!
//! They render nothing themselves; each derives the world-space data a
//! renderer or game system would consume from its node's transform.

pub mod camera;
pub mod light;
pub mod model;
pub mod script;
pub mod sprite;

pub use camera::CameraComponent;
pub use light::{LightComponent, LightType};
pub use model::ModelComponent;
pub use script::{ScriptComponent, ScriptState};
pub use sprite::SpriteComponent;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Pose, Vec3};
    use crate::resources::{Mesh, ResourceContext, Texture};
    use crate::scene::{LifecycleState, SceneGraph};
    use approx::assert_relative_eq;

    #[test]
    fn test_light_follows_node() {
        let mut graph = SceneGraph::new();
        let lamp = graph
            .spawn_with_pose(
                "lamp",
                graph.root(),
                Pose::from_translation(Vec3::new(0.0, 3.0, 0.0)).with_rotation_axis_angle(Vec3::x(), -std::f32::consts::FRAC_PI_2),
            )
            .unwrap();
        graph.add_component(lamp, LightComponent::point(Vec3::new(1.0, 1.0, 1.0), 2.0, 10.0)).unwrap();

        graph.update(0.016);

        let light = graph.component::<LightComponent>(lamp).unwrap();
        assert_relative_eq!(light.world_position(), Vec3::new(0.0, 3.0, 0.0), epsilon = 1e-5);
        // -Z rotated -90° about X points down
        assert_relative_eq!(light.world_direction(), Vec3::new(0.0, -1.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_camera_tracks_target_and_forgets_missing_one() {
        let mut graph = SceneGraph::new();
        let target = graph
            .spawn_with_pose("target", graph.root(), Pose::from_translation(Vec3::new(0.0, 0.0, -5.0)))
            .unwrap();
        let target_id = graph.node(target).unwrap().id();
        let eye = graph
            .spawn_with_pose("eye", graph.root(), Pose::from_translation(Vec3::new(0.0, 0.0, 5.0)))
            .unwrap();
        graph
            .add_component(eye, CameraComponent::default().looking_at(target_id))
            .unwrap();

        graph.update(0.016);
        let camera = graph.component::<CameraComponent>(eye).unwrap();
        let target_in_view = camera.view().transform_point(&Vec3::new(0.0, 0.0, -5.0).into());
        // straight ahead along the view -Z axis
        assert_relative_eq!(target_in_view.coords, Vec3::new(0.0, 0.0, -10.0), epsilon = 1e-4);

        graph.destroy(target).unwrap();
        graph.update(0.016);
        assert!(graph.component::<CameraComponent>(eye).unwrap().target.is_none());
    }

    #[test]
    fn test_model_world_bounds_and_handle_release() {
        let resources = ResourceContext::new();
        let mut graph = SceneGraph::new();
        let ship = graph
            .spawn_with_pose("ship", graph.root(), Pose::from_translation(Vec3::new(4.0, 0.0, 0.0)))
            .unwrap();

        let mesh = resources.meshes().get_or_insert_with("builtin/cube", Mesh::cube);
        let texture = resources
            .textures()
            .get_or_insert_with("builtin/white", || Texture::solid(1, 1, [255; 4]));
        graph
            .add_component(ship, ModelComponent::new(mesh).with_texture(texture))
            .unwrap();

        graph.update(0.016);
        let bounds = graph.component::<ModelComponent>(ship).unwrap().world_bounds().unwrap();
        assert_relative_eq!(bounds.center(), Vec3::new(4.0, 0.0, 0.0), epsilon = 1e-5);

        let copy = graph.clone_node(ship).unwrap();
        assert_eq!(resources.meshes().ref_count("builtin/cube"), 2);

        graph.destroy(copy).unwrap();
        graph.destroy(ship).unwrap();
        assert!(resources.meshes().is_empty());
        assert!(resources.textures().is_empty());
    }

    #[test]
    fn test_sprite_tracks_world_center() {
        let resources = ResourceContext::new();
        let mut graph = SceneGraph::new();
        let parent = graph
            .spawn_with_pose("hud", graph.root(), Pose::from_translation(Vec3::new(1.0, 1.0, 0.0)))
            .unwrap();
        let icon = graph
            .spawn_with_pose("icon", parent, Pose::from_translation(Vec3::new(0.5, 0.0, 0.0)))
            .unwrap();
        let texture = resources.textures().get_or_insert_with("icon", || Texture::solid(2, 2, [0, 255, 0, 255]));
        graph.add_component(icon, SpriteComponent::new(texture, [1.0, 1.0]).with_layer(3)).unwrap();

        graph.update(0.016);

        let sprite = graph.component::<SpriteComponent>(icon).unwrap();
        assert_relative_eq!(sprite.world_center(), Vec3::new(1.5, 1.0, 0.0), epsilon = 1e-5);
        assert_eq!(sprite.layer, 3);
    }

    #[test]
    fn test_scripts_move_and_expire_nodes() {
        let mut graph = SceneGraph::new();
        let rock = graph.spawn("rock", graph.root()).unwrap();
        graph.add_component(rock, ScriptComponent::drift(Vec3::new(1.0, 0.0, 0.0))).unwrap();
        graph.add_component(rock, ScriptComponent::lifetime(2.0)).unwrap();

        graph.update(1.0);
        graph.update(1.0);
        assert_relative_eq!(graph.world_position(rock).unwrap(), Vec3::new(2.0, 0.0, 0.0), epsilon = 1e-5);
        assert_eq!(graph.node(rock).unwrap().state(), LifecycleState::Active);

        let report = graph.update(1.0);
        assert_eq!(report.commands_applied, 2);
        assert_eq!(report.nodes_purged, 1);
        assert!(!graph.contains(rock));
    }

    #[test]
    fn test_spin_rotates_about_local_axis() {
        let mut graph = SceneGraph::new();
        let wheel = graph.spawn("wheel", graph.root()).unwrap();
        let rim = graph
            .spawn_with_pose("rim", wheel, Pose::from_translation(Vec3::new(1.0, 0.0, 0.0)))
            .unwrap();
        graph
            .add_component(wheel, ScriptComponent::spin(Vec3::z(), std::f32::consts::FRAC_PI_2))
            .unwrap();

        graph.update(1.0);

        assert_relative_eq!(graph.world_position(rim).unwrap(), Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-5);
        let script = graph.component::<ScriptComponent>(wheel).unwrap();
        assert_eq!(script.state().ticks, 1);
    }
}
